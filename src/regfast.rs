// regfast.rs - Fastmap and minimum-match-length analyzer.
//
// Statically simulates the bytecode from its entry point. Consuming
// instructions record the byte values they can start on, together with
// the earliest offset from which that byte leads into the code; zero-width
// instructions are passed through transparently. A conditional failure
// branch is simulated on both arms and the per-byte results are merged:
// bytes accepted by exactly one arm dispatch straight into that arm,
// bytes accepted by both route through the branch instruction itself.
//
// The same walk derives the minimum match length by recursing into the
// continuation after the first consuming instruction, bounded in depth.

use crate::regenc::{char_has_trait, uni_tolower, utf8_decode, utf8_seqlen};
use crate::regint::*;

/// Fill in `fmap` and `minmatch` of a freshly compiled code object.
/// Runs exactly once, immediately after compilation.
pub(crate) fn analyze(code: &mut ReCode) {
    let mut ctx = Ctx {
        code: &code.code,
        minmatch: usize::MAX,
    };
    let mut fmap = [FMAP_MISS; 256];
    let nvars = code.nvars as usize;
    ctx.populate_fastmap(&mut fmap, vec![0u8; nvars], 0, 0);
    code.fmap = fmap;
    code.minmatch = if ctx.minmatch == usize::MAX {
        0
    } else {
        ctx.minmatch
    };
}

struct Ctx<'a> {
    code: &'a [u8],
    minmatch: usize,
}

fn fmap_set(fmap: &mut [u8; 256], byte: u8, enter_pc: usize) {
    let off = if enter_pc >= 0xff { 0 } else { enter_pc as u8 };
    if fmap[byte as usize] > off {
        fmap[byte as usize] = off;
    }
}

fn fmap_set_range(fmap: &mut [u8; 256], lo: u8, hi: u8, enter_pc: usize) {
    for b in lo..=hi {
        fmap_set(fmap, b, enter_pc);
    }
}

impl<'a> Ctx<'a> {
    fn set_min(&mut self, m: usize) {
        if self.minmatch > m {
            self.minmatch = m;
        }
    }

    /// Walk from `pc`, recording first-byte candidates under the entry
    /// offset `enter_pc` (which trails through zero-width instructions).
    fn populate_fastmap(
        &mut self,
        fmap: &mut [u8; 256],
        mut vars: Vec<u8>,
        mut pc: usize,
        mut enter_pc: usize,
    ) {
        let code = self.code;
        let consumed: usize;
        loop {
            let opcode_start = pc;
            let op = code[pc];
            pc += 1;
            match op {
                reop::EXACT | reop::EXACT_ICASE_ASCII => {
                    let len = code[pc] as usize;
                    let first = code[pc + 1];
                    if op == reop::EXACT {
                        fmap_set(fmap, first, enter_pc);
                    } else {
                        fmap_set(fmap, first.to_ascii_lowercase(), enter_pc);
                        fmap_set(fmap, first.to_ascii_uppercase(), enter_pc);
                    }
                    pc += 1 + len;
                    consumed = len;
                    break;
                }

                reop::EXACT_ICASE_UTF8 => {
                    let count = code[pc] as usize;
                    let first = code[pc + 1];
                    if first >= 0x80 {
                        fmap_set_range(fmap, 0x80, 0xff, enter_pc);
                    } else {
                        fmap_set(fmap, first.to_ascii_lowercase(), enter_pc);
                        fmap_set(fmap, first.to_ascii_uppercase(), enter_pc);
                    }
                    pc = opcode_next(code, opcode_start);
                    consumed = count;
                    break;
                }

                reop::ANY | reop::ANY_UTF8 => {
                    fmap_set_range(fmap, 0x00, 0xff, enter_pc);
                    consumed = 1;
                    break;
                }
                reop::ANY_NOTLF | reop::ANY_NOTLF_UTF8 => {
                    fmap_set_range(fmap, 0x00, 0x09, enter_pc);
                    fmap_set_range(fmap, 0x0b, 0x0c, enter_pc);
                    fmap_set_range(fmap, 0x0e, 0xff, enter_pc);
                    consumed = 1;
                    break;
                }
                reop::ANY_NOTNUL | reop::ANY_NOTNUL_UTF8 => {
                    fmap_set_range(fmap, 0x01, 0xff, enter_pc);
                    consumed = 1;
                    break;
                }
                reop::ANY_NOTNUL_NOTLF | reop::ANY_NOTNUL_NOTLF_UTF8 => {
                    fmap_set_range(fmap, 0x01, 0x09, enter_pc);
                    fmap_set_range(fmap, 0x0b, 0x0c, enter_pc);
                    fmap_set_range(fmap, 0x0e, 0xff, enter_pc);
                    consumed = 1;
                    break;
                }

                reop::BYTE => {
                    fmap_set(fmap, code[pc], enter_pc);
                    pc += 1;
                    consumed = 1;
                    break;
                }
                reop::NBYTE => {
                    let b = code[pc];
                    for i in 0u8..=0xff {
                        if i != b {
                            fmap_set(fmap, i, enter_pc);
                        }
                    }
                    pc += 1;
                    consumed = 1;
                    break;
                }
                reop::BYTE2 => {
                    fmap_set(fmap, code[pc], enter_pc);
                    fmap_set(fmap, code[pc + 1], enter_pc);
                    pc += 2;
                    consumed = 1;
                    break;
                }
                reop::NBYTE2 => {
                    let (b1, b2) = (code[pc], code[pc + 1]);
                    for i in 0u8..=0xff {
                        if i != b1 && i != b2 {
                            fmap_set(fmap, i, enter_pc);
                        }
                    }
                    pc += 2;
                    consumed = 1;
                    break;
                }
                reop::RANGE => {
                    fmap_set_range(fmap, code[pc], code[pc + 1], enter_pc);
                    pc += 2;
                    consumed = 1;
                    break;
                }
                reop::NRANGE => {
                    let (lo, hi) = (code[pc], code[pc + 1]);
                    if lo > 0 {
                        fmap_set_range(fmap, 0, lo - 1, enter_pc);
                    }
                    if hi < 0xff {
                        fmap_set_range(fmap, hi + 1, 0xff, enter_pc);
                    }
                    pc += 2;
                    consumed = 1;
                    break;
                }

                reop::CONTAINS_UTF8 => {
                    let mut count = code[pc] as usize;
                    let mut p = pc + 1;
                    while count > 0 {
                        fmap_set(fmap, code[p], enter_pc);
                        p += utf8_seqlen(code[p]).max(1);
                        count -= 1;
                    }
                    pc = p;
                    consumed = 1;
                    break;
                }
                reop::NCONTAINS_UTF8 => {
                    // Only single-byte members exclude their byte; the
                    // lead byte of a multi-byte member can still start a
                    // different, accepted character.
                    let mut excluded = [false; 256];
                    let mut count = code[pc] as usize;
                    let mut p = pc + 1;
                    while count > 0 {
                        let n = utf8_seqlen(code[p]).max(1);
                        if n == 1 {
                            excluded[code[p] as usize] = true;
                        }
                        p += n;
                        count -= 1;
                    }
                    for i in 0u8..=0xff {
                        if !excluded[i as usize] {
                            fmap_set(fmap, i, enter_pc);
                        }
                    }
                    pc = p;
                    consumed = 1;
                    break;
                }

                reop::CS_BYTE | reop::CS_UTF8 => {
                    self.fastmap_charset(fmap, opcode_start, enter_pc);
                    pc = opcode_next(code, opcode_start);
                    consumed = 1;
                    break;
                }
                reop::NCS_UTF8 => {
                    // Exact membership for ASCII; everything non-ASCII is
                    // conservatively assumed possible.
                    for b in 0u8..0x80 {
                        if !cs_ascii_member(code, opcode_start + 1, b as char) {
                            fmap_set(fmap, b, enter_pc);
                        }
                    }
                    fmap_set_range(fmap, 0x80, 0xff, enter_pc);
                    pc = opcode_next(code, opcode_start);
                    consumed = 1;
                    break;
                }

                reop::GROUP_MATCH => {
                    // Reachable this early only through epsilon branches,
                    // so the repeated group is itself empty here.
                    pc += 1;
                }
                _ if (reop::GROUP_MATCH_JMIN..=reop::GROUP_MATCH_JMAX).contains(&op) => {
                    pc += 1 + reop::group_match_joff(op);
                }

                _ if reop::is_at(op) => {
                    // Zero-width: the entry point does not advance.
                }

                reop::GROUP_START | reop::GROUP_END => {
                    pc += 1;
                }
                _ if (reop::GROUP_END_JMIN..=reop::GROUP_END_JMAX).contains(&op) => {
                    // A group-end this early can only be an epsilon group;
                    // follow its skip unconditionally.
                    pc += 1 + reop::group_end_joff(op);
                }

                reop::JMP_ONFAIL | reop::JMP_AND_RETURN_ONFAIL => {
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    if delta <= 0 {
                        continue; // backward: repetition of a zero-width block
                    }
                    let target = (pc as isize + delta) as usize;
                    if enter_pc != opcode_start {
                        // Jump-ahead dispatch is off the table; still scan
                        // the other arm for its first bytes.
                        self.populate_fastmap(fmap, vars.clone(), target, enter_pc);
                        continue;
                    }
                    let (yfail, nfail) = if op == reop::JMP_ONFAIL {
                        (target, pc)
                    } else {
                        (pc, target)
                    };
                    self.fastmap_bibranch(fmap, vars, yfail, nfail, opcode_start);
                    return;
                }

                reop::JMP => {
                    let delta = delta16_get(code, pc) as isize;
                    debug_assert!(delta >= 0);
                    pc += 2;
                    pc = (pc as isize + delta) as usize;
                    if enter_pc == opcode_start {
                        enter_pc = pc;
                    }
                }

                reop::DEC_JMP | reop::DEC_JMP_AND_RETURN_ONFAIL => {
                    let varid = code[pc] as usize;
                    pc += 1;
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    if delta <= 0 {
                        // Backward implies an epsilon block; take the
                        // fall-through path.
                        vars[varid] = 0;
                        continue;
                    }
                    if vars[varid] != 0 {
                        vars[varid] -= 1;
                        let target = (pc as isize + delta) as usize;
                        self.populate_fastmap(fmap, vars.clone(), target, enter_pc);
                    }
                }

                reop::SETVAR => {
                    vars[code[pc] as usize] = code[pc + 1];
                    pc += 2;
                }

                reop::NOP => {
                    if enter_pc == opcode_start {
                        enter_pc = pc;
                    }
                }

                reop::JMP_ONFAIL_DUMMY_AT | reop::MAYBE_POP_ONFAIL | reop::POP_ONFAIL_AT => {
                    pc += 2;
                }

                reop::MATCHED | reop::MATCHED_PERFECT => {
                    // Reached before consuming anything: the pattern can
                    // match the empty string.
                    self.minmatch = 0;
                    return;
                }

                _ => unreachable!("corrupt bytecode"),
            }
        }

        // A consuming instruction was recorded; continue with the
        // minimum-match computation along its continuations.
        let nvars = vars.len();
        let max_depth = 16 + 512 / (nvars + 1);
        self.populate_minmatch(vars, pc, consumed, max_depth);
    }

    /// Simulate both arms of a failure branch independently and merge the
    /// per-byte maps.
    fn fastmap_bibranch(
        &mut self,
        fmap: &mut [u8; 256],
        vars: Vec<u8>,
        yfail_pc: usize,
        nfail_pc: usize,
        branch_pc: usize,
    ) {
        let mut fmap_yfail = [FMAP_MISS; 256];
        let mut fmap_nfail = [FMAP_MISS; 256];
        self.populate_fastmap(&mut fmap_yfail, vars.clone(), yfail_pc, yfail_pc);
        self.populate_fastmap(&mut fmap_nfail, vars, nfail_pc, nfail_pc);
        for i in 0..256u16 {
            let b = i as u8;
            match (fmap_yfail[i as usize] != FMAP_MISS, fmap_nfail[i as usize] != FMAP_MISS) {
                (true, true) => fmap_set(fmap, b, branch_pc),
                (true, false) => fmap_set(fmap, b, yfail_pc),
                (false, true) => fmap_set(fmap, b, nfail_pc),
                (false, false) => {}
            }
        }
    }

    /// Record first bytes for a positive charset instruction.
    fn fastmap_charset(&mut self, fmap: &mut [u8; 256], at: usize, enter_pc: usize) {
        let code = self.code;
        let byte_mode = code[at] == reop::CS_BYTE;
        let mut p = at + 1;
        loop {
            let cs = code[p];
            p += 1;
            match cs {
                recs::DONE => return,
                recs::CHAR => {
                    fmap_set(fmap, code[p], enter_pc);
                    p += if byte_mode { 1 } else { utf8_seqlen(code[p]).max(1) };
                }
                recs::CHAR2 => {
                    if byte_mode {
                        fmap_set(fmap, code[p], enter_pc);
                        fmap_set(fmap, code[p + 1], enter_pc);
                        p += 2;
                    } else {
                        fmap_set(fmap, code[p], enter_pc);
                        p += utf8_seqlen(code[p]).max(1);
                        fmap_set(fmap, code[p], enter_pc);
                        p += utf8_seqlen(code[p]).max(1);
                    }
                }
                recs::RANGE => {
                    if byte_mode {
                        fmap_set_range(fmap, code[p], code[p + 1], enter_pc);
                        p += 2;
                    } else {
                        let (lo, lon) = utf8_decode(&code[p..]);
                        p += lon;
                        let (hi, hin) = utf8_decode(&code[p..]);
                        p += hin;
                        if (lo as u32) < 0x80 {
                            let ascii_hi = if (hi as u32) < 0x80 { hi as u8 } else { 0x7f };
                            fmap_set_range(fmap, lo as u8, ascii_hi, enter_pc);
                        }
                        if (hi as u32) >= 0x80 {
                            fmap_set_range(fmap, 0x80, 0xff, enter_pc);
                        }
                    }
                }
                recs::RANGE_ICASE => {
                    let (lo, lon) = utf8_decode(&code[p..]);
                    p += lon;
                    let (hi, hin) = utf8_decode(&code[p..]);
                    p += hin;
                    for b in 0u8..0x80 {
                        let f = uni_tolower(b as char);
                        if f >= lo && f <= hi {
                            fmap_set(fmap, b, enter_pc);
                        }
                    }
                    fmap_set_range(fmap, 0x80, 0xff, enter_pc);
                }
                recs::CONTAINS => {
                    let mut count = code[p] as usize;
                    p += 1;
                    while count > 0 {
                        fmap_set(fmap, code[p], enter_pc);
                        p += if byte_mode { 1 } else { utf8_seqlen(code[p]).max(1) };
                        count -= 1;
                    }
                }
                recs::BITSET => {
                    let base = code[p] as usize;
                    let nbytes = code[p + 1] as usize;
                    p += 2;
                    for k in 0..nbytes {
                        let byte = code[p + k];
                        for bit in 0..8 {
                            if byte & (1 << bit) != 0 {
                                let v = base + k * 8 + bit;
                                if v < 256 {
                                    fmap_set(fmap, v as u8, enter_pc);
                                }
                            }
                        }
                    }
                    p += nbytes;
                }
                _ => {
                    debug_assert!(recs::is_trait(cs));
                    let class = cs - recs::ISX_MIN;
                    for b in 0u8..0x80 {
                        if char_has_trait(b as char, class) {
                            fmap_set(fmap, b, enter_pc);
                        }
                    }
                    // Multi-byte characters may carry the trait too.
                    fmap_set_range(fmap, 0x80, 0xff, enter_pc);
                }
            }
        }
    }

    /// Accumulate consumed length along all continuations, keeping the
    /// global minimum. `depth` bounds the branch recursion.
    fn populate_minmatch(&mut self, mut vars: Vec<u8>, mut pc: usize, mut cur: usize, depth: usize) {
        let code = self.code;
        loop {
            // A shorter full branch already exists; this one cannot win.
            if self.minmatch <= cur {
                return;
            }
            let opcode_start = pc;
            let op = code[pc];
            pc += 1;
            match op {
                reop::EXACT | reop::EXACT_ICASE_ASCII => {
                    let len = code[pc] as usize;
                    cur += len;
                    pc += 1 + len;
                }
                reop::EXACT_ICASE_UTF8 => {
                    cur += code[pc] as usize;
                    pc = opcode_next(code, opcode_start);
                }

                _ if reop::is_any(op) => cur += 1,

                reop::BYTE | reop::NBYTE => {
                    cur += 1;
                    pc += 1;
                }
                reop::BYTE2 | reop::NBYTE2 | reop::RANGE | reop::NRANGE => {
                    cur += 1;
                    pc += 2;
                }
                reop::CONTAINS_UTF8
                | reop::NCONTAINS_UTF8
                | reop::CS_BYTE
                | reop::CS_UTF8
                | reop::NCS_UTF8 => {
                    cur += 1;
                    pc = opcode_next(code, opcode_start);
                }

                reop::GROUP_MATCH => {
                    // The minimum length of past groups is not tracked;
                    // settle for the length accumulated so far.
                    self.set_min(cur);
                    return;
                }
                _ if (reop::GROUP_MATCH_JMIN..=reop::GROUP_MATCH_JMAX).contains(&op) => {
                    self.set_min(cur);
                    return;
                }

                _ if reop::is_at(op) => {}

                reop::GROUP_START | reop::GROUP_END => pc += 1,
                _ if (reop::GROUP_END_JMIN..=reop::GROUP_END_JMAX).contains(&op) => pc += 1,

                reop::JMP_ONFAIL | reop::JMP_AND_RETURN_ONFAIL => {
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    if delta <= 0 {
                        continue;
                    }
                    if depth == 0 {
                        self.set_min(cur);
                        return;
                    }
                    let target = (pc as isize + delta) as usize;
                    self.populate_minmatch(vars.clone(), target, cur, depth - 1);
                }

                reop::JMP => {
                    let delta = delta16_get(code, pc) as isize;
                    debug_assert!(delta >= 0);
                    pc += 2;
                    pc = (pc as isize + delta) as usize;
                }

                reop::DEC_JMP_AND_RETURN_ONFAIL => {
                    let varid = code[pc] as usize;
                    pc += 1;
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    if delta <= 0 {
                        vars[varid] = 0;
                        continue;
                    }
                    if vars[varid] != 0 {
                        vars[varid] -= 1;
                        if depth == 0 {
                            self.set_min(cur);
                            return;
                        }
                        let target = (pc as isize + delta) as usize;
                        self.populate_minmatch(vars.clone(), target, cur, depth - 1);
                    }
                }

                reop::DEC_JMP => {
                    let varid = code[pc] as usize;
                    pc += 1;
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    if vars[varid] != 0 {
                        vars[varid] -= 1;
                        pc = (pc as isize + delta) as usize;
                    }
                }

                reop::SETVAR => {
                    vars[code[pc] as usize] = code[pc + 1];
                    pc += 2;
                }

                reop::NOP => {}
                reop::JMP_ONFAIL_DUMMY_AT | reop::MAYBE_POP_ONFAIL | reop::POP_ONFAIL_AT => {
                    pc += 2;
                }

                reop::MATCHED | reop::MATCHED_PERFECT => {
                    self.set_min(cur);
                    return;
                }

                _ => unreachable!("corrupt bytecode"),
            }
        }
    }
}

/// ASCII membership test against a charset sub-instruction stream
/// (UTF-8 interpretation).
fn cs_ascii_member(code: &[u8], mut p: usize, c: char) -> bool {
    loop {
        let cs = code[p];
        p += 1;
        match cs {
            recs::DONE => return false,
            recs::CHAR => {
                let (m, n) = utf8_decode(&code[p..]);
                p += n;
                if c == m {
                    return true;
                }
            }
            recs::CHAR2 => {
                let (m1, n1) = utf8_decode(&code[p..]);
                p += n1;
                let (m2, n2) = utf8_decode(&code[p..]);
                p += n2;
                if c == m1 || c == m2 {
                    return true;
                }
            }
            recs::RANGE => {
                let (lo, n1) = utf8_decode(&code[p..]);
                p += n1;
                let (hi, n2) = utf8_decode(&code[p..]);
                p += n2;
                if c >= lo && c <= hi {
                    return true;
                }
            }
            recs::RANGE_ICASE => {
                let (lo, n1) = utf8_decode(&code[p..]);
                p += n1;
                let (hi, n2) = utf8_decode(&code[p..]);
                p += n2;
                let f = uni_tolower(c);
                if f >= lo && f <= hi {
                    return true;
                }
            }
            recs::CONTAINS => {
                let mut count = code[p] as usize;
                p += 1;
                let mut hit = false;
                while count > 0 {
                    let (m, n) = utf8_decode(&code[p..]);
                    p += n;
                    hit |= c == m;
                    count -= 1;
                }
                if hit {
                    return true;
                }
            }
            recs::BITSET => {
                let base = code[p] as usize;
                let nbytes = code[p + 1] as usize;
                p += 2;
                let v = c as usize;
                if v >= base && v < base + nbytes * 8 {
                    let rel = v - base;
                    if code[p + rel / 8] & (1 << (rel % 8)) != 0 {
                        return true;
                    }
                }
                p += nbytes;
            }
            _ => {
                debug_assert!(recs::is_trait(cs));
                if char_has_trait(c, cs - recs::ISX_MIN) {
                    return true;
                }
            }
        }
    }
}
