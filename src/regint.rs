// regint.rs - Internal shared types: opcodes, bitsets, the compiled
// code object, and instruction-stream walking.

use bitflags::bitflags;

use crate::regenc::utf8_seqlen;

// === Compile-time configuration ===

/// Hard cap on compiled bytecode size (independent of available memory).
pub const RE_COMP_MAXSIZE: usize = 0x10000;

/// Max number of capture groups / counter registers a pattern may use.
pub const MAX_GROUPS: usize = 0x100;
pub const MAX_VARS: usize = 0x100;

/// Fastmap entry meaning "no match can start with this byte".
pub const FMAP_MISS: u8 = 0xff;

/// Sentinel for an unset capture offset.
pub const UNSET: usize = usize::MAX;

// === Opcodes ===
//
// The bytecode is a flat stream of variable-length instructions. Operand
// layout is noted per opcode; `d16` is a signed little-endian 16-bit
// displacement relative to the end of the instruction.
#[allow(missing_docs)]
pub mod reop {
    /// Terminal: match found; keep exploring remaining failure branches.
    pub const MATCHED: u8 = 0;
    /// Terminal: match found; first success wins outright.
    pub const MATCHED_PERFECT: u8 = 1;
    pub const NOP: u8 = 2;

    /// `len:u8, bytes[len]` - exact byte run.
    pub const EXACT: u8 = 3;
    /// `len:u8, bytes[len]` - exact run, ASCII case-insensitive.
    pub const EXACT_ICASE_ASCII: u8 = 4;
    /// `count:u8, utf8-chars[count]` - exact run, Unicode case-insensitive.
    pub const EXACT_ICASE_UTF8: u8 = 5;

    // "Any character", crossed with exclude-NUL / exclude-LF / UTF-8.
    pub const ANY: u8 = 6;
    pub const ANY_UTF8: u8 = 7;
    pub const ANY_NOTLF: u8 = 8;
    pub const ANY_NOTLF_UTF8: u8 = 9;
    pub const ANY_NOTNUL: u8 = 10;
    pub const ANY_NOTNUL_UTF8: u8 = 11;
    pub const ANY_NOTNUL_NOTLF: u8 = 12;
    pub const ANY_NOTNUL_NOTLF_UTF8: u8 = 13;
    pub const ANY_MIN: u8 = ANY;
    pub const ANY_MAX: u8 = ANY_NOTNUL_NOTLF_UTF8;

    /// `b:u8` - match exactly this byte.
    pub const BYTE: u8 = 14;
    pub const NBYTE: u8 = 15;
    /// `b1:u8, b2:u8` (sorted) - match either byte.
    pub const BYTE2: u8 = 16;
    pub const NBYTE2: u8 = 17;
    /// `lo:u8, hi:u8` - match lo <= b <= hi.
    pub const RANGE: u8 = 18;
    pub const NRANGE: u8 = 19;

    /// `count:u8, utf8-chars[count]` (sorted) - char in list.
    pub const CONTAINS_UTF8: u8 = 20;
    pub const NCONTAINS_UTF8: u8 = 21;

    /// Charset: a sub-instruction stream terminated by `recs::DONE`.
    pub const CS_BYTE: u8 = 22;
    pub const CS_UTF8: u8 = 23;
    pub const NCS_UTF8: u8 = 24;

    /// `gid:u8` - group bracketing and back references.
    pub const GROUP_START: u8 = 25;
    pub const GROUP_END: u8 = 26;
    /// Epsilon-skip variants: on an empty group, skip 3..=11 bytes ahead.
    pub const GROUP_END_JMIN: u8 = 27;
    pub const GROUP_END_JMAX: u8 = 35;
    pub const GROUP_MATCH: u8 = 36;
    pub const GROUP_MATCH_JMIN: u8 = 37;
    pub const GROUP_MATCH_JMAX: u8 = 45;

    // Zero-width position assertions.
    pub const AT_SOI: u8 = 46;
    pub const AT_EOI: u8 = 47;
    pub const AT_SOL: u8 = 48;
    pub const AT_SOL_UTF8: u8 = 49;
    pub const AT_EOL: u8 = 50;
    pub const AT_EOL_UTF8: u8 = 51;
    /// As SOL/EOL but honoring the NOTBOL/NOTEOL execution flags.
    pub const AT_SOXL: u8 = 52;
    pub const AT_SOXL_UTF8: u8 = 53;
    pub const AT_EOXL: u8 = 54;
    pub const AT_EOXL_UTF8: u8 = 55;
    pub const AT_WOB: u8 = 56;
    pub const AT_WOB_UTF8: u8 = 57;
    pub const AT_WOB_NOT: u8 = 58;
    pub const AT_WOB_UTF8_NOT: u8 = 59;
    pub const AT_SOW: u8 = 60;
    pub const AT_SOW_UTF8: u8 = 61;
    pub const AT_EOW: u8 = 62;
    pub const AT_EOW_UTF8: u8 = 63;
    pub const AT_SOS: u8 = 64;
    pub const AT_SOS_UTF8: u8 = 65;
    pub const AT_EOS: u8 = 66;
    pub const AT_EOS_UTF8: u8 = 67;
    pub const AT_MIN: u8 = AT_SOI;
    pub const AT_MAX: u8 = AT_EOS_UTF8;

    /// `d16` - unconditional jump.
    pub const JMP: u8 = 68;
    /// `d16` - push failure record resuming at target, continue inline.
    pub const JMP_ONFAIL: u8 = 69;
    /// `d16` - push a non-resumable marker tagged with the target.
    pub const JMP_ONFAIL_DUMMY_AT: u8 = 70;
    /// `d16` - push failure record resuming inline, jump to target.
    pub const JMP_AND_RETURN_ONFAIL: u8 = 71;
    /// `var:u8, d16` - decrement counter; jump while non-zero.
    pub const DEC_JMP: u8 = 72;
    /// `var:u8, d16` - decrement counter; push-resume-inline and jump.
    pub const DEC_JMP_AND_RETURN_ONFAIL: u8 = 73;
    /// `var:u8, val:u8` - set counter register.
    pub const SETVAR: u8 = 74;
    /// `d16` - placeholder, finalized to POP_ONFAIL_AT or NOPs.
    pub const MAYBE_POP_ONFAIL: u8 = 75;
    /// `d16` - pop failure records until one tagged with target was popped.
    pub const POP_ONFAIL_AT: u8 = 76;

    #[inline]
    pub fn is_any(op: u8) -> bool {
        (ANY_MIN..=ANY_MAX).contains(&op)
    }

    #[inline]
    pub fn is_at(op: u8) -> bool {
        (AT_MIN..=AT_MAX).contains(&op)
    }

    /// Encode an epsilon-skip distance (3..=11) into a `GROUP_END`/`GROUP_MATCH`
    /// opcode of the J-variant family.
    #[inline]
    pub fn epsilon_jmp_encode(base: u8, skip: u8) -> u8 {
        debug_assert!((3..=11).contains(&skip));
        base + 1 + skip - 3
    }

    /// Skip distance carried by a J-variant opcode.
    #[inline]
    pub fn group_end_joff(op: u8) -> usize {
        debug_assert!((GROUP_END_JMIN..=GROUP_END_JMAX).contains(&op));
        (op - GROUP_END_JMIN + 3) as usize
    }

    #[inline]
    pub fn group_match_joff(op: u8) -> usize {
        debug_assert!((GROUP_MATCH_JMIN..=GROUP_MATCH_JMAX).contains(&op));
        (op - GROUP_MATCH_JMIN + 3) as usize
    }
}

// === Charset sub-opcodes ===
#[allow(missing_docs)]
pub mod recs {
    pub const DONE: u8 = 0;
    /// One byte (CS_BYTE) or one UTF-8 char.
    pub const CHAR: u8 = 1;
    /// Two bytes / chars.
    pub const CHAR2: u8 = 2;
    /// Inclusive range, lo then hi.
    pub const RANGE: u8 = 3;
    /// Case-folded range (UTF-8 only); input is lowered before the test.
    pub const RANGE_ICASE: u8 = 4;
    /// `count:u8, items[count]` - membership list.
    pub const CONTAINS: u8 = 5;
    /// `base:u8, nbytes:u8, data[nbytes]` - bit per byte from `base` up.
    pub const BITSET: u8 = 6;
    /// Trait-class tests; offset into the `regenc::TRAIT_*` table.
    pub const ISX_MIN: u8 = 7;
    pub const ISX_MAX: u8 = ISX_MIN + (super::TRAIT_COUNT as u8) - 1;

    #[inline]
    pub fn is_trait(op: u8) -> bool {
        (ISX_MIN..=ISX_MAX).contains(&op)
    }
}

use crate::regenc::TRAIT_COUNT;

// === 16-bit displacements ===

#[inline]
pub fn delta16_get(code: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([code[at], code[at + 1]])
}

#[inline]
pub fn delta16_set(code: &mut [u8], at: usize, delta: i32) {
    debug_assert!(delta >= i16::MIN as i32 && delta <= i16::MAX as i32);
    let b = (delta as i16).to_le_bytes();
    code[at] = b[0];
    code[at + 1] = b[1];
}

/// Resolve a `d16` operand at `at` to an absolute code offset.
#[inline]
pub fn delta16_target(code: &[u8], at: usize) -> usize {
    (at as isize + 2 + delta16_get(code, at) as isize) as usize
}

// === BitSet (256 bits for byte-level character classes) ===

pub const BITS_IN_ROOM: usize = 32;
pub const BITSET_REAL_SIZE: usize = 256 / BITS_IN_ROOM;
pub type Bits = u32;
pub type BitSet = [Bits; BITSET_REAL_SIZE];

pub const BITSET_EMPTY: BitSet = [0; BITSET_REAL_SIZE];

#[inline]
pub fn bitset_at(bs: &BitSet, pos: usize) -> bool {
    (bs[pos >> 5] & (1u32 << (pos & 0x1f))) != 0
}

#[inline]
pub fn bitset_set(bs: &mut BitSet, pos: usize) {
    bs[pos >> 5] |= 1u32 << (pos & 0x1f);
}

/// Set every bit in `lo..=hi`.
pub fn bitset_set_range(bs: &mut BitSet, lo: u8, hi: u8) {
    for b in lo..=hi {
        bitset_set(bs, b as usize);
    }
}

pub fn bitset_any(bs: &BitSet) -> bool {
    bs.iter().any(|&w| w != 0)
}

/// Any bit set within `lo..=hi`?
pub fn bitset_any_range(bs: &BitSet, lo: u8, hi: u8) -> bool {
    (lo..=hi).any(|b| bitset_at(bs, b as usize))
}

pub fn bitset_flip_all(bs: &mut BitSet) {
    for w in bs.iter_mut() {
        *w = !*w;
    }
}

pub fn bitset_popcount(bs: &BitSet) -> usize {
    bs.iter().map(|w| w.count_ones() as usize).sum()
}

/// Lowest set bit index, or 256 when empty.
pub fn bitset_first(bs: &BitSet) -> usize {
    for (i, &w) in bs.iter().enumerate() {
        if w != 0 {
            return i * BITS_IN_ROOM + w.trailing_zeros() as usize;
        }
    }
    256
}

/// Highest set bit index, or 256 when empty.
pub fn bitset_last(bs: &BitSet) -> usize {
    for (i, &w) in bs.iter().enumerate().rev() {
        if w != 0 {
            return i * BITS_IN_ROOM + (31 - w.leading_zeros() as usize);
        }
    }
    256
}

// === Code object flags ===

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CodeFlags: u8 {
        /// Some group is referenced by a back reference; group registers
        /// must be tracked even when the caller wants no captures.
        const NEEDGROUPS = 1 << 0;
        /// Groups exist that may legitimately stay unset in a match.
        const OPTGROUPS = 1 << 1;
    }
}

// === Compiled code object ===

/// The compiled artifact: bytecode plus the statically derived dispatch
/// data. Immutable once `compile` returns; safe to share read-only across
/// any number of concurrent executions.
pub struct ReCode {
    pub(crate) code: Vec<u8>,
    pub(crate) ngroups: u16,
    pub(crate) nvars: u16,
    pub(crate) flags: CodeFlags,
    /// Per-first-byte earliest entry offset; `FMAP_MISS` = never matches.
    pub(crate) fmap: [u8; 256],
    /// Lower bound on the byte length of any match.
    pub(crate) minmatch: usize,
}

impl ReCode {
    /// Number of capturing groups (user parentheses only).
    pub fn ngroups(&self) -> usize {
        self.ngroups as usize
    }

    /// Number of repetition counter registers.
    pub fn nvars(&self) -> usize {
        self.nvars as usize
    }

    pub fn flags(&self) -> CodeFlags {
        self.flags
    }

    /// Minimum number of input bytes any match consumes.
    pub fn minmatch(&self) -> usize {
        self.minmatch
    }

    /// The per-leading-byte dispatch table.
    pub fn fastmap(&self) -> &[u8; 256] {
        &self.fmap
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.code
    }
}

impl std::fmt::Debug for ReCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReCode")
            .field("len", &self.code.len())
            .field("ngroups", &self.ngroups)
            .field("nvars", &self.nvars)
            .field("flags", &self.flags)
            .field("minmatch", &self.minmatch)
            .finish()
    }
}

// === Instruction walking ===

/// Offset of the instruction following the one at `off`.
pub(crate) fn opcode_next(code: &[u8], off: usize) -> usize {
    let op = code[off];
    let mut p = off + 1;
    match op {
        reop::EXACT | reop::EXACT_ICASE_ASCII => {
            let len = code[p] as usize;
            p += 1 + len;
        }
        reop::EXACT_ICASE_UTF8 | reop::CONTAINS_UTF8 | reop::NCONTAINS_UTF8 => {
            let mut count = code[p] as usize;
            p += 1;
            while count > 0 {
                p += utf8_seqlen(code[p]).max(1);
                count -= 1;
            }
        }
        reop::CS_BYTE | reop::CS_UTF8 | reop::NCS_UTF8 => {
            p = cs_seek_end(code, p, op == reop::CS_BYTE);
        }
        reop::BYTE
        | reop::NBYTE
        | reop::GROUP_START
        | reop::GROUP_END
        | reop::GROUP_MATCH => {
            p += 1;
        }
        _ if (reop::GROUP_END_JMIN..=reop::GROUP_END_JMAX).contains(&op)
            || (reop::GROUP_MATCH_JMIN..=reop::GROUP_MATCH_JMAX).contains(&op) =>
        {
            p += 1;
        }
        reop::BYTE2
        | reop::NBYTE2
        | reop::RANGE
        | reop::NRANGE
        | reop::JMP
        | reop::JMP_ONFAIL
        | reop::JMP_ONFAIL_DUMMY_AT
        | reop::JMP_AND_RETURN_ONFAIL
        | reop::SETVAR
        | reop::MAYBE_POP_ONFAIL
        | reop::POP_ONFAIL_AT => {
            p += 2;
        }
        reop::DEC_JMP | reop::DEC_JMP_AND_RETURN_ONFAIL => {
            p += 3;
        }
        _ => {}
    }
    p
}

/// Offset just past the `recs::DONE` terminator of a charset stream.
pub(crate) fn cs_seek_end(code: &[u8], mut p: usize, byte_mode: bool) -> usize {
    loop {
        let cs = code[p];
        p += 1;
        match cs {
            recs::DONE => return p,
            recs::CHAR => {
                p += if byte_mode { 1 } else { utf8_seqlen(code[p]).max(1) };
            }
            recs::CHAR2 | recs::RANGE | recs::RANGE_ICASE => {
                if byte_mode {
                    p += 2;
                } else {
                    p += utf8_seqlen(code[p]).max(1);
                    p += utf8_seqlen(code[p]).max(1);
                }
            }
            recs::CONTAINS => {
                let mut count = code[p] as usize;
                p += 1;
                if byte_mode {
                    p += count;
                } else {
                    while count > 0 {
                        p += utf8_seqlen(code[p]).max(1);
                        count -= 1;
                    }
                }
            }
            recs::BITSET => {
                let nbytes = code[p + 1] as usize;
                p += 2 + nbytes;
            }
            _ => debug_assert!(recs::is_trait(cs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta16_roundtrip() {
        let mut buf = vec![0u8; 4];
        delta16_set(&mut buf, 1, -300);
        assert_eq!(delta16_get(&buf, 1), -300);
        delta16_set(&mut buf, 1, 0x7fff);
        assert_eq!(delta16_get(&buf, 1), 0x7fff);
    }

    #[test]
    fn bitset_basics() {
        let mut bs = BITSET_EMPTY;
        assert!(!bitset_any(&bs));
        bitset_set_range(&mut bs, b'a', b'z');
        assert!(bitset_at(&bs, b'q' as usize));
        assert!(!bitset_at(&bs, b'A' as usize));
        assert_eq!(bitset_popcount(&bs), 26);
        assert_eq!(bitset_first(&bs), b'a' as usize);
        assert_eq!(bitset_last(&bs), b'z' as usize);
        assert!(bitset_any_range(&bs, b'x', 0xff));
        assert!(!bitset_any_range(&bs, 0x80, 0xff));
    }

    #[test]
    fn opcode_walk_exact() {
        let code = vec![reop::EXACT, 3, b'a', b'b', b'c', reop::BYTE, b'x'];
        assert_eq!(opcode_next(&code, 0), 5);
        assert_eq!(opcode_next(&code, 5), 7);
    }

    #[test]
    fn opcode_walk_charset() {
        let code = vec![
            reop::CS_BYTE,
            recs::CHAR2,
            b'a',
            b'b',
            recs::BITSET,
            0x40,
            2,
            0xff,
            0x01,
            recs::DONE,
            reop::BYTE,
            b'x',
        ];
        assert_eq!(opcode_next(&code, 0), 10);
    }

    #[test]
    fn epsilon_jmp_encoding() {
        assert_eq!(reop::epsilon_jmp_encode(reop::GROUP_END, 3), reop::GROUP_END_JMIN);
        assert_eq!(reop::epsilon_jmp_encode(reop::GROUP_END, 11), reop::GROUP_END_JMAX);
        assert_eq!(reop::group_end_joff(reop::GROUP_END_JMIN), 3);
        assert_eq!(
            reop::epsilon_jmp_encode(reop::GROUP_MATCH, 6),
            reop::GROUP_MATCH_JMIN + 3
        );
        assert_eq!(reop::group_match_joff(reop::GROUP_MATCH_JMIN + 3), 6);
    }
}
