// regexec.rs - Bytecode interpreter.
//
// One dispatch loop over the opcode stream; backtracking is realized by
// an explicit on-failure stack of resumption records, never by native
// recursion. The input is abstracted behind a cursor with two concrete
// shapes: one contiguous buffer, or an ordered list of discontiguous
// chunks sharing one logical offset space.

use smallvec::SmallVec;

use bitflags::bitflags;
use memchr::{memchr, memchr2, memchr3};

use crate::error::Error;
use crate::regenc::{
    ascii_is_lf, byte_is_sym_cont, char_has_trait, uni_is_lf, uni_is_sym_cont, uni_is_sym_start,
    uni_tolower, utf8_decode, utf8_decode_last,
};
use crate::regint::*;

/// Default ceiling on the number of pending failure records.
pub const DEFAULT_MAX_FAILURES: usize = 2000;

/// Hard floor for the ceiling; smaller configured values are raised.
pub const MIN_FAILURES: usize = 128;

bitflags! {
    /// Per-call execution flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExecFlags: u8 {
        /// The start offset is not a line beginning, even at offset 0.
        const NOTBOL = 1 << 0;
        /// The end offset is not a line end, even at true input end.
        const NOTEOL = 1 << 1;
    }
}

/// A capture register pair. Offsets are logical byte offsets; both are
/// [`UNSET`] while the group has not matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReSpan {
    pub start: usize,
    pub end: usize,
}

impl ReSpan {
    pub const UNSET_SPAN: ReSpan = ReSpan {
        start: UNSET,
        end: UNSET,
    };

    #[inline]
    pub fn is_set(&self) -> bool {
        self.start != UNSET && self.end != UNSET
    }
}

/// Input to one execution: a single buffer or a scatter/gather list.
#[derive(Clone, Copy)]
pub enum Input<'a> {
    Bytes(&'a [u8]),
    Chunks(&'a [&'a [u8]]),
}

impl<'a> Input<'a> {
    /// Total materialized length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Input::Bytes(b) => b.len(),
            Input::Chunks(c) => c.iter().map(|s| s.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One execution request. The code object is shared read-only; all
/// mutable state lives inside the call.
pub struct Exec<'a> {
    pub code: &'a ReCode,
    pub input: Input<'a>,
    /// Logical start offset of the match attempt / search window.
    pub start: usize,
    /// Logical end offset (exclusive) of the window.
    pub end: usize,
    /// Virtual bytes known to exist past `end` without being present in
    /// the buffers; affects only end-of-input boundary tests.
    pub extra: usize,
    pub flags: ExecFlags,
    /// Ceiling for the on-failure stack (floored at [`MIN_FAILURES`]).
    pub max_failures: usize,
}

impl<'a> Exec<'a> {
    pub fn new(code: &'a ReCode, input: Input<'a>) -> Self {
        let end = input.len();
        Exec {
            code,
            input,
            start: 0,
            end,
            extra: 0,
            flags: ExecFlags::empty(),
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

// === Cursors ===

/// First-byte search accelerator derived from the fastmap.
pub(crate) enum FmapAccel {
    One(u8),
    Two(u8, u8),
    Three(u8, u8, u8),
    Table,
}

impl FmapAccel {
    fn new(fmap: &[u8; 256]) -> FmapAccel {
        let mut bytes: SmallVec<[u8; 4]> = SmallVec::new();
        for b in 0..256 {
            if fmap[b] != FMAP_MISS {
                if bytes.len() == 4 {
                    return FmapAccel::Table;
                }
                bytes.push(b as u8);
            }
        }
        match bytes.as_slice() {
            [a] => FmapAccel::One(*a),
            [a, b] => FmapAccel::Two(*a, *b),
            [a, b, c] => FmapAccel::Three(*a, *b, *c),
            _ => FmapAccel::Table,
        }
    }

    fn find(&self, fmap: &[u8; 256], hay: &[u8]) -> Option<usize> {
        match *self {
            FmapAccel::One(a) => memchr(a, hay),
            FmapAccel::Two(a, b) => memchr2(a, b, hay),
            FmapAccel::Three(a, b, c) => memchr3(a, b, c, hay),
            FmapAccel::Table => hay.iter().position(|&b| fmap[b as usize] != FMAP_MISS),
        }
    }
}

/// Cursor over the logical input. Implementations keep the absolute
/// logical offset and answer boundary questions; byte/character reads
/// never cross the logical end, while boundary peeks may look at any
/// materialized byte.
pub(crate) trait Cursor {
    fn offset(&self) -> usize;
    fn set_offset(&mut self, off: usize);
    fn at_end(&self) -> bool;
    /// No byte exists past `end`, neither materialized nor virtual.
    fn at_true_end(&self) -> bool;
    fn remaining(&self) -> usize;
    fn advance(&mut self, n: usize);

    fn peek_byte(&mut self) -> u8;
    fn read_byte(&mut self) -> u8;
    fn read_char(&mut self) -> char;
    fn prev_byte(&mut self) -> Option<u8>;
    fn prev_char(&mut self) -> Option<char>;
    /// Next materialized byte, looking past the logical end if needed.
    fn next_byte_x(&mut self) -> Option<u8>;
    fn next_char_x(&mut self) -> Option<char>;

    fn match_bytes(&mut self, pat: &[u8]) -> bool;
    fn match_bytes_icase(&mut self, pat: &[u8]) -> bool;
    /// Compare `len` input bytes at the cursor against the `len` bytes
    /// previously visited at `src`, advancing on success.
    fn compare_with(&mut self, src: usize, len: usize) -> bool;

    /// First offset in `[from, to)` whose byte the fastmap accepts.
    fn find_candidate(
        &mut self,
        fmap: &[u8; 256],
        accel: &FmapAccel,
        from: usize,
        to: usize,
    ) -> Option<usize>;

    #[inline]
    fn at_start(&self) -> bool {
        self.offset() == 0
    }
}

/// Cursor over one contiguous buffer.
pub(crate) struct SingleCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
    extra: usize,
}

impl<'a> SingleCursor<'a> {
    fn new(buf: &'a [u8], start: usize, end: usize, extra: usize) -> Self {
        let end = end.min(buf.len());
        SingleCursor {
            buf,
            pos: start.min(end),
            end,
            extra,
        }
    }
}

impl<'a> Cursor for SingleCursor<'a> {
    #[inline]
    fn offset(&self) -> usize {
        self.pos
    }

    #[inline]
    fn set_offset(&mut self, off: usize) {
        self.pos = off;
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    #[inline]
    fn at_true_end(&self) -> bool {
        self.pos >= self.end && self.end >= self.buf.len() && self.extra == 0
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    #[inline]
    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    #[inline]
    fn peek_byte(&mut self) -> u8 {
        self.buf[self.pos]
    }

    #[inline]
    fn read_byte(&mut self) -> u8 {
        let b = self.buf[self.pos];
        self.pos += 1;
        b
    }

    fn read_char(&mut self) -> char {
        let (c, n) = utf8_decode(&self.buf[self.pos..self.end]);
        self.pos += n.max(1);
        c
    }

    fn prev_byte(&mut self) -> Option<u8> {
        if self.pos == 0 {
            None
        } else {
            Some(self.buf[self.pos - 1])
        }
    }

    fn prev_char(&mut self) -> Option<char> {
        if self.pos == 0 {
            return None;
        }
        let (c, _) = utf8_decode_last(&self.buf[..self.pos]);
        Some(c)
    }

    fn next_byte_x(&mut self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn next_char_x(&mut self) -> Option<char> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let (c, _) = utf8_decode(&self.buf[self.pos..]);
        Some(c)
    }

    fn match_bytes(&mut self, pat: &[u8]) -> bool {
        if self.remaining() < pat.len() {
            return false;
        }
        if &self.buf[self.pos..self.pos + pat.len()] != pat {
            return false;
        }
        self.pos += pat.len();
        true
    }

    fn match_bytes_icase(&mut self, pat: &[u8]) -> bool {
        if self.remaining() < pat.len() {
            return false;
        }
        if !self.buf[self.pos..self.pos + pat.len()].eq_ignore_ascii_case(pat) {
            return false;
        }
        self.pos += pat.len();
        true
    }

    fn compare_with(&mut self, src: usize, len: usize) -> bool {
        if self.remaining() < len {
            return false;
        }
        if self.buf[src..src + len] != self.buf[self.pos..self.pos + len] {
            return false;
        }
        self.pos += len;
        true
    }

    fn find_candidate(
        &mut self,
        fmap: &[u8; 256],
        accel: &FmapAccel,
        from: usize,
        to: usize,
    ) -> Option<usize> {
        let to = to.min(self.end);
        if from >= to {
            return None;
        }
        accel.find(fmap, &self.buf[from..to]).map(|i| from + i)
    }
}

/// Cursor over a scatter/gather chunk list. The chunk containing the
/// last touched offset is cached; repositioning searches backward
/// through already-visited chunks first, then forward.
pub(crate) struct ChunkedCursor<'a> {
    chunks: &'a [&'a [u8]],
    pos: usize,
    /// Cached chunk index and its logical base offset.
    idx: usize,
    base: usize,
    end: usize,
    extra: usize,
    total: usize,
}

impl<'a> ChunkedCursor<'a> {
    fn new(chunks: &'a [&'a [u8]], start: usize, end: usize, extra: usize) -> Self {
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        let end = end.min(total);
        ChunkedCursor {
            chunks,
            pos: start.min(end),
            idx: 0,
            base: 0,
            end,
            extra,
            total,
        }
    }

    /// Move the chunk cache so that `o` falls inside `chunks[idx]`.
    /// Caller guarantees `o < total`.
    fn seek(&mut self, o: usize) {
        while o < self.base {
            self.idx -= 1;
            self.base -= self.chunks[self.idx].len();
        }
        while o >= self.base + self.chunks[self.idx].len() {
            self.base += self.chunks[self.idx].len();
            self.idx += 1;
        }
    }

    fn byte_at(&mut self, o: usize) -> u8 {
        self.seek(o);
        self.chunks[self.idx][o - self.base]
    }

    /// Copy up to `want` materialized bytes from `o` into `buf`.
    fn gather(&mut self, o: usize, buf: &mut [u8], want: usize) -> usize {
        let lim = self.total.min(o + want);
        let mut i = 0;
        while o + i < lim {
            buf[i] = self.byte_at(o + i);
            i += 1;
        }
        i
    }
}

impl<'a> Cursor for ChunkedCursor<'a> {
    #[inline]
    fn offset(&self) -> usize {
        self.pos
    }

    #[inline]
    fn set_offset(&mut self, off: usize) {
        self.pos = off;
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    #[inline]
    fn at_true_end(&self) -> bool {
        self.pos >= self.end && self.end >= self.total && self.extra == 0
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    #[inline]
    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn peek_byte(&mut self) -> u8 {
        let o = self.pos;
        self.byte_at(o)
    }

    fn read_byte(&mut self) -> u8 {
        let b = self.peek_byte();
        self.pos += 1;
        b
    }

    fn read_char(&mut self) -> char {
        let mut scratch = [0u8; 4];
        let want = (self.end - self.pos).min(4);
        let o = self.pos;
        let n = self.gather(o, &mut scratch, want);
        let (c, len) = utf8_decode(&scratch[..n]);
        self.pos += len.max(1);
        c
    }

    fn prev_byte(&mut self) -> Option<u8> {
        if self.pos == 0 {
            None
        } else {
            let o = self.pos - 1;
            Some(self.byte_at(o))
        }
    }

    fn prev_char(&mut self) -> Option<char> {
        if self.pos == 0 {
            return None;
        }
        let mut scratch = [0u8; 4];
        let from = self.pos.saturating_sub(4);
        let want = self.pos - from;
        let n = self.gather(from, &mut scratch, want);
        let (c, _) = utf8_decode_last(&scratch[..n]);
        Some(c)
    }

    fn next_byte_x(&mut self) -> Option<u8> {
        if self.pos >= self.total {
            return None;
        }
        let o = self.pos;
        Some(self.byte_at(o))
    }

    fn next_char_x(&mut self) -> Option<char> {
        if self.pos >= self.total {
            return None;
        }
        let mut scratch = [0u8; 4];
        let o = self.pos;
        let n = self.gather(o, &mut scratch, 4);
        let (c, _) = utf8_decode(&scratch[..n]);
        Some(c)
    }

    fn match_bytes(&mut self, pat: &[u8]) -> bool {
        if self.remaining() < pat.len() {
            return false;
        }
        for (i, &p) in pat.iter().enumerate() {
            let o = self.pos + i;
            if self.byte_at(o) != p {
                return false;
            }
        }
        self.pos += pat.len();
        true
    }

    fn match_bytes_icase(&mut self, pat: &[u8]) -> bool {
        if self.remaining() < pat.len() {
            return false;
        }
        for (i, &p) in pat.iter().enumerate() {
            let o = self.pos + i;
            if !self.byte_at(o).eq_ignore_ascii_case(&p) {
                return false;
            }
        }
        self.pos += pat.len();
        true
    }

    fn compare_with(&mut self, src: usize, len: usize) -> bool {
        if self.remaining() < len {
            return false;
        }
        for i in 0..len {
            let a = self.byte_at(src + i);
            let b_off = self.pos + i;
            let b = self.byte_at(b_off);
            if a != b {
                return false;
            }
        }
        self.pos += len;
        true
    }

    fn find_candidate(
        &mut self,
        fmap: &[u8; 256],
        accel: &FmapAccel,
        from: usize,
        to: usize,
    ) -> Option<usize> {
        let to = to.min(self.end);
        if from >= to {
            return None;
        }
        // Scan chunk-wise so the byte search stays vectorizable.
        self.seek(from);
        let (mut idx, mut base) = (self.idx, self.base);
        let mut o = from;
        while o < to {
            let chunk = self.chunks[idx];
            let chunk_end = (base + chunk.len()).min(to);
            if o < chunk_end {
                if let Some(i) = accel.find(fmap, &chunk[o - base..chunk_end - base]) {
                    return Some(o + i);
                }
                o = chunk_end;
            }
            base += chunk.len();
            idx += 1;
            if idx >= self.chunks.len() {
                break;
            }
        }
        None
    }
}

// === On-failure stack ===

/// One resumption record.
enum FailItem {
    /// Restore the cursor to `off` and resume at `pc`.
    Resume { off: usize, pc: usize },
    /// Non-resumable marker, identified by its tag for targeted pops.
    Dummy { pc: usize },
    /// Roll one capture-register edge back to a previous value.
    Restore { gid: u8, is_start: bool, val: usize },
}

struct Best {
    off: usize,
    groups: SmallVec<[ReSpan; 9]>,
}

enum Outcome {
    Match,
    NoMatch,
}

// === Interpreter ===

struct Interp<'a, C: Cursor> {
    re: &'a ReCode,
    cur: C,
    /// Start offset of the current attempt (for epsilon group filling).
    attempt_start: usize,
    eflags: ExecFlags,
    max_failures: usize,
    vars: Vec<u8>,
    groups: Vec<ReSpan>,
    want_captures: bool,
    reset_groups_on_fail: bool,
    onfail: Vec<FailItem>,
    best: Option<Best>,
}

/// The exact leftmost-longest tie break: compare end offsets (later
/// wins), then start offsets (earlier wins), group by group from group 0
/// upward, stopping at the first deciding group.
fn is_regmatch_better(a: &[ReSpan], b: &[ReSpan]) -> bool {
    #[inline]
    fn signed(v: usize) -> i64 {
        if v == UNSET {
            -1
        } else {
            v as i64
        }
    }
    for (ra, rb) in a.iter().zip(b.iter()) {
        let (ae, be) = (signed(ra.end), signed(rb.end));
        if ae > be {
            return true;
        }
        if ae < be {
            return false;
        }
        let (asn, bsn) = (signed(ra.start), signed(rb.start));
        if asn < bsn {
            return true;
        }
        if asn > bsn {
            return false;
        }
    }
    false
}

impl<'a, C: Cursor> Interp<'a, C> {
    fn new(
        re: &'a ReCode,
        cur: C,
        eflags: ExecFlags,
        max_failures: usize,
        want_captures: bool,
        for_search: bool,
    ) -> Self {
        let track = want_captures || re.flags.contains(CodeFlags::NEEDGROUPS);
        Interp {
            re,
            attempt_start: cur.offset(),
            cur,
            eflags,
            max_failures: max_failures.max(MIN_FAILURES),
            vars: vec![0; re.nvars as usize],
            groups: vec![ReSpan::UNSET_SPAN; re.ngroups as usize],
            want_captures,
            reset_groups_on_fail: for_search && track,
            onfail: Vec::new(),
            best: None,
        }
    }

    fn pushfail(&mut self, item: FailItem) -> Result<(), Error> {
        if self.onfail.len() >= self.max_failures {
            return Err(Error::StackLimit);
        }
        self.onfail.push(item);
        Ok(())
    }

    /// Unwind the failure stack. Returns `None` when a resumption record
    /// was applied, otherwise the final outcome of the attempt.
    fn backtrack(&mut self, pc: &mut usize) -> Option<Outcome> {
        loop {
            match self.onfail.pop() {
                None => {
                    if self.best.is_some() {
                        self.restore_best();
                        return Some(Outcome::Match);
                    }
                    if self.reset_groups_on_fail {
                        self.groups.fill(ReSpan::UNSET_SPAN);
                    }
                    return Some(Outcome::NoMatch);
                }
                Some(FailItem::Dummy { .. }) => continue,
                Some(FailItem::Restore { gid, is_start, val }) => {
                    let g = &mut self.groups[gid as usize];
                    if is_start {
                        g.start = val;
                    } else {
                        g.end = val;
                    }
                }
                Some(FailItem::Resume { off, pc: rpc }) => {
                    self.cur.set_offset(off);
                    *pc = rpc;
                    return None;
                }
            }
        }
    }

    fn save_best(&mut self) {
        let groups = if self.want_captures {
            SmallVec::from_slice(&self.groups)
        } else {
            SmallVec::new()
        };
        self.best = Some(Best {
            off: self.cur.offset(),
            groups,
        });
    }

    fn restore_best(&mut self) {
        if let Some(best) = self.best.take() {
            self.cur.set_offset(best.off);
            if self.want_captures {
                self.groups.copy_from_slice(&best.groups);
            }
        }
    }

    /// Record a group-edge write on the failure stack so backtracking can
    /// roll it back. The top-of-stack record for the same edge is updated
    /// in place instead of pushing a duplicate.
    fn note_group_edge(&mut self, gid: u8, is_start: bool, old: usize) -> Result<(), Error> {
        let mut i = self.onfail.len();
        while i > 0 {
            i -= 1;
            match &mut self.onfail[i] {
                FailItem::Restore {
                    gid: g,
                    is_start: s,
                    val,
                } => {
                    if *s == is_start && *g == gid {
                        *val = old;
                        return Ok(());
                    }
                }
                _ => break,
            }
        }
        self.pushfail(FailItem::Restore {
            gid,
            is_start,
            val: old,
        })
    }

    /// Short-circuit for a zero-length match at the attempt start.
    fn epsilon_match(&mut self) -> Result<Outcome, Error> {
        if !self.want_captures {
            return Ok(Outcome::Match);
        }
        if self.re.flags.contains(CodeFlags::OPTGROUPS) {
            // Optional groups must be filled by actually running the
            // code, so only the groups on the taken epsilon path are set.
            return self.run(0);
        }
        let off = self.attempt_start;
        self.groups.fill(ReSpan { start: off, end: off });
        Ok(Outcome::Match)
    }

    /// Execute one match attempt at the cursor's current position.
    fn exec(&mut self) -> Result<Outcome, Error> {
        self.best = None;
        self.attempt_start = self.cur.offset();

        let pc;
        if !self.cur.at_end() {
            let first = self.cur.peek_byte();
            let fm = self.re.fmap[first as usize];
            if fm == FMAP_MISS {
                if self.re.minmatch != 0 {
                    return Ok(Outcome::NoMatch);
                }
                return self.epsilon_match();
            }
            pc = fm as usize;
        } else {
            if self.re.minmatch != 0 {
                return Ok(Outcome::NoMatch);
            }
            return self.epsilon_match();
        }
        self.run(pc)
    }

    fn run(&mut self, entry: usize) -> Result<Outcome, Error> {
        let re = self.re;
        let code: &[u8] = &re.code;
        let mut pc = entry;

        macro_rules! onfail {
            () => {
                match self.backtrack(&mut pc) {
                    None => continue,
                    Some(outcome) => return Ok(outcome),
                }
            };
        }

        loop {
            let _opcode_start = pc;
            let op = code[pc];
            pc += 1;
            match op {
                reop::EXACT => {
                    let len = code[pc] as usize;
                    pc += 1;
                    if !self.cur.match_bytes(&code[pc..pc + len]) {
                        onfail!();
                    }
                    pc += len;
                }

                reop::EXACT_ICASE_ASCII => {
                    let len = code[pc] as usize;
                    pc += 1;
                    if !self.cur.match_bytes_icase(&code[pc..pc + len]) {
                        onfail!();
                    }
                    pc += len;
                }

                reop::EXACT_ICASE_UTF8 => {
                    let mut count = code[pc] as usize;
                    pc += 1;
                    let mut ok = true;
                    while count > 0 {
                        if self.cur.at_end() {
                            ok = false;
                            break;
                        }
                        let (expected, n) = utf8_decode(&code[pc..]);
                        pc += n;
                        let actual = self.cur.read_char();
                        if actual != expected && uni_tolower(actual) != uni_tolower(expected) {
                            ok = false;
                            break;
                        }
                        count -= 1;
                    }
                    if !ok {
                        onfail!();
                    }
                }

                reop::ANY => {
                    if self.cur.at_end() {
                        onfail!();
                    }
                    self.cur.read_byte();
                }
                reop::ANY_UTF8 => {
                    if self.cur.at_end() {
                        onfail!();
                    }
                    self.cur.read_char();
                }
                reop::ANY_NOTLF => {
                    if self.cur.at_end() || ascii_is_lf(self.cur.peek_byte()) {
                        onfail!();
                    }
                    self.cur.read_byte();
                }
                reop::ANY_NOTLF_UTF8 => {
                    if self.cur.at_end() {
                        onfail!();
                    }
                    if uni_is_lf(self.cur.read_char()) {
                        onfail!();
                    }
                }
                reop::ANY_NOTNUL => {
                    if self.cur.at_end() || self.cur.peek_byte() == 0 {
                        onfail!();
                    }
                    self.cur.read_byte();
                }
                reop::ANY_NOTNUL_UTF8 => {
                    if self.cur.at_end() {
                        onfail!();
                    }
                    if self.cur.read_char() == '\0' {
                        onfail!();
                    }
                }
                reop::ANY_NOTNUL_NOTLF => {
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let b = self.cur.peek_byte();
                    if b == 0 || ascii_is_lf(b) {
                        onfail!();
                    }
                    self.cur.read_byte();
                }
                reop::ANY_NOTNUL_NOTLF_UTF8 => {
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let c = self.cur.read_char();
                    if c == '\0' || uni_is_lf(c) {
                        onfail!();
                    }
                }

                reop::BYTE => {
                    let b = code[pc];
                    pc += 1;
                    if self.cur.at_end() || self.cur.read_byte() != b {
                        onfail!();
                    }
                }
                reop::NBYTE => {
                    let b = code[pc];
                    pc += 1;
                    if self.cur.at_end() || self.cur.read_byte() == b {
                        onfail!();
                    }
                }
                reop::BYTE2 => {
                    let (b1, b2) = (code[pc], code[pc + 1]);
                    pc += 2;
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let ch = self.cur.read_byte();
                    if ch != b1 && ch != b2 {
                        onfail!();
                    }
                }
                reop::NBYTE2 => {
                    let (b1, b2) = (code[pc], code[pc + 1]);
                    pc += 2;
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let ch = self.cur.read_byte();
                    if ch == b1 || ch == b2 {
                        onfail!();
                    }
                }
                reop::RANGE => {
                    let (lo, hi) = (code[pc], code[pc + 1]);
                    pc += 2;
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let ch = self.cur.read_byte();
                    if ch < lo || ch > hi {
                        onfail!();
                    }
                }
                reop::NRANGE => {
                    let (lo, hi) = (code[pc], code[pc + 1]);
                    pc += 2;
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let ch = self.cur.read_byte();
                    if ch >= lo && ch <= hi {
                        onfail!();
                    }
                }

                reop::CONTAINS_UTF8 | reop::NCONTAINS_UTF8 => {
                    let mut count = code[pc] as usize;
                    pc += 1;
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let ch = self.cur.read_char();
                    let mut hit = false;
                    while count > 0 {
                        let (m, n) = utf8_decode(&code[pc..]);
                        pc += n;
                        hit |= ch == m;
                        count -= 1;
                    }
                    if hit == (op == reop::NCONTAINS_UTF8) {
                        onfail!();
                    }
                }

                reop::CS_BYTE => {
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let ch = self.cur.read_byte();
                    let matched = cs_byte_match(code, pc, ch);
                    pc = cs_seek_end(code, pc, true);
                    if !matched {
                        onfail!();
                    }
                }
                reop::CS_UTF8 | reop::NCS_UTF8 => {
                    if self.cur.at_end() {
                        onfail!();
                    }
                    let ch = self.cur.read_char();
                    let matched = cs_utf8_match(code, pc, ch);
                    pc = cs_seek_end(code, pc, false);
                    if matched == (op == reop::NCS_UTF8) {
                        onfail!();
                    }
                }

                reop::GROUP_MATCH => {
                    let gid = code[pc] as usize;
                    pc += 1;
                    let span = self.groups[gid];
                    if !span.is_set() {
                        onfail!();
                    }
                    debug_assert!(span.start <= span.end);
                    if span.start < span.end
                        && !self.cur.compare_with(span.start, span.end - span.start)
                    {
                        onfail!();
                    }
                }
                _ if (reop::GROUP_MATCH_JMIN..=reop::GROUP_MATCH_JMAX).contains(&op) => {
                    let gid = code[pc] as usize;
                    pc += 1;
                    let span = self.groups[gid];
                    if !span.is_set() {
                        onfail!();
                    }
                    if span.start < span.end {
                        if !self.cur.compare_with(span.start, span.end - span.start) {
                            onfail!();
                        }
                    } else {
                        // Referenced group is empty: skip the loop tail so
                        // a zero-width body cannot spin.
                        pc += reop::group_match_joff(op);
                    }
                }

                reop::AT_SOI => {
                    if !self.cur.at_start() {
                        onfail!();
                    }
                }
                reop::AT_EOI => {
                    if !self.cur.at_end() {
                        onfail!();
                    }
                }
                reop::AT_SOL => {
                    if !self.cur.at_start()
                        && !self.cur.prev_byte().is_some_and(ascii_is_lf)
                    {
                        onfail!();
                    }
                }
                reop::AT_SOL_UTF8 => {
                    if !self.cur.at_start() && !self.cur.prev_char().is_some_and(uni_is_lf) {
                        onfail!();
                    }
                }
                reop::AT_EOL => {
                    if !self.cur.at_true_end()
                        && !self.cur.next_byte_x().is_some_and(ascii_is_lf)
                    {
                        onfail!();
                    }
                }
                reop::AT_EOL_UTF8 => {
                    if !self.cur.at_true_end() && !self.cur.next_char_x().is_some_and(uni_is_lf)
                    {
                        onfail!();
                    }
                }
                reop::AT_SOXL => {
                    let ok = if self.cur.at_start() {
                        !self.eflags.contains(ExecFlags::NOTBOL)
                    } else {
                        self.cur.prev_byte().is_some_and(ascii_is_lf)
                    };
                    if !ok {
                        onfail!();
                    }
                }
                reop::AT_SOXL_UTF8 => {
                    let ok = if self.cur.at_start() {
                        !self.eflags.contains(ExecFlags::NOTBOL)
                    } else {
                        self.cur.prev_char().is_some_and(uni_is_lf)
                    };
                    if !ok {
                        onfail!();
                    }
                }
                reop::AT_EOXL => {
                    let ok = if self.cur.at_true_end() {
                        !self.eflags.contains(ExecFlags::NOTEOL)
                    } else {
                        self.cur.next_byte_x().is_some_and(ascii_is_lf)
                    };
                    if !ok {
                        onfail!();
                    }
                }
                reop::AT_EOXL_UTF8 => {
                    let ok = if self.cur.at_true_end() {
                        !self.eflags.contains(ExecFlags::NOTEOL)
                    } else {
                        self.cur.next_char_x().is_some_and(uni_is_lf)
                    };
                    if !ok {
                        onfail!();
                    }
                }

                reop::AT_WOB | reop::AT_WOB_NOT | reop::AT_SOW | reop::AT_EOW => {
                    let previs = self.cur.prev_byte().is_some_and(byte_is_sym_cont);
                    let nextis = !self.cur.at_true_end()
                        && self.cur.next_byte_x().is_some_and(byte_is_sym_cont);
                    let ok = match op {
                        reop::AT_WOB => previs != nextis,
                        reop::AT_WOB_NOT => previs == nextis,
                        reop::AT_SOW => !previs && nextis,
                        _ => previs && !nextis,
                    };
                    if !ok {
                        onfail!();
                    }
                }
                reop::AT_WOB_UTF8 | reop::AT_WOB_UTF8_NOT | reop::AT_SOW_UTF8
                | reop::AT_EOW_UTF8 => {
                    let previs = self.cur.prev_char().is_some_and(uni_is_sym_cont);
                    let nextis = !self.cur.at_true_end()
                        && self.cur.next_char_x().is_some_and(uni_is_sym_cont);
                    let ok = match op {
                        reop::AT_WOB_UTF8 => previs != nextis,
                        reop::AT_WOB_UTF8_NOT => previs == nextis,
                        reop::AT_SOW_UTF8 => !previs && nextis,
                        _ => previs && !nextis,
                    };
                    if !ok {
                        onfail!();
                    }
                }
                reop::AT_SOS | reop::AT_SOS_UTF8 => {
                    let (previs, nextis) = if op == reop::AT_SOS {
                        (
                            self.cur.prev_byte().is_some_and(byte_is_sym_cont),
                            !self.cur.at_true_end()
                                && self
                                    .cur
                                    .next_byte_x()
                                    .is_some_and(crate::regenc::byte_is_sym_start),
                        )
                    } else {
                        (
                            self.cur.prev_char().is_some_and(uni_is_sym_cont),
                            !self.cur.at_true_end()
                                && self.cur.next_char_x().is_some_and(uni_is_sym_start),
                        )
                    };
                    if previs || !nextis {
                        onfail!();
                    }
                }
                reop::AT_EOS | reop::AT_EOS_UTF8 => {
                    let (previs, nextis) = if op == reop::AT_EOS {
                        (
                            self.cur.prev_byte().is_some_and(byte_is_sym_cont),
                            !self.cur.at_true_end()
                                && self.cur.next_byte_x().is_some_and(byte_is_sym_cont),
                        )
                    } else {
                        (
                            self.cur.prev_char().is_some_and(uni_is_sym_cont),
                            !self.cur.at_true_end()
                                && self.cur.next_char_x().is_some_and(uni_is_sym_cont),
                        )
                    };
                    if !previs || nextis {
                        onfail!();
                    }
                }

                reop::GROUP_START => {
                    let gid = code[pc];
                    pc += 1;
                    let cur_off = self.cur.offset();
                    let old = self.groups[gid as usize].start;
                    if !self.onfail.is_empty() && old != cur_off {
                        self.note_group_edge(gid, true, old)?;
                    }
                    self.groups[gid as usize].start = cur_off;
                }

                reop::GROUP_END => {
                    let gid = code[pc];
                    pc += 1;
                    let cur_off = self.cur.offset();
                    let old = self.groups[gid as usize].end;
                    if !self.onfail.is_empty() && old != cur_off {
                        self.note_group_edge(gid, false, old)?;
                    }
                    self.groups[gid as usize].end = cur_off;
                    debug_assert!(self.groups[gid as usize].start <= cur_off);
                }
                _ if (reop::GROUP_END_JMIN..=reop::GROUP_END_JMAX).contains(&op) => {
                    let gid = code[pc];
                    pc += 1;
                    let cur_off = self.cur.offset();
                    let old = self.groups[gid as usize].end;
                    if !self.onfail.is_empty() && old != cur_off {
                        self.note_group_edge(gid, false, old)?;
                    }
                    self.groups[gid as usize].end = cur_off;
                    if self.groups[gid as usize].start >= cur_off {
                        // Group matched empty: skip the loop tail.
                        pc += reop::group_end_joff(op);
                    }
                }

                reop::POP_ONFAIL_AT => {
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    let target = (pc as isize + delta) as usize;
                    while let Some(item) = self.onfail.pop() {
                        match item {
                            FailItem::Restore { .. } => continue,
                            FailItem::Resume { pc: p, .. } | FailItem::Dummy { pc: p } => {
                                if p == target {
                                    break;
                                }
                            }
                        }
                    }
                }

                reop::JMP_ONFAIL => {
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    let target = (pc as isize + delta) as usize;
                    let off = self.cur.offset();
                    self.pushfail(FailItem::Resume { off, pc: target })?;
                }

                reop::JMP_ONFAIL_DUMMY_AT => {
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    let target = (pc as isize + delta) as usize;
                    self.pushfail(FailItem::Dummy { pc: target })?;
                }

                reop::JMP => {
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    pc = (pc as isize + delta) as usize;
                }

                reop::JMP_AND_RETURN_ONFAIL => {
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    let off = self.cur.offset();
                    self.pushfail(FailItem::Resume { off, pc })?;
                    pc = (pc as isize + delta) as usize;
                }

                reop::DEC_JMP => {
                    let varid = code[pc] as usize;
                    pc += 1;
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    if self.vars[varid] != 0 {
                        self.vars[varid] -= 1;
                        pc = (pc as isize + delta) as usize;
                    }
                }

                reop::DEC_JMP_AND_RETURN_ONFAIL => {
                    let varid = code[pc] as usize;
                    pc += 1;
                    let delta = delta16_get(code, pc) as isize;
                    pc += 2;
                    if self.vars[varid] != 0 {
                        self.vars[varid] -= 1;
                        let off = self.cur.offset();
                        self.pushfail(FailItem::Resume { off, pc })?;
                        pc = (pc as isize + delta) as usize;
                    }
                }

                reop::SETVAR => {
                    self.vars[code[pc] as usize] = code[pc + 1];
                    pc += 2;
                }

                reop::NOP | reop::MAYBE_POP_ONFAIL => {
                    debug_assert!(op == reop::NOP, "placeholder survived compilation");
                    if op == reop::MAYBE_POP_ONFAIL {
                        pc += 2;
                    }
                }

                reop::MATCHED => {
                    if !self.onfail.is_empty() {
                        // It cannot get longer than end-of-input, but the
                        // best captures may still be undecided.
                        if self.cur.at_end() && !self.want_captures {
                            return Ok(Outcome::Match);
                        }
                        let better = match &self.best {
                            None => true,
                            Some(b) => {
                                let off = self.cur.offset();
                                off > b.off
                                    || (off == b.off
                                        && self.want_captures
                                        && is_regmatch_better(&self.groups, &b.groups))
                            }
                        };
                        if better {
                            self.save_best();
                        }
                        onfail!();
                    }
                    // No branches left: keep the better of this match and
                    // the retained best.
                    if let Some(b) = &self.best {
                        let off = self.cur.offset();
                        if b.off > off
                            || (b.off == off
                                && self.want_captures
                                && is_regmatch_better(&b.groups, &self.groups))
                        {
                            self.restore_best();
                        }
                    }
                    return Ok(Outcome::Match);
                }

                reop::MATCHED_PERFECT => {
                    return Ok(Outcome::Match);
                }

                _ => {
                    debug_assert!(false, "corrupt bytecode at {}", _opcode_start);
                    onfail!();
                }
            }
        }
    }

    fn copy_captures(&self, out: &mut [ReSpan]) {
        let n = out.len().min(self.groups.len());
        out[..n].copy_from_slice(&self.groups[..n]);
        for g in &mut out[n..] {
            *g = ReSpan::UNSET_SPAN;
        }
    }
}

// === Charset sub-instruction evaluation ===

fn cs_byte_match(code: &[u8], mut p: usize, ch: u8) -> bool {
    loop {
        let cs = code[p];
        p += 1;
        match cs {
            recs::DONE => return false,
            recs::CHAR => {
                if ch == code[p] {
                    return true;
                }
                p += 1;
            }
            recs::CHAR2 => {
                if ch == code[p] || ch == code[p + 1] {
                    return true;
                }
                p += 2;
            }
            recs::RANGE => {
                if ch >= code[p] && ch <= code[p + 1] {
                    return true;
                }
                p += 2;
            }
            recs::CONTAINS => {
                let len = code[p] as usize;
                p += 1;
                if memchr(ch, &code[p..p + len]).is_some() {
                    return true;
                }
                p += len;
            }
            recs::BITSET => {
                let base = code[p] as usize;
                let nbytes = code[p + 1] as usize;
                p += 2;
                let v = ch as usize;
                if v >= base && v < base + nbytes * 8 {
                    let rel = v - base;
                    if code[p + rel / 8] & (1 << (rel % 8)) != 0 {
                        return true;
                    }
                }
                p += nbytes;
            }
            _ => {
                // Trait tests are not emitted in byte mode.
                debug_assert!(recs::is_trait(cs));
            }
        }
    }
}

fn cs_utf8_match(code: &[u8], mut p: usize, ch: char) -> bool {
    loop {
        let cs = code[p];
        p += 1;
        match cs {
            recs::DONE => return false,
            recs::CHAR => {
                let (m, n) = utf8_decode(&code[p..]);
                p += n;
                if ch == m {
                    return true;
                }
            }
            recs::CHAR2 => {
                let (m1, n1) = utf8_decode(&code[p..]);
                p += n1;
                let (m2, n2) = utf8_decode(&code[p..]);
                p += n2;
                if ch == m1 || ch == m2 {
                    return true;
                }
            }
            recs::RANGE => {
                let (lo, n1) = utf8_decode(&code[p..]);
                p += n1;
                let (hi, n2) = utf8_decode(&code[p..]);
                p += n2;
                if ch >= lo && ch <= hi {
                    return true;
                }
            }
            recs::RANGE_ICASE => {
                let (lo, n1) = utf8_decode(&code[p..]);
                p += n1;
                let (hi, n2) = utf8_decode(&code[p..]);
                p += n2;
                let f = uni_tolower(ch);
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
                    hit |= ch == m;
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
                let v = ch as usize;
                if v < 0x80 && v >= base && v < base + nbytes * 8 {
                    let rel = v - base;
                    if code[p + rel / 8] & (1 << (rel % 8)) != 0 {
                        return true;
                    }
                }
                p += nbytes;
            }
            _ => {
                debug_assert!(recs::is_trait(cs));
                if char_has_trait(ch, cs - recs::ISX_MIN) {
                    return true;
                }
            }
        }
    }
}

// === Execution entry points ===

/// Match starting exactly at `exec.start`. Returns the number of bytes
/// matched, or `None` when the pattern does not match there.
pub fn exec_match(
    exec: &Exec<'_>,
    captures: Option<&mut [ReSpan]>,
) -> Result<Option<usize>, Error> {
    let avail = exec.end.saturating_sub(exec.start);
    if exec.code.minmatch > avail {
        return Ok(None);
    }
    match exec.input {
        Input::Bytes(buf) => run_match(
            exec,
            SingleCursor::new(buf, exec.start, exec.end, exec.extra),
            captures,
        ),
        Input::Chunks(chunks) => run_match(
            exec,
            ChunkedCursor::new(chunks, exec.start, exec.end, exec.extra),
            captures,
        ),
    }
}

fn run_match<C: Cursor>(
    exec: &Exec<'_>,
    cur: C,
    captures: Option<&mut [ReSpan]>,
) -> Result<Option<usize>, Error> {
    let mut interp = Interp::new(
        exec.code,
        cur,
        exec.flags,
        exec.max_failures,
        captures.is_some(),
        false,
    );
    match interp.exec()? {
        Outcome::Match => {
            if let Some(out) = captures {
                interp.copy_captures(out);
            }
            Ok(Some(interp.cur.offset().saturating_sub(exec.start)))
        }
        Outcome::NoMatch => Ok(None),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SearchKind {
    Forward,
    Backward,
    NoEpsilon,
}

/// Forward search: try increasing start offsets over the first
/// `search_range` positions of the window. Returns `(offset, length)`.
pub fn exec_search(
    exec: &Exec<'_>,
    search_range: usize,
    captures: Option<&mut [ReSpan]>,
) -> Result<Option<(usize, usize)>, Error> {
    dispatch_search(exec, search_range, captures, SearchKind::Forward)
}

/// Forward search that rejects zero-length matches and keeps scanning.
pub fn exec_search_noepsilon(
    exec: &Exec<'_>,
    search_range: usize,
    captures: Option<&mut [ReSpan]>,
) -> Result<Option<(usize, usize)>, Error> {
    dispatch_search(exec, search_range, captures, SearchKind::NoEpsilon)
}

/// Backward search: try decreasing start offsets from the end of the
/// window. Returns the greatest matching offset within range.
pub fn exec_rsearch(
    exec: &Exec<'_>,
    search_range: usize,
    captures: Option<&mut [ReSpan]>,
) -> Result<Option<(usize, usize)>, Error> {
    dispatch_search(exec, search_range, captures, SearchKind::Backward)
}

fn dispatch_search(
    exec: &Exec<'_>,
    search_range: usize,
    captures: Option<&mut [ReSpan]>,
    kind: SearchKind,
) -> Result<Option<(usize, usize)>, Error> {
    match exec.input {
        Input::Bytes(buf) => run_search(
            exec,
            SingleCursor::new(buf, exec.start, exec.end, exec.extra),
            search_range,
            captures,
            kind,
        ),
        Input::Chunks(chunks) => run_search(
            exec,
            ChunkedCursor::new(chunks, exec.start, exec.end, exec.extra),
            search_range,
            captures,
            kind,
        ),
    }
}

fn run_search<C: Cursor>(
    exec: &Exec<'_>,
    cur: C,
    search_range: usize,
    mut captures: Option<&mut [ReSpan]>,
    kind: SearchKind,
) -> Result<Option<(usize, usize)>, Error> {
    let code = exec.code;
    let avail = exec.end.saturating_sub(exec.start);
    let scan = match avail.checked_sub(code.minmatch) {
        Some(s) => s,
        None => return Ok(None), // window too small to ever match
    };
    // One past the last start offset, so the final position is still
    // attempted.
    let mut range = search_range.min(scan + 1);
    if range == 0 {
        return Ok(None);
    }

    let mut interp = Interp::new(
        code,
        cur,
        exec.flags,
        exec.max_failures,
        captures.is_some(),
        true,
    );
    let accel = FmapAccel::new(&code.fmap);

    let mut pos = match kind {
        SearchKind::Backward => exec.start + scan,
        _ => exec.start,
    };
    loop {
        if kind != SearchKind::Backward && code.minmatch > 0 {
            // Skip start positions whose first byte can never begin a
            // match.
            match interp
                .cur
                .find_candidate(&code.fmap, &accel, pos, pos + range)
            {
                Some(p) => {
                    range -= p - pos;
                    pos = p;
                }
                None => return Ok(None),
            }
        }

        interp.cur.set_offset(pos);
        match interp.exec()? {
            Outcome::Match => {
                let len = interp.cur.offset() - pos;
                if kind == SearchKind::NoEpsilon && len == 0 {
                    // Reject the epsilon match and continue the scan.
                    interp.onfail.clear();
                    if !interp.groups.is_empty() {
                        interp.groups.fill(ReSpan::UNSET_SPAN);
                    }
                } else {
                    if let Some(out) = captures.as_deref_mut() {
                        interp.copy_captures(out);
                    }
                    return Ok(Some((pos, len)));
                }
            }
            Outcome::NoMatch => {}
        }

        range -= 1;
        if range == 0 {
            return Ok(None);
        }
        match kind {
            SearchKind::Backward => pos -= 1,
            _ => pos += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regcomp::compile;
    use crate::regsyntax::{Syntax, SYNTAX_POSIX_EXTENDED};

    fn ere(pat: &str) -> ReCode {
        compile(pat, SYNTAX_POSIX_EXTENDED).unwrap()
    }

    fn match_len(pat: &str, input: &str) -> Option<usize> {
        let code = ere(pat);
        let exec = Exec::new(&code, Input::Bytes(input.as_bytes()));
        exec_match(&exec, None).unwrap()
    }

    #[test]
    fn exact_match_basics() {
        assert_eq!(match_len("abc", "abcdef"), Some(3));
        assert_eq!(match_len("abc", "abx"), None);
        assert_eq!(match_len("", "anything"), Some(0));
    }

    #[test]
    fn greedy_star_without_backtracking() {
        assert_eq!(match_len("a*", "aaa"), Some(3));
        assert_eq!(match_len("a*", "baaa"), Some(0));
    }

    #[test]
    fn star_gives_back_bytes() {
        assert_eq!(match_len("a*a", "aaa"), Some(3));
        assert_eq!(match_len("a*ab", "aab"), Some(3));
    }

    #[test]
    fn intervals_exact_and_ranged() {
        assert_eq!(match_len("a{3}", "aaaa"), Some(3));
        assert_eq!(match_len("a{3}", "aa"), None);
        assert_eq!(match_len("a{2,4}", "aaaaa"), Some(4));
        assert_eq!(match_len("a{2,}", "aaaaa"), Some(5));
        assert_eq!(match_len("a{0,2}", "aaa"), Some(2));
    }

    #[test]
    fn alternation_and_groups() {
        let code = ere("(ab|a)(c)");
        let input = b"abc";
        let mut caps = [ReSpan::UNSET_SPAN; 2];
        let exec = Exec::new(&code, Input::Bytes(input));
        let r = exec_match(&exec, Some(&mut caps)).unwrap();
        assert_eq!(r, Some(3));
        assert_eq!(caps[0], ReSpan { start: 0, end: 2 });
        assert_eq!(caps[1], ReSpan { start: 2, end: 3 });
    }

    #[test]
    fn posix_longest_alternation() {
        // Both "a"+"bcd" and "ab"+"c"+"d" reach the overall end 4; the
        // group-priority tie break prefers the later end of group 0.
        let code = ere("(a|ab)(c|bcd)(d*)");
        let input = b"abcd";
        let mut caps = [ReSpan::UNSET_SPAN; 3];
        let exec = Exec::new(&code, Input::Bytes(input));
        let r = exec_match(&exec, Some(&mut caps)).unwrap();
        assert_eq!(r, Some(4));
        assert_eq!(caps[0], ReSpan { start: 0, end: 2 });
        assert_eq!(caps[1], ReSpan { start: 2, end: 3 });
        assert_eq!(caps[2], ReSpan { start: 3, end: 4 });
    }

    #[test]
    fn backref_repeats_captured_bytes() {
        let code = ere(r"(a)\1");
        let exec = Exec::new(&code, Input::Bytes(b"aa"));
        let mut caps = [ReSpan::UNSET_SPAN; 1];
        assert_eq!(exec_match(&exec, Some(&mut caps)).unwrap(), Some(2));
        assert_eq!(caps[0], ReSpan { start: 0, end: 1 });

        let exec = Exec::new(&code, Input::Bytes(b"ab"));
        assert_eq!(exec_match(&exec, None).unwrap(), None);
    }

    #[test]
    fn forward_search_finds_first() {
        let code = ere("b+");
        let exec = Exec::new(&code, Input::Bytes(b"aaabbbccbb"));
        let r = exec_search(&exec, usize::MAX, None).unwrap();
        assert_eq!(r, Some((3, 3)));
    }

    #[test]
    fn reverse_search_finds_last() {
        let code = ere("b+");
        let exec = Exec::new(&code, Input::Bytes(b"aaabbbccbb"));
        let r = exec_rsearch(&exec, usize::MAX, None).unwrap();
        // Greatest start offset where b+ still matches.
        assert_eq!(r, Some((9, 1)));
    }

    #[test]
    fn noepsilon_skips_empty_matches() {
        let code = ere("x*");
        let exec = Exec::new(&code, Input::Bytes(b"aaxxa"));
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((0, 0)));
        assert_eq!(
            exec_search_noepsilon(&exec, usize::MAX, None).unwrap(),
            Some((2, 2))
        );
    }

    #[test]
    fn anchors() {
        let code = ere("^b");
        let exec = Exec::new(&code, Input::Bytes(b"abc"));
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), None);

        let exec = Exec::new(&code, Input::Bytes(b"a\nbc"));
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((2, 1)));

        let code = ere("c$");
        let exec = Exec::new(&code, Input::Bytes(b"abc"));
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((2, 1)));
    }

    #[test]
    fn notbol_suppresses_line_start() {
        let code = ere("^a");
        let mut exec = Exec::new(&code, Input::Bytes(b"abc"));
        exec.flags = ExecFlags::NOTBOL;
        assert_eq!(exec_match(&exec, None).unwrap(), None);
        // After a real newline NOTBOL does not matter.
        let mut exec = Exec::new(&code, Input::Bytes(b"x\nabc"));
        exec.flags = ExecFlags::NOTBOL;
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((2, 1)));
    }

    #[test]
    fn extra_virtual_bytes_defeat_eoi() {
        let code = ere("c$");
        let mut exec = Exec::new(&code, Input::Bytes(b"abc"));
        exec.extra = 5;
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), None);
    }

    #[test]
    fn word_boundaries() {
        let code = compile(r"\bfoo\b", SYNTAX_POSIX_EXTENDED).unwrap();
        let exec = Exec::new(&code, Input::Bytes(b"a foo bar"));
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((2, 3)));
        let exec = Exec::new(&code, Input::Bytes(b"food"));
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), None);
    }

    #[test]
    fn case_insensitive_is_symmetric() {
        let code = compile("A", SYNTAX_POSIX_EXTENDED.union(Syntax::ICASE)).unwrap();
        for input in [&b"A"[..], &b"a"[..]] {
            let exec = Exec::new(&code, Input::Bytes(input));
            assert_eq!(exec_match(&exec, None).unwrap(), Some(1));
        }
        let code = ere("A");
        let exec = Exec::new(&code, Input::Bytes(b"a"));
        assert_eq!(exec_match(&exec, None).unwrap(), None);
    }

    #[test]
    fn unicode_dot_consumes_whole_char() {
        let code = ere(".");
        let exec = Exec::new(&code, Input::Bytes("ä".as_bytes()));
        assert_eq!(exec_match(&exec, None).unwrap(), Some(2));
    }

    #[test]
    fn charset_runtime_classes() {
        let code = ere("[[:digit:]]+");
        let exec = Exec::new(&code, Input::Bytes(b"ab1234x"));
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((2, 4)));
    }

    #[test]
    fn chunked_input_matches_like_contiguous() {
        let code = ere("bcd");
        let chunks: &[&[u8]] = &[b"ab", b"cde"];
        let exec = Exec::new(&code, Input::Chunks(chunks));
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((1, 3)));
    }

    #[test]
    fn chunked_utf8_across_boundary() {
        let bytes = "xäy".as_bytes(); // [x, c3, a4, y]
        let chunks: &[&[u8]] = &[&bytes[..2], &bytes[2..]];
        let code = ere("x.y");
        let exec = Exec::new(&code, Input::Chunks(chunks));
        assert_eq!(exec_match(&exec, None).unwrap(), Some(4));
    }

    #[test]
    fn stack_ceiling_is_reported() {
        // Nested unbounded loops over a long input explode the failure
        // stack; the ceiling must surface as an error, not a hang.
        let code = ere("(a*)*b");
        let input = vec![b'a'; 4096];
        let mut exec = Exec::new(&code, Input::Bytes(&input));
        exec.max_failures = MIN_FAILURES;
        assert_eq!(exec_match(&exec, None).unwrap_err(), Error::StackLimit);
    }

    #[test]
    fn capture_invariants() {
        let code = ere("(a+)(b*)(c?)");
        let mut caps = [ReSpan::UNSET_SPAN; 3];
        let exec = Exec::new(&code, Input::Bytes(b"aac"));
        let r = exec_match(&exec, Some(&mut caps)).unwrap();
        assert_eq!(r, Some(3));
        for c in &caps {
            assert!(c.is_set());
            assert!(c.start <= c.end);
        }
        assert_eq!(caps[1], ReSpan { start: 2, end: 2 });
        assert_eq!(caps[2], ReSpan { start: 2, end: 3 });
    }

    #[test]
    fn fastmap_soundness_against_unfiltered_engine() {
        // Ground truth: the same code object with a neutered fastmap
        // (every byte enters at offset 0). Any byte the real fastmap
        // rejects must not produce a consuming match there.
        for pat in ["abc", "a|bc", "[a-f]x", "a*b", "^x|y$", "(foo|bar)+", "ä|b"] {
            let code = ere(pat);
            let mut ground = ere(pat);
            ground.fmap = [0; 256];
            for first in 0..=255u8 {
                if code.fastmap()[first as usize] != FMAP_MISS {
                    continue;
                }
                for tail in [&b""[..], b"a", b"bcd"] {
                    let mut probe = vec![first];
                    probe.extend_from_slice(tail);
                    let exec = Exec::new(&ground, Input::Bytes(&probe));
                    let hit = exec_match(&exec, None).unwrap();
                    assert!(
                        hit.is_none() || hit == Some(0),
                        "{:?}: fastmap wrongly rejects {:#04x}",
                        pat,
                        first
                    );
                }
            }
        }
    }

    #[test]
    fn search_window_clamps() {
        let code = ere("cd");
        let mut exec = Exec::new(&code, Input::Bytes(b"abcdef"));
        exec.start = 0;
        exec.end = 3; // window "abc": "cd" cannot fit
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), None);
        exec.end = 4;
        assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((2, 2)));
    }
}
