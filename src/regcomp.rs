// regcomp.rs - Single-pass pattern compiler.
//
// No AST: each construct writes bytecode for itself as soon as it is
// recognized, and later constructs (repetition suffixes, alternation)
// rewrite or relocate the already-emitted code of the preceding
// subexpression. All positions inside the buffer are byte offsets, never
// pointers, so relocation during growth is free.
//
// Layout of the emitted control code (labels are code offsets):
//
//   "X|Y"       JMP_ONFAIL 1f; <X>; MAYBE_POP_ONFAIL; JMP 2f
//            1: <Y>
//            2:
//   "X*"        JMP_ONFAIL 2f
//            1: <X>
//               MAYBE_POP_ONFAIL
//               JMP_AND_RETURN_ONFAIL 1b
//            2:
//   "X{n,m}"    SETVAR v1=n-1; SETVAR v2=m-n
//            1: JMP_ONFAIL_DUMMY_AT 3f
//            2: <X>
//               MAYBE_POP_ONFAIL
//               DEC_JMP v1, 1b
//               DEC_JMP_AND_RETURN_ONFAIL v2, 2b
//            3:
//
// Trailing jumps of an alternation are threaded through chains of further
// unconditional jumps, and the MAYBE_POP_ONFAIL placeholders are finalized
// by a peephole pass once every exit target exists.

use smallvec::SmallVec;

use crate::error::Error;
use crate::regenc::{
    byte_has_trait, uni_tolower, uni_toupper, utf8_encode, utf8_seqlen, TRAIT_DIGIT, TRAIT_LF,
    TRAIT_SPACE, TRAIT_SYMCONT, UTF8_CURLEN,
};
use crate::regfast;
use crate::regint::*;
use crate::regparse::{parse_interval, Parser, Token};
use crate::regsyntax::Syntax;

/// Max number of prefix bytes replicated in front of every branch of a
/// leading alternation so the fastmap can dispatch per branch.
const ALTERNATION_PREFIX_MAXLEN: usize = 16;

/// When a charset holds at most this many ASCII bytes next to its code
/// points, the whole set is encoded as one CONTAINS list.
const CONTAINS_UTF8_MAX_ASCII_COUNT: usize = 4;

/// Minimum run of ASCII characters worth splitting out of a
/// case-insensitive UTF-8 literal into the cheaper ASCII encoding.
const UTF8_ICASE_ASCII_CHUNK_THRESHOLD: usize = 16;

const GRPINFO_DEFINED: u8 = 1 << 0;
const GRPINFO_EPSILON: u8 = 1 << 1;
/// Group-status cache size: back references only reach groups 1..=9.
const GRPINFO_COUNT: usize = 9;

type Result<T> = std::result::Result<T, Error>;

/// Outcome of compiling one prefix expression.
#[derive(PartialEq, Eq, Clone, Copy)]
enum PrefixStatus {
    Plain,
    /// The prefix ended with a group (or group back reference) whose body
    /// can match the empty string.
    EpsilonGroup,
}

/// Compile `pattern` under `syntax` into an executable code object.
pub fn compile(pattern: &str, syntax: Syntax) -> Result<ReCode> {
    compile_bytes(pattern.as_bytes(), syntax)
}

/// Byte-slice entry point; `pattern` need not be valid UTF-8 when the
/// `NO_UTF8` syntax flag is set.
pub fn compile_bytes(pattern: &[u8], syntax: Syntax) -> Result<ReCode> {
    let mut c = Compiler {
        parser: Parser::new(pattern, syntax),
        buf: Vec::new(),
        estart: 0,
        ngroups: 0,
        nvars: 0,
        flags: CodeFlags::empty(),
        grpinfo: [0; GRPINFO_COUNT],
    };

    c.compile_alternation(&[])?;

    match c.parser.next_token() {
        Token::Eof => {}
        Token::EndGroup => return Err(Error::UnmatchedCloseParen),
        Token::UnmatchedBackslash => return Err(Error::TrailingBackslash),
        Token::IllegalSeq => return Err(Error::IllegalSequence),
        _ => return Err(Error::BadPattern),
    }

    let finish = if syntax.contains(Syntax::NO_POSIX_BACKTRACKING) {
        reop::MATCHED_PERFECT
    } else {
        reop::MATCHED
    };
    c.putc(finish)?;

    peephole(&mut c.buf);

    let mut flags = c.flags;
    if c.ngroups > 0 {
        flags |= CodeFlags::OPTGROUPS;
    }
    let mut code = ReCode {
        code: c.buf,
        ngroups: c.ngroups as u16,
        nvars: c.nvars as u16,
        flags,
        fmap: [FMAP_MISS; 256],
        minmatch: 0,
    };
    regfast::analyze(&mut code);
    Ok(code)
}

struct Compiler<'p> {
    parser: Parser<'p>,
    buf: Vec<u8>,
    /// Offset of the start of the most recent (sub-)expression; a
    /// repetition suffix wraps `buf[estart..]`.
    estart: usize,
    ngroups: usize,
    nvars: usize,
    flags: CodeFlags,
    /// Defined/epsilon status for the first groups, consulted when a back
    /// reference names them.
    grpinfo: [u8; GRPINFO_COUNT],
}

// === Transient charset accumulator ===

struct Charset {
    /// Raw bytes and ASCII characters.
    bytes: BitSet,
    /// One bit per trait class (`regenc::TRAIT_*` index).
    classes: u32,
    /// Explicit non-ASCII code points, sorted and de-duplicated.
    uchars: SmallVec<[char; 8]>,
    negate: bool,
}

impl Charset {
    fn new() -> Self {
        Charset {
            bytes: BITSET_EMPTY,
            classes: 0,
            uchars: SmallVec::new(),
            negate: false,
        }
    }

    fn add_class(&mut self, class: u8) {
        self.classes |= 1 << class;
    }

    fn insert_uchar(&mut self, c: char) {
        if let Err(at) = self.uchars.binary_search(&c) {
            self.uchars.insert(at, c);
        }
    }
}

impl<'p> Compiler<'p> {
    #[inline]
    fn has(&self, flag: Syntax) -> bool {
        self.parser.syntax.contains(flag)
    }

    // === Code emission ===

    fn putc(&mut self, b: u8) -> Result<()> {
        if self.buf.len() >= RE_COMP_MAXSIZE {
            return Err(Error::PatternTooLarge);
        }
        self.buf.push(b);
        Ok(())
    }

    fn putn(&mut self, bytes: &[u8]) -> Result<()> {
        if self.buf.len() + bytes.len() > RE_COMP_MAXSIZE {
            return Err(Error::PatternTooLarge);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a 16-bit displacement operand.
    fn putw(&mut self, delta: i32) -> Result<()> {
        let at = self.buf.len();
        self.putn(&[0, 0])?;
        delta16_set(&mut self.buf, at, delta);
        Ok(())
    }

    /// Open `n` bytes of space at `at`, shifting everything behind it.
    fn insert_gap(&mut self, at: usize, n: usize) -> Result<()> {
        if self.buf.len() + n > RE_COMP_MAXSIZE {
            return Err(Error::PatternTooLarge);
        }
        self.buf.splice(at..at, std::iter::repeat(0u8).take(n));
        Ok(())
    }

    fn allocvar(&mut self) -> Result<u8> {
        if self.nvars >= MAX_VARS {
            return Err(Error::PatternTooLarge);
        }
        let id = self.nvars as u8;
        self.nvars += 1;
        Ok(id)
    }

    // === Literals ===

    fn compile_literal_byte(&mut self, b: u8) -> Result<()> {
        if self.has(Syntax::ICASE) {
            let lower = b.to_ascii_lowercase();
            let upper = b.to_ascii_uppercase();
            if lower != upper {
                self.putc(reop::BYTE2)?;
                self.putc(lower.min(upper))?;
                self.putc(lower.max(upper))?;
                return Ok(());
            }
        }
        self.putc(reop::BYTE)?;
        self.putc(b)
    }

    fn compile_literal_uni(&mut self, c: char) -> Result<()> {
        let mut utf8 = [0u8; UTF8_CURLEN];
        let len = utf8_encode(c, &mut utf8);
        if len == 1 {
            return self.compile_literal_byte(utf8[0]);
        }

        if self.has(Syntax::ICASE) {
            let mut chars: SmallVec<[char; 4]> = SmallVec::new();
            chars.push(c);
            for folded in [uni_tolower(c), uni_toupper(c)] {
                if !chars.contains(&folded) {
                    chars.push(folded);
                }
            }
            if chars.len() > 1 {
                chars.sort_unstable();
                self.putc(reop::CONTAINS_UTF8)?;
                self.putc(chars.len() as u8)?;
                for fc in chars {
                    let mut fb = [0u8; UTF8_CURLEN];
                    let fl = utf8_encode(fc, &mut fb);
                    self.putn(&fb[..fl])?;
                }
                return Ok(());
            }
        }

        self.putc(reop::EXACT)?;
        self.putc(len as u8)?;
        self.putn(&utf8[..len])
    }

    /// Emit an exact byte run, splitting at the per-instruction limit.
    fn compile_literal_byte_seq(&mut self, mut bytes: &[u8]) -> Result<()> {
        let opcode = if self.has(Syntax::ICASE) {
            reop::EXACT_ICASE_ASCII
        } else {
            reop::EXACT
        };
        while bytes.len() > u8::MAX as usize {
            self.putc(opcode)?;
            self.putc(u8::MAX)?;
            self.putn(&bytes[..u8::MAX as usize])?;
            bytes = &bytes[u8::MAX as usize..];
        }
        if bytes.len() >= 2 {
            self.putc(opcode)?;
            self.putc(bytes.len() as u8)?;
            self.putn(bytes)?;
        } else if bytes.len() == 1 {
            return self.compile_literal_byte(bytes[0]);
        }
        Ok(())
    }

    /// Emit an unescaped literal run. `nchars` counts characters, not
    /// bytes. Case-insensitive UTF-8 runs are chunked so that long ASCII
    /// stretches use the cheaper ASCII-folding instruction.
    fn compile_unescaped_literal_seq(
        &mut self,
        bytes: &[u8],
        mut nchars: usize,
        is_utf8: bool,
    ) -> Result<()> {
        if !is_utf8 || !self.has(Syntax::ICASE) {
            return self.compile_literal_byte_seq(bytes);
        }

        let mut pos = 0usize;
        while nchars > 0 {
            // Peel a leading all-ASCII stretch when it is long enough.
            let mut ascii_run = 0usize;
            while pos + ascii_run < bytes.len() && bytes[pos + ascii_run] < 0x80 {
                ascii_run += 1;
            }
            if ascii_run >= UTF8_ICASE_ASCII_CHUNK_THRESHOLD {
                self.compile_literal_byte_seq(&bytes[pos..pos + ascii_run])?;
                pos += ascii_run;
                nchars -= ascii_run;
                if nchars == 0 {
                    break;
                }
            }

            // Collect a UTF-8 chunk, stopping at the next long ASCII
            // stretch or at the per-instruction character limit.
            let chunk_start = pos;
            let mut chunk_chars = 0usize;
            while chunk_chars < nchars && chunk_chars < u8::MAX as usize && pos < bytes.len() {
                if bytes[pos] < 0x80 {
                    let mut run_end = pos + 1;
                    while run_end < bytes.len()
                        && bytes[run_end] < 0x80
                        && run_end - pos < UTF8_ICASE_ASCII_CHUNK_THRESHOLD
                    {
                        run_end += 1;
                    }
                    if run_end - pos >= UTF8_ICASE_ASCII_CHUNK_THRESHOLD {
                        break;
                    }
                    let mut take = run_end - pos;
                    if chunk_chars + take > u8::MAX as usize {
                        take = u8::MAX as usize - chunk_chars;
                    }
                    pos += take;
                    chunk_chars += take;
                    continue;
                }
                pos += utf8_seqlen(bytes[pos]).max(1);
                chunk_chars += 1;
            }

            self.putc(reop::EXACT_ICASE_UTF8)?;
            self.putc(chunk_chars as u8)?;
            if self.buf.len() + (pos - chunk_start) > RE_COMP_MAXSIZE {
                return Err(Error::PatternTooLarge);
            }
            self.buf.extend_from_slice(&bytes[chunk_start..pos]);
            nchars -= chunk_chars;
        }
        Ok(())
    }

    /// Compile the literal sequence `pat[start..end]` holding `length`
    /// characters. `first` is the already-decoded first token, used when
    /// the sequence is a single character.
    fn compile_literal_seq(
        &mut self,
        start: usize,
        end: usize,
        length: usize,
        first: Token,
        hasesc: bool,
        is_utf8: bool,
    ) -> Result<()> {
        debug_assert!(length >= 1);
        if length == 1 {
            return match first {
                Token::Byte(b) => self.compile_literal_byte(b),
                Token::Char(c) => self.compile_literal_uni(c),
                _ => Err(Error::BadPattern),
            };
        }

        if hasesc {
            // Re-yield the tokens and write out their raw byte values.
            let saved = self.parser.pos;
            self.parser.pos = start;
            let mut bytes: Vec<u8> = Vec::with_capacity(end - start);
            while self.parser.pos < end {
                match self.parser.next_token() {
                    Token::Byte(b) => bytes.push(b),
                    Token::Char(c) => {
                        if (c as u32) >= 0x80 && is_utf8 {
                            let mut ub = [0u8; UTF8_CURLEN];
                            let ul = utf8_encode(c, &mut ub);
                            bytes.extend_from_slice(&ub[..ul]);
                        } else {
                            bytes.push(c as u8);
                        }
                    }
                    _ => return Err(Error::BadPattern),
                }
            }
            self.parser.pos = saved;
            self.compile_unescaped_literal_seq(&bytes, length, is_utf8)
        } else {
            let bytes = self.parser.pat[start..end].to_vec();
            self.compile_unescaped_literal_seq(&bytes, length, is_utf8)
        }
    }

    // === Bracket expressions ===

    fn add_uchar(&mut self, cs: &mut Charset, c: char) {
        if (c as u32) < 0x80 {
            bitset_set(&mut cs.bytes, c as usize);
        } else if self.has(Syntax::ICASE) {
            cs.insert_uchar(c);
            cs.insert_uchar(uni_tolower(c));
            cs.insert_uchar(uni_toupper(c));
        } else {
            cs.insert_uchar(c);
        }
    }

    /// Emit `RANGE lo, hi` (case-folded under ICASE) into the charset's
    /// sub-instruction stream.
    fn gen_cs_range(&mut self, lo: char, hi: char) -> Result<()> {
        self.putc(if self.has(Syntax::ICASE) {
            recs::RANGE_ICASE
        } else {
            recs::RANGE
        })?;
        for c in [lo, hi] {
            let mut b = [0u8; UTF8_CURLEN];
            let n = utf8_encode(c, &mut b);
            self.putn(&b[..n])?;
        }
        Ok(())
    }

    /// Parse the body of a bracket expression (cursor past the `[`) into
    /// `cs`, emitting range sub-instructions directly.
    fn parse_charset(&mut self, cs: &mut Charset) -> Result<()> {
        if self.parser.pos < self.parser.pat.len() && self.parser.pat[self.parser.pos] == b'^' {
            cs.negate = true;
            self.parser.pos += 1;
        }
        // ']' or '-' right after the opening bracket is a literal.
        if let Some(&b @ (b']' | b'-')) = self.parser.pat.get(self.parser.pos) {
            bitset_set(&mut cs.bytes, b as usize);
            self.parser.pos += 1;
        }

        'next: loop {
            if self.parser.pos >= self.parser.pat.len() {
                return Err(Error::UnexpectedEof);
            }
            let ch = self.parser.pat[self.parser.pos];
            self.parser.pos += 1;
            match ch {
                b']' => return self.finish_charset(cs),

                b'[' => {
                    let peek = *self.parser.pat.get(self.parser.pos).unwrap_or(&0);
                    if self.has(Syntax::CHAR_CLASSES) && peek == b':' {
                        self.parse_charclass_name(cs)?;
                        continue 'next;
                    }
                    if peek == b'.' || peek == b'=' {
                        let collmode = peek;
                        self.parser.pos += 1;
                        let lo = self.parser.next_collating_char();
                        match lo {
                            Token::Eof => return Err(Error::UnexpectedEof),
                            Token::IllegalSeq => return Err(Error::IllegalSequence),
                            Token::UnmatchedBackslash => return Err(Error::TrailingBackslash),
                            _ => {}
                        }
                        if self.parser.pat.get(self.parser.pos) != Some(&collmode) {
                            return Err(Error::BadCollatingElement);
                        }
                        self.parser.pos += 1;
                        if self.parser.pat.get(self.parser.pos) != Some(&b']') {
                            return Err(Error::UnmatchedBracket);
                        }
                        self.parser.pos += 1;
                        match lo {
                            Token::Byte(b) => self.encode_cs_byte(cs, b)?,
                            Token::Char(c) => self.encode_cs_uchar(cs, c)?,
                            _ => unreachable!(),
                        }
                        continue 'next;
                    }
                    self.encode_cs_byte(cs, b'[')?;
                }

                b'\\' => {
                    if !self.has(Syntax::BACKSLASH_ESCAPE_IN_LISTS) {
                        self.encode_cs_byte(cs, b'\\')?;
                        continue 'next;
                    }
                    if self.parser.pos >= self.parser.pat.len() {
                        return Err(Error::TrailingBackslash);
                    }
                    let esc = self.parser.pat[self.parser.pos];
                    self.parser.pos += 1;
                    if !self.has(Syntax::NO_VENDOR_OPS) {
                        match esc {
                            b'w' => {
                                cs.add_class(TRAIT_SYMCONT);
                                continue 'next;
                            }
                            b'n' => {
                                cs.add_class(TRAIT_LF);
                                continue 'next;
                            }
                            b's' => {
                                cs.add_class(TRAIT_SPACE);
                                continue 'next;
                            }
                            b'd' => {
                                cs.add_class(TRAIT_DIGIT);
                                continue 'next;
                            }
                            b'u' if self.parser.pat.get(self.parser.pos) == Some(&b'{')
                                && !self.has(Syntax::NO_UTF8) =>
                            {
                                let last = self.parse_uchar_braces(cs)?;
                                self.encode_cs_uchar(cs, last)?;
                                continue 'next;
                            }
                            b'0' | b'x' | b'u' | b'U' => {
                                self.parser.pos -= 2;
                                match self.parser.next_cs_literal() {
                                    Token::Byte(b) => self.encode_cs_byte(cs, b)?,
                                    Token::Char(c) => self.encode_cs_uchar(cs, c)?,
                                    Token::IllegalSeq => return Err(Error::IllegalSequence),
                                    Token::UnmatchedBackslash => {
                                        return Err(Error::TrailingBackslash)
                                    }
                                    _ => return Err(Error::UnexpectedEof),
                                }
                                continue 'next;
                            }
                            _ => {}
                        }
                    }
                    if esc >= 0x80 {
                        self.parser.pos -= 1;
                        self.encode_cs_literal_at_cursor(cs)?;
                    } else {
                        self.encode_cs_byte(cs, esc)?;
                    }
                }

                _ => {
                    if ch >= 0x80 && !self.has(Syntax::NO_UTF8) {
                        self.parser.pos -= 1;
                        self.encode_cs_literal_at_cursor(cs)?;
                    } else {
                        self.encode_cs_byte(cs, ch)?;
                    }
                }
            }
        }
    }

    fn parse_charclass_name(&mut self, cs: &mut Charset) -> Result<()> {
        // Cursor sits on the ':' after '['.
        self.parser.pos += 1;
        let start = self.parser.pos;
        let rest = &self.parser.pat[start..];
        let len = match rest.iter().position(|&b| b == b':') {
            Some(n) => n,
            None => return Err(Error::UnexpectedEof),
        };
        let name = &rest[..len];
        let mut class = charclass_find(name).ok_or(Error::BadCharClass)?;
        if self.has(Syntax::ICASE)
            && matches!(
                class,
                crate::regenc::TRAIT_UPPER | crate::regenc::TRAIT_LOWER | crate::regenc::TRAIT_TITLE
            )
        {
            class = crate::regenc::TRAIT_ALNUM;
        }
        self.parser.pos = start + len + 1;
        if self.parser.pat.get(self.parser.pos) != Some(&b']') {
            return Err(Error::BadPattern);
        }
        self.parser.pos += 1;
        cs.add_class(class);
        Ok(())
    }

    /// Parse `\u{...}` with one or more whitespace-separated ordinals.
    /// All but the last are added directly; the last is returned so it
    /// can participate in range syntax.
    fn parse_uchar_braces(&mut self, cs: &mut Charset) -> Result<char> {
        self.parser.pos += 1; // '{'
        loop {
            while self
                .parser
                .pat
                .get(self.parser.pos)
                .is_some_and(|b| b.is_ascii_whitespace())
            {
                self.parser.pos += 1;
            }
            let mut ord: u32 = 0;
            let mut ndigits = 0usize;
            while let Some(d) = self
                .parser
                .pat
                .get(self.parser.pos)
                .and_then(|&b| (b as char).to_digit(16))
            {
                ord = ord.checked_mul(16).ok_or(Error::IllegalSequence)?;
                ord = ord.checked_add(d).ok_or(Error::IllegalSequence)?;
                self.parser.pos += 1;
                ndigits += 1;
            }
            if ndigits == 0 {
                return Err(if self.parser.pos >= self.parser.pat.len() {
                    Error::UnexpectedEof
                } else {
                    Error::IllegalSequence
                });
            }
            let c = char::from_u32(ord).ok_or(Error::IllegalSequence)?;
            while self
                .parser
                .pat
                .get(self.parser.pos)
                .is_some_and(|b| b.is_ascii_whitespace())
            {
                self.parser.pos += 1;
            }
            match self.parser.pat.get(self.parser.pos) {
                Some(&b'}') => {
                    self.parser.pos += 1;
                    return Ok(c);
                }
                Some(_) => self.add_uchar(cs, c),
                None => return Err(Error::UnexpectedEof),
            }
        }
    }

    /// Decode the UTF-8 character at the cursor and feed it to the
    /// code-point encoder.
    fn encode_cs_literal_at_cursor(&mut self, cs: &mut Charset) -> Result<()> {
        match self.parser.next_cs_literal() {
            Token::Char(c) => self.encode_cs_uchar(cs, c),
            Token::Byte(b) => self.encode_cs_byte(cs, b),
            Token::IllegalSeq => Err(Error::IllegalSequence),
            _ => Err(Error::UnexpectedEof),
        }
    }

    /// True when the cursor sits on a `-` that denotes a range.
    fn at_range_dash(&self) -> bool {
        self.parser.pat.get(self.parser.pos) == Some(&b'-')
            && self.parser.pat.get(self.parser.pos + 1) != Some(&b']')
            && self.parser.pat.get(self.parser.pos + 1).is_some()
    }

    fn encode_cs_uchar(&mut self, cs: &mut Charset, lo: char) -> Result<()> {
        if (lo as u32) < 0x80 {
            return self.encode_cs_byte(cs, lo as u8);
        }
        if self.at_range_dash() {
            self.parser.pos += 1;
            let hi = match self.parser.next_cs_literal() {
                Token::Char(c) => c,
                Token::Byte(_) => {
                    // "[ä-\xAB]" mixes a code point with a raw byte.
                    return self.bad_range(cs);
                }
                Token::IllegalSeq => return Err(Error::IllegalSequence),
                Token::UnmatchedBackslash => return Err(Error::TrailingBackslash),
                _ => return Err(Error::UnexpectedEof),
            };
            return self.encode_uchar_range(cs, lo, hi);
        }
        self.add_uchar(cs, lo);
        Ok(())
    }

    fn encode_uchar_range(&mut self, cs: &mut Charset, mut lo: char, mut hi: char) -> Result<()> {
        if hi < lo {
            return self.bad_range(cs);
        }
        if self.has(Syntax::ICASE) {
            lo = uni_tolower(lo);
            hi = uni_tolower(hi);
            if lo > hi {
                std::mem::swap(&mut lo, &mut hi);
            }
        }
        if lo == hi {
            self.add_uchar(cs, lo);
            return Ok(());
        }
        self.gen_cs_range(lo, hi)
    }

    fn bad_range(&mut self, _cs: &mut Charset) -> Result<()> {
        if self.has(Syntax::NO_EMPTY_RANGES) {
            return Err(Error::BadRange);
        }
        Ok(()) // empty range matches nothing
    }

    fn encode_cs_byte(&mut self, cs: &mut Charset, lo: u8) -> Result<()> {
        if self.at_range_dash() {
            self.parser.pos += 1;
            let hi = match self.parser.next_cs_literal() {
                Token::Byte(b) => b,
                Token::Char(c) if (c as u32) >= 0x80 => {
                    // "[a-ä]" promotes to a code-point range.
                    if lo >= 0x80 {
                        return self.bad_range(cs);
                    }
                    return self.encode_uchar_range(cs, lo as char, c);
                }
                Token::Char(c) => c as u8,
                Token::IllegalSeq => return Err(Error::IllegalSequence),
                Token::UnmatchedBackslash => return Err(Error::TrailingBackslash),
                _ => return Err(Error::UnexpectedEof),
            };
            if hi < lo {
                return self.bad_range(cs);
            }
            bitset_set_range(&mut cs.bytes, lo, hi);
        } else {
            bitset_set(&mut cs.bytes, lo as usize);
        }
        Ok(())
    }

    /// Post-parse fixups shared by every bracket expression.
    fn finish_charset(&mut self, cs: &mut Charset) -> Result<()> {
        // Byte-oriented patterns cannot defer trait classes to run time;
        // hard-code their ASCII expansion into the bitset.
        if self.has(Syntax::NO_UTF8) {
            debug_assert!(cs.uchars.is_empty());
            for class in 0..crate::regenc::TRAIT_COUNT as u8 {
                if cs.classes & (1 << class) != 0 {
                    for b in 0u8..128 {
                        if byte_has_trait(b, class) {
                            bitset_set(&mut cs.bytes, b as usize);
                        }
                    }
                }
            }
            cs.classes = 0;
        }

        // Case-insensitivity merges the two ASCII letter banks.
        if self.has(Syntax::ICASE) {
            for b in 0x41u8..=0x5a {
                if bitset_at(&cs.bytes, b as usize) || bitset_at(&cs.bytes, (b | 0x20) as usize) {
                    bitset_set(&mut cs.bytes, b as usize);
                    bitset_set(&mut cs.bytes, (b | 0x20) as usize);
                }
            }
        }

        // Negated lists implicitly exclude the newline under this flag.
        if self.has(Syntax::HAT_LISTS_NOT_NEWLINE) && cs.negate {
            if self.has(Syntax::NO_UTF8) {
                bitset_set(&mut cs.bytes, 0x0a);
                bitset_set(&mut cs.bytes, 0x0d);
            } else {
                cs.add_class(TRAIT_LF);
            }
        }
        Ok(())
    }

    /// Compile a full bracket expression, choosing the cheapest encoding
    /// for the parsed contents.
    fn compile_charset(&mut self) -> Result<()> {
        let start = self.buf.len();
        self.putc(0)?; // reserved for the leading charset opcode
        let mut cs = Charset::new();
        self.parse_charset(&mut cs)?;

        let byte_mode = self.has(Syntax::NO_UTF8)
            || (!cs.negate
                && self.buf.len() == start + 1
                && cs.uchars.is_empty()
                && cs.classes == 0);

        if byte_mode {
            self.buf[start] = reop::CS_BYTE;
        } else {
            self.buf[start] = if cs.negate { reop::NCS_UTF8 } else { reop::CS_UTF8 };
            // A byte-oriented test and a decode-then-compare test are not
            // commensurable inside one class.
            if bitset_any_range(&cs.bytes, 0x80, 0xff) {
                return Err(Error::IllegalCharset);
            }
        }

        // Compact encodings when the whole class is a plain byte set.
        if byte_mode && self.buf.len() == start + 1 {
            let first = bitset_first(&cs.bytes);
            if first < 256 {
                let mut hi = first;
                while hi + 1 < 256 && bitset_at(&cs.bytes, hi + 1) {
                    hi += 1;
                }
                let contiguous =
                    hi >= 255 || !bitset_any_range(&cs.bytes, (hi + 1) as u8, 0xff);
                if contiguous {
                    let rangelen = hi - first + 1;
                    if rangelen == 1 {
                        self.buf[start] = if cs.negate { reop::NBYTE } else { reop::BYTE };
                        return self.putc(first as u8);
                    } else if rangelen == 2 {
                        self.buf[start] = if cs.negate { reop::NBYTE2 } else { reop::BYTE2 };
                        self.putc(first as u8)?;
                        return self.putc(hi as u8);
                    } else {
                        self.buf[start] = if cs.negate { reop::NRANGE } else { reop::RANGE };
                        self.putc(first as u8)?;
                        return self.putc(hi as u8);
                    }
                }
                if hi == first {
                    // Exactly one more byte somewhere above?
                    let mut b = first + 2;
                    while !bitset_at(&cs.bytes, b) {
                        b += 1;
                    }
                    if b >= 255 || !bitset_any_range(&cs.bytes, (b + 1) as u8, 0xff) {
                        self.buf[start] = if cs.negate { reop::NBYTE2 } else { reop::BYTE2 };
                        self.putc(first as u8)?;
                        return self.putc(b as u8);
                    }
                }
            }
        }

        // Trait classes (deferred to run time in UTF-8 mode).
        if !self.has(Syntax::NO_UTF8) {
            for class in 0..crate::regenc::TRAIT_COUNT as u8 {
                if cs.classes & (1 << class) != 0 {
                    self.putc(recs::ISX_MIN + class)?;
                }
            }
        }

        // Explicit code points.
        if !cs.uchars.is_empty() {
            // A pure code-point set (plus a few ASCII bytes) becomes one
            // top-level CONTAINS list, which the fastmap resolves per
            // lead byte.
            if self.buf.len() == start + 1 {
                let nbytes = bitset_popcount(&cs.bytes);
                if nbytes <= CONTAINS_UTF8_MAX_ASCII_COUNT
                    && cs.uchars.len() + nbytes <= u8::MAX as usize
                {
                    self.buf[start] = if cs.negate {
                        reop::NCONTAINS_UTF8
                    } else {
                        reop::CONTAINS_UTF8
                    };
                    self.putc((cs.uchars.len() + nbytes) as u8)?;
                    for b in 0u8..0x80 {
                        if bitset_at(&cs.bytes, b as usize) {
                            self.putc(b)?;
                        }
                    }
                    for &c in &cs.uchars {
                        let mut ub = [0u8; UTF8_CURLEN];
                        let ul = utf8_encode(c, &mut ub);
                        self.putn(&ub[..ul])?;
                    }
                    return Ok(());
                }
            }

            let mut rest: &[char] = &cs.uchars;
            while rest.len() > u8::MAX as usize {
                self.putc(recs::CONTAINS)?;
                self.putc(u8::MAX)?;
                for &c in &rest[..u8::MAX as usize] {
                    let mut ub = [0u8; UTF8_CURLEN];
                    let ul = utf8_encode(c, &mut ub);
                    self.putn(&ub[..ul])?;
                }
                rest = &rest[u8::MAX as usize..];
            }
            match rest.len() {
                1 => self.putc(recs::CHAR)?,
                2 => self.putc(recs::CHAR2)?,
                n => {
                    self.putc(recs::CONTAINS)?;
                    self.putc(n as u8)?;
                }
            }
            for &c in rest {
                let mut ub = [0u8; UTF8_CURLEN];
                let ul = utf8_encode(c, &mut ub);
                self.putn(&ub[..ul])?;
            }
        }

        // Remaining byte set as a bitset segment.
        let mut bytes = cs.bytes;
        if byte_mode && cs.negate {
            bitset_flip_all(&mut bytes);
        }
        if bitset_any(&bytes) {
            let first = bitset_first(&bytes);
            let last = bitset_last(&bytes);
            let base = (first & !7) as u8;
            let nbytes = ((last + 1 - base as usize) + 7) / 8;
            debug_assert!(nbytes <= 32);
            self.putc(recs::BITSET)?;
            self.putc(base)?;
            self.putc(nbytes as u8)?;
            for k in 0..nbytes {
                let mut byte = 0u8;
                for bit in 0..8 {
                    let pos = base as usize + k * 8 + bit;
                    if pos < 256 && bitset_at(&bytes, pos) {
                        byte |= 1 << bit;
                    }
                }
                self.putc(byte)?;
            }
        }

        self.putc(recs::DONE)
    }

    /// Emit a byte-mode class test built from a trait predicate.
    fn emit_byte_trait_class(&mut self, class: u8, negate: bool) -> Result<()> {
        let mut bytes = BITSET_EMPTY;
        for b in 0u8..=0xff {
            if byte_has_trait(b, class) != negate {
                bitset_set(&mut bytes, b as usize);
            }
        }
        self.putc(reop::CS_BYTE)?;
        let first = bitset_first(&bytes);
        let last = bitset_last(&bytes);
        let base = (first & !7) as u8;
        let nbytes = ((last + 1 - base as usize) + 7) / 8;
        self.putc(recs::BITSET)?;
        self.putc(base)?;
        self.putc(nbytes as u8)?;
        for k in 0..nbytes {
            let mut byte = 0u8;
            for bit in 0..8 {
                let pos = base as usize + k * 8 + bit;
                if pos < 256 && bitset_at(&bytes, pos) {
                    byte |= 1 << bit;
                }
            }
            self.putc(byte)?;
        }
        self.putc(recs::DONE)
    }

    /// Emit a UTF-8 trait-class test.
    fn emit_uni_trait_class(&mut self, class: u8, negate: bool) -> Result<()> {
        self.putc(if negate { reop::NCS_UTF8 } else { reop::CS_UTF8 })?;
        self.putc(recs::ISX_MIN + class)?;
        self.putc(recs::DONE)
    }

    // === Prefix expressions ===

    /// Compile one prefix expression (a literal run, `[...]`, `(...)`,
    /// an escape class, `.`), leaving `estart` at its first instruction.
    fn compile_prefix(&mut self) -> Result<PrefixStatus> {
        // Replicating leading anchors/group-starts in front of every
        // branch of a top-level alternation lets the fastmap dispatch
        // straight into the branch.
        let mut alt_prefix: SmallVec<[u8; ALTERNATION_PREFIX_MAXLEN]> = SmallVec::new();
        let mut alt_prefix_wanted = self.buf.is_empty();

        loop {
            self.estart = self.buf.len();
            let tokstart = self.parser.pos;
            let tok = self.parser.next_token();
            match tok {
                // Not consumed here; the caller deals with these.
                Token::Eof | Token::EndGroup | Token::Alternation => {
                    self.parser.pos = tokstart;
                    if !alt_prefix.is_empty() {
                        self.putn(&alt_prefix)?;
                    }
                    return Ok(PrefixStatus::Plain);
                }

                Token::UnmatchedBackslash => return Err(Error::TrailingBackslash),
                Token::IllegalSeq => return Err(Error::IllegalSequence),

                Token::StartInterval => {
                    if self.has(Syntax::CONTEXT_INVALID_DUP)
                        || self.has(Syntax::CONTEXT_INVALID_OPS)
                    {
                        return Err(Error::BadRepeat);
                    }
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    return self.compile_operator_literal(b'{');
                }
                Token::Plus | Token::Star | Token::Qmark => {
                    if self.has(Syntax::CONTEXT_INVALID_OPS) {
                        return Err(Error::BadRepeat);
                    }
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    let ch = match tok {
                        Token::Plus => b'+',
                        Token::Star => b'*',
                        _ => b'?',
                    };
                    return self.compile_operator_literal(ch);
                }

                Token::StartGroup => {
                    return self.compile_group(&mut alt_prefix, alt_prefix_wanted);
                }

                Token::StartSet => {
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    self.estart = self.buf.len();
                    self.compile_charset()?;
                    return Ok(PrefixStatus::Plain);
                }

                Token::ClassSym { negate } => {
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    self.estart = self.buf.len();
                    if self.has(Syntax::NO_UTF8) {
                        self.emit_byte_trait_class(TRAIT_SYMCONT, negate)?;
                    } else {
                        self.emit_uni_trait_class(TRAIT_SYMCONT, negate)?;
                    }
                    return Ok(PrefixStatus::Plain);
                }
                Token::ClassSpace { negate } => {
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    self.estart = self.buf.len();
                    if self.has(Syntax::NO_UTF8) {
                        self.emit_byte_trait_class(TRAIT_SPACE, negate)?;
                    } else {
                        self.emit_uni_trait_class(TRAIT_SPACE, negate)?;
                    }
                    return Ok(PrefixStatus::Plain);
                }
                Token::ClassDigit { negate } => {
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    self.estart = self.buf.len();
                    if self.has(Syntax::NO_UTF8) {
                        self.putc(if negate { reop::NRANGE } else { reop::RANGE })?;
                        self.putc(b'0')?;
                        self.putc(b'9')?;
                    } else {
                        self.emit_uni_trait_class(TRAIT_DIGIT, negate)?;
                    }
                    return Ok(PrefixStatus::Plain);
                }
                Token::ClassLf { negate } => {
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    self.estart = self.buf.len();
                    if self.has(Syntax::NO_UTF8) {
                        self.putc(if negate { reop::NBYTE2 } else { reop::BYTE2 })?;
                        self.putc(0x0a)?;
                        self.putc(0x0d)?;
                    } else {
                        self.emit_uni_trait_class(TRAIT_LF, negate)?;
                    }
                    return Ok(PrefixStatus::Plain);
                }

                Token::Any => {
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    self.estart = self.buf.len();
                    let nul_ok = !self.has(Syntax::DOT_NOT_NULL);
                    let lf_ok = self.has(Syntax::DOT_NEWLINE);
                    let utf8 = !self.has(Syntax::NO_UTF8);
                    let opcode = match (nul_ok, lf_ok, utf8) {
                        (true, true, false) => reop::ANY,
                        (true, true, true) => reop::ANY_UTF8,
                        (true, false, false) => reop::ANY_NOTLF,
                        (true, false, true) => reop::ANY_NOTLF_UTF8,
                        (false, true, false) => reop::ANY_NOTNUL,
                        (false, true, true) => reop::ANY_NOTNUL_UTF8,
                        (false, false, false) => reop::ANY_NOTNUL_NOTLF,
                        (false, false, true) => reop::ANY_NOTNUL_NOTLF_UTF8,
                    };
                    self.putc(opcode)?;
                    return Ok(PrefixStatus::Plain);
                }

                Token::AtSol
                | Token::AtEol
                | Token::AtSoi
                | Token::AtEoi
                | Token::AtWob { .. }
                | Token::AtSow
                | Token::AtEow
                | Token::AtSos
                | Token::AtEos => {
                    let opcode = self.anchor_opcode(tok);
                    // Anchors qualify as replicable alternation prefixes,
                    // and never count as a repeatable prefix themselves.
                    if alt_prefix_wanted && alt_prefix.len() < ALTERNATION_PREFIX_MAXLEN {
                        alt_prefix.push(opcode);
                    } else {
                        self.dump_alt_prefix(&mut alt_prefix)?;
                        alt_prefix_wanted = false;
                        self.putc(opcode)?;
                    }
                    continue;
                }

                Token::Backref(n) => {
                    let gid = (n - 1) as usize;
                    let info = if gid < GRPINFO_COUNT { self.grpinfo[gid] } else { 0 };
                    if info & GRPINFO_DEFINED == 0 {
                        return Err(Error::BadBackref);
                    }
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    self.estart = self.buf.len();
                    self.flags |= CodeFlags::NEEDGROUPS;
                    self.putc(reop::GROUP_MATCH)?;
                    self.putc(gid as u8)?;
                    if info & GRPINFO_EPSILON != 0 {
                        return Ok(PrefixStatus::EpsilonGroup);
                    }
                    return Ok(PrefixStatus::Plain);
                }

                Token::Char(_) | Token::Byte(_) => {
                    self.dump_alt_prefix(&mut alt_prefix)?;
                    return self.compile_literal_run(tok, tokstart);
                }
            }
        }
    }

    /// Write the collected alternation prefix inline (it was not used for
    /// per-branch replication after all).
    fn dump_alt_prefix(
        &mut self,
        prefix: &mut SmallVec<[u8; ALTERNATION_PREFIX_MAXLEN]>,
    ) -> Result<()> {
        if !prefix.is_empty() {
            if self.buf.len() + prefix.len() > RE_COMP_MAXSIZE {
                return Err(Error::PatternTooLarge);
            }
            self.buf.extend_from_slice(prefix);
            prefix.clear();
        }
        Ok(())
    }

    fn anchor_opcode(&self, tok: Token) -> u8 {
        let utf8 = !self.has(Syntax::NO_UTF8);
        let pick = |byte_op: u8, utf8_op: u8| if utf8 { utf8_op } else { byte_op };
        let mut opcode = match tok {
            Token::AtSol => pick(reop::AT_SOL, reop::AT_SOL_UTF8),
            Token::AtEol => pick(reop::AT_EOL, reop::AT_EOL_UTF8),
            Token::AtSoi => reop::AT_SOI,
            Token::AtEoi => reop::AT_EOI,
            Token::AtWob { negate: false } => pick(reop::AT_WOB, reop::AT_WOB_UTF8),
            Token::AtWob { negate: true } => pick(reop::AT_WOB_NOT, reop::AT_WOB_UTF8_NOT),
            Token::AtSow => pick(reop::AT_SOW, reop::AT_SOW_UTF8),
            Token::AtEow => pick(reop::AT_EOW, reop::AT_EOW_UTF8),
            Token::AtSos => pick(reop::AT_SOS, reop::AT_SOS_UTF8),
            Token::AtEos => pick(reop::AT_EOS, reop::AT_EOS_UTF8),
            _ => unreachable!(),
        };
        // '^' and '$' honor the NOTBOL/NOTEOL execution flags unless the
        // dialect pins them down.
        if !self.has(Syntax::ANCHORS_IGNORE_EFLAGS) {
            opcode = match opcode {
                reop::AT_SOL => reop::AT_SOXL,
                reop::AT_SOL_UTF8 => reop::AT_SOXL_UTF8,
                reop::AT_EOL => reop::AT_EOXL,
                reop::AT_EOL_UTF8 => reop::AT_EOXL_UTF8,
                other => other,
            };
        }
        opcode
    }

    /// A repetition operator appearing with nothing before it compiles as
    /// a single literal character.
    fn compile_operator_literal(&mut self, ch: u8) -> Result<PrefixStatus> {
        self.estart = self.buf.len();
        self.compile_literal_byte(ch)?;
        Ok(PrefixStatus::Plain)
    }

    /// Collect and compile a maximal run of literal tokens. A trailing
    /// literal immediately followed by a repetition suffix is peeled off
    /// so that only that character is repeated.
    fn compile_literal_run(&mut self, first: Token, tokstart: usize) -> Result<PrefixStatus> {
        self.estart = self.buf.len();
        let mut hasesc = self.parser.pat[tokstart] == b'\\';
        let mut is_utf8 = matches!(first, Token::Char(c) if (c as u32) >= 0x80);
        let start = tokstart;
        let mut end = self.parser.pos;
        let mut old_end = end;
        let mut length = 1usize;
        let mut followed_by_suffix = false;

        loop {
            let t = self.parser.next_token();
            if !t.is_literal() {
                if t.is_suffix() && end != old_end {
                    debug_assert!(length > 1);
                    length -= 1;
                    followed_by_suffix = true;
                    end = old_end;
                }
                self.parser.pos = end;
                break;
            }
            hasesc |= self.parser.pat[end] == b'\\';
            is_utf8 |= matches!(t, Token::Char(c) if (c as u32) >= 0x80);
            old_end = end;
            end = self.parser.pos;
            length += 1;
        }
        if self.has(Syntax::NO_UTF8) {
            is_utf8 = false;
        }

        self.compile_literal_seq(start, end, length, first, hasesc, is_utf8)?;

        if !followed_by_suffix {
            return Ok(PrefixStatus::Plain);
        }
        // Compile the peeled character as its own expression; the suffix
        // that follows will wrap only it.
        self.estart = self.buf.len();
        match self.parser.next_token() {
            Token::Byte(b) => self.compile_literal_byte(b)?,
            Token::Char(c) => self.compile_literal_uni(c)?,
            _ => return Err(Error::BadPattern),
        }
        Ok(PrefixStatus::Plain)
    }

    /// Compile `(...)`: allocate a group id, compile the body alternation
    /// (replicating the collected prefix per branch when requested), and
    /// mark epsilon-capable groups so loops can skip their empty bodies.
    fn compile_group(
        &mut self,
        alt_prefix: &mut SmallVec<[u8; ALTERNATION_PREFIX_MAXLEN]>,
        alt_prefix_wanted: bool,
    ) -> Result<PrefixStatus> {
        if self.ngroups >= MAX_GROUPS {
            return Err(Error::PatternTooLarge);
        }
        let gid = self.ngroups as u8;
        self.ngroups += 1;

        // Inside a group, ')' is never a literal.
        let old_syntax = self.parser.syntax;
        self.parser.syntax.remove(Syntax::UNMATCHED_RIGHT_PAREN_ORD);

        let expr_start = self.estart;
        let replicate = alt_prefix_wanted && alt_prefix.len() + 2 <= ALTERNATION_PREFIX_MAXLEN;
        if replicate {
            alt_prefix.push(reop::GROUP_START);
            alt_prefix.push(gid);
        } else {
            self.dump_alt_prefix(alt_prefix)?;
            self.putc(reop::GROUP_START)?;
            self.putc(gid)?;
        }

        let body_start = self.buf.len();
        let prefix: SmallVec<[u8; ALTERNATION_PREFIX_MAXLEN]> = if replicate {
            alt_prefix.clone()
        } else {
            SmallVec::new()
        };
        self.compile_alternation(&prefix)?;

        match self.parser.next_token() {
            Token::EndGroup => {}
            Token::UnmatchedBackslash => return Err(Error::TrailingBackslash),
            Token::IllegalSeq => return Err(Error::IllegalSequence),
            _ => return Err(Error::UnmatchedParen),
        }
        self.parser.syntax = old_syntax;

        self.putc(reop::GROUP_END)?;
        self.putc(gid)?;

        let group_matches_epsilon = code_matches_epsilon(&self.buf, body_start);

        // A suffix must wrap the whole group, including its start bracket.
        self.estart = expr_start;

        if (gid as usize) < GRPINFO_COUNT {
            self.grpinfo[gid as usize] |= GRPINFO_DEFINED;
            if group_matches_epsilon {
                self.grpinfo[gid as usize] |= GRPINFO_EPSILON;
            }
        }
        if group_matches_epsilon {
            Ok(PrefixStatus::EpsilonGroup)
        } else {
            Ok(PrefixStatus::Plain)
        }
    }

    // === Repetition suffixes ===

    /// Parse and apply any run of repetition suffixes to the expression
    /// at `estart`.
    fn compile_suffix(&mut self, status: PrefixStatus) -> Result<()> {
        let tokstart = self.parser.pos;
        let tok = self.parser.next_token();
        if !tok.is_suffix() {
            self.parser.pos = tokstart;
            return Ok(());
        }

        let mut accept_zero = false;
        let mut accept_many = false;
        let mut min: u32 = 1;
        let mut max: u32 = 1;
        let mut tok = tok;
        loop {
            if tok == Token::StartInterval {
                let (iv, used) = parse_interval(&self.parser.pat[self.parser.pos..], self.parser.syntax)
                    .ok_or(Error::BadInterval)?;
                self.parser.pos += used;
                accept_many |= iv.unbounded;
                if !accept_zero {
                    min = min.checked_mul(iv.min as u32).ok_or(Error::BadInterval)?;
                    if min > u8::MAX as u32 {
                        return Err(Error::BadInterval);
                    }
                }
                if !accept_many {
                    max = max.checked_mul(iv.max as u32).ok_or(Error::BadInterval)?;
                    if max > u8::MAX as u32 {
                        return Err(Error::BadInterval);
                    }
                }
            } else {
                accept_zero |= tok == Token::Star || tok == Token::Qmark;
                accept_many |= tok == Token::Star || tok == Token::Plus;
            }
            let next_start = self.parser.pos;
            tok = self.parser.next_token();
            if !tok.is_suffix() {
                self.parser.pos = next_start;
                break;
            }
        }
        if accept_zero {
            min = 0;
        }

        self.compile_repeat(
            min as u8,
            max as u8,
            accept_many,
            status == PrefixStatus::EpsilonGroup,
        )
    }

    /// Rewrite a group-end (or back-reference) instruction into its
    /// "matched empty: skip ahead" variant.
    fn set_group_epsilon_jmp(&mut self, at: usize, skip: u8) {
        let op = self.buf[at];
        debug_assert!(op == reop::GROUP_END || op == reop::GROUP_MATCH);
        self.buf[at] = reop::epsilon_jmp_encode(op, skip);
    }

    /// Apply one of the repeat templates to `buf[estart..]`.
    fn compile_repeat(
        &mut self,
        min: u8,
        max: u8,
        unbounded: bool,
        expr_matches_epsilon: bool,
    ) -> Result<()> {
        let estart = self.estart;
        let expr_size = self.buf.len() - estart;

        // Every template's jump distances must fit the signed 16-bit
        // displacement.
        if expr_size + 20 > i16::MAX as usize {
            return Err(Error::PatternTooLarge);
        }

        if unbounded {
            if min <= 1 {
                // "X*":            JMP_ONFAIL 2f
                // "X+":            JMP_ONFAIL_DUMMY_AT 2f
                //               1: <X>
                //                  MAYBE_POP_ONFAIL
                //                  JMP_AND_RETURN_ONFAIL 1b
                //               2:
                self.insert_gap(estart, 3)?;
                self.buf[estart] = if min == 0 {
                    reop::JMP_ONFAIL
                } else {
                    reop::JMP_ONFAIL_DUMMY_AT
                };
                delta16_set(&mut self.buf, estart + 1, (expr_size + 6) as i32);
                let label_1 = estart + 3;
                let body_end = estart + 3 + expr_size;
                if expr_matches_epsilon {
                    self.set_group_epsilon_jmp(body_end - 2, 6);
                }
                self.putc(reop::MAYBE_POP_ONFAIL)?;
                self.putw(3)?;
                self.putc(reop::JMP_AND_RETURN_ONFAIL)?;
                let after = self.buf.len() + 2;
                self.putw(label_1 as i32 - after as i32)?;
                return Ok(());
            }
            // "X{n,}":         SETVAR v = n-1
            //               1: JMP_ONFAIL_DUMMY_AT 3f
            //               2: <X>
            //                  MAYBE_POP_ONFAIL
            //                  DEC_JMP v, 1b
            //                  JMP_AND_RETURN_ONFAIL 2b
            //               3:
            let var = self.allocvar()?;
            self.insert_gap(estart, 6)?;
            self.buf[estart] = reop::SETVAR;
            self.buf[estart + 1] = var;
            self.buf[estart + 2] = min - 1;
            let label_1 = estart + 3;
            self.buf[label_1] = reop::JMP_ONFAIL_DUMMY_AT;
            delta16_set(&mut self.buf, label_1 + 1, (expr_size + 10) as i32);
            let label_2 = estart + 6;
            let body_end = estart + 6 + expr_size;
            if expr_matches_epsilon {
                self.set_group_epsilon_jmp(body_end - 2, 10);
            }
            self.putc(reop::MAYBE_POP_ONFAIL)?;
            self.putw(7)?;
            self.putc(reop::DEC_JMP)?;
            self.putc(var)?;
            let after = self.buf.len() + 2;
            self.putw(label_1 as i32 - after as i32)?;
            self.putc(reop::JMP_AND_RETURN_ONFAIL)?;
            let after = self.buf.len() + 2;
            self.putw(label_2 as i32 - after as i32)?;
            return Ok(());
        }

        if max == 0 {
            // "X{0}": delete the expression, but keep any group brackets
            // so those groups still report an (empty) match.
            let mut kept: SmallVec<[u8; 16]> = SmallVec::new();
            let mut reader = estart;
            while reader < self.buf.len() {
                let next = opcode_next(&self.buf, reader);
                let mut op = self.buf[reader];
                if (reop::GROUP_END_JMIN..=reop::GROUP_END_JMAX).contains(&op) {
                    op = reop::GROUP_END;
                }
                if op == reop::GROUP_START || op == reop::GROUP_END {
                    let gid = self.buf[reader + 1];
                    kept.push(op);
                    kept.push(gid);
                    if (gid as usize) < GRPINFO_COUNT {
                        self.grpinfo[gid as usize] |= GRPINFO_EPSILON;
                    }
                }
                reader = next;
            }
            self.buf.truncate(estart);
            self.putn(&kept)?;
            return Ok(());
        }

        if min == 1 {
            if max == 1 {
                return Ok(()); // exactly once: nothing to do
            }
            // "X{1,m}":        SETVAR v = m-1
            //                  JMP_ONFAIL_DUMMY_AT 2f
            //               1: <X>
            //                  MAYBE_POP_ONFAIL
            //                  DEC_JMP_AND_RETURN_ONFAIL v, 1b
            //               2:
            let var = self.allocvar()?;
            self.insert_gap(estart, 6)?;
            self.buf[estart] = reop::SETVAR;
            self.buf[estart + 1] = var;
            self.buf[estart + 2] = max - 1;
            self.buf[estart + 3] = reop::JMP_ONFAIL_DUMMY_AT;
            delta16_set(&mut self.buf, estart + 4, (expr_size + 7) as i32);
            let label_1 = estart + 6;
            let body_end = estart + 6 + expr_size;
            if expr_matches_epsilon {
                self.set_group_epsilon_jmp(body_end - 2, 7);
            }
            self.putc(reop::MAYBE_POP_ONFAIL)?;
            self.putw(4)?;
            self.putc(reop::DEC_JMP_AND_RETURN_ONFAIL)?;
            self.putc(var)?;
            let after = self.buf.len() + 2;
            self.putw(label_1 as i32 - after as i32)?;
            return Ok(());
        }

        if min == 0 {
            if max == 1 {
                // "X?":            JMP_ONFAIL 1f
                //                  <X>
                //                  MAYBE_POP_ONFAIL
                //               1:
                self.insert_gap(estart, 3)?;
                self.buf[estart] = reop::JMP_ONFAIL;
                delta16_set(&mut self.buf, estart + 1, (expr_size + 3) as i32);
                self.putc(reop::MAYBE_POP_ONFAIL)?;
                self.putw(0)?;
                return Ok(());
            }
            // "X{0,m}":        SETVAR v = m-1
            //                  JMP_ONFAIL 2f
            //               1: <X>
            //                  MAYBE_POP_ONFAIL
            //                  DEC_JMP_AND_RETURN_ONFAIL v, 1b
            //               2:
            let var = self.allocvar()?;
            self.insert_gap(estart, 6)?;
            self.buf[estart] = reop::SETVAR;
            self.buf[estart + 1] = var;
            self.buf[estart + 2] = max - 1;
            self.buf[estart + 3] = reop::JMP_ONFAIL;
            delta16_set(&mut self.buf, estart + 4, (expr_size + 7) as i32);
            let label_1 = estart + 6;
            let body_end = estart + 6 + expr_size;
            if expr_matches_epsilon {
                self.set_group_epsilon_jmp(body_end - 2, 7);
            }
            self.putc(reop::MAYBE_POP_ONFAIL)?;
            self.putw(4)?;
            self.putc(reop::DEC_JMP_AND_RETURN_ONFAIL)?;
            self.putc(var)?;
            let after = self.buf.len() + 2;
            self.putw(label_1 as i32 - after as i32)?;
            return Ok(());
        }

        if min == max {
            // "X{n}":          SETVAR v = n-1
            //               1: <X>
            //                  DEC_JMP v, 1b
            let var = self.allocvar()?;
            self.insert_gap(estart, 3)?;
            self.buf[estart] = reop::SETVAR;
            self.buf[estart + 1] = var;
            self.buf[estart + 2] = min - 1;
            let label_1 = estart + 3;
            self.putc(reop::DEC_JMP)?;
            self.putc(var)?;
            let after = self.buf.len() + 2;
            self.putw(label_1 as i32 - after as i32)?;
            return Ok(());
        }

        // "X{n,m}":        SETVAR v1 = n-1
        //                  SETVAR v2 = m-n
        //               1: JMP_ONFAIL_DUMMY_AT 3f
        //               2: <X>
        //                  MAYBE_POP_ONFAIL
        //                  DEC_JMP v1, 1b
        //                  DEC_JMP_AND_RETURN_ONFAIL v2, 2b
        //               3:
        let var1 = self.allocvar()?;
        let var2 = self.allocvar()?;
        self.insert_gap(estart, 9)?;
        self.buf[estart] = reop::SETVAR;
        self.buf[estart + 1] = var1;
        self.buf[estart + 2] = min - 1;
        self.buf[estart + 3] = reop::SETVAR;
        self.buf[estart + 4] = var2;
        self.buf[estart + 5] = max - min;
        let label_1 = estart + 6;
        self.buf[label_1] = reop::JMP_ONFAIL_DUMMY_AT;
        delta16_set(&mut self.buf, label_1 + 1, (expr_size + 11) as i32);
        let label_2 = estart + 9;
        let body_end = estart + 9 + expr_size;
        if expr_matches_epsilon {
            self.set_group_epsilon_jmp(body_end - 2, 11);
        }
        self.putc(reop::MAYBE_POP_ONFAIL)?;
        self.putw(8)?;
        self.putc(reop::DEC_JMP)?;
        self.putc(var1)?;
        let after = self.buf.len() + 2;
        self.putw(label_1 as i32 - after as i32)?;
        self.putc(reop::DEC_JMP_AND_RETURN_ONFAIL)?;
        self.putc(var2)?;
        let after = self.buf.len() + 2;
        self.putw(label_2 as i32 - after as i32)?;
        Ok(())
    }

    // === Alternation ===

    /// Compile a `X|Y|Z` sequence. `branch_prefix` is replicated in front
    /// of every branch (used for fastmap-friendly group/anchor prefixes).
    fn compile_alternation(&mut self, branch_prefix: &[u8]) -> Result<()> {
        let mut initial_jmp: Option<usize> = None;
        let mut prev_delta_off: Option<usize> = None;

        loop {
            let branch_start = self.buf.len();
            if !branch_prefix.is_empty() {
                self.putn(branch_prefix)?;
            }

            // Compile the expression sequence of this branch.
            loop {
                let old_pos = self.parser.pos;
                let status = self.compile_prefix()?;
                self.compile_suffix(status)?;
                if self.parser.pos == old_pos {
                    break;
                }
            }

            let tokstart = self.parser.pos;
            let tok = self.parser.next_token();
            if tok != Token::Alternation {
                self.parser.pos = tokstart;
                if let Some(off) = prev_delta_off {
                    let delta = self.buf.len() as i32 - (off as i32 + 2);
                    debug_assert!(delta >= 0);
                    if delta > i16::MAX as i32 {
                        return Err(Error::PatternTooLarge);
                    }
                    delta16_set(&mut self.buf, off, delta);
                }
                break;
            }

            // Head: try-next-branch-on-failure.
            let branch_size = self.buf.len() - branch_start;
            if branch_size + 6 > i16::MAX as usize {
                return Err(Error::PatternTooLarge);
            }
            self.insert_gap(branch_start, 3)?;
            self.buf[branch_start] = reop::JMP_ONFAIL;
            delta16_set(&mut self.buf, branch_start + 1, (branch_size + 6) as i32);

            // Tail: commit placeholder plus jump to the alternation end.
            self.putc(reop::MAYBE_POP_ONFAIL)?;
            self.putw(3)?;
            if initial_jmp.is_none() {
                initial_jmp = Some(self.buf.len());
            }
            if let Some(off) = prev_delta_off {
                let delta = self.buf.len() as i32 - (off as i32 + 2);
                debug_assert!(delta >= 0);
                if delta > i16::MAX as i32 {
                    return Err(Error::PatternTooLarge);
                }
                delta16_set(&mut self.buf, off, delta);
            }
            self.putc(reop::JMP)?;
            prev_delta_off = Some(self.buf.len());
            self.putw(0)?; // filled when the next branch ends
        }

        // Thread the trailing jumps: each jump is shortened to point at
        // the final destination of its chain while the combined offset
        // still fits the 16-bit displacement.
        if let Some(at) = initial_jmp {
            thread_fwd_jump(&mut self.buf, at);
        }
        Ok(())
    }
}

/// Map a `[:name:]` class name to its trait index.
fn charclass_find(name: &[u8]) -> Option<u8> {
    use crate::regenc::*;
    static CHARCLASS_NAMES: &[(&str, u8)] = &[
        ("alnum", TRAIT_ALNUM),
        ("alpha", TRAIT_ALPHA),
        ("blank", TRAIT_BLANK),
        ("cntrl", TRAIT_CNTRL),
        ("digit", TRAIT_DIGIT),
        ("empty", TRAIT_EMPTY),
        ("graph", TRAIT_GRAPH),
        ("hex", TRAIT_HEX),
        ("lf", TRAIT_LF),
        ("lower", TRAIT_LOWER),
        ("numeric", TRAIT_NUMERIC),
        ("print", TRAIT_PRINT),
        ("punct", TRAIT_PUNCT),
        ("space", TRAIT_SPACE),
        ("symcont", TRAIT_SYMCONT),
        ("symstrt", TRAIT_SYMSTRT),
        ("tab", TRAIT_TAB),
        ("title", TRAIT_TITLE),
        ("upper", TRAIT_UPPER),
        ("white", TRAIT_WHITE),
        ("xdigit", TRAIT_XDIGIT),
    ];
    CHARCLASS_NAMES
        .binary_search_by(|&(n, _)| n.as_bytes().cmp(name))
        .ok()
        .map(|i| CHARCLASS_NAMES[i].1)
}

// === Static analyses over just-emitted code ===

/// Can the code starting at `pc` match the empty string? Walks forward
/// taking optimistic branch choices; running off the end of the emitted
/// code counts as reaching the accept state.
fn code_matches_epsilon(code: &[u8], mut pc: usize) -> bool {
    loop {
        if pc >= code.len() {
            return true;
        }
        let op = code[pc];
        pc += 1;
        match op {
            reop::EXACT
            | reop::EXACT_ICASE_ASCII
            | reop::EXACT_ICASE_UTF8
            | reop::BYTE
            | reop::NBYTE
            | reop::BYTE2
            | reop::NBYTE2
            | reop::RANGE
            | reop::NRANGE
            | reop::CONTAINS_UTF8
            | reop::NCONTAINS_UTF8
            | reop::CS_BYTE
            | reop::CS_UTF8
            | reop::NCS_UTF8
            | reop::GROUP_MATCH => return false,
            _ if reop::is_any(op) => return false,

            // An epsilon-capable group repeat would have been encoded as
            // a J-variant; these stay transparent.
            reop::GROUP_START | reop::GROUP_END => pc += 1,
            _ if (reop::GROUP_END_JMIN..=reop::GROUP_END_JMAX).contains(&op)
                || (reop::GROUP_MATCH_JMIN..=reop::GROUP_MATCH_JMAX).contains(&op) =>
            {
                pc += 1
            }

            _ if reop::is_at(op) => {}
            reop::NOP => {}

            reop::POP_ONFAIL_AT
            | reop::JMP_ONFAIL_DUMMY_AT
            | reop::SETVAR
            | reop::MAYBE_POP_ONFAIL => pc += 2,

            reop::JMP_ONFAIL | reop::JMP_AND_RETURN_ONFAIL => {
                let delta = delta16_get(code, pc) as isize;
                pc += 2;
                if delta > 0 && code_matches_epsilon(code, pc + delta as usize) {
                    return true;
                }
            }

            reop::JMP => {
                let delta = delta16_get(code, pc) as isize;
                pc += 2;
                pc = (pc as isize + delta) as usize;
            }

            reop::DEC_JMP => {
                pc += 1;
                let delta = delta16_get(code, pc) as isize;
                pc += 2;
                if delta >= 0 {
                    pc += delta as usize;
                }
            }

            reop::DEC_JMP_AND_RETURN_ONFAIL => {
                pc += 1;
                let delta = delta16_get(code, pc) as isize;
                pc += 2;
                if delta > 0 && code_matches_epsilon(code, pc + delta as usize) {
                    return true;
                }
            }

            reop::MATCHED | reop::MATCHED_PERFECT => return true,

            _ => unreachable!("corrupt bytecode"),
        }
    }
}

/// Shorten the forward jump at `at` through any chain of further
/// unconditional jumps.
fn thread_fwd_jump(buf: &mut [u8], at: usize) {
    debug_assert_eq!(buf[at], reop::JMP);
    let delta = delta16_get(buf, at + 1);
    debug_assert!(delta >= 0);
    let mut target = at + 3 + delta as usize;
    while target < buf.len() && buf[target] == reop::NOP {
        target += 1;
    }
    if target < buf.len() && buf[target] == reop::JMP {
        thread_fwd_jump(buf, target);
        let target_delta = delta16_get(buf, target + 1);
        debug_assert!(target_delta >= 0);
        let final_target = target + 3 + target_delta as usize;
        let total = final_target as i32 - (at as i32 + 3);
        if total <= i16::MAX as i32 {
            delta16_set(buf, at + 1, total);
        }
    }
}

/// Finalize the MAYBE_POP_ONFAIL placeholders.
///
/// A placeholder becomes a real "pop the record tagged with this target"
/// only where dropping the popped alternative cannot change the result:
/// for loops, when the loop's continuation is a terminal match opcode
/// (greedy-first arrival is already the best); for alternation commits,
/// only when the first successful path wins outright. Everywhere else it
/// decays to no-ops so exhaustive exploration stays complete.
fn peephole(buf: &mut [u8]) {
    fn resolve(buf: &[u8], mut t: usize) -> usize {
        loop {
            while t < buf.len() && buf[t] == reop::NOP {
                t += 1;
            }
            if t < buf.len() && buf[t] == reop::JMP {
                t = delta16_target(buf, t + 1);
                continue;
            }
            return t;
        }
    }

    let mut off = 0usize;
    while off < buf.len() {
        let op = buf[off];
        let next = opcode_next(buf, off);
        if op == reop::MAYBE_POP_ONFAIL {
            let own_target = delta16_target(buf, off + 1);
            let following = *buf.get(next).unwrap_or(&reop::MATCHED);
            let commit = match following {
                reop::JMP => {
                    // Alternation branch commit.
                    let cont = resolve(buf, delta16_target(buf, next + 1));
                    buf.get(cont) == Some(&reop::MATCHED_PERFECT)
                }
                reop::JMP_AND_RETURN_ONFAIL
                | reop::DEC_JMP
                | reop::DEC_JMP_AND_RETURN_ONFAIL
                | reop::MATCHED
                | reop::MATCHED_PERFECT => {
                    // Loop iteration commit (or a bare "X?" at the end).
                    let cont = resolve(buf, own_target);
                    matches!(
                        buf.get(cont),
                        Some(&reop::MATCHED) | Some(&reop::MATCHED_PERFECT)
                    )
                }
                _ => false,
            };
            if commit {
                buf[off] = reop::POP_ONFAIL_AT;
            } else {
                buf[off] = reop::NOP;
                buf[off + 1] = reop::NOP;
                buf[off + 2] = reop::NOP;
            }
        }
        off = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regsyntax::{SYNTAX_POSIX_BASIC, SYNTAX_POSIX_EXTENDED};

    fn ere(pat: &str) -> ReCode {
        compile(pat, SYNTAX_POSIX_EXTENDED).unwrap()
    }

    fn ere_err(pat: &str) -> Error {
        compile(pat, SYNTAX_POSIX_EXTENDED).unwrap_err()
    }

    #[test]
    fn literal_run_merging() {
        let code = ere("abc");
        assert_eq!(
            code.bytes(),
            &[reop::EXACT, 3, b'a', b'b', b'c', reop::MATCHED]
        );
    }

    #[test]
    fn trailing_literal_peeled_before_suffix() {
        // Only the final 'c' is repeated.
        let code = ere("abc*");
        assert_eq!(code.bytes()[..5], [reop::EXACT, 2, b'a', b'b', reop::JMP_ONFAIL]);
    }

    #[test]
    fn single_byte_charset_collapses() {
        let code = ere("[q]");
        assert_eq!(code.bytes(), &[reop::BYTE, b'q', reop::MATCHED]);
        let code = ere("[ab]");
        assert_eq!(code.bytes(), &[reop::BYTE2, b'a', b'b', reop::MATCHED]);
        let code = ere("[a-m]");
        assert_eq!(code.bytes(), &[reop::RANGE, b'a', b'm', reop::MATCHED]);
        // Negated sets collapse only in byte-oriented mode, where one
        // byte is one character.
        let code = compile("[^a-m]", SYNTAX_POSIX_EXTENDED.union(Syntax::NO_UTF8)).unwrap();
        assert_eq!(code.bytes(), &[reop::NRANGE, b'a', b'm', reop::MATCHED]);
        // In UTF-8 mode the negated form must consume whole characters.
        let code = ere("[^a-m]");
        assert_eq!(code.bytes()[0], reop::NCS_UTF8);
    }

    #[test]
    fn charset_bitset_fallback() {
        let code = ere("[acf]");
        assert_eq!(code.bytes()[0], reop::CS_BYTE);
        assert_eq!(code.bytes()[1], recs::BITSET);
        assert_eq!(code.bytes()[2], b'a' & !7);
    }

    #[test]
    fn star_layout() {
        let code = ere("a*");
        let b = code.bytes();
        assert_eq!(b[0], reop::JMP_ONFAIL);
        assert_eq!(delta16_get(b, 1), 8); // to just past the loop
        assert_eq!(b[3], reop::BYTE);
        // Terminal loop: the placeholder was finalized to a real pop.
        assert_eq!(b[5], reop::POP_ONFAIL_AT);
        assert_eq!(b[8], reop::JMP_AND_RETURN_ONFAIL);
        assert_eq!(delta16_get(b, 9), -8);
        assert_eq!(b[11], reop::MATCHED);
    }

    #[test]
    fn non_terminal_star_keeps_alternatives() {
        // "a*a" must be able to give a byte back, so no pop here.
        let code = ere("a*a");
        let b = code.bytes();
        assert_eq!(b[5], reop::NOP);
        assert_eq!(b[6], reop::NOP);
        assert_eq!(b[7], reop::NOP);
    }

    #[test]
    fn exact_count_uses_counter() {
        let code = ere("a{3}");
        let b = code.bytes();
        assert_eq!(b[0], reop::SETVAR);
        assert_eq!(b[2], 2); // n-1
        assert_eq!(b[3], reop::BYTE);
        assert_eq!(b[5], reop::DEC_JMP);
        assert_eq!(code.nvars(), 1);
    }

    #[test]
    fn bounded_range_uses_two_counters() {
        let code = ere("a{2,5}");
        assert_eq!(code.nvars(), 2);
        let b = code.bytes();
        assert_eq!(b[0], reop::SETVAR);
        assert_eq!(b[2], 1); // min-1
        assert_eq!(b[3], reop::SETVAR);
        assert_eq!(b[5], 3); // max-min
    }

    #[test]
    fn zero_count_keeps_group_brackets() {
        let code = ere("(ab){0}");
        assert_eq!(
            code.bytes(),
            &[
                reop::GROUP_START,
                0,
                reop::GROUP_END,
                0,
                reop::MATCHED
            ]
        );
        assert_eq!(code.ngroups(), 1);
    }

    #[test]
    fn alternation_layout_and_threading() {
        let code = ere("a|b|c");
        let b = code.bytes();
        assert_eq!(b[0], reop::JMP_ONFAIL);
        // First branch's trailing jump was threaded to the very end.
        let first_jmp = 8;
        assert_eq!(b[first_jmp], reop::JMP);
        let target = delta16_target(b, first_jmp + 1);
        assert_eq!(b[target], reop::MATCHED);
    }

    #[test]
    fn empty_group_gets_epsilon_skip_variant() {
        let code = ere("(a*)*");
        let b = code.bytes();
        // Somewhere in the body sits a GROUP_END J-variant.
        assert!(b
            .iter()
            .any(|&op| (reop::GROUP_END_JMIN..=reop::GROUP_END_JMAX).contains(&op)));
    }

    #[test]
    fn backref_needs_defined_group() {
        assert_eq!(ere_err(r"\1(a)"), Error::BadBackref);
        let code = ere(r"(a)\1");
        assert!(code.flags().contains(CodeFlags::NEEDGROUPS));
    }

    #[test]
    fn error_taxonomy() {
        assert_eq!(ere_err("a{5,2}"), Error::BadInterval);
        assert_eq!(ere_err("[abc"), Error::UnexpectedEof);
        assert_eq!(ere_err("(ab"), Error::UnmatchedParen);
        assert_eq!(ere_err("ab)"), Error::UnmatchedCloseParen);
        assert_eq!(ere_err(r"ab\"), Error::TrailingBackslash);
        assert_eq!(ere_err("*a"), Error::BadRepeat);
        assert_eq!(ere_err("[z-a]"), Error::BadRange);
        assert_eq!(ere_err("[[:bogus:]]"), Error::BadCharClass);
        // Mixing a decoded code point with a raw byte in one class.
        let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::BACKSLASH_ESCAPE_IN_LISTS);
        assert_eq!(
            compile("[Ä\\xC3]", syn).unwrap_err(),
            Error::IllegalCharset
        );
    }

    #[test]
    fn bre_star_after_nothing_is_literal() {
        let code = compile("*a", SYNTAX_POSIX_BASIC).unwrap();
        assert_eq!(code.bytes()[0], reop::BYTE);
        assert_eq!(code.bytes()[1], b'*');
    }

    #[test]
    fn icase_byte_literal() {
        let code = compile("a", SYNTAX_POSIX_EXTENDED.union(Syntax::ICASE)).unwrap();
        assert_eq!(code.bytes(), &[reop::BYTE2, b'A', b'a', reop::MATCHED]);
    }

    #[test]
    fn utf8_literal_is_exact_sequence() {
        let code = ere("ä");
        assert_eq!(code.bytes(), &[reop::EXACT, 2, 0xc3, 0xa4, reop::MATCHED]);
    }

    #[test]
    fn unicode_class_defers_to_runtime() {
        let code = ere("[[:alpha:]]");
        assert_eq!(
            code.bytes(),
            &[
                reop::CS_UTF8,
                recs::ISX_MIN + crate::regenc::TRAIT_ALPHA,
                recs::DONE,
                reop::MATCHED
            ]
        );
    }

    #[test]
    fn contains_encoding_for_small_char_lists() {
        let code = ere("[äö]");
        let b = code.bytes();
        assert_eq!(b[0], reop::CONTAINS_UTF8);
        assert_eq!(b[1], 2);
    }

    #[test]
    fn anchors_replicated_across_toplevel_alternation() {
        let code = ere("^(ab|cd)");
        let b = code.bytes();
        // Both branches begin with the replicated anchor + group start.
        assert_eq!(b[0], reop::JMP_ONFAIL);
        assert_eq!(b[3], reop::AT_SOXL_UTF8);
        assert_eq!(b[4], reop::GROUP_START);
        let second = delta16_target(b, 1);
        assert_eq!(b[second], reop::AT_SOXL_UTF8);
        assert_eq!(b[second + 1], reop::GROUP_START);
    }

    #[test]
    fn group_count_and_interval_merge() {
        let code = ere("(a)(b)(c)");
        assert_eq!(code.ngroups(), 3);
        // Stacked intervals multiply.
        let code = ere("a{2}{3}");
        let b = code.bytes();
        assert_eq!(b[0], reop::SETVAR);
        assert_eq!(b[2], 5); // 6-1
    }

    #[test]
    fn compiled_size_is_capped() {
        // 9000 'a's with {9,} each would blow the 64K limit via nesting.
        let pat = "a".repeat(RE_COMP_MAXSIZE + 8);
        assert_eq!(
            compile(&pat, SYNTAX_POSIX_EXTENDED).unwrap_err(),
            Error::PatternTooLarge
        );
    }

    #[test]
    fn epsilon_detection() {
        let code = ere("a");
        assert!(!code_matches_epsilon(code.bytes(), 0));
        let code = ere("a*");
        assert!(code_matches_epsilon(code.bytes(), 0));
        let code = ere("(|x)");
        assert!(code_matches_epsilon(code.bytes(), 0));
        let code = ere("^");
        assert!(code_matches_epsilon(code.bytes(), 0));
    }
}
