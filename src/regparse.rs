// regparse.rs - Pattern tokenizer.
//
// Turns pattern bytes plus a syntax-flag set into tokens. All dialect
// sensitivity lives here: the flags alone decide whether `( { + | ?` are
// operators or literals, whether `^`/`$` are context-independent anchors,
// and which escape families exist.

use crate::regenc::{utf8_decode, utf8_seqlen};
use crate::regsyntax::Syntax;

/// One decoded pattern element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Literal code point (also plain ASCII).
    Char(char),
    /// Raw, undecoded byte in `0x80..=0xFF`. Distinct from `Char` in the
    /// same numeric range: this one matches the byte, not its UTF-8 form.
    Byte(u8),
    /// `.`
    Any,
    /// `[` opening a bracket expression.
    StartSet,
    /// `{` opening a repetition interval.
    StartInterval,
    Star,
    Plus,
    Qmark,
    Alternation,
    StartGroup,
    EndGroup,
    /// `^` in anchor position.
    AtSol,
    /// `$` in anchor position.
    AtEol,
    /// `\`` / `\A` - start of input.
    AtSoi,
    /// `\'` / `\Z` - end of input.
    AtEoi,
    /// `\b` / `\B` - word boundary.
    AtWob { negate: bool },
    /// `\<` / `\>` - start / end of word.
    AtSow,
    AtEow,
    /// `\_<` / `\_>` - start / end of symbol.
    AtSos,
    AtEos,
    /// `\w` / `\W`.
    ClassSym { negate: bool },
    /// `\s` / `\S`.
    ClassSpace { negate: bool },
    /// `\d` / `\D`.
    ClassDigit { negate: bool },
    /// `\n` / `\N`.
    ClassLf { negate: bool },
    /// `\1`..`\9` (1-based group index).
    Backref(u8),
    /// End of pattern.
    Eof,
    /// `\` at end of pattern. Repeated calls at the same position keep
    /// yielding this token; the position does not advance.
    UnmatchedBackslash,
    /// Malformed multi-byte sequence. The position does not advance.
    IllegalSeq,
}

impl Token {
    #[inline]
    pub fn is_literal(self) -> bool {
        matches!(self, Token::Char(_) | Token::Byte(_))
    }

    /// True for tokens that act as repetition suffixes.
    #[inline]
    pub fn is_suffix(self) -> bool {
        matches!(
            self,
            Token::Star | Token::Plus | Token::Qmark | Token::StartInterval
        )
    }

    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Token::UnmatchedBackslash | Token::IllegalSeq)
    }
}

/// A parsed `{min,max}` bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub min: u8,
    /// Meaningless when `unbounded`.
    pub max: u8,
    pub unbounded: bool,
}

/// Tokenizer state: pattern bytes, cursor, and the active dialect.
pub struct Parser<'p> {
    pub(crate) pat: &'p [u8],
    pub(crate) pos: usize,
    pub(crate) syntax: Syntax,
}

impl<'p> Parser<'p> {
    pub fn new(pat: &'p [u8], syntax: Syntax) -> Self {
        Parser { pat, pos: 0, syntax }
    }

    #[inline]
    fn has(&self, flag: Syntax) -> bool {
        self.syntax.contains(flag)
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.pat.len()
    }

    #[inline]
    fn peek(&self, ahead: usize) -> u8 {
        *self.pat.get(self.pos + ahead).unwrap_or(&0)
    }

    /// Decode a UTF-8 character at the cursor into a literal token, or
    /// yield the raw byte when UTF-8 is disabled. The cursor must sit on
    /// a byte >= 0x80.
    fn yield_high_byte(&mut self) -> Token {
        let b = self.pat[self.pos];
        if self.has(Syntax::NO_UTF8) {
            self.pos += 1;
            return Token::Byte(b);
        }
        let seqlen = utf8_seqlen(b);
        if seqlen == 0 || self.pos + seqlen > self.pat.len() {
            return Token::IllegalSeq;
        }
        let (c, declen) = utf8_decode(&self.pat[self.pos..]);
        if declen != seqlen {
            return Token::IllegalSeq;
        }
        self.pos += declen;
        Token::Char(c)
    }

    /// Count the parity of backslashes directly before `at`; `true` when
    /// the byte at `at` is escaped.
    fn escaped_at(&self, at: usize) -> bool {
        let mut escaped = false;
        let mut i = at;
        while i > 0 && self.pat[i - 1] == b'\\' {
            escaped = !escaped;
            i -= 1;
        }
        escaped
    }

    /// `^` context check: anchor at pattern start or after an unescaped
    /// open-group, over raw pattern text.
    fn caret_is_anchor(&self) -> bool {
        // self.pos points just past the '^'.
        let at = self.pos - 1;
        if at == 0 {
            return true;
        }
        if self.pat[at - 1] != b'(' {
            return false;
        }
        let mut escaped = self.escaped_at(at - 1);
        if !self.has(Syntax::NO_BK_PARENS) {
            // Groups are written \( here, so the meaning flips.
            escaped = !escaped;
        }
        !escaped
    }

    /// `$` context check: anchor at pattern end or before a close-group.
    fn dollar_is_anchor(&self) -> bool {
        if self.at_end() {
            return true;
        }
        if self.has(Syntax::NO_BK_PARENS) {
            self.peek(0) == b')'
        } else {
            self.peek(0) == b'\\' && self.peek(1) == b')'
        }
    }

    /// Read up to `ndigits` octal digits; 0x80..0xFF become raw bytes.
    fn yield_octal(&mut self) -> Token {
        let mut ord: u32 = 0;
        for _ in 0..3 {
            let c = self.peek(0);
            if !(b'0'..=b'7').contains(&c) {
                break;
            }
            ord = (ord << 3) | (c - b'0') as u32;
            self.pos += 1;
        }
        if ord >= 0x80 {
            Token::Byte((ord & 0xff) as u8)
        } else {
            Token::Char(ord as u8 as char)
        }
    }

    /// Read a fixed-width hex escape (`\xHH`, `\uHHHH`, `\UHHHHHHHH`).
    ///
    /// On an invalid digit the partially consumed escape is rewound and
    /// the escape decays to a default literal escape; never an error.
    fn yield_hex(&mut self, kind: u8) -> Token {
        let ndigits = match kind {
            b'U' => 8,
            b'u' => 4,
            _ => 2,
        };
        let mut ord: u32 = 0;
        for i in 0..ndigits {
            let c = self.peek(0) as char;
            match c.to_digit(16) {
                Some(d) => {
                    ord = (ord << 4) | d;
                    self.pos += 1;
                }
                None => {
                    self.pos -= i;
                    return Token::Char(kind as char);
                }
            }
        }
        if ord > char::MAX as u32 || (0xd800..=0xdfff).contains(&ord) {
            self.pos -= ndigits;
            return Token::Char(kind as char);
        }
        if kind == b'x' && ord >= 0x80 {
            // \x80..\xFF are raw bytes, not U+0080..U+00FF.
            return Token::Byte(ord as u8);
        }
        Token::Char(char::from_u32(ord).unwrap_or('\u{fffd}'))
    }

    /// Yield the next token and advance the cursor (except for error
    /// tokens, which are sticky).
    pub fn next_token(&mut self) -> Token {
        if self.at_end() {
            return Token::Eof;
        }
        let ch = self.pat[self.pos];
        self.pos += 1;
        match ch {
            b'.' => return Token::Any,

            b'[' => return Token::StartSet,

            b'{' => {
                if self.has(Syntax::INTERVALS) && self.has(Syntax::NO_BK_BRACES) {
                    if !self.has(Syntax::INVALID_INTERVAL_ORD)
                        || is_valid_interval(&self.pat[self.pos..], self.syntax)
                    {
                        return Token::StartInterval;
                    }
                }
            }

            b'(' => {
                if self.has(Syntax::NO_BK_PARENS) {
                    return Token::StartGroup;
                }
            }

            b')' => {
                if self.has(Syntax::NO_BK_PARENS)
                    && !self.has(Syntax::UNMATCHED_RIGHT_PAREN_ORD)
                {
                    return Token::EndGroup;
                }
            }

            b'^' => {
                if self.has(Syntax::CONTEXT_INDEP_ANCHORS)
                    || self.has(Syntax::CARET_ANCHORS_HERE)
                    || self.caret_is_anchor()
                {
                    return Token::AtSol;
                }
            }

            b'$' => {
                if self.has(Syntax::CONTEXT_INDEP_ANCHORS) || self.dollar_is_anchor() {
                    return Token::AtEol;
                }
            }

            b'+' => {
                if !self.has(Syntax::LIMITED_OPS) && !self.has(Syntax::BK_PLUS_QM) {
                    return Token::Plus;
                }
            }

            b'?' => {
                if !self.has(Syntax::LIMITED_OPS) && !self.has(Syntax::BK_PLUS_QM) {
                    return Token::Qmark;
                }
            }

            b'*' => return Token::Star,

            b'\n' => {
                if self.has(Syntax::NEWLINE_ALT) && !self.has(Syntax::LIMITED_OPS) {
                    return Token::Alternation;
                }
            }

            b'|' => {
                if !self.has(Syntax::LIMITED_OPS) && self.has(Syntax::NO_BK_VBAR) {
                    return Token::Alternation;
                }
            }

            b'\\' => return self.next_escaped_token(),

            _ => {
                if ch >= 0x80 {
                    self.pos -= 1;
                    return self.yield_high_byte();
                }
            }
        }
        Token::Char(ch as char)
    }

    fn next_escaped_token(&mut self) -> Token {
        if self.at_end() {
            self.pos -= 1; // keep yielding this token
            return Token::UnmatchedBackslash;
        }
        let ch = self.pat[self.pos];
        self.pos += 1;
        match ch {
            b'{' => {
                if self.has(Syntax::INTERVALS) && !self.has(Syntax::NO_BK_BRACES) {
                    if !self.has(Syntax::INVALID_INTERVAL_ORD)
                        || is_valid_interval(&self.pat[self.pos..], self.syntax)
                    {
                        return Token::StartInterval;
                    }
                }
            }

            b'(' => {
                if !self.has(Syntax::NO_BK_PARENS) {
                    return Token::StartGroup;
                }
            }

            b')' => {
                if !self.has(Syntax::NO_BK_PARENS)
                    && !self.has(Syntax::UNMATCHED_RIGHT_PAREN_ORD)
                {
                    return Token::EndGroup;
                }
            }

            b'+' => {
                if !self.has(Syntax::LIMITED_OPS) && self.has(Syntax::BK_PLUS_QM) {
                    return Token::Plus;
                }
            }

            b'?' => {
                if !self.has(Syntax::LIMITED_OPS) && self.has(Syntax::BK_PLUS_QM) {
                    return Token::Qmark;
                }
            }

            b'|' => {
                if !self.has(Syntax::LIMITED_OPS) && !self.has(Syntax::NO_BK_VBAR) {
                    return Token::Alternation;
                }
            }

            b'w' | b'W' => {
                if !self.has(Syntax::NO_GNU_OPS) {
                    return Token::ClassSym { negate: ch == b'W' };
                }
            }

            b's' | b'S' => {
                if !self.has(Syntax::NO_GNU_OPS) {
                    return Token::ClassSpace { negate: ch == b'S' };
                }
            }

            b'd' | b'D' => {
                if !self.has(Syntax::NO_VENDOR_OPS) {
                    return Token::ClassDigit { negate: ch == b'D' };
                }
            }

            b'n' | b'N' => {
                if !self.has(Syntax::NO_VENDOR_OPS) {
                    return Token::ClassLf { negate: ch == b'N' };
                }
            }

            b'`' => {
                if !self.has(Syntax::NO_GNU_OPS) {
                    return Token::AtSoi;
                }
            }

            b'\'' => {
                if !self.has(Syntax::NO_GNU_OPS) {
                    return Token::AtEoi;
                }
            }

            b'A' => {
                if !self.has(Syntax::NO_VENDOR_OPS) {
                    return Token::AtSoi;
                }
            }

            b'Z' => {
                if !self.has(Syntax::NO_VENDOR_OPS) {
                    return Token::AtEoi;
                }
            }

            b'b' | b'B' => {
                if !self.has(Syntax::NO_GNU_OPS) {
                    return Token::AtWob { negate: ch == b'B' };
                }
            }

            b'<' => {
                if !self.has(Syntax::NO_GNU_OPS) {
                    return Token::AtSow;
                }
            }

            b'>' => {
                if !self.has(Syntax::NO_GNU_OPS) {
                    return Token::AtEow;
                }
            }

            b'_' => {
                if self.peek(0) == b'<' {
                    self.pos += 1;
                    return Token::AtSos;
                }
                if self.peek(0) == b'>' {
                    self.pos += 1;
                    return Token::AtEos;
                }
            }

            b'1'..=b'9' => {
                if !self.has(Syntax::NO_BK_REFS) {
                    return Token::Backref(ch - b'0');
                }
            }

            b'0' => {
                if !self.has(Syntax::NO_VENDOR_OPS) {
                    return self.yield_octal();
                }
            }

            b'u' | b'U' => {
                if !self.has(Syntax::NO_VENDOR_OPS) && !self.has(Syntax::NO_UTF8) {
                    return self.yield_hex(ch);
                }
            }

            b'x' => {
                if !self.has(Syntax::NO_VENDOR_OPS) {
                    return self.yield_hex(ch);
                }
            }

            _ => {
                if ch >= 0x80 {
                    self.pos -= 1;
                    return self.yield_high_byte();
                }
            }
        }
        Token::Char(ch as char)
    }

    /// Yield a literal inside a bracket expression: a code point, a raw
    /// byte, or a sticky error token. Only the escape families that make
    /// sense inside a class are honored.
    pub fn next_cs_literal(&mut self) -> Token {
        if self.at_end() {
            return Token::Eof;
        }
        let ch = self.pat[self.pos];
        if ch >= 0x80 {
            return self.yield_high_byte();
        }
        self.pos += 1;
        if ch == b'\\'
            && self.has(Syntax::BACKSLASH_ESCAPE_IN_LISTS)
            && !self.has(Syntax::NO_VENDOR_OPS)
        {
            if self.at_end() {
                self.pos -= 1;
                return Token::UnmatchedBackslash;
            }
            let esc = self.pat[self.pos];
            self.pos += 1;
            match esc {
                b'0' => return self.yield_octal(),
                b'x' => return self.yield_hex(b'x'),
                b'u' | b'U' => {
                    if !self.has(Syntax::NO_UTF8) {
                        return self.yield_hex(esc);
                    }
                }
                _ => {
                    if esc >= 0x80 {
                        self.pos -= 1;
                        return self.yield_high_byte();
                    }
                }
            }
            return Token::Char(esc as char);
        }
        Token::Char(ch as char)
    }

    /// Read a collating-element name (or single character) inside
    /// `[.xxx.]` / `[=xxx=]`. Multi-character names resolve through the
    /// POSIX table; unknown names without delimiter structure fall back
    /// to their first character.
    pub fn next_collating_char(&mut self) -> Token {
        let ch = self.peek(0);
        if ch >= 0x80 {
            // Code points above ASCII never participate in collations.
            return self.next_cs_literal();
        }
        if self.at_end() {
            return Token::Eof;
        }
        let mut len = 1;
        loop {
            let b = self.peek(len);
            if b == b'.' || b == b'=' || b == 0 {
                break;
            }
            len += 1;
        }
        if len > 1 {
            let name = &self.pat[self.pos..self.pos + len];
            if let Ok(idx) =
                POSIX_CCHARS.binary_search_by(|&(n, _)| n.as_bytes().cmp(name))
            {
                self.pos += len;
                return Token::Char(POSIX_CCHARS[idx].1 as char);
            }
        }
        self.pos += 1;
        Token::Char(ch as char)
    }
}

/// Parse an interval body with the cursor just past the opening brace.
/// Returns the interval and the number of pattern bytes consumed
/// (including the closing brace), or `None` when malformed.
pub fn parse_interval(pat: &[u8], syntax: Syntax) -> Option<(Interval, usize)> {
    let no_bk = syntax.contains(Syntax::NO_BK_BRACES);
    let mut i = 0usize;
    let digit = |p: &[u8], i: usize| p.get(i).filter(|b| b.is_ascii_digit()).map(|b| b - b'0');

    let mut min: u32 = digit(pat, i)? as u32;
    i += 1;
    while let Some(d) = digit(pat, i) {
        min = min.checked_mul(10)?.checked_add(d as u32)?;
        i += 1;
    }

    let mut unbounded = false;
    let mut max = min;
    if pat.get(i) == Some(&b',') {
        i += 1;
        let closed = if no_bk {
            pat.get(i) == Some(&b'}')
        } else {
            pat.get(i) == Some(&b'\\') && pat.get(i + 1) == Some(&b'}')
        };
        if closed {
            unbounded = true;
        } else {
            max = digit(pat, i)? as u32;
            i += 1;
            while let Some(d) = digit(pat, i) {
                max = max.checked_mul(10)?.checked_add(d as u32)?;
                i += 1;
            }
        }
    }

    if no_bk {
        if pat.get(i) != Some(&b'}') {
            return None;
        }
        i += 1;
    } else {
        if pat.get(i) != Some(&b'\\') || pat.get(i + 1) != Some(&b'}') {
            return None;
        }
        i += 2;
    }

    if min > max || max > u8::MAX as u32 {
        return None;
    }
    Some((
        Interval {
            min: min as u8,
            max: max as u8,
            unbounded,
        },
        i,
    ))
}

fn is_valid_interval(pat: &[u8], syntax: Syntax) -> bool {
    parse_interval(pat, syntax).is_some()
}

/// Collating character names from the POSIX locale, sorted by name.
pub(crate) static POSIX_CCHARS: &[(&str, u8)] = &[
    ("ACK", 0x06),
    ("BEL", 0x07),
    ("BS", 0x08),
    ("CAN", 0x18),
    ("CR", 0x0d),
    ("DC1", 0x11),
    ("DC2", 0x12),
    ("DC3", 0x13),
    ("DC4", 0x14),
    ("DEL", 0x7f),
    ("DLE", 0x10),
    ("EM", 0x19),
    ("ENQ", 0x05),
    ("EOT", 0x04),
    ("ESC", 0x1b),
    ("ETB", 0x17),
    ("ETX", 0x03),
    ("FF", 0x0c),
    ("FS", 0x1c),
    ("GS", 0x1d),
    ("HT", 0x09),
    ("IS1", 0x1f),
    ("IS2", 0x1e),
    ("IS3", 0x1d),
    ("IS4", 0x1c),
    ("LF", 0x0a),
    ("NAK", 0x15),
    ("NUL", 0x01),
    ("RS", 0x1e),
    ("SI", 0x0f),
    ("SO", 0x0e),
    ("SOH", 0x01),
    ("STX", 0x02),
    ("SUB", 0x1a),
    ("SYN", 0x16),
    ("US", 0x1f),
    ("VT", 0x0b),
    ("alert", 0x07),
    ("ampersand", b'&'),
    ("apostrophe", b'\''),
    ("asterisk", b'*'),
    ("backslash", b'\\'),
    ("backspace", 0x08),
    ("carriage-return", 0x0d),
    ("circumflex", b'^'),
    ("circumflex-accent", b'^'),
    ("colon", b':'),
    ("comma", b','),
    ("commercial-at", b'@'),
    ("dollar-sign", b'$'),
    ("eight", b'8'),
    ("equals-sign", b'='),
    ("exclamation-mark", b'!'),
    ("five", b'5'),
    ("form-feed", 0x0c),
    ("four", b'4'),
    ("full-stop", b'.'),
    ("grave-accent", b'`'),
    ("greater-than-sign", b'>'),
    ("hyphen", b'-'),
    ("hyphen-minus", b'-'),
    ("left-brace", b'{'),
    ("left-curly-bracket", b'{'),
    ("left-parenthesis", b'('),
    ("left-square-bracket", b'['),
    ("less-than-sign", b'<'),
    ("low-line", b'_'),
    ("newline", 0x0a),
    ("nine", b'9'),
    ("number-sign", b'#'),
    ("one", b'1'),
    ("percent-sign", b'%'),
    ("period", b'.'),
    ("plus-sign", b'+'),
    ("question-mark", b'?'),
    ("quotation-mark", b'"'),
    ("reverse-solidus", b'\\'),
    ("right-brace", b'}'),
    ("right-curly-bracket", b'}'),
    ("right-parenthesis", b')'),
    ("right-square-bracket", b']'),
    ("semicolon", b';'),
    ("seven", b'7'),
    ("six", b'6'),
    ("slash", b'/'),
    ("solidus", b'/'),
    ("space", b' '),
    ("tab", 0x09),
    ("three", b'3'),
    ("tilde", b'~'),
    ("two", b'2'),
    ("underscore", b'_'),
    ("vertical-line", b'|'),
    ("vertical-tab", 0x0b),
    ("zero", b'0'),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regsyntax::{SYNTAX_POSIX_BASIC, SYNTAX_POSIX_EXTENDED};

    fn tokens(pat: &str, syntax: Syntax) -> Vec<Token> {
        let mut p = Parser::new(pat.as_bytes(), syntax);
        let mut out = Vec::new();
        loop {
            let t = p.next_token();
            if t == Token::Eof || t.is_error() {
                out.push(t);
                return out;
            }
            out.push(t);
        }
    }

    #[test]
    fn ere_operators() {
        let t = tokens("a(b|c)+", SYNTAX_POSIX_EXTENDED);
        assert_eq!(
            t,
            vec![
                Token::Char('a'),
                Token::StartGroup,
                Token::Char('b'),
                Token::Alternation,
                Token::Char('c'),
                Token::EndGroup,
                Token::Plus,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn bre_operators_need_backslashes() {
        let t = tokens(r"a\(b\)", SYNTAX_POSIX_BASIC);
        assert_eq!(
            t,
            vec![
                Token::Char('a'),
                Token::StartGroup,
                Token::Char('b'),
                Token::EndGroup,
                Token::Eof,
            ]
        );
        // Unescaped parens are literals in BRE.
        let t = tokens("(b)", SYNTAX_POSIX_BASIC);
        assert_eq!(
            t,
            vec![Token::Char('('), Token::Char('b'), Token::Char(')'), Token::Eof]
        );
    }

    #[test]
    fn caret_dollar_context() {
        // Mid-pattern '^' is a literal in BRE...
        let t = tokens("a^b", SYNTAX_POSIX_BASIC);
        assert_eq!(t[1], Token::Char('^'));
        // ...but an anchor at the start and right after a group-open.
        let t = tokens(r"^a\(^b\)", SYNTAX_POSIX_BASIC);
        assert_eq!(t[0], Token::AtSol);
        assert_eq!(t[3], Token::AtSol);
        // '$' before close-group is an anchor.
        let t = tokens(r"\(a$\)", SYNTAX_POSIX_BASIC);
        assert_eq!(t[2], Token::AtEol);
    }

    #[test]
    fn escaped_group_open_does_not_anchor_caret() {
        // "\\(^" under ERE: the ( is escaped, so ^ stays a literal.
        let t = tokens(r"a\(^b", SYNTAX_POSIX_EXTENDED.difference(Syntax::CONTEXT_INDEP_ANCHORS));
        assert_eq!(t[1], Token::Char('('));
        assert_eq!(t[2], Token::Char('^'));
    }

    #[test]
    fn backrefs_and_classes() {
        let t = tokens(r"\1\w\D", SYNTAX_POSIX_BASIC);
        assert_eq!(
            t,
            vec![
                Token::Backref(1),
                Token::ClassSym { negate: false },
                Token::ClassDigit { negate: true },
                Token::Eof,
            ]
        );
    }

    #[test]
    fn trailing_backslash_is_sticky() {
        let mut p = Parser::new(br"a\", SYNTAX_POSIX_BASIC);
        assert_eq!(p.next_token(), Token::Char('a'));
        let pos = p.pos;
        assert_eq!(p.next_token(), Token::UnmatchedBackslash);
        assert_eq!(p.pos, pos);
        assert_eq!(p.next_token(), Token::UnmatchedBackslash);
    }

    #[test]
    fn octal_and_hex_escapes() {
        let pat = "\\0101\\x41\\x80ä".as_bytes();
        let mut p = Parser::new(pat, SYNTAX_POSIX_BASIC);
        assert_eq!(p.next_token(), Token::Char('A'));
        assert_eq!(p.next_token(), Token::Char('A'));
        assert_eq!(p.next_token(), Token::Byte(0x80));
        assert_eq!(p.next_token(), Token::Char('ä'));
    }

    #[test]
    fn bad_hex_digit_decays_to_literal() {
        let mut p = Parser::new(br"\xZZ", SYNTAX_POSIX_BASIC);
        assert_eq!(p.next_token(), Token::Char('x'));
        assert_eq!(p.next_token(), Token::Char('Z'));
    }

    #[test]
    fn utf8_literals() {
        let mut p = Parser::new("aä".as_bytes(), SYNTAX_POSIX_BASIC);
        assert_eq!(p.next_token(), Token::Char('a'));
        assert_eq!(p.next_token(), Token::Char('ä'));
        assert_eq!(p.next_token(), Token::Eof);

        let mut p = Parser::new("ä".as_bytes(), SYNTAX_POSIX_BASIC.union(Syntax::NO_UTF8));
        assert_eq!(p.next_token(), Token::Byte(0xc3));
        assert_eq!(p.next_token(), Token::Byte(0xa4));
    }

    #[test]
    fn truncated_utf8_is_sticky_error() {
        let mut p = Parser::new(&[0xc3][..], SYNTAX_POSIX_BASIC);
        assert_eq!(p.next_token(), Token::IllegalSeq);
        assert_eq!(p.next_token(), Token::IllegalSeq);
    }

    #[test]
    fn intervals() {
        let (iv, used) = parse_interval(b"2,5}", SYNTAX_POSIX_EXTENDED).unwrap();
        assert_eq!((iv.min, iv.max, iv.unbounded), (2, 5, false));
        assert_eq!(used, 4);

        let (iv, _) = parse_interval(b"3,}", SYNTAX_POSIX_EXTENDED).unwrap();
        assert!(iv.unbounded);
        assert_eq!(iv.min, 3);

        let (iv, used) = parse_interval(br"4\}", SYNTAX_POSIX_BASIC).unwrap();
        assert_eq!((iv.min, iv.max), (4, 4));
        assert_eq!(used, 3);

        // Reversed and oversized intervals are malformed.
        assert!(parse_interval(b"5,2}", SYNTAX_POSIX_EXTENDED).is_none());
        assert!(parse_interval(b"1,999}", SYNTAX_POSIX_EXTENDED).is_none());
    }

    #[test]
    fn invalid_interval_ord_downgrades_brace() {
        let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::INVALID_INTERVAL_ORD);
        let t = tokens("a{x}", syn);
        assert_eq!(t[1], Token::Char('{'));
        let t = tokens("a{2}", syn);
        assert_eq!(t[1], Token::StartInterval);
    }

    #[test]
    fn collating_names() {
        let mut p = Parser::new(b"tab.]", SYNTAX_POSIX_BASIC);
        assert_eq!(p.next_collating_char(), Token::Char('\t'));
        let mut p = Parser::new(b"bogusname.]", SYNTAX_POSIX_BASIC);
        assert_eq!(p.next_collating_char(), Token::Char('b'));
    }

    #[test]
    fn cchar_table_is_sorted() {
        for w in POSIX_CCHARS.windows(2) {
            assert!(w[0].0 < w[1].0, "{} >= {}", w[0].0, w[1].0);
        }
    }
}
