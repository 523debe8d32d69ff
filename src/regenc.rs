// regenc.rs - UTF-8 primitives and character trait predicates.
//
// The engine operates on raw byte buffers; these helpers decode/encode
// UTF-8 sequences at arbitrary byte offsets and answer the trait-class
// questions used by bracket expressions and word-boundary assertions.

/// Maximum length of one encoded UTF-8 sequence handled by the engine.
pub const UTF8_CURLEN: usize = 4;

/// Sequence length per lead byte; 0 for continuation bytes and invalid
/// leads (0xC0/0xC1, 0xF5..).
pub static UTF8_SEQLEN: [u8; 256] = {
    let mut t = [0u8; 256];
    let mut i = 0usize;
    while i < 0x80 {
        t[i] = 1;
        i += 1;
    }
    let mut i = 0xc2usize;
    while i < 0xe0 {
        t[i] = 2;
        i += 1;
    }
    let mut i = 0xe0usize;
    while i < 0xf0 {
        t[i] = 3;
        i += 1;
    }
    let mut i = 0xf0usize;
    while i < 0xf5 {
        t[i] = 4;
        i += 1;
    }
    t
};

#[inline]
pub fn utf8_seqlen(lead: u8) -> usize {
    UTF8_SEQLEN[lead as usize] as usize
}

#[inline]
fn is_cont(b: u8) -> bool {
    b & 0xc0 == 0x80
}

/// Decode one UTF-8 sequence from the front of `bytes`.
///
/// Returns the scalar and the number of bytes consumed. A truncated or
/// malformed sequence decodes as the single lead byte, so byte-wise
/// progress is always made.
pub fn utf8_decode(bytes: &[u8]) -> (char, usize) {
    let b0 = match bytes.first() {
        Some(&b) => b,
        None => return ('\0', 0),
    };
    let len = utf8_seqlen(b0);
    if len <= 1 || bytes.len() < len {
        return (byte_as_char(b0), 1);
    }
    let mut cp = (b0 as u32) & (0x7f >> len);
    for &b in &bytes[1..len] {
        if !is_cont(b) {
            return (byte_as_char(b0), 1);
        }
        cp = (cp << 6) | (b as u32 & 0x3f);
    }
    match char::from_u32(cp) {
        Some(c) => (c, len),
        None => (byte_as_char(b0), 1),
    }
}

/// Decode the UTF-8 sequence that ends at the end of `bytes`.
///
/// Returns the scalar and its encoded length. A dangling continuation
/// byte decodes as itself with length 1.
pub fn utf8_decode_last(bytes: &[u8]) -> (char, usize) {
    let n = bytes.len();
    if n == 0 {
        return ('\0', 0);
    }
    let last = bytes[n - 1];
    if last < 0x80 {
        return (last as char, 1);
    }
    // Seek back to a lead byte, at most 3 continuation bytes.
    let mut start = n - 1;
    while start > 0 && is_cont(bytes[start]) && n - start < UTF8_CURLEN {
        start -= 1;
    }
    let len = utf8_seqlen(bytes[start]);
    if len == n - start {
        let (c, declen) = utf8_decode(&bytes[start..]);
        if declen == len {
            return (c, len);
        }
    }
    (byte_as_char(last), 1)
}

/// Encode `c` into `buf`, returning the number of bytes written.
pub fn utf8_encode(c: char, buf: &mut [u8; UTF8_CURLEN]) -> usize {
    c.encode_utf8(buf).len()
}

/// A raw byte promoted to a scalar value (used for undecodable input).
#[inline]
pub fn byte_as_char(b: u8) -> char {
    // 0x80..0xFF are all valid scalar values.
    char::from_u32(b as u32).unwrap_or('\u{fffd}')
}

// === Case mapping ===

/// Single-scalar lower-case mapping; identity for multi-scalar foldings.
pub fn uni_tolower(c: char) -> char {
    let mut it = c.to_lowercase();
    match (it.next(), it.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Single-scalar upper-case mapping; identity for multi-scalar foldings.
pub fn uni_toupper(c: char) -> char {
    let mut it = c.to_uppercase();
    match (it.next(), it.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

// === Line feeds ===

#[inline]
pub fn ascii_is_lf(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

#[inline]
pub fn uni_is_lf(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

// === Symbol (word) characters ===

#[inline]
pub fn byte_is_sym_start(b: u8) -> bool {
    b == b'$' || b == b'_' || b.is_ascii_alphabetic()
}

#[inline]
pub fn byte_is_sym_cont(b: u8) -> bool {
    b == b'$' || b == b'_' || b.is_ascii_alphanumeric()
}

#[inline]
pub fn uni_is_sym_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

#[inline]
pub fn uni_is_sym_cont(c: char) -> bool {
    uni_is_sym_start(c) || c.is_numeric()
}

// === Trait classes ===
//
// Indices match the charset sub-opcode order in `regint::recs`.

pub const TRAIT_CNTRL: u8 = 0;
pub const TRAIT_SPACE: u8 = 1;
pub const TRAIT_UPPER: u8 = 2;
pub const TRAIT_LOWER: u8 = 3;
pub const TRAIT_ALPHA: u8 = 4;
pub const TRAIT_DIGIT: u8 = 5;
pub const TRAIT_XDIGIT: u8 = 6;
pub const TRAIT_ALNUM: u8 = 7;
pub const TRAIT_PUNCT: u8 = 8;
pub const TRAIT_GRAPH: u8 = 9;
pub const TRAIT_PRINT: u8 = 10;
pub const TRAIT_BLANK: u8 = 11;
pub const TRAIT_SYMSTRT: u8 = 12;
pub const TRAIT_SYMCONT: u8 = 13;
pub const TRAIT_TAB: u8 = 14;
pub const TRAIT_WHITE: u8 = 15;
pub const TRAIT_EMPTY: u8 = 16;
pub const TRAIT_LF: u8 = 17;
pub const TRAIT_HEX: u8 = 18;
pub const TRAIT_TITLE: u8 = 19;
pub const TRAIT_NUMERIC: u8 = 20;
pub const TRAIT_COUNT: usize = 21;

/// Trait-class membership for a decoded scalar.
pub fn char_has_trait(c: char, class: u8) -> bool {
    match class {
        TRAIT_CNTRL => c.is_control(),
        TRAIT_SPACE => c.is_whitespace(),
        TRAIT_UPPER => c.is_uppercase(),
        TRAIT_LOWER => c.is_lowercase(),
        TRAIT_ALPHA => c.is_alphabetic(),
        TRAIT_DIGIT => c.is_ascii_digit() || (!c.is_ascii() && c.is_numeric()),
        TRAIT_XDIGIT => c.is_ascii_hexdigit(),
        TRAIT_ALNUM => c.is_alphanumeric(),
        TRAIT_PUNCT => {
            if c.is_ascii() {
                c.is_ascii_punctuation()
            } else {
                !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
            }
        }
        TRAIT_GRAPH => !c.is_whitespace() && !c.is_control(),
        TRAIT_PRINT => !c.is_control(),
        TRAIT_BLANK => c == ' ' || c == '\t',
        TRAIT_SYMSTRT => uni_is_sym_start(c),
        TRAIT_SYMCONT => uni_is_sym_cont(c),
        TRAIT_TAB => matches!(c, '\t' | '\u{b}' | '\u{c}'),
        TRAIT_WHITE => c == ' ',
        TRAIT_EMPTY => matches!(c, ' ' | '\t' | '\u{b}' | '\u{c}'),
        TRAIT_LF => uni_is_lf(c),
        TRAIT_HEX => matches!(c, 'a'..='f' | 'A'..='F'),
        TRAIT_TITLE => c.is_uppercase(),
        TRAIT_NUMERIC => c.is_numeric(),
        _ => false,
    }
}

/// Trait-class membership for a raw byte (byte-oriented patterns).
pub fn byte_has_trait(b: u8, class: u8) -> bool {
    match class {
        TRAIT_CNTRL => b.is_ascii_control(),
        TRAIT_SPACE => b == b' ' || (0x09..=0x0d).contains(&b),
        TRAIT_UPPER => b.is_ascii_uppercase(),
        TRAIT_LOWER => b.is_ascii_lowercase(),
        TRAIT_ALPHA => b.is_ascii_alphabetic(),
        TRAIT_DIGIT => b.is_ascii_digit(),
        TRAIT_XDIGIT => b.is_ascii_hexdigit(),
        TRAIT_ALNUM => b.is_ascii_alphanumeric(),
        TRAIT_PUNCT => b.is_ascii_punctuation(),
        TRAIT_GRAPH => b.is_ascii_graphic(),
        TRAIT_PRINT => b.is_ascii_graphic() || b == b' ',
        TRAIT_BLANK => b == b' ' || b == b'\t',
        TRAIT_SYMSTRT => byte_is_sym_start(b),
        TRAIT_SYMCONT => byte_is_sym_cont(b),
        TRAIT_TAB => matches!(b, 0x09 | 0x0b | 0x0c),
        TRAIT_WHITE => b == b' ',
        TRAIT_EMPTY => matches!(b, 0x09 | 0x0b | 0x0c | 0x20),
        TRAIT_LF => matches!(b, 0x0a | 0x0d),
        TRAIT_HEX => matches!(b, b'a'..=b'f' | b'A'..=b'F'),
        TRAIT_TITLE => b.is_ascii_uppercase(),
        TRAIT_NUMERIC => b.is_ascii_digit(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seqlen_table() {
        assert_eq!(utf8_seqlen(b'a'), 1);
        assert_eq!(utf8_seqlen(0xc3), 2);
        assert_eq!(utf8_seqlen(0xe2), 3);
        assert_eq!(utf8_seqlen(0xf0), 4);
        assert_eq!(utf8_seqlen(0x80), 0);
        assert_eq!(utf8_seqlen(0xc0), 0);
        assert_eq!(utf8_seqlen(0xff), 0);
    }

    #[test]
    fn decode_roundtrip() {
        for c in ['a', 'ß', 'あ', '💻'] {
            let mut buf = [0u8; UTF8_CURLEN];
            let n = utf8_encode(c, &mut buf);
            assert_eq!(utf8_decode(&buf[..n]), (c, n));
            assert_eq!(utf8_decode_last(&buf[..n]), (c, n));
        }
    }

    #[test]
    fn decode_dangling_bytes() {
        // Truncated sequence decodes as the lead byte alone.
        assert_eq!(utf8_decode(&[0xc3]), (byte_as_char(0xc3), 1));
        // Continuation byte decodes as itself.
        assert_eq!(utf8_decode(&[0xb6, b'x']), (byte_as_char(0xb6), 1));
        assert_eq!(utf8_decode_last(&[b'a', 0xb6]), (byte_as_char(0xb6), 1));
    }

    #[test]
    fn trait_classes() {
        assert!(char_has_trait('7', TRAIT_DIGIT));
        assert!(char_has_trait('x', TRAIT_SYMCONT));
        assert!(char_has_trait('ä', TRAIT_ALPHA));
        assert!(!char_has_trait('7', TRAIT_HEX));
        assert!(char_has_trait('c', TRAIT_HEX));
        assert!(byte_has_trait(b'_', TRAIT_SYMSTRT));
        assert!(!byte_has_trait(b'7', TRAIT_SYMSTRT));
        assert!(byte_has_trait(b'7', TRAIT_SYMCONT));
    }
}
