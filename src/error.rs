// error.rs - Error types for Ferrex.
//
// One enum covers both compile-time pattern errors and the two fatal
// execution outcomes. "No match" is not an error and is reported as
// `Ok(None)` by the execution entry points.

use std::fmt;

/// Error type for regex compilation and matching operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// General pattern syntax error.
    BadPattern,
    /// Unmatched `[` or `[^`.
    UnmatchedBracket,
    /// Unmatched `(` or `\(`.
    UnmatchedParen,
    /// Unmatched `)` or `\)`.
    UnmatchedCloseParen,
    /// Invalid content of `{...}` or `\{...\}`.
    BadInterval,
    /// Invalid back reference (undefined or not-yet-closed group).
    BadBackref,
    /// Invalid character range end point (e.g. `[z-a]`).
    BadRange,
    /// Unknown collating element in `[.xxx.]` or `[=xxx=]`.
    BadCollatingElement,
    /// Unknown character class name in `[:xxx:]`.
    BadCharClass,
    /// Trailing backslash at the end of the pattern.
    TrailingBackslash,
    /// Repetition operator with nothing preceding it.
    BadRepeat,
    /// Unexpected end of pattern.
    UnexpectedEof,
    /// Compiled pattern would exceed the maximum bytecode size, or the
    /// pattern uses more groups/counters than the encoding can address.
    PatternTooLarge,
    /// Illegal multi-byte sequence in the pattern.
    IllegalSequence,
    /// Raw bytes and decoded code points mixed in one bracket expression.
    IllegalCharset,
    /// The on-failure stack reached its configured ceiling; the search
    /// space of the pattern was exhausted without a verdict.
    StackLimit,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::BadPattern => "invalid regular expression",
            Error::UnmatchedBracket => "unmatched [ or [^",
            Error::UnmatchedParen => "unmatched ( or \\(",
            Error::UnmatchedCloseParen => "unmatched ) or \\)",
            Error::BadInterval => "invalid content of {}",
            Error::BadBackref => "invalid back reference",
            Error::BadRange => "invalid range end",
            Error::BadCollatingElement => "invalid collating element",
            Error::BadCharClass => "invalid character class name",
            Error::TrailingBackslash => "trailing backslash",
            Error::BadRepeat => "repetition operator operand invalid",
            Error::UnexpectedEof => "unexpected end of pattern",
            Error::PatternTooLarge => "compiled pattern too big",
            Error::IllegalSequence => "illegal byte sequence",
            Error::IllegalCharset => "raw bytes and code points mixed in character class",
            Error::StackLimit => "backtracking stack limit exceeded",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}
