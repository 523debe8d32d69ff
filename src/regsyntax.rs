// regsyntax.rs - Syntax flag set and dialect presets.
//
// Each flag toggles one independent tokenizer/compiler behavior; a dialect
// is nothing but a combination of flags. The presets below mirror the
// classic POSIX/GNU tool dialects.

use bitflags::bitflags;

bitflags! {
    /// Dialect switches consulted by the tokenizer and compiler.
    ///
    /// An empty set is the most conservative core: operators `( ) { }` and
    /// `|` need backslashes, no intervals, no character classes, all escape
    /// extensions enabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Syntax: u32 {
        /// `\` quotes special characters inside `[...]` lists.
        const BACKSLASH_ESCAPE_IN_LISTS = 1 << 0;
        /// `+` and `?` are operators only when written `\+` / `\?`.
        const BK_PLUS_QM = 1 << 1;
        /// `[:alpha:]` style character classes are recognized.
        const CHAR_CLASSES = 1 << 2;
        /// `^` and `$` are anchors in any position.
        const CONTEXT_INDEP_ANCHORS = 1 << 3;
        /// A repetition operator with no preceding expression is an error
        /// instead of a literal.
        const CONTEXT_INVALID_OPS = 1 << 4;
        /// `.` also matches a newline.
        const DOT_NEWLINE = 1 << 5;
        /// `.` does not match a NUL byte.
        const DOT_NOT_NULL = 1 << 6;
        /// `[^...]` implicitly excludes a newline.
        const HAT_LISTS_NOT_NEWLINE = 1 << 7;
        /// `{m,n}` style intervals are recognized.
        const INTERVALS = 1 << 8;
        /// `+`, `?` and `|` are disabled entirely.
        const LIMITED_OPS = 1 << 9;
        /// A raw newline in the pattern acts as `|`.
        const NEWLINE_ALT = 1 << 10;
        /// Intervals are written `{...}` instead of `\{...\}`.
        const NO_BK_BRACES = 1 << 11;
        /// Groups are written `(...)` instead of `\(...\)`.
        const NO_BK_PARENS = 1 << 12;
        /// `\1`..`\9` back references are disabled.
        const NO_BK_REFS = 1 << 13;
        /// Alternation is written `|` instead of `\|`.
        const NO_BK_VBAR = 1 << 14;
        /// A reversed range such as `[z-a]` is an error instead of empty.
        const NO_EMPTY_RANGES = 1 << 15;
        /// An unmatched `)` is a literal instead of an error.
        const UNMATCHED_RIGHT_PAREN_ORD = 1 << 16;
        /// First successful path wins; no exhaustive longest-match search.
        const NO_POSIX_BACKTRACKING = 1 << 17;
        /// GNU operators (`\w \s \b \< \>` and friends) are disabled.
        const NO_GNU_OPS = 1 << 18;
        /// `{` not followed by a valid interval is a literal.
        const INVALID_INTERVAL_ORD = 1 << 19;
        /// Case-insensitive matching.
        const ICASE = 1 << 20;
        /// `^` is an anchor after `(` and `|` as well.
        const CARET_ANCHORS_HERE = 1 << 21;
        /// An interval with no preceding expression is an error.
        const CONTEXT_INVALID_DUP = 1 << 22;
        /// Line anchors ignore the NOTBOL/NOTEOL execution flags.
        const ANCHORS_IGNORE_EFLAGS = 1 << 23;
        /// Treat input and pattern as raw bytes; never decode UTF-8.
        const NO_UTF8 = 1 << 24;
        /// Vendor operators (`\d \n \A \Z \0 \x \u \U \_< \_>`) are disabled.
        const NO_VENDOR_OPS = 1 << 25;
    }
}

const POSIX_COMMON: Syntax = Syntax::CHAR_CLASSES
    .union(Syntax::DOT_NEWLINE)
    .union(Syntax::DOT_NOT_NULL)
    .union(Syntax::INTERVALS)
    .union(Syntax::NO_EMPTY_RANGES);

/// POSIX basic regular expressions (`grep` without `-E`).
pub const SYNTAX_POSIX_BASIC: Syntax = POSIX_COMMON
    .union(Syntax::BK_PLUS_QM)
    .union(Syntax::CONTEXT_INVALID_DUP);

/// POSIX extended regular expressions (`grep -E`, `awk`-style operators).
/// An unmatched `)` is an error here; dialects that want the historic
/// literal treatment add `UNMATCHED_RIGHT_PAREN_ORD` themselves.
pub const SYNTAX_POSIX_EXTENDED: Syntax = POSIX_COMMON
    .union(Syntax::CONTEXT_INDEP_ANCHORS)
    .union(Syntax::CONTEXT_INVALID_OPS)
    .union(Syntax::NO_BK_BRACES)
    .union(Syntax::NO_BK_PARENS)
    .union(Syntax::NO_BK_VBAR);

/// The `grep` dialect: basic syntax plus newline-as-alternation.
pub const SYNTAX_GREP: Syntax = SYNTAX_POSIX_BASIC
    .union(Syntax::NEWLINE_ALT)
    .union(Syntax::HAT_LISTS_NOT_NEWLINE);

/// The `egrep` dialect.
pub const SYNTAX_EGREP: Syntax = SYNTAX_POSIX_EXTENDED
    .union(Syntax::NEWLINE_ALT)
    .union(Syntax::HAT_LISTS_NOT_NEWLINE);

/// The `awk` dialect: extended syntax with backslash escapes in lists.
pub const SYNTAX_AWK: Syntax = SYNTAX_POSIX_EXTENDED
    .union(Syntax::BACKSLASH_ESCAPE_IN_LISTS)
    .union(Syntax::NO_BK_REFS);

/// Default dialect: extended syntax with every GNU and vendor extension on.
pub const SYNTAX_DEFAULT: Syntax = SYNTAX_POSIX_EXTENDED
    .union(Syntax::BACKSLASH_ESCAPE_IN_LISTS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_disjoint_where_expected() {
        assert!(SYNTAX_POSIX_BASIC.contains(Syntax::BK_PLUS_QM));
        assert!(!SYNTAX_POSIX_EXTENDED.contains(Syntax::BK_PLUS_QM));
        assert!(SYNTAX_POSIX_EXTENDED.contains(Syntax::NO_BK_PARENS));
        assert!(!SYNTAX_POSIX_BASIC.contains(Syntax::NO_BK_PARENS));
    }

    #[test]
    fn default_has_extensions_enabled() {
        assert!(!SYNTAX_DEFAULT.contains(Syntax::NO_GNU_OPS));
        assert!(!SYNTAX_DEFAULT.contains(Syntax::NO_VENDOR_OPS));
        assert!(!SYNTAX_DEFAULT.contains(Syntax::NO_UTF8));
    }
}
