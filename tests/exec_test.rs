// exec_test.rs - Integration tests for compile + execute across dialects.

use ferrex::prelude::*;

fn ere(pat: &str) -> ReCode {
    compile(pat, SYNTAX_POSIX_EXTENDED).unwrap()
}

fn bre(pat: &str) -> ReCode {
    compile(pat, SYNTAX_POSIX_BASIC).unwrap()
}

fn search_in(code: &ReCode, input: &[u8]) -> Option<(usize, usize)> {
    let exec = Exec::new(code, Input::Bytes(input));
    exec_search(&exec, usize::MAX, None).unwrap()
}

fn match_at(code: &ReCode, input: &[u8], at: usize) -> Option<usize> {
    let mut exec = Exec::new(code, Input::Bytes(input));
    exec.start = at;
    exec_match(&exec, None).unwrap()
}

// === Basic matching ===

#[test]
fn empty_pattern_matches_everywhere() {
    let code = ere("");
    for input in [&b""[..], b"x", b"hello"] {
        let exec = Exec::new(&code, Input::Bytes(input));
        assert_eq!(exec_match(&exec, None).unwrap(), Some(0));
    }
    // Also at every inner offset.
    let code = ere("");
    for at in 0..=5 {
        assert_eq!(match_at(&code, b"hello", at), Some(0));
    }
}

#[test]
fn literal_and_any() {
    let code = ere("h.llo");
    assert_eq!(search_in(&code, b"say hello"), Some((4, 5)));
    assert_eq!(search_in(&code, b"say hallo"), Some((4, 5)));
    assert_eq!(search_in(&code, b"say hllo"), None);
}

#[test]
fn exact_match_does_not_search() {
    let code = ere("world");
    assert_eq!(match_at(&code, b"hello world", 0), None);
    assert_eq!(match_at(&code, b"hello world", 6), Some(5));
}

// === Dialect differences ===

#[test]
fn bre_groups_and_intervals_use_backslashes() {
    let code = bre(r"\(ab\)\{2\}");
    assert_eq!(search_in(&code, b"xababy"), Some((1, 4)));
    // The unescaped forms are literals in BRE.
    let code = bre(r"(ab)");
    assert_eq!(search_in(&code, b"x(ab)y"), Some((1, 4)));
    let code = bre(r"a\{2\}");
    assert_eq!(search_in(&code, b"caaab"), Some((1, 2)));
}

#[test]
fn ere_unmatched_close_paren_is_an_error() {
    assert_eq!(
        compile("ab)", SYNTAX_POSIX_EXTENDED).unwrap_err(),
        Error::UnmatchedCloseParen
    );
    // ...unless the dialect downgrades it to a literal.
    let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::UNMATCHED_RIGHT_PAREN_ORD);
    let code = compile("ab)", syn).unwrap();
    assert_eq!(search_in(&code, b"xab)y"), Some((1, 3)));
}

#[test]
fn limited_ops_disable_plus_and_qmark() {
    let syn = SYNTAX_POSIX_BASIC.union(Syntax::LIMITED_OPS);
    let code = compile("a+", syn).unwrap();
    // '+' is a plain literal here.
    assert_eq!(search_in(&code, b"xa+y"), Some((1, 2)));
    assert_eq!(search_in(&code, b"aaa"), None);
}

#[test]
fn newline_alternation_dialect() {
    let code = compile("foo\nbar", SYNTAX_GREP).unwrap();
    assert_eq!(search_in(&code, b"a bar b"), Some((2, 3)));
    assert_eq!(search_in(&code, b"a foo b"), Some((2, 3)));
}

#[test]
fn vendor_escapes() {
    let code = ere(r"\d+");
    assert_eq!(search_in(&code, b"order 6502!"), Some((6, 4)));
    let code = ere(r"\x41\x42");
    assert_eq!(search_in(&code, b"xxABxx"), Some((2, 2)));
    let code = ere(r"\0101");
    assert_eq!(search_in(&code, b"zAz"), Some((1, 1)));
}

#[test]
fn gnu_word_operators() {
    let code = ere(r"\<\w+\>");
    assert_eq!(search_in(&code, b"  hello  "), Some((2, 5)));
    let code = ere(r"\`ab");
    assert_eq!(search_in(&code, b"abab"), Some((0, 2)));
    let code = ere(r"ab\'");
    assert_eq!(search_in(&code, b"abab"), Some((2, 2)));
}

// === Repetition semantics ===

#[test]
fn greedy_first_ordering() {
    // The loop tries the longest extension first; no exhaustive
    // exploration is needed to report 3.
    let code = ere("a*");
    assert_eq!(match_at(&code, b"aaa", 0), Some(3));
    let code = compile("a*", SYNTAX_POSIX_EXTENDED.union(Syntax::NO_POSIX_BACKTRACKING)).unwrap();
    assert_eq!(match_at(&code, b"aaa", 0), Some(3));
}

#[test]
fn zero_interval_still_brackets_groups() {
    let code = ere("(ab){0}x");
    let input = b"x";
    let mut caps = [ReSpan::UNSET_SPAN; 1];
    let exec = Exec::new(&code, Input::Bytes(input));
    let r = exec_match(&exec, Some(&mut caps)).unwrap();
    assert_eq!(r, Some(1));
    // The group reports an (empty) match rather than staying unset.
    assert_eq!(caps[0].start, caps[0].end);
    assert!(caps[0].is_set());
}

#[test]
fn bounded_repeat_backtracks() {
    let code = ere("a{2,4}ab");
    assert_eq!(search_in(&code, b"aaaab"), Some((0, 5)));
    let code = ere("(ab){1,2}abx");
    assert_eq!(search_in(&code, b"abababx"), Some((0, 7)));
}

#[test]
fn nested_epsilon_loops_terminate() {
    let code = ere("(a*)*");
    assert_eq!(match_at(&code, b"aaa", 0), Some(3));
    assert_eq!(match_at(&code, b"b", 0), Some(0));
    let code = ere("(a*)+b");
    assert_eq!(search_in(&code, b"aab"), Some((0, 3)));
    assert_eq!(search_in(&code, b"b"), Some((0, 1)));
}

#[test]
fn invalid_intervals_reject() {
    assert_eq!(
        compile("a{5,2}", SYNTAX_POSIX_EXTENDED).unwrap_err(),
        Error::BadInterval
    );
    assert_eq!(
        compile("a{1,300}", SYNTAX_POSIX_EXTENDED).unwrap_err(),
        Error::BadInterval
    );
}

// === Captures and back references ===

#[test]
fn capture_offsets_are_consistent() {
    let code = ere("(a+)(b+)?(c)");
    let mut caps = [ReSpan::UNSET_SPAN; 3];
    let exec = Exec::new(&code, Input::Bytes(b"aac"));
    assert_eq!(exec_match(&exec, Some(&mut caps)).unwrap(), Some(3));
    assert_eq!(caps[0], ReSpan { start: 0, end: 2 });
    // The optional group never matched: both offsets unset.
    assert!(!caps[1].is_set());
    assert_eq!(caps[1].start, UNSET);
    assert_eq!(caps[2], ReSpan { start: 2, end: 3 });
}

#[test]
fn backreference_literal_recompare() {
    let code = ere(r"(ab|cd)x\1");
    assert_eq!(search_in(&code, b"abxab"), Some((0, 5)));
    assert_eq!(search_in(&code, b"cdxcd"), Some((0, 5)));
    assert_eq!(search_in(&code, b"abxcd"), None);
}

#[test]
fn backreference_of_empty_group() {
    let code = ere(r"(a*)b\1c");
    // Group 1 = "a" requires "a" again after b.
    assert_eq!(search_in(&code, b"abac"), Some((0, 4)));
    // Group 1 = "" then \1 is empty.
    assert_eq!(search_in(&code, b"bc"), Some((0, 2)));
}

#[test]
fn search_resets_groups_between_attempts() {
    let code = ere(r"(xy)|z");
    let mut caps = [ReSpan::UNSET_SPAN; 1];
    let exec = Exec::new(&code, Input::Bytes(b"xz"));
    // Attempt at 0 partially enters the group before failing; the match
    // at 1 takes the 'z' branch, so the group must be unset.
    let r = exec_search(&exec, usize::MAX, Some(&mut caps)).unwrap();
    assert_eq!(r, Some((1, 1)));
    assert!(!caps[0].is_set());
}

// === Unicode ===

#[test]
fn unicode_literals_and_classes() {
    let code = ere("äöü");
    assert_eq!(search_in(&code, "xxäöüxx".as_bytes()), Some((2, 6)));

    let code = ere("[[:alpha:]]+");
    assert_eq!(search_in(&code, "1ábc2".as_bytes()), Some((1, 4)));
}

#[test]
fn unicode_case_insensitive() {
    let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::ICASE);
    let code = compile("straße", syn).unwrap();
    assert!(search_in(&code, "STRASSE".as_bytes()).is_none()); // no multi-char folding
    assert_eq!(search_in(&code, "StraSSE".as_bytes()), None);
    assert_eq!(
        search_in(&code, "xSTRAßE".as_bytes()),
        Some((1, "STRAßE".len()))
    );
}

#[test]
fn byte_mode_treats_input_as_raw() {
    let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::NO_UTF8);
    let code = compile(".", syn).unwrap();
    // One dot consumes exactly one byte of a two-byte character.
    let exec = Exec::new(&code, Input::Bytes("ä".as_bytes()));
    assert_eq!(exec_match(&exec, None).unwrap(), Some(1));

    let code = compile_bytes(b"\xc3\xa4", syn).unwrap();
    assert_eq!(search_in(&code, "xäy".as_bytes()), Some((1, 2)));
}

#[test]
fn mixed_byte_codepoint_charset_rejected() {
    // In-list escapes come with the default dialect.
    assert_eq!(
        compile(r"[ä\xC3]", SYNTAX_DEFAULT).unwrap_err(),
        Error::IllegalCharset
    );
    // Fine in byte mode, where everything is a byte.
    let syn = SYNTAX_DEFAULT.union(Syntax::NO_UTF8);
    assert!(compile(r"[\xC3\xA4]", syn).is_ok());
}

// === Charsets ===

#[test]
fn bracket_expression_edge_cases() {
    // ']' first is a literal.
    let code = ere("[]a]+");
    assert_eq!(search_in(&code, b"x]a]y"), Some((1, 3)));
    // '-' first or last is a literal.
    let code = ere("[-a]");
    assert_eq!(search_in(&code, b"-"), Some((0, 1)));
    // Negation.
    let code = ere("[^0-9]+");
    assert_eq!(search_in(&code, b"123abc456"), Some((3, 3)));
}

#[test]
fn collating_elements_and_equivalence() {
    let code = ere("[[.tab.][.space.]]+");
    assert_eq!(search_in(&code, b"ab \tcd"), Some((2, 2)));
    let code = ere("[[=a=]]");
    assert_eq!(search_in(&code, b"xay"), Some((1, 1)));
}

#[test]
fn unicode_brace_list_in_charset() {
    let code = compile(r"[\u{61 62 63}]+", SYNTAX_DEFAULT).unwrap();
    assert_eq!(search_in(&code, b"zzabcz"), Some((2, 3)));
}

#[test]
fn hat_lists_not_newline() {
    let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::HAT_LISTS_NOT_NEWLINE);
    let code = compile("[^x]+", syn).unwrap();
    // The negated list implicitly excludes the newline.
    assert_eq!(search_in(&code, b"x\nab"), Some((2, 2)));
}

// === Anchors and execution flags ===

#[test]
fn anchors_at_line_and_input() {
    let code = ere("^foo$");
    assert_eq!(search_in(&code, b"foo"), Some((0, 3)));
    assert_eq!(search_in(&code, b"bar\nfoo"), Some((4, 3)));
    assert_eq!(search_in(&code, b"foobar"), None);
}

#[test]
fn noteol_suppresses_dollar() {
    let code = ere("foo$");
    let mut exec = Exec::new(&code, Input::Bytes(b"foo"));
    exec.flags = ExecFlags::NOTEOL;
    assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), None);
}

#[test]
fn anchors_ignore_eflags_dialect() {
    let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::ANCHORS_IGNORE_EFLAGS);
    let code = compile("^a", syn).unwrap();
    let mut exec = Exec::new(&code, Input::Bytes(b"abc"));
    exec.flags = ExecFlags::NOTBOL;
    assert_eq!(exec_match(&exec, None).unwrap(), Some(1));
}

// === Search variants ===

#[test]
fn search_range_bounds_attempts() {
    let code = ere("x");
    let exec = Exec::new(&code, Input::Bytes(b"aaaax"));
    assert_eq!(exec_search(&exec, 2, None).unwrap(), None);
    assert_eq!(exec_search(&exec, 5, None).unwrap(), Some((4, 1)));
}

#[test]
fn rsearch_prefers_late_offsets() {
    let code = ere("ab");
    let exec = Exec::new(&code, Input::Bytes(b"ab ab ab"));
    assert_eq!(exec_rsearch(&exec, usize::MAX, None).unwrap(), Some((6, 2)));
    // A bounded range can exclude the later occurrences.
    assert_eq!(exec_rsearch(&exec, 2, None).unwrap(), Some((6, 2)));
}

#[test]
fn noepsilon_scan_reaches_real_match() {
    let code = ere("a*");
    let exec = Exec::new(&code, Input::Bytes(b"xxxaay"));
    assert_eq!(
        exec_search_noepsilon(&exec, usize::MAX, None).unwrap(),
        Some((3, 2))
    );
    let exec = Exec::new(&code, Input::Bytes(b"xxx"));
    assert_eq!(exec_search_noepsilon(&exec, usize::MAX, None).unwrap(), None);
}

#[test]
fn first_success_mode_skips_exploration() {
    let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::NO_POSIX_BACKTRACKING);
    let code = compile("(a|ab)c?", syn).unwrap();
    // First alternative wins outright; no attempt to extend to "ab".
    assert_eq!(match_at(&code, b"abc", 0), Some(1));
    let code = ere("(a|ab)c?");
    assert_eq!(match_at(&code, b"abc", 0), Some(3));
}
