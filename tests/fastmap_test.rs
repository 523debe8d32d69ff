// fastmap_test.rs - Fastmap soundness, cross-checked by brute force.
//
// For every byte the fastmap marks as "never starts a match", no input
// beginning with that byte may match at that exact position.

use ferrex::prelude::*;
use ferrex::regint::FMAP_MISS;

/// For each of the 256 first-byte values, build a small set of probe
/// inputs starting with that byte and verify that `exec_match` never
/// succeeds where the fastmap says it cannot.
fn assert_fastmap_sound(pat: &str, syntax: Syntax) {
    let code = compile(pat, syntax).unwrap();
    let fmap = code.fastmap();

    for first in 0..=255u8 {
        if fmap[first as usize] != FMAP_MISS {
            continue;
        }
        // Several tails widen the probe beyond single-byte inputs.
        let tails: [&[u8]; 5] = [b"", b"a", b"bc", b"aaaa", b"\x00\xff"];
        for tail in tails {
            let mut probe = vec![first];
            probe.extend_from_slice(tail);
            let exec = Exec::new(&code, Input::Bytes(&probe));
            let hit = exec_match(&exec, None).unwrap();
            // A zero-length match does not "begin with" the byte.
            assert!(
                hit.is_none() || hit == Some(0),
                "fastmap for {:?} wrongly rejects first byte {:#04x} (probe {:?})",
                pat,
                first,
                probe
            );
        }
    }
}

#[test]
fn soundness_over_sample_patterns() {
    for pat in [
        "abc",
        "a|bc|def",
        "[a-f]x",
        "[^a-f]x",
        "a*b",
        "a?b?c",
        "(foo|bar)+",
        "^x|y$",
        r"\d+",
        r"\w*z",
        "x{2,5}y",
        "(a)(b)\\2?",
        "[[:alpha:]][[:digit:]]",
        "ä|b",
        "[äöü]+x",
        ".x",
    ] {
        assert_fastmap_sound(pat, SYNTAX_POSIX_EXTENDED);
    }
}

#[test]
fn soundness_in_byte_mode() {
    let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::NO_UTF8);
    for pat in ["abc", "[^a]", "a+b", r"\d\d", "x|[0-4]"] {
        assert_fastmap_sound(pat, syn);
    }
}

#[test]
fn soundness_under_icase() {
    let syn = SYNTAX_POSIX_EXTENDED.union(Syntax::ICASE);
    for pat in ["abc", "[a-f]+", "foo|BAR"] {
        assert_fastmap_sound(pat, syn);
    }
}

#[test]
fn fastmap_accepts_what_matches() {
    // The inverse direction on concrete examples: bytes that do start a
    // match are marked.
    let code = compile("(foo|bar)+", SYNTAX_POSIX_EXTENDED).unwrap();
    let fmap = code.fastmap();
    assert_ne!(fmap[b'f' as usize], FMAP_MISS);
    assert_ne!(fmap[b'b' as usize], FMAP_MISS);
    assert_eq!(fmap[b'o' as usize], FMAP_MISS);
    assert_eq!(fmap[b'z' as usize], FMAP_MISS);
}

#[test]
fn minmatch_bounds_are_sound() {
    // No input shorter than minmatch may match.
    for (pat, expect) in [
        ("abc", 3),
        ("a|bc", 1),
        ("a*", 0),
        ("a+", 1),
        ("a{3,}", 3),
        ("(ab){2}c", 5),
        ("^$", 0),
    ] {
        let code = compile(pat, SYNTAX_POSIX_EXTENDED).unwrap();
        assert_eq!(code.minmatch(), expect, "minmatch of {:?}", pat);
    }
}
