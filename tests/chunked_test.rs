// chunked_test.rs - Scatter/gather input must behave exactly like one
// contiguous buffer: same offsets, same lengths, same captures, for
// every execution call and every split point.

use ferrex::prelude::*;

const NGROUPS_MAX: usize = 8;

#[derive(Debug, PartialEq, Eq)]
struct Observed {
    result: Option<(usize, usize)>,
    caps: Vec<ReSpan>,
}

fn observe(
    code: &ReCode,
    input: Input<'_>,
    call: fn(&Exec<'_>, usize, Option<&mut [ReSpan]>) -> Result<Option<(usize, usize)>, Error>,
) -> Observed {
    let mut caps = [ReSpan::UNSET_SPAN; NGROUPS_MAX];
    let exec = Exec::new(code, input);
    let result = call(&exec, usize::MAX, Some(&mut caps[..code.ngroups()])).unwrap();
    Observed {
        result,
        caps: caps[..code.ngroups()].to_vec(),
    }
}

fn observe_match(code: &ReCode, input: Input<'_>, at: usize) -> (Option<usize>, Vec<ReSpan>) {
    let mut caps = [ReSpan::UNSET_SPAN; NGROUPS_MAX];
    let mut exec = Exec::new(code, input);
    exec.start = at;
    let r = exec_match(&exec, Some(&mut caps[..code.ngroups()])).unwrap();
    (r, caps[..code.ngroups()].to_vec())
}

/// Run every call on the contiguous buffer and on every 2-way split of
/// it, asserting identical observations.
fn assert_split_invariant(pat: &str, input: &[u8]) {
    let code = compile(pat, SYNTAX_POSIX_EXTENDED).unwrap();
    let whole = Input::Bytes(input);

    type SearchFn =
        fn(&Exec<'_>, usize, Option<&mut [ReSpan]>) -> Result<Option<(usize, usize)>, Error>;
    let calls: [(&str, SearchFn); 3] = [
        ("search", exec_search),
        ("rsearch", exec_rsearch),
        ("search_noepsilon", exec_search_noepsilon),
    ];

    for split in 0..=input.len() {
        let parts: [&[u8]; 2] = [&input[..split], &input[split..]];
        let chunked = Input::Chunks(&parts);

        for (name, call) in &calls {
            let a = observe(&code, whole, *call);
            let b = observe(&code, chunked, *call);
            assert_eq!(
                a, b,
                "{} diverged for {:?} split at {} of {:?}",
                name,
                pat,
                split,
                String::from_utf8_lossy(input)
            );
        }

        for at in 0..=input.len() {
            let a = observe_match(&code, whole, at);
            let b = observe_match(&code, chunked, at);
            assert_eq!(
                a, b,
                "exact diverged for {:?} split at {} start {}",
                pat, split, at
            );
        }
    }
}

#[test]
fn split_invariance_literals() {
    assert_split_invariant("abc", b"zzabczz");
    assert_split_invariant("abc", b"ababc");
}

#[test]
fn split_invariance_repetition() {
    assert_split_invariant("a*b", b"caaab");
    assert_split_invariant("a{2,3}", b"aaaa");
}

#[test]
fn split_invariance_groups_and_backrefs() {
    assert_split_invariant(r"(ab)+", b"xababy");
    assert_split_invariant(r"(a+)b\1", b"zaabaz");
}

#[test]
fn split_invariance_anchors_and_classes() {
    assert_split_invariant("^ab", b"ab\nab");
    assert_split_invariant("b$", b"ab\nab");
    assert_split_invariant("[b-d]+", b"azbcdza");
}

#[test]
fn split_invariance_utf8() {
    assert_split_invariant("ä+", "xxääy".as_bytes());
    assert_split_invariant(".", "ä".as_bytes());
    assert_split_invariant("[äö]x", "zöxz".as_bytes());
}

#[test]
fn three_way_splits() {
    let code = compile("a(b*)c", SYNTAX_POSIX_EXTENDED).unwrap();
    let input = b"zzabbbczz";
    let whole = observe(&code, Input::Bytes(input), exec_search);
    for i in 0..=input.len() {
        for j in i..=input.len() {
            let parts: [&[u8]; 3] = [&input[..i], &input[i..j], &input[j..]];
            let got = observe(&code, Input::Chunks(&parts), exec_search);
            assert_eq!(whole, got, "diverged for split ({}, {})", i, j);
        }
    }
}

#[test]
fn empty_chunks_are_transparent() {
    let code = compile("abc", SYNTAX_POSIX_EXTENDED).unwrap();
    let parts: [&[u8]; 6] = [b"", b"a", b"", b"b", b"c", b""];
    let exec = Exec::new(&code, Input::Chunks(&parts));
    assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((0, 3)));
}

#[test]
fn backref_compare_across_chunks() {
    // The captured region and the re-compared region straddle different
    // chunk boundaries.
    let code = compile(r"(abcd)-\1", SYNTAX_POSIX_EXTENDED).unwrap();
    let input = b"abcd-abcd";
    for split in 0..=input.len() {
        let parts: [&[u8]; 2] = [&input[..split], &input[split..]];
        let exec = Exec::new(&code, Input::Chunks(&parts));
        assert_eq!(
            exec_match(&exec, None).unwrap(),
            Some(9),
            "split at {}",
            split
        );
    }
}
