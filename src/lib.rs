//! # Ferrex
//!
//! Pure-Rust POSIX/GNU regular-expression engine built around a compact
//! custom bytecode: a single-pass compiler (no syntax tree), a static
//! fastmap/cost analyzer, and a backtracking interpreter driven by an
//! explicit on-failure stack. Byte buffers may be contiguous or split
//! across discontiguous chunks (scatter/gather input), and search start
//! positions are skipped with SIMD-accelerated scanning via
//! [`memchr`](https://crates.io/crates/memchr).
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrex::prelude::*;
//!
//! let code = compile(r"b[aeiou]+r", SYNTAX_POSIX_EXTENDED).unwrap();
//! let exec = Exec::new(&code, Input::Bytes(b"foo beer bar"));
//! let hit = exec_search(&exec, usize::MAX, None).unwrap();
//! assert_eq!(hit, Some((4, 4))); // "beer" at offset 4
//! ```
//!
//! Captures are written into a caller-provided buffer sized to the
//! pattern's group count:
//!
//! ```rust
//! use ferrex::prelude::*;
//!
//! let code = compile(r"(\w+)@(\w+)", SYNTAX_POSIX_EXTENDED).unwrap();
//! let exec = Exec::new(&code, Input::Bytes(b"mail me: kim@example"));
//! let mut caps = [ReSpan::UNSET_SPAN; 2];
//! let hit = exec_search(&exec, usize::MAX, Some(&mut caps)).unwrap();
//! assert_eq!(hit, Some((9, 11)));
//! assert_eq!(&b"mail me: kim@example"[caps[0].start..caps[0].end], b"kim");
//! ```
//!
//! ## Module Structure
//!
//! | Module        | Purpose                                        |
//! |---------------|------------------------------------------------|
//! | [`regsyntax`] | Syntax flags and dialect presets               |
//! | [`regparse`]  | Pattern tokenizer                              |
//! | [`regcomp`]   | Single-pass bytecode compiler                  |
//! | [`regfast`]   | Fastmap and minimum-match-length analyzer      |
//! | [`regexec`]   | Backtracking interpreter and search loops      |
//! | [`regint`]    | Opcodes, bitsets, the compiled code object     |
//! | [`regenc`]    | UTF-8 helpers and character trait predicates   |
//! | [`error`]     | Error taxonomy                                 |
//!
//! A compiled [`ReCode`] is immutable and safe to share read-only across
//! any number of concurrent executions; each execution call owns its
//! interpreter state exclusively.

pub mod error;
pub mod prelude;
pub mod regcomp;
pub mod regenc;
pub mod regexec;
pub mod regfast;
pub mod regint;
pub mod regparse;
pub mod regsyntax;

pub use crate::error::Error;
pub use crate::regcomp::{compile, compile_bytes};
pub use crate::regexec::{
    exec_match, exec_rsearch, exec_search, exec_search_noepsilon, Exec, ExecFlags, Input, ReSpan,
    DEFAULT_MAX_FAILURES, MIN_FAILURES,
};
pub use crate::regint::{CodeFlags, ReCode, UNSET};
pub use crate::regsyntax::{
    Syntax, SYNTAX_AWK, SYNTAX_DEFAULT, SYNTAX_EGREP, SYNTAX_GREP, SYNTAX_POSIX_BASIC,
    SYNTAX_POSIX_EXTENDED,
};
