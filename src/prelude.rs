// prelude.rs - Convenient re-exports.
//
//! # Prelude
//!
//! ```
//! use ferrex::prelude::*;
//!
//! let code = compile(r"[0-9]+", SYNTAX_POSIX_EXTENDED).unwrap();
//! let exec = Exec::new(&code, Input::Bytes(b"answer: 42"));
//! assert_eq!(exec_search(&exec, usize::MAX, None).unwrap(), Some((8, 2)));
//! ```

pub use crate::error::Error;
pub use crate::regcomp::{compile, compile_bytes};
pub use crate::regexec::{
    exec_match, exec_rsearch, exec_search, exec_search_noepsilon, Exec, ExecFlags, Input, ReSpan,
};
pub use crate::regint::{ReCode, UNSET};
pub use crate::regsyntax::{
    Syntax, SYNTAX_AWK, SYNTAX_DEFAULT, SYNTAX_EGREP, SYNTAX_GREP, SYNTAX_POSIX_BASIC,
    SYNTAX_POSIX_EXTENDED,
};
