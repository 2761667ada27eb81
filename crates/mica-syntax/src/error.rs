//! Error handling types shared by every mica crate.
//!
//! Only a handful of failures are recoverable in the back end: a duplicate
//! declaration or an exhausted slot range reported by the symbol table,
//! malformed assembly text handed to the parser, and faults raised while
//! executing assembly. Contract violations inside the code generator panic
//! instead.
//!
//! # Examples
//!
//! ```rust
//! use mica_syntax::error::{error, Error, Result};
//!
//! fn checked_div(a: i32, b: i32) -> Result<i32> {
//!     if b == 0 {
//!         error("division by zero")
//!     } else {
//!         Ok(a / b)
//!     }
//! }
//!
//! let err = checked_div(1, 0).unwrap_err();
//! assert!(matches!(err, Error::Runtime(_)));
//! assert_eq!(err.to_string(), "division by zero");
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A name was declared twice in the same scope.
    #[error("'{name}' is already declared in this scope")]
    Redeclared { name: String },

    /// A scope ran out of local slots.
    #[error("no local slot left for '{name}'")]
    SlotOverflow { name: String },

    /// Assembly text could not be parsed. `line` is 1-based.
    #[error("{msg} at line {line}")]
    Assembly { line: usize, msg: String },

    /// A fault while executing assembly.
    #[error("{0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Runtime(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Runtime(s.to_string())
    }
}

/// A specialized `Result` type for mica operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for `Err(Error::Runtime(msg))`.
pub fn error<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::Runtime(msg.into()))
}

/// Shorthand for an assembly parse error at a 1-based line.
///
/// ```rust
/// use mica_syntax::error::{error_at, Result};
///
/// let r: Result<()> = error_at(7, "unknown mnemonic 'iadd2'");
/// assert_eq!(r.unwrap_err().to_string(), "unknown mnemonic 'iadd2' at line 7");
/// ```
pub fn error_at<T>(line: usize, msg: impl Into<String>) -> Result<T> {
    Err(Error::Assembly { line, msg: msg.into() })
}
