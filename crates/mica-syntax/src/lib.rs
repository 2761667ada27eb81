//! Attributed syntax tree, program outline and error types for mica.

pub mod ast;
pub mod error;
pub mod program;

pub use ast::*;
pub use error::*;
pub use program::*;
