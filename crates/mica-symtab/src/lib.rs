//! Scoped symbol table for mica.
//!
//! The front end fills one [`SymbolTable`] per compilation unit while it
//! analyses the tree. Declaring a plain local assigns its storage slot on the
//! spot, so the code generator only ever reads finished `slot`/`is_global`
//! attributes.

pub mod scope;

pub use scope::{Scope, ScopeId, SymbolTable};
