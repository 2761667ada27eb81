//! Mica code generator: attributed trees -> stack-machine assembly text.
//!
//! The engine ([`CodeGenerator`]) owns a stack of text fragments. Each
//! `generate_*` operation consumes the fragments of the parts it encloses
//! and pushes exactly one back, so after [`CodeGenerator::generate_program`]
//! the stack holds a single fragment: the finished `class` unit.
//! [`compile_program`] drives the engine over a whole [`Program`] outline.
//!
//! [`Program`]: mica_syntax::program::Program

pub mod config;
pub mod driver;
pub mod fragment;
pub mod generator;
mod lower;

pub use config::CodegenConfig;
pub use driver::{compile_program, emit_program};
pub use fragment::FragmentStack;
pub use generator::CodeGenerator;
pub use lower::descriptor;
