//! Assembly model for mica.
//!
//! This crate defines the instruction set of the stack-machine dialect the
//! code generator targets, a unit container with fields and methods, a
//! printer and parser for the text form, and the runtime value type used by
//! the VM.

pub mod instruction;
pub mod parse;
pub mod program;
pub mod value;

pub use instruction::{Cond, FieldRef, Instruction, MethodRef};
pub use program::{ClassUnit, Field, Method};
pub use value::Value;
