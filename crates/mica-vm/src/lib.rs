//! Mica VM: executes units of mica assembly.
//!
//! The machine keeps one operand stack shared by all call frames, a table of
//! the unit's static fields, and per-call local slots sized by the method's
//! `max_locals`. Returning from a call cuts the stack back to its height at
//! call entry. All arithmetic is 32-bit and wraps. Output of
//! `java.io.PrintStream.print`/`println` goes to any [`std::io::Write`] sink.
//!
//! ```rust
//! use mica_asm::ClassUnit;
//! use mica_vm::Vm;
//!
//! let unit: ClassUnit = "class Hello\n{\nmethod public static void main(java.lang.String[])\nmax_stack 10\nmax_locals 1\n{\n\
//!             getstatic java.io.PrintStream java.lang.System.out\nldc \"hi\"\n\
//!             invokevirtual void java.io.PrintStream.println(java.lang.String)\nreturn\n}\n}\n"
//!     .parse()
//!     .unwrap();
//! let mut vm = Vm::with_output(Vec::new());
//! vm.run(&unit).unwrap();
//! assert_eq!(vm.into_output(), b"hi\n");
//! ```

pub mod display;
mod vm;

pub use display::display_printed;
pub use vm::Vm;

use mica_asm::ClassUnit;
use mica_syntax::error::Result;

/// Parses `source` and runs its `main`, collecting printed output.
pub fn run_source(source: &str, step_limit: Option<u64>) -> Result<String> {
    let unit: ClassUnit = source.parse()?;
    let mut vm = Vm::with_output(Vec::new()).with_step_limit(step_limit);
    vm.run(&unit)?;
    Ok(String::from_utf8_lossy(&vm.into_output()).into_owned())
}
