//! Runtime values of mica assembly programs.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Str(String),
    /// Handle pushed by `getstatic java.io.PrintStream java.lang.System.out`.
    Stream,
    /// Placeholder for references the machine does not model, such as the
    /// program-argument array of `main`.
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Str(_) => "java.lang.String",
            Value::Stream => "java.io.PrintStream",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Stream => f.write_str("<stream>"),
            Value::Null => f.write_str("null"),
        }
    }
}
