//! Text rendering of values passed to `PrintStream.print`.

use mica_asm::Value;
use mica_syntax::error::{error, Result};

/// Renders `v` the way the print overload declared as `(ty)` would.
pub fn display_printed(v: &Value, ty: &str) -> Result<String> {
    match (ty, v) {
        ("int", Value::Int(n)) => Ok(n.to_string()),
        ("boolean", Value::Int(n)) => Ok(if *n != 0 { "true" } else { "false" }.to_string()),
        ("java.lang.String", Value::Str(s)) => Ok(s.clone()),
        ("java.lang.String", Value::Null) => Ok("null".to_string()),
        (ty, other) => error(format!("cannot print {} value '{}' as {}", other.type_name(), other, ty)),
    }
}
