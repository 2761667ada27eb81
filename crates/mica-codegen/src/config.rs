//! Code generator settings.

/// Limits and naming conventions written into every unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenConfig {
    /// Operand stack capacity declared on each method.
    pub max_stack: u32,
    /// Local slot capacity declared on each method.
    pub max_locals: u32,
    /// File extension of the persisted unit, without the dot.
    pub extension: String,
    /// Name of the program entry point.
    pub entry_point: String,
    /// Parameter list the entry point is declared with.
    pub entry_params: Vec<String>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            max_stack: 1000,
            max_locals: 1000,
            extension: "jasm".to_string(),
            entry_point: "main".to_string(),
            entry_params: vec!["java.lang.String[]".to_string()],
        }
    }
}
