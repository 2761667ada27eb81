//! Compilation unit components for mica assembly.

use std::collections::HashMap;
use std::fmt;

use crate::instruction::{escape, Instruction};
use crate::value::Value;

/// `field static <ty> <name> [= <init>]`
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: String,
    pub name: String,
    /// An int (booleans as 0/1) or a string literal.
    pub init: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub ret: String,
    pub name: String,
    pub params: Vec<String>,
    pub max_stack: u32,
    pub max_locals: u32,
    pub code: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl Method {
    /// Builds a method, indexing every label definition in `code`.
    pub fn new(ret: String, name: String, params: Vec<String>, max_stack: u32, max_locals: u32, code: Vec<Instruction>) -> Self {
        let labels = code
            .iter()
            .enumerate()
            .filter_map(|(i, insn)| match insn {
                Instruction::Label(l) => Some((l.clone(), i)),
                _ => None,
            })
            .collect();
        Self { ret, name, params, max_stack, max_locals, code, labels }
    }

    /// Instruction index of a label definition.
    pub fn label(&self, name: &str) -> Option<usize> { self.labels.get(name).copied() }

    /// The `(params)` signature part, e.g. `(int, int)`.
    pub fn signature(&self) -> String { format!("({})", self.params.join(", ")) }
}

/// One `class` block: static fields and static methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassUnit {
    pub name: String,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
}

impl ClassUnit {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field static {} {}", self.ty, self.name)?;
        match &self.init {
            Some(Value::Str(s)) => write!(f, " = \"{}\"", escape(s))?,
            Some(v) => write!(f, " = {v}")?,
            None => {}
        }
        Ok(())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method public static {} {}{}", self.ret, self.name, self.signature())?;
        writeln!(f, "max_stack {}", self.max_stack)?;
        writeln!(f, "max_locals {}", self.max_locals)?;
        writeln!(f, "{{")?;
        for insn in &self.code { writeln!(f, "{insn}")?; }
        writeln!(f, "}}")
    }
}

impl fmt::Display for ClassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {}", self.name)?;
        writeln!(f, "{{")?;
        for field in &self.fields { writeln!(f, "{field}")?; }
        for method in &self.methods { write!(f, "{method}")?; }
        writeln!(f, "}}")
    }
}
