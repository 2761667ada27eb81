//! Instruction set of the mica assembly dialect.

use std::fmt;

/// Condition of a one-operand branch; tests the popped int against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Cond {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Cond::Eq => "ifeq",
            Cond::Ne => "ifne",
            Cond::Lt => "iflt",
            Cond::Gt => "ifgt",
            Cond::Le => "ifle",
            Cond::Ge => "ifge",
        }
    }

    pub fn holds(self, v: i32) -> bool {
        match self {
            Cond::Eq => v == 0,
            Cond::Ne => v != 0,
            Cond::Lt => v < 0,
            Cond::Gt => v > 0,
            Cond::Le => v <= 0,
            Cond::Ge => v >= 0,
        }
    }
}

/// `type owner.name` of a static field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub ty: String,
    pub owner: String,
    pub name: String,
}

impl FieldRef {
    pub fn new(ty: impl Into<String>, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self { ty: ty.into(), owner: owner.into(), name: name.into() }
    }

    /// `java.lang.System.out`
    pub fn stdout() -> Self {
        Self::new("java.io.PrintStream", "java.lang.System", "out")
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.ty, self.owner, self.name)
    }
}

/// `ret owner.name(params)` of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub ret: String,
    pub owner: String,
    pub name: String,
    pub params: Vec<String>,
}

impl MethodRef {
    pub fn new(ret: impl Into<String>, owner: impl Into<String>, name: impl Into<String>, params: Vec<String>) -> Self {
        Self { ret: ret.into(), owner: owner.into(), name: name.into(), params }
    }

    /// `void java.io.PrintStream.print(ty)` or its `println` twin.
    pub fn print(ty: &str, newline: bool) -> Self {
        let name = if newline { "println" } else { "print" };
        Self::new("void", "java.io.PrintStream", name, vec![ty.to_string()])
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}({})", self.ret, self.owner, self.name, self.params.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    // Constants
    Sipush(i32),
    Iconst(bool),
    Ldc(String),

    // Locals
    Iload(u16),
    Istore(u16),
    Iinc(u16, i32),

    // Statics
    GetStatic(FieldRef),
    PutStatic(FieldRef),

    // Arithmetic and logic on ints
    Iadd,
    Isub,
    Imul,
    Idiv,
    Irem,
    Ineg,
    Iand,
    Ior,
    Ixor,

    // Stack
    Dup,
    Pop,
    Nop,

    // Control flow (named label targets)
    If(Cond, String),
    Goto(String),
    Label(String),

    // Calls
    InvokeStatic(MethodRef),
    InvokeVirtual(MethodRef),
    Ireturn,
    Return,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Sipush(n) => write!(f, "sipush {n}"),
            Iconst(b) => write!(f, "iconst_{}", u8::from(*b)),
            Ldc(s) => write!(f, "ldc \"{}\"", escape(s)),
            Iload(i) => write!(f, "iload {i}"),
            Istore(i) => write!(f, "istore {i}"),
            Iinc(i, d) => write!(f, "iinc {i} {d}"),
            GetStatic(r) => write!(f, "getstatic {r}"),
            PutStatic(r) => write!(f, "putstatic {r}"),
            Iadd => f.write_str("iadd"),
            Isub => f.write_str("isub"),
            Imul => f.write_str("imul"),
            Idiv => f.write_str("idiv"),
            Irem => f.write_str("irem"),
            Ineg => f.write_str("ineg"),
            Iand => f.write_str("iand"),
            Ior => f.write_str("ior"),
            Ixor => f.write_str("ixor"),
            Dup => f.write_str("dup"),
            Pop => f.write_str("pop"),
            Nop => f.write_str("nop"),
            If(c, l) => write!(f, "{} {l}", c.mnemonic()),
            Goto(l) => write!(f, "goto {l}"),
            Label(l) => write!(f, "{l}:"),
            InvokeStatic(m) => write!(f, "invokestatic {m}"),
            InvokeVirtual(m) => write!(f, "invokevirtual {m}"),
            Ireturn => f.write_str("ireturn"),
            Return => f.write_str("return"),
        }
    }
}

pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' { out.push(c); continue; }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            _ => return None,
        }
    }
    Some(out)
}
