//! Attributed tree types for the mica compiler back end.
//!
//! Every construct (declaration, statement, expression) shares the single
//! [`Node`] shape. The front end resolves types, constness, global/local
//! classification and storage slots before a node reaches code generation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Static data types known to the back end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Unknown,
    Void,
    Bool,
    Char,
    Float,
    Int,
    String,
    Double,
}

impl DataType {
    /// Canonical display name, used in diagnostics and symbol table dumps.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Unknown => "unknown",
            DataType::Void => "void",
            DataType::Bool => "bool",
            DataType::Char => "char",
            DataType::Float => "float",
            DataType::Int => "int",
            DataType::String => "string",
            DataType::Double => "double",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expression kinds. Only expression nodes carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    // logical
    And,
    Or,
    Not,
    // relational
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Increment,
    Decrement,
    Plus,
    Minus,
    Group,
    Call,
    Ident,
    Literal,
}

impl ExprKind {
    pub fn name(self) -> &'static str {
        match self {
            ExprKind::And => "and",
            ExprKind::Or => "or",
            ExprKind::Not => "not",
            ExprKind::Lt => "lt",
            ExprKind::Gt => "gt",
            ExprKind::Le => "le",
            ExprKind::Ge => "ge",
            ExprKind::Eq => "eq",
            ExprKind::Ne => "ne",
            ExprKind::Add => "add",
            ExprKind::Sub => "sub",
            ExprKind::Mul => "mul",
            ExprKind::Div => "div",
            ExprKind::Mod => "mod",
            ExprKind::Increment => "increment",
            ExprKind::Decrement => "decrement",
            ExprKind::Plus => "plus",
            ExprKind::Minus => "minus",
            ExprKind::Group => "group",
            ExprKind::Call => "call",
            ExprKind::Ident => "ident",
            ExprKind::Literal => "literal",
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(self, ExprKind::Lt | ExprKind::Gt | ExprKind::Le | ExprKind::Ge | ExprKind::Eq | ExprKind::Ne)
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display name for an optional kind; non-expression nodes read as `"unknown"`.
pub fn kind_name(kind: Option<ExprKind>) -> &'static str {
    kind.map_or("unknown", ExprKind::name)
}

/// Literal payload of a node. Array variants hold aggregate initializers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    #[default]
    None,
    Int(i32),
    Bool(bool),
    Double(f64),
    Str(String),
    IntArray(Vec<i32>),
    BoolArray(Vec<bool>),
    DoubleArray(Vec<f64>),
    StrArray(Vec<String>),
}

impl Literal {
    /// Integer view of a scalar payload; booleans read as 0/1.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Literal::Int(n) => Some(*n),
            Literal::Bool(b) => Some(i32::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// One attributed tree node.
///
/// Children are owned exclusively; the tree has no parent links.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    /// Identifier text, empty if anonymous.
    pub name: String,
    pub data_type: DataType,
    /// Present only on expression nodes.
    pub expr: Option<ExprKind>,
    pub value: Literal,

    pub is_const: bool,
    pub is_array: bool,
    pub is_func: bool,
    pub is_initialized: bool,
    pub is_global: bool,

    /// Storage slot of a plain local binding.
    pub slot: Option<u16>,

    /// Parameter descriptors of a function node.
    pub params: Vec<Node>,
    pub children: Vec<Node>,
    pub array_dims: Vec<usize>,
}

impl Node {
    /// A fresh, zero-valued node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies every attribute except the name and the children.
    ///
    /// Used when synthesizing a node from an existing one that must not share
    /// its symbol table identity.
    pub fn derive(&self) -> Self {
        Self {
            name: String::new(),
            data_type: self.data_type,
            expr: self.expr,
            value: self.value.clone(),
            is_const: self.is_const,
            is_array: self.is_array,
            is_func: self.is_func,
            is_initialized: self.is_initialized,
            is_global: self.is_global,
            slot: self.slot,
            params: self.params.clone(),
            children: Vec::new(),
            array_dims: self.array_dims.clone(),
        }
    }

    pub fn int(n: i32) -> Self {
        Self::literal(DataType::Int, Literal::Int(n))
    }

    pub fn bool(b: bool) -> Self {
        Self::literal(DataType::Bool, Literal::Bool(b))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::literal(DataType::String, Literal::Str(s.into()))
    }

    fn literal(data_type: DataType, value: Literal) -> Self {
        Self { data_type, expr: Some(ExprKind::Literal), value, ..Self::default() }
    }

    /// A variable declaration, optionally initialized by `init`.
    pub fn variable(name: impl Into<String>, data_type: DataType, init: Option<Node>) -> Self {
        let mut node = Self { name: name.into(), data_type, ..Self::default() };
        if let Some(init) = init {
            node.is_initialized = true;
            node.value = init.value.clone();
            node.children.push(init);
        }
        node
    }

    /// A constant declaration; its value is inlined at every use.
    pub fn constant(name: impl Into<String>, data_type: DataType, value: Literal) -> Self {
        Self { name: name.into(), data_type, value, is_const: true, is_initialized: true, ..Self::default() }
    }

    pub fn param(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type, ..Self::default() }
    }

    pub fn function(name: impl Into<String>, ret: DataType, params: Vec<Node>) -> Self {
        Self { name: name.into(), data_type: ret, is_func: true, params, ..Self::default() }
    }

    /// An identifier use-site carrying the declaration's resolved attributes.
    pub fn reference(decl: &Node) -> Self {
        Self {
            name: decl.name.clone(),
            data_type: decl.data_type,
            expr: Some(ExprKind::Ident),
            value: decl.value.clone(),
            is_const: decl.is_const,
            is_array: decl.is_array,
            is_global: decl.is_global,
            is_initialized: decl.is_initialized,
            slot: decl.slot,
            ..Self::default()
        }
    }

    /// Increment or decrement of the variable `target` refers to.
    pub fn step(kind: ExprKind, target: &Node) -> Self {
        debug_assert!(matches!(kind, ExprKind::Increment | ExprKind::Decrement));
        Self { expr: Some(kind), ..Self::reference(target) }
    }

    pub fn unary(kind: ExprKind, data_type: DataType, operand: Node) -> Self {
        Self { data_type, expr: Some(kind), children: vec![operand], ..Self::default() }
    }

    pub fn binary(kind: ExprKind, lhs: Node, rhs: Node) -> Self {
        let data_type = if kind.is_relational() || matches!(kind, ExprKind::And | ExprKind::Or) {
            DataType::Bool
        } else {
            lhs.data_type
        };
        Self { data_type, expr: Some(kind), children: vec![lhs, rhs], ..Self::default() }
    }

    /// A call of `func` (a function declaration) with `args`.
    pub fn call(func: &Node, args: Vec<Node>) -> Self {
        Self {
            name: func.name.clone(),
            data_type: func.data_type,
            expr: Some(ExprKind::Call),
            children: args,
            ..Self::default()
        }
    }

    /// True for a binding that lives in a local slot.
    pub fn is_plain_local(&self) -> bool {
        !(self.is_const || self.is_array || self.is_func || self.is_global)
    }
}
