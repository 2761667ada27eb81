//! Statement outline handed from the front end to the code generator.
//!
//! Expressions and declarations are plain [`Node`]s; this module only
//! records how statements nest so a driver can replay them in order.

use serde::{Deserialize, Serialize};

use crate::ast::Node;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    VarDecl(Node),
    Assign {
        target: Node,
        value: Node,
    },
    Expr(Node),
    Print(Node),
    Println(Node),
    Return(Option<Node>),
    If {
        cond: Node,
        then_body: Vec<Stmt>,
    },
    IfElse {
        cond: Node,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Node,
        body: Vec<Stmt>,
    },
    For {
        init: Box<Stmt>,
        cond: Node,
        step: Box<Stmt>,
        body: Vec<Stmt>,
    },
    /// Inclusive range loop whose direction is decided at run time.
    Foreach {
        var: Node,
        from: Node,
        to: Node,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
}

/// Top-level declarations, in program order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Var(Node),
    Function { decl: Node, body: Vec<Stmt> },
}

/// One compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub items: Vec<Item>,
}
