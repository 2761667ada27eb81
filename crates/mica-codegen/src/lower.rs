//! Expression lowering: attributed expression trees to instruction text.

use mica_asm::{Cond, FieldRef, Instruction as I, MethodRef};
use mica_syntax::ast::{kind_name, DataType, ExprKind, Literal, Node};

use crate::generator::CodeGenerator;

/// Appends one instruction line to `out`.
pub(crate) fn emit(out: &mut String, insn: I) {
    out.push_str(&insn.to_string());
    out.push('\n');
}

/// Type name as it appears in assembly signatures and field declarations.
pub fn descriptor(ty: DataType) -> &'static str {
    match ty {
        DataType::Void => "void",
        DataType::Bool => "boolean",
        DataType::Char => "char",
        DataType::Float => "float",
        DataType::Int => "int",
        DataType::String => "java.lang.String",
        DataType::Double => "double",
        DataType::Unknown => panic!("node with unknown data type reached code generation"),
    }
}

/// Branch taken when `lhs - rhs` satisfies the relational operator.
fn relational(kind: ExprKind) -> Cond {
    match kind {
        ExprKind::Lt => Cond::Lt,
        ExprKind::Gt => Cond::Gt,
        ExprKind::Le => Cond::Le,
        ExprKind::Ge => Cond::Ge,
        ExprKind::Eq => Cond::Eq,
        ExprKind::Ne => Cond::Ne,
        other => unreachable!("'{}' is not a comparison", other),
    }
}

pub(crate) fn slot_of(node: &Node) -> u16 {
    match node.slot {
        Some(slot) => slot,
        None => panic!("local '{}' has no storage slot", node.name),
    }
}

fn operand(node: &Node, i: usize) -> &Node {
    match node.children.get(i) {
        Some(child) => child,
        None => panic!("'{}' expression is missing operand {}", kind_name(node.expr), i),
    }
}

impl CodeGenerator {
    pub(crate) fn field(&self, node: &Node) -> FieldRef {
        FieldRef::new(descriptor(node.data_type), self.class_name(), node.name.clone())
    }

    /// Instruction that stores the stack top into the variable `node` names.
    pub(crate) fn store(&self, node: &Node) -> I {
        if node.is_global { I::PutStatic(self.field(node)) } else { I::Istore(slot_of(node)) }
    }

    fn push_literal(out: &mut String, ty: DataType, value: &Literal) {
        match (ty, value) {
            (DataType::Int, Literal::Int(n)) => emit(out, I::Sipush(*n)),
            (DataType::Bool, Literal::Bool(b)) => emit(out, I::Iconst(*b)),
            (DataType::Bool, Literal::Int(n)) => emit(out, I::Iconst(*n != 0)),
            (DataType::String, Literal::Str(s)) => emit(out, I::Ldc(s.clone())),
            (ty, value) => panic!("cannot push a {} literal holding {:?}", ty, value),
        }
    }

    /// Lowers an expression tree. Does not touch the fragment stack.
    pub fn lower_expr(&mut self, node: &Node) -> String {
        let Some(kind) = node.expr else {
            panic!("node '{}' without expression kind reached code generation", node.name);
        };
        let mut out = String::new();
        match kind {
            ExprKind::Ident => {
                if node.is_const {
                    Self::push_literal(&mut out, node.data_type, &node.value);
                } else if node.is_global {
                    emit(&mut out, I::GetStatic(self.field(node)));
                } else {
                    emit(&mut out, I::Iload(slot_of(node)));
                }
            }
            ExprKind::Literal => Self::push_literal(&mut out, node.data_type, &node.value),
            ExprKind::Not => {
                out += &self.lower_expr(operand(node, 0));
                emit(&mut out, I::Iconst(true));
                emit(&mut out, I::Ixor);
            }
            ExprKind::Increment | ExprKind::Decrement => {
                let up = kind == ExprKind::Increment;
                if node.is_global {
                    emit(&mut out, I::GetStatic(self.field(node)));
                    emit(&mut out, I::Iconst(true));
                    emit(&mut out, if up { I::Iadd } else { I::Isub });
                    emit(&mut out, I::PutStatic(self.field(node)));
                } else {
                    emit(&mut out, I::Iinc(slot_of(node), if up { 1 } else { -1 }));
                }
            }
            // identity: the operand is all there is
            ExprKind::Plus | ExprKind::Group => out += &self.lower_expr(operand(node, 0)),
            ExprKind::Minus => {
                out += &self.lower_expr(operand(node, 0));
                emit(&mut out, I::Ineg);
            }
            ExprKind::Call => {
                let mut params = Vec::with_capacity(node.children.len());
                for arg in &node.children {
                    out += &self.lower_expr(arg);
                    params.push(descriptor(arg.data_type).to_string());
                }
                let target = MethodRef::new(descriptor(node.data_type), self.class_name(), node.name.clone(), params);
                emit(&mut out, I::InvokeStatic(target));
            }
            ExprKind::And | ExprKind::Or | ExprKind::Add | ExprKind::Sub | ExprKind::Mul | ExprKind::Div | ExprKind::Mod => {
                out += &self.lower_expr(operand(node, 0));
                out += &self.lower_expr(operand(node, 1));
                emit(&mut out, match kind {
                    ExprKind::And => I::Iand,
                    ExprKind::Or => I::Ior,
                    ExprKind::Add => I::Iadd,
                    ExprKind::Sub => I::Isub,
                    ExprKind::Mul => I::Imul,
                    ExprKind::Div => I::Idiv,
                    _ => I::Irem,
                });
            }
            ExprKind::Lt | ExprKind::Gt | ExprKind::Le | ExprKind::Ge | ExprKind::Eq | ExprKind::Ne => {
                out += &self.lower_expr(operand(node, 0));
                out += &self.lower_expr(operand(node, 1));
                emit(&mut out, I::Isub);
                let (on_true, done) = (self.new_label(), self.new_label());
                emit(&mut out, I::If(relational(kind), on_true.clone()));
                emit(&mut out, I::Iconst(false));
                emit(&mut out, I::Goto(done.clone()));
                emit(&mut out, I::Label(on_true));
                emit(&mut out, I::Iconst(true));
                emit(&mut out, I::Label(done));
                emit(&mut out, I::Nop);
            }
        }
        out
    }

    /// Whether evaluating `node` leaves a value on the operand stack.
    pub(crate) fn leaves_value(node: &Node) -> bool {
        match node.expr {
            Some(ExprKind::Increment | ExprKind::Decrement) => false,
            Some(ExprKind::Call) => node.data_type != DataType::Void,
            _ => true,
        }
    }
}
