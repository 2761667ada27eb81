//! Replays a [`Program`] outline through the engine in the order its
//! operations expect.

use log::debug;
use mica_syntax::ast::DataType;
use mica_syntax::program::{Item, Program, Stmt};

use crate::config::CodegenConfig;
use crate::generator::CodeGenerator;

/// Compiles a whole unit; the text is available through
/// [`CodeGenerator::output`] afterwards.
pub fn compile_program(program: &Program, config: CodegenConfig) -> CodeGenerator {
    let mut gen = CodeGenerator::with_config(program.name.clone(), config);
    emit_program(&mut gen, program);
    gen
}

/// Emits every item of `program` into `gen` and closes the unit.
pub fn emit_program(gen: &mut CodeGenerator, program: &Program) {
    for item in &program.items {
        match item {
            Item::Var(decl) => gen.generate_var_decl(decl),
            Item::Function { decl, body } => {
                debug!("emitting {}::{}", program.name, decl.name);
                let mut body_emitter = BodyEmitter { gen: &mut *gen, ret: decl.data_type };
                body_emitter.emit_block(body);
                gen.generate_func_decl(decl);
            }
        }
    }
    gen.generate_program();
}

struct BodyEmitter<'g> {
    gen: &'g mut CodeGenerator,
    /// Return type of the function being emitted.
    ret: DataType,
}

impl BodyEmitter<'_> {
    /// Leaves exactly one fragment holding every statement in order.
    ///
    /// Combining prepends, so statements are emitted last to first.
    fn emit_block(&mut self, stmts: &[Stmt]) {
        self.gen.enter_scope();
        self.gen.insert_empty();
        for stmt in stmts.iter().rev() {
            self.emit_stmt(stmt);
            self.gen.combine_top_two();
        }
        self.gen.exit_scope();
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl(decl) => self.gen.generate_var_decl(decl),
            Stmt::Assign { target, value } => self.gen.generate_assignment(target, value),
            Stmt::Expr(e) => self.gen.generate_expr_stmt(e),
            Stmt::Print(e) => self.gen.generate_print(e),
            Stmt::Println(e) => self.gen.generate_println(e),
            Stmt::Return(value) => self.gen.generate_return(self.ret, value.as_ref()),
            Stmt::If { cond, then_body } => {
                self.emit_block(then_body);
                self.gen.generate_if(cond);
            }
            Stmt::IfElse { cond, then_body, else_body } => {
                self.emit_block(then_body);
                self.emit_block(else_body);
                self.gen.generate_if_else(cond);
            }
            Stmt::While { cond, body } => {
                self.emit_block(body);
                self.gen.generate_while(cond);
            }
            Stmt::For { init, cond, step, body } => {
                self.emit_stmt(init);
                self.emit_stmt(step);
                self.emit_block(body);
                self.gen.generate_for(cond);
            }
            Stmt::Foreach { var, from, to, body } => {
                self.emit_block(body);
                self.gen.generate_foreach(var, from, to);
            }
            Stmt::Block(stmts) => self.emit_block(stmts),
        }
    }
}
