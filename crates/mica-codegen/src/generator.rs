//! The code generation engine.
//!
//! Statement and declaration operations follow one protocol: the fragments
//! of a construct's already generated parts sit on top of the fragment
//! stack, the operation pops exactly those, stitches them around its own
//! control flow and pushes exactly one fragment back. Arity and pop order
//! per construct:
//!
//! | operation              | pops (top first)                  |
//! |------------------------|-----------------------------------|
//! | `generate_func_decl`   | body (rewritten in place)         |
//! | `generate_if`          | condition, then-branch            |
//! | `generate_if_else`     | condition, else, then             |
//! | `generate_while`       | condition, body                   |
//! | `generate_for`         | condition, body, step, init       |
//! | `generate_foreach`     | body                              |
//!
//! Conditions are lowered and pushed by the operation itself, so callers
//! only push the statement fragments.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use mica_asm::{Cond, Field, FieldRef, Instruction as I, MethodRef, Value};
use mica_syntax::ast::{DataType, ExprKind, Literal, Node};
use mica_syntax::error::{error, Result};

use crate::config::CodegenConfig;
use crate::fragment::FragmentStack;
use crate::lower::{descriptor, emit};

pub struct CodeGenerator {
    class_name: String,
    label_counter: usize,
    fragments: FragmentStack,
    config: CodegenConfig,
}

impl CodeGenerator {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self::with_config(class_name, CodegenConfig::default())
    }

    pub fn with_config(class_name: impl Into<String>, config: CodegenConfig) -> Self {
        Self { class_name: class_name.into(), label_counter: 0, fragments: FragmentStack::new(), config }
    }

    /// Names the unit after the stem of the source file, `dir/prog.mc` -> `prog`.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let name = path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        Self::new(name)
    }

    pub fn class_name(&self) -> &str { &self.class_name }
    pub fn config(&self) -> &CodegenConfig { &self.config }
    pub fn fragments(&self) -> &FragmentStack { &self.fragments }

    /// A label never handed out before by this generator.
    pub fn new_label(&mut self) -> String {
        let label = format!("L{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    pub fn labels_used(&self) -> usize { self.label_counter }

    // Scope hooks for drivers; nothing to track yet since slots arrive
    // precomputed on the nodes.
    pub fn enter_scope(&mut self) {}
    pub fn exit_scope(&mut self) {}

    pub fn insert_empty(&mut self) { self.fragments.insert_empty(); }
    pub fn combine_top_two(&mut self) { self.fragments.combine_top_two(); }

    pub fn generate_expr(&mut self, node: &Node) {
        let text = self.lower_expr(node);
        self.fragments.push(text);
    }

    /// An expression evaluated for its effect; a produced value is dropped.
    pub fn generate_expr_stmt(&mut self, node: &Node) {
        let mut text = self.lower_expr(node);
        if Self::leaves_value(node) { emit(&mut text, I::Pop); }
        self.fragments.push(text);
    }

    pub fn generate_var_decl(&mut self, node: &Node) {
        if node.is_array {
            panic!("array variable '{}' cannot be lowered", node.name);
        }
        let mut out = String::new();
        // constants are inlined at every use and leave an empty fragment
        if node.is_const {
            self.fragments.push(out);
            return;
        }
        if node.is_global {
            let init = match (node.is_initialized, &node.value) {
                (false, _) => None,
                (true, Literal::Str(s)) => Some(Value::Str(s.clone())),
                (true, value) => match value.as_int() {
                    Some(v) => Some(Value::Int(v)),
                    None => panic!("global '{}' needs an int, bool or string literal initializer", node.name),
                },
            };
            let field = Field { ty: descriptor(node.data_type).to_string(), name: node.name.clone(), init };
            out.push_str(&field.to_string());
            out.push('\n');
        } else {
            match node.children.first() {
                Some(init) if node.is_initialized => out += &self.lower_expr(init),
                _ => emit(&mut out, I::Sipush(0)),
            }
            emit(&mut out, self.store(node));
        }
        self.fragments.push(out);
    }

    /// Wraps the body fragment on top of the stack into a method.
    pub fn generate_func_decl(&mut self, node: &Node) {
        let params = if node.name == self.config.entry_point {
            self.config.entry_params.join(", ")
        } else {
            node.params.iter().map(|p| descriptor(p.data_type)).collect::<Vec<_>>().join(", ")
        };
        let header = format!(
            "method public static {} {}({})\nmax_stack {}\nmax_locals {}\n{{\n",
            descriptor(node.data_type),
            node.name,
            params,
            self.config.max_stack,
            self.config.max_locals
        );
        let body = self.fragments.peek_mut();
        body.insert_str(0, &header);
        if node.data_type == DataType::Void { emit(body, I::Return); }
        body.push_str("}\n");
    }

    pub fn generate_assignment(&mut self, target: &Node, value: &Node) {
        self.generate_expr(value);
        let mut out = self.fragments.pop();
        emit(&mut out, self.store(target));
        self.fragments.push(out);
    }

    pub fn generate_print(&mut self, node: &Node) { self.print(node, false); }
    pub fn generate_println(&mut self, node: &Node) { self.print(node, true); }

    fn print(&mut self, node: &Node, newline: bool) {
        let ty = match node.data_type {
            DataType::String => "java.lang.String",
            DataType::Int => "int",
            DataType::Bool => "boolean",
            other => panic!("print of a {} value is not supported", other),
        };
        self.generate_expr(node);
        let value = self.fragments.pop();
        let mut out = String::new();
        emit(&mut out, I::GetStatic(FieldRef::stdout()));
        out += &value;
        emit(&mut out, I::InvokeVirtual(MethodRef::print(ty, newline)));
        self.fragments.push(out);
    }

    /// `if (cond) then`; the then-branch fragment must be on top.
    pub fn generate_if(&mut self, cond: &Node) {
        self.generate_expr(cond);
        let cond = self.fragments.pop();
        let then_block = self.fragments.pop();
        let on_false = self.new_label();

        let mut out = cond;
        emit(&mut out, I::If(Cond::Eq, on_false.clone()));
        out += &then_block;
        emit(&mut out, I::Label(on_false));
        emit(&mut out, I::Nop);
        self.fragments.push(out);
    }

    /// `if (cond) then else`; expects then, else pushed in that order.
    pub fn generate_if_else(&mut self, cond: &Node) {
        self.generate_expr(cond);
        let cond = self.fragments.pop();
        let else_block = self.fragments.pop();
        let then_block = self.fragments.pop();
        let (on_false, exit) = (self.new_label(), self.new_label());

        let mut out = cond;
        emit(&mut out, I::If(Cond::Eq, on_false.clone()));
        out += &then_block;
        emit(&mut out, I::Goto(exit.clone()));
        emit(&mut out, I::Label(on_false));
        out += &else_block;
        emit(&mut out, I::Label(exit));
        emit(&mut out, I::Nop);
        self.fragments.push(out);
    }

    pub fn generate_while(&mut self, cond: &Node) {
        self.generate_expr(cond);
        let cond = self.fragments.pop();
        let body = self.fragments.pop();
        let (begin, exit) = (self.new_label(), self.new_label());

        let mut out = String::new();
        emit(&mut out, I::Label(begin.clone()));
        out += &cond;
        emit(&mut out, I::If(Cond::Eq, exit.clone()));
        out += &body;
        emit(&mut out, I::Goto(begin));
        emit(&mut out, I::Label(exit));
        emit(&mut out, I::Nop);
        self.fragments.push(out);
    }

    /// `for (init; cond; step) body`; expects init, step, body pushed in that order.
    pub fn generate_for(&mut self, cond: &Node) {
        self.generate_expr(cond);
        let cond = self.fragments.pop();
        let body = self.fragments.pop();
        let step = self.fragments.pop();
        let init = self.fragments.pop();
        let (begin, exit) = (self.new_label(), self.new_label());

        let mut out = init;
        emit(&mut out, I::Label(begin.clone()));
        out += &cond;
        emit(&mut out, I::If(Cond::Eq, exit.clone()));
        out += &body;
        out += &step;
        emit(&mut out, I::Goto(begin));
        emit(&mut out, I::Label(exit));
        emit(&mut out, I::Nop);
        self.fragments.push(out);
    }

    /// Inclusive range loop `var` from `from` to `to`, counting up or down.
    ///
    /// `from < to` is evaluated once, before the loop, and its 0/1 result
    /// stays on the operand stack for the whole loop. Every pass duplicates
    /// it twice: once to pick the continuation test (`var <= to` or
    /// `var >= to`) and once to pick the step (increment or decrement). The
    /// exit path pops it.
    pub fn generate_foreach(&mut self, var: &Node, from: &Node, to: &Node) {
        let body = self.fragments.pop();

        let mut pair = Node::new();
        pair.data_type = DataType::Bool;
        pair.expr = Some(ExprKind::Lt);
        pair.children = vec![from.clone(), to.clone()];
        let mode = self.lower_expr(&pair);

        let mut test = pair.derive();
        test.expr = Some(ExprKind::Le);
        test.children = vec![var.clone(), to.clone()];
        let up_test = self.lower_expr(&test);
        test.expr = Some(ExprKind::Ge);
        let down_test = self.lower_expr(&test);

        let up_step = self.lower_expr(&Node::step(ExprKind::Increment, var));
        let down_step = self.lower_expr(&Node::step(ExprKind::Decrement, var));

        let mut init = self.lower_expr(from);
        emit(&mut init, self.store(var));

        let begin = self.new_label();
        let down_test_at = self.new_label();
        let tested = self.new_label();
        let down_step_at = self.new_label();
        let stepped = self.new_label();
        let exit = self.new_label();

        let mut out = mode;
        out += &init;
        emit(&mut out, I::Label(begin.clone()));
        emit(&mut out, I::Dup);
        emit(&mut out, I::If(Cond::Eq, down_test_at.clone()));
        out += &up_test;
        emit(&mut out, I::Goto(tested.clone()));
        emit(&mut out, I::Label(down_test_at));
        out += &down_test;
        emit(&mut out, I::Label(tested));
        emit(&mut out, I::If(Cond::Eq, exit.clone()));
        out += &body;
        emit(&mut out, I::Dup);
        emit(&mut out, I::If(Cond::Eq, down_step_at.clone()));
        out += &up_step;
        emit(&mut out, I::Goto(stepped.clone()));
        emit(&mut out, I::Label(down_step_at));
        out += &down_step;
        emit(&mut out, I::Label(stepped));
        emit(&mut out, I::Goto(begin));
        emit(&mut out, I::Label(exit));
        emit(&mut out, I::Pop);
        emit(&mut out, I::Nop);
        self.fragments.push(out);
    }

    /// `ret` is the return type of the enclosing function.
    pub fn generate_return(&mut self, ret: DataType, value: Option<&Node>) {
        let mut out = String::new();
        match (ret, value) {
            (DataType::Void, _) => emit(&mut out, I::Return),
            (_, Some(value)) => {
                out += &self.lower_expr(value);
                emit(&mut out, I::Ireturn);
            }
            (ret, None) => panic!("return without a value in a function returning {}", ret),
        }
        self.fragments.push(out);
    }

    /// Folds every pending fragment, bottom first, into the unit.
    pub fn generate_program(&mut self) {
        let body: String = self.fragments.take_all().concat();
        let unit = format!("class {}\n{{\n{}}}\n", self.class_name, body);
        debug!("\n--- Generated unit {} ---\n{unit}-----------------------", self.class_name);
        self.fragments.push(unit);
    }

    /// The top fragment; after `generate_program` this is the whole unit.
    pub fn output(&self) -> Option<&str> { self.fragments.peek() }

    /// Writes the unit to `<dir>/<class name>.<extension>`.
    pub fn dump(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let Some(text) = self.output() else {
            return error(format!("nothing generated for unit '{}'", self.class_name));
        };
        let path = dir.as_ref().join(format!("{}.{}", self.class_name, self.config.extension));
        fs::write(&path, text)?;
        debug!("wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str, slot: u16) -> Node {
        let mut decl = Node::variable(name, DataType::Int, None);
        decl.slot = Some(slot);
        decl
    }

    fn global(name: &str) -> Node {
        let mut decl = Node::variable(name, DataType::Int, None);
        decl.is_global = true;
        decl
    }

    fn lines(s: &str) -> Vec<&str> { s.lines().collect() }

    #[test]
    fn unit_name_comes_from_file_stem() {
        assert_eq!(CodeGenerator::from_path("some/dir/hello.mc").class_name(), "hello");
        assert_eq!(CodeGenerator::from_path("plain").class_name(), "plain");
    }

    #[test]
    fn labels_are_never_reused() {
        let mut g = CodeGenerator::new("Demo");
        let labels: Vec<_> = (0..4).map(|_| g.new_label()).collect();
        assert_eq!(labels, vec!["L0", "L1", "L2", "L3"]);
    }

    #[test]
    fn var_decls_by_storage_class() {
        let mut g = CodeGenerator::new("Demo");
        let mut x = Node::variable("x", DataType::Int, Some(Node::int(9)));
        x.is_global = true;
        g.generate_var_decl(&x);
        assert_eq!(g.fragments.pop(), "field static int x = 9\n");

        g.generate_var_decl(&global("y"));
        assert_eq!(g.fragments.pop(), "field static int y\n");

        let mut s = Node::variable("motto", DataType::String, Some(Node::string("say \"hi\"")));
        s.is_global = true;
        g.generate_var_decl(&s);
        assert_eq!(g.fragments.pop(), "field static java.lang.String motto = \"say \\\"hi\\\"\"\n");

        let mut a = Node::variable("a", DataType::Int, Some(Node::int(5)));
        a.slot = Some(2);
        g.generate_var_decl(&a);
        assert_eq!(lines(&g.fragments.pop()), vec!["sipush 5", "istore 2"]);

        g.generate_var_decl(&local("b", 3));
        assert_eq!(lines(&g.fragments.pop()), vec!["sipush 0", "istore 3"]);

        g.generate_var_decl(&Node::constant("K", DataType::Int, Literal::Int(1)));
        assert_eq!(g.fragments.pop(), "");
        assert!(g.fragments.is_empty());
    }

    #[test]
    fn assignment_targets_static_or_slot() {
        let mut g = CodeGenerator::new("Demo");
        let x = global("x");
        let rhs = Node::binary(ExprKind::Add, Node::reference(&x), Node::int(1));
        g.generate_assignment(&x, &rhs);
        let as_global = g.fragments.pop();
        assert_eq!(lines(&as_global), vec!["getstatic int Demo.x", "sipush 1", "iadd", "putstatic int Demo.x"]);

        let x = local("x", 0);
        let rhs = Node::binary(ExprKind::Add, Node::reference(&x), Node::int(1));
        g.generate_assignment(&x, &rhs);
        let as_local = g.fragments.pop();
        assert_eq!(lines(&as_local), vec!["iload 0", "sipush 1", "iadd", "istore 0"]);

        // the arithmetic in between is identical
        assert_eq!(lines(&as_global)[1..3], lines(&as_local)[1..3]);
    }

    #[test]
    fn print_dispatches_on_operand_type() {
        let mut g = CodeGenerator::new("Demo");
        g.generate_print(&Node::string("hi"));
        assert_eq!(
            lines(&g.fragments.pop()),
            vec![
                "getstatic java.io.PrintStream java.lang.System.out",
                "ldc \"hi\"",
                "invokevirtual void java.io.PrintStream.print(java.lang.String)"
            ]
        );
        g.generate_println(&Node::int(4));
        assert!(g.fragments.pop().ends_with("invokevirtual void java.io.PrintStream.println(int)\n"));
        g.generate_println(&Node::bool(false));
        assert!(g.fragments.pop().ends_with("invokevirtual void java.io.PrintStream.println(boolean)\n"));
    }

    #[test]
    #[should_panic(expected = "print of a double value is not supported")]
    fn print_of_double_is_rejected() {
        let mut d = Node::new();
        d.data_type = DataType::Double;
        d.expr = Some(ExprKind::Literal);
        d.value = Literal::Double(1.5);
        CodeGenerator::new("Demo").generate_print(&d);
    }

    #[test]
    fn if_else_layout() {
        let mut g = CodeGenerator::new("Demo");
        g.fragments.push("THEN\n".into());
        g.fragments.push("ELSE\n".into());
        g.generate_if_else(&Node::bool(true));
        assert_eq!(g.fragments.len(), 1);
        assert_eq!(
            lines(&g.fragments.pop()),
            vec!["iconst_1", "ifeq L0", "THEN", "goto L1", "L0:", "ELSE", "L1:", "nop"]
        );
    }

    #[test]
    fn if_layout() {
        let mut g = CodeGenerator::new("Demo");
        g.fragments.push("THEN\n".into());
        g.generate_if(&Node::bool(false));
        assert_eq!(lines(&g.fragments.pop()), vec!["iconst_0", "ifeq L0", "THEN", "L0:", "nop"]);
    }

    #[test]
    fn while_layout() {
        let mut g = CodeGenerator::new("Demo");
        g.fragments.push("BODY\n".into());
        g.generate_while(&Node::bool(true));
        assert_eq!(
            lines(&g.fragments.pop()),
            vec!["L0:", "iconst_1", "ifeq L1", "BODY", "goto L0", "L1:", "nop"]
        );
    }

    #[test]
    fn for_layout_pops_four_fragments() {
        let mut g = CodeGenerator::new("Demo");
        g.fragments.push("OUTER\n".into());
        g.fragments.push("INIT\n".into());
        g.fragments.push("STEP\n".into());
        g.fragments.push("BODY\n".into());
        g.generate_for(&Node::bool(true));
        assert_eq!(
            lines(&g.fragments.pop()),
            vec!["INIT", "L0:", "iconst_1", "ifeq L1", "BODY", "STEP", "goto L0", "L1:", "nop"]
        );
        assert_eq!(g.fragments.pop(), "OUTER\n");
    }

    #[test]
    fn foreach_keeps_mode_flag_on_stack() {
        let mut g = CodeGenerator::new("Demo");
        g.fragments.push("BODY\n".into());
        let i = local("i", 1);
        g.generate_foreach(&Node::reference(&i), &Node::int(11), &Node::int(15));
        let text = g.fragments.pop();
        let l = lines(&text);
        // direction test consumes L0/L1, the two bound tests L2..L5
        assert_eq!(&l[..12], &["sipush 11", "sipush 15", "isub", "iflt L0", "iconst_0", "goto L1", "L0:", "iconst_1", "L1:", "nop", "sipush 11", "istore 1"]);
        assert_eq!(l[12], "L6:");
        assert_eq!(&l[13..15], &["dup", "ifeq L7"]);
        // the lower bound is never evaluated again inside the loop
        assert!(!l[12..].contains(&"sipush 11"));
        assert_eq!(l.iter().filter(|s| **s == "dup").count(), 2);
        assert!(l.contains(&"iinc 1 1") && l.contains(&"iinc 1 -1"));
        assert_eq!(&l[l.len() - 4..], &["goto L6", "L11:", "pop", "nop"]);
        assert_eq!(g.labels_used(), 12);
    }

    #[test]
    fn func_decl_wraps_body() {
        let mut g = CodeGenerator::new("Demo");
        g.fragments.push("BODY\n".into());
        let f = Node::function("run", DataType::Void, vec![Node::param("a", DataType::Int), Node::param("s", DataType::String)]);
        g.generate_func_decl(&f);
        assert_eq!(
            lines(&g.fragments.pop()),
            vec![
                "method public static void run(int, java.lang.String)",
                "max_stack 1000",
                "max_locals 1000",
                "{",
                "BODY",
                "return",
                "}"
            ]
        );
    }

    #[test]
    fn entry_point_takes_program_arguments() {
        let mut g = CodeGenerator::new("Demo");
        g.insert_empty();
        g.generate_func_decl(&Node::function("main", DataType::Void, vec![]));
        assert!(g.fragments.pop().starts_with("method public static void main(java.lang.String[])\n"));
    }

    #[test]
    fn configured_limits_appear_in_headers() {
        let config = CodegenConfig { max_stack: 16, max_locals: 8, ..CodegenConfig::default() };
        let mut g = CodeGenerator::with_config("Demo", config);
        g.insert_empty();
        g.generate_func_decl(&Node::function("f", DataType::Int, vec![]));
        let text = g.fragments.pop();
        assert!(text.contains("max_stack 16\nmax_locals 8\n"));
        assert!(!text.contains("return"));
    }

    #[test]
    fn returns() {
        let mut g = CodeGenerator::new("Demo");
        g.generate_return(DataType::Void, None);
        assert_eq!(g.fragments.pop(), "return\n");
        g.generate_return(DataType::Int, Some(&Node::int(3)));
        assert_eq!(lines(&g.fragments.pop()), vec!["sipush 3", "ireturn"]);
    }

    #[test]
    fn expression_statements_drop_values() {
        let mut g = CodeGenerator::new("Demo");
        g.generate_expr_stmt(&Node::call(&Node::function("f", DataType::Int, vec![]), vec![]));
        assert!(g.fragments.pop().ends_with("pop\n"));
        g.generate_expr_stmt(&Node::step(ExprKind::Increment, &local("i", 0)));
        assert_eq!(g.fragments.pop(), "iinc 0 1\n");
    }

    #[test]
    fn program_concatenates_in_stack_order() {
        let mut g = CodeGenerator::new("Demo");
        g.fragments.push("A\n".into());
        g.fragments.push("B\n".into());
        g.generate_program();
        assert_eq!(g.output(), Some("class Demo\n{\nA\nB\n}\n"));
        assert_eq!(g.fragments.len(), 1);
    }

    #[test]
    fn dump_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = CodeGenerator::new("Saved");
        g.generate_program();
        let path = g.dump(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "Saved.jasm");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "class Saved\n{\n}\n");
    }

    #[test]
    fn dump_without_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CodeGenerator::new("Empty").dump(dir.path()).is_err());
    }
}
