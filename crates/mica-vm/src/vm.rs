//! Mica VM core.

use std::collections::HashMap;
use std::io::{self, Write};

use log::{debug, trace};
use mica_asm::{ClassUnit, Instruction, Method, Value};
use mica_syntax::error::{error, Result};

use crate::display::display_printed;

const PRINT_STREAM: &str = "java.io.PrintStream";

struct Frame {
    method: usize,
    ip: usize,
    locals: Vec<Value>,
    /// Operand stack height when the frame was entered.
    base: usize,
}

pub struct Vm<W: Write> {
    stack: Vec<Value>,
    statics: HashMap<String, Value>,
    out: W,
    step_limit: Option<u64>,
    steps: u64,
}

impl Default for Vm<io::Stdout> { fn default() -> Self { Self::new() } }

impl Vm<io::Stdout> {
    /// A machine printing to standard output.
    pub fn new() -> Self { Self::with_output(io::stdout()) }
}

impl<W: Write> Vm<W> {
    pub fn with_output(out: W) -> Self {
        Self { stack: Vec::new(), statics: HashMap::new(), out, step_limit: None, steps: 0 }
    }

    /// Aborts a run after `limit` executed instructions.
    pub fn with_step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn output(&self) -> &W { &self.out }
    pub fn into_output(self) -> W { self.out }
    pub fn stack(&self) -> &[Value] { &self.stack }
    pub fn steps(&self) -> u64 { self.steps }

    pub fn static_value(&self, name: &str) -> Option<&Value> { self.statics.get(name) }

    /// Runs the `main` method of `unit`. Static fields start from their
    /// declared initial values.
    pub fn run(&mut self, unit: &ClassUnit) -> Result<()> {
        let Some(main) = unit.method("main") else {
            return error(format!("class '{}' has no main method", unit.name));
        };
        let args = vec![Value::Null; main.params.len()];
        self.invoke(unit, "main", args)?;
        self.out.flush()?;
        Ok(())
    }

    /// Calls the static method `name` of `unit` with `args` and returns what
    /// it returned, `None` for void methods.
    pub fn invoke(&mut self, unit: &ClassUnit, name: &str, args: Vec<Value>) -> Result<Option<Value>> {
        self.reset(unit);
        let index = unit
            .methods
            .iter()
            .position(|m| m.name == name && m.params.len() == args.len())
            .ok_or_else(|| format!("no method '{}' taking {} arguments in '{}'", name, args.len(), unit.name))?;
        self.execute(unit, index, args)
    }

    fn reset(&mut self, unit: &ClassUnit) {
        self.stack.clear();
        self.steps = 0;
        self.statics = unit
            .fields
            .iter()
            .map(|f| {
                let initial = match &f.init {
                    Some(v) => v.clone(),
                    None if f.ty == "java.lang.String" => Value::Null,
                    None => Value::Int(0),
                };
                (f.name.clone(), initial)
            })
            .collect();
    }

    fn frame_for(method: &Method, index: usize, args: Vec<Value>, base: usize) -> Frame {
        let size = (method.max_locals as usize).max(args.len());
        let mut locals = vec![Value::Int(0); size];
        for (slot, v) in args.into_iter().enumerate() { locals[slot] = v; }
        Frame { method: index, ip: 0, locals, base }
    }

    fn pop_int(&mut self, op: &str) -> Result<i32> {
        match self.stack.pop() {
            Some(Value::Int(n)) => Ok(n),
            Some(other) => error(format!("{op} expects int, got {}", other.type_name())),
            None => error(format!("stack underflow in {op}")),
        }
    }

    fn binary(&mut self, op: &str, f: impl FnOnce(i32, i32) -> Result<i32>) -> Result<()> {
        let b = self.pop_int(op)?;
        let a = self.pop_int(op)?;
        self.stack.push(Value::Int(f(a, b)?));
        Ok(())
    }

    fn execute(&mut self, unit: &ClassUnit, entry: usize, args: Vec<Value>) -> Result<Option<Value>> {
        debug!("enter {}.{}", unit.name, unit.methods[entry].name);
        let mut frames = vec![Self::frame_for(&unit.methods[entry], entry, args, self.stack.len())];

        while let Some(frame) = frames.last_mut() {
            let method = &unit.methods[frame.method];
            let Some(instr) = method.code.get(frame.ip) else {
                return error(format!("execution ran past the end of '{}'", method.name));
            };
            if let Some(limit) = self.step_limit {
                if self.steps >= limit { return error(format!("step limit of {limit} exceeded")); }
            }
            self.steps += 1;
            trace!("{}:{:<4} {}", method.name, frame.ip, instr);
            // default ip increment; jumps will override
            frame.ip += 1;

            match instr {
                Instruction::Sipush(n) => self.stack.push(Value::Int(*n)),
                Instruction::Iconst(b) => self.stack.push(Value::Int(i32::from(*b))),
                Instruction::Ldc(s) => self.stack.push(Value::Str(s.clone())),
                Instruction::Iload(i) => {
                    let v = frame.locals.get(*i as usize).ok_or_else(|| format!("invalid local slot {i}"))?.clone();
                    self.stack.push(v);
                }
                Instruction::Istore(i) => {
                    let v = self.stack.pop().ok_or_else(|| "stack underflow in istore")?;
                    let slot = frame.locals.get_mut(*i as usize).ok_or_else(|| format!("invalid local slot {i}"))?;
                    *slot = v;
                }
                Instruction::Iinc(i, delta) => {
                    let slot = frame.locals.get_mut(*i as usize).ok_or_else(|| format!("invalid local slot {i}"))?;
                    match slot {
                        Value::Int(n) => *n = n.wrapping_add(*delta),
                        other => return error(format!("iinc expects int, got {}", other.type_name())),
                    }
                }
                Instruction::GetStatic(r) => {
                    if r.owner == "java.lang.System" && r.name == "out" && r.ty == PRINT_STREAM {
                        self.stack.push(Value::Stream);
                    } else if r.owner == unit.name {
                        let v = self.statics.get(&r.name).ok_or_else(|| format!("unknown field '{r}'"))?.clone();
                        self.stack.push(v);
                    } else {
                        return error(format!("unknown field '{r}'"));
                    }
                }
                Instruction::PutStatic(r) => {
                    let v = self.stack.pop().ok_or_else(|| "stack underflow in putstatic")?;
                    match self.statics.get_mut(&r.name) {
                        Some(slot) if r.owner == unit.name => *slot = v,
                        _ => return error(format!("unknown field '{r}'")),
                    }
                }
                Instruction::Iadd => self.binary("iadd", |a, b| Ok(a.wrapping_add(b)))?,
                Instruction::Isub => self.binary("isub", |a, b| Ok(a.wrapping_sub(b)))?,
                Instruction::Imul => self.binary("imul", |a, b| Ok(a.wrapping_mul(b)))?,
                Instruction::Idiv => self.binary("idiv", |a, b| if b == 0 { error("division by zero") } else { Ok(a.wrapping_div(b)) })?,
                Instruction::Irem => self.binary("irem", |a, b| if b == 0 { error("division by zero") } else { Ok(a.wrapping_rem(b)) })?,
                Instruction::Iand => self.binary("iand", |a, b| Ok(a & b))?,
                Instruction::Ior => self.binary("ior", |a, b| Ok(a | b))?,
                Instruction::Ixor => self.binary("ixor", |a, b| Ok(a ^ b))?,
                Instruction::Ineg => {
                    let a = self.pop_int("ineg")?;
                    self.stack.push(Value::Int(a.wrapping_neg()));
                }
                Instruction::Dup => {
                    let top = self.stack.last().ok_or_else(|| "stack underflow in dup")?.clone();
                    self.stack.push(top);
                }
                Instruction::Pop => { self.stack.pop().ok_or_else(|| "stack underflow in pop")?; }
                Instruction::Nop | Instruction::Label(_) => {}
                Instruction::If(cond, label) => {
                    let v = self.pop_int(cond.mnemonic())?;
                    if cond.holds(v) {
                        frame.ip = method.label(label).ok_or_else(|| format!("unknown label '{label}' in '{}'", method.name))?;
                    }
                }
                Instruction::Goto(label) => {
                    frame.ip = method.label(label).ok_or_else(|| format!("unknown label '{label}' in '{}'", method.name))?;
                }
                Instruction::InvokeStatic(m) => {
                    let target = unit
                        .methods
                        .iter()
                        .position(|c| m.owner == unit.name && c.name == m.name && c.params == m.params)
                        .ok_or_else(|| format!("unknown method '{m}'"))?;
                    let argc = m.params.len();
                    if self.stack.len() < argc { return error(format!("stack underflow in call of '{}'", m.name)); }
                    let start = self.stack.len() - argc;
                    let args = self.stack.drain(start..).collect::<Vec<_>>();
                    debug!("call {}.{}{}", unit.name, m.name, unit.methods[target].signature());
                    frames.push(Self::frame_for(&unit.methods[target], target, args, start));
                }
                Instruction::InvokeVirtual(m) => {
                    if m.owner != PRINT_STREAM || !matches!(m.name.as_str(), "print" | "println") || m.params.len() != 1 {
                        return error(format!("unknown method '{m}'"));
                    }
                    let arg = self.stack.pop().ok_or_else(|| "stack underflow in invokevirtual")?;
                    match self.stack.pop() {
                        Some(Value::Stream) => {}
                        Some(other) => return error(format!("'{}' called on {}", m.name, other.type_name())),
                        None => return error("stack underflow in invokevirtual"),
                    }
                    let text = display_printed(&arg, &m.params[0])?;
                    if m.name == "println" { writeln!(self.out, "{text}")?; } else { write!(self.out, "{text}")?; }
                }
                // a returning callee drops whatever it left above its base
                Instruction::Ireturn => {
                    let ret = self.stack.pop().ok_or_else(|| "stack underflow in ireturn")?;
                    let base = frame.base;
                    frames.pop();
                    if frames.is_empty() { return Ok(Some(ret)); }
                    self.stack.truncate(base);
                    self.stack.push(ret);
                }
                Instruction::Return => {
                    let base = frame.base;
                    frames.pop();
                    if frames.is_empty() { return Ok(None); }
                    self.stack.truncate(base);
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_asm::{Cond, FieldRef, MethodRef};

    fn unit_with_main(code: Vec<Instruction>) -> ClassUnit {
        let main = Method::new("void".into(), "main".into(), vec![], 100, 4, code);
        ClassUnit { name: "T".into(), fields: vec![], methods: vec![main] }
    }

    fn run(code: Vec<Instruction>) -> (Vm<Vec<u8>>, Result<()>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut vm = Vm::with_output(Vec::new());
        let result = vm.run(&unit_with_main(code));
        (vm, result)
    }

    fn println_int() -> Vec<Instruction> {
        vec![Instruction::InvokeVirtual(MethodRef::print("int", true))]
    }

    #[test]
    fn arithmetic_wraps_at_32_bits() {
        for (op, a, b, expected) in [
            (Instruction::Iadd, i32::MAX, 1, i32::MIN),
            (Instruction::Isub, 3, 10, -7),
            (Instruction::Imul, 65536, 65536, 0),
            (Instruction::Idiv, -7, 2, -3),
            (Instruction::Irem, -7, 2, -1),
            (Instruction::Ixor, 1, 1, 0),
        ] {
            let (vm, result) = run(vec![Instruction::Sipush(a), Instruction::Sipush(b), op, Instruction::Return]);
            result.unwrap();
            assert_eq!(vm.stack(), &[Value::Int(expected)]);
        }
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (_, result) = run(vec![Instruction::Sipush(1), Instruction::Sipush(0), Instruction::Idiv, Instruction::Return]);
        assert!(result.unwrap_err().to_string().contains("division by zero"));
    }

    #[test]
    fn stack_underflow_is_reported() {
        let (_, result) = run(vec![Instruction::Sipush(5), Instruction::Iadd, Instruction::Return]);
        assert!(result.unwrap_err().to_string().contains("stack underflow in iadd"));
    }

    #[test]
    fn prints_through_system_out() {
        let mut code = vec![Instruction::GetStatic(FieldRef::stdout()), Instruction::Sipush(42)];
        code.extend(println_int());
        code.push(Instruction::GetStatic(FieldRef::stdout()));
        code.push(Instruction::Iconst(false));
        code.push(Instruction::InvokeVirtual(MethodRef::print("boolean", false)));
        code.push(Instruction::Return);
        let (vm, result) = run(code);
        result.unwrap();
        assert_eq!(String::from_utf8(vm.into_output()).unwrap(), "42\nfalse");
    }

    #[test]
    fn conditional_jumps_follow_labels() {
        let code = vec![
            Instruction::Sipush(0),
            Instruction::If(Cond::Eq, "L0".into()),
            Instruction::Sipush(1),
            Instruction::Goto("L1".into()),
            Instruction::Label("L0".into()),
            Instruction::Sipush(2),
            Instruction::Label("L1".into()),
            Instruction::Return,
        ];
        let (vm, result) = run(code);
        result.unwrap();
        assert_eq!(vm.stack(), &[Value::Int(2)]);
    }

    #[test]
    fn step_limit_stops_endless_loops() {
        let code = vec![Instruction::Label("L0".into()), Instruction::Goto("L0".into())];
        let mut vm = Vm::with_output(Vec::new()).with_step_limit(Some(50));
        let err = vm.run(&unit_with_main(code)).unwrap_err();
        assert!(err.to_string().contains("step limit of 50 exceeded"));
        assert_eq!(vm.steps(), 50);
    }

    #[test]
    fn static_calls_pass_arguments_in_slots() {
        let sub = Method::new(
            "int".into(),
            "sub".into(),
            vec!["int".into(), "int".into()],
            10,
            2,
            vec![Instruction::Iload(0), Instruction::Iload(1), Instruction::Isub, Instruction::Ireturn],
        );
        let unit = ClassUnit { name: "T".into(), fields: vec![], methods: vec![sub] };
        let mut vm = Vm::with_output(Vec::new());
        let v = vm.invoke(&unit, "sub", vec![Value::Int(10), Value::Int(4)]).unwrap();
        assert_eq!(v, Some(Value::Int(6)));
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn callee_leftovers_do_not_leak_into_caller() {
        let noisy = Method::new(
            "int".into(),
            "noisy".into(),
            vec![],
            10,
            1,
            vec![Instruction::Sipush(99), Instruction::Sipush(98), Instruction::Sipush(7), Instruction::Ireturn],
        );
        let quiet = Method::new("void".into(), "quiet".into(), vec![], 10, 1, vec![Instruction::Sipush(5), Instruction::Return]);
        let main = Method::new(
            "void".into(),
            "main".into(),
            vec![],
            10,
            1,
            vec![
                Instruction::Sipush(1),
                Instruction::InvokeStatic(MethodRef::new("int", "T", "noisy", vec![])),
                Instruction::InvokeStatic(MethodRef::new("void", "T", "quiet", vec![])),
                Instruction::Return,
            ],
        );
        let unit = ClassUnit { name: "T".into(), fields: vec![], methods: vec![noisy, quiet, main] };
        let mut vm = Vm::with_output(Vec::new());
        vm.run(&unit).unwrap();
        assert_eq!(vm.stack(), &[Value::Int(1), Value::Int(7)]);
    }

    #[test]
    fn string_statics_start_from_literals() {
        let greeting = FieldRef::new("java.lang.String", "T", "greeting");
        let mut unit = unit_with_main(vec![
            Instruction::GetStatic(FieldRef::stdout()),
            Instruction::GetStatic(greeting),
            Instruction::InvokeVirtual(MethodRef::print("java.lang.String", false)),
            Instruction::Return,
        ]);
        unit.fields.push(mica_asm::Field {
            ty: "java.lang.String".into(),
            name: "greeting".into(),
            init: Some(Value::Str("hi".into())),
        });
        unit.fields.push(mica_asm::Field { ty: "java.lang.String".into(), name: "unset".into(), init: None });
        let mut vm = Vm::with_output(Vec::new());
        vm.run(&unit).unwrap();
        assert_eq!(vm.static_value("unset"), Some(&Value::Null));
        assert_eq!(String::from_utf8(vm.into_output()).unwrap(), "hi");
    }

    #[test]
    fn statics_start_at_declared_values() {
        let x = FieldRef::new("int", "T", "x");
        let mut unit = unit_with_main(vec![
            Instruction::GetStatic(x.clone()),
            Instruction::Sipush(1),
            Instruction::Iadd,
            Instruction::PutStatic(x),
            Instruction::Return,
        ]);
        unit.fields.push(mica_asm::Field { ty: "int".into(), name: "x".into(), init: Some(Value::Int(41)) });
        let mut vm = Vm::with_output(Vec::new());
        vm.run(&unit).unwrap();
        assert_eq!(vm.static_value("x"), Some(&Value::Int(42)));
        // a second run starts over
        vm.run(&unit).unwrap();
        assert_eq!(vm.static_value("x"), Some(&Value::Int(42)));
    }

    #[test]
    fn unknown_targets_are_runtime_errors() {
        let (_, result) = run(vec![Instruction::Goto("L9".into())]);
        assert!(result.unwrap_err().to_string().contains("unknown label 'L9'"));

        let call = MethodRef::new("void", "T", "missing", vec![]);
        let (_, result) = run(vec![Instruction::InvokeStatic(call)]);
        assert!(result.unwrap_err().to_string().contains("unknown method 'void T.missing()'"));

        let (_, result) = run(vec![Instruction::GetStatic(FieldRef::new("int", "T", "nope"))]);
        assert!(result.unwrap_err().to_string().contains("unknown field 'int T.nope'"));
    }

    #[test]
    fn missing_main_is_reported() {
        let unit = ClassUnit { name: "Lib".into(), fields: vec![], methods: vec![] };
        let err = Vm::with_output(Vec::new()).run(&unit).unwrap_err();
        assert_eq!(err.to_string(), "class 'Lib' has no main method");
    }
}
