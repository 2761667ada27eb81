//! Text parser for mica assembly.
//!
//! Accepts exactly what the printer and the code generator emit: one
//! directive or instruction per line, blank lines and `//` comments ignored.

use std::str::FromStr;

use mica_syntax::error::{error_at, Error, Result};

use crate::instruction::{unescape, Cond, FieldRef, Instruction, MethodRef};
use crate::program::{ClassUnit, Field, Method};
use crate::value::Value;

impl FromStr for Instruction {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        if let Some(label) = line.strip_suffix(':') {
            if is_label(label) { return Ok(Instruction::Label(label.to_string())); }
            return Err(format!("invalid label '{label}'"));
        }
        let (op, rest) = match line.split_once(char::is_whitespace) {
            Some((op, rest)) => (op, rest.trim()),
            None => (line, ""),
        };
        let insn = match op {
            "sipush" => Instruction::Sipush(int(rest)?),
            "iconst_0" => Instruction::Iconst(false),
            "iconst_1" => Instruction::Iconst(true),
            "ldc" => Instruction::Ldc(string(rest)?),
            "iload" => Instruction::Iload(slot(rest)?),
            "istore" => Instruction::Istore(slot(rest)?),
            "iinc" => {
                let (s, d) = rest.split_once(char::is_whitespace).ok_or("iinc expects a slot and a delta")?;
                Instruction::Iinc(slot(s)?, int(d.trim())?)
            }
            "getstatic" => Instruction::GetStatic(field_ref(rest)?),
            "putstatic" => Instruction::PutStatic(field_ref(rest)?),
            "iadd" => Instruction::Iadd,
            "isub" => Instruction::Isub,
            "imul" => Instruction::Imul,
            "idiv" => Instruction::Idiv,
            "irem" => Instruction::Irem,
            "ineg" => Instruction::Ineg,
            "iand" => Instruction::Iand,
            "ior" => Instruction::Ior,
            "ixor" => Instruction::Ixor,
            "dup" => Instruction::Dup,
            "pop" => Instruction::Pop,
            "nop" => Instruction::Nop,
            "ifeq" => Instruction::If(Cond::Eq, label(rest)?),
            "ifne" => Instruction::If(Cond::Ne, label(rest)?),
            "iflt" => Instruction::If(Cond::Lt, label(rest)?),
            "ifgt" => Instruction::If(Cond::Gt, label(rest)?),
            "ifle" => Instruction::If(Cond::Le, label(rest)?),
            "ifge" => Instruction::If(Cond::Ge, label(rest)?),
            "goto" => Instruction::Goto(label(rest)?),
            "invokestatic" => Instruction::InvokeStatic(method_ref(rest)?),
            "invokevirtual" => Instruction::InvokeVirtual(method_ref(rest)?),
            "ireturn" => Instruction::Ireturn,
            "return" => Instruction::Return,
            other => return Err(format!("unknown mnemonic '{other}'")),
        };
        let takes_operand = !rest.is_empty();
        let has_operand = !matches!(
            insn,
            Instruction::Iconst(_) | Instruction::Iadd | Instruction::Isub | Instruction::Imul | Instruction::Idiv
                | Instruction::Irem | Instruction::Ineg | Instruction::Iand | Instruction::Ior | Instruction::Ixor
                | Instruction::Dup | Instruction::Pop | Instruction::Nop | Instruction::Ireturn | Instruction::Return
        );
        if takes_operand && !has_operand {
            return Err(format!("'{op}' takes no operand"));
        }
        Ok(insn)
    }
}

fn is_label(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn label(s: &str) -> std::result::Result<String, String> {
    if is_label(s) { Ok(s.to_string()) } else { Err(format!("invalid label '{s}'")) }
}

fn int(s: &str) -> std::result::Result<i32, String> {
    s.parse().map_err(|_| format!("invalid integer '{s}'"))
}

fn slot(s: &str) -> std::result::Result<u16, String> {
    s.parse().map_err(|_| format!("invalid slot '{s}'"))
}

fn string(s: &str) -> std::result::Result<String, String> {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .and_then(unescape)
        .ok_or_else(|| format!("invalid string constant {s}"))
}

/// `owner.name` split at the last dot.
fn qualified(s: &str) -> std::result::Result<(String, String), String> {
    s.rsplit_once('.')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
        .map(|(owner, name)| (owner.to_string(), name.to_string()))
        .ok_or_else(|| format!("expected 'owner.name', got '{s}'"))
}

fn field_ref(s: &str) -> std::result::Result<FieldRef, String> {
    let mut words = s.split_whitespace();
    let (Some(ty), Some(path), None) = (words.next(), words.next(), words.next()) else {
        return Err(format!("expected 'type owner.name', got '{s}'"));
    };
    let (owner, name) = qualified(path)?;
    Ok(FieldRef::new(ty, owner, name))
}

fn method_ref(s: &str) -> std::result::Result<MethodRef, String> {
    let (ret, sig) = s.split_once(char::is_whitespace).ok_or_else(|| format!("expected 'ret owner.name(..)', got '{s}'"))?;
    let (path, params) = signature(sig.trim())?;
    let (owner, name) = qualified(&path)?;
    Ok(MethodRef::new(ret, owner, name, params))
}

/// `name(a, b)` -> (`name`, [`a`, `b`])
fn signature(s: &str) -> std::result::Result<(String, Vec<String>), String> {
    let (head, tail) = s.split_once('(').ok_or_else(|| format!("missing '(' in '{s}'"))?;
    let inner = tail.strip_suffix(')').ok_or_else(|| format!("missing ')' in '{s}'"))?;
    let params = inner.split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect();
    Ok((head.trim().to_string(), params))
}

struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(src: &'a str) -> Self { Self { inner: src.lines().enumerate(), last: 0 } }

    /// Next meaningful line with its 1-based number.
    fn next(&mut self) -> Option<(usize, &'a str)> {
        for (i, raw) in self.inner.by_ref() {
            self.last = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") { continue; }
            return Some((i + 1, line));
        }
        None
    }

    fn expect(&mut self, what: &str) -> Result<(usize, &'a str)> {
        match self.next() {
            Some(l) => Ok(l),
            None => error_at(self.last.max(1), format!("unexpected end of input, expected {what}")),
        }
    }
}

impl FromStr for ClassUnit {
    type Err = Error;

    fn from_str(src: &str) -> Result<Self> {
        let mut lines = Lines::new(src);
        let (n, head) = lines.expect("'class'")?;
        let name = match head.strip_prefix("class ") {
            Some(name) if is_label(name.trim()) => name.trim().to_string(),
            _ => return error_at(n, format!("expected 'class <name>', got '{head}'")),
        };
        open_brace(&mut lines)?;

        let mut unit = ClassUnit { name, fields: Vec::new(), methods: Vec::new() };
        loop {
            let (n, line) = lines.expect("'}'")?;
            if line == "}" { break; }
            if line.starts_with("field ") {
                unit.fields.push(parse_field(n, line)?);
            } else if line.starts_with("method ") {
                unit.methods.push(parse_method(&mut lines, n, line)?);
            } else {
                return error_at(n, format!("expected 'field' or 'method', got '{line}'"));
            }
        }
        if let Some((n, line)) = lines.next() {
            return error_at(n, format!("trailing input after class body: '{line}'"));
        }
        Ok(unit)
    }
}

fn open_brace(lines: &mut Lines<'_>) -> Result<()> {
    let (n, line) = lines.expect("'{'")?;
    if line == "{" { Ok(()) } else { error_at(n, format!("expected '{{', got '{line}'")) }
}

fn parse_field(n: usize, line: &str) -> Result<Field> {
    let (decl, init) = match line.split_once('=') {
        Some((decl, init)) => (decl, Some(init.trim())),
        None => (line, None),
    };
    let words: Vec<&str> = decl.split_whitespace().collect();
    let ["field", "static", ty, name] = words.as_slice() else {
        return error_at(n, format!("malformed field declaration '{line}'"));
    };
    let init = match init {
        None => None,
        Some(v) if v.starts_with('"') => Some(Value::Str(string(v).or_else(|e| error_at(n, e))?)),
        Some(v) => match v.parse() {
            Ok(v) => Some(Value::Int(v)),
            Err(_) => return error_at(n, format!("invalid field initializer '{v}'")),
        },
    };
    Ok(Field { ty: ty.to_string(), name: name.to_string(), init })
}

fn parse_method(lines: &mut Lines<'_>, n: usize, header: &str) -> Result<Method> {
    let (decl, params) = signature(header).or_else(|e| error_at(n, e))?;
    let words: Vec<&str> = decl.split_whitespace().collect();
    let (ret, name) = match words.as_slice() {
        ["method", .., ret, name] if words.len() >= 3 => (ret.to_string(), name.to_string()),
        _ => return error_at(n, format!("malformed method header '{header}'")),
    };

    let mut max_stack = None;
    let mut max_locals = None;
    loop {
        let (n, line) = lines.expect("'{'")?;
        if line == "{" { break; }
        let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let value: u32 = match value.trim().parse() {
            Ok(v) => v,
            Err(_) => return error_at(n, format!("invalid limit in '{line}'")),
        };
        match key {
            "max_stack" => max_stack = Some(value),
            "max_locals" => max_locals = Some(value),
            _ => return error_at(n, format!("unexpected '{line}' in method header")),
        }
    }

    let mut code = Vec::new();
    loop {
        let (n, line) = lines.expect("'}'")?;
        if line == "}" { break; }
        match line.parse::<Instruction>() {
            Ok(insn) => code.push(insn),
            Err(msg) => return error_at(n, msg),
        }
    }
    let method = Method::new(ret, name, params, max_stack.unwrap_or(0), max_locals.unwrap_or(0), code);
    for insn in &method.code {
        if let Instruction::If(_, l) | Instruction::Goto(l) = insn {
            if method.label(l).is_none() {
                return error_at(n, format!("method '{}' jumps to undefined label '{l}'", method.name));
            }
        }
    }
    Ok(method)
}
