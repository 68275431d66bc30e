//! Text loader for IR modules
//!
//! The format is line oriented:
//!
//! ```text
//! # comment
//! module bench
//! func add1(x) export
//!   local t
//!   add t, x, 1
//!   ret t
//! endfunc
//! endmodule
//! ```
//!
//! Instructions are `mov d, s`, `add|sub|mul|div|mod d, a, b`,
//! `beq|bne|blt|ble|bgt|bge label, a, b`, `jmp label`,
//! `call d, callee, args...`, `inline d, callee, args...` and `ret [v]`.
//! A call destination of `_` discards the result. `name:` defines a label.

use crate::error::ParseError;
use crate::ir::{BinaryOp, CallKind, CmpOp, IRFunction, IRInstruction, IRModule, IROpcode, Operand, Reg};

/// Parse a module from IR text
pub fn parse_module(source: &str) -> Result<IRModule, ParseError> {
    let mut module: Option<IRModule> = None;
    let mut current: Option<FunctionState> = None;
    let mut ended = false;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        if ended {
            return Err(ParseError::new(line_no, "text after `endmodule`"));
        }

        let (head, rest) = split_head(line);

        match head {
            "module" => {
                if module.is_some() {
                    return Err(ParseError::new(line_no, "duplicate `module` header"));
                }
                if rest.is_empty() {
                    return Err(ParseError::new(line_no, "module needs a name"));
                }
                module = Some(IRModule::new(rest));
            }
            "endmodule" => {
                if current.is_some() {
                    return Err(ParseError::new(line_no, "`endmodule` inside a function"));
                }
                ended = true;
            }
            "func" => {
                if current.is_some() {
                    return Err(ParseError::new(line_no, "nested `func`"));
                }
                current = Some(parse_func_header(rest, line_no)?);
            }
            "endfunc" => {
                let state = current
                    .take()
                    .ok_or_else(|| ParseError::new(line_no, "`endfunc` without `func`"))?;
                let func = state.finish(line_no)?;
                let module = module.get_or_insert_with(|| IRModule::new("module"));
                let name = func.name.clone();
                if !module.add_function(func) {
                    return Err(ParseError::new(line_no, format!("duplicate function `{}`", name)));
                }
            }
            _ => {
                let state = current
                    .as_mut()
                    .ok_or_else(|| ParseError::new(line_no, "instruction outside a function"))?;
                state.parse_line(line, head, rest, line_no)?;
            }
        }
    }

    if let Some(state) = current {
        return Err(ParseError::new(
            source.lines().count(),
            format!("function `{}` is missing `endfunc`", state.func.name),
        ));
    }

    Ok(module.unwrap_or_else(|| IRModule::new("module")))
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn split_head(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim()),
        None => (line, ""),
    }
}

fn split_operands(rest: &str) -> Vec<&str> {
    if rest.is_empty() {
        return Vec::new();
    }
    rest.split(',').map(str::trim).collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_func_header(rest: &str, line_no: usize) -> Result<FunctionState, ParseError> {
    let open = rest
        .find('(')
        .ok_or_else(|| ParseError::new(line_no, "expected `(` after function name"))?;
    let close = rest
        .rfind(')')
        .ok_or_else(|| ParseError::new(line_no, "expected `)` after parameters"))?;
    if close < open {
        return Err(ParseError::new(line_no, "malformed parameter list"));
    }

    let name = rest[..open].trim();
    if !is_identifier(name) {
        return Err(ParseError::new(line_no, format!("invalid function name `{}`", name)));
    }

    let params = split_operands(rest[open + 1..close].trim());
    for (i, p) in params.iter().enumerate() {
        if !is_identifier(p) {
            return Err(ParseError::new(line_no, format!("invalid parameter `{}`", p)));
        }
        if params[..i].contains(p) {
            return Err(ParseError::new(line_no, format!("duplicate parameter `{}`", p)));
        }
    }

    let mut func = IRFunction::new(name, &params);
    match rest[close + 1..].trim() {
        "" => {}
        "export" => func.exported = true,
        other => {
            return Err(ParseError::new(line_no, format!("unexpected `{}` after parameters", other)))
        }
    }

    Ok(FunctionState {
        func,
        defined_labels: Vec::new(),
        referenced_labels: Vec::new(),
    })
}

struct FunctionState {
    func: IRFunction,
    defined_labels: Vec<String>,
    referenced_labels: Vec<(String, usize)>,
}

impl FunctionState {
    fn parse_line(&mut self, line: &str, head: &str, rest: &str, line_no: usize) -> Result<(), ParseError> {
        if let Some(name) = line.strip_suffix(':') {
            let name = name.trim();
            if !is_identifier(name) {
                return Err(ParseError::new(line_no, format!("invalid label `{}`", name)));
            }
            if self.defined_labels.iter().any(|l| l == name) {
                return Err(ParseError::new(line_no, format!("duplicate label `{}`", name)));
            }
            self.defined_labels.push(name.to_string());
            let label = self.func.label(name);
            self.push(IROpcode::Label(label), line_no);
            return Ok(());
        }

        let ops = split_operands(rest);
        let opcode = match head {
            "local" => {
                if ops.is_empty() {
                    return Err(ParseError::new(line_no, "`local` needs at least one name"));
                }
                for name in ops {
                    if !is_identifier(name) {
                        return Err(ParseError::new(line_no, format!("invalid local `{}`", name)));
                    }
                    self.func.add_local(name);
                }
                return Ok(());
            }
            "mov" => {
                expect_arity(head, &ops, 2, line_no)?;
                IROpcode::Mov {
                    dst: self.dst(ops[0], line_no)?,
                    src: self.operand(ops[1], line_no)?,
                }
            }
            "add" | "sub" | "mul" | "div" | "mod" => {
                expect_arity(head, &ops, 3, line_no)?;
                let op = match head {
                    "add" => BinaryOp::Add,
                    "sub" => BinaryOp::Sub,
                    "mul" => BinaryOp::Mul,
                    "div" => BinaryOp::Div,
                    _ => BinaryOp::Mod,
                };
                IROpcode::Binary {
                    op,
                    dst: self.dst(ops[0], line_no)?,
                    lhs: self.operand(ops[1], line_no)?,
                    rhs: self.operand(ops[2], line_no)?,
                }
            }
            "beq" | "bne" | "blt" | "ble" | "bgt" | "bge" => {
                expect_arity(head, &ops, 3, line_no)?;
                let cond = match head {
                    "beq" => CmpOp::Eq,
                    "bne" => CmpOp::Ne,
                    "blt" => CmpOp::Lt,
                    "ble" => CmpOp::Le,
                    "bgt" => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                IROpcode::Branch {
                    cond,
                    target: self.label_ref(ops[0], line_no)?,
                    lhs: self.operand(ops[1], line_no)?,
                    rhs: self.operand(ops[2], line_no)?,
                }
            }
            "jmp" => {
                expect_arity(head, &ops, 1, line_no)?;
                IROpcode::Jump(self.label_ref(ops[0], line_no)?)
            }
            "call" | "inline" => {
                if ops.len() < 2 {
                    return Err(ParseError::new(
                        line_no,
                        format!("`{}` needs a destination and a callee", head),
                    ));
                }
                let dst = if ops[0] == "_" {
                    None
                } else {
                    Some(self.dst(ops[0], line_no)?)
                };
                if !is_identifier(ops[1]) {
                    return Err(ParseError::new(line_no, format!("invalid callee `{}`", ops[1])));
                }
                let args = ops[2..]
                    .iter()
                    .map(|a| self.operand(a, line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                IROpcode::Call {
                    kind: if head == "call" { CallKind::Call } else { CallKind::Inline },
                    callee: ops[1].to_string(),
                    dst,
                    args,
                }
            }
            "ret" => match ops.len() {
                0 => IROpcode::Ret(None),
                1 => IROpcode::Ret(Some(self.operand(ops[0], line_no)?)),
                _ => return Err(ParseError::new(line_no, "`ret` takes at most one operand")),
            },
            other => {
                return Err(ParseError::new(line_no, format!("unknown instruction `{}`", other)));
            }
        };

        self.push(opcode, line_no);
        Ok(())
    }

    fn push(&mut self, opcode: IROpcode, line_no: usize) {
        self.func.instructions.push(IRInstruction::new(opcode, line_no));
    }

    fn dst(&self, name: &str, line_no: usize) -> Result<Reg, ParseError> {
        self.func
            .reg(name)
            .ok_or_else(|| ParseError::new(line_no, format!("undefined register `{}`", name)))
    }

    fn operand(&self, text: &str, line_no: usize) -> Result<Operand, ParseError> {
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Operand::Imm(value));
        }
        self.dst(text, line_no).map(Operand::Reg)
    }

    fn label_ref(&mut self, name: &str, line_no: usize) -> Result<crate::ir::LabelId, ParseError> {
        if !is_identifier(name) {
            return Err(ParseError::new(line_no, format!("invalid label `{}`", name)));
        }
        self.referenced_labels.push((name.to_string(), line_no));
        Ok(self.func.label(name))
    }

    fn finish(self, line_no: usize) -> Result<IRFunction, ParseError> {
        for (label, used_at) in &self.referenced_labels {
            if !self.defined_labels.contains(label) {
                return Err(ParseError::new(*used_at, format!("undefined label `{}`", label)));
            }
        }
        if self.func.instructions.is_empty() {
            return Err(ParseError::new(
                line_no,
                format!("function `{}` has no instructions", self.func.name),
            ));
        }
        Ok(self.func)
    }
}

fn expect_arity(head: &str, ops: &[&str], n: usize, line_no: usize) -> Result<(), ParseError> {
    if ops.len() != n {
        return Err(ParseError::new(
            line_no,
            format!("`{}` takes {} operands, found {}", head, n, ops.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
module sample
# adds one
func add1(x)
  local t
  add t, x, 1
  ret t
endfunc

func driver(n) export
  local i, sum
  mov i, 0
  mov sum, 0
loop:
  bge done, i, n
  call sum, add1, sum
  add i, i, 1
  jmp loop
done:
  ret sum
endfunc
endmodule
";

    #[test]
    fn test_parse_sample_module() {
        let m = parse_module(SAMPLE).unwrap();
        assert_eq!(m.name, "sample");
        assert_eq!(m.functions().len(), 2);

        let add1 = m.function("add1").unwrap();
        assert_eq!(add1.param_count, 1);
        assert_eq!(add1.instruction_count(), 2);
        assert!(!add1.exported);

        let driver = m.function("driver").unwrap();
        assert!(driver.exported);
        // mov, mov, label, bge, call, add, jmp, label, ret
        assert_eq!(driver.instruction_count(), 9);
        let calls: Vec<_> = driver.instructions.iter().filter(|i| i.is_call()).collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].callee(), Some("add1"));
        assert_eq!(calls[0].call_kind(), Some(CallKind::Call));
        assert_eq!(calls[0].line, 15);
    }

    #[test]
    fn test_parse_inline_and_discarded_result() {
        let src = "func f()\n  inline _, g, 1, 2\n  ret\nendfunc\n";
        let m = parse_module(src).unwrap();
        let f = m.function("f").unwrap();
        match &f.instructions[0].opcode {
            IROpcode::Call { kind, callee, dst, args } => {
                assert_eq!(*kind, CallKind::Inline);
                assert_eq!(callee, "g");
                assert!(dst.is_none());
                assert_eq!(args, &vec![Operand::Imm(1), Operand::Imm(2)]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(m.name, "module");
    }

    #[test]
    fn test_negative_immediates() {
        let m = parse_module("func f(x)\n  add x, x, -7\n  ret x\nendfunc").unwrap();
        let f = m.function("f").unwrap();
        assert!(matches!(
            f.instructions[0].opcode,
            IROpcode::Binary { rhs: Operand::Imm(-7), .. }
        ));
    }

    #[test]
    fn test_undefined_register_reports_line() {
        let err = parse_module("func f()\n  mov y, 1\nendfunc").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("undefined register `y`"));
    }

    #[test]
    fn test_undefined_label() {
        let err = parse_module("func f()\n  jmp nowhere\n  ret\nendfunc").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("undefined label"));
    }

    #[test]
    fn test_duplicate_function() {
        let err = parse_module("func f()\n ret\nendfunc\nfunc f()\n ret\nendfunc").unwrap_err();
        assert!(err.message.contains("duplicate function"));
    }

    #[test]
    fn test_missing_endfunc() {
        let err = parse_module("func f()\n  ret\n").unwrap_err();
        assert!(err.message.contains("missing `endfunc`"));
    }

    #[test]
    fn test_unknown_instruction() {
        let err = parse_module("func f()\n  frob 1\nendfunc").unwrap_err();
        assert!(err.message.contains("unknown instruction `frob`"));
    }

    #[test]
    fn test_operand_count_checked() {
        let err = parse_module("func f(a)\n  add a, a\nendfunc").unwrap_err();
        assert!(err.message.contains("takes 3 operands"));
    }

    #[test]
    fn test_instruction_outside_function() {
        let err = parse_module("module m\nret 1\n").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
