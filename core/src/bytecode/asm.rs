//! Line-oriented text assembler and disassembler.
//!
//! ```text
//! .function main params=0 registers=2
//! .const smi 3
//!   LdaConstant [0]
//!   Star r0
//! loop:
//!   Ldar r0
//!   JumpIfTrue @loop
//!   Return
//! .end
//! ```
//!
//! Functions may reference earlier functions through `.const fn NAME`.

use std::fmt::Write as _;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::TargetConfig;
use crate::error::{InterpreterError, Result};
use crate::interpreter::{OperandDecoder, Register};
use crate::runtime::{RuntimeFunctionId, RuntimeFunctionTable};
use crate::value::{FunctionValue, Value};

use super::{Bytecode, BytecodeArray, BytecodeBuilder, OperandType};

pub const ENTRY_FUNCTION: &str = "main";

/// Functions assembled from one source, in definition order.
#[derive(Debug, Default)]
pub struct Program {
    functions: Vec<Arc<FunctionValue>>,
}

impl Program {
    pub fn functions(&self) -> &[Arc<FunctionValue>] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&Arc<FunctionValue>> {
        self.functions.iter().find(|f| f.name() == name)
    }

    pub fn entry(&self) -> Option<&Arc<FunctionValue>> {
        self.function(ENTRY_FUNCTION)
    }
}

struct PendingInstr<'src> {
    line: usize,
    bytecode: Bytecode,
    operands: Vec<&'src str>,
}

struct PendingFunction<'src> {
    name: String,
    params: u32,
    registers: u32,
    constants: Vec<Value>,
    instrs: Vec<PendingInstr<'src>>,
    labels: FxHashMap<&'src str, usize>,
    offset: usize,
}

fn asm_error(line: usize, message: impl Into<String>) -> InterpreterError {
    InterpreterError::Assembly {
        line,
        message: message.into(),
    }
}

pub fn assemble(source: &str, target: TargetConfig) -> Result<Program> {
    let mut program = Program::default();
    let mut current: Option<PendingFunction<'_>> = None;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(".function") {
            if current.is_some() {
                return Err(asm_error(line_no, "nested .function; missing .end"));
            }
            let func = parse_function_header(rest, line_no)?;
            if program.function(&func.name).is_some() {
                return Err(asm_error(line_no, format!("function `{}` defined twice", func.name)));
            }
            current = Some(func);
            continue;
        }

        let Some(func) = current.as_mut() else {
            return Err(asm_error(line_no, "instruction outside of .function"));
        };

        if line == ".end" {
            if let Some(done) = current.take() {
                let function = finish_function(done, target)?;
                program.functions.push(Arc::new(function));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix(".const") {
            let value = parse_constant(rest.trim(), line_no, &program)?;
            func.constants.push(value);
            continue;
        }

        if let Some(label) = line.strip_suffix(':') {
            let label = label.trim();
            if func.labels.insert(label, func.offset).is_some() {
                return Err(asm_error(line_no, format!("duplicate label `{}`", label)));
            }
            continue;
        }

        let mut parts = line.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
        let mnemonic = parts.next().unwrap_or_default();
        let bytecode =
            Bytecode::from_name(mnemonic).ok_or_else(|| asm_error(line_no, format!("unknown bytecode `{}`", mnemonic)))?;
        let operands: Vec<&str> = parts.collect();
        if operands.len() != bytecode.number_of_operands() {
            return Err(asm_error(
                line_no,
                format!(
                    "{} takes {} operands, found {}",
                    bytecode.name(),
                    bytecode.number_of_operands(),
                    operands.len()
                ),
            ));
        }
        func.offset += bytecode.size();
        func.instrs.push(PendingInstr {
            line: line_no,
            bytecode,
            operands,
        });
    }

    if let Some(func) = current {
        return Err(asm_error(
            source.lines().count(),
            format!("function `{}` is missing .end", func.name),
        ));
    }
    Ok(program)
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn parse_function_header<'src>(rest: &str, line: usize) -> Result<PendingFunction<'src>> {
    let mut parts = rest.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| asm_error(line, ".function needs a name"))?
        .to_string();
    let mut params = 0;
    let mut registers = 0;
    for part in parts {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| asm_error(line, format!("expected key=value, found `{}`", part)))?;
        let value: u32 = value
            .parse()
            .map_err(|_| asm_error(line, format!("invalid number `{}`", value)))?;
        match key {
            "params" => params = value,
            "registers" => registers = value,
            other => return Err(asm_error(line, format!("unknown function attribute `{}`", other))),
        }
    }
    Ok(PendingFunction {
        name,
        params,
        registers,
        constants: Vec::new(),
        instrs: Vec::new(),
        labels: FxHashMap::default(),
        offset: 0,
    })
}

fn parse_constant(rest: &str, line: usize, program: &Program) -> Result<Value> {
    let (kind, payload) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let payload = payload.trim();
    match kind {
        "smi" => payload
            .parse::<i32>()
            .map(Value::Smi)
            .map_err(|_| asm_error(line, format!("invalid smi `{}`", payload))),
        "str" => {
            let inner = payload
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(|| asm_error(line, "string constants must be quoted"))?;
            Ok(Value::str(inner))
        }
        "fn" => program
            .function(payload)
            .map(|f| Value::Function(Arc::clone(f)))
            .ok_or_else(|| asm_error(line, format!("unknown function `{}` (define it first)", payload))),
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "undefined" => Ok(Value::Undefined),
        other => Err(asm_error(line, format!("unknown constant kind `{}`", other))),
    }
}

fn finish_function(func: PendingFunction<'_>, target: TargetConfig) -> Result<FunctionValue> {
    let mut builder = BytecodeBuilder::new(func.name.as_str(), target)
        .registers(func.registers)
        .parameters(func.params);
    for value in func.constants {
        builder.add_constant(value);
    }
    for instr in &func.instrs {
        let offset = builder.current_offset();
        let mut operands = Vec::with_capacity(instr.operands.len());
        for (index, text) in instr.operands.iter().enumerate() {
            let ty = instr.bytecode.operand_type(index);
            operands.push(parse_operand(text, ty, offset, &func.labels, instr.line)?);
        }
        check_runtime_call(instr.bytecode, &instr.operands, &operands, instr.line)?;
        builder
            .emit(instr.bytecode, &operands)
            .map_err(|err| asm_error(instr.line, err.to_string()))?;
    }
    Ok(FunctionValue::new(Arc::new(builder.build())))
}

/// A named runtime call must match the callee's argument count and the
/// result size implied by the bytecode.
fn check_runtime_call(bytecode: Bytecode, texts: &[&str], operands: &[i32], line: usize) -> Result<()> {
    let result_size = match bytecode {
        Bytecode::CallRuntime => 1,
        Bytecode::CallRuntimeForPair => 2,
        _ => return Ok(()),
    };
    let Some(function) = texts
        .first()
        .and_then(|text| text.strip_prefix('#'))
        .and_then(RuntimeFunctionTable::builtin_function)
    else {
        return Ok(());
    };
    if function.result_size != result_size {
        return Err(asm_error(
            line,
            format!(
                "{} returns {} words, {} expects {}",
                function.name,
                function.result_size,
                bytecode.name(),
                result_size
            ),
        ));
    }
    let count = operands.get(2).copied().unwrap_or_default();
    if function.nargs >= 0 && i32::from(function.nargs) != count {
        return Err(asm_error(
            line,
            format!("{} expects {} arguments, got {}", function.name, function.nargs, count),
        ));
    }
    Ok(())
}

fn parse_operand(
    text: &str,
    ty: OperandType,
    instr_offset: usize,
    labels: &FxHashMap<&str, usize>,
    line: usize,
) -> Result<i32> {
    let number = |s: &str| -> Result<i32> {
        s.parse::<i32>()
            .map_err(|_| asm_error(line, format!("invalid operand `{}`", text)))
    };
    match ty {
        OperandType::Reg8 | OperandType::Reg16 => match text {
            "<context>" => Ok(Register::current_context().operand()),
            "<closure>" => Ok(Register::function_closure().operand()),
            "<new.target>" => Ok(Register::new_target().operand()),
            _ => {
                let index = text
                    .strip_prefix('r')
                    .ok_or_else(|| asm_error(line, format!("expected register, found `{}`", text)))?;
                let index = number(index)?;
                if index < 0 {
                    return Err(asm_error(line, format!("negative register `{}`", text)));
                }
                Ok(Register::new(index as u32).operand())
            }
        },
        OperandType::Idx8 | OperandType::Idx16 => {
            if let Some(name) = text.strip_prefix('#') {
                return RuntimeFunctionTable::builtin_id(name)
                    .map(|id| i32::from(id.0))
                    .ok_or_else(|| asm_error(line, format!("unknown runtime function `{}`", name)));
            }
            let inner = text
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .ok_or_else(|| asm_error(line, format!("expected [index], found `{}`", text)))?;
            number(inner)
        }
        OperandType::Imm8 => {
            if let Some(label) = text.strip_prefix('@') {
                let target = labels
                    .get(label)
                    .ok_or_else(|| asm_error(line, format!("unknown label `{}`", label)))?;
                return Ok(*target as i32 - instr_offset as i32);
            }
            number(text)
        }
        OperandType::RegCount8 | OperandType::RegCount16 => number(text),
    }
}

/// One line per instruction: offset, mnemonic, decoded operands.
pub fn disassemble(array: &BytecodeArray, target: TargetConfig) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "; function {} (params={}, registers={}, constants={})",
        array.name(),
        array.parameter_count(),
        array.register_count(),
        array.constant_pool().len()
    );
    let mut offset = 0;
    while offset < array.len() {
        let bytecode = Bytecode::from_byte(array.load_u8(offset)?);
        let decoder = OperandDecoder::new(array, offset, bytecode, target);
        let mut operands = Vec::with_capacity(bytecode.number_of_operands());
        for index in 0..bytecode.number_of_operands() {
            let ty = bytecode.operand_type(index);
            let text = match ty {
                OperandType::Reg8 | OperandType::Reg16 => decoder.decode_register(index)?.to_string(),
                OperandType::Idx8 | OperandType::Idx16 => {
                    let idx = decoder.decode_index(index)?;
                    if index == 0 && matches!(bytecode, Bytecode::CallRuntime | Bytecode::CallRuntimeForPair) {
                        runtime_function_name(idx)
                    } else {
                        format!("[{}]", idx)
                    }
                }
                OperandType::Imm8 => {
                    let imm = decoder.decode_immediate(index)?;
                    if bytecode.is_jump() {
                        format!("{} (-> {})", imm, offset as isize + imm)
                    } else {
                        imm.to_string()
                    }
                }
                OperandType::RegCount8 | OperandType::RegCount16 => decoder.decode_count(index)?.to_string(),
            };
            operands.push(text);
        }
        let _ = writeln!(out, "{:>5}: {:<20} {}", offset, bytecode.name(), operands.join(", "));
        offset += bytecode.size();
    }
    Ok(out)
}

fn runtime_function_name(index: usize) -> String {
    let builtins = RuntimeFunctionTable::builtin();
    match builtins.get(RuntimeFunctionId(index as u16)) {
        Ok(function) => format!("#{}", function.name),
        Err(_) => format!("[{}]", index),
    }
}
