//! Handlers for the bundled instruction set. They only use the primitives on
//! [`HandlerAssembler`]; the dispatch core knows nothing about what they compute.

use std::sync::Arc;

use crate::bytecode::Bytecode;
use crate::error::{AbortReason, InterpreterError, Result};
use crate::runtime::RuntimeFunctionId;
use crate::value::Value;

use super::assembler::HandlerAssembler;
use super::dispatch::{Continuation, DispatchTable};

pub(super) fn install(table: &mut DispatchTable) {
    table.set(Bytecode::LdaZero, lda_zero);
    table.set(Bytecode::LdaSmi8, lda_smi8);
    table.set(Bytecode::LdaUndefined, lda_undefined);
    table.set(Bytecode::LdaTrue, lda_true);
    table.set(Bytecode::LdaFalse, lda_false);
    table.set(Bytecode::LdaConstant, lda_constant);
    table.set(Bytecode::LdaConstantWide, lda_constant);
    table.set(Bytecode::Ldar, ldar);
    table.set(Bytecode::Star, star);
    table.set(Bytecode::Mov, mov);
    table.set(Bytecode::MovWide, mov);
    table.set(Bytecode::Add, add);
    table.set(Bytecode::Sub, sub);
    table.set(Bytecode::TestEqual, test_equal);
    table.set(Bytecode::TestLessThan, test_less_than);
    table.set(Bytecode::Jump, jump);
    table.set(Bytecode::JumpConstant, jump_constant);
    table.set(Bytecode::JumpIfTrue, jump_if_true);
    table.set(Bytecode::JumpIfFalse, jump_if_false);
    table.set(Bytecode::JumpIfUndefined, jump_if_undefined);
    table.set(Bytecode::JumpIfNotUndefined, jump_if_not_undefined);
    table.set(Bytecode::PushContext, push_context);
    table.set(Bytecode::PopContext, pop_context);
    table.set(Bytecode::Call, call);
    table.set(Bytecode::New, new);
    table.set(Bytecode::CallRuntime, call_runtime);
    table.set(Bytecode::CallRuntimeForPair, call_runtime_for_pair);
    table.set(Bytecode::StackCheck, stack_check);
    table.set(Bytecode::Debugger, debugger);
    table.set(Bytecode::Return, return_);
    table.set(Bytecode::Illegal, illegal);
}

fn lda_zero(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    asm.set_accumulator(Value::Smi(0));
    asm.dispatch()
}

fn lda_smi8(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let imm = asm.operand_immediate(0)?;
    asm.set_accumulator(Value::Smi(imm as i32));
    asm.dispatch()
}

fn lda_undefined(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    asm.set_accumulator(Value::Undefined);
    asm.dispatch()
}

fn lda_true(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    asm.set_accumulator(Value::Bool(true));
    asm.dispatch()
}

fn lda_false(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    asm.set_accumulator(Value::Bool(false));
    asm.dispatch()
}

// Shared by the byte and short forms; the decoder picks the width.
fn lda_constant(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let index = asm.operand_index(0)?;
    let value = asm.load_constant_pool_entry(index)?;
    asm.set_accumulator(value);
    asm.dispatch()
}

fn ldar(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let reg = asm.operand_register(0)?;
    let value = asm.load_register(reg)?;
    asm.set_accumulator(value);
    asm.dispatch()
}

fn star(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let reg = asm.operand_register(0)?;
    let value = asm.accumulator().clone();
    asm.store_register(value, reg)?;
    asm.dispatch()
}

fn mov(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let src = asm.operand_register(0)?;
    let dst = asm.operand_register(1)?;
    let value = asm.load_register(src)?;
    asm.store_register(value, dst)?;
    asm.dispatch()
}

fn smi_operands(asm: &HandlerAssembler<'_>, op: &str) -> Result<(i32, i32)> {
    let reg = asm.operand_register(0)?;
    let lhs = asm.load_register(reg)?;
    match (lhs.as_smi(), asm.accumulator().as_smi()) {
        (Some(lhs), Some(rhs)) => Ok((lhs, rhs)),
        _ => Err(InterpreterError::runtime(format!(
            "cannot apply {} to {} and {}",
            op,
            lhs.type_name(),
            asm.accumulator().type_name()
        ))),
    }
}

fn add(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let reg = asm.operand_register(0)?;
    let lhs = asm.load_register(reg)?;
    let result = match (&lhs, asm.accumulator()) {
        (Value::Smi(a), Value::Smi(b)) => a
            .checked_add(*b)
            .map(Value::Smi)
            .ok_or_else(|| InterpreterError::runtime("smi overflow in Add"))?,
        (Value::Str(_), rhs) | (_, rhs @ Value::Str(_)) => Value::str(format!("{}{}", lhs, rhs)),
        (_, rhs) => {
            return Err(InterpreterError::runtime(format!(
                "cannot apply Add to {} and {}",
                lhs.type_name(),
                rhs.type_name()
            )));
        }
    };
    asm.set_accumulator(result);
    asm.dispatch()
}

fn sub(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let (lhs, rhs) = smi_operands(&asm, "Sub")?;
    let result = lhs
        .checked_sub(rhs)
        .ok_or_else(|| InterpreterError::runtime("smi overflow in Sub"))?;
    asm.set_accumulator(Value::Smi(result));
    asm.dispatch()
}

fn test_equal(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let reg = asm.operand_register(0)?;
    let lhs = asm.load_register(reg)?;
    let equal = &lhs == asm.accumulator();
    asm.set_accumulator(Value::Bool(equal));
    asm.dispatch()
}

fn test_less_than(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let (lhs, rhs) = smi_operands(&asm, "TestLessThan")?;
    asm.set_accumulator(Value::Bool(lhs < rhs));
    asm.dispatch()
}

fn jump(asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let delta = asm.operand_immediate(0)?;
    asm.jump(delta)
}

fn jump_constant(asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let index = asm.operand_index(0)?;
    let delta = match asm.load_constant_pool_entry(index)? {
        Value::Smi(delta) => delta as isize,
        other => {
            return Err(InterpreterError::runtime(format!(
                "jump constant must be a smi, got {}",
                other.type_name()
            )));
        }
    };
    asm.jump(delta)
}

fn jump_if_true(asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let delta = asm.operand_immediate(0)?;
    let acc = asm.accumulator().clone();
    asm.jump_if_equal(&acc, &Value::Bool(true), delta)
}

fn jump_if_false(asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let delta = asm.operand_immediate(0)?;
    let acc = asm.accumulator().clone();
    asm.jump_if_equal(&acc, &Value::Bool(false), delta)
}

fn jump_if_undefined(asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let delta = asm.operand_immediate(0)?;
    let acc = asm.accumulator().clone();
    asm.jump_if_equal(&acc, &Value::Undefined, delta)
}

fn jump_if_not_undefined(asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let delta = asm.operand_immediate(0)?;
    let acc = asm.accumulator().clone();
    asm.jump_if_not_equal(&acc, &Value::Undefined, delta)
}

fn push_context(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let reg = asm.operand_register(0)?;
    let current = asm.context().clone();
    asm.store_register(current, reg)?;
    let next = asm.accumulator().clone();
    asm.set_context(next)?;
    asm.dispatch()
}

fn pop_context(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let reg = asm.operand_register(0)?;
    let saved = asm.load_register(reg)?;
    asm.set_context(saved)?;
    asm.dispatch()
}

fn call(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let callee = asm.operand_register(0)?;
    let first_arg = asm.operand_register(1)?;
    let arg_count = asm.operand_count(2)?;
    let function = asm.load_register(callee)?;
    let context = asm.context().clone();
    let result = asm.call_js(function, context, first_arg, arg_count)?;
    asm.set_accumulator(result);
    asm.dispatch()
}

fn new(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let ctor_reg = asm.operand_register(0)?;
    let first_arg = asm.operand_register(1)?;
    let arg_count = asm.operand_count(2)?;
    let constructor = asm.load_register(ctor_reg)?;
    let context = asm.context().clone();
    let new_target = constructor.clone();
    let result = asm.call_construct(constructor, context, new_target, first_arg, arg_count)?;
    asm.set_accumulator(result);
    asm.dispatch()
}

fn call_runtime(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let function_id = runtime_function_operand(&asm)?;
    let first_arg = asm.operand_register(1)?;
    let arg_count = asm.operand_count(2)?;
    let context = asm.context().clone();
    let result = asm.call_runtime_n(function_id, context, first_arg, arg_count, 1)?;
    asm.set_accumulator(result.into_single());
    asm.dispatch()
}

fn call_runtime_for_pair(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let function_id = runtime_function_operand(&asm)?;
    let first_arg = asm.operand_register(1)?;
    let arg_count = asm.operand_count(2)?;
    let first_return = asm.operand_register(3)?;
    let context = asm.context().clone();
    let (first, second) = asm
        .call_runtime_n(function_id, context, first_arg, arg_count, 2)?
        .into_pair();
    let second_return = asm.next_register(first_return);
    asm.store_register(first, first_return)?;
    asm.store_register(second, second_return)?;
    asm.dispatch()
}

fn runtime_function_operand(asm: &HandlerAssembler<'_>) -> Result<RuntimeFunctionId> {
    let index = asm.operand_index(0)?;
    // Idx16 operands never exceed u16.
    Ok(RuntimeFunctionId(index as u16))
}

fn stack_check(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    asm.stack_check()?;
    asm.dispatch()
}

fn debugger(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let context = asm.context().clone();
    asm.call_runtime(RuntimeFunctionId::HANDLE_DEBUGGER_STATEMENT, context, Vec::new())?;
    asm.dispatch()
}

fn return_(asm: HandlerAssembler<'_>) -> Result<Continuation> {
    asm.interpreter_return()
}

pub(super) fn illegal(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    Err(asm.abort(AbortReason::InvalidBytecode))
}

/// Entry of every slot in the debug-break table: records a step, then runs the
/// standard handler for the same bytecode. The debug table keeps being
/// threaded, so every following instruction is recorded too.
pub(super) fn debug_break(mut asm: HandlerAssembler<'_>) -> Result<Continuation> {
    let bytecode = asm.bytecode();
    let offset = asm.bytecode_offset();
    let function = Arc::clone(asm.bytecode_array().name_arc());
    let handler = asm.runtime().standard_dispatch_table().handler(bytecode.to_byte());
    asm.runtime_mut()
        .debugger_mut()
        .record_step(function, offset, bytecode);
    handler(asm)
}
