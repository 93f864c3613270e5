//! Per-handler view of the interpreter state.
//!
//! A [`HandlerAssembler`] is built by the dispatch loop for every executed
//! instruction. It owns the threaded values (accumulator, context, offset,
//! bytecode array, dispatch table), borrows the register frame and runtime,
//! and is consumed by the transfer that ends the handler.

use std::sync::Arc;

use tracing::debug;

use crate::bytecode::{Bytecode, BytecodeArray};
use crate::error::{AbortReason, InterpreterError, Result};
use crate::runtime::stubs;
use crate::runtime::{Runtime, RuntimeFunctionId, RuntimeResult};
use crate::value::Value;

use super::decoder::OperandDecoder;
use super::dispatch::{Continuation, DispatchArgs, DispatchTable};
use super::frame::{Register, RegisterFrame};

const DISPATCH_TARGET: &str = "brisk::dispatch";

pub struct HandlerAssembler<'a> {
    bytecode: Bytecode,
    runtime: &'a mut Runtime,
    frame: &'a mut RegisterFrame,
    accumulator: Value,
    context: Value,
    bytecode_offset: usize,
    bytecode_array: Arc<BytecodeArray>,
    dispatch_table: Arc<DispatchTable>,
    disable_stack_check_across_call: bool,
    stack_pointer_before_call: Option<usize>,
}

impl<'a> HandlerAssembler<'a> {
    /// Binds the threaded values for one handler invocation and fires the
    /// entry trace when enabled.
    pub fn enter(
        bytecode: Bytecode,
        args: DispatchArgs,
        frame: &'a mut RegisterFrame,
        runtime: &'a mut Runtime,
    ) -> Result<Self> {
        let DispatchArgs {
            accumulator,
            bytecode_offset,
            bytecode_array,
            dispatch_table,
            context,
        } = args;
        let mut asm = Self {
            bytecode,
            runtime,
            frame,
            accumulator,
            context,
            bytecode_offset,
            bytecode_array,
            dispatch_table,
            disable_stack_check_across_call: false,
            stack_pointer_before_call: None,
        };
        if asm.runtime.flags().trace_ignition {
            asm.trace_bytecode(RuntimeFunctionId::INTERPRETER_TRACE_BYTECODE_ENTRY)?;
        }
        Ok(asm)
    }

    #[inline]
    pub fn bytecode(&self) -> Bytecode {
        self.bytecode
    }

    #[inline]
    pub fn accumulator(&self) -> &Value {
        &self.accumulator
    }

    #[inline]
    pub fn set_accumulator(&mut self, value: Value) {
        self.accumulator = value;
    }

    #[inline]
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Binds a new context and persists it in the frame's context register so
    /// it can be recovered after a call.
    pub fn set_context(&mut self, value: Value) -> Result<()> {
        self.store_register(value.clone(), Register::current_context())?;
        self.context = value;
        Ok(())
    }

    #[inline]
    pub fn bytecode_offset(&self) -> usize {
        self.bytecode_offset
    }

    #[inline]
    pub fn bytecode_array(&self) -> &Arc<BytecodeArray> {
        &self.bytecode_array
    }

    #[inline]
    pub fn dispatch_table(&self) -> &Arc<DispatchTable> {
        &self.dispatch_table
    }

    #[inline]
    pub fn frame(&self) -> &RegisterFrame {
        &*self.frame
    }

    #[inline]
    pub fn runtime(&self) -> &Runtime {
        &*self.runtime
    }

    #[inline]
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut *self.runtime
    }

    // Register file

    #[inline]
    pub fn register_location(&self, reg: Register) -> Result<usize> {
        self.frame.location_of(reg)
    }

    #[inline]
    pub fn load_register(&self, reg: Register) -> Result<Value> {
        self.frame.load(reg)
    }

    #[inline]
    pub fn store_register(&mut self, value: Value, reg: Register) -> Result<()> {
        self.frame.store(reg, value)
    }

    #[inline]
    pub fn next_register(&self, reg: Register) -> Register {
        reg.next()
    }

    // Operands

    pub fn operand_decoder(&self) -> OperandDecoder<'_> {
        OperandDecoder::new(
            &self.bytecode_array,
            self.bytecode_offset,
            self.bytecode,
            self.runtime.target(),
        )
    }

    #[inline]
    pub fn operand_register(&self, index: usize) -> Result<Register> {
        self.operand_decoder().decode_register(index)
    }

    #[inline]
    pub fn operand_index(&self, index: usize) -> Result<usize> {
        self.operand_decoder().decode_index(index)
    }

    #[inline]
    pub fn operand_immediate(&self, index: usize) -> Result<isize> {
        self.operand_decoder().decode_immediate(index)
    }

    #[inline]
    pub fn operand_count(&self, index: usize) -> Result<u32> {
        self.operand_decoder().decode_count(index)
    }

    pub fn load_constant_pool_entry(&self, index: usize) -> Result<Value> {
        self.bytecode_array.constant_pool().get(index).cloned()
    }

    // Control transfer

    /// Offset `delta` bytes from the current instruction.
    pub fn advance(&self, delta: isize) -> Result<usize> {
        let target = self.bytecode_offset as isize + delta;
        if target < 0 || target as usize >= self.bytecode_array.len() {
            return Err(InterpreterError::BytecodeOutOfRange {
                offset: target,
                len: self.bytecode_array.len(),
            });
        }
        Ok(target as usize)
    }

    /// Falls through to the next instruction.
    pub fn dispatch(self) -> Result<Continuation> {
        let target = self.advance(self.bytecode.size() as isize)?;
        self.dispatch_to(target)
    }

    /// Loads the opcode at `new_offset`, looks up its handler in the threaded
    /// table and hands control to it through the dispatch loop.
    pub fn dispatch_to(mut self, new_offset: usize) -> Result<Continuation> {
        if self.runtime.flags().trace_ignition {
            self.trace_bytecode(RuntimeFunctionId::INTERPRETER_TRACE_BYTECODE_EXIT)?;
        }
        let opcode = self.bytecode_array.load_u8(new_offset)?;
        let handler = self.dispatch_table.handler(opcode);
        Ok(Continuation::Dispatch {
            handler,
            bytecode: Bytecode::from_byte(opcode),
            args: DispatchArgs {
                accumulator: self.accumulator,
                bytecode_offset: new_offset,
                bytecode_array: self.bytecode_array,
                dispatch_table: self.dispatch_table,
                context: self.context,
            },
        })
    }

    pub fn jump(self, delta: isize) -> Result<Continuation> {
        let target = self.advance(delta)?;
        self.dispatch_to(target)
    }

    /// Taken arm dispatches to `advance(delta)`, the other falls through.
    pub fn jump_conditional(self, condition: bool, delta: isize) -> Result<Continuation> {
        if condition {
            let target = self.advance(delta)?;
            self.dispatch_to(target)
        } else {
            self.dispatch()
        }
    }

    pub fn jump_if_equal(self, lhs: &Value, rhs: &Value, delta: isize) -> Result<Continuation> {
        let condition = lhs == rhs;
        self.jump_conditional(condition, delta)
    }

    pub fn jump_if_not_equal(self, lhs: &Value, rhs: &Value, delta: isize) -> Result<Continuation> {
        let condition = lhs != rhs;
        self.jump_conditional(condition, delta)
    }

    /// Leaves the frame with the accumulator as the result.
    pub fn interpreter_return(mut self) -> Result<Continuation> {
        if self.runtime.flags().trace_ignition {
            self.trace_bytecode(RuntimeFunctionId::INTERPRETER_TRACE_BYTECODE_EXIT)?;
        }
        Ok(Continuation::Return(self.accumulator))
    }

    // Call protocol

    /// Saves the offset and active table into the frame before leaving the
    /// handler chain. With `debug_code`, also snapshots the stack pointer.
    pub fn call_prologue(&mut self) {
        self.frame.save_bytecode_offset(self.bytecode_offset);
        self.frame.save_dispatch_table(Arc::clone(&self.dispatch_table));
        if self.runtime.flags().debug_code && !self.disable_stack_check_across_call {
            debug_assert!(
                self.stack_pointer_before_call.is_none(),
                "nested call prologue without epilogue"
            );
            self.stack_pointer_before_call = Some(self.runtime.stack().sp());
        }
    }

    /// Checks stack balance (with `debug_code`) and rebinds the dispatch table
    /// from the frame, since the callee may have swapped it.
    pub fn call_epilogue(&mut self) -> Result<()> {
        if self.runtime.flags().debug_code && !self.disable_stack_check_across_call {
            let after = self.runtime.stack().sp();
            if let Some(before) = self.stack_pointer_before_call.take() {
                self.abort_if_not_equal(before, after, AbortReason::UnexpectedStackPointer)?;
            }
        }
        // Only calls can swap the table, so this is the one place it is reloaded.
        if let Some(table) = self.frame.saved_dispatch_table() {
            if !Arc::ptr_eq(table, &self.dispatch_table) {
                debug!(
                    target: DISPATCH_TARGET,
                    from = self.dispatch_table.name(),
                    to = table.name(),
                    offset = self.bytecode_offset,
                    "dispatch table rebound after call"
                );
            }
            self.dispatch_table = Arc::clone(table);
        }
        Ok(())
    }

    pub fn call_js(&mut self, function: Value, context: Value, first_arg: Register, arg_count: u32) -> Result<Value> {
        self.call_prologue();
        let result = stubs::push_args_and_call(self.runtime, self.frame, function, context, first_arg, arg_count)?;
        self.call_epilogue()?;
        Ok(result)
    }

    pub fn call_construct(
        &mut self,
        constructor: Value,
        context: Value,
        new_target: Value,
        first_arg: Register,
        arg_count: u32,
    ) -> Result<Value> {
        self.call_prologue();
        let result = stubs::push_args_and_construct(
            self.runtime,
            self.frame,
            constructor,
            context,
            new_target,
            first_arg,
            arg_count,
        )?;
        self.call_epilogue()?;
        Ok(result)
    }

    /// Calls a runtime function with `arg_count` registers starting at
    /// `first_arg`.
    pub fn call_runtime_n(
        &mut self,
        function_id: RuntimeFunctionId,
        context: Value,
        first_arg: Register,
        arg_count: u32,
        result_size: usize,
    ) -> Result<RuntimeResult> {
        let args = self.frame.arguments(first_arg, arg_count)?;
        self.call_runtime_with(function_id, context, args, result_size)
    }

    /// Single-result runtime call with explicit argument values.
    pub fn call_runtime(&mut self, function_id: RuntimeFunctionId, context: Value, args: Vec<Value>) -> Result<Value> {
        self.call_runtime_with(function_id, context, args, 1)
            .map(RuntimeResult::into_single)
    }

    fn call_runtime_with(
        &mut self,
        function_id: RuntimeFunctionId,
        context: Value,
        args: Vec<Value>,
        result_size: usize,
    ) -> Result<RuntimeResult> {
        self.call_prologue();
        let result = stubs::c_entry(self.runtime, self.frame, function_id, context, args, result_size)?;
        self.call_epilogue()?;
        Ok(result)
    }

    // Safety checks

    /// Calls the guard routine when the stack pointer is at or below the limit.
    pub fn stack_check(&mut self) -> Result<()> {
        let stack = self.runtime.stack();
        if stack.sp() > stack.limit() {
            return Ok(());
        }
        let context = self.context.clone();
        self.call_runtime(RuntimeFunctionId::STACK_GUARD, context, Vec::new())?;
        Ok(())
    }

    /// Invokes the runtime abort. Never returns normally; the returned error
    /// is what handlers propagate.
    pub fn abort(&mut self, reason: AbortReason) -> InterpreterError {
        self.disable_stack_check_across_call = true;
        let context = self.context.clone();
        let result = self.call_runtime(
            RuntimeFunctionId::ABORT,
            context,
            vec![Value::Smi(i32::from(reason.code()))],
        );
        self.disable_stack_check_across_call = false;
        match result {
            Err(err) => err,
            Ok(_) => InterpreterError::aborted(reason),
        }
    }

    pub fn abort_if_not_equal(&mut self, lhs: usize, rhs: usize, reason: AbortReason) -> Result<()> {
        if lhs != rhs {
            return Err(self.abort(reason));
        }
        Ok(())
    }

    fn trace_bytecode(&mut self, function_id: RuntimeFunctionId) -> Result<()> {
        let context = self.context.clone();
        let args = vec![
            Value::Bytecode(Arc::clone(&self.bytecode_array)),
            Value::Smi(self.bytecode_offset as i32),
            self.accumulator.clone(),
        ];
        self.call_runtime(function_id, context, args)?;
        Ok(())
    }
}
