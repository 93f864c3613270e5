//! The dispatch core: operand decoding, register addressing, indexed transfer
//! to the next handler and the call protocol.
//!
//! Handlers never call the next handler themselves. They return a
//! [`Continuation`] and the loop in [`Interpreter`] performs the transfer, so
//! the native stack does not grow with the number of executed instructions.

mod assembler;
mod decoder;
mod dispatch;
mod frame;
mod handlers;

use std::sync::Arc;

use tracing::debug;

pub use assembler::HandlerAssembler;
pub use decoder::{OperandDecoder, combine_bytes, combine_signed};
pub use dispatch::{Continuation, DISPATCH_TABLE_LENGTH, DispatchArgs, DispatchTable, Handler};
pub use frame::{FIXED_FRAME_SLOTS, FIXED_FRAME_WORDS, Register, RegisterFrame, WORD_SIZE, WORD_SIZE_LOG2};

use crate::error::Result;
use crate::runtime::Runtime;
use crate::value::{FunctionValue, Value};

const DISPATCH_TARGET: &str = "brisk::dispatch";

/// Entry points into interpreted code.
pub struct Interpreter;

impl Interpreter {
    /// Calls `function` in the runtime's global context.
    pub fn call(runtime: &mut Runtime, function: &Arc<FunctionValue>, args: &[Value]) -> Result<Value> {
        let context = Value::Context(runtime.global_context());
        Self::invoke(runtime, function, args, Value::Undefined, context)
    }

    pub fn construct(
        runtime: &mut Runtime,
        constructor: &Arc<FunctionValue>,
        args: &[Value],
        new_target: Value,
    ) -> Result<Value> {
        let context = Value::Context(runtime.global_context());
        Self::invoke(runtime, constructor, args, new_target, context)
    }

    /// Builds a frame for `function`, binds the runtime's active dispatch table
    /// and runs the dispatch loop until the function returns.
    ///
    /// Arguments fill `r0..` up to the declared parameter count; missing ones
    /// stay undefined. A function without a captured context runs in
    /// `fallback_context`.
    pub(crate) fn invoke(
        runtime: &mut Runtime,
        function: &Arc<FunctionValue>,
        args: &[Value],
        new_target: Value,
        fallback_context: Value,
    ) -> Result<Value> {
        let bytecode_array = Arc::clone(function.bytecode());
        debug_assert_eq!(
            bytecode_array.endianness(),
            runtime.target().endianness,
            "bytecode encoded for a different byte order"
        );
        let mut frame = RegisterFrame::new(bytecode_array.register_count());
        let params = bytecode_array
            .parameter_count()
            .min(bytecode_array.register_count()) as usize;
        let mut reg = Register::new(0);
        for arg in args.iter().take(params) {
            frame.store(reg, arg.clone())?;
            reg = reg.next();
        }
        let context = match function.context() {
            Some(ctx) => Value::Context(Arc::clone(ctx)),
            None => fallback_context,
        };
        frame.store(Register::current_context(), context.clone())?;
        frame.store(Register::function_closure(), Value::Function(Arc::clone(function)))?;
        frame.store(Register::new_target(), new_target)?;

        let words = frame.frame_words();
        runtime.enter_frame(words)?;
        let dispatch_table = runtime.active_dispatch_table();
        frame.save_dispatch_table(Arc::clone(&dispatch_table));
        debug!(
            target: DISPATCH_TARGET,
            function = bytecode_array.name(),
            table = dispatch_table.name(),
            depth = runtime.stack().depth(),
            "enter frame"
        );
        let args = DispatchArgs {
            accumulator: Value::Undefined,
            bytecode_offset: 0,
            bytecode_array,
            dispatch_table,
            context,
        };
        let result = run_dispatch_loop(runtime, &mut frame, args);
        runtime.leave_frame(words);
        debug!(
            target: DISPATCH_TARGET,
            function = function.name(),
            ok = result.is_ok(),
            "leave frame"
        );
        result
    }
}

/// Trampoline: repeatedly invokes the handler chosen by the previous transfer.
fn run_dispatch_loop(runtime: &mut Runtime, frame: &mut RegisterFrame, args: DispatchArgs) -> Result<Value> {
    let (handler, bytecode) = args.target()?;
    let mut next = Continuation::Dispatch {
        handler,
        bytecode,
        args,
    };
    loop {
        match next {
            Continuation::Dispatch {
                handler,
                bytecode,
                args,
            } => {
                let asm = HandlerAssembler::enter(bytecode, args, &mut *frame, &mut *runtime)?;
                next = handler(asm)?;
            }
            Continuation::Return(value) => return Ok(value),
        }
    }
}
