//! Calling-convention stubs between handlers and their callees. Each stub
//! pushes what it passes on the machine stack and pops it on return, so a
//! well-behaved callee leaves the stack pointer where it found it.

use std::sync::Arc;

use crate::error::{InterpreterError, Result};
use crate::interpreter::{Interpreter, Register, RegisterFrame};
use crate::value::{ObjectValue, Value};

use super::Runtime;
use super::functions::{NativeCall, RuntimeFunctionId, RuntimeResult};

/// Return address slot pushed by every stub.
const RETURN_ADDRESS_WORDS: usize = 1;

/// Generic native entry: resolves `id` through the function table and calls
/// it with an explicit result size.
pub(crate) fn c_entry(
    runtime: &mut Runtime,
    frame: &mut RegisterFrame,
    id: RuntimeFunctionId,
    context: Value,
    args: Vec<Value>,
    result_size: usize,
) -> Result<RuntimeResult> {
    let function = *runtime.functions().get(id)?;
    if function.nargs >= 0 && function.nargs as usize != args.len() {
        return Err(InterpreterError::runtime(format!(
            "runtime function {} expects {} arguments, got {}",
            function.name,
            function.nargs,
            args.len()
        )));
    }
    if function.result_size != result_size {
        return Err(InterpreterError::runtime(format!(
            "runtime function {} returns {} words, caller expects {}",
            function.name, function.result_size, result_size
        )));
    }
    let words = args.len() + RETURN_ADDRESS_WORDS;
    runtime.stack_mut().push(words)?;
    let result = {
        let mut call = NativeCall {
            runtime: &mut *runtime,
            frame: &mut *frame,
            context,
            args,
        };
        (function.entry)(&mut call)
    };
    runtime.stack_mut().pop(words);
    result
}

/// Pushes `arg_count` registers starting at `first_arg` and calls `function`.
pub(crate) fn push_args_and_call(
    runtime: &mut Runtime,
    frame: &RegisterFrame,
    function: Value,
    context: Value,
    first_arg: Register,
    arg_count: u32,
) -> Result<Value> {
    let Value::Function(callee) = function else {
        return Err(InterpreterError::NotCallable(function.to_string()));
    };
    let args = frame.arguments(first_arg, arg_count)?;
    let words = args.len() + RETURN_ADDRESS_WORDS;
    runtime.stack_mut().push(words)?;
    let result = Interpreter::invoke(runtime, &callee, &args, Value::Undefined, context);
    runtime.stack_mut().pop(words);
    result
}

/// Like [`push_args_and_call`] with an explicit new target. A constructor that
/// does not return an object yields a fresh object wrapping its result.
pub(crate) fn push_args_and_construct(
    runtime: &mut Runtime,
    frame: &RegisterFrame,
    constructor: Value,
    context: Value,
    new_target: Value,
    first_arg: Register,
    arg_count: u32,
) -> Result<Value> {
    let Value::Function(callee) = constructor else {
        return Err(InterpreterError::NotCallable(constructor.to_string()));
    };
    let args = frame.arguments(first_arg, arg_count)?;
    // new target travels as an extra pushed word
    let words = args.len() + 1 + RETURN_ADDRESS_WORDS;
    runtime.stack_mut().push(words)?;
    let result = Interpreter::invoke(runtime, &callee, &args, new_target.clone(), context);
    runtime.stack_mut().pop(words);
    let value = result?;
    Ok(match value {
        Value::Object(_) => value,
        other => Value::Object(Arc::new(ObjectValue {
            constructor: callee,
            new_target,
            value: other,
        })),
    })
}
