//! The runtime-call ABI: a fixed-stride table of native entry points indexed
//! by function id, plus the built-in entries.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{AbortReason, InterpreterError, Result};
use crate::interpreter::RegisterFrame;
use crate::value::{Context, Value};

use super::Runtime;
use super::trace::TraceKind;

const RUNTIME_TARGET: &str = "brisk::runtime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RuntimeFunctionId(pub u16);

impl RuntimeFunctionId {
    pub const ABORT: Self = Self(0);
    pub const STACK_GUARD: Self = Self(1);
    pub const INTERPRETER_TRACE_BYTECODE_ENTRY: Self = Self(2);
    pub const INTERPRETER_TRACE_BYTECODE_EXIT: Self = Self(3);
    pub const HANDLE_DEBUGGER_STATEMENT: Self = Self(4);
    pub const PRINT: Self = Self(5);
    pub const DIV_MOD: Self = Self(6);
    pub const TO_BOOLEAN: Self = Self(7);
    pub const NEW_CONTEXT: Self = Self(8);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuntimeFunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One or two machine words returned by a native entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeResult {
    Single(Value),
    Pair(Value, Value),
}

impl RuntimeResult {
    #[inline]
    pub fn size(&self) -> usize {
        match self {
            RuntimeResult::Single(_) => 1,
            RuntimeResult::Pair(..) => 2,
        }
    }

    pub fn into_single(self) -> Value {
        match self {
            RuntimeResult::Single(value) | RuntimeResult::Pair(value, _) => value,
        }
    }

    pub fn into_pair(self) -> (Value, Value) {
        match self {
            RuntimeResult::Single(value) => (value, Value::Undefined),
            RuntimeResult::Pair(first, second) => (first, second),
        }
    }
}

/// Arguments handed to a native entry. `frame` is the calling interpreter
/// frame; natives may rewrite its saved slots.
pub struct NativeCall<'a> {
    pub runtime: &'a mut Runtime,
    pub frame: &'a mut RegisterFrame,
    pub context: Value,
    pub args: Vec<Value>,
}

impl NativeCall<'_> {
    #[inline]
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    fn smi_arg(&self, index: usize, function: &str) -> Result<i32> {
        self.arg(index).as_smi().ok_or_else(|| {
            InterpreterError::runtime(format!(
                "{} expects a smi for argument {}, got {}",
                function,
                index,
                self.arg(index).type_name()
            ))
        })
    }
}

pub type NativeEntry = fn(&mut NativeCall<'_>) -> Result<RuntimeResult>;

#[derive(Clone, Copy)]
pub struct RuntimeFunction {
    pub name: &'static str,
    pub entry: NativeEntry,
    /// Expected argument count, or -1 for variadic.
    pub nargs: i8,
    pub result_size: usize,
}

impl fmt::Debug for RuntimeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeFunction")
            .field("name", &self.name)
            .field("nargs", &self.nargs)
            .field("result_size", &self.result_size)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeFunctionTable {
    entries: Vec<RuntimeFunction>,
    by_name: FxHashMap<&'static str, RuntimeFunctionId>,
}

static BUILTINS: Lazy<RuntimeFunctionTable> = Lazy::new(|| {
    let builtins: [RuntimeFunction; 9] = [
        RuntimeFunction {
            name: "Abort",
            entry: runtime_abort,
            nargs: 1,
            result_size: 1,
        },
        RuntimeFunction {
            name: "StackGuard",
            entry: runtime_stack_guard,
            nargs: 0,
            result_size: 1,
        },
        RuntimeFunction {
            name: "InterpreterTraceBytecodeEntry",
            entry: runtime_trace_entry,
            nargs: 3,
            result_size: 1,
        },
        RuntimeFunction {
            name: "InterpreterTraceBytecodeExit",
            entry: runtime_trace_exit,
            nargs: 3,
            result_size: 1,
        },
        RuntimeFunction {
            name: "HandleDebuggerStatement",
            entry: runtime_handle_debugger_statement,
            nargs: 0,
            result_size: 1,
        },
        RuntimeFunction {
            name: "Print",
            entry: runtime_print,
            nargs: -1,
            result_size: 1,
        },
        RuntimeFunction {
            name: "DivMod",
            entry: runtime_div_mod,
            nargs: 2,
            result_size: 2,
        },
        RuntimeFunction {
            name: "ToBoolean",
            entry: runtime_to_boolean,
            nargs: 1,
            result_size: 1,
        },
        RuntimeFunction {
            name: "NewContext",
            entry: runtime_new_context,
            nargs: 0,
            result_size: 1,
        },
    ];
    let mut table = RuntimeFunctionTable {
        entries: Vec::with_capacity(builtins.len()),
        by_name: FxHashMap::with_capacity_and_hasher(builtins.len(), Default::default()),
    };
    for function in builtins {
        table.register(function);
    }
    table
});

impl RuntimeFunctionTable {
    /// Table holding only the built-in entries.
    pub fn builtin() -> Self {
        BUILTINS.clone()
    }

    /// Id of a built-in by name, without building a table.
    pub fn builtin_id(name: &str) -> Option<RuntimeFunctionId> {
        BUILTINS.lookup(name)
    }

    /// Signature of a built-in by name.
    pub fn builtin_function(name: &str) -> Option<&'static RuntimeFunction> {
        let id = BUILTINS.lookup(name)?;
        BUILTINS.get(id).ok()
    }

    pub fn get(&self, id: RuntimeFunctionId) -> Result<&RuntimeFunction> {
        self.entries
            .get(id.index())
            .ok_or(InterpreterError::UnknownRuntimeFunction(id.0))
    }

    pub fn lookup(&self, name: &str) -> Option<RuntimeFunctionId> {
        self.by_name.get(name).copied()
    }

    /// Appends a function and returns its id. A later registration under an
    /// existing name shadows the earlier one for name lookups.
    pub fn register(&mut self, function: RuntimeFunction) -> RuntimeFunctionId {
        let id = RuntimeFunctionId(self.entries.len() as u16);
        self.by_name.insert(function.name, id);
        self.entries.push(function);
        id
    }

    /// Swaps the native entry of an existing function.
    pub fn replace(&mut self, id: RuntimeFunctionId, entry: NativeEntry) -> Result<()> {
        let slot = self
            .entries
            .get_mut(id.index())
            .ok_or(InterpreterError::UnknownRuntimeFunction(id.0))?;
        slot.entry = entry;
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuntimeFunctionId, &RuntimeFunction)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, f)| (RuntimeFunctionId(idx as u16), f))
    }
}

fn runtime_abort(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    let reason = call
        .arg(0)
        .as_smi()
        .and_then(|code| u8::try_from(code).ok())
        .and_then(AbortReason::from_code)
        .unwrap_or(AbortReason::Unreachable);
    error!(
        target: RUNTIME_TARGET,
        reason = %reason,
        code = reason.code(),
        offset = ?call.frame.saved_bytecode_offset(),
        "interpreter abort"
    );
    Err(InterpreterError::aborted(reason))
}

fn runtime_stack_guard(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    let stack = call.runtime.stack_mut();
    if stack.is_exhausted() {
        warn!(
            target: RUNTIME_TARGET,
            sp = stack.sp(),
            limit = stack.real_limit(),
            "stack overflow"
        );
        return Err(InterpreterError::StackOverflow);
    }
    if stack.handle_interrupt() {
        debug!(
            target: RUNTIME_TARGET,
            handled = stack.interrupts_handled(),
            "serviced interrupt"
        );
    }
    Ok(RuntimeResult::Single(Value::Undefined))
}

fn trace_common(call: &mut NativeCall<'_>, kind: TraceKind) -> Result<RuntimeResult> {
    let Value::Bytecode(array) = call.arg(0) else {
        return Err(InterpreterError::runtime("trace hook expects a bytecode array"));
    };
    let offset = call.smi_arg(1, "trace hook")?;
    let accumulator = call.arg(2);
    call.runtime
        .tracer_mut()
        .record(kind, &array, offset as usize, &accumulator);
    Ok(RuntimeResult::Single(Value::Undefined))
}

fn runtime_trace_entry(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    trace_common(call, TraceKind::Entry)
}

fn runtime_trace_exit(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    trace_common(call, TraceKind::Exit)
}

fn runtime_handle_debugger_statement(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    call.runtime.debugger_mut().attach();
    let table = call.runtime.debug_break_dispatch_table();
    debug!(
        target: RUNTIME_TARGET,
        table = table.name(),
        offset = ?call.frame.saved_bytecode_offset(),
        "debugger statement"
    );
    call.frame.save_dispatch_table(table);
    Ok(RuntimeResult::Single(Value::Undefined))
}

fn runtime_print(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    let line = call
        .args
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    call.runtime.print(line);
    Ok(RuntimeResult::Single(Value::Undefined))
}

fn runtime_div_mod(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    let lhs = call.smi_arg(0, "DivMod")?;
    let rhs = call.smi_arg(1, "DivMod")?;
    if rhs == 0 {
        return Err(InterpreterError::runtime("DivMod by zero"));
    }
    let quotient = lhs
        .checked_div(rhs)
        .ok_or_else(|| InterpreterError::runtime("DivMod overflow"))?;
    Ok(RuntimeResult::Pair(Value::Smi(quotient), Value::Smi(lhs % rhs)))
}

fn runtime_to_boolean(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    Ok(RuntimeResult::Single(Value::Bool(call.arg(0).to_boolean())))
}

fn runtime_new_context(call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    let context = match &call.context {
        Value::Context(parent) => Context::with_parent(Arc::clone(parent)),
        _ => Context::root(),
    };
    Ok(RuntimeResult::Single(Value::Context(Arc::new(context))))
}
