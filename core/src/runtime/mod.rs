//! Runtime state shared by every interpreter frame of one execution: flags,
//! the machine stack model, the runtime function table, the tracer and the
//! debugger.

mod functions;
mod stack;
pub(crate) mod stubs;
mod trace;

use std::sync::Arc;

use tracing::{debug, warn};

pub use functions::{NativeCall, NativeEntry, RuntimeFunction, RuntimeFunctionId, RuntimeFunctionTable, RuntimeResult};
pub use stack::MachineStack;
pub use trace::{TraceEvent, TraceKind, Tracer};

use crate::bytecode::Bytecode;
use crate::config::{InterpreterFlags, TargetConfig};
use crate::error::{InterpreterError, Result};
use crate::interpreter::DispatchTable;
use crate::value::Context;

const DISPATCH_TARGET: &str = "brisk::dispatch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugStep {
    pub function: Arc<str>,
    pub offset: usize,
    pub bytecode: Bytecode,
}

/// Single-step debugger state. Steps are recorded by the debug-break table.
#[derive(Debug, Default)]
pub struct Debugger {
    attached: bool,
    steps: Vec<DebugStep>,
}

impl Debugger {
    pub fn attach(&mut self) {
        self.attached = true;
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn record_step(&mut self, function: Arc<str>, offset: usize, bytecode: Bytecode) {
        self.steps.push(DebugStep {
            function,
            offset,
            bytecode,
        });
    }

    pub fn steps(&self) -> &[DebugStep] {
        &self.steps
    }
}

pub struct Runtime {
    flags: InterpreterFlags,
    stack: MachineStack,
    call_depth: usize,
    functions: RuntimeFunctionTable,
    tracer: Tracer,
    debugger: Debugger,
    standard_table: Arc<DispatchTable>,
    debug_break_table: Arc<DispatchTable>,
    active_table: Arc<DispatchTable>,
    global_context: Arc<Context>,
    output: Vec<String>,
}

impl Runtime {
    pub fn new(flags: InterpreterFlags) -> Result<Self> {
        flags.validate()?;
        let stack = MachineStack::new(flags.stack_size, flags.stack_reserve);
        let standard_table = DispatchTable::standard();
        Ok(Self {
            flags,
            stack,
            call_depth: 0,
            functions: RuntimeFunctionTable::builtin(),
            tracer: Tracer::new(),
            debugger: Debugger::default(),
            active_table: Arc::clone(&standard_table),
            standard_table,
            debug_break_table: DispatchTable::debug_break(),
            global_context: Arc::new(Context::root()),
            output: Vec::new(),
        })
    }

    #[inline]
    pub fn flags(&self) -> &InterpreterFlags {
        &self.flags
    }

    #[inline]
    pub fn target(&self) -> TargetConfig {
        self.flags.target
    }

    #[inline]
    pub fn stack(&self) -> &MachineStack {
        &self.stack
    }

    #[inline]
    pub fn stack_mut(&mut self) -> &mut MachineStack {
        &mut self.stack
    }

    /// Interpreted frames currently on the native stack.
    #[inline]
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Reserves `words` of machine stack for a new interpreted frame. Fails
    /// with a stack overflow when the machine stack or the call depth bound
    /// is exhausted.
    pub(crate) fn enter_frame(&mut self, words: usize) -> Result<()> {
        if self.call_depth >= self.flags.max_call_depth {
            warn!(
                target: "brisk::runtime",
                depth = self.call_depth,
                "call depth limit reached"
            );
            return Err(InterpreterError::StackOverflow);
        }
        self.stack.push(words)?;
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_frame(&mut self, words: usize) {
        self.stack.pop(words);
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    #[inline]
    pub fn functions(&self) -> &RuntimeFunctionTable {
        &self.functions
    }

    pub fn register_function(&mut self, function: RuntimeFunction) -> RuntimeFunctionId {
        self.functions.register(function)
    }

    pub fn replace_function(&mut self, id: RuntimeFunctionId, entry: NativeEntry) -> Result<()> {
        self.functions.replace(id, entry)
    }

    #[inline]
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    #[inline]
    pub fn tracer_mut(&mut self) -> &mut Tracer {
        &mut self.tracer
    }

    #[inline]
    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    #[inline]
    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }

    /// Table the debug-break handlers forward to.
    pub fn standard_dispatch_table(&self) -> Arc<DispatchTable> {
        Arc::clone(&self.standard_table)
    }

    pub fn debug_break_dispatch_table(&self) -> Arc<DispatchTable> {
        Arc::clone(&self.debug_break_table)
    }

    /// Table bound by each new frame on entry.
    pub fn active_dispatch_table(&self) -> Arc<DispatchTable> {
        Arc::clone(&self.active_table)
    }

    /// Replaces the table used by frames entered from now on. Frames already
    /// running keep the table they threaded.
    pub fn set_active_dispatch_table(&mut self, table: Arc<DispatchTable>) {
        debug!(
            target: DISPATCH_TARGET,
            from = self.active_table.name(),
            to = table.name(),
            "active dispatch table replaced"
        );
        self.active_table = table;
    }

    #[inline]
    pub fn global_context(&self) -> Arc<Context> {
        Arc::clone(&self.global_context)
    }

    pub fn print(&mut self, line: String) {
        debug!(target: "brisk::runtime", %line, "print");
        self.output.push(line);
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }
}

#[cfg(test)]
mod runtime_test;
