use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::bytecode::{Bytecode, BytecodeArray};
use crate::error::Result;
use crate::value::Value;

use super::assembler::HandlerAssembler;
use super::handlers;

/// One slot per possible opcode byte.
pub const DISPATCH_TABLE_LENGTH: usize = 256;

/// Handler entry point. A handler always ends by producing the next transfer.
pub type Handler = for<'a> fn(HandlerAssembler<'a>) -> Result<Continuation>;

/// The values threaded through every dispatch besides the register frame,
/// which is handed to each handler by mutable borrow.
#[derive(Debug, Clone)]
pub struct DispatchArgs {
    pub accumulator: Value,
    pub bytecode_offset: usize,
    pub bytecode_array: Arc<BytecodeArray>,
    pub dispatch_table: Arc<DispatchTable>,
    pub context: Value,
}

impl DispatchArgs {
    /// Loads the opcode at the current offset and picks its handler.
    pub fn target(&self) -> Result<(Handler, Bytecode)> {
        let opcode = self.bytecode_array.load_u8(self.bytecode_offset)?;
        Ok((self.dispatch_table.handler(opcode), Bytecode::from_byte(opcode)))
    }
}

pub enum Continuation {
    /// Tail transfer to `handler` with the threaded values.
    Dispatch {
        handler: Handler,
        bytecode: Bytecode,
        args: DispatchArgs,
    },
    Return(Value),
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::Dispatch { bytecode, args, .. } => f
                .debug_struct("Dispatch")
                .field("bytecode", bytecode)
                .field("offset", &args.bytecode_offset)
                .field("table", &args.dispatch_table.name())
                .finish(),
            Continuation::Return(value) => f.debug_tuple("Return").field(value).finish(),
        }
    }
}

/// Maps opcode bytes to handler entry points. Every slot holds a valid handler
/// from construction on.
pub struct DispatchTable {
    name: &'static str,
    handlers: [Handler; DISPATCH_TABLE_LENGTH],
}

static STANDARD: Lazy<Arc<DispatchTable>> = Lazy::new(|| Arc::new(DispatchTable::build_standard()));
static DEBUG_BREAK: Lazy<Arc<DispatchTable>> = Lazy::new(|| Arc::new(DispatchTable::build_debug_break()));

impl DispatchTable {
    /// A table whose every slot is `fallback`.
    pub fn new(name: &'static str, fallback: Handler) -> Self {
        Self {
            name,
            handlers: [fallback; DISPATCH_TABLE_LENGTH],
        }
    }

    /// Shared table with the bundled handler for each bytecode.
    pub fn standard() -> Arc<DispatchTable> {
        Arc::clone(&STANDARD)
    }

    /// Shared single-step table: every entry records a debugger step, then
    /// runs the standard handler.
    pub fn debug_break() -> Arc<DispatchTable> {
        Arc::clone(&DEBUG_BREAK)
    }

    fn build_standard() -> Self {
        let mut table = DispatchTable::new("standard", handlers::illegal);
        handlers::install(&mut table);
        table
    }

    fn build_debug_break() -> Self {
        DispatchTable::new("debug-break", handlers::debug_break)
    }

    /// Copy of `self` under a new name, for embedders that patch single slots.
    pub fn derive(&self, name: &'static str) -> Self {
        Self {
            name,
            handlers: self.handlers,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn handler(&self, opcode: u8) -> Handler {
        self.handlers[opcode as usize]
    }

    pub fn set(&mut self, bytecode: Bytecode, handler: Handler) {
        self.handlers[bytecode.to_byte() as usize] = handler;
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable").field("name", &self.name).finish_non_exhaustive()
    }
}
