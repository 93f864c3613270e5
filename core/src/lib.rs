//! brisk: the dispatch core of a register bytecode interpreter.
//!
//! Handlers decode their operands with [`interpreter::OperandDecoder`], address
//! the register frame through [`interpreter::HandlerAssembler`], optionally call
//! out through the call protocol, and finish by dispatching to the next
//! instruction. The dispatch loop in [`interpreter::Interpreter`] is a
//! trampoline, so native stack use stays constant regardless of program length.

pub mod bytecode;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod runtime;
pub mod value;

pub use bytecode::{Bytecode, BytecodeArray, BytecodeBuilder, ConstantPool, OperandSize, OperandType};
pub use config::{Endianness, InterpreterFlags, TargetConfig};
pub use error::{AbortReason, InterpreterError, Result};
pub use interpreter::{DispatchTable, HandlerAssembler, Interpreter, Register, RegisterFrame};
pub use runtime::{Runtime, RuntimeFunctionId};
pub use value::{Context, FunctionValue, ObjectValue, Value};

#[cfg(test)]
mod test_util;
