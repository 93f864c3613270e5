//! Error types shared by the decoder, the dispatch loop and the runtime.
//!
//! Contract violations abort with an [`AbortReason`]; runtime conditions such as
//! stack exhaustion surface as their own variants and propagate unchanged.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InterpreterError>;

/// Reason codes carried by a fatal abort. The numeric codes are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum AbortReason {
    UnexpectedStackPointer = 1,
    InvalidBytecode = 2,
    Unreachable = 3,
}

impl AbortReason {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(AbortReason::UnexpectedStackPointer),
            2 => Some(AbortReason::InvalidBytecode),
            3 => Some(AbortReason::Unreachable),
            _ => None,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            AbortReason::UnexpectedStackPointer => "unexpected stack pointer",
            AbortReason::InvalidBytecode => "invalid bytecode",
            AbortReason::Unreachable => "unreachable code",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpreterError {
    #[error("aborted: {0} (reason code {})", .0.code())]
    Aborted(AbortReason),

    #[error("maximum call stack size exceeded")]
    StackOverflow,

    #[error("register operand {operand} is outside a frame of {slots} slots")]
    InvalidRegister { operand: i32, slots: usize },

    #[error("constant pool index {index} out of range (pool has {len} entries)")]
    ConstantIndexOutOfRange { index: usize, len: usize },

    #[error("bytecode offset {offset} out of range (array has {len} bytes)")]
    BytecodeOutOfRange { offset: isize, len: usize },

    #[error("operand {index} of {bytecode} cannot encode {value}")]
    InvalidOperand {
        bytecode: &'static str,
        index: usize,
        value: i64,
    },

    #[error("{0} is not callable")]
    NotCallable(String),

    #[error("unknown runtime function id {0}")]
    UnknownRuntimeFunction(u16),

    #[error("runtime error: {0}")]
    RuntimeError(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("assembly error on line {line}: {message}")]
    Assembly { line: usize, message: String },
}

impl InterpreterError {
    #[inline]
    pub fn aborted(reason: AbortReason) -> Self {
        InterpreterError::Aborted(reason)
    }

    #[inline]
    pub fn runtime(message: impl Into<String>) -> Self {
        InterpreterError::RuntimeError(message.into())
    }

    /// Reason code when this error is a fatal abort.
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            InterpreterError::Aborted(reason) => Some(*reason),
            _ => None,
        }
    }
}
