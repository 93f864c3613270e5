//! Interpreter configuration: diagnostic flags and target properties.
//!
//! Flags are read-only once a [`crate::Runtime`] is built. They come from
//! defaults, an optional TOML document, and `BRISK_*` environment variables,
//! applied in that order.

use serde::{Deserialize, Serialize};

use crate::error::{InterpreterError, Result};

pub const ENV_TRACE_IGNITION: &str = "BRISK_TRACE_IGNITION";
pub const ENV_DEBUG_CODE: &str = "BRISK_DEBUG_CODE";

/// Default machine stack size, in words.
pub const DEFAULT_STACK_SIZE: usize = 1 << 16;
/// Words kept below the stack limit for the guard routine itself.
pub const DEFAULT_STACK_RESERVE: usize = 256;
/// Nested interpreted calls allowed before the call overflows.
///
/// Every nested call runs its own dispatch loop on the native stack. The
/// default keeps the deepest chain within a 2 MiB thread stack in unoptimised
/// builds.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

/// Properties of the machine the operand decoder targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub endianness: Endianness,
    /// Whether multi-byte operands may be read with a single unaligned load.
    pub unaligned_access: bool,
}

impl TargetConfig {
    pub const fn new(endianness: Endianness, unaligned_access: bool) -> Self {
        Self {
            endianness,
            unaligned_access,
        }
    }

    pub const fn host() -> Self {
        Self {
            endianness: Endianness::native(),
            unaligned_access: cfg!(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::host()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterFlags {
    /// Fire the Entry/Exit trace hooks around every handler.
    pub trace_ignition: bool,
    /// Check native stack balance across every call out of a handler.
    pub debug_code: bool,
    /// Machine stack size in words.
    pub stack_size: usize,
    /// Words below the stack limit reserved for the guard routine.
    pub stack_reserve: usize,
    /// Bound on nested interpreted calls, independent of the machine stack.
    pub max_call_depth: usize,
    pub target: TargetConfig,
}

impl Default for InterpreterFlags {
    fn default() -> Self {
        Self {
            trace_ignition: false,
            debug_code: cfg!(debug_assertions),
            stack_size: DEFAULT_STACK_SIZE,
            stack_reserve: DEFAULT_STACK_RESERVE,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            target: TargetConfig::host(),
        }
    }
}

impl InterpreterFlags {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut flags = Self::default();
        flags.apply_env();
        flags
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let flags: Self = toml::from_str(raw).map_err(|err| InterpreterError::Config(err.to_string()))?;
        flags.validate()?;
        Ok(flags)
    }

    pub fn apply_env(&mut self) {
        if let Some(value) = env_flag(ENV_TRACE_IGNITION) {
            self.trace_ignition = value;
        }
        if let Some(value) = env_flag(ENV_DEBUG_CODE) {
            self.debug_code = value;
        }
    }

    pub fn with_trace_ignition(mut self, enabled: bool) -> Self {
        self.trace_ignition = enabled;
        self
    }

    pub fn with_debug_code(mut self, enabled: bool) -> Self {
        self.debug_code = enabled;
        self
    }

    pub fn with_stack(mut self, size: usize, reserve: usize) -> Self {
        self.stack_size = size;
        self.stack_reserve = reserve;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_target(mut self, target: TargetConfig) -> Self {
        self.target = target;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.stack_reserve >= self.stack_size {
            return Err(InterpreterError::Config(format!(
                "stack_reserve ({}) must be smaller than stack_size ({})",
                self.stack_reserve, self.stack_size
            )));
        }
        if self.max_call_depth == 0 {
            return Err(InterpreterError::Config("max_call_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
}
