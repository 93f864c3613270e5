use std::fmt;
use std::sync::Arc;

use crate::error::{InterpreterError, Result};
use crate::value::Value;

use super::dispatch::DispatchTable;

pub const WORD_SIZE: usize = 8;
pub const WORD_SIZE_LOG2: u32 = 3;

/// Reserved register slots above the frame base: context, closure, new target.
pub const FIXED_FRAME_SLOTS: usize = 3;
/// Words a frame occupies on the machine stack beyond its registers: the fixed
/// slots plus the saved bytecode offset and dispatch table.
pub const FIXED_FRAME_WORDS: usize = FIXED_FRAME_SLOTS + 2;

/// A register operand. Locals are numbered away from the frame base, so local
/// `i` is operand `-i` and the next register is always `operand - 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(i32);

impl Register {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(-(index as i32))
    }

    #[inline]
    pub const fn from_operand(operand: i32) -> Self {
        Self(operand)
    }

    #[inline]
    pub const fn operand(self) -> i32 {
        self.0
    }

    /// Local index, or `None` for the reserved slots above the base.
    #[inline]
    pub const fn index(self) -> Option<u32> {
        if self.0 <= 0 { Some(self.0.unsigned_abs()) } else { None }
    }

    #[inline]
    pub const fn current_context() -> Self {
        Self(1)
    }

    #[inline]
    pub const fn function_closure() -> Self {
        Self(2)
    }

    #[inline]
    pub const fn new_target() -> Self {
        Self(3)
    }

    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 - 1)
    }

    /// Byte offset of the slot relative to the frame base.
    #[inline]
    pub const fn frame_offset(self) -> isize {
        (self.0 as isize) << WORD_SIZE_LOG2
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => f.write_str("<context>"),
            2 => f.write_str("<closure>"),
            3 => f.write_str("<new.target>"),
            op if op <= 0 => write!(f, "r{}", op.unsigned_abs()),
            op => write!(f, "<slot+{}>", op),
        }
    }
}

/// Slots that are not addressable as registers.
#[derive(Debug, Default)]
struct FrameHeader {
    bytecode_offset: Value,
    dispatch_table: Option<Arc<DispatchTable>>,
}

/// The virtual registers of one interpreted call.
///
/// Slot `base` holds `r0`; locals extend downwards from it and the reserved
/// registers sit just above it.
#[derive(Debug)]
pub struct RegisterFrame {
    slots: Vec<Value>,
    base: isize,
    header: FrameHeader,
}

impl RegisterFrame {
    pub fn new(register_count: u32) -> Self {
        let slots = vec![Value::Undefined; register_count as usize + FIXED_FRAME_SLOTS];
        Self {
            slots,
            base: register_count as isize - 1,
            header: FrameHeader::default(),
        }
    }

    #[inline]
    pub fn register_count(&self) -> u32 {
        (self.slots.len() - FIXED_FRAME_SLOTS) as u32
    }

    /// Words the frame occupies on the machine stack.
    #[inline]
    pub fn frame_words(&self) -> usize {
        self.slots.len() + (FIXED_FRAME_WORDS - FIXED_FRAME_SLOTS)
    }

    /// Slot index of `reg`: frame base plus the operand.
    #[inline]
    pub fn location_of(&self, reg: Register) -> Result<usize> {
        let slot = self.base + reg.operand() as isize;
        if slot < 0 || slot as usize >= self.slots.len() {
            return Err(InterpreterError::InvalidRegister {
                operand: reg.operand(),
                slots: self.slots.len(),
            });
        }
        Ok(slot as usize)
    }

    #[inline]
    pub fn load(&self, reg: Register) -> Result<Value> {
        let slot = self.location_of(reg)?;
        Ok(self.slots[slot].clone())
    }

    /// Frame slots are not traced heap fields, so this is a plain write.
    #[inline]
    pub fn store(&mut self, reg: Register, value: Value) -> Result<()> {
        let slot = self.location_of(reg)?;
        self.slots[slot] = value;
        Ok(())
    }

    /// Reads `count` consecutive registers starting at `first`.
    pub fn arguments(&self, first: Register, count: u32) -> Result<Vec<Value>> {
        let mut args = Vec::with_capacity(count as usize);
        let mut reg = first;
        for _ in 0..count {
            args.push(self.load(reg)?);
            reg = reg.next();
        }
        Ok(args)
    }

    pub fn save_bytecode_offset(&mut self, offset: usize) {
        self.header.bytecode_offset = Value::Smi(offset as i32);
    }

    pub fn saved_bytecode_offset(&self) -> Option<usize> {
        self.header
            .bytecode_offset
            .as_smi()
            .and_then(|v| usize::try_from(v).ok())
    }

    pub fn save_dispatch_table(&mut self, table: Arc<DispatchTable>) {
        self.header.dispatch_table = Some(table);
    }

    pub fn saved_dispatch_table(&self) -> Option<&Arc<DispatchTable>> {
        self.header.dispatch_table.as_ref()
    }
}
