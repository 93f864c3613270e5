use crate::error::{InterpreterError, Result};

/// Model of the native stack the interpreter runs on.
///
/// The stack grows downwards from `size` towards zero. `limit` is the
/// low-water mark checked by StackGuard; requesting an interrupt raises the
/// effective limit so the next check takes the slow path.
#[derive(Debug, Clone)]
pub struct MachineStack {
    size: usize,
    sp: usize,
    limit: usize,
    real_limit: usize,
    interrupt_requested: bool,
    interrupts_handled: u64,
}

impl MachineStack {
    pub fn new(size: usize, reserve: usize) -> Self {
        Self {
            size,
            sp: size,
            limit: reserve,
            real_limit: reserve,
            interrupt_requested: false,
            interrupts_handled: 0,
        }
    }

    #[inline]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Effective limit, including a pending interrupt.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn real_limit(&self) -> usize {
        self.real_limit
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Words currently in use.
    #[inline]
    pub fn depth(&self) -> usize {
        self.size - self.sp
    }

    pub fn push(&mut self, words: usize) -> Result<()> {
        self.sp = self.sp.checked_sub(words).ok_or(InterpreterError::StackOverflow)?;
        Ok(())
    }

    pub fn pop(&mut self, words: usize) {
        debug_assert!(self.sp + words <= self.size, "machine stack underflow");
        self.sp = (self.sp + words).min(self.size);
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.real_limit = limit;
        if !self.interrupt_requested {
            self.limit = limit;
        }
    }

    pub fn request_interrupt(&mut self) {
        self.interrupt_requested = true;
        self.limit = self.size;
    }

    #[inline]
    pub fn has_pending_interrupt(&self) -> bool {
        self.interrupt_requested
    }

    /// Clears a pending interrupt, restoring the real limit.
    pub fn handle_interrupt(&mut self) -> bool {
        if !self.interrupt_requested {
            return false;
        }
        self.interrupt_requested = false;
        self.limit = self.real_limit;
        self.interrupts_handled += 1;
        true
    }

    #[inline]
    pub fn interrupts_handled(&self) -> u64 {
        self.interrupts_handled
    }

    /// True when the stack pointer is at or below the real limit.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.sp <= self.real_limit
    }
}
