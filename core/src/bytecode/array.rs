use std::fmt;
use std::sync::Arc;

use crate::config::Endianness;
use crate::error::{InterpreterError, Result};
use crate::value::Value;

/// Immutable constants referenced by index operands.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Value>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(entries: Vec<Value>) -> Self {
        Self { entries }
    }

    pub(crate) fn push(&mut self, value: Value) -> usize {
        self.entries.push(value);
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Result<&Value> {
        self.entries
            .get(index)
            .ok_or(InterpreterError::ConstantIndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }
}

/// Encoded instructions of one function plus its constant pool.
pub struct BytecodeArray {
    name: Arc<str>,
    bytes: Box<[u8]>,
    constant_pool: Arc<ConstantPool>,
    register_count: u32,
    parameter_count: u32,
    endianness: Endianness,
}

impl BytecodeArray {
    pub fn new(
        name: impl Into<Arc<str>>,
        bytes: Vec<u8>,
        constant_pool: ConstantPool,
        register_count: u32,
        parameter_count: u32,
        endianness: Endianness,
    ) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into_boxed_slice(),
            constant_pool: Arc::new(constant_pool),
            register_count,
            parameter_count,
            endianness,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn constant_pool(&self) -> &Arc<ConstantPool> {
        &self.constant_pool
    }

    #[inline]
    pub fn register_count(&self) -> u32 {
        self.register_count
    }

    #[inline]
    pub fn parameter_count(&self) -> u32 {
        self.parameter_count
    }

    /// Byte order multi-byte operands were encoded with.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn out_of_range(&self, offset: usize) -> InterpreterError {
        InterpreterError::BytecodeOutOfRange {
            offset: offset as isize,
            len: self.bytes.len(),
        }
    }

    #[inline]
    pub fn load_u8(&self, offset: usize) -> Result<u8> {
        self.bytes.get(offset).copied().ok_or_else(|| self.out_of_range(offset))
    }

    #[inline]
    pub fn load_i8(&self, offset: usize) -> Result<i8> {
        self.load_u8(offset).map(|b| b as i8)
    }

    /// Single two-byte load in the given byte order.
    #[inline]
    pub fn load_u16(&self, offset: usize, endianness: Endianness) -> Result<u16> {
        let bytes: [u8; 2] = offset
            .checked_add(2)
            .and_then(|end| self.bytes.get(offset..end))
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| self.out_of_range(offset))?;
        Ok(match endianness {
            Endianness::Little => u16::from_le_bytes(bytes),
            Endianness::Big => u16::from_be_bytes(bytes),
        })
    }

    #[inline]
    pub fn load_i16(&self, offset: usize, endianness: Endianness) -> Result<i16> {
        self.load_u16(offset, endianness).map(|v| v as i16)
    }
}

impl fmt::Debug for BytecodeArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytecodeArray")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .field("constants", &self.constant_pool.len())
            .field("register_count", &self.register_count)
            .field("parameter_count", &self.parameter_count)
            .finish()
    }
}
