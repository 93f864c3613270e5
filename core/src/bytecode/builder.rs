use std::sync::Arc;

use crate::config::{Endianness, TargetConfig};
use crate::error::{InterpreterError, Result};
use crate::value::Value;

use super::array::{BytecodeArray, ConstantPool};
use super::{Bytecode, OperandSize};

/// Encodes instructions into the on-wire layout used by the decoder.
#[derive(Debug)]
pub struct BytecodeBuilder {
    name: Arc<str>,
    bytes: Vec<u8>,
    constants: ConstantPool,
    register_count: u32,
    parameter_count: u32,
    endianness: Endianness,
}

impl BytecodeBuilder {
    pub fn new(name: impl Into<Arc<str>>, target: TargetConfig) -> Self {
        Self {
            name: name.into(),
            bytes: Vec::new(),
            constants: ConstantPool::new(),
            register_count: 0,
            parameter_count: 0,
            endianness: target.endianness,
        }
    }

    pub fn registers(mut self, count: u32) -> Self {
        self.register_count = count;
        self
    }

    pub fn parameters(mut self, count: u32) -> Self {
        self.parameter_count = count;
        self
    }

    #[inline]
    pub fn current_offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn add_constant(&mut self, value: impl Into<Value>) -> usize {
        self.constants.push(value.into())
    }

    /// Appends one instruction and returns its offset. Operand values are
    /// checked against the range of their declared type.
    pub fn emit(&mut self, bytecode: Bytecode, operands: &[i32]) -> Result<usize> {
        if operands.len() != bytecode.number_of_operands() {
            return Err(InterpreterError::InvalidOperand {
                bytecode: bytecode.name(),
                index: operands.len(),
                value: bytecode.number_of_operands() as i64,
            });
        }
        let offset = self.bytes.len();
        self.bytes.push(bytecode.to_byte());
        for (index, (ty, value)) in bytecode.operand_types().iter().zip(operands).enumerate() {
            let (lo, hi) = ty.range();
            let wide = *value as i64;
            if wide < lo || wide > hi {
                self.bytes.truncate(offset);
                return Err(InterpreterError::InvalidOperand {
                    bytecode: bytecode.name(),
                    index,
                    value: wide,
                });
            }
            match ty.size() {
                OperandSize::Byte => self.bytes.push(*value as u8),
                OperandSize::Short => {
                    let raw = *value as u16;
                    let encoded = match self.endianness {
                        Endianness::Little => raw.to_le_bytes(),
                        Endianness::Big => raw.to_be_bytes(),
                    };
                    self.bytes.extend_from_slice(&encoded);
                }
                OperandSize::None => {}
            }
        }
        Ok(offset)
    }

    /// Appends a raw opcode byte with no operands. Used to produce opcodes
    /// outside the instruction set.
    pub fn emit_raw(&mut self, byte: u8) -> usize {
        self.bytes.push(byte);
        self.bytes.len() - 1
    }

    pub fn build(self) -> BytecodeArray {
        BytecodeArray::new(
            self.name,
            self.bytes,
            self.constants,
            self.register_count,
            self.parameter_count,
            self.endianness,
        )
    }
}
