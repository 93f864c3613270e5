//! Operand decoding for a single instruction.
//!
//! Each accessor asserts (in checking builds) that the requested width and kind
//! match the static metadata of the operand slot. Byte order and the
//! aligned/unaligned split live entirely here.

use crate::bytecode::{Bytecode, BytecodeArray, OperandSize, OperandType};
use crate::config::{Endianness, TargetConfig};
use crate::error::Result;

use super::frame::Register;

const BITS_PER_BYTE: u32 = 8;

pub struct OperandDecoder<'a> {
    bytecode_array: &'a BytecodeArray,
    offset: usize,
    bytecode: Bytecode,
    target: TargetConfig,
}

impl<'a> OperandDecoder<'a> {
    pub fn new(bytecode_array: &'a BytecodeArray, offset: usize, bytecode: Bytecode, target: TargetConfig) -> Self {
        Self {
            bytecode_array,
            offset,
            bytecode,
            target,
        }
    }

    #[inline]
    pub fn bytecode(&self) -> Bytecode {
        self.bytecode
    }

    #[inline]
    fn operand_address(&self, index: usize) -> usize {
        self.offset + self.bytecode.operand_offset(index)
    }

    #[inline]
    fn check_operand(&self, index: usize, size: OperandSize) {
        debug_assert!(
            index < self.bytecode.number_of_operands(),
            "{} has {} operands, asked for {}",
            self.bytecode.name(),
            self.bytecode.number_of_operands(),
            index
        );
        debug_assert_eq!(
            self.bytecode.operand_size(index),
            size,
            "operand {} of {} has the wrong width",
            index,
            self.bytecode.name()
        );
    }

    #[inline]
    fn check_type(&self, index: usize, expected: OperandType) {
        debug_assert_eq!(
            self.bytecode.operand_type(index),
            expected,
            "operand {} of {} has the wrong kind",
            index,
            self.bytecode.name()
        );
    }

    pub fn decode_byte(&self, index: usize) -> Result<u32> {
        self.check_operand(index, OperandSize::Byte);
        self.bytecode_array.load_u8(self.operand_address(index)).map(u32::from)
    }

    /// One byte, sign-extended to the native word.
    pub fn decode_signed_byte(&self, index: usize) -> Result<isize> {
        self.check_operand(index, OperandSize::Byte);
        self.bytecode_array
            .load_i8(self.operand_address(index))
            .map(|v| v as isize)
    }

    pub fn decode_short(&self, index: usize) -> Result<u32> {
        self.check_operand(index, OperandSize::Short);
        let address = self.operand_address(index);
        let endianness = self.target.endianness;
        if self.target.unaligned_access {
            return self.bytecode_array.load_u16(address, endianness).map(u32::from);
        }
        let first = self.bytecode_array.load_u8(address)?;
        let second = self.bytecode_array.load_u8(address + 1)?;
        Ok(u32::from(combine_bytes(first, second, endianness)))
    }

    pub fn decode_signed_short(&self, index: usize) -> Result<isize> {
        self.check_operand(index, OperandSize::Short);
        let address = self.operand_address(index);
        let endianness = self.target.endianness;
        if self.target.unaligned_access {
            return self
                .bytecode_array
                .load_i16(address, endianness)
                .map(|v| v as isize);
        }
        let (hi_address, lo_address) = match endianness {
            Endianness::Little => (address + 1, address),
            Endianness::Big => (address, address + 1),
        };
        let hi = self.bytecode_array.load_i8(hi_address)?;
        let lo = self.bytecode_array.load_u8(lo_address)?;
        Ok(combine_signed(hi, lo) as isize)
    }

    pub fn decode_count(&self, index: usize) -> Result<u32> {
        match self.bytecode.operand_size(index) {
            OperandSize::Byte => {
                self.check_type(index, OperandType::RegCount8);
                self.decode_byte(index)
            }
            OperandSize::Short => {
                self.check_type(index, OperandType::RegCount16);
                self.decode_short(index)
            }
            OperandSize::None => unreachable!("count operands are never empty"),
        }
    }

    pub fn decode_immediate(&self, index: usize) -> Result<isize> {
        self.check_type(index, OperandType::Imm8);
        self.decode_signed_byte(index)
    }

    pub fn decode_index(&self, index: usize) -> Result<usize> {
        match self.bytecode.operand_size(index) {
            OperandSize::Byte => {
                self.check_type(index, OperandType::Idx8);
                self.decode_byte(index).map(|v| v as usize)
            }
            OperandSize::Short => {
                self.check_type(index, OperandType::Idx16);
                self.decode_short(index).map(|v| v as usize)
            }
            OperandSize::None => unreachable!("index operands are never empty"),
        }
    }

    /// Register operands are always sign-extended; locals are negative.
    pub fn decode_register(&self, index: usize) -> Result<Register> {
        let ty = self.bytecode.operand_type(index);
        debug_assert!(ty.is_register(), "operand {} of {} is not a register", index, self.bytecode.name());
        let operand = match ty.size() {
            OperandSize::Byte => self.decode_signed_byte(index)?,
            OperandSize::Short => self.decode_signed_short(index)?,
            OperandSize::None => unreachable!("register operands are never empty"),
        };
        Ok(Register::from_operand(operand as i32))
    }
}

/// Builds an unsigned 16-bit value from two single-byte loads taken in
/// address order.
#[inline]
pub fn combine_bytes(first: u8, second: u8, endianness: Endianness) -> u16 {
    match endianness {
        Endianness::Little => (u16::from(second) << BITS_PER_BYTE) | u16::from(first),
        Endianness::Big => (u16::from(first) << BITS_PER_BYTE) | u16::from(second),
    }
}

/// Signed variant: the high byte is loaded sign-extended before the shift.
#[inline]
pub fn combine_signed(hi: i8, lo: u8) -> i32 {
    (i32::from(hi) << BITS_PER_BYTE) | i32::from(lo)
}
