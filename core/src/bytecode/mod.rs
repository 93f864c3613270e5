//! Instruction set metadata.
//!
//! Every instruction is one opcode byte followed by its operands. The width and
//! kind of each operand slot are fixed per bytecode and exposed through the
//! queries on [`Bytecode`]; decoders assert against them.

mod array;
pub mod asm;
mod builder;

pub use array::{BytecodeArray, ConstantPool};
pub use builder::BytecodeBuilder;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum OperandSize {
    None = 0,
    Byte = 1,
    Short = 2,
}

impl OperandSize {
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperandType {
    /// Signed 8-bit immediate.
    Imm8,
    /// Unsigned 8-bit index (constant pool, runtime function, ...).
    Idx8,
    Idx16,
    /// Signed register operand; locals are non-positive.
    Reg8,
    Reg16,
    /// Number of consecutive registers.
    RegCount8,
    RegCount16,
}

impl OperandType {
    pub const fn size(self) -> OperandSize {
        match self {
            OperandType::Imm8 | OperandType::Idx8 | OperandType::Reg8 | OperandType::RegCount8 => OperandSize::Byte,
            OperandType::Idx16 | OperandType::Reg16 | OperandType::RegCount16 => OperandSize::Short,
        }
    }

    #[inline]
    pub const fn is_register(self) -> bool {
        matches!(self, OperandType::Reg8 | OperandType::Reg16)
    }

    #[inline]
    pub const fn is_index(self) -> bool {
        matches!(self, OperandType::Idx8 | OperandType::Idx16)
    }

    #[inline]
    pub const fn is_count(self) -> bool {
        matches!(self, OperandType::RegCount8 | OperandType::RegCount16)
    }

    /// Inclusive range of values the operand can encode.
    pub const fn range(self) -> (i64, i64) {
        match self {
            OperandType::Imm8 | OperandType::Reg8 => (i8::MIN as i64, i8::MAX as i64),
            OperandType::Reg16 => (i16::MIN as i64, i16::MAX as i64),
            OperandType::Idx8 | OperandType::RegCount8 => (0, u8::MAX as i64),
            OperandType::Idx16 | OperandType::RegCount16 => (0, u16::MAX as i64),
        }
    }
}

macro_rules! bytecode_list {
    ($($name:ident => [$($operand:ident),*]),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[repr(u8)]
        pub enum Bytecode {
            $($name),*
        }

        impl Bytecode {
            pub const ALL: &'static [Bytecode] = &[$(Bytecode::$name),*];

            pub const fn operand_types(self) -> &'static [OperandType] {
                match self {
                    $(Bytecode::$name => &[$(OperandType::$operand),*]),*
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Bytecode::$name => stringify!($name)),*
                }
            }
        }
    };
}

bytecode_list! {
    LdaZero => [],
    LdaSmi8 => [Imm8],
    LdaUndefined => [],
    LdaTrue => [],
    LdaFalse => [],
    LdaConstant => [Idx8],
    LdaConstantWide => [Idx16],
    Ldar => [Reg8],
    Star => [Reg8],
    Mov => [Reg8, Reg8],
    MovWide => [Reg16, Reg16],
    Add => [Reg8],
    Sub => [Reg8],
    TestEqual => [Reg8],
    TestLessThan => [Reg8],
    Jump => [Imm8],
    JumpConstant => [Idx8],
    JumpIfTrue => [Imm8],
    JumpIfFalse => [Imm8],
    JumpIfUndefined => [Imm8],
    JumpIfNotUndefined => [Imm8],
    PushContext => [Reg8],
    PopContext => [Reg8],
    Call => [Reg8, Reg8, RegCount8],
    New => [Reg8, Reg8, RegCount8],
    CallRuntime => [Idx16, Reg8, RegCount8],
    CallRuntimeForPair => [Idx16, Reg8, RegCount8, Reg8],
    StackCheck => [],
    Debugger => [],
    Return => [],
    Illegal => [],
}

impl Bytecode {
    pub const COUNT: usize = Bytecode::ALL.len();

    /// Maps an opcode byte to its bytecode; unassigned values are `Illegal`.
    #[inline]
    pub fn from_byte(byte: u8) -> Bytecode {
        match Bytecode::ALL.get(byte as usize) {
            Some(bytecode) => *bytecode,
            None => Bytecode::Illegal,
        }
    }

    pub fn from_name(name: &str) -> Option<Bytecode> {
        Bytecode::ALL.iter().copied().find(|b| b.name() == name)
    }

    #[inline]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn number_of_operands(self) -> usize {
        self.operand_types().len()
    }

    pub fn operand_type(self, index: usize) -> OperandType {
        debug_assert!(
            index < self.number_of_operands(),
            "{} has no operand {}",
            self.name(),
            index
        );
        self.operand_types()[index]
    }

    #[inline]
    pub fn operand_size(self, index: usize) -> OperandSize {
        self.operand_type(index).size()
    }

    /// Byte offset of operand `index` from the start of the instruction.
    pub fn operand_offset(self, index: usize) -> usize {
        debug_assert!(index < self.number_of_operands());
        1 + self.operand_types()[..index]
            .iter()
            .map(|ty| ty.size().bytes())
            .sum::<usize>()
    }

    /// Total instruction width: opcode byte plus operands.
    pub fn size(self) -> usize {
        1 + self
            .operand_types()
            .iter()
            .map(|ty| ty.size().bytes())
            .sum::<usize>()
    }

    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            Bytecode::Jump
                | Bytecode::JumpConstant
                | Bytecode::JumpIfTrue
                | Bytecode::JumpIfFalse
                | Bytecode::JumpIfUndefined
                | Bytecode::JumpIfNotUndefined
        )
    }

    /// Instructions that leave the handler chain through the call protocol.
    pub const fn is_call(self) -> bool {
        matches!(
            self,
            Bytecode::Call | Bytecode::New | Bytecode::CallRuntime | Bytecode::CallRuntimeForPair | Bytecode::Debugger
        )
    }
}

#[cfg(test)]
mod bytecode_test;
#[cfg(test)]
mod asm_test;
