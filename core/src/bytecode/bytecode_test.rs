use crate::config::{Endianness, TargetConfig};
use crate::error::InterpreterError;

use super::{Bytecode, BytecodeBuilder, OperandSize, OperandType};

#[test]
fn opcodes_are_dense_and_named() {
    for (idx, bytecode) in Bytecode::ALL.iter().enumerate() {
        assert_eq!(bytecode.to_byte() as usize, idx);
        assert_eq!(Bytecode::from_byte(idx as u8), *bytecode);
        assert_eq!(Bytecode::from_name(bytecode.name()), Some(*bytecode));
    }
    assert!(Bytecode::COUNT < 256);
    assert_eq!(Bytecode::from_byte(0xFF), Bytecode::Illegal);
    assert_eq!(Bytecode::from_name("Nope"), None);
}

#[test]
fn operand_offsets_accumulate_previous_widths() {
    let b = Bytecode::CallRuntimeForPair;
    assert_eq!(b.number_of_operands(), 4);
    assert_eq!(b.operand_offset(0), 1);
    assert_eq!(b.operand_offset(1), 3);
    assert_eq!(b.operand_offset(2), 4);
    assert_eq!(b.operand_offset(3), 5);
    assert_eq!(b.size(), 6);

    assert_eq!(Bytecode::MovWide.operand_offset(1), 3);
    assert_eq!(Bytecode::MovWide.size(), 5);
    assert_eq!(Bytecode::Return.size(), 1);
}

#[test]
fn operand_types_fix_width_and_kind() {
    assert_eq!(Bytecode::Ldar.operand_size(0), OperandSize::Byte);
    assert_eq!(Bytecode::LdaConstantWide.operand_size(0), OperandSize::Short);
    assert!(Bytecode::Call.operand_type(0).is_register());
    assert!(Bytecode::Call.operand_type(2).is_count());
    assert!(Bytecode::CallRuntime.operand_type(0).is_index());
    assert_eq!(OperandType::Reg16.range(), (-32768, 32767));
    assert_eq!(OperandSize::Short.bytes(), 2);
}

#[test]
fn jump_and_call_classification() {
    let jumps: Vec<_> = Bytecode::ALL.iter().filter(|b| b.is_jump()).collect();
    assert_eq!(jumps.len(), 6);
    assert!(Bytecode::Debugger.is_call());
    assert!(!Bytecode::StackCheck.is_call());
}

#[test]
fn builder_encodes_shorts_in_target_byte_order() {
    let mut little = BytecodeBuilder::new("f", TargetConfig::new(Endianness::Little, true));
    little.emit(Bytecode::LdaConstantWide, &[0x0102]).unwrap();
    assert_eq!(little.build().bytes(), &[Bytecode::LdaConstantWide.to_byte(), 0x02, 0x01]);

    let mut big = BytecodeBuilder::new("f", TargetConfig::new(Endianness::Big, true));
    big.emit(Bytecode::MovWide, &[-2, 1]).unwrap();
    assert_eq!(big.build().bytes(), &[Bytecode::MovWide.to_byte(), 0xFF, 0xFE, 0x00, 0x01]);
}

#[test]
fn builder_rejects_out_of_range_operands() {
    let mut builder = BytecodeBuilder::new("f", TargetConfig::host());
    let err = builder.emit(Bytecode::LdaSmi8, &[200]).unwrap_err();
    assert_eq!(
        err,
        InterpreterError::InvalidOperand {
            bytecode: "LdaSmi8",
            index: 0,
            value: 200
        }
    );
    assert!(builder.emit(Bytecode::LdaConstant, &[-1]).is_err());
    assert!(builder.emit(Bytecode::Call, &[0, -1]).is_err());
    // Nothing partial is left behind.
    assert_eq!(builder.current_offset(), 0);
    assert_eq!(builder.emit(Bytecode::LdaZero, &[]).unwrap(), 0);
    assert_eq!(builder.emit(Bytecode::Return, &[]).unwrap(), 1);
}

#[test]
fn builder_tracks_constants_and_metadata() {
    let mut builder = BytecodeBuilder::new("meta", TargetConfig::host())
        .registers(3)
        .parameters(2);
    assert_eq!(builder.add_constant(7), 0);
    assert_eq!(builder.add_constant("seven"), 1);
    builder.emit_raw(0xFE);
    let array = builder.build();
    assert_eq!(array.name(), "meta");
    assert_eq!(array.register_count(), 3);
    assert_eq!(array.parameter_count(), 2);
    assert_eq!(array.constant_pool().len(), 2);
    assert_eq!(array.len(), 1);
    assert!(array.constant_pool().get(2).is_err());
    assert!(matches!(
        array.load_u8(1),
        Err(InterpreterError::BytecodeOutOfRange { offset: 1, len: 1 })
    ));
}
