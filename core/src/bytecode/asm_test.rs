use crate::config::TargetConfig;
use crate::error::InterpreterError;
use crate::value::Value;

use super::Bytecode;
use super::asm::{assemble, disassemble};

const COUNTDOWN: &str = r#"
; counts r0 down to zero
.function main params=0 registers=2
.const smi 3
  LdaConstant [0]
  Star r0
loop:
  LdaSmi8 1
  Star r1
  Ldar r1
  Sub r0        ; acc = r0 - 1
  Star r0
  LdaZero
  TestEqual r0
  JumpIfTrue @done
  Jump @loop
done:
  Return
.end
"#;

#[test]
fn assembles_functions_with_labels() {
    let target = TargetConfig::host();
    let program = assemble(COUNTDOWN, target).unwrap();
    let main = program.entry().unwrap();
    let array = main.bytecode();
    assert_eq!(array.register_count(), 2);
    assert_eq!(array.constant_pool().get(0).unwrap(), &Value::Smi(3));
    assert_eq!(array.load_u8(0).unwrap(), Bytecode::LdaConstant.to_byte());
    // loop: is at 4, `Jump @loop` sits at 19 and done: at 21.
    let jump_at = 19;
    assert_eq!(array.load_u8(jump_at).unwrap(), Bytecode::Jump.to_byte());
    assert_eq!(array.load_i8(jump_at + 1).unwrap(), 4 - jump_at as i8);
    assert_eq!(array.load_u8(17).unwrap(), Bytecode::JumpIfTrue.to_byte());
    assert_eq!(array.load_i8(18).unwrap(), 21 - 17);
    assert_eq!(array.load_u8(21).unwrap(), Bytecode::Return.to_byte());
}

#[test]
fn later_functions_reference_earlier_ones() {
    let source = r#"
.function helper params=1 registers=1
  Ldar r0
  Return
.end
.function main params=0 registers=3
.const fn helper
.const str "hi; there"
  LdaConstant [0]
  Star r0
  Return
.end
"#;
    let program = assemble(source, TargetConfig::host()).unwrap();
    assert_eq!(program.functions().len(), 2);
    let main = program.entry().unwrap();
    let pool = main.bytecode().constant_pool();
    assert!(matches!(pool.get(0).unwrap(), Value::Function(f) if f.name() == "helper"));
    assert_eq!(pool.get(1).unwrap(), &Value::from("hi; there"));
}

#[test]
fn runtime_functions_are_named_with_hash() {
    let source = r#"
.function main params=0 registers=2
  CallRuntimeForPair #DivMod, r0, 2, r0
  CallRuntime #Print, r0, 1
  Return
.end
"#;
    let target = TargetConfig::host();
    let program = assemble(source, target).unwrap();
    let text = disassemble(program.entry().unwrap().bytecode(), target).unwrap();
    assert!(text.contains("CallRuntimeForPair"), "{}", text);
    assert!(text.contains("#DivMod, r0, 2, r0"), "{}", text);
    assert!(text.contains("#Print, r0, 1"), "{}", text);
}

#[test]
fn disassembly_shows_jump_targets_and_reserved_registers() {
    let source = r#"
.function main params=0 registers=1
top:
  PushContext r0
  PopContext r0
  Ldar <context>
  JumpIfUndefined @top
  Return
.end
"#;
    let target = TargetConfig::host();
    let program = assemble(source, target).unwrap();
    let text = disassemble(program.entry().unwrap().bytecode(), target).unwrap();
    assert!(text.starts_with("; function main"));
    assert!(text.contains("<context>"));
    assert!(text.contains("-6 (-> 0)"), "{}", text);
}

fn assembly_error(source: &str) -> (usize, String) {
    match assemble(source, TargetConfig::host()) {
        Err(InterpreterError::Assembly { line, message }) => (line, message),
        other => panic!("expected assembly error, got {:?}", other),
    }
}

#[test]
fn reports_errors_with_line_numbers() {
    let (line, message) = assembly_error(".function main\n  Frobnicate\n.end\n");
    assert_eq!(line, 2);
    assert!(message.contains("unknown bytecode"));

    let (line, message) = assembly_error(".function main registers=1\n  Ldar\n.end\n");
    assert_eq!(line, 2);
    assert!(message.contains("takes 1 operands"));

    let (_, message) = assembly_error(".function main\n  Jump @nowhere\n.end\n");
    assert!(message.contains("unknown label"));

    let (_, message) = assembly_error(".function main\n  LdaSmi8 300\n.end\n");
    assert!(message.contains("LdaSmi8"));

    let (_, message) = assembly_error(".function main\n.const fn later\n.end\n");
    assert!(message.contains("define it first"));

    let (_, message) = assembly_error(".function main\n  Return\n");
    assert!(message.contains("missing .end"));

    let (line, message) = assembly_error(".function f\n.end\n.function f\n.end\n");
    assert_eq!(line, 3);
    assert!(message.contains("defined twice"));

    let (line, _) = assembly_error("  Return\n");
    assert_eq!(line, 1);
}

#[test]
fn runtime_calls_must_match_the_callee_signature() {
    let (line, message) = assembly_error(".function main registers=2\n  CallRuntime #DivMod, r0, 2\n  Return\n.end\n");
    assert_eq!(line, 2);
    assert!(message.contains("DivMod returns 2 words"), "{}", message);

    let (_, message) = assembly_error(".function main registers=1\n  CallRuntimeForPair #ToBoolean, r0, 1, r0\n.end\n");
    assert!(message.contains("ToBoolean returns 1 words"), "{}", message);

    let (line, message) = assembly_error(".function main registers=1\n  LdaZero\n  CallRuntime #ToBoolean, r0, 0\n.end\n");
    assert_eq!(line, 3);
    assert!(message.contains("ToBoolean expects 1 arguments, got 0"), "{}", message);

    // Variadic callees and raw indices are left to the runtime.
    let source = ".function main registers=2\n  CallRuntime #Print, r0, 2\n  CallRuntime [200], r0, 0\n  Return\n.end\n";
    assert!(assemble(source, TargetConfig::host()).is_ok());
}
