use std::sync::Arc;

use crate::bytecode::{Bytecode, BytecodeBuilder};
use crate::config::{InterpreterFlags, TargetConfig};
use crate::error::{InterpreterError, Result};
use crate::value::Value;

use super::{
    MachineStack, NativeCall, Runtime, RuntimeFunction, RuntimeFunctionId, RuntimeFunctionTable, RuntimeResult,
    TraceKind, Tracer,
};

#[test]
fn machine_stack_grows_down_from_its_size() {
    let mut stack = MachineStack::new(64, 8);
    assert_eq!(stack.sp(), 64);
    stack.push(10).unwrap();
    assert_eq!(stack.sp(), 54);
    assert_eq!(stack.depth(), 10);
    stack.pop(10);
    assert_eq!(stack.sp(), 64);
    assert_eq!(stack.push(65), Err(InterpreterError::StackOverflow));
    assert_eq!(stack.sp(), 64);
}

#[test]
fn exhaustion_is_measured_against_the_real_limit() {
    let mut stack = MachineStack::new(64, 8);
    stack.push(55).unwrap();
    assert!(!stack.is_exhausted());
    stack.push(1).unwrap();
    assert!(stack.is_exhausted());
}

#[test]
fn interrupts_raise_the_effective_limit_until_handled() {
    let mut stack = MachineStack::new(64, 8);
    assert!(!stack.handle_interrupt());
    stack.request_interrupt();
    assert!(stack.has_pending_interrupt());
    assert_eq!(stack.limit(), 64);
    assert_eq!(stack.real_limit(), 8);
    // A limit change while pending only updates the real limit.
    stack.set_limit(16);
    assert_eq!(stack.limit(), 64);
    assert!(stack.handle_interrupt());
    assert_eq!(stack.limit(), 16);
    assert_eq!(stack.interrupts_handled(), 1);
}

fn answer(_call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    Ok(RuntimeResult::Single(Value::Smi(42)))
}

fn other_answer(_call: &mut NativeCall<'_>) -> Result<RuntimeResult> {
    Ok(RuntimeResult::Single(Value::Smi(-42)))
}

#[test]
fn builtin_ids_are_stable() {
    let table = RuntimeFunctionTable::builtin();
    let expected = [
        "Abort",
        "StackGuard",
        "InterpreterTraceBytecodeEntry",
        "InterpreterTraceBytecodeExit",
        "HandleDebuggerStatement",
        "Print",
        "DivMod",
        "ToBoolean",
        "NewContext",
    ];
    assert_eq!(table.len(), expected.len());
    for (idx, name) in expected.iter().enumerate() {
        let id = RuntimeFunctionId(idx as u16);
        assert_eq!(table.get(id).unwrap().name, *name);
        assert_eq!(RuntimeFunctionTable::builtin_id(name), Some(id));
    }
    assert_eq!(table.get(RuntimeFunctionId::DIV_MOD).unwrap().result_size, 2);
    assert_eq!(table.get(RuntimeFunctionId(99)).unwrap_err(), InterpreterError::UnknownRuntimeFunction(99));
}

#[test]
fn registered_functions_extend_and_replace() {
    let mut table = RuntimeFunctionTable::builtin();
    let id = table.register(RuntimeFunction {
        name: "Answer",
        entry: answer,
        nargs: 0,
        result_size: 1,
    });
    assert_eq!(id, RuntimeFunctionId(9));
    assert_eq!(table.lookup("Answer"), Some(id));
    assert_eq!(RuntimeFunctionTable::builtin_id("Answer"), None);
    table.replace(id, other_answer).unwrap();
    assert!(table.replace(RuntimeFunctionId(50), answer).is_err());
    assert_eq!(table.iter().count(), 10);
}

#[test]
fn replaced_functions_are_called_through_the_table() {
    let mut rt = Runtime::new(InterpreterFlags::default()).unwrap();
    let id = rt.register_function(RuntimeFunction {
        name: "Answer",
        entry: answer,
        nargs: 0,
        result_size: 1,
    });
    let build = || {
        let mut b = BytecodeBuilder::new("main", TargetConfig::host()).registers(1);
        b.emit(Bytecode::CallRuntime, &[i32::from(id.0), 0, 0]).unwrap();
        b.emit(Bytecode::Return, &[]).unwrap();
        Arc::new(crate::FunctionValue::new(Arc::new(b.build())))
    };
    assert_eq!(crate::Interpreter::call(&mut rt, &build(), &[]).unwrap(), Value::Smi(42));
    rt.replace_function(id, other_answer).unwrap();
    assert_eq!(crate::Interpreter::call(&mut rt, &build(), &[]).unwrap(), Value::Smi(-42));
}

#[test]
fn runtime_rejects_invalid_flags() {
    let flags = InterpreterFlags::default().with_stack(16, 16);
    assert!(matches!(Runtime::new(flags), Err(InterpreterError::Config(_))));
}

#[test]
fn tracer_serialises_recorded_events() {
    let mut b = BytecodeBuilder::new("traced", TargetConfig::host());
    b.emit(Bytecode::LdaZero, &[]).unwrap();
    let array = b.build();

    let mut tracer = Tracer::new();
    tracer.record(TraceKind::Entry, &array, 0, &Value::Undefined);
    assert!(tracer.events().is_empty());

    tracer.set_recording(true);
    tracer.record(TraceKind::Entry, &array, 0, &Value::Undefined);
    tracer.record(TraceKind::Exit, &array, 0, &Value::Smi(0));
    let json: serde_json::Value = serde_json::from_str(&tracer.to_json().unwrap()).unwrap();
    assert_eq!(json[0]["kind"], "entry");
    assert_eq!(json[0]["function"], "traced");
    assert_eq!(json[0]["bytecode"], "LdaZero");
    assert_eq!(json[1]["kind"], "exit");
    assert_eq!(json[1]["accumulator"], "0");

    assert_eq!(tracer.take_events().len(), 2);
    assert!(tracer.events().is_empty());
}

#[test]
fn debugger_records_steps_once_attached() {
    let mut rt = Runtime::new(InterpreterFlags::default()).unwrap();
    assert!(!rt.debugger().is_attached());
    rt.debugger_mut().attach();
    rt.debugger_mut().record_step(Arc::from("f"), 3, Bytecode::Return);
    assert_eq!(rt.debugger().steps().len(), 1);
    assert!(rt.debugger().is_attached());
    assert_eq!(rt.debug_break_dispatch_table().name(), "debug-break");
    assert_eq!(rt.standard_dispatch_table().name(), "standard");
}
