use std::sync::Arc;

use crate::bytecode::asm;
use crate::{
    BytecodeBuilder, FunctionValue, Interpreter, InterpreterFlags, Register, Result, Runtime, TargetConfig, Value,
};

pub(crate) fn flags() -> InterpreterFlags {
    InterpreterFlags::default().with_debug_code(true)
}

pub(crate) fn runtime() -> Runtime {
    Runtime::new(flags()).expect("runtime")
}

pub(crate) fn builder(name: &str, registers: u32) -> BytecodeBuilder {
    BytecodeBuilder::new(name, TargetConfig::host()).registers(registers)
}

#[inline]
pub(crate) fn reg(index: u32) -> i32 {
    Register::new(index).operand()
}

pub(crate) fn function(builder: BytecodeBuilder) -> Arc<FunctionValue> {
    Arc::new(FunctionValue::new(Arc::new(builder.build())))
}

pub(crate) fn run(runtime: &mut Runtime, builder: BytecodeBuilder) -> Result<Value> {
    let f = function(builder);
    Interpreter::call(runtime, &f, &[])
}

pub(crate) fn run_source(runtime: &mut Runtime, source: &str) -> Result<Value> {
    let program = asm::assemble(source, runtime.target())?;
    let entry = Arc::clone(program.entry().expect("main function"));
    Interpreter::call(runtime, &entry, &[])
}
