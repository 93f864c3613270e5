//! Minimal tagged values: just enough for registers, the accumulator and
//! constant pools to hold something addressable.

use std::fmt;
use std::sync::Arc;

use crate::bytecode::BytecodeArray;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Bool(bool),
    /// Small tagged integer.
    Smi(i32),
    Str(Arc<str>),
    Function(Arc<FunctionValue>),
    Context(Arc<Context>),
    Object(Arc<ObjectValue>),
    Bytecode(Arc<BytecodeArray>),
}

impl Value {
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Smi(_) => "smi",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
            Value::Context(_) => "context",
            Value::Object(_) => "object",
            Value::Bytecode(_) => "bytecode array",
        }
    }

    #[inline]
    pub fn as_smi(&self) -> Option<i32> {
        match self {
            Value::Smi(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Smi(v) => *v != 0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }
}

/// Word equality: identity for heap references, bit equality for immediates.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Smi(a), Value::Smi(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Context(a), Value::Context(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Bytecode(a), Value::Bytecode(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Smi(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Context(ctx) => write!(f, "<context depth={}>", ctx.depth()),
            Value::Object(obj) => write!(f, "<object {}>", obj.constructor.name()),
            Value::Bytecode(array) => write!(f, "<bytecode {}>", array.name()),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Smi(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

/// A compiled function: its bytecode plus the context it closes over.
#[derive(Debug)]
pub struct FunctionValue {
    bytecode: Arc<BytecodeArray>,
    context: Option<Arc<Context>>,
}

impl FunctionValue {
    pub fn new(bytecode: Arc<BytecodeArray>) -> Self {
        Self {
            bytecode,
            context: None,
        }
    }

    pub fn with_context(bytecode: Arc<BytecodeArray>, context: Arc<Context>) -> Self {
        Self {
            bytecode,
            context: Some(context),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.bytecode.name()
    }

    #[inline]
    pub fn bytecode(&self) -> &Arc<BytecodeArray> {
        &self.bytecode
    }

    #[inline]
    pub fn context(&self) -> Option<&Arc<Context>> {
        self.context.as_ref()
    }
}

/// One link of the lexical scope chain.
#[derive(Debug, Default)]
pub struct Context {
    parent: Option<Arc<Context>>,
}

impl Context {
    pub fn root() -> Self {
        Self { parent: None }
    }

    pub fn with_parent(parent: Arc<Context>) -> Self {
        Self { parent: Some(parent) }
    }

    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.parent.as_ref();
        while let Some(ctx) = cur {
            depth += 1;
            cur = ctx.parent.as_ref();
        }
        depth
    }
}

/// Result of a construct call whose constructor did not return an object.
#[derive(Debug)]
pub struct ObjectValue {
    pub constructor: Arc<FunctionValue>,
    pub new_target: Value,
    pub value: Value,
}
