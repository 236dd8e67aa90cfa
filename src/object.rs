//! Runtime values shared by the evaluator and the virtual machine.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::BlockStatement;
use crate::code::Instructions;

pub mod builtins;
pub mod environment;
pub mod error;
pub mod operators;

pub use builtins::{BuiltinFunction, Builtins};
pub use environment::{Environment, ScopeId};
pub use error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Integer,
    String,
    Boolean,
    Null,
    ReturnValue,
    Error,
    Array,
    Hash,
    Function,
    CompiledFunction,
    Closure,
    Builtin,
}

impl ObjectType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::String => "STRING",
            Self::Boolean => "BOOLEAN",
            Self::Null => "NULL",
            Self::ReturnValue => "RETURN_VALUE",
            Self::Error => "ERROR",
            Self::Array => "ARRAY",
            Self::Hash => "HASH",
            Self::Function => "FUNCTION",
            Self::CompiledFunction => "COMPILED_FUNCTION",
            Self::Closure => "CLOSURE",
            Self::Builtin => "BUILTIN",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map key derived from a value's content, so two equal strings built
/// separately address the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashKey {
    pub kind: ObjectType,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// Tree-walking function value. `scope` indexes the evaluator's environment
/// arena and stays meaningful only inside the evaluator that created it.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Rc<BlockStatement>,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Integer(i64),
    String(String),
    Boolean(bool),
    Null,
    ReturnValue(Box<Object>),
    Error(String),
    Array(Vec<Object>),
    Hash(BTreeMap<HashKey, HashPair>),
    Function(Function),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(BuiltinFunction),
}

impl Object {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Integer(_) => ObjectType::Integer,
            Object::String(_) => ObjectType::String,
            Object::Boolean(_) => ObjectType::Boolean,
            Object::Null => ObjectType::Null,
            Object::ReturnValue(_) => ObjectType::ReturnValue,
            Object::Error(_) => ObjectType::Error,
            Object::Array(_) => ObjectType::Array,
            Object::Hash(_) => ObjectType::Hash,
            Object::Function(_) => ObjectType::Function,
            Object::CompiledFunction(_) => ObjectType::CompiledFunction,
            Object::Closure(_) => ObjectType::Closure,
            Object::Builtin(_) => ObjectType::Builtin,
        }
    }

    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Boolean(false) | Object::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    pub fn hash_key(&self) -> Option<HashKey> {
        let value = match self {
            Object::Integer(value) => *value as u64,
            Object::Boolean(value) => u64::from(*value),
            Object::String(value) => fnv1a(value.as_bytes()),
            _ => return None,
        };
        Some(HashKey {
            kind: self.object_type(),
            value,
        })
    }

    /// Equality used by `==`/`!=` once the integer and string cases are
    /// handled: booleans and null compare by value, everything else only
    /// matches itself, which for freshly built composites is never.
    pub fn identical(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Boolean(left), Object::Boolean(right)) => left == right,
            (Object::Null, Object::Null) => true,
            _ => false,
        }
    }

    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{value}"),
            Object::String(value) => f.write_str(value),
            Object::Boolean(value) => write!(f, "{value}"),
            Object::Null => f.write_str("null"),
            Object::ReturnValue(value) => write!(f, "{value}"),
            Object::Error(message) => write!(f, "ERROR: {message}"),
            Object::Array(elements) => {
                let rendered = elements
                    .iter()
                    .map(Object::inspect)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{rendered}]")
            }
            Object::Hash(pairs) => {
                let rendered = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{rendered}}}")
            }
            Object::Function(function) => write!(
                f,
                "fn({}) {{\n{}\n}}",
                function.parameters.join(", "),
                function.body
            ),
            Object::CompiledFunction(function) => write!(
                f,
                "CompiledFunction[{} bytes, {} locals]",
                function.instructions.len(),
                function.num_locals
            ),
            Object::Closure(closure) => write!(
                f,
                "Closure[{} bytes, {} free]",
                closure.function.instructions.len(),
                closure.free.len()
            ),
            Object::Builtin(builtin) => write!(f, "builtin function {}", builtin.name()),
        }
    }
}
