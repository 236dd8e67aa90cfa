use thiserror::Error;

use crate::object::ObjectType;

/// Failures raised while operating on values. The evaluator turns these into
/// in-band `Error` objects; the virtual machine aborts with them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("type mismatch: {left} {operator} {right}")]
    TypeMismatch {
        left: ObjectType,
        operator: &'static str,
        right: ObjectType,
    },
    #[error("unknown operator: {left} {operator} {right}")]
    UnknownInfixOperator {
        left: ObjectType,
        operator: &'static str,
        right: ObjectType,
    },
    #[error("unknown operator: {operator}{operand}")]
    UnknownPrefixOperator {
        operator: &'static str,
        operand: ObjectType,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("index operator not supported: {0}")]
    IndexNotSupported(ObjectType),
    #[error("unusable as hash key: {0}")]
    UnusableHashKey(ObjectType),
    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArgumentCount { want: usize, got: usize },
    #[error("not a function: {0}")]
    NotCallable(ObjectType),
    #[error("identifier not found: {0}")]
    IdentifierNotFound(String),
}
