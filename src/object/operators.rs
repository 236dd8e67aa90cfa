//! Operator semantics shared by both execution strategies.

use std::collections::BTreeMap;

use crate::ast::{InfixOperator, PrefixOperator};
use crate::object::error::RuntimeError;
use crate::object::{HashKey, HashPair, Object};

pub fn infix(operator: InfixOperator, left: &Object, right: &Object) -> Result<Object, RuntimeError> {
    match (left, right) {
        (Object::Integer(left), Object::Integer(right)) => integer_infix(operator, *left, *right),
        (Object::String(left_value), Object::String(right_value)) => match operator {
            InfixOperator::Add => Ok(Object::String(format!("{left_value}{right_value}"))),
            InfixOperator::Equal => Ok(Object::Boolean(left_value == right_value)),
            InfixOperator::NotEqual => Ok(Object::Boolean(left_value != right_value)),
            _ => Err(unknown_infix(operator, left, right)),
        },
        _ => match operator {
            InfixOperator::Equal => Ok(Object::Boolean(left.identical(right))),
            InfixOperator::NotEqual => Ok(Object::Boolean(!left.identical(right))),
            _ if left.object_type() != right.object_type() => Err(RuntimeError::TypeMismatch {
                left: left.object_type(),
                operator: operator.as_str(),
                right: right.object_type(),
            }),
            _ => Err(unknown_infix(operator, left, right)),
        },
    }
}

fn unknown_infix(operator: InfixOperator, left: &Object, right: &Object) -> RuntimeError {
    RuntimeError::UnknownInfixOperator {
        left: left.object_type(),
        operator: operator.as_str(),
        right: right.object_type(),
    }
}

fn integer_infix(operator: InfixOperator, left: i64, right: i64) -> Result<Object, RuntimeError> {
    let value = match operator {
        InfixOperator::Add => Object::Integer(left.wrapping_add(right)),
        InfixOperator::Sub => Object::Integer(left.wrapping_sub(right)),
        InfixOperator::Mul => Object::Integer(left.wrapping_mul(right)),
        InfixOperator::Div => {
            if right == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Object::Integer(left.wrapping_div(right))
        }
        InfixOperator::LessThan => Object::Boolean(left < right),
        InfixOperator::GreaterThan => Object::Boolean(left > right),
        InfixOperator::Equal => Object::Boolean(left == right),
        InfixOperator::NotEqual => Object::Boolean(left != right),
    };
    Ok(value)
}

pub fn prefix(operator: PrefixOperator, operand: &Object) -> Result<Object, RuntimeError> {
    match (operator, operand) {
        (PrefixOperator::Bang, _) => Ok(Object::Boolean(!operand.is_truthy())),
        (PrefixOperator::Minus, Object::Integer(value)) => Ok(Object::Integer(value.wrapping_neg())),
        (PrefixOperator::Minus, _) => Err(RuntimeError::UnknownPrefixOperator {
            operator: operator.as_str(),
            operand: operand.object_type(),
        }),
    }
}

/// Out-of-range array positions and absent hash keys read as `Null`.
pub fn index(collection: &Object, index: &Object) -> Result<Object, RuntimeError> {
    match (collection, index) {
        (Object::Array(elements), Object::Integer(position)) => Ok(usize::try_from(*position)
            .ok()
            .and_then(|position| elements.get(position))
            .cloned()
            .unwrap_or(Object::Null)),
        (Object::Hash(pairs), _) => {
            let key = hash_key(index)?;
            Ok(pairs
                .get(&key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Object::Null))
        }
        _ => Err(RuntimeError::IndexNotSupported(collection.object_type())),
    }
}

pub fn hash_key(key: &Object) -> Result<HashKey, RuntimeError> {
    key.hash_key()
        .ok_or_else(|| RuntimeError::UnusableHashKey(key.object_type()))
}

/// Builds a hash from key/value pairs in order; a repeated key keeps the
/// last value.
pub fn build_hash(
    entries: impl IntoIterator<Item = (Object, Object)>,
) -> Result<Object, RuntimeError> {
    let mut pairs = BTreeMap::new();
    for (key, value) in entries {
        pairs.insert(hash_key(&key)?, HashPair { key, value });
    }
    Ok(Object::Hash(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(
            infix(InfixOperator::Add, &Object::Integer(i64::MAX), &Object::Integer(1)),
            Ok(Object::Integer(i64::MIN))
        );
        assert_eq!(
            infix(InfixOperator::Div, &Object::Integer(i64::MIN), &Object::Integer(-1)),
            Ok(Object::Integer(i64::MIN))
        );
        assert_eq!(
            prefix(PrefixOperator::Minus, &Object::Integer(i64::MIN)),
            Ok(Object::Integer(i64::MIN))
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(
            infix(InfixOperator::Div, &Object::Integer(1), &Object::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn mismatched_operands_name_their_types() {
        let error = infix(InfixOperator::Add, &Object::Integer(5), &Object::Boolean(true))
            .expect_err("mismatch");
        assert_eq!(error.to_string(), "type mismatch: INTEGER + BOOLEAN");

        let error = infix(InfixOperator::Add, &Object::Boolean(true), &Object::Boolean(false))
            .expect_err("unsupported");
        assert_eq!(error.to_string(), "unknown operator: BOOLEAN + BOOLEAN");

        let error = infix(
            InfixOperator::Sub,
            &Object::String("a".into()),
            &Object::String("b".into()),
        )
        .expect_err("unsupported");
        assert_eq!(error.to_string(), "unknown operator: STRING - STRING");

        let error = prefix(PrefixOperator::Minus, &Object::Boolean(true)).expect_err("unsupported");
        assert_eq!(error.to_string(), "unknown operator: -BOOLEAN");
    }

    #[test]
    fn equality_across_types_is_false_not_an_error() {
        assert_eq!(
            infix(InfixOperator::Equal, &Object::Integer(1), &Object::Boolean(true)),
            Ok(Object::Boolean(false))
        );
        assert_eq!(
            infix(InfixOperator::NotEqual, &Object::Null, &Object::Null),
            Ok(Object::Boolean(false))
        );
        assert_eq!(
            infix(
                InfixOperator::Equal,
                &Object::String("a".into()),
                &Object::String("a".into())
            ),
            Ok(Object::Boolean(true))
        );
    }

    #[test]
    fn indexing_out_of_range_yields_null() {
        let array = Object::Array(vec![Object::Integer(1), Object::Integer(2)]);
        assert_eq!(index(&array, &Object::Integer(1)), Ok(Object::Integer(2)));
        assert_eq!(index(&array, &Object::Integer(2)), Ok(Object::Null));
        assert_eq!(index(&array, &Object::Integer(-1)), Ok(Object::Null));
        assert_eq!(
            index(&Object::Integer(1), &Object::Integer(0)),
            Err(RuntimeError::IndexNotSupported(crate::object::ObjectType::Integer))
        );
    }

    #[test]
    fn hashes_reject_unhashable_keys() {
        let hash = build_hash([(Object::String("one".into()), Object::Integer(1))])
            .expect("hashable keys");
        assert_eq!(index(&hash, &Object::String("one".into())), Ok(Object::Integer(1)));
        assert_eq!(index(&hash, &Object::String("two".into())), Ok(Object::Null));

        let error = index(&hash, &Object::Array(vec![])).expect_err("unhashable");
        assert_eq!(error.to_string(), "unusable as hash key: ARRAY");
    }
}
