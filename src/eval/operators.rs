//! Operator semantics shared by the expression resolver.
//!
//! Coercions follow the JavaScript operator table, restricted to the value
//! kinds a template can produce. Lists, maps and callables never coerce to
//! numbers; using them with an arithmetic or relational operator is a type
//! mismatch instead of a silent `NaN`.

use std::cmp::Ordering;

use super::value::Value;
use crate::ast::{BinaryOperator, LogicalOperator, UnaryOperator};
use crate::error::ErrorKind;

pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match op {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Subtract => numeric(left, right, op, |l, r| l - r),
        BinaryOperator::Multiply => numeric(left, right, op, |l, r| l * r),
        BinaryOperator::Divide => numeric(left, right, op, |l, r| l / r),
        BinaryOperator::Remainder => numeric(left, right, op, |l, r| l % r),
        BinaryOperator::Exponent => numeric(left, right, op, f64::powf),
        BinaryOperator::Equal => Ok(Value::Boolean(loose_equals(left, right))),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!loose_equals(left, right))),
        BinaryOperator::StrictEqual => Ok(Value::Boolean(left == right)),
        BinaryOperator::StrictNotEqual => Ok(Value::Boolean(left != right)),
        BinaryOperator::LessThan => compare_values(left, right, op, Ordering::is_lt),
        BinaryOperator::LessThanEqual => compare_values(left, right, op, Ordering::is_le),
        BinaryOperator::GreaterThan => compare_values(left, right, op, Ordering::is_gt),
        BinaryOperator::GreaterThanEqual => compare_values(left, right, op, Ordering::is_ge),
        BinaryOperator::ShiftLeft => int32(left, right, op, |l, r| l.wrapping_shl(r)),
        BinaryOperator::ShiftRight => int32(left, right, op, |l, r| l.wrapping_shr(r)),
        BinaryOperator::UnsignedShiftRight => {
            let l = to_uint32(operand(left, op)?);
            let r = to_uint32(operand(right, op)?) & 31;
            Ok(Value::Number((l >> r) as f64))
        }
        BinaryOperator::BitAnd => int32(left, right, op, |l, r| l & r as i32),
        BinaryOperator::BitOr => int32(left, right, op, |l, r| l | r as i32),
        BinaryOperator::BitXor => int32(left, right, op, |l, r| l ^ r as i32),
        BinaryOperator::In => contains_key(left, right),
        BinaryOperator::InstanceOf => Err(ErrorKind::InvalidOperator(op.to_string())),
    }
}

pub fn unary(op: UnaryOperator, value: &Value) -> Result<Value, ErrorKind> {
    match op {
        UnaryOperator::Minus => Ok(Value::Number(-unary_operand(value, op)?)),
        UnaryOperator::Plus => Ok(Value::Number(unary_operand(value, op)?)),
        UnaryOperator::Not => Ok(Value::Boolean(!value.is_truthy())),
        UnaryOperator::BitNot => Ok(Value::Number(!to_int32(unary_operand(value, op)?) as f64)),
        UnaryOperator::TypeOf => Ok(Value::from(value.type_of())),
        UnaryOperator::Void => Ok(Value::Null),
        UnaryOperator::Delete => Err(ErrorKind::InvalidOperator(op.to_string())),
    }
}

/// Whether a logical operator returns its left operand without looking at the right one.
pub fn short_circuits(op: LogicalOperator, left: &Value) -> bool {
    match op {
        LogicalOperator::And => !left.is_truthy(),
        LogicalOperator::Or => left.is_truthy(),
        LogicalOperator::NullishCoalescing => !left.is_null(),
    }
}

/// `==`: strict equality plus number/string/boolean cross-coercion.
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (
            Value::Number(_) | Value::String(_) | Value::Boolean(_),
            Value::Number(_) | Value::String(_) | Value::Boolean(_),
        ) if std::mem::discriminant(left) != std::mem::discriminant(right) => {
            match (left.to_number(), right.to_number()) {
                (Ok(l), Ok(r)) => l == r,
                _ => false,
            }
        }
        _ => left == right,
    }
}

/// Reads `object[key]`. Missing keys and out-of-range indexes yield null.
pub fn get_member(object: &Value, key: &Value) -> Result<Value, ErrorKind> {
    match object {
        Value::Null => Err(ErrorKind::PropertyOfNull(key.to_key())),
        Value::Map(map) => Ok(map.get(&key.to_key()).cloned().unwrap_or_default()),
        Value::List(items) => {
            if is_length(key) {
                return Ok(Value::Number(items.len() as f64));
            }
            Ok(as_index(key)
                .and_then(|index| items.get(index))
                .cloned()
                .unwrap_or_default())
        }
        Value::String(s) => {
            if is_length(key) {
                return Ok(Value::Number(s.chars().count() as f64));
            }
            Ok(as_index(key)
                .and_then(|index| s.chars().nth(index))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default())
        }
        Value::Boolean(_) | Value::Number(_) | Value::Function(_) => Ok(Value::Null),
    }
}

/// Mutable access to an existing `container[key]`, used to walk assignment paths.
pub fn member_mut<'a>(container: &'a mut Value, key: &Value) -> Result<&'a mut Value, ErrorKind> {
    let missing = || ErrorKind::PropertyOfNull(key.to_key());
    match container {
        Value::Map(map) => map.get_mut(&key.to_key()).ok_or_else(missing),
        Value::List(items) => as_index(key)
            .and_then(|index| items.get_mut(index))
            .ok_or_else(missing),
        Value::Null => Err(missing()),
        other => Err(ErrorKind::TypeMismatch(format!(
            "cannot read property '{}' of {} for assignment",
            key.to_key(),
            other.type_name()
        ))),
    }
}

/// Writes `container[key] = value`. Writing past the end of a list pads it with null.
pub fn set_member(container: &mut Value, key: &Value, value: Value) -> Result<(), ErrorKind> {
    match container {
        Value::Map(map) => {
            map.insert(key.to_key(), value);
            Ok(())
        }
        Value::List(items) => {
            let index = as_index(key).ok_or_else(|| {
                ErrorKind::TypeMismatch(format!("invalid list index '{}'", key.to_key()))
            })?;
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items[index] = value;
            Ok(())
        }
        Value::Null => Err(ErrorKind::PropertyOfNull(key.to_key())),
        other => Err(ErrorKind::TypeMismatch(format!(
            "cannot set property '{}' on {}",
            key.to_key(),
            other.type_name()
        ))),
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Function(_), _) | (_, Value::Function(_)) => Err(ErrorKind::TypeMismatch(
            format!("{} + {}", left.type_name(), right.type_name()),
        )),
        (Value::String(_) | Value::List(_) | Value::Map(_), _)
        | (_, Value::String(_) | Value::List(_) | Value::Map(_)) => {
            Ok(Value::String(format!("{}{}", left, right)))
        }
        _ => Ok(Value::Number(left.to_number()? + right.to_number()?)),
    }
}

fn operand(value: &Value, op: BinaryOperator) -> Result<f64, ErrorKind> {
    value.to_number().map_err(|_| {
        ErrorKind::TypeMismatch(format!("operator {} cannot be applied to {}", op, value.type_name()))
    })
}

fn unary_operand(value: &Value, op: UnaryOperator) -> Result<f64, ErrorKind> {
    value.to_number().map_err(|_| {
        ErrorKind::TypeMismatch(format!("operator {} cannot be applied to {}", op, value.type_name()))
    })
}

fn numeric<F>(left: &Value, right: &Value, op: BinaryOperator, f: F) -> Result<Value, ErrorKind>
where
    F: Fn(f64, f64) -> f64,
{
    Ok(Value::Number(f(operand(left, op)?, operand(right, op)?)))
}

fn int32<F>(left: &Value, right: &Value, op: BinaryOperator, f: F) -> Result<Value, ErrorKind>
where
    F: Fn(i32, u32) -> i32,
{
    let l = to_int32(operand(left, op)?);
    let r = to_uint32(operand(right, op)?);
    Ok(Value::Number(f(l, r) as f64))
}

fn compare_values<F>(left: &Value, right: &Value, op: BinaryOperator, compare: F) -> Result<Value, ErrorKind>
where
    F: Fn(Ordering) -> bool,
{
    if let (Value::String(l), Value::String(r)) = (left, right) {
        return Ok(Value::Boolean(compare(l.cmp(r))));
    }
    let l = operand(left, op)?;
    let r = operand(right, op)?;
    Ok(Value::Boolean(l.partial_cmp(&r).map(compare).unwrap_or(false)))
}

fn contains_key(key: &Value, object: &Value) -> Result<Value, ErrorKind> {
    match object {
        Value::Map(map) => Ok(Value::Boolean(map.contains_key(&key.to_key()))),
        Value::List(items) => Ok(Value::Boolean(
            is_length(key) || as_index(key).is_some_and(|index| index < items.len()),
        )),
        other => Err(ErrorKind::TypeMismatch(format!(
            "cannot use 'in' to search for '{}' in {}",
            key.to_key(),
            other.type_name()
        ))),
    }
}

fn is_length(key: &Value) -> bool {
    matches!(key, Value::String(s) if s == "length")
}

fn as_index(key: &Value) -> Option<usize> {
    let n = match key {
        Value::Number(n) => *n,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    (n >= 0.0 && n.fract() == 0.0 && n < usize::MAX as f64).then_some(n as usize)
}

fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}
