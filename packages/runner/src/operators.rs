//! Operator semantics.
//!
//! These don't know which line they're on, so they return a bare
//! [`ErrorKind`] and the runner attaches the line.
use std::{cmp::Ordering, iter};

use crate::{
    error::ErrorKind,
    syntax_tree::{BinaryOp, CompareOp},
    value::Value,
};

pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ErrorKind> {
    match (op, lhs, rhs) {
        (BinaryOp::Add, Value::Str(lhs), Value::Str(rhs)) => {
            Ok(Value::string(format!("{lhs}{rhs}")))
        }
        (BinaryOp::Add, Value::Str(_), rhs) => Err(ErrorKind::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            rhs.type_name()
        ))),
        (BinaryOp::Add, Value::List(lhs), Value::List(rhs)) => {
            let items: Vec<_> = lhs.borrow().iter().chain(rhs.borrow().iter()).cloned().collect();
            Ok(Value::list(items))
        }
        (BinaryOp::Add, Value::List(_), rhs) => Err(ErrorKind::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            rhs.type_name()
        ))),
        (BinaryOp::Mul, Value::Str(text), count) | (BinaryOp::Mul, count, Value::Str(text))
            if count.as_int().is_some() =>
        {
            let count = repeat_count(count, text.len())?;
            Ok(Value::string(text.repeat(count)))
        }
        (BinaryOp::Mul, Value::List(items), count) | (BinaryOp::Mul, count, Value::List(items))
            if count.as_int().is_some() =>
        {
            let items = items.borrow();
            let count = repeat_count(count, items.len())?;
            let repeated: Vec<_> = iter::repeat(items.iter())
                .take(count)
                .flatten()
                .cloned()
                .collect();
            Ok(Value::list(repeated))
        }
        _ => match (lhs.as_int(), rhs.as_int()) {
            (Some(lhs), Some(rhs)) => integer(op, lhs, rhs).map(Value::Int),
            _ => Err(ErrorKind::type_error(format!(
                "unsupported operand type(s) for {op}: '{}' and '{}'",
                lhs.type_name(),
                rhs.type_name()
            ))),
        },
    }
}

pub fn negate(operand: &Value) -> Result<Value, ErrorKind> {
    match operand.as_int() {
        Some(value) => value
            .checked_neg()
            .map(Value::Int)
            .ok_or(ErrorKind::Overflow),
        None => Err(ErrorKind::type_error(format!(
            "bad operand type for unary -: '{}'",
            operand.type_name()
        ))),
    }
}

pub fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, ErrorKind> {
    match op {
        CompareOp::Eq => Ok(lhs.equals(rhs)),
        CompareOp::NotEq => Ok(!lhs.equals(rhs)),
        CompareOp::Is => Ok(lhs.is(rhs)),
        CompareOp::IsNot => Ok(!lhs.is(rhs)),
        CompareOp::In => contains(rhs, lhs),
        CompareOp::NotIn => contains(rhs, lhs).map(|found| !found),
        CompareOp::Lt => order(op, lhs, rhs).map(Ordering::is_lt),
        CompareOp::LtE => order(op, lhs, rhs).map(Ordering::is_le),
        CompareOp::Gt => order(op, lhs, rhs).map(Ordering::is_gt),
        CompareOp::GtE => order(op, lhs, rhs).map(Ordering::is_ge),
    }
}

fn integer(op: BinaryOp, lhs: i64, rhs: i64) -> Result<i64, ErrorKind> {
    let result = match op {
        BinaryOp::Add => lhs.checked_add(rhs),
        BinaryOp::Sub => lhs.checked_sub(rhs),
        BinaryOp::Mul => lhs.checked_mul(rhs),
        BinaryOp::FloorDiv => {
            if rhs == 0 {
                return Err(ErrorKind::ZeroDivision);
            }

            lhs.checked_div(rhs).map(|quotient| {
                if lhs % rhs != 0 && (lhs < 0) != (rhs < 0) {
                    quotient - 1
                } else {
                    quotient
                }
            })
        }
        BinaryOp::Mod => {
            if rhs == 0 {
                return Err(ErrorKind::ZeroDivision);
            }

            lhs.checked_rem(rhs).map(|remainder| {
                if remainder != 0 && (remainder < 0) != (rhs < 0) {
                    remainder + rhs
                } else {
                    remainder
                }
            })
        }
    };

    result.ok_or(ErrorKind::Overflow)
}

/// Longest string (in bytes) or list that repetition will build.
const MAX_REPEAT_LEN: usize = 1 << 24;

/// How many times to repeat a sequence of `len` items. Negative counts
/// repeat zero times.
fn repeat_count(count: &Value, len: usize) -> Result<usize, ErrorKind> {
    let count = count.as_int().unwrap_or(0).max(0);
    let count = usize::try_from(count).map_err(|_| ErrorKind::Overflow)?;

    if len == 0 {
        return Ok(0);
    }

    match len.checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(count),
        _ => Err(ErrorKind::Overflow),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, ErrorKind> {
    match (container, item) {
        (Value::Str(text), Value::Str(part)) => Ok(text.contains(&**part)),
        (Value::Str(_), item) => Err(ErrorKind::type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            item.type_name()
        ))),
        (Value::List(items), item) => Ok(items.borrow().iter().any(|x| x.equals(item))),
        (container, _) => Err(ErrorKind::type_error(format!(
            "argument of type '{}' is not iterable",
            container.type_name()
        ))),
    }
}

fn order(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<Ordering, ErrorKind> {
    if let (Value::Str(lhs), Value::Str(rhs)) = (lhs, rhs) {
        return Ok((**lhs).cmp(&**rhs));
    }

    match (lhs.as_int(), rhs.as_int()) {
        (Some(lhs), Some(rhs)) => Ok(lhs.cmp(&rhs)),
        _ => Err(ErrorKind::type_error(format!(
            "'{op}' not supported between instances of '{}' and '{}'",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{binary, compare, negate};
    use crate::{
        error::ErrorKind,
        syntax_tree::{BinaryOp, CompareOp},
        value::Value,
    };

    #[test]
    fn int_plus_str() {
        let error = binary(BinaryOp::Add, &Value::Int(0), &Value::string("paramA")).unwrap_err();

        assert_eq!(
            error,
            ErrorKind::Type("unsupported operand type(s) for +: 'int' and 'str'".to_owned())
        );
    }

    #[test]
    fn str_plus_int() {
        let error = binary(BinaryOp::Add, &Value::string("a"), &Value::Int(1)).unwrap_err();

        assert_eq!(
            error.message(),
            "can only concatenate str (not \"int\") to str"
        );
    }

    #[test]
    fn floor_division_and_modulo() {
        let int = |op, lhs, rhs| {
            binary(op, &Value::Int(lhs), &Value::Int(rhs))
                .ok()
                .and_then(|v| v.as_int())
        };

        assert_eq!(int(BinaryOp::FloorDiv, 7, 2), Some(3));
        assert_eq!(int(BinaryOp::FloorDiv, -7, 2), Some(-4));
        assert_eq!(int(BinaryOp::Mod, -7, 2), Some(1));
        assert_eq!(int(BinaryOp::Mod, 7, -2), Some(-1));
        assert_eq!(
            binary(BinaryOp::Mod, &Value::Int(1), &Value::Int(0)).unwrap_err(),
            ErrorKind::ZeroDivision
        );
    }

    #[test]
    fn overflow() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).unwrap_err(),
            ErrorKind::Overflow
        );
        assert_eq!(negate(&Value::Int(i64::MIN)).unwrap_err(), ErrorKind::Overflow);
    }

    #[test]
    fn repetition() {
        let Ok(Value::Str(text)) = binary(BinaryOp::Mul, &Value::Int(3), &Value::string("ab"))
        else {
            panic!("Expected a string");
        };
        assert_eq!(&*text, "ababab");

        let repeated = binary(BinaryOp::Mul, &Value::list([Value::Int(1)]), &Value::Int(2)).unwrap();
        assert!(repeated.equals(&Value::list([Value::Int(1), Value::Int(1)])));

        let negative = binary(BinaryOp::Mul, &Value::string("ab"), &Value::Int(-1)).unwrap();
        assert!(negative.equals(&Value::string("")));
    }

    #[test]
    fn repetition_too_long() {
        for sequence in [Value::string("ab"), Value::list([Value::Int(1)])] {
            assert_eq!(
                binary(BinaryOp::Mul, &sequence, &Value::Int(i64::MAX)).unwrap_err(),
                ErrorKind::Overflow
            );
            assert_eq!(
                binary(BinaryOp::Mul, &Value::Int(1 << 40), &sequence).unwrap_err(),
                ErrorKind::Overflow
            );
        }
    }

    #[test]
    fn empty_repetition() {
        let repeated = binary(BinaryOp::Mul, &Value::list(Vec::new()), &Value::Int(i64::MAX)).unwrap();
        assert!(repeated.equals(&Value::list(Vec::new())));

        let repeated = binary(BinaryOp::Mul, &Value::string(""), &Value::Int(i64::MAX)).unwrap();
        assert!(repeated.equals(&Value::string("")));
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            compare(CompareOp::Lt, &Value::Int(1), &Value::Int(2)),
            Ok(true)
        );
        assert_eq!(
            compare(CompareOp::GtE, &Value::string("b"), &Value::string("a")),
            Ok(true)
        );
        assert_eq!(
            compare(
                CompareOp::In,
                &Value::Int(2),
                &Value::list([Value::Int(1), Value::Int(2)])
            ),
            Ok(true)
        );
        assert_eq!(
            compare(CompareOp::NotIn, &Value::string("z"), &Value::string("abc")),
            Ok(true)
        );
        assert_eq!(
            compare(CompareOp::Lt, &Value::Int(1), &Value::string("a"))
                .unwrap_err()
                .message(),
            "'<' not supported between instances of 'int' and 'str'"
        );
    }
}
