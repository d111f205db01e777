//! Expression evaluation.
//!
//! Every evaluation gets its own [`Scope`]; compiled expressions hold no
//! mutable state, so one script can run on many threads at once.
//!
//! Nulls propagate through arithmetic and comparisons. `&&` and `||` use
//! three-valued logic. `==` and `!=` treat two nulls as equal.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use vtab_model::{Datum, Value, ValueSet, ValueTable, ValueType};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::library;

/// Per-call evaluation context.
pub(crate) struct Scope<'a> {
    pub value_set: &'a ValueSet,
    pub table: &'a dyn ValueTable,
    pub now: DateTime<Utc>,
}

type EvalResult = Result<Value, String>;

pub(crate) fn evaluate(expr: &Expr, scope: &Scope<'_>) -> EvalResult {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => scope
            .table
            .value(scope.value_set, name)
            .map_err(|err| err.to_string()),
        Expr::Unary { op, operand } => unary(*op, evaluate(operand, scope)?),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And | BinaryOp::Or => logical(*op, left, right, scope),
            _ => binary(*op, evaluate(left, scope)?, evaluate(right, scope)?),
        },
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            let condition = evaluate(condition, scope)?;
            if truthy(&condition)? {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            library::call(function, args, scope.now)
        }
    }
}

/// Boolean test for conditions; null counts as false.
fn truthy(value: &Value) -> Result<bool, String> {
    if value.value_type() != ValueType::Boolean {
        return Err(format!("expected a boolean, got {}", value.value_type()));
    }
    Ok(value.as_boolean().unwrap_or(false))
}

fn as_logical(value: &Value) -> Result<Option<bool>, String> {
    if value.value_type() != ValueType::Boolean || value.is_sequence() {
        return Err(format!("expected a boolean, got {}", value.value_type()));
    }
    Ok(value.as_boolean())
}

fn logical(op: BinaryOp, left: &Expr, right: &Expr, scope: &Scope<'_>) -> EvalResult {
    let short_circuit = op == BinaryOp::Or;
    let left = as_logical(&evaluate(left, scope)?)?;
    if left == Some(short_circuit) {
        return Ok(Value::boolean(short_circuit));
    }
    let right = as_logical(&evaluate(right, scope)?)?;
    let result = match (left, right) {
        (_, Some(value)) if value == short_circuit => Some(short_circuit),
        (Some(_), Some(_)) => Some(!short_circuit),
        _ => None,
    };
    Ok(result.map_or_else(|| ValueType::Boolean.null_value(), Value::boolean))
}

fn unary(op: UnaryOp, operand: Value) -> EvalResult {
    match op {
        UnaryOp::Not => Ok(as_logical(&operand)?
            .map_or_else(|| ValueType::Boolean.null_value(), |flag| Value::boolean(!flag))),
        UnaryOp::Negate if operand.is_null() && operand.value_type().is_numeric() => Ok(operand),
        UnaryOp::Negate => match operand.datum() {
            Some(Datum::Integer(number)) => number
                .checked_neg()
                .map(Value::integer)
                .ok_or_else(|| "integer overflow".to_string()),
            Some(Datum::Decimal(number)) => Ok(Value::decimal(-number)),
            _ => Err(format!("cannot negate {} value", operand.value_type())),
        },
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> EvalResult {
    match op {
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let equal = if left.is_null() || right.is_null() {
                left.is_null() && right.is_null()
            } else {
                compare(&left, &right)? == Ordering::Equal
            };
            Ok(Value::boolean(equal == (op == BinaryOp::Equal)))
        }
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            if left.is_null() || right.is_null() {
                return Ok(ValueType::Boolean.null_value());
            }
            let ordering = compare(&left, &right)?;
            let result = match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::boolean(result))
        }
        BinaryOp::Add if is_text(&left) || is_text(&right) => {
            if left.is_null() || right.is_null() {
                return Ok(ValueType::Text.null_value());
            }
            Ok(Value::text(format!("{left}{right}")))
        }
        BinaryOp::Add | BinaryOp::Subtract if left.value_type() == ValueType::Date => {
            date_arithmetic(op, &left, &right)
        }
        _ => arithmetic(op, &left, &right),
    }
}

fn is_text(value: &Value) -> bool {
    value.value_type() == ValueType::Text
}

/// Ordering with numeric and date widening.
fn compare(left: &Value, right: &Value) -> Result<Ordering, String> {
    let (left_type, right_type) = (left.value_type(), right.value_type());
    if left_type != right_type {
        if left_type.is_numeric() && right_type.is_numeric() {
            if let (Some(a), Some(b)) = (left.as_decimal(), right.as_decimal()) {
                return Ok(a.total_cmp(&b));
            }
        }
        if left_type.is_date_time() && right_type.is_date_time() {
            if let (Some(a), Some(b)) = (left.as_date_time(), right.as_date_time()) {
                return Ok(a.cmp(&b));
            }
        }
    }
    left.compare(right).map_err(|err| err.to_string())
}

fn date_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    let symbol = op.symbol();
    match (op, right.value_type()) {
        (_, ValueType::Integer) => {
            let (Some(date), Some(days)) = (left.as_date(), right.as_integer()) else {
                return Ok(ValueType::Date.null_value());
            };
            let days = if op == BinaryOp::Add {
                Some(days)
            } else {
                days.checked_neg()
            };
            days.and_then(Duration::try_days)
                .and_then(|delta| date.checked_add_signed(delta))
                .map(Value::date)
                .ok_or_else(|| "date out of range".to_string())
        }
        (BinaryOp::Subtract, ValueType::Date) => {
            let (Some(a), Some(b)) = (left.as_date(), right.as_date()) else {
                return Ok(ValueType::Integer.null_value());
            };
            Ok(Value::integer((a - b).num_days()))
        }
        (_, other) => Err(format!("cannot apply '{symbol}' to date and {other}")),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    let symbol = op.symbol();
    let (left_type, right_type) = (left.value_type(), right.value_type());
    if !left_type.is_numeric() || !right_type.is_numeric() {
        return Err(format!(
            "cannot apply '{symbol}' to {left_type} and {right_type}"
        ));
    }
    let integral = left_type == ValueType::Integer
        && right_type == ValueType::Integer
        && op != BinaryOp::Divide;
    if left.is_null() || right.is_null() {
        let result_type = if integral {
            ValueType::Integer
        } else {
            ValueType::Decimal
        };
        return Ok(result_type.null_value());
    }

    if integral {
        let (Some(a), Some(b)) = (left.as_integer(), right.as_integer()) else {
            return Err(format!("cannot apply '{symbol}' to sequences"));
        };
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Subtract => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Remainder if b == 0 => return Err("division by zero".to_string()),
            BinaryOp::Remainder => a.checked_rem(b),
            _ => return Err(format!("'{symbol}' is not arithmetic")),
        };
        return result
            .map(Value::integer)
            .ok_or_else(|| "integer overflow".to_string());
    }

    let (Some(a), Some(b)) = (left.as_decimal(), right.as_decimal()) else {
        return Err(format!("cannot apply '{symbol}' to sequences"));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide | BinaryOp::Remainder if b == 0.0 => {
            return Err("division by zero".to_string());
        }
        BinaryOp::Divide => a / b,
        BinaryOp::Remainder => a % b,
        _ => return Err(format!("'{symbol}' is not arithmetic")),
    };
    Ok(Value::decimal(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(left: Value, op: BinaryOp, right: Value) -> EvalResult {
        binary(op, left, right)
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        let value = eval(Value::integer(7), BinaryOp::Remainder, Value::integer(3)).expect("rem");
        assert_eq!(value.as_integer(), Some(1));
        let value = eval(Value::integer(7), BinaryOp::Divide, Value::integer(2)).expect("div");
        assert_eq!(value.as_decimal(), Some(3.5));
        assert_eq!(value.value_type(), ValueType::Decimal);
    }

    #[test]
    fn mixed_arithmetic_widens() {
        let value = eval(Value::integer(1), BinaryOp::Add, Value::decimal(0.5)).expect("add");
        assert_eq!(value.as_decimal(), Some(1.5));
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(eval(Value::integer(1), BinaryOp::Divide, Value::integer(0)).is_err());
        assert!(eval(Value::integer(1), BinaryOp::Remainder, Value::integer(0)).is_err());
    }

    #[test]
    fn overflow_fails() {
        assert!(eval(Value::integer(i64::MAX), BinaryOp::Add, Value::integer(1)).is_err());
    }

    #[test]
    fn nulls_propagate_and_compare_equal() {
        let null = ValueType::Integer.null_value();
        assert!(eval(null.clone(), BinaryOp::Add, Value::integer(1)).expect("add").is_null());
        assert!(eval(null.clone(), BinaryOp::Less, Value::integer(1)).expect("lt").is_null());
        let equal = eval(null.clone(), BinaryOp::Equal, ValueType::Text.null_value()).expect("eq");
        assert_eq!(equal.as_boolean(), Some(true));
        let equal = eval(null, BinaryOp::Equal, Value::integer(1)).expect("eq");
        assert_eq!(equal.as_boolean(), Some(false));
    }

    #[test]
    fn text_concatenates() {
        let value = eval(Value::text("S-"), BinaryOp::Add, Value::integer(12)).expect("add");
        assert_eq!(value.as_text(), Some("S-12"));
    }

    #[test]
    fn dates_shift_by_days() {
        let date = ValueType::Date.value_of("2024-02-28").expect("date");
        let shifted = eval(date.clone(), BinaryOp::Add, Value::integer(2)).expect("add");
        assert_eq!(shifted.to_text().as_deref(), Some("2024-03-01"));
        let diff = eval(shifted, BinaryOp::Subtract, date).expect("sub");
        assert_eq!(diff.as_integer(), Some(2));
    }

    #[test]
    fn comparing_text_with_number_fails() {
        assert!(eval(Value::text("1"), BinaryOp::Less, Value::integer(2)).is_err());
    }

    #[test]
    fn three_valued_not() {
        assert!(unary(UnaryOp::Not, ValueType::Boolean.null_value()).expect("not").is_null());
        assert!(unary(UnaryOp::Not, Value::integer(1)).is_err());
    }
}
