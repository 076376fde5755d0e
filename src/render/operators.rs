use crate::{
    compile::Operator,
    locale::Locale,
    log::{Error, ErrorKind, INCOMPATIBLE_TYPES},
    pipe::display,
};
use serde_json::{json, Number, Value};
use std::cmp::Ordering;

/// Return true if the given [`Value`] is truthy.
///
/// False, null, zero, and empty strings, arrays and objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(bo) => *bo,
        Value::Number(nu) => nu.as_f64().map(|float| float != 0.0).unwrap_or(false),
        Value::String(st) => !st.is_empty(),
        Value::Array(ar) => !ar.is_empty(),
        Value::Object(ob) => !ob.is_empty(),
        Value::Null => false,
    }
}

/// Apply the [`Operator`] to the two [`Value`] instances.
///
/// `and` and `or` are not handled here, the renderer evaluates them so the
/// right side is skipped when possible.
///
/// # Errors
///
/// Returns an [`Error`] if the `Operator` cannot be applied to the types.
pub fn apply(
    left: &Value,
    operator: Operator,
    right: &Value,
    locale: &Locale,
) -> Result<Value, Error> {
    match operator {
        Operator::Add
        | Operator::Subtract
        | Operator::Multiply
        | Operator::Divide
        | Operator::Modulo => arithmetic(left, operator, right),
        Operator::Concat => Ok(json!(format!(
            "{}{}",
            display(left, locale),
            display(right, locale)
        ))),
        Operator::Equal => Ok(json!(is_equal(left, right))),
        Operator::NotEqual => Ok(json!(!is_equal(left, right))),
        Operator::Greater
        | Operator::Lesser
        | Operator::GreaterOrEqual
        | Operator::LesserOrEqual => {
            let ordering = order(left, operator, right)?;
            Ok(json!(match operator {
                Operator::Greater => ordering == Ordering::Greater,
                Operator::Lesser => ordering == Ordering::Less,
                Operator::GreaterOrEqual => ordering != Ordering::Less,
                _ => ordering != Ordering::Greater,
            }))
        }
        Operator::And => Ok(json!(is_truthy(left) && is_truthy(right))),
        Operator::Or => Ok(json!(is_truthy(left) || is_truthy(right))),
    }
}

/// Negate a number.
pub fn negate(value: &Value) -> Result<Value, Error> {
    let Value::Number(number) = value else {
        return Err(incompatible(format!("operator `-` is invalid on `{value}`")));
    };

    if let Some(negated) = number.as_i64().and_then(i64::checked_neg) {
        return Ok(json!(negated));
    }

    float(number.as_f64().map(|float| -float))
}

/// Return true if the two values are equal, comparing numbers by value
/// so `1 == 1.0`.
fn is_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            match (left.as_i64(), right.as_i64()) {
                (Some(left), Some(right)) => left == right,
                _ => left.as_f64() == right.as_f64(),
            }
        }
        (left, right) => left == right,
    }
}

/// Order two numbers or two strings.
fn order(left: &Value, operator: Operator, right: &Value) -> Result<Ordering, Error> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
                return Ok(left.cmp(&right));
            }

            left.as_f64()
                .zip(right.as_f64())
                .and_then(|(left, right)| left.partial_cmp(&right))
                .ok_or_else(|| incompatible("numbers cannot be ordered"))
        }
        (Value::String(left), Value::String(right)) => Ok(left.cmp(right)),
        (left, right) => Err(incompatible(format!(
            "operator `{operator}` cannot compare `{left}` and `{right}`"
        ))
        .with_help("only numbers or strings can be ordered")),
    }
}

/// Add, subtract, multiply, divide or take the remainder of two values.
///
/// Integer arithmetic is used when both sides are integers and the result
/// fits, floating point otherwise. `+` also joins strings and arrays.
fn arithmetic(left: &Value, operator: Operator, right: &Value) -> Result<Value, Error> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => numeric(left, operator, right),
        (Value::String(left), Value::String(right)) if operator == Operator::Add => {
            Ok(json!(format!("{left}{right}")))
        }
        (Value::Array(left), Value::Array(right)) if operator == Operator::Add => {
            Ok(Value::Array(left.iter().chain(right).cloned().collect()))
        }
        (left, right) => Err(incompatible(format!(
            "operator `{operator}` is invalid on `{left}` and `{right}`"
        ))),
    }
}

fn numeric(left: &Number, operator: Operator, right: &Number) -> Result<Value, Error> {
    let is_zero = right.as_f64().map(|float| float == 0.0).unwrap_or(false);
    if is_zero && matches!(operator, Operator::Divide | Operator::Modulo) {
        return Err(Error::new(ErrorKind::Type, "division by zero")
            .with_help(format!("right side of `{operator}` must not be zero")));
    }

    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        let result = match operator {
            Operator::Add => left.checked_add(right),
            Operator::Subtract => left.checked_sub(right),
            Operator::Multiply => left.checked_mul(right),
            Operator::Divide if left.checked_rem(right) == Some(0) => left.checked_div(right),
            Operator::Modulo => left.checked_rem(right),
            _ => None,
        };
        if let Some(result) = result {
            return Ok(json!(result));
        }
    }

    let (Some(left), Some(right)) = (left.as_f64(), right.as_f64()) else {
        return Err(incompatible("number is out of range"));
    };

    float(match operator {
        Operator::Add => Some(left + right),
        Operator::Subtract => Some(left - right),
        Operator::Multiply => Some(left * right),
        Operator::Divide => Some(left / right),
        _ => Some(left % right),
    })
}

/// Convert a float to a [`Value`], which fails for infinity and NaN.
fn float(value: Option<f64>) -> Result<Value, Error> {
    value
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| incompatible("result is not a finite number"))
}

fn incompatible<T>(help: T) -> Error
where
    T: Into<String>,
{
    Error::new(ErrorKind::Type, INCOMPATIBLE_TYPES).with_help(help)
}
