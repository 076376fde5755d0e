use crate::{locale::Locale, log::Error, pipe::display};
use serde_json::{json, Number, Value};

/// Signature shared by every built-in function.
type Builtin = fn(&[Value]) -> Result<Value, Error>;

/// Largest amount of items `range` will produce.
const RANGE_LIMIT: i64 = 100_000;

/// Return every built-in function along with its name.
pub(super) fn all() -> Vec<(&'static str, Builtin)> {
    vec![
        ("lower", lower as Builtin),
        ("upper", upper as Builtin),
        ("capitalize", capitalize as Builtin),
        ("trim", trim as Builtin),
        ("length", length as Builtin),
        ("join", join as Builtin),
        ("first", first as Builtin),
        ("last", last as Builtin),
        ("default", default as Builtin),
        ("abs", abs as Builtin),
        ("range", range as Builtin),
    ]
}

/// Return an [`Error`] unless the amount of arguments is within the bounds.
fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), Error> {
    let len = args.len();
    if len < min || len > max {
        let expected = if min == max {
            format!("`{min}`")
        } else {
            format!("`{min}` to `{max}`")
        };

        return Err(Error::build(format!(
            "function `{name}` expects {expected} arguments, received `{len}`"
        )));
    }

    Ok(())
}

/// Return the single string argument of the named function.
fn string_input<'a>(name: &str, args: &'a [Value]) -> Result<&'a str, Error> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::String(string) => Ok(string),
        other => Err(Error::build(format!(
            "function `{name}` requires string input, received `{other}`"
        ))
        .with_help("use quotes to coerce data to string")),
    }
}

/// Return an integer argument of the named function.
fn integer(name: &str, value: &Value) -> Result<i64, Error> {
    value.as_i64().ok_or_else(|| {
        Error::build(format!(
            "function `{name}` expects an integer argument, received `{value}`"
        ))
    })
}

fn lower(args: &[Value]) -> Result<Value, Error> {
    Ok(json!(string_input("lower", args)?.to_lowercase()))
}

fn upper(args: &[Value]) -> Result<Value, Error> {
    Ok(json!(string_input("upper", args)?.to_uppercase()))
}

/// Uppercase the first character and lowercase the rest.
fn capitalize(args: &[Value]) -> Result<Value, Error> {
    let string = string_input("capitalize", args)?;
    let mut chars = string.chars();
    let capitalized = match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect::<String>(),
        None => String::new(),
    };

    Ok(json!(capitalized))
}

fn trim(args: &[Value]) -> Result<Value, Error> {
    Ok(json!(string_input("trim", args)?.trim()))
}

/// Return the amount of characters in a string or items in a collection.
fn length(args: &[Value]) -> Result<Value, Error> {
    arity("length", args, 1, 1)?;
    let len = match &args[0] {
        Value::String(string) => string.chars().count(),
        Value::Array(array) => array.len(),
        Value::Object(object) => object.len(),
        other => {
            return Err(Error::build(format!(
                "function `length` requires a string, array or object, received `{other}`"
            )))
        }
    };

    Ok(json!(len))
}

/// Join the items of an array with an optional separator.
fn join(args: &[Value]) -> Result<Value, Error> {
    arity("join", args, 1, 2)?;
    let separator = match args.get(1) {
        Some(Value::String(separator)) => separator.as_str(),
        Some(other) => {
            return Err(Error::build(format!(
                "function `join` expects a string separator, received `{other}`"
            )))
        }
        None => "",
    };

    match &args[0] {
        Value::Array(array) => {
            let locale = Locale::default();
            let joined = array
                .iter()
                .map(|item| display(item, &locale))
                .collect::<Vec<_>>()
                .join(separator);

            Ok(json!(joined))
        }
        other => Err(Error::build(format!(
            "function `join` requires array input, received `{other}`"
        ))),
    }
}

/// Return the first item of an array or first character of a string.
fn first(args: &[Value]) -> Result<Value, Error> {
    arity("first", args, 1, 1)?;
    match &args[0] {
        Value::Array(array) => Ok(array.first().cloned().unwrap_or(Value::Null)),
        Value::String(string) => Ok(string
            .chars()
            .next()
            .map(|c| json!(c.to_string()))
            .unwrap_or(Value::Null)),
        other => Err(Error::build(format!(
            "function `first` requires an array or string, received `{other}`"
        ))),
    }
}

/// Return the last item of an array or last character of a string.
fn last(args: &[Value]) -> Result<Value, Error> {
    arity("last", args, 1, 1)?;
    match &args[0] {
        Value::Array(array) => Ok(array.last().cloned().unwrap_or(Value::Null)),
        Value::String(string) => Ok(string
            .chars()
            .next_back()
            .map(|c| json!(c.to_string()))
            .unwrap_or(Value::Null)),
        other => Err(Error::build(format!(
            "function `last` requires an array or string, received `{other}`"
        ))),
    }
}

/// Return the fallback when the input is null or an empty string.
fn default(args: &[Value]) -> Result<Value, Error> {
    arity("default", args, 2, 2)?;
    match &args[0] {
        Value::Null => Ok(args[1].clone()),
        Value::String(string) if string.is_empty() => Ok(args[1].clone()),
        value => Ok(value.clone()),
    }
}

fn abs(args: &[Value]) -> Result<Value, Error> {
    arity("abs", args, 1, 1)?;
    let Value::Number(number) = &args[0] else {
        return Err(Error::build(format!(
            "function `abs` requires number input, received `{}`",
            args[0]
        )));
    };

    if number.is_u64() {
        return Ok(Value::Number(number.clone()));
    }
    if let Some(absolute) = number.as_i64().and_then(i64::checked_abs) {
        return Ok(json!(absolute));
    }

    Ok(number
        .as_f64()
        .and_then(|float| Number::from_f64(float.abs()))
        .map(Value::Number)
        .unwrap_or(Value::Null))
}

/// Return the integers from `start` (default 0) up to, but not including, `end`.
fn range(args: &[Value]) -> Result<Value, Error> {
    arity("range", args, 1, 2)?;
    let (start, end) = match args {
        [end] => (0, integer("range", end)?),
        [start, end] => (integer("range", start)?, integer("range", end)?),
        _ => (0, 0),
    };

    if end.saturating_sub(start) > RANGE_LIMIT {
        return Err(Error::build(format!(
            "function `range` may produce at most `{RANGE_LIMIT}` items"
        )));
    }

    Ok(json!((start..end).collect::<Vec<i64>>()))
}
