use crate::locale::Locale;
use serde_json::{Map, Number, Value};
use std::fmt::{Arguments, Result, Write};

/// Wraps some underlying buffer by providing methods that write to it
/// in different formats.
pub struct Pipe<'buffer> {
    buffer: &'buffer mut (dyn Write + 'buffer),
    locale: &'buffer Locale,
}

impl<'buffer> Pipe<'buffer> {
    /// Create a new Pipe that writes to the given buffer, formatting numbers
    /// with the given [`Locale`].
    pub fn new(buffer: &'buffer mut String, locale: &'buffer Locale) -> Self {
        Self { buffer, locale }
    }

    /// Write the given Value to the Pipe buffer.
    ///
    /// The Pipe will handle formatting the value. Null is written as nothing.
    ///
    /// # Errors
    ///
    /// The Pipe supports all Value types, so the only error that will
    /// be returned is propogated from the [write!] macro itself.
    pub fn write_value(&mut self, value: &Value) -> Result {
        match value {
            Value::Null => Ok(()),
            _ => self.write_nested(value),
        }
    }

    /// Write a value that may appear inside of an array or object, where
    /// null is written literally.
    fn write_nested(&mut self, value: &Value) -> Result {
        match value {
            Value::Null => self.buffer.write_str("null"),
            Value::Bool(bool) => write!(self.buffer, "{bool}"),
            Value::Number(number) => self.write_number(number),
            Value::String(string) => self.buffer.write_str(string),
            Value::Array(array) => self.write_array(array),
            Value::Object(object) => self.write_object(object),
        }
    }

    /// Write the number, using the decimal separator of the [`Locale`] when
    /// it has a fractional part.
    fn write_number(&mut self, number: &Number) -> Result {
        let separator = self.locale.decimal_separator();
        if !number.is_f64() || separator == '.' {
            return write!(self.buffer, "{number}");
        }

        let text = number.to_string();
        match text.split_once('.') {
            Some((integer, fraction)) => write!(self.buffer, "{integer}{separator}{fraction}"),
            None => self.buffer.write_str(&text),
        }
    }

    /// Write the value to the buffer as a comma separated list and
    /// surrounded by brackets.
    fn write_array(&mut self, value: &[Value]) -> Result {
        self.buffer.write_char('[')?;
        for (index, item) in value.iter().enumerate() {
            if index > 0 {
                self.buffer.write_str(", ")?;
            }
            self.write_nested(item)?;
        }
        self.buffer.write_char(']')
    }

    /// Write the value to the buffer as key/value pairs and surrounded
    /// by curly braces.
    fn write_object(&mut self, value: &Map<String, Value>) -> Result {
        self.buffer.write_char('{')?;
        for (index, (key, item)) in value.iter().enumerate() {
            if index > 0 {
                self.buffer.write_str(", ")?;
            }
            write!(self.buffer, "{key}: ")?;
            self.write_nested(item)?;
        }
        self.buffer.write_char('}')
    }
}

impl Write for Pipe<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> Result {
        Write::write_str(self.buffer, s)
    }

    #[inline]
    fn write_char(&mut self, c: char) -> Result {
        Write::write_char(self.buffer, c)
    }

    #[inline]
    fn write_fmt(&mut self, args: Arguments<'_>) -> Result {
        Write::write_fmt(self.buffer, args)
    }
}

/// Return the text a [`Value`] is printed as with the given [`Locale`].
pub(crate) fn display(value: &Value, locale: &Locale) -> String {
    let mut buffer = String::new();
    // Writing to a String cannot fail.
    let _ = Pipe::new(&mut buffer, locale).write_value(value);

    buffer
}

#[cfg(test)]
mod tests {
    use super::display;
    use crate::locale::Locale;
    use serde_json::json;

    #[test]
    fn test_display_scalars() {
        let locale = Locale::default();
        assert_eq!(display(&json!(null), &locale), "");
        assert_eq!(display(&json!(true), &locale), "true");
        assert_eq!(display(&json!(12), &locale), "12");
        assert_eq!(display(&json!(1.5), &locale), "1.5");
        assert_eq!(display(&json!("taylor"), &locale), "taylor");
    }

    #[test]
    fn test_display_collections() {
        let locale = Locale::default();
        assert_eq!(display(&json!([1, "a", null]), &locale), "[1, a, null]");
        assert_eq!(display(&json!([]), &locale), "[]");
        assert_eq!(
            display(&json!({"a": 1, "b": [true]}), &locale),
            "{a: 1, b: [true]}"
        );
    }

    #[test]
    fn test_display_decimal_separator() {
        let locale = Locale::new("de", ',');
        assert_eq!(display(&json!(2.25), &locale), "2,25");
        assert_eq!(display(&json!([0.5, 3]), &locale), "[0,5, 3]");
        assert_eq!(display(&json!(1000), &locale), "1000");
    }
}
