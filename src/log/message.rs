use super::{Error, ErrorKind};
use crate::region::Region;
use std::fmt::Display;

pub const UNEXPECTED_TOKEN: &str = "unexpected token";
pub const UNEXPECTED_BLOCK: &str = "unexpected block";
pub const UNEXPECTED_EOF: &str = "unexpected eof";
pub const INVALID_SYNTAX: &str = "invalid syntax";
pub const INCOMPATIBLE_TYPES: &str = "incompatible types";
pub const MISSING_VARIABLE: &str = "missing variable";
pub const UNBOUND_VARIABLE: &str = "unbound variable";
pub const UNKNOWN_FUNCTION: &str = "unknown function";
pub const UNKNOWN_FILTER: &str = "unknown filter";
pub const MISSING_TEMPLATE: &str = "missing template";
pub const INVALID_PROGRAM: &str = "invalid program";
pub const NESTING_TOO_DEEP: &str = "nesting too deep";

/// Return an [`Error`] explaining that the end of source was not expected.
pub fn error_eof(source: &str) -> Error {
    let source_len = source.len();
    Error::new(ErrorKind::Syntax, UNEXPECTED_EOF)
        .with_pointer(source, source_len..source_len)
        .with_help("expected additional tokens, did you close all blocks and expressions?")
}

/// Return an [`Error`] explaining that the write operation failed.
///
/// This is likely caused by a failure during a `write!` macro operation.
pub fn error_write() -> Error {
    Error::new(ErrorKind::Write, "write failure")
        .with_help("failed to write result of render, are you low on memory?")
}

/// Return an [`Error`] describing a missing template.
pub fn error_missing_template(name: &str, source: &str, region: Region) -> Error {
    Error::new(ErrorKind::Template, MISSING_TEMPLATE)
        .with_pointer(source, region)
        .with_help(format!(
            "template `{name}` not found in engine, add it with `.add_template`"
        ))
}

/// Return an [`Error`] describing a variable that has no value.
pub fn error_missing_variable(name: &str) -> Error {
    Error::new(ErrorKind::MissingVariable, format!("{MISSING_VARIABLE} `{name}`")).with_help(
        format!("variable `{name}` is needed by this template, bind it with `.set_value`"),
    )
}

/// Return a string describing an unexpected operator.
pub fn expected_operator<T>(received: T) -> String
where
    T: Display,
{
    format!(
        "expected operator like `+`, `-`, `*`, `/`, `==`, `!=`, `>=`, `<=`, found `{}`",
        received
    )
}

/// Return a string describing an unexpected token where a keyword was expected.
pub fn expected_keyword<T>(received: T) -> String
where
    T: Display,
{
    format!(
        "expected keyword like `if`, `for`, `block`, `extends` or `include`, found {}",
        received
    )
}
