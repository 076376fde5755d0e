use super::{Pointer, RED, RESET};
use crate::region::{Location, Region};
use std::fmt::{Debug, Display, Formatter, Result};

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The template source could not be parsed.
    Syntax,
    /// A variable needed by the template has not been bound.
    MissingVariable,
    /// A variable was used during rendering without a bound value.
    ///
    /// This means the pre-render check was bypassed, and is never expected
    /// to happen through the public API.
    UnboundVariable,
    /// An operator or loop received a value of the wrong type.
    Type,
    /// A called function is neither a user function nor a built-in.
    UnknownFunction,
    /// An applied filter is neither a user function nor a built-in.
    UnknownFilter,
    /// A function or filter returned an error.
    Function,
    /// A dependency could not be resolved, or nesting went too deep.
    Template,
    /// A value could not be converted.
    Value,
    /// Writing rendered output failed.
    Write,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::MissingVariable => write!(f, "missing variable"),
            ErrorKind::UnboundVariable => write!(f, "unbound variable"),
            ErrorKind::Type => write!(f, "type error"),
            ErrorKind::UnknownFunction => write!(f, "unknown function"),
            ErrorKind::UnknownFilter => write!(f, "unknown filter"),
            ErrorKind::Function => write!(f, "function error"),
            ErrorKind::Template => write!(f, "template error"),
            ErrorKind::Value => write!(f, "value error"),
            ErrorKind::Write => write!(f, "write error"),
        }
    }
}

/// Describes an error, and allows adding a contextual help text and visualization.
///
/// # Examples
///
/// Creating an [`Error`] that points into the template source:
///
/// ```
/// use twine::{Error, ErrorKind};
///
/// let error = Error::build("unexpected keyword")
///     .with_kind(ErrorKind::Syntax)
///     .with_pointer("{% update name %}", 3..9)
///     .with_name("template.txt")
///     .with_help(r#"expected one of "if", "for", "block""#);
///
/// assert_eq!(error.location().map(|l| l.column), Some(4));
/// ```
///
/// When printed with `println!("{:#}", error)` the [`Error`] produces this output:
///
/// ```text
/// error: unexpected keyword
///   --> template.txt:1:4
///    |
///  1 | {% update name %}
///    |    ^^^^^^
///    |
///   = help: expected one of "if", "for", "block"
/// ```
#[derive(Clone)]
pub struct Error {
    /// Category of the [`Error`].
    kind: ErrorKind,
    /// Describes the cause of the [`Error`].
    reason: String,
    /// Where in the source the [`Error`] happened.
    location: Option<Location>,
    /// A visualization to help illustrate the [`Error`].
    pointer: Option<Pointer>,
    /// Additional information to display with the [`Error`].
    help: Option<String>,
    /// The name of the template that the [`Error`] comes from.
    name: Option<String>,
}

impl Error {
    /// Create a new [`Error`] with the given reason text.
    ///
    /// The kind defaults to [`ErrorKind::Function`], which is what an
    /// error returned from a user function is reported as. The additional
    /// fields may be populated using the various methods defined on `Error`.
    ///
    /// # Examples
    ///
    /// ```
    /// use twine::Error;
    ///
    /// Error::build("function `shout` requires string input")
    ///     .with_help("use quotes to coerce data to string");
    /// ```
    pub fn build<T>(reason: T) -> Self
    where
        T: Into<String>,
    {
        Error {
            kind: ErrorKind::Function,
            reason: reason.into(),
            location: None,
            pointer: None,
            help: None,
            name: None,
        }
    }

    /// Create a new [`Error`] of the given kind.
    pub fn new<T>(kind: ErrorKind, reason: T) -> Self
    where
        T: Into<String>,
    {
        Self::build(reason).with_kind(kind)
    }

    /// Set the [`ErrorKind`].
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;

        self
    }

    /// Set the reason text, which is a short summary of the [`Error`].
    pub fn with_reason<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.reason = text.into();

        self
    }

    /// Set the name text, which is the name of the template that the
    /// [`Error`] is related to.
    ///
    /// An already assigned name is kept, so errors raised inside an included
    /// template keep pointing at that template.
    pub fn with_name<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        if self.name.is_none() {
            self.name = Some(text.into());
        }

        self
    }

    /// Set the name text when a name is given, see [`Error::with_name`].
    pub(crate) fn with_template(self, name: Option<&str>) -> Self {
        match name {
            Some(name) => self.with_name(name),
            None => self,
        }
    }

    /// Set the location without a visualization.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);

        self
    }

    /// Point at the given [`Region`] of the source text.
    ///
    /// Sets both the [`Location`] and the visualization shown by `{:#}`.
    pub fn with_pointer<T>(mut self, source: &str, region: T) -> Self
    where
        T: Into<Region>,
    {
        let pointer = Pointer::new(source, region.into());
        self.location = Some(pointer.location());
        self.pointer = Some(pointer);

        self
    }

    /// Set the help text, which is contextual information to accompany the
    /// reason text.
    pub fn with_help<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.help = Some(text.into());

        self
    }

    /// Return the [`ErrorKind`].
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return the reason text.
    #[inline]
    pub fn message(&self) -> &str {
        &self.reason
    }

    /// Return the [`Location`], if known.
    #[inline]
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Return the help text, if any.
    #[inline]
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Return the name of the template that the error is related to.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return true if the [`Error`] already points into some source.
    #[inline]
    pub(crate) fn is_located(&self) -> bool {
        self.location.is_some()
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("reason", &self.reason)
            .field("location", &self.location)
            .field("help", &self.help)
            .field("name", &self.name)
            .finish()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let header = format!("{RED}error{RESET}");
        write!(f, "{header}: {}", self.reason)?;

        if f.alternate() {
            if let Some(pointer) = &self.pointer {
                return pointer.display(f, self.name.as_deref(), self.help.as_deref());
            }
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.reason == other.reason
            && self.location == other.location
            && self.help == other.help
            && self.name == other.name
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};
    use crate::region::Location;

    #[test]
    fn test_pointer_sets_location() {
        let error = Error::new(ErrorKind::Type, "incompatible types")
            .with_pointer("line one\n{{ a + b }}", 12..17);

        assert_eq!(error.kind(), ErrorKind::Type);
        assert_eq!(error.location(), Some(Location::new(2, 4)));
    }

    #[test]
    fn test_name_is_kept() {
        let error = Error::build("failure")
            .with_name("inner.html")
            .with_name("outer.html");

        assert_eq!(error.name(), Some("inner.html"));
    }

    #[test]
    fn test_display_alternate() {
        let error = Error::new(ErrorKind::Syntax, "unexpected token")
            .with_pointer("{{ ) }}", 3..4)
            .with_name("page.html")
            .with_help("expected an expression");

        let plain = format!("{error}");
        let visual = format!("{error:#}");

        assert!(plain.ends_with("unexpected token"));
        assert!(visual.contains("page.html:1:4"));
        assert!(visual.contains("help: expected an expression"));
    }
}
