use std::fmt::Display;

/// Describes how numbers are printed by a [`Program`][`crate::Program`].
///
/// # Examples
///
/// ```
/// use twine::{compile, Locale};
///
/// let mut program = compile("{{ 2.5 }}").unwrap();
/// program.set_locale(Locale::new("de", ','));
///
/// assert_eq!(program.render(), "2,5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    name: String,
    decimal_separator: char,
}

impl Locale {
    /// Create a new [`Locale`].
    #[inline]
    pub fn new<T>(name: T, decimal_separator: char) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            decimal_separator,
        }
    }

    /// Return the name of the [`Locale`], such as "en".
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the character written between the integer and fractional
    /// parts of a number.
    #[inline]
    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("en", '.')
    }
}

impl Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
