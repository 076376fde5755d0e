use std::{
    cmp::max,
    fmt::{Formatter, Result},
};

use super::{RESET, YELLOW};
use crate::region::{Location, Region};

const BLANK: &str = "";
const PIPE: &str = "|";
const EQUAL: &str = "=";
const HIGHLIGHT: &str = "^";

/// A visualization that points to a specific location within source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    /// The line that the Pointer is pointing to.
    ///
    /// This number should be zero indexed.
    line: usize,
    /// The column that the Pointer is pointing to.
    ///
    /// This number should be zero indexed.
    column: usize,
    /// The length of the object being highlighted.
    length: usize,
    /// The actual line of text that is being pointed to.
    text: String,
}

impl Pointer {
    /// Create a new Pointer over the given source text and Region.
    pub fn new(source: &str, region: Region) -> Self {
        let location = Location::locate(source, region.begin);
        let line = location.row - 1;
        let text = source
            .split_terminator('\n')
            .nth(line)
            .or_else(|| source.split_terminator('\n').last())
            .unwrap_or_default()
            .to_string();
        let length = max(1, get_width(region.literal(source)));

        Self {
            line,
            column: location.column - 1,
            length,
            text,
        }
    }

    /// Return the one-indexed [`Location`] this Pointer highlights.
    pub fn location(&self) -> Location {
        Location::new(self.line + 1, self.column + 1)
    }

    /// Display the visualization by writing to the given Formatter.
    pub(crate) fn display(
        &self,
        formatter: &mut Formatter<'_>,
        template: Option<&str>,
        help: Option<&str>,
    ) -> Result {
        let num = (self.line + 1).to_string();
        let col = self.column + 1;
        let pad = get_width(&num);
        let align = self.column + self.length;

        let extra = "-".repeat(3_usize.saturating_sub(self.length));
        let name = template.unwrap_or("?");
        let text = &self.text;
        let underline = HIGHLIGHT.repeat(self.length);

        write!(
            formatter,
            "\n {BLANK:pad$}--> {name}:{num}:{col}\
             \n {BLANK:pad$} {PIPE}\
             \n {num:>} {PIPE} {text}\
             \n {BLANK:pad$} {PIPE} {YELLOW}{underline:>align$}{RESET}{extra}\
             \n {BLANK:pad$} {PIPE}\n",
        )?;

        if let Some(help) = help {
            writeln!(formatter, "{BLANK:pad$} {EQUAL} help: {help}")?;
        }

        Ok(())
    }
}

/// Wrapper for UnicodeWidthStr::width.
fn get_width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(test)]
mod tests {
    use super::Pointer;
    use crate::region::Location;

    #[test]
    fn test_pointer_second_line() {
        let pointer = Pointer::new("hello\n{{ name }}", (9..13).into());

        assert_eq!(pointer.location(), Location::new(2, 4));
        assert_eq!(pointer.text, "{{ name }}");
        assert_eq!(pointer.length, 4);
    }

    #[test]
    fn test_pointer_end_of_source() {
        let source = "{% if x %}";
        let pointer = Pointer::new(source, (source.len()..source.len()).into());

        assert_eq!(pointer.length, 1);
        assert_eq!(pointer.text, source);
    }
}
