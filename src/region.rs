use std::{
    cmp::{max, min},
    fmt::Display,
    ops::Range,
};

/// Represents an area within source text.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct Region {
    /// The beginning of the range, inclusive.
    pub begin: usize,
    /// The ending of the range, exclusive.
    pub end: usize,
}

impl Region {
    /// Create a new Region from the given range.
    pub fn new(position: Range<usize>) -> Self {
        Self {
            begin: position.start,
            end: position.end,
        }
    }

    /// Combine will merge the indices of two [`Region`] instances.
    pub fn combine(self, other: Self) -> Self {
        Self {
            begin: min(self.begin, other.begin),
            end: max(self.end, other.end),
        }
    }

    /// Access the literal value of a [`Region`].
    ///
    /// Returns an empty string if the `Region` is out of bounds in the given
    /// source text.
    pub fn literal<'source>(&self, source: &'source str) -> &'source str {
        source.get(self.begin..self.end).unwrap_or_default()
    }
}

impl From<Range<usize>> for Region {
    fn from(value: Range<usize>) -> Self {
        Self {
            begin: value.start,
            end: value.end,
        }
    }
}

/// A row and column within source text.
///
/// Both values are one-indexed. The column is measured in display width,
/// so wide characters count for two columns.
#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct Location {
    /// Line number.
    pub row: usize,
    /// Column number.
    pub column: usize,
}

impl Location {
    /// Create a new [`Location`].
    #[inline]
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// Locate the given byte offset within the source text.
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let row = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = unicode_width::UnicodeWidthStr::width(&before[line_start..]) + 1;

        Self { row, column }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// Precomputed line starts for repeated [`Location`] lookups over one source.
pub(crate) struct LineIndex<'source> {
    source: &'source str,
    starts: Vec<usize>,
}

impl<'source> LineIndex<'source> {
    /// Index the lines of the given source text.
    pub fn new(source: &'source str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self { source, starts }
    }

    /// Return the [`Location`] of the beginning of the given [`Region`].
    pub fn locate(&self, region: Region) -> Location {
        let offset = region.begin.min(self.source.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let start = self.starts.get(line).copied().unwrap_or(0);
        let prefix = self.source.get(start..offset).unwrap_or_default();

        Location {
            row: line + 1,
            column: unicode_width::UnicodeWidthStr::width(prefix) + 1,
        }
    }
}
