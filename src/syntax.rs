//! Delimiters that identify expressions, blocks and comments within templates.
//!
//! A [`Builder`] produces the `morel` search syntax used by the lexer. The
//! defaults follow the familiar Twig style:
//!
//! ```text
//! Expressions: {{ name }}
//! Blocks: {% if ... %}
//! Comments: {# ... #}
//! Whitespace:
//!     Expression: {{- name -}}
//!     Block:  {%- if ... -%}
//! ```
use morel::Syntax;

/// Markers that identify blocks, expressions and comments within text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Beginning of an Expression, which prints the result of evaluating
    /// its content.
    BeginExpression = 0,
    /// End of an Expression.
    EndExpression = 1,
    /// Same as BeginExpression, but requests that the trailing whitespace of
    /// the preceding text be removed.
    BeginExpressionTrim = 2,
    /// Same as EndExpression, but requests that the leading whitespace of
    /// the following text be removed.
    EndExpressionTrim = 3,
    /// Beginning of a Block, which allows for logical constructs such
    /// as "if", "for" and "block".
    BeginBlock = 4,
    /// End of a Block.
    EndBlock = 5,
    /// Same as BeginBlock, but requests that the trailing whitespace of the
    /// preceding text be removed.
    BeginBlockTrim = 6,
    /// Same as EndBlock, but requests that the leading whitespace of the
    /// following text be removed.
    EndBlockTrim = 7,
    /// Beginning of a comment, which is skipped entirely.
    BeginComment = 8,
    /// End of a comment.
    EndComment = 9,
}

impl TryFrom<usize> for Marker {
    type Error = usize;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::BeginExpression,
            1 => Self::EndExpression,
            2 => Self::BeginExpressionTrim,
            3 => Self::EndExpressionTrim,
            4 => Self::BeginBlock,
            5 => Self::EndBlock,
            6 => Self::BeginBlockTrim,
            7 => Self::EndBlockTrim,
            8 => Self::BeginComment,
            9 => Self::EndComment,
            other => return Err(other),
        })
    }
}

impl From<Marker> for usize {
    fn from(k: Marker) -> Self {
        k as usize
    }
}

/// Provides methods to build a [`Syntax`].
///
/// # Example
///
/// ```
/// use twine::{Builder, Engine};
///
/// let engine = Engine::default().with_syntax(
///     Builder::new()
///         .with_expression("((", "))")
///         .with_block("(*", "*)"),
/// );
///
/// let mut program = engine.compile("hello, (( name ))!").unwrap();
/// program.set_value("name", "taylor");
/// assert_eq!(program.render(), "hello, taylor!");
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    expression: (String, String),
    block: (String, String),
    comment: (String, String),
    whitespace: char,
}

impl Builder {
    /// Create a new [`Builder`] with the default markers.
    #[inline]
    pub fn new() -> Self {
        Self {
            expression: ("{{".into(), "}}".into()),
            block: ("{%".into(), "%}".into()),
            comment: ("{#".into(), "#}".into()),
            whitespace: '-',
        }
    }

    /// Set the expression markers.
    #[inline]
    pub fn set_expression(&mut self, begin: &str, end: &str) {
        self.expression = (begin.into(), end.into());
    }

    /// Set the expression markers.
    ///
    /// Returns the [`Builder`], so additional methods may be chained.
    #[inline]
    pub fn with_expression(mut self, begin: &str, end: &str) -> Self {
        self.set_expression(begin, end);

        self
    }

    /// Set the block markers.
    #[inline]
    pub fn set_block(&mut self, begin: &str, end: &str) {
        self.block = (begin.into(), end.into());
    }

    /// Set the block markers.
    ///
    /// Returns the [`Builder`], so additional methods may be chained.
    #[inline]
    pub fn with_block(mut self, begin: &str, end: &str) -> Self {
        self.set_block(begin, end);

        self
    }

    /// Set the comment markers.
    #[inline]
    pub fn set_comment(&mut self, begin: &str, end: &str) {
        self.comment = (begin.into(), end.into());
    }

    /// Set the comment markers.
    ///
    /// Returns the [`Builder`], so additional methods may be chained.
    #[inline]
    pub fn with_comment(mut self, begin: &str, end: &str) -> Self {
        self.set_comment(begin, end);

        self
    }

    /// Set the whitespace trim character.
    #[inline]
    pub fn set_whitespace(&mut self, character: char) {
        self.whitespace = character;
    }

    /// Set the whitespace trim character.
    ///
    /// Returns the Builder, so additional methods may be chained.
    #[inline]
    pub fn with_whitespace(mut self, character: char) -> Self {
        self.set_whitespace(character);

        self
    }

    /// Return a Syntax instance from the markers in this [`Builder`].
    pub fn to_syntax(&self) -> Syntax {
        let mut markers: Vec<(usize, String)> = Vec::new();
        let (left_expression, right_expression) = &self.expression;
        let (left_block, right_block) = &self.block;
        let (left_comment, right_comment) = &self.comment;
        let whitespace = self.whitespace;

        markers.push((Marker::BeginExpression.into(), left_expression.clone()));
        markers.push((Marker::EndExpression.into(), right_expression.clone()));
        markers.push((
            Marker::BeginExpressionTrim.into(),
            format!("{left_expression}{whitespace}"),
        ));
        markers.push((
            Marker::EndExpressionTrim.into(),
            format!("{whitespace}{right_expression}"),
        ));
        markers.push((Marker::BeginBlock.into(), left_block.clone()));
        markers.push((Marker::EndBlock.into(), right_block.clone()));
        markers.push((
            Marker::BeginBlockTrim.into(),
            format!("{left_block}{whitespace}"),
        ));
        markers.push((
            Marker::EndBlockTrim.into(),
            format!("{whitespace}{right_block}"),
        ));
        markers.push((Marker::BeginComment.into(), left_comment.clone()));
        markers.push((Marker::EndComment.into(), right_comment.clone()));

        Syntax::new(markers)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
