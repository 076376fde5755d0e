use crate::{
    compile::{Keyword, Operator},
    region::Region,
    syntax::Marker,
};
use std::fmt::Display;

/// Types emitted by the Lexer.
///
/// An abstraction over raw text to make construction of Tree types easier.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Token {
    /// Raw text.
    Raw,
    /// String literal within a tag.
    String,
    /// Number within a tag.
    Number,
    /// Identifier (unquoted string) within a tag.
    Identifier,
    /// Whitespace within a tag.
    Whitespace,
    /// Beginning of an expression - {{ by default.
    BeginExpression,
    /// End of an expression - }} by default.
    EndExpression,
    /// Beginning of a block - {% by default.
    BeginBlock,
    /// End of a block - %} by default.
    EndBlock,
    /// .
    Period,
    /// ,
    Comma,
    /// :
    Colon,
    /// |
    Pipe,
    /// !
    Exclamation,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    /// A boolean true.
    True,
    /// A boolean false.
    False,
    /// The null value, spelled `null` or `none`.
    Null,
    /// A recognized "special" keyword.
    Keyword(Keyword),
    /// Describes an action taken on two values.
    Operator(Operator),
}

impl Token {
    /// Convert a marker id into a Token.
    ///
    /// Return value includes the resulting Token and a boolean which indicates
    /// if the Token is whitespace trimmed. Comment markers are not tokens and
    /// return None.
    pub(crate) fn from_marker(marker: Marker) -> Option<(Self, bool)> {
        match marker {
            Marker::BeginExpression => Some((Self::BeginExpression, false)),
            Marker::EndExpression => Some((Self::EndExpression, false)),
            Marker::BeginExpressionTrim => Some((Self::BeginExpression, true)),
            Marker::EndExpressionTrim => Some((Self::EndExpression, true)),
            Marker::BeginBlock => Some((Self::BeginBlock, false)),
            Marker::EndBlock => Some((Self::EndBlock, false)),
            Marker::BeginBlockTrim => Some((Self::BeginBlock, true)),
            Marker::EndBlockTrim => Some((Self::EndBlock, true)),
            Marker::BeginComment | Marker::EndComment => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Raw => write!(f, "raw"),
            Token::String => write!(f, "string"),
            Token::Number => write!(f, "number"),
            Token::Identifier => write!(f, "identifier"),
            Token::Whitespace => write!(f, "whitespace"),
            Token::BeginExpression => write!(f, "begin expression"),
            Token::EndExpression => write!(f, "end expression"),
            Token::BeginBlock => write!(f, "begin block"),
            Token::EndBlock => write!(f, "end block"),
            Token::Period => write!(f, "period (.)"),
            Token::Comma => write!(f, "comma (,)"),
            Token::Colon => write!(f, "colon (:)"),
            Token::Pipe => write!(f, "pipe (|)"),
            Token::Exclamation => write!(f, "exclamation (!)"),
            Token::LeftParen => write!(f, "left parenthesis (()"),
            Token::RightParen => write!(f, "right parenthesis ())"),
            Token::LeftBracket => write!(f, "left bracket ([)"),
            Token::RightBracket => write!(f, "right bracket (])"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Keyword(keyword) => write!(f, "keyword {keyword}"),
            Token::Operator(operator) => write!(f, "operator {operator}"),
        }
    }
}

/// A [`Token`] along with where it was found.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Lexeme {
    /// The kind of token.
    pub token: Token,
    /// Area of the source covered by the token.
    pub region: Region,
    /// True if the token is a delimiter written with the trim character.
    pub trim: bool,
}

impl Lexeme {
    /// Create a new untrimmed [`Lexeme`].
    #[inline]
    pub fn new<T>(token: Token, region: T) -> Self
    where
        T: Into<Region>,
    {
        Self {
            token,
            region: region.into(),
            trim: false,
        }
    }

    /// Create a new [`Lexeme`] with the given trim flag.
    #[inline]
    pub fn trimmed<T>(token: Token, region: T, trim: bool) -> Self
    where
        T: Into<Region>,
    {
        Self {
            token,
            region: region.into(),
            trim,
        }
    }
}
