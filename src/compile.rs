pub(crate) mod lex;
pub(crate) mod parse;
pub(crate) mod program;

pub use crate::compile::{
    parse::trim::{TrimMode, TrimTable},
    program::Compiled,
};

use crate::{log::Error, Engine, Program};
use std::fmt::Display;

/// Compile a [`Program`] from the given text.
///
/// Provides a shortcut to quickly compile a `Program` without creating
/// an [`Engine`]. The program can use the built-in functions, but cannot
/// include or extend other templates.
///
/// # Examples
///
/// ```
/// use twine::compile;
///
/// let program = compile("{{ name }}");
/// assert!(program.is_ok())
/// ```
pub fn compile(text: &str) -> Result<Program, Error> {
    Engine::default().compile(text)
}

/// Keywords recognized by the Lexer and Parser.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Keyword {
    /// Enables negation.
    Not,
    /// Beginning of an "if" block.
    If,
    /// Additional condition in an "if" block.
    ElseIf,
    /// Marks the beginning of the else branch in an "if" block.
    Else,
    /// End of an "if" block.
    EndIf,
    /// Beginning of a loop.
    For,
    /// Divides the loop variables from the iterable in a loop.
    ///
    /// In this example, the loop variable is "person" while the iterable
    /// is "people":
    ///
    /// "for person in people"
    In,
    /// End of a loop.
    EndFor,
    /// Beginning of a "block" block.
    Block,
    /// End of a "block" block.
    EndBlock,
    /// An extends tag.
    Extends,
    /// An include tag.
    Include,
    /// Introduces the variables passed to an include.
    With,
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Keyword::Not => write!(f, "not"),
            Keyword::If => write!(f, "if"),
            Keyword::ElseIf => write!(f, "elif"),
            Keyword::Else => write!(f, "else"),
            Keyword::EndIf => write!(f, "endif"),
            Keyword::For => write!(f, "for"),
            Keyword::In => write!(f, "in"),
            Keyword::EndFor => write!(f, "endfor"),
            Keyword::Block => write!(f, "block"),
            Keyword::EndBlock => write!(f, "endblock"),
            Keyword::Extends => write!(f, "extends"),
            Keyword::Include => write!(f, "include"),
            Keyword::With => write!(f, "with"),
        }
    }
}

/// Binary operators recognized by the Lexer and Parser.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Operator {
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
    /// %
    Modulo,
    /// ~
    Concat,
    /// >
    Greater,
    /// <
    Lesser,
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// >=
    GreaterOrEqual,
    /// <=
    LesserOrEqual,
    /// and, &&
    And,
    /// or, ||
    Or,
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Add => write!(f, "+"),
            Operator::Subtract => write!(f, "-"),
            Operator::Multiply => write!(f, "*"),
            Operator::Divide => write!(f, "/"),
            Operator::Modulo => write!(f, "%"),
            Operator::Concat => write!(f, "~"),
            Operator::Greater => write!(f, ">"),
            Operator::Lesser => write!(f, "<"),
            Operator::Equal => write!(f, "=="),
            Operator::NotEqual => write!(f, "!="),
            Operator::GreaterOrEqual => write!(f, ">="),
            Operator::LesserOrEqual => write!(f, "<="),
            Operator::And => write!(f, "and"),
            Operator::Or => write!(f, "or"),
        }
    }
}

/// Unary operators recognized by the Parser.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Unary {
    /// not, !
    Not,
    /// -
    Negate,
}

impl Display for Unary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unary::Not => write!(f, "not"),
            Unary::Negate => write!(f, "-"),
        }
    }
}
