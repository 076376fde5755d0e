use crate::{
    compile::parse::tree::{Branch, Expression, LoopVariables, Scope},
    region::{Location, Region},
};

/// Describes a block the `Parser` has opened but not yet closed.
///
/// Each state owns the body currently receiving statements.
#[derive(Debug)]
pub enum BlockState {
    /// The `Parser` is evaluating an "if" block.
    If {
        /// Branches that are already closed by an "elif" or "else".
        branches: Vec<Branch>,
        /// Condition of the open branch, None once "else" is found.
        condition: Option<Expression>,
        /// Body of the open branch.
        body: Scope,
        /// The opening tag.
        open: Tag,
    },
    /// The `Parser` is evaluating a "for" block.
    For {
        /// Variables bound by the loop.
        set: LoopVariables,
        /// Value being iterated on.
        iterable: Expression,
        body: Scope,
        open: Tag,
    },
    /// The `Parser` is evaluating a "block" block.
    Block {
        /// The name of the block.
        name: String,
        body: Scope,
        open: Tag,
    },
}

impl BlockState {
    /// Return the body receiving statements.
    #[inline]
    pub fn body_mut(&mut self) -> &mut Scope {
        match self {
            BlockState::If { body, .. }
            | BlockState::For { body, .. }
            | BlockState::Block { body, .. } => body,
        }
    }

    /// Return the opening tag.
    #[inline]
    pub fn open(&self) -> &Tag {
        match self {
            BlockState::If { open, .. }
            | BlockState::For { open, .. }
            | BlockState::Block { open, .. } => open,
        }
    }

    /// Return the name of the opening and closing keywords.
    pub fn keywords(&self) -> (&'static str, &'static str) {
        match self {
            BlockState::If { .. } => ("if", "endif"),
            BlockState::For { .. } => ("for", "endfor"),
            BlockState::Block { .. } => ("block", "endblock"),
        }
    }
}

/// Trim flags and position of a tag, `{% ... %}`.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    /// Area spanning the full tag.
    pub region: Region,
    /// Where the keyword of the tag is.
    pub location: Location,
    /// True if the opening delimiter is trimmed, `{%-`.
    pub left: bool,
    /// True if the closing delimiter is trimmed, `-%}`.
    pub right: bool,
}
