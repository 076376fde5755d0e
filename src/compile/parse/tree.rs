use crate::{
    compile::{Operator, Unary},
    region::{Location, Region},
};
use serde_json::Value;
use std::fmt::Display;

/// Identifies a statement within one compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a new [`NodeId`].
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A sequence of [`Tree`] instances.
///
/// The root of every template is a `Scope`, and so is the body of each
/// "if" branch, "for" loop and "block".
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    /// Identifies the `Scope` in the trim table.
    pub id: NodeId,
    /// Area of the source covered by the `Scope`.
    pub region: Region,
    /// Where the `Scope` begins.
    pub location: Location,
    /// The statements, in source order.
    pub data: Vec<Tree>,
}

impl Scope {
    /// Create a new empty [`Scope`].
    #[inline]
    pub fn new(id: NodeId, region: Region, location: Location) -> Self {
        Self {
            id,
            region,
            location,
            data: vec![],
        }
    }
}

/// The Abstract Syntax Tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    /// Raw text.
    Text(Text),
    /// Render the result of an [`Expression`].
    Print(Print),
    /// An if, else if and else chain.
    If(IfElse),
    /// A for loop.
    For(ForLoop),
    /// A named, overridable area.
    Block(Block),
    /// Render a parent template using the blocks of this one.
    Extends(Extends),
    /// Render another template.
    Include(Include),
}

impl Tree {
    /// Return the [`NodeId`] of the underlying statement.
    pub fn id(&self) -> NodeId {
        match self {
            Tree::Text(text) => text.id,
            Tree::Print(print) => print.id,
            Tree::If(if_else) => if_else.id,
            Tree::For(for_loop) => for_loop.id,
            Tree::Block(block) => block.id,
            Tree::Extends(extends) => extends.id,
            Tree::Include(include) => include.id,
        }
    }

    /// Return the [`Region`] of the underlying statement.
    pub fn region(&self) -> Region {
        match self {
            Tree::Text(text) => text.region,
            Tree::Print(print) => print.region,
            Tree::If(if_else) => if_else.region,
            Tree::For(for_loop) => for_loop.region,
            Tree::Block(block) => block.region,
            Tree::Extends(extends) => extends.region,
            Tree::Include(include) => include.region,
        }
    }

    /// Return the [`Location`] of the underlying statement.
    pub fn location(&self) -> Location {
        match self {
            Tree::Text(text) => text.location,
            Tree::Print(print) => print.location,
            Tree::If(if_else) => if_else.location,
            Tree::For(for_loop) => for_loop.location,
            Tree::Block(block) => block.location,
            Tree::Extends(extends) => extends.location,
            Tree::Include(include) => include.location,
        }
    }
}

/// Raw text, the content is the literal value of the region.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub id: NodeId,
    pub region: Region,
    pub location: Location,
}

/// Represents a call to render some kind of [`Expression`].
#[derive(Debug, Clone, PartialEq)]
pub struct Print {
    pub id: NodeId,
    pub expression: Expression,
    pub region: Region,
    pub location: Location,
}

/// One condition and the body rendered when it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Expression,
    pub body: Scope,
}

/// Conditional rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct IfElse {
    pub id: NodeId,
    /// The "if" branch followed by every "elif" branch.
    pub branches: Vec<Branch>,
    pub else_branch: Option<Scope>,
    pub region: Region,
    pub location: Location,
}

/// Variables bound by a loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopVariables {
    /// `for item in items`
    Item(String),
    /// `for key, value in items`
    KeyValue(String, String),
}

/// Loop rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub id: NodeId,
    pub set: LoopVariables,
    pub iterable: Expression,
    pub body: Scope,
    pub region: Region,
    pub location: Location,
}

/// Named area which may be overridden by an extending template.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub name: String,
    pub body: Scope,
    pub region: Region,
    pub location: Location,
}

/// Command to render a parent template.
#[derive(Debug, Clone, PartialEq)]
pub struct Extends {
    pub id: NodeId,
    pub name: String,
    pub region: Region,
    pub location: Location,
}

/// A variable passed to an included template.
#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
    pub name: String,
    pub value: Expression,
}

/// Command to render another template.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub id: NodeId,
    pub name: String,
    pub mounts: Vec<Mount>,
    pub region: Region,
    pub location: Location,
}

/// Something that evaluates to a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Data written directly in the template source.
    Literal(Literal),
    /// A value bound to the program or to a loop, such as "person.name".
    Variable(Variable),
    /// A list literal such as `[1, 2, name]`.
    List(List),
    /// Two expressions combined with an [`Operator`].
    Binary(Binary),
    /// An expression modified by a [`Unary`] operator.
    Unary(Prefix),
    /// Call to a function, `name(arguments)`.
    Call(Call),
    /// Call to a function with a receiver, `receiver | name(arguments)`.
    Filter(Filter),
}

impl Expression {
    /// Get the [`Region`] from the underlying Expression kind.
    pub fn region(&self) -> Region {
        match self {
            Expression::Literal(literal) => literal.region,
            Expression::Variable(variable) => variable.region,
            Expression::List(list) => list.region,
            Expression::Binary(binary) => binary.region,
            Expression::Unary(prefix) => prefix.region,
            Expression::Call(call) => call.region,
            Expression::Filter(filter) => filter.region,
        }
    }

    /// Get the [`Location`] from the underlying Expression kind.
    pub fn location(&self) -> Location {
        match self {
            Expression::Literal(literal) => literal.location,
            Expression::Variable(variable) => variable.location,
            Expression::List(list) => list.location,
            Expression::Binary(binary) => binary.location,
            Expression::Unary(prefix) => prefix.location,
            Expression::Call(call) => call.location,
            Expression::Filter(filter) => filter.location,
        }
    }

    /// Return the literal value if this is an [`Expression::Literal`].
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expression::Literal(literal) => Some(&literal.value),
            _ => None,
        }
    }
}

/// Literal data that does not need to be evaluated any further.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Value,
    pub region: Region,
    pub location: Location,
}

/// A root name and the keys used to walk into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub path: Vec<String>,
    pub region: Region,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub items: Vec<Expression>,
    pub region: Region,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub operator: Operator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub region: Region,
    /// Area of the operator.
    pub operator_region: Region,
    /// Location of the operator.
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prefix {
    pub operator: Unary,
    pub operand: Box<Expression>,
    pub region: Region,
    pub location: Location,
}

/// Call to some registered function.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub arguments: Vec<Expression>,
    pub region: Region,
    /// Area of the function name.
    pub name_region: Region,
    /// Location of the function name.
    pub location: Location,
}

/// Call to some registered function, with the receiver passed as the
/// first argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub receiver: Box<Expression>,
    pub name: String,
    pub arguments: Vec<Expression>,
    pub region: Region,
    /// Area of the filter name.
    pub name_region: Region,
    /// Location of the filter name.
    pub location: Location,
}
