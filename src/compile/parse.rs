//! Template parser.
//!
//! Utilizes a [`Lexer`] to receive instances of [`Lexeme`], which it uses to
//! construct the root [`Scope`] of the Abstract Syntax Tree along with the
//! [`TrimTable`] describing whitespace control.
//!
//! Statements are reduced with a stack of open [`BlockState`] instances,
//! expressions with precedence climbing.
pub mod tree;
pub mod trim;

mod state;

use crate::{
    compile::{
        lex::{
            token::{Lexeme, Token},
            Lexer, TokenResult,
        },
        parse::{
            state::{BlockState, Tag},
            tree::{
                Binary, Block, Branch, Call, Expression, Extends, Filter, ForLoop, IfElse,
                Include, List, Literal, LoopVariables, Mount, NodeId, Prefix, Print, Scope, Text,
                Tree, Variable,
            },
            trim::{TrimMode, TrimTable},
        },
        Keyword, Operator, Unary,
    },
    log::{
        error_eof, expected_keyword, Error, ErrorKind, INVALID_SYNTAX, NESTING_TOO_DEEP,
        UNEXPECTED_BLOCK, UNEXPECTED_TOKEN,
    },
    region::{LineIndex, Location, Region},
};
use morel::Finder;
use serde_json::{Number, Value};

/// How deep blocks, and separately expressions, may nest.
pub const MAX_NESTING: usize = 128;

pub struct Parser<'source> {
    /// Lexer used to pull from source as tokens instead of raw text.
    lexer: Lexer<'source>,
    /// Store peeked tokens.
    ///
    /// Double option is used to remember when the next token is None.
    buffer: Option<Option<Lexeme>>,
    /// Converts regions to locations.
    lines: LineIndex<'source>,
    /// Trim modes recorded as nodes are reduced.
    trim: TrimTable,
    /// The next [`NodeId`] to hand out.
    counter: u32,
    /// Height of the expression being parsed.
    depth: usize,
}

impl<'source> Parser<'source> {
    /// Create a new Parser from the given string and [`Finder`].
    #[inline]
    pub fn new(source: &'source str, finder: &'source Finder) -> Self {
        Self {
            lexer: Lexer::new(source, finder),
            buffer: None,
            lines: LineIndex::new(source),
            trim: TrimTable::new(),
            counter: 0,
            depth: 0,
        }
    }

    /// Parse the template.
    ///
    /// Returns the root [`Scope`] and the [`TrimTable`] recorded for it.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Syntax`] error pointing at the first offending
    /// token, or at the innermost block left open at the end of the source.
    pub fn parse(mut self) -> Result<(Scope, TrimTable), Error> {
        let source = self.lexer.source;
        let mut root = self.scope(0, false);
        root.region = (0..source.len()).into();

        // Blocks opened but not yet closed, each holding the body that
        // currently receives statements.
        let mut states: Vec<BlockState> = vec![];
        let mut extends: Option<Region> = None;

        while let Some(lexeme) = self.next()? {
            let tree = match lexeme.token {
                Token::Raw => Some(Tree::Text(Text {
                    id: self.id(),
                    region: lexeme.region,
                    location: self.locate(lexeme.region),
                })),
                Token::BeginExpression => Some(self.parse_print(lexeme)?),
                Token::BeginBlock => self.parse_tag(lexeme, &mut states, &mut extends)?,
                token => {
                    return Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                        .with_pointer(source, lexeme.region)
                        .with_help(format!("unexpected {token} outside of a tag")))
                }
            };

            if let Some(tree) = tree {
                match states.last_mut() {
                    Some(state) => state.body_mut().data.push(tree),
                    None => root.data.push(tree),
                }
            }
        }

        if let Some(state) = states.last() {
            let (open, close) = state.keywords();

            return Err(Error::new(ErrorKind::Syntax, INVALID_SYNTAX)
                .with_pointer(source, state.open().region)
                .with_help(format!(
                    "did you close the `{open}` block with an `{close}` block?"
                )));
        }

        Ok((root, self.trim))
    }

    /// Parse a print, `{{ expression }}`.
    fn parse_print(&mut self, begin: Lexeme) -> Result<Tree, Error> {
        let expression = self.parse_expression()?;
        let end = self.next_must(Token::EndExpression)?;
        let id = self.id();
        self.trim.insert(
            id,
            TrimMode::when(begin.trim, TrimMode::LEFT) | TrimMode::when(end.trim, TrimMode::RIGHT),
        );

        Ok(Tree::Print(Print {
            id,
            expression,
            region: begin.region.combine(end.region),
            location: self.locate(begin.region),
        }))
    }

    /// Parse a tag, `{% ... %}`.
    ///
    /// Opening tags push a new [`BlockState`], closing tags pop one and
    /// return the reduced [`Tree`].
    fn parse_tag(
        &mut self,
        begin: Lexeme,
        states: &mut Vec<BlockState>,
        extends: &mut Option<Region>,
    ) -> Result<Option<Tree>, Error> {
        // from
        // |
        // {% if name == "taylor" %}
        //   Welcome back, Taylor.
        // {% endif %}
        //            |
        //            to
        let (keyword, keyword_region) = self.parse_keyword()?;
        let location = self.locate(keyword_region);

        let opens = matches!(keyword, Keyword::If | Keyword::For | Keyword::Block);
        if opens && states.len() >= MAX_NESTING {
            return Err(self.error_nesting(keyword_region, "blocks"));
        }

        match keyword {
            Keyword::If => {
                let condition = self.parse_expression()?;
                let open = self.close_tag(begin, location)?;
                let body = self.scope(open.region.end, open.right);
                states.push(BlockState::If {
                    branches: vec![],
                    condition: Some(condition),
                    body,
                    open,
                });

                Ok(None)
            }
            Keyword::ElseIf | Keyword::Else => {
                let condition = match keyword {
                    Keyword::ElseIf => Some(self.parse_expression()?),
                    _ => None,
                };
                let tag = self.close_tag(begin, location)?;

                let Some(BlockState::If {
                    branches,
                    condition: open_condition,
                    body,
                    ..
                }) = states.last_mut()
                else {
                    return Err(Error::new(ErrorKind::Syntax, UNEXPECTED_BLOCK)
                        .with_pointer(self.lexer.source, tag.region)
                        .with_help(format!("`{keyword}` is only valid inside of an `if` block")));
                };
                let Some(previous) = open_condition.take() else {
                    return Err(Error::new(ErrorKind::Syntax, UNEXPECTED_BLOCK)
                        .with_pointer(self.lexer.source, tag.region)
                        .with_help(format!(
                            "`{keyword}` cannot follow `else`, the `else` branch must be last"
                        )));
                };

                let next = self.scope(tag.region.end, tag.right);
                let closed = std::mem::replace(body, next);
                branches.push(Branch {
                    condition: previous,
                    body: self.finish(closed, tag),
                });
                *open_condition = condition;

                Ok(None)
            }
            Keyword::EndIf => {
                let tag = self.close_tag(begin, location)?;
                match states.pop() {
                    Some(BlockState::If {
                        mut branches,
                        condition,
                        body,
                        open,
                    }) => {
                        let body = self.finish(body, tag);
                        let else_branch = match condition {
                            Some(condition) => {
                                branches.push(Branch { condition, body });
                                None
                            }
                            None => Some(body),
                        };
                        let id = self.id();
                        self.record(id, open, tag, true);

                        Ok(Some(Tree::If(IfElse {
                            id,
                            branches,
                            else_branch,
                            region: open.region.combine(tag.region),
                            location: open.location,
                        })))
                    }
                    state => Err(self.error_mismatch(state.as_ref(), tag, keyword)),
                }
            }
            Keyword::For => {
                let (first, _) = self.parse_ident()?;
                let set = if self.next_is(Token::Comma)? {
                    self.next_must(Token::Comma)?;
                    let (second, _) = self.parse_ident()?;
                    LoopVariables::KeyValue(first, second)
                } else {
                    LoopVariables::Item(first)
                };
                self.next_must(Token::Keyword(Keyword::In))?;
                let iterable = self.parse_expression()?;
                let open = self.close_tag(begin, location)?;
                let body = self.scope(open.region.end, open.right);
                states.push(BlockState::For {
                    set,
                    iterable,
                    body,
                    open,
                });

                Ok(None)
            }
            Keyword::EndFor => {
                let tag = self.close_tag(begin, location)?;
                match states.pop() {
                    Some(BlockState::For {
                        set,
                        iterable,
                        body,
                        open,
                    }) => {
                        let body = self.finish(body, tag);
                        let id = self.id();
                        self.record(id, open, tag, true);

                        Ok(Some(Tree::For(ForLoop {
                            id,
                            set,
                            iterable,
                            body,
                            region: open.region.combine(tag.region),
                            location: open.location,
                        })))
                    }
                    state => Err(self.error_mismatch(state.as_ref(), tag, keyword)),
                }
            }
            Keyword::Block => {
                let (name, _) = self.parse_ident()?;
                let open = self.close_tag(begin, location)?;
                let body = self.scope(open.region.end, open.right);
                states.push(BlockState::Block { name, body, open });

                Ok(None)
            }
            Keyword::EndBlock => {
                let closing_name = if self.next_is(Token::Identifier)? {
                    Some(self.parse_ident()?)
                } else {
                    None
                };
                let tag = self.close_tag(begin, location)?;
                match states.pop() {
                    Some(BlockState::Block { name, body, open }) => {
                        if let Some((closing_name, region)) = closing_name {
                            if closing_name != name {
                                return Err(Error::new(ErrorKind::Syntax, UNEXPECTED_BLOCK)
                                    .with_pointer(self.lexer.source, region)
                                    .with_help(format!(
                                        "expected `endblock {name}` to match the open block"
                                    )));
                            }
                        }
                        let body = self.finish(body, tag);
                        let id = self.id();
                        self.record(id, open, tag, true);

                        Ok(Some(Tree::Block(Block {
                            id,
                            name,
                            body,
                            region: open.region.combine(tag.region),
                            location: open.location,
                        })))
                    }
                    state => Err(self.error_mismatch(state.as_ref(), tag, keyword)),
                }
            }
            Keyword::Extends => {
                let name = self.parse_string_token()?;
                let tag = self.close_tag(begin, location)?;
                if extends.is_some() {
                    return Err(Error::new(ErrorKind::Syntax, UNEXPECTED_BLOCK)
                        .with_pointer(self.lexer.source, tag.region)
                        .with_help("a template may only extend one parent"));
                }
                *extends = Some(tag.region);
                let id = self.id();
                self.record(id, tag, tag, false);

                Ok(Some(Tree::Extends(Extends {
                    id,
                    name,
                    region: tag.region,
                    location,
                })))
            }
            Keyword::Include => {
                let name = self.parse_string_token()?;
                let mut mounts = vec![];
                if self.next_is(Token::Keyword(Keyword::With))? {
                    self.next_must(Token::Keyword(Keyword::With))?;
                    loop {
                        let (name, _) = self.parse_ident()?;
                        self.next_must(Token::Colon)?;
                        let value = self.parse_expression()?;
                        mounts.push(Mount { name, value });

                        if !self.next_is(Token::Comma)? {
                            break;
                        }
                        self.next_must(Token::Comma)?;
                    }
                }
                let tag = self.close_tag(begin, location)?;
                let id = self.id();
                self.record(id, tag, tag, false);

                Ok(Some(Tree::Include(Include {
                    id,
                    name,
                    mounts,
                    region: tag.region,
                    location,
                })))
            }
            Keyword::Not | Keyword::In | Keyword::With => {
                Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                    .with_pointer(self.lexer.source, keyword_region)
                    .with_help(expected_keyword(format!("`{keyword}`"))))
            }
        }
    }

    /// Consume the end of a tag and return a [`Tag`] spanning it.
    fn close_tag(&mut self, begin: Lexeme, location: Location) -> Result<Tag, Error> {
        let end = self.next_must(Token::EndBlock)?;

        Ok(Tag {
            region: begin.region.combine(end.region),
            location,
            left: begin.trim,
            right: end.trim,
        })
    }

    /// Create a new [`Scope`] beginning at the given position.
    fn scope(&mut self, begin: usize, inner_left: bool) -> Scope {
        let region: Region = (begin..begin).into();
        let scope = Scope::new(self.id(), region, self.locate(region));
        self.trim
            .insert(scope.id, TrimMode::when(inner_left, TrimMode::INNER_LEFT));

        scope
    }

    /// Close a body [`Scope`] at the beginning of the given [`Tag`].
    fn finish(&mut self, mut scope: Scope, tag: Tag) -> Scope {
        scope.region.end = tag.region.begin;
        self.trim
            .insert(scope.id, TrimMode::when(tag.left, TrimMode::INNER_RIGHT));

        scope
    }

    /// Record the [`TrimMode`] of a node from its opening and closing tags.
    fn record(&mut self, id: NodeId, open: Tag, close: Tag, inner: bool) {
        let mut mode = TrimMode::when(open.left, TrimMode::LEFT)
            | TrimMode::when(close.right, TrimMode::RIGHT);
        if inner {
            mode |= TrimMode::when(open.right, TrimMode::INNER_LEFT)
                | TrimMode::when(close.left, TrimMode::INNER_RIGHT);
        }

        self.trim.insert(id, mode);
    }

    /// Return an [`Error`] describing a closing tag that does not match the
    /// open block.
    fn error_mismatch(&self, state: Option<&BlockState>, tag: Tag, found: Keyword) -> Error {
        let error = Error::new(ErrorKind::Syntax, UNEXPECTED_BLOCK)
            .with_pointer(self.lexer.source, tag.region);

        match state {
            Some(state) => {
                let (open, close) = state.keywords();
                error.with_help(format!(
                    "expected `{close}` to close the `{open}` block at {}, found `{found}`",
                    state.open().location
                ))
            }
            None => error.with_help(format!("`{found}` does not close any open block")),
        }
    }

    /// Enter one more level of expression nesting.
    ///
    /// # Errors
    ///
    /// Returns an error past [`MAX_NESTING`] levels, before the tree grows
    /// deep enough to exhaust the stack.
    fn descend(&mut self, region: Region) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_nesting(region, "expressions"));
        }

        Ok(())
    }

    fn error_nesting(&self, region: Region, what: &str) -> Error {
        Error::new(ErrorKind::Syntax, NESTING_TOO_DEEP)
            .with_pointer(self.lexer.source, region)
            .with_help(format!("{what} may nest at most `{MAX_NESTING}` levels deep"))
    }

    /// Parse an expression.
    ///
    /// An expression is anything that can be evaluated to a value, from a
    /// literal to a chain of filters on the result of an operation.
    fn parse_expression(&mut self) -> Result<Expression, Error> {
        self.parse_binary(1)
    }

    /// Parse binary operations binding at least as tightly as `minimum`.
    ///
    /// All operators are left associative.
    fn parse_binary(&mut self, minimum: u8) -> Result<Expression, Error> {
        let mark = self.depth;
        let mut left = self.parse_unary()?;

        loop {
            let (operator, region) = match self.peek()? {
                Some(Lexeme {
                    token: Token::Operator(operator),
                    region,
                    ..
                }) if precedence(operator) >= minimum => (operator, region),
                _ => break,
            };
            self.next()?;
            self.descend(region)?;

            let right = self.parse_binary(precedence(operator) + 1)?;
            left = Expression::Binary(Binary {
                operator,
                region: left.region().combine(right.region()),
                operator_region: region,
                location: self.locate(region),
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        self.depth = mark;

        Ok(left)
    }

    /// Parse a unary operation, or fall through to a postfix expression.
    ///
    /// A negated number literal becomes a negative literal.
    fn parse_unary(&mut self) -> Result<Expression, Error> {
        match self.peek()? {
            Some(Lexeme {
                token: Token::Keyword(Keyword::Not) | Token::Exclamation,
                region,
                ..
            }) => {
                self.next()?;
                self.descend(region)?;
                let operand = self.parse_unary()?;
                self.depth -= 1;

                Ok(maybe_negate(region, operand))
            }
            Some(Lexeme {
                token: Token::Operator(Operator::Subtract),
                region,
                ..
            }) => {
                self.next()?;
                self.descend(region)?;
                let operand = self.parse_unary()?;
                self.depth -= 1;
                let location = self.locate(region);
                let region = region.combine(operand.region());

                if let Expression::Literal(Literal {
                    value: Value::Number(number),
                    ..
                }) = &operand
                {
                    if let Some(negated) = negative(number) {
                        return Ok(Expression::Literal(Literal {
                            value: Value::Number(negated),
                            region,
                            location,
                        }));
                    }
                }

                Ok(Expression::Unary(Prefix {
                    operator: Unary::Negate,
                    operand: Box::new(operand),
                    region,
                    location,
                }))
            }
            _ => self.parse_postfix(),
        }
    }

    /// Parse a primary expression followed by any amount of filters.
    fn parse_postfix(&mut self) -> Result<Expression, Error> {
        // {{ name | prepend("hello, ") | append("!") | upper }}
        let mark = self.depth;
        let mut expression = self.parse_primary()?;

        while self.next_is(Token::Pipe)? {
            self.next_must(Token::Pipe)?;
            let (name, name_region) = self.parse_ident()?;
            self.descend(name_region)?;
            let (arguments, end) = if self.next_is(Token::LeftParen)? {
                self.next_must(Token::LeftParen)?;
                self.parse_sequence(Token::RightParen)?
            } else {
                (vec![], name_region)
            };

            expression = Expression::Filter(Filter {
                region: expression.region().combine(end),
                name_region,
                location: self.locate(name_region),
                receiver: Box::new(expression),
                name,
                arguments,
            });
        }
        self.depth = mark;

        Ok(expression)
    }

    /// Parse a primary expression.
    ///
    /// ## Literal
    ///
    /// "hello world", 1000, 10.2, true, null
    ///
    /// ## Variable
    ///
    /// person.name
    ///
    /// ## Call
    ///
    /// range(1, 10)
    ///
    /// ## Group and List
    ///
    /// (a + b), [1, 2, 3]
    fn parse_primary(&mut self) -> Result<Expression, Error> {
        let lexeme = self.next_any_must()?;
        let region = lexeme.region;
        let location = self.locate(region);

        let literal = |value: Value| {
            Ok(Expression::Literal(Literal {
                value,
                region,
                location,
            }))
        };

        match lexeme.token {
            Token::String => literal(Value::String(self.parse_string(region)?)),
            Token::Number => literal(Value::Number(self.parse_number(region)?)),
            Token::True => literal(Value::Bool(true)),
            Token::False => literal(Value::Bool(false)),
            Token::Null => literal(Value::Null),
            Token::Identifier => {
                let name = region.literal(self.lexer.source).to_owned();

                if self.next_is(Token::LeftParen)? {
                    self.next_must(Token::LeftParen)?;
                    self.descend(region)?;
                    let (arguments, end) = self.parse_sequence(Token::RightParen)?;
                    self.depth -= 1;

                    return Ok(Expression::Call(Call {
                        name,
                        arguments,
                        region: region.combine(end),
                        name_region: region,
                        location,
                    }));
                }

                // Keep chaining keys as long as we see a period.
                let mut path = vec![];
                let mut end = region;
                while self.next_is(Token::Period)? {
                    self.next_must(Token::Period)?;
                    let (key, key_region) = self.parse_key()?;
                    path.push(key);
                    end = key_region;
                }

                Ok(Expression::Variable(Variable {
                    name,
                    path,
                    region: region.combine(end),
                    location,
                }))
            }
            Token::LeftParen => {
                self.descend(region)?;
                let expression = self.parse_expression()?;
                self.depth -= 1;
                self.next_must(Token::RightParen)?;

                Ok(expression)
            }
            Token::LeftBracket => {
                self.descend(region)?;
                let (items, end) = self.parse_sequence(Token::RightBracket)?;
                self.depth -= 1;

                Ok(Expression::List(List {
                    items,
                    region: region.combine(end),
                    location,
                }))
            }
            token => Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                .with_pointer(self.lexer.source, region)
                .with_help(format!(
                    "expected a literal, a variable, a function call, `(` or `[`, found {token}"
                ))),
        }
    }

    /// Parse comma separated expressions up to the given closing token.
    ///
    /// Assumes the opening token was consumed. Returns the expressions and
    /// the [`Region`] of the closing token.
    fn parse_sequence(&mut self, close: Token) -> Result<(Vec<Expression>, Region), Error> {
        let mut items = vec![];

        loop {
            if self.next_is(close)? {
                let end = self.next_must(close)?;
                return Ok((items, end.region));
            }
            items.push(self.parse_expression()?);

            if !self.next_is(close)? {
                self.next_must(Token::Comma)?;
            }
        }
    }

    /// Parse a Keyword.
    ///
    /// # Errors
    ///
    /// Returns an error if the next token is not a Keyword.
    fn parse_keyword(&mut self) -> Result<(Keyword, Region), Error> {
        match self.next_any_must()? {
            Lexeme {
                token: Token::Keyword(keyword),
                region,
                ..
            } => Ok((keyword, region)),
            Lexeme { token, region, .. } => Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                .with_help(expected_keyword(token))
                .with_pointer(self.lexer.source, region)),
        }
    }

    /// Parse an identifier and return its text.
    fn parse_ident(&mut self) -> Result<(String, Region), Error> {
        let lexeme = self.next_must(Token::Identifier)?;

        Ok((
            lexeme.region.literal(self.lexer.source).to_owned(),
            lexeme.region,
        ))
    }

    /// Parse a Key.
    ///
    /// # Errors
    ///
    /// Returns an error if the next token is not a valid key such as "one.two"
    /// or "items.0".
    fn parse_key(&mut self) -> Result<(String, Region), Error> {
        match self.next_any_must()? {
            Lexeme {
                token: Token::Identifier | Token::Number,
                region,
                ..
            } => Ok((region.literal(self.lexer.source).to_owned(), region)),
            Lexeme { region, .. } => Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                .with_pointer(self.lexer.source, region)
                .with_help("expected an unquoted identifier such as `one.two`")),
        }
    }

    /// Parse a string literal token and return the unescaped text.
    fn parse_string_token(&mut self) -> Result<String, Error> {
        let lexeme = self.next_must(Token::String)?;

        self.parse_string(lexeme.region)
    }

    /// Parse a String from the literal value of the given Region.
    ///
    /// # Errors
    ///
    /// Returns an error if an unrecognized escape character is found.
    fn parse_string(&self, region: Region) -> Result<String, Error> {
        let window = region.literal(self.lexer.source);
        let mut chars = window.chars();
        // Surrounding quotes.
        chars.next();
        chars.next_back();

        let mut string = String::with_capacity(window.len());
        while let Some(c) = chars.next() {
            if c != '\\' {
                string.push(c);
                continue;
            }

            let escaped = match chars.next() {
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('\\') => '\\',
                Some('"') => '"',
                Some('\'') => '\'',
                _ => {
                    return Err(Error::new(ErrorKind::Syntax, "unexpected escape character")
                        .with_pointer(self.lexer.source, region)
                        .with_help(
                            "recognized escapes are `\\n`, `\\r`, `\\t`, `\\\\`, `\\\"` and `\\'`",
                        ))
                }
            };
            string.push(escaped);
        }

        Ok(string)
    }

    /// Parse a [`Number`] from the literal value of the given [`Region`].
    ///
    /// # Errors
    ///
    /// Returns an error if the literal value of the Region cannot be converted
    /// to a `Number`.
    fn parse_number(&self, region: Region) -> Result<Number, Error> {
        region.literal(self.lexer.source).parse().map_err(|_| {
            Error::new(ErrorKind::Syntax, "unrecognizable number")
                .with_pointer(self.lexer.source, region)
                .with_help("numbers must not end with a decimal or contain more than one")
        })
    }

    /// Return a new [`NodeId`].
    fn id(&mut self) -> NodeId {
        let id = NodeId::new(self.counter);
        self.counter += 1;

        id
    }

    /// Return the [`Location`] of the given [`Region`].
    #[inline]
    fn locate(&self, region: Region) -> Location {
        self.lines.locate(region)
    }

    /// Peek the next token.
    ///
    /// # Errors
    ///
    /// Propagates any error reported by the underlying Lexer.
    fn peek(&mut self) -> TokenResult {
        if let o @ None = &mut self.buffer {
            *o = Some(self.lexer.next()?);
        }

        Ok(self.buffer.flatten())
    }

    /// Get the next token.
    ///
    /// Prefers to pull a token from the internal buffer first, but will pull from
    /// the lexer when the buffer is empty.
    fn next(&mut self) -> TokenResult {
        match self.buffer.take() {
            Some(t) => Ok(t),
            None => self.lexer.next(),
        }
    }

    /// Returns true if the given token matches the upcoming token.
    ///
    /// # Errors
    ///
    /// Propagates any errors reported by the underlying lexer.
    fn next_is(&mut self, expect: Token) -> Result<bool, Error> {
        Ok(self
            .peek()?
            .map(|lexeme| lexeme.token == expect)
            .unwrap_or(false))
    }

    /// Get the next token, and compare it to the given token.
    ///
    /// # Errors
    ///
    /// An error is returned if the next token does not match the given token,
    /// or when [next()] returns None.
    fn next_must(&mut self, expect: Token) -> Result<Lexeme, Error> {
        match self.next()? {
            Some(lexeme) if lexeme.token == expect => Ok(lexeme),
            Some(lexeme) => Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                .with_pointer(self.lexer.source, lexeme.region)
                .with_help(format!("expected {expect}, found {}", lexeme.token))),
            None => Err(error_eof(self.lexer.source).with_help(format!("expected {expect}"))),
        }
    }

    /// Get the next token.
    ///
    /// Similar to "next()" but requires that a token is returned.
    ///
    /// # Errors
    ///
    /// An error is returned if no more tokens are left.
    fn next_any_must(&mut self) -> Result<Lexeme, Error> {
        match self.next()? {
            Some(lexeme) => Ok(lexeme),
            None => Err(error_eof(self.lexer.source)),
        }
    }
}

/// Return the binding power of a binary [`Operator`], higher binds tighter.
fn precedence(operator: Operator) -> u8 {
    match operator {
        Operator::Or => 1,
        Operator::And => 2,
        Operator::Equal
        | Operator::NotEqual
        | Operator::Greater
        | Operator::Lesser
        | Operator::GreaterOrEqual
        | Operator::LesserOrEqual => 3,
        Operator::Concat => 4,
        Operator::Add | Operator::Subtract => 5,
        Operator::Multiply | Operator::Divide | Operator::Modulo => 6,
    }
}

/// Wrap the operand in a [`Unary::Not`], reusing the operand's location.
fn maybe_negate(region: Region, operand: Expression) -> Expression {
    let location = operand.location();

    Expression::Unary(Prefix {
        operator: Unary::Not,
        region: region.combine(operand.region()),
        operand: Box::new(operand),
        location,
    })
}

/// Return the negative of the given [`Number`].
fn negative(number: &Number) -> Option<Number> {
    if let Some(integer) = number.as_i64() {
        if let Some(negated) = integer.checked_neg() {
            return Some(Number::from(negated));
        }
    }

    number.as_f64().and_then(|float| Number::from_f64(-float))
}
