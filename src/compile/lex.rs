pub mod token;

mod state;

use crate::{
    compile::{
        lex::{
            state::CursorState,
            token::{Lexeme, Token},
        },
        Keyword, Operator,
    },
    log::{expected_operator, Error, ErrorKind, INVALID_SYNTAX, UNEXPECTED_TOKEN},
    syntax::Marker,
};

use morel::Finder;

/// Result of reading the next [`Lexeme`].
pub type TokenResult = Result<Option<Lexeme>, Error>;

/// Provides methods to read a source string as [`Lexeme`] instances.
pub struct Lexer<'source> {
    /// Reference to the source text.
    pub source: &'source str,
    /// Position within source.
    pub cursor: usize,
    /// Compiled [`Finder`] instance used to search for markers
    /// in the source text.
    finder: &'source Finder,
    /// Tracks the [`Lexer`] state and determines the action taken
    /// when `.next` is called.
    state: CursorState,
    /// Temporary storage for the a [`Lexeme`] that will be read
    /// on the following call to `.next`
    buffer: Option<Lexeme>,
}

impl<'source> Lexer<'source> {
    /// Create a new [`Lexer`] from the given source and [`Finder`].
    #[inline]
    pub fn new(source: &'source str, finder: &'source Finder) -> Self {
        Self {
            finder,
            state: CursorState::Default,
            source,
            cursor: 0,
            buffer: None,
        }
    }

    /// Return the next [`Lexeme`].
    ///
    /// Any instance of [`Token::Whitespace`] is ignored, and so are comments.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an unexpected [`Token`] is found.
    pub fn next(&mut self) -> TokenResult {
        loop {
            // Always prefer taking from the buffer when possible.
            if let Some(next) = self.buffer.take() {
                return Ok(Some(next));
            }
            if self.cursor >= self.source.len() {
                return Ok(None);
            }

            let c = self.cursor;
            let result = match self.state {
                CursorState::Default => self.lex_default(c),
                CursorState::Inside { .. } => self.lex_tag(c),
            }?;

            match result {
                Some(lexeme) if lexeme.token == Token::Whitespace => continue,
                Some(lexeme) => return Ok(Some(lexeme)),
                // A comment was skipped, the cursor has moved past it.
                None => continue,
            }
        }
    }

    /// Return the next [`Lexeme`] in [`Tag`][`CursorState::Inside`]
    /// configuration.
    ///
    /// Assumes the cursor is inside of an expression or block.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an unexpected [`Token`] is found.
    fn lex_tag(&mut self, from: usize) -> TokenResult {
        if let Some((id, end)) = self.finder.starts(self.source, from) {
            let end_token = match self.state {
                CursorState::Inside { end_token } => end_token,
                CursorState::Default => Token::EndBlock,
            };

            return match Marker::try_from(id).ok().and_then(Token::from_marker) {
                Some((token, trim)) if token == end_token => {
                    self.state = CursorState::Default;
                    self.cursor = end;

                    Ok(Some(Lexeme::trimmed(token, from..end, trim)))
                }
                _ => {
                    let which = if end_token == Token::EndExpression {
                        "expression"
                    } else {
                        "block"
                    };

                    Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                        .with_pointer(self.source, from..end)
                        .with_help(format!("did you close the previous {which}?")))
                }
            };
        }

        let mut iterator = self.source[from..]
            .char_indices()
            .map(|(d, c)| (from + d, c));
        let Some((index, char)) = iterator.next() else {
            return Ok(None);
        };

        let mut advance = |length: usize, token: Token| {
            self.cursor = from + length;

            Ok(Some(Lexeme::new(token, from..from + length)))
        };

        match char {
            '*' => advance(1, Token::Operator(Operator::Multiply)),
            '+' => advance(1, Token::Operator(Operator::Add)),
            '/' => advance(1, Token::Operator(Operator::Divide)),
            '-' => advance(1, Token::Operator(Operator::Subtract)),
            '%' => advance(1, Token::Operator(Operator::Modulo)),
            '~' => advance(1, Token::Operator(Operator::Concat)),
            '.' => advance(1, Token::Period),
            ',' => advance(1, Token::Comma),
            ':' => advance(1, Token::Colon),
            '(' => advance(1, Token::LeftParen),
            ')' => advance(1, Token::RightParen),
            '[' => advance(1, Token::LeftBracket),
            ']' => advance(1, Token::RightBracket),
            '"' | '\'' => self.lex_string(iterator, index, char),
            '=' | '!' | '>' | '<' | '|' | '&' => self.lex_operator(iterator, index, char),
            c if c.is_whitespace() => Ok(Some(self.lex_whitespace(iterator, index))),
            c if c.is_ascii_digit() => Ok(Some(self.lex_digit(iterator, index))),
            c if is_ident_start(c) => Ok(Some(self.lex_ident_or_keyword(iterator, index))),
            _ => Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                .with_pointer(self.source, index..index + char.len_utf8())
                .with_help(
                    "expected an operator, an identifier, an ascii digit, punctuation \
                    such as `.`, `,`, `(` or `[`, or a string literal marked with `\"`",
                )),
        }
    }

    /// Return a [`Lexeme`] based on the previous character.
    ///
    /// Checks the next character via `.next` to ensure the correct `Token` is
    /// returned. All of these are recognized:
    ///
    /// `==`, `!=`, `>=`, `<=`, `||`, `&&`, `|`, `!`, `>`, `<`
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an unexpected [`Token`] is found.
    fn lex_operator<T>(&mut self, mut iter: T, from: usize, previous: char) -> TokenResult
    where
        T: Iterator<Item = (usize, char)>,
    {
        let (position, token) = match (previous, iter.next()) {
            // Double:
            ('=', Some((usize, '='))) => (usize, Token::Operator(Operator::Equal)),
            ('!', Some((usize, '='))) => (usize, Token::Operator(Operator::NotEqual)),
            ('>', Some((usize, '='))) => (usize, Token::Operator(Operator::GreaterOrEqual)),
            ('<', Some((usize, '='))) => (usize, Token::Operator(Operator::LesserOrEqual)),
            ('|', Some((usize, '|'))) => (usize, Token::Operator(Operator::Or)),
            ('&', Some((usize, '&'))) => (usize, Token::Operator(Operator::And)),
            // Single:
            ('|', _) => (from, Token::Pipe),
            ('!', _) => (from, Token::Exclamation),
            ('>', _) => (from, Token::Operator(Operator::Greater)),
            ('<', _) => (from, Token::Operator(Operator::Lesser)),
            _ => {
                return Err(Error::new(ErrorKind::Syntax, UNEXPECTED_TOKEN)
                    .with_pointer(self.source, from..from + 1)
                    .with_help(expected_operator(previous)));
            }
        };
        let position = position + 1;
        self.cursor = position;

        Ok(Some(Lexeme::new(token, from..position)))
    }

    /// Return a [`Lexeme`] containing [`Token::Number`].
    fn lex_digit<T>(&mut self, mut iter: T, from: usize) -> Lexeme
    where
        T: Iterator<Item = (usize, char)>,
    {
        let to = loop {
            match iter.next() {
                Some((index, char)) if !is_number(char) => break index,
                Some(_) => continue,
                None => break self.source.len(),
            }
        };
        self.cursor = to;

        Lexeme::new(Token::Number, from..to)
    }

    /// Return a [`Lexeme`] containing [`Token::Whitespace`].
    fn lex_whitespace<T>(&mut self, mut iter: T, from: usize) -> Lexeme
    where
        T: Iterator<Item = (usize, char)>,
    {
        let to = loop {
            match iter.next() {
                Some((index, char)) if !char.is_whitespace() => break index,
                Some(_) => continue,
                None => break self.source.len(),
            }
        };
        self.cursor = to;

        Lexeme::new(Token::Whitespace, from..to)
    }

    /// Return a [`Lexeme`] containing [`Token::String`] using the given
    /// iterator.
    ///
    /// The region includes the surrounding quotes, the parser is responsible
    /// for processing escapes.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the string is never closed.
    fn lex_string<T>(&mut self, mut iter: T, from: usize, quote: char) -> TokenResult
    where
        T: Iterator<Item = (usize, char)>,
    {
        let mut escaped = false;
        loop {
            match iter.next() {
                Some((index, char)) if char == quote && !escaped => {
                    // Add the width of the quote to comply with string slice
                    // semantics.
                    let to = index + quote.len_utf8();
                    self.cursor = to;

                    return Ok(Some(Lexeme::new(Token::String, from..to)));
                }
                Some((_, char)) => escaped = char == '\\' && !escaped,
                None => {
                    return Err(Error::new(ErrorKind::Syntax, INVALID_SYNTAX)
                        .with_pointer(self.source, from..from + quote.len_utf8())
                        .with_help(format!(
                            "this might be an undelimited string, try closing it with `{quote}`"
                        )));
                }
            }
        }
    }

    /// Return a [`Lexeme`] from the given iterator.
    ///
    /// The `Token` will be an identifier, keyword, word operator or literal.
    fn lex_ident_or_keyword<T>(&mut self, mut iter: T, from: usize) -> Lexeme
    where
        T: Iterator<Item = (usize, char)>,
    {
        let to = loop {
            match iter.next() {
                Some((index, char)) if !is_ident_continue(char) => break index,
                Some(_) => continue,
                None => break self.source.len(),
            }
        };

        let token = match &self.source[from..to] {
            "not" => Token::Keyword(Keyword::Not),
            "and" => Token::Operator(Operator::And),
            "or" => Token::Operator(Operator::Or),
            "if" => Token::Keyword(Keyword::If),
            "elif" | "elseif" => Token::Keyword(Keyword::ElseIf),
            "else" => Token::Keyword(Keyword::Else),
            "endif" => Token::Keyword(Keyword::EndIf),
            "for" => Token::Keyword(Keyword::For),
            "in" => Token::Keyword(Keyword::In),
            "endfor" => Token::Keyword(Keyword::EndFor),
            "block" => Token::Keyword(Keyword::Block),
            "endblock" => Token::Keyword(Keyword::EndBlock),
            "extends" => Token::Keyword(Keyword::Extends),
            "include" => Token::Keyword(Keyword::Include),
            "with" => Token::Keyword(Keyword::With),
            "true" | "True" => Token::True,
            "false" | "False" => Token::False,
            "null" | "none" | "None" => Token::Null,
            _ => Token::Identifier,
        };
        self.cursor = to;

        Lexeme::new(token, from..to)
    }

    /// Return the next [`Lexeme`] in [`Tag`][`CursorState::Default`]
    /// configuration.
    ///
    /// Assumes the cursor is outside of an expression. Stray ending markers
    /// are treated as raw text, comments are skipped.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a comment is never closed.
    fn lex_default(&mut self, from: usize) -> TokenResult {
        let mut search = from;

        loop {
            let Some((id, marker_begin, marker_end)) = self.finder.next(self.source, search)
            else {
                self.cursor = self.source.len();

                return Ok(Some(Lexeme::new(Token::Raw, from..self.source.len())));
            };

            let marker = match Marker::try_from(id) {
                Ok(marker) => marker,
                Err(_) => {
                    search = marker_end;
                    continue;
                }
            };

            let (token, trim) = match marker {
                Marker::BeginComment => {
                    self.cursor = self.skip_comment(marker_begin, marker_end)?;

                    return Ok((from < marker_begin)
                        .then(|| Lexeme::new(Token::Raw, from..marker_begin)));
                }
                Marker::BeginExpression | Marker::BeginExpressionTrim => {
                    self.state = CursorState::Inside {
                        end_token: Token::EndExpression,
                    };
                    (Token::BeginExpression, marker == Marker::BeginExpressionTrim)
                }
                Marker::BeginBlock | Marker::BeginBlockTrim => {
                    self.state = CursorState::Inside {
                        end_token: Token::EndBlock,
                    };
                    (Token::BeginBlock, marker == Marker::BeginBlockTrim)
                }
                Marker::EndExpression
                | Marker::EndExpressionTrim
                | Marker::EndBlock
                | Marker::EndBlockTrim
                | Marker::EndComment => {
                    search = marker_end;
                    continue;
                }
            };

            let lexeme = Lexeme::trimmed(token, marker_begin..marker_end, trim);
            self.cursor = marker_end;

            return if from == marker_begin {
                Ok(Some(lexeme))
            } else {
                self.buffer = Some(lexeme);

                Ok(Some(Lexeme::new(Token::Raw, from..marker_begin)))
            };
        }
    }

    /// Return the position after the end of the comment beginning at the
    /// given marker.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the comment is never closed.
    fn skip_comment(&self, marker_begin: usize, marker_end: usize) -> Result<usize, Error> {
        let mut search = marker_end;
        while let Some((id, _, end)) = self.finder.next(self.source, search) {
            if Marker::try_from(id) == Ok(Marker::EndComment) {
                return Ok(end);
            }
            search = end;
        }

        Err(Error::new(ErrorKind::Syntax, INVALID_SYNTAX)
            .with_pointer(self.source, marker_begin..marker_end)
            .with_help("this comment is never closed"))
    }
}

/// Return true if the given character is a recognized beginning identifier,
/// meaning '_' or an `xid_start`.
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

/// Return true if the given character is a recognized continue identifier,
/// meaning an `xid_continue`.
fn is_ident_continue(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

/// Return true if the given character is a number (0-9) or a period.
fn is_number(c: char) -> bool {
    matches!(c, '0'..='9' | '.')
}

#[cfg(test)]
mod tests {
    use super::Lexer;
    use crate::{
        compile::{
            lex::{state::CursorState, token::Lexeme, Token},
            Keyword, Operator,
        },
        log::Error,
        region::Region,
        Builder,
    };

    use morel::Finder;

    #[test]
    fn test_lex_default_no_match() {
        let expect = vec![(Token::Raw, 0..11)];

        helper_lex_next_auto("lorem ipsum", expect)
    }

    #[test]
    fn test_lex_default_match_no_trim() {
        let expect = vec![
            (Token::Raw, 0..12),
            (Token::BeginExpression, 12..14),
            (Token::Identifier, 15..20),
        ];

        helper_lex_next_auto("lorem ipsum {{ dolor", expect);
    }

    #[test]
    fn test_lex_default_match_trim_keeps_text() {
        let finder = Finder::new(Builder::new().to_syntax());
        let mut lexer = Lexer::new("lorem ipsum {{- dolor -}}", &finder);

        assert_eq!(lexer.next(), Ok(Some(Lexeme::new(Token::Raw, 0..12))));
        assert_eq!(
            lexer.next(),
            Ok(Some(Lexeme::trimmed(Token::BeginExpression, 12..15, true)))
        );
        assert_eq!(
            lexer.next(),
            Ok(Some(Lexeme::new(Token::Identifier, 16..21)))
        );
        assert_eq!(
            lexer.next(),
            Ok(Some(Lexeme::trimmed(Token::EndExpression, 22..25, true)))
        );
        assert_eq!(lexer.next(), Ok(None));
    }

    #[test]
    fn test_lex_state_change() -> Result<(), Error> {
        let finder = Finder::new(Builder::new().to_syntax());
        let mut block_lexer = Lexer::new("lorem {%", &finder);
        let mut expression_lexer = Lexer::new("lorem {{", &finder);
        block_lexer.next()?;
        expression_lexer.next()?;

        assert_eq!(
            block_lexer.state,
            CursorState::Inside {
                end_token: Token::EndBlock
            }
        );
        assert_eq!(
            expression_lexer.state,
            CursorState::Inside {
                end_token: Token::EndExpression
            }
        );

        Ok(())
    }

    #[test]
    fn test_lex_digit() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::Number, 3..7),
            (Token::EndExpression, 8..10),
        ];

        helper_lex_next_auto("{{ 10.5 }}", expect);
    }

    #[test]
    fn test_lex_keyword_and_operators() {
        let expect = vec![
            (Token::BeginBlock, 0..2),
            (Token::Keyword(Keyword::If), 3..5),
            (Token::Keyword(Keyword::Not), 6..9),
            (Token::Identifier, 10..11),
            (Token::Operator(Operator::And), 12..15),
            (Token::Identifier, 16..17),
            (Token::Operator(Operator::GreaterOrEqual), 18..20),
            (Token::Number, 21..22),
            (Token::Operator(Operator::Or), 23..25),
            (Token::Exclamation, 26..27),
            (Token::Identifier, 27..28),
            (Token::EndBlock, 29..31),
        ];

        helper_lex_next_auto("{% if not a and b >= 1 || !c %}", expect);
    }

    #[test]
    fn test_lex_filter_call() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::Identifier, 3..8),
            (Token::Pipe, 9..10),
            (Token::Identifier, 11..15),
            (Token::LeftParen, 15..16),
            (Token::String, 16..20),
            (Token::RightParen, 20..21),
            (Token::Operator(Operator::Concat), 22..23),
            (Token::String, 24..27),
            (Token::EndExpression, 28..30),
        ];

        helper_lex_next_auto(r#"{{ items | join(", ") ~ "!" }}"#, expect);
    }

    #[test]
    fn test_lex_string_escape() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::String, 3..13),
            (Token::EndExpression, 14..16),
        ];

        helper_lex_next_auto(r#"{{ "\"name\"" }}"#, expect);
    }

    #[test]
    fn test_lex_string_escaped_backslash() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::String, 3..7),
            (Token::EndExpression, 8..10),
        ];

        helper_lex_next_auto(r#"{{ "\\" }}"#, expect);
    }

    #[test]
    fn test_lex_string_containing_marker() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::String, 3..7),
            (Token::EndExpression, 8..10),
        ];

        helper_lex_next_auto(r#"{{ "}}" }}"#, expect);
    }

    #[test]
    fn test_lex_comment_skipped() {
        let expect = vec![
            (Token::Raw, 0..2),
            (Token::Raw, 21..22),
            (Token::BeginExpression, 22..24),
            (Token::Identifier, 25..26),
            (Token::EndExpression, 27..29),
        ];

        helper_lex_next_auto("a {# {{ ignored }} #} {{ b }}", expect);
    }

    #[test]
    fn test_lex_unclosed_comment() {
        let finder = Finder::new(Builder::new().to_syntax());
        let mut lexer = Lexer::new("a {# never closed", &finder);

        assert!(lexer.next().is_err());
    }

    #[test]
    fn test_lex_stray_end_marker_is_raw() {
        helper_lex_next_auto(r#"{"a": {"b": 1}}"#, vec![(Token::Raw, 0..15)]);
    }

    #[test]
    fn test_error_multiple_opening_tags() {
        let expect = vec![
            (Token::Raw, 0..6),
            (Token::BeginExpression, 6..8),
            (Token::Identifier, 9..13),
        ];

        let finder = Finder::new(Builder::new().to_syntax());
        let mut lexer = Lexer::new("hello {{ name {{ }}", &finder);
        for (token, range) in expect {
            assert_eq!(lexer.next(), Ok(Some(Lexeme::new(token, range))))
        }

        assert!(lexer.next().is_err())
    }

    #[test]
    fn test_error_single_equal() {
        let finder = Finder::new(Builder::new().to_syntax());
        let mut lexer = Lexer::new("{{ a = b }}", &finder);
        lexer.next().unwrap();
        lexer.next().unwrap();

        assert!(lexer.next().is_err())
    }

    /// Helper function which takes in a source string, creates a lexer on that
    /// string and iterates [expect.len()] amount of times and compares the result
    /// against [lexer.next()].
    fn helper_lex_next_auto<T>(source: &str, expect: Vec<(Token, T)>)
    where
        T: Into<Region>,
    {
        let finder = Finder::new(Builder::new().to_syntax());
        let mut lexer = Lexer::new(source, &finder);
        for (token, region) in expect {
            let lexeme = lexer.next().unwrap().unwrap();
            assert_eq!((lexeme.token, lexeme.region), (token, region.into()));
        }

        assert_eq!(lexer.next(), Ok(None));
        assert_eq!(lexer.next(), Ok(None));
        assert_eq!(lexer.next(), Ok(None));
    }
}
