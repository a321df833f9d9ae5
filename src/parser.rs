use std::mem;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use thiserror::Error;

use crate::{
    ast::{
        Comparator, Condition, ConditionExpr, FieldExpr, FromExpr, KeyLiteral, KeyPathElement,
        Keyword, LimitExpr, OffsetExpr, OrderExpr, SelectExpr, SortOrder, Span, Token, TokenKind,
        ValueExpr,
    },
    entity::KeyId,
    lexer::{LexError, Lexer},
};

/// Bytes of query text shown on each side of an offending token.
const CONTEXT_WIDTH: usize = 16;

/// Errors raised while parsing a query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),

    #[error("unexpected {found}, expected {expected} (near `{context}`)")]
    UnexpectedToken {
        expected: String,
        found: Token,
        context: String,
    },

    #[error("invalid {what} literal `{literal}`: {reason} (near `{context}`)")]
    InvalidLiteral {
        what: &'static str,
        literal: String,
        reason: String,
        context: String,
    },
}

/// Parses a complete `SELECT` statement.
pub fn parse_query(query: &str) -> Result<SelectExpr, ParseError> {
    Parser::new(Lexer::new(query))?.parse()
}

/// Recursive-descent GQL parser with one token of lookahead.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
        })
    }

    /// Consumes the current token and returns it.
    fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(mem::replace(&mut self.current_token, next))
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current_token.kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current_token.is_keyword(keyword)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            self.advance()
        } else {
            Err(self.unexpected(kind.to_string()))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token, ParseError> {
        self.expect(TokenKind::Keyword(keyword))
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        if self.current_token.kind.is_name() {
            Ok(self.advance()?.literal)
        } else {
            Err(self.unexpected("name"))
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: self.current_token.clone(),
            context: self.context(self.current_token.span),
        }
    }

    fn invalid_literal(&self, what: &'static str, token: &Token, reason: impl ToString) -> ParseError {
        ParseError::InvalidLiteral {
            what,
            literal: token.literal.clone(),
            reason: reason.to_string(),
            context: self.context(token.span),
        }
    }

    /// Query text surrounding `span`.
    fn context(&self, span: Span) -> String {
        let input = self.lexer.input();

        let mut start = span.start.saturating_sub(CONTEXT_WIDTH);
        while !input.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = (span.end + CONTEXT_WIDTH).min(input.len());
        while !input.is_char_boundary(end) {
            end += 1;
        }
        input[start..end].to_string()
    }

    /// Parses a complete statement; anything after it is an error.
    pub fn parse(&mut self) -> Result<SelectExpr, ParseError> {
        let select = self.parse_select()?;
        self.expect(TokenKind::Eof)?;
        Ok(select)
    }

    fn parse_select(&mut self) -> Result<SelectExpr, ParseError> {
        self.expect_keyword(Keyword::Select)?;

        let mut select = SelectExpr {
            field: self.parse_field()?,
            ..SelectExpr::default()
        };

        if self.check_keyword(Keyword::From) {
            self.advance()?;
            select.from = Some(FromExpr {
                kind: self.expect_name()?,
            });
        }

        if self.check_keyword(Keyword::Where) {
            self.advance()?;
            select.conditions.push(self.parse_condition()?);
            while self.check_keyword(Keyword::And) {
                self.advance()?;
                select.conditions.push(self.parse_condition()?);
            }
        }

        if self.check_keyword(Keyword::Order) {
            self.advance()?;
            self.expect_keyword(Keyword::By)?;
            select.order = self.parse_order()?;
        }

        if self.check_keyword(Keyword::Limit) {
            self.advance()?;
            select.limit = Some(self.parse_limit()?);
        }

        if self.check_keyword(Keyword::Offset) {
            self.advance()?;
            select.offset = Some(self.parse_offset()?);
        }

        Ok(select)
    }

    fn parse_field(&mut self) -> Result<FieldExpr, ParseError> {
        let mut field = FieldExpr::default();

        if self.check_keyword(Keyword::Distinct) {
            self.advance()?;
            if self.check_keyword(Keyword::On) {
                self.advance()?;
                self.expect(TokenKind::LeftParen)?;
                field.distinct_on = self.parse_name_list()?;
                self.expect(TokenKind::RightParen)?;
            } else {
                field.distinct = true;
            }
        }

        if self.check(TokenKind::Asterisk) {
            self.advance()?;
            field.asterisk = true;
        } else {
            field.fields = self.parse_name_list()?;
        }

        Ok(field)
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = vec![self.expect_name()?];
        while self.check(TokenKind::Comma) {
            self.advance()?;
            names.push(self.expect_name()?);
        }
        Ok(names)
    }

    fn parse_condition(&mut self) -> Result<ConditionExpr, ParseError> {
        if self.current_token.kind.is_name() {
            let property = self.expect_name()?;

            let (comparator, value) = match self.current_token.kind {
                TokenKind::Keyword(Keyword::Is) => {
                    self.advance()?;
                    self.expect_keyword(Keyword::Null)?;
                    (Comparator::IsNull, None)
                }
                TokenKind::Keyword(Keyword::Contains) => {
                    self.advance()?;
                    (Comparator::Contains, Some(self.parse_value()?))
                }
                TokenKind::Keyword(Keyword::Has) => {
                    self.advance()?;
                    self.expect_keyword(Keyword::Ancestor)?;
                    (Comparator::HasAncestor, Some(self.parse_value()?))
                }
                _ => {
                    let comparator = self.parse_comparison()?;
                    (comparator, Some(self.parse_value()?))
                }
            };

            return Ok(ConditionExpr::Forward(Condition {
                property,
                comparator,
                value,
            }));
        }

        if !self.is_value_start() {
            return Err(self.unexpected("property name or value"));
        }
        let value = self.parse_value()?;

        let comparator = match self.current_token.kind {
            TokenKind::Keyword(Keyword::In) => {
                self.advance()?;
                Comparator::In
            }
            TokenKind::Keyword(Keyword::Has) => {
                self.advance()?;
                self.expect_keyword(Keyword::Descendant)?;
                Comparator::HasDescendant
            }
            _ => self.parse_comparison()?,
        };

        Ok(ConditionExpr::Backward(Condition {
            property: self.expect_name()?,
            comparator,
            value: Some(value),
        }))
    }

    /// `=`, `<`, `<=`, `>` or `>=`. The two halves of `<=`/`>=` must be adjacent.
    fn parse_comparison(&mut self) -> Result<Comparator, ParseError> {
        let (plain, or_equal) = match self.current_token.kind {
            TokenKind::Equal => {
                self.advance()?;
                return Ok(Comparator::Equals);
            }
            TokenKind::Less => (Comparator::Less, Comparator::LessEquals),
            TokenKind::Greater => (Comparator::Greater, Comparator::GreaterEquals),
            _ => return Err(self.unexpected("comparator")),
        };

        let first = self.advance()?;
        if self.check(TokenKind::Equal) && self.current_token.span.start == first.span.end {
            self.advance()?;
            Ok(or_equal)
        } else {
            Ok(plain)
        }
    }

    fn is_value_start(&self) -> bool {
        matches!(
            self.current_token.kind,
            TokenKind::Integer
                | TokenKind::Double
                | TokenKind::String
                | TokenKind::Keyword(
                    Keyword::True | Keyword::False | Keyword::Key | Keyword::Blob | Keyword::Datetime
                )
        )
    }

    fn parse_value(&mut self) -> Result<ValueExpr, ParseError> {
        match self.current_token.kind {
            TokenKind::Integer => Ok(ValueExpr::Integer(self.parse_integer()?)),
            TokenKind::Double => {
                let token = self.advance()?;
                token
                    .literal
                    .parse::<f64>()
                    .map(ValueExpr::Double)
                    .map_err(|e| self.invalid_literal("double", &token, e))
            }
            TokenKind::String => Ok(ValueExpr::String(self.advance()?.literal)),
            TokenKind::Keyword(Keyword::True) => {
                self.advance()?;
                Ok(ValueExpr::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance()?;
                Ok(ValueExpr::Bool(false))
            }
            TokenKind::Keyword(Keyword::Key) => Ok(ValueExpr::Key(self.parse_key_literal()?)),
            TokenKind::Keyword(Keyword::Blob) => self.parse_blob_literal(),
            TokenKind::Keyword(Keyword::Datetime) => self.parse_datetime_literal(),
            _ => Err(self.unexpected("value")),
        }
    }

    fn parse_integer(&mut self) -> Result<i64, ParseError> {
        let token = self.expect(TokenKind::Integer)?;
        token
            .literal
            .parse::<i64>()
            .map_err(|e| self.invalid_literal("integer", &token, e))
    }

    fn parse_order(&mut self) -> Result<Vec<OrderExpr>, ParseError> {
        let mut order = vec![];

        loop {
            let property = self.expect_name()?;
            let sort = if self.check_keyword(Keyword::Asc) {
                self.advance()?;
                SortOrder::Asc
            } else if self.check_keyword(Keyword::Desc) {
                self.advance()?;
                SortOrder::Desc
            } else {
                SortOrder::None
            };
            order.push(OrderExpr { property, sort });

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }

        Ok(order)
    }

    fn parse_limit(&mut self) -> Result<LimitExpr, ParseError> {
        match self.current_token.kind {
            TokenKind::Integer => Ok(LimitExpr {
                binding: None,
                number: Some(self.parse_integer()?),
            }),
            TokenKind::BindingSite => Ok(LimitExpr {
                binding: Some(self.advance()?.literal),
                number: None,
            }),
            TokenKind::Keyword(Keyword::First) => {
                self.advance()?;
                self.expect(TokenKind::LeftParen)?;
                let binding = self.expect(TokenKind::BindingSite)?.literal;
                self.expect(TokenKind::Comma)?;
                let number = self.parse_integer()?;
                self.expect(TokenKind::RightParen)?;
                Ok(LimitExpr {
                    binding: Some(binding),
                    number: Some(number),
                })
            }
            _ => Err(self.unexpected("integer, binding site or FIRST")),
        }
    }

    fn parse_offset(&mut self) -> Result<OffsetExpr, ParseError> {
        match self.current_token.kind {
            TokenKind::Integer => Ok(OffsetExpr {
                binding: None,
                number: Some(self.parse_integer()?),
            }),
            TokenKind::BindingSite => {
                let binding = self.advance()?.literal;

                // `@b + 12` scans as PLUS INTEGER, `@b +12` as a signed INTEGER
                let number = if self.check(TokenKind::Plus) {
                    self.advance()?;
                    Some(self.parse_integer()?)
                } else if self.check(TokenKind::Integer) && self.current_token.literal.starts_with('+') {
                    Some(self.parse_integer()?)
                } else {
                    None
                };

                Ok(OffsetExpr {
                    binding: Some(binding),
                    number,
                })
            }
            _ => Err(self.unexpected("integer or binding site")),
        }
    }
}

// Literal sub-grammars
impl Parser {
    /// `KEY([PROJECT('p'),] [NAMESPACE('n'),] kind, id, kind, id, ...)`
    fn parse_key_literal(&mut self) -> Result<KeyLiteral, ParseError> {
        self.expect_keyword(Keyword::Key)?;
        self.expect(TokenKind::LeftParen)?;

        let mut literal = KeyLiteral::default();

        if self.check_keyword(Keyword::Project) {
            self.advance()?;
            literal.project = Some(self.parse_parenthesized_string()?);
            self.expect(TokenKind::Comma)?;
        }

        if self.check_keyword(Keyword::Namespace) {
            self.advance()?;
            literal.namespace = Some(self.parse_parenthesized_string()?);
            self.expect(TokenKind::Comma)?;
        }

        loop {
            let kind = match self.current_token.kind {
                TokenKind::Name | TokenKind::QuotedName | TokenKind::String => {
                    self.advance()?.literal
                }
                _ => return Err(self.unexpected("key kind")),
            };

            if !self.check(TokenKind::Comma) {
                literal.path.push(KeyPathElement {
                    kind,
                    id: KeyId::Incomplete,
                });
                break;
            }
            self.advance()?;

            let id = match self.current_token.kind {
                TokenKind::String => KeyId::Name(self.advance()?.literal),
                TokenKind::Integer => KeyId::Id(self.parse_integer()?),
                _ => return Err(self.unexpected("key name or id")),
            };
            literal.path.push(KeyPathElement { kind, id });

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }

        self.expect(TokenKind::RightParen)?;
        Ok(literal)
    }

    fn parse_parenthesized_string(&mut self) -> Result<String, ParseError> {
        self.expect(TokenKind::LeftParen)?;
        let value = self.expect(TokenKind::String)?.literal;
        self.expect(TokenKind::RightParen)?;
        Ok(value)
    }

    /// `BLOB('base64text')`
    fn parse_blob_literal(&mut self) -> Result<ValueExpr, ParseError> {
        self.expect_keyword(Keyword::Blob)?;
        self.expect(TokenKind::LeftParen)?;
        let token = self.expect(TokenKind::String)?;
        self.expect(TokenKind::RightParen)?;

        STANDARD
            .decode(&token.literal)
            .map(ValueExpr::Blob)
            .map_err(|e| self.invalid_literal("blob", &token, e))
    }

    /// `DATETIME('rfc3339text')`
    fn parse_datetime_literal(&mut self) -> Result<ValueExpr, ParseError> {
        self.expect_keyword(Keyword::Datetime)?;
        self.expect(TokenKind::LeftParen)?;
        let token = self.expect(TokenKind::String)?;
        self.expect(TokenKind::RightParen)?;

        DateTime::parse_from_rfc3339(&token.literal)
            .map(ValueExpr::Datetime)
            .map_err(|e| self.invalid_literal("datetime", &token, e))
    }
}
