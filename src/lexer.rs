use thiserror::Error;

use crate::ast::{Keyword, Span, Token, TokenKind};

/// Why a token is illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated quoted literal")]
    UnterminatedLiteral,
    #[error("malformed number")]
    MalformedNumber,
    #[error("malformed exponent")]
    MalformedExponent,
}

/// An illegal token, with the text consumed while scanning it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at byte {}: `{literal}`", .span.start)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub literal: String,
    pub span: Span,
}

/// GQL scanner.
///
/// Reads one character at a time and can push back exactly one; no construct of
/// the grammar needs deeper character lookahead.
pub struct Lexer {
    input: String,
    chars: Vec<(usize, char)>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.to_string(),
            chars: input.char_indices().collect(),
            position: 0,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    fn read(&mut self) -> Option<char> {
        let ch = self.chars.get(self.position).map(|(_, c)| *c);
        if ch.is_some() {
            self.position += 1;
        }
        ch
    }

    fn unread(&mut self) {
        self.position = self.position.saturating_sub(1);
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).map(|(_, c)| *c)
    }

    /// Byte offset of the next unread character.
    fn offset(&self) -> usize {
        self.chars
            .get(self.position)
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn token(&self, kind: TokenKind, literal: impl Into<String>, start: usize) -> Token {
        Token::new(kind, literal, Span::new(start, self.offset()))
    }

    /// Scans the next token, skipping whitespace.
    pub fn scan(&mut self) -> Token {
        loop {
            let token = self.scan_with_whitespace();
            if token.kind != TokenKind::Whitespace {
                return token;
            }
        }
    }

    /// Scans the next token, skipping whitespace, and turns an illegal token
    /// into an error.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let token = self.scan();
        match token.kind {
            TokenKind::Illegal(kind) => Err(LexError {
                kind,
                literal: token.literal,
                span: token.span,
            }),
            _ => Ok(token),
        }
    }

    /// Scans the next token, returning whitespace runs as tokens.
    pub fn scan_with_whitespace(&mut self) -> Token {
        let start = self.offset();

        let Some(ch) = self.read() else {
            return self.token(TokenKind::Eof, "", start);
        };

        match ch {
            c if is_whitespace(c) => {
                let mut literal = String::from(c);
                while let Some(c) = self.peek().filter(|c| is_whitespace(*c)) {
                    literal.push(c);
                    self.read();
                }
                self.token(TokenKind::Whitespace, literal, start)
            }
            c if c.is_ascii_digit() || c == '-' => {
                self.unread();
                self.scan_number(start)
            }
            '+' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.unread();
                self.scan_number(start)
            }
            c if is_name_start(c) => {
                self.unread();
                let name = self.read_name();
                match Keyword::lookup(&name) {
                    Some(keyword) => self.token(TokenKind::Keyword(keyword), name, start),
                    None => self.token(TokenKind::Name, name, start),
                }
            }
            '\'' | '"' => self.scan_quoted(ch, TokenKind::String, start),
            '`' => self.scan_quoted(ch, TokenKind::QuotedName, start),
            '@' => {
                if self.peek().is_some_and(is_name_start) {
                    let name = self.read_name();
                    self.token(TokenKind::BindingSite, name, start)
                } else {
                    self.token(TokenKind::Illegal(LexErrorKind::UnexpectedChar('@')), "@", start)
                }
            }
            '*' => self.token(TokenKind::Asterisk, "*", start),
            ',' => self.token(TokenKind::Comma, ",", start),
            '+' => self.token(TokenKind::Plus, "+", start),
            '=' => self.token(TokenKind::Equal, "=", start),
            '<' => self.token(TokenKind::Less, "<", start),
            '>' => self.token(TokenKind::Greater, ">", start),
            '(' => self.token(TokenKind::LeftParen, "(", start),
            ')' => self.token(TokenKind::RightParen, ")", start),
            c => self.token(
                TokenKind::Illegal(LexErrorKind::UnexpectedChar(c)),
                c.to_string(),
                start,
            ),
        }
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.read() {
            if is_name_start(ch) || ch.is_ascii_digit() || ch == '.' {
                name.push(ch);
            } else {
                self.unread();
                break;
            }
        }
        name
    }

    fn read_digits(&mut self, buf: &mut String) -> usize {
        let mut count = 0;
        while let Some(ch) = self.read() {
            if ch.is_ascii_digit() {
                buf.push(ch);
                count += 1;
            } else {
                self.unread();
                break;
            }
        }
        count
    }

    fn scan_number(&mut self, start: usize) -> Token {
        let mut literal = String::new();

        if let Some(sign) = self.read() {
            if sign == '-' || sign == '+' {
                literal.push(sign);
            } else {
                self.unread();
            }
        }

        if self.read_digits(&mut literal) == 0 {
            return self.token(TokenKind::Illegal(LexErrorKind::MalformedNumber), literal, start);
        }

        match self.read() {
            Some('.') => {
                literal.push('.');
                self.scan_double(literal, start)
            }
            Some(_) => {
                self.unread();
                self.token(TokenKind::Integer, literal, start)
            }
            None => self.token(TokenKind::Integer, literal, start),
        }
    }

    fn scan_double(&mut self, mut literal: String, start: usize) -> Token {
        self.read_digits(&mut literal);

        match self.read() {
            Some(e @ ('e' | 'E')) => {
                literal.push(e);
                if let Some(sign) = self.read() {
                    if sign == '-' || sign == '+' {
                        literal.push(sign);
                    } else {
                        self.unread();
                    }
                }
                if self.read_digits(&mut literal) == 0 {
                    if let Some(ch) = self.read() {
                        literal.push(ch);
                    }
                    return self.token(
                        TokenKind::Illegal(LexErrorKind::MalformedExponent),
                        literal,
                        start,
                    );
                }
                self.token(TokenKind::Double, literal, start)
            }
            Some('.') => {
                literal.push('.');
                self.token(TokenKind::Illegal(LexErrorKind::MalformedNumber), literal, start)
            }
            Some(_) => {
                self.unread();
                self.token(TokenKind::Double, literal, start)
            }
            None => self.token(TokenKind::Double, literal, start),
        }
    }

    fn scan_quoted(&mut self, delimiter: char, kind: TokenKind, start: usize) -> Token {
        let mut literal = String::new();

        loop {
            match self.read() {
                None | Some('\n') => {
                    return self.token(
                        TokenKind::Illegal(LexErrorKind::UnterminatedLiteral),
                        format!("{}{}", delimiter, literal),
                        start,
                    );
                }
                Some(ch) if ch == delimiter => {
                    if self.peek() == Some(delimiter) {
                        self.read();
                        literal.push(delimiter);
                    } else {
                        return self.token(kind, literal, start);
                    }
                }
                Some(ch) => literal.push(ch),
            }
        }
    }
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

fn is_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$' || !ch.is_ascii()
}

#[test]
fn test_keywords_ignore_case() {
    let mut lexer = Lexer::new("select Distinct ON");
    assert_eq!(lexer.scan().kind, TokenKind::Keyword(Keyword::Select));
    assert_eq!(lexer.scan().kind, TokenKind::Keyword(Keyword::Distinct));
    assert_eq!(lexer.scan().kind, TokenKind::Keyword(Keyword::On));
    assert_eq!(lexer.scan().kind, TokenKind::Eof);
}

#[test]
fn test_spans() {
    let mut lexer = Lexer::new("a <= 'xy'");
    assert_eq!(lexer.scan().span, Span::new(0, 1));
    assert_eq!(lexer.scan().span, Span::new(2, 3));
    assert_eq!(lexer.scan().span, Span::new(3, 4));
    assert_eq!(lexer.scan().span, Span::new(5, 9));
}

#[test]
fn test_whitespace_token() {
    let mut lexer = Lexer::new(" \t");
    let token = lexer.scan_with_whitespace();
    assert_eq!(token.kind, TokenKind::Whitespace);
    assert_eq!(token.literal, " \t");
    assert_eq!(lexer.scan_with_whitespace().kind, TokenKind::Eof);
}
