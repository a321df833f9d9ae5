use std::fmt;

use crate::lexer::LexErrorKind;

/// Byte range of a token within the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

/// Reserved words. Matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Select,
    Distinct,
    On,
    From,
    Where,
    And,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    First,
    Offset,
    Is,
    Null,
    Contains,
    Has,
    Ancestor,
    Descendant,
    In,
    Key,
    Project,
    Namespace,
    Blob,
    Datetime,
    True,
    False,
}

impl Keyword {
    pub const ALL: [Keyword; 27] = [
        Keyword::Select,
        Keyword::Distinct,
        Keyword::On,
        Keyword::From,
        Keyword::Where,
        Keyword::And,
        Keyword::Order,
        Keyword::By,
        Keyword::Asc,
        Keyword::Desc,
        Keyword::Limit,
        Keyword::First,
        Keyword::Offset,
        Keyword::Is,
        Keyword::Null,
        Keyword::Contains,
        Keyword::Has,
        Keyword::Ancestor,
        Keyword::Descendant,
        Keyword::In,
        Keyword::Key,
        Keyword::Project,
        Keyword::Namespace,
        Keyword::Blob,
        Keyword::Datetime,
        Keyword::True,
        Keyword::False,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Select => "SELECT",
            Keyword::Distinct => "DISTINCT",
            Keyword::On => "ON",
            Keyword::From => "FROM",
            Keyword::Where => "WHERE",
            Keyword::And => "AND",
            Keyword::Order => "ORDER",
            Keyword::By => "BY",
            Keyword::Asc => "ASC",
            Keyword::Desc => "DESC",
            Keyword::Limit => "LIMIT",
            Keyword::First => "FIRST",
            Keyword::Offset => "OFFSET",
            Keyword::Is => "IS",
            Keyword::Null => "NULL",
            Keyword::Contains => "CONTAINS",
            Keyword::Has => "HAS",
            Keyword::Ancestor => "ANCESTOR",
            Keyword::Descendant => "DESCENDANT",
            Keyword::In => "IN",
            Keyword::Key => "KEY",
            Keyword::Project => "PROJECT",
            Keyword::Namespace => "NAMESPACE",
            Keyword::Blob => "BLOB",
            Keyword::Datetime => "DATETIME",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
        }
    }

    /// Looks up an identifier in the keyword table, ignoring ASCII case.
    pub fn lookup(ident: &str) -> Option<Keyword> {
        Keyword::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(ident))
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Punctuation
    /// `*`
    Asterisk,
    /// `,`
    Comma,
    /// `+`
    Plus,
    /// `=`
    Equal,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,

    /// Reserved word
    Keyword(Keyword),

    /// Unquoted identifier that is not a keyword
    ///
    /// # Examples
    /// ```text
    /// Book
    /// __key__
    /// address.city
    /// ```
    Name,

    /// Backquoted identifier, literal text excludes the backquotes
    ///
    /// # Examples
    /// ```text
    /// `first name`
    /// ```
    QuotedName,

    /// Single- or double-quoted string, a doubled delimiter stands for one
    ///
    /// # Examples
    /// ```text
    /// 'abc'
    /// "it""s"
    /// ```
    String,

    /// Integer with optional sign
    Integer,

    /// Decimal number with optional exponent
    ///
    /// # Examples
    /// ```text
    /// 1.23
    /// -12.3
    /// 1.23e-29
    /// ```
    Double,

    /// Named placeholder, literal text excludes the `@`
    ///
    /// # Examples
    /// ```text
    /// @limit
    /// ```
    BindingSite,

    /// Run of whitespace, only returned by the whitespace-preserving scan
    Whitespace,

    /// End of input
    Eof,

    /// Malformed input
    Illegal(LexErrorKind),
}

impl TokenKind {
    pub fn is_name(self) -> bool {
        matches!(self, TokenKind::Name | TokenKind::QuotedName)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Asterisk => f.write_str("'*'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Equal => f.write_str("'='"),
            TokenKind::Less => f.write_str("'<'"),
            TokenKind::Greater => f.write_str("'>'"),
            TokenKind::LeftParen => f.write_str("'('"),
            TokenKind::RightParen => f.write_str("')'"),
            TokenKind::Keyword(k) => write!(f, "keyword {}", k),
            TokenKind::Name => f.write_str("name"),
            TokenKind::QuotedName => f.write_str("quoted name"),
            TokenKind::String => f.write_str("string"),
            TokenKind::Integer => f.write_str("integer"),
            TokenKind::Double => f.write_str("double"),
            TokenKind::BindingSite => f.write_str("binding site"),
            TokenKind::Whitespace => f.write_str("whitespace"),
            TokenKind::Eof => f.write_str("end of input"),
            TokenKind::Illegal(_) => f.write_str("illegal token"),
        }
    }
}

/// A token together with its literal text and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            literal: literal.into(),
            span,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => f.write_str("end of input"),
            _ => write!(f, "{} `{}`", self.kind, self.literal),
        }
    }
}
