// tests/lexer_tests.rs

use dsio::ast::{Keyword, TokenKind};
use dsio::lexer::{LexErrorKind, Lexer};

fn kinds(input: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new(input);
    let mut kinds = Vec::new();
    loop {
        let token = lexer.scan();
        kinds.push(token.kind);
        if token.kind == TokenKind::Eof {
            return kinds;
        }
    }
}

fn literals(input: &str) -> Vec<String> {
    let mut lexer = Lexer::new(input);
    let mut literals = Vec::new();
    loop {
        let token = lexer.scan();
        if token.kind == TokenKind::Eof {
            return literals;
        }
        literals.push(token.literal);
    }
}

// ============================================================================
// Punctuation
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("*", TokenKind::Asterisk),
        (",", TokenKind::Comma),
        ("+", TokenKind::Plus),
        ("=", TokenKind::Equal),
        ("<", TokenKind::Less),
        (">", TokenKind::Greater),
        ("(", TokenKind::LeftParen),
        (")", TokenKind::RightParen),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(token.literal, input);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    }
}

#[test]
fn test_two_char_comparators_are_two_tokens() {
    assert_eq!(
        kinds("<= >="),
        vec![
            TokenKind::Less,
            TokenKind::Equal,
            TokenKind::Greater,
            TokenKind::Equal,
            TokenKind::Eof
        ]
    );
}

// ============================================================================
// Names and keywords
// ============================================================================

#[test]
fn test_every_keyword() {
    for keyword in Keyword::ALL {
        let lower = keyword.as_str().to_ascii_lowercase();
        assert_eq!(
            kinds(&lower),
            vec![TokenKind::Keyword(keyword), TokenKind::Eof],
            "Failed for keyword: {}",
            lower
        );
    }
}

#[test]
fn test_names() {
    assert_eq!(
        kinds("Book __key__ address.city $x"),
        vec![
            TokenKind::Name,
            TokenKind::Name,
            TokenKind::Name,
            TokenKind::Name,
            TokenKind::Eof
        ]
    );
    assert_eq!(
        literals("Book __key__ address.city"),
        vec!["Book", "__key__", "address.city"]
    );
}

#[test]
fn test_quoted_name() {
    let mut lexer = Lexer::new("`first name`");
    let token = lexer.next_token().unwrap();
    assert_eq!(token.kind, TokenKind::QuotedName);
    assert_eq!(token.literal, "first name");
}

#[test]
fn test_binding_site() {
    let mut lexer = Lexer::new("@limit");
    let token = lexer.next_token().unwrap();
    assert_eq!(token.kind, TokenKind::BindingSite);
    assert_eq!(token.literal, "limit");
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_strings() {
    assert_eq!(literals("'abc' \"def\""), vec!["abc", "def"]);
    assert_eq!(literals("'it''s'"), vec!["it's"]);
    assert_eq!(literals("\"say \"\"hi\"\"\""), vec!["say \"hi\""]);
}

#[test]
fn test_unterminated_string() {
    let err = Lexer::new("'abc").next_token().unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnterminatedLiteral);

    let err = Lexer::new("'abc\n'").next_token().unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnterminatedLiteral);
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_integers() {
    assert_eq!(
        kinds("12 -3 +4"),
        vec![
            TokenKind::Integer,
            TokenKind::Integer,
            TokenKind::Integer,
            TokenKind::Eof
        ]
    );
    assert_eq!(literals("12 -3 +4"), vec!["12", "-3", "+4"]);
}

#[test]
fn test_doubles() {
    let input = "1.23 -12.3 1.23e-29 2.5E+3 4.";
    assert_eq!(
        literals(input),
        vec!["1.23", "-12.3", "1.23e-29", "2.5E+3", "4."]
    );
    assert!(kinds(input)[..5].iter().all(|k| *k == TokenKind::Double));
}

#[test]
fn test_malformed_numbers() {
    let err = Lexer::new("-x").next_token().unwrap_err();
    assert_eq!(err.kind, LexErrorKind::MalformedNumber);

    let err = Lexer::new("1.2.3").next_token().unwrap_err();
    assert_eq!(err.kind, LexErrorKind::MalformedNumber);

    let err = Lexer::new("1.2ex").next_token().unwrap_err();
    assert_eq!(err.kind, LexErrorKind::MalformedExponent);
}

// ============================================================================
// Whole queries
// ============================================================================

#[test]
fn test_query_tokens() {
    let input = "SELECT * FROM Book WHERE author = 'Huxley' LIMIT 10";
    assert_eq!(
        kinds(input),
        vec![
            TokenKind::Keyword(Keyword::Select),
            TokenKind::Asterisk,
            TokenKind::Keyword(Keyword::From),
            TokenKind::Name,
            TokenKind::Keyword(Keyword::Where),
            TokenKind::Name,
            TokenKind::Equal,
            TokenKind::String,
            TokenKind::Keyword(Keyword::Limit),
            TokenKind::Integer,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_whitespace_preserving_scan_rebuilds_input() {
    let input = "SELECT  *\tFROM `my kind`";
    let mut lexer = Lexer::new(input);
    let mut count = 0;
    loop {
        let token = lexer.scan_with_whitespace();
        if token.kind == TokenKind::Eof {
            break;
        }
        count += 1;
    }
    assert_eq!(count, 7);
}

#[test]
fn test_unexpected_character() {
    let err = Lexer::new("#").next_token().unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnexpectedChar('#'));
    assert_eq!(err.span.start, 0);
}
