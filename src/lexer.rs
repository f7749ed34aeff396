use logos::Logos;
use std::fmt;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+")] // Skip whitespace
#[logos(skip r";[^\n]*")] // Skip comments up to the end of the line
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    // Everything that is not whitespace, a paren or a comment start.
    // Numbers and symbols are told apart by the parser.
    #[regex(r"[^\s();]+", |lex| lex.slice().to_string())]
    Atom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Atom(s) => write!(f, "{}", s),
        }
    }
}

/// Splits `input` into tokens. Tokenizing cannot fail: every character is
/// whitespace, a comment, a paren or part of an atom, so malformed input is
/// left for the parser to reject.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let kind = match result {
            Ok(kind) => kind,
            // Unreachable with the patterns above; keep the text as an atom.
            Err(()) => TokenKind::Atom(lexer.slice().to_string()),
        };
        tokens.push(Token::new(kind, Span::new(range.start, range.end)));
    }
    tokens
}
