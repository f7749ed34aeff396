use crate::Span;
use crate::lexer::{Token, TokenKind};
use crate::types::{Expr, Node};
use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

/// Parse failures. `form` is the 1-based index of the top-level form that
/// was being read when the error happened.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The input ran out inside a list; `span` is the unmatched `(`.
    #[error("unexpected end of input: '(' is never closed (top-level form {form})")]
    UnexpectedEof { span: Span, form: usize },
    #[error("unexpected ')' (top-level form {form})")]
    UnexpectedCloseParen { span: Span, form: usize },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedEof { span, .. } | ParseError::UnexpectedCloseParen { span, .. } => {
                *span
            }
        }
    }

    pub fn form(&self) -> usize {
        match self {
            ParseError::UnexpectedEof { form, .. } | ParseError::UnexpectedCloseParen { form, .. } => {
                *form
            }
        }
    }
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

/// The top-level forms of a program, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub forms: Vec<Node>,
    /// Number of top-level forms consumed by this pass.
    pub consumed: usize,
}

pub struct Parser {
    // We iterate over owned Tokens, consuming them.
    tokens: Peekable<IntoIter<Token>>,
    // Forms fully parsed so far, for error reporting.
    consumed: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
            consumed: 0,
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    pub fn is_exhausted(&mut self) -> bool {
        self.tokens.peek().is_none()
    }

    /// Parses a single S-expression from the token stream.
    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::LParen,
                span,
            }) => self.parse_list(span),
            Some(Token {
                kind: TokenKind::RParen,
                span,
            }) => Err(ParseError::UnexpectedCloseParen {
                span,
                form: self.consumed + 1,
            }),
            Some(Token {
                kind: TokenKind::Atom(text),
                span,
            }) => Ok(parse_atom(text, span)),
            None => Err(ParseError::UnexpectedEof {
                span: Span::default(),
                form: self.consumed + 1,
            }),
        }
    }

    /// Parses the elements of a list whose `(` has been consumed.
    fn parse_list(&mut self, lparen_span: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.tokens.peek() {
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => {
                    let rparen_span = self.next_token().map_or(lparen_span, |t| t.span);
                    return Ok(Node::new_list(elements, lparen_span.merge(rparen_span)));
                }
                Some(_) => elements.push(self.parse_expr()?),
                None => {
                    // Reached EOF before finding ')'
                    return Err(ParseError::UnexpectedEof {
                        span: lparen_span,
                        form: self.consumed + 1,
                    });
                }
            }
        }
    }

    /// Parses one top-level form and counts it.
    pub fn parse_top_level(&mut self) -> ParseResult<Node> {
        let node = self.parse_expr()?;
        self.consumed += 1;
        Ok(node)
    }

    /// Parses every remaining top-level form.
    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut forms = Vec::new();
        while !self.is_exhausted() {
            forms.push(self.parse_top_level()?);
        }
        tracing::debug!(forms = self.consumed, "parsed program");
        Ok(Program {
            forms,
            consumed: self.consumed,
        })
    }
}

/// Classifies an atom: integer, then float, then symbol.
fn parse_atom(text: String, span: Span) -> Node {
    let kind = if let Ok(n) = text.parse::<i64>() {
        Expr::Integer(n)
    } else if let Ok(n) = text.parse::<f64>() {
        Expr::Float(n)
    } else {
        Expr::Symbol(text)
    };
    Node::new(kind, span)
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Program> {
    let tokens = crate::lexer::tokenize(input);
    Parser::new(tokens).parse_program()
}
