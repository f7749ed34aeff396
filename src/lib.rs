// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;

pub use environment::{EnvRef, Environment};
pub use evaluator::{Arity, EvalError, EvalResult, evaluate};
pub use interpreter::{InterpretError, Interpreter};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, Program, parse_str};
pub use source::Span;
pub use types::{Expr, Node, Value};
