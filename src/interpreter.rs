use std::io::{self, Write};

use thiserror::Error;

use crate::Span;
use crate::environment::{EnvRef, Environment};
use crate::evaluator::{EvalError, evaluate};
use crate::parser::{ParseError, parse_str};
use crate::types::Value;

/// Anything that stops a program run.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// `form` is the 1-based index of the top-level form that failed.
    #[error("{source} (top-level form {form})")]
    Eval { form: usize, source: EvalError },
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl InterpretError {
    pub fn span(&self) -> Option<Span> {
        match self {
            InterpretError::Parse(err) => Some(err.span()),
            InterpretError::Eval { source, .. } => Some(source.span()),
            InterpretError::Io(_) => None,
        }
    }

    pub fn form(&self) -> Option<usize> {
        match self {
            InterpretError::Parse(err) => Some(err.form()),
            InterpretError::Eval { form, .. } => Some(*form),
            InterpretError::Io(_) => None,
        }
    }

    /// One-line diagnostic, e.g.
    /// `line 3, column 5 (top-level form 2): Unbound variable: 'foo'`.
    pub fn describe(&self, source: &str) -> String {
        let message = match self {
            InterpretError::Parse(ParseError::UnexpectedEof { .. }) => {
                "unexpected end of input: '(' is never closed".to_string()
            }
            InterpretError::Parse(ParseError::UnexpectedCloseParen { .. }) => "unexpected ')'".to_string(),
            InterpretError::Eval { source, .. } => source.to_string(),
            InterpretError::Io(_) => self.to_string(),
        };
        match (self.span(), self.form()) {
            (Some(span), Some(form)) => {
                let (line, column) = span.line_col(source);
                format!(
                    "line {}, column {} (top-level form {}): {}",
                    line, column, form, message
                )
            }
            _ => message,
        }
    }
}

/// Runs programs against one persistent root environment.
pub struct Interpreter {
    env: EnvRef,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            env: Environment::new_global_populated(),
        }
    }

    pub fn env(&self) -> &EnvRef {
        &self.env
    }

    /// Parses all of `source`, then evaluates its forms in order, writing
    /// each printable result on its own line. Stops at the first error;
    /// a parse error means nothing was evaluated.
    pub fn run(&mut self, source: &str, out: &mut impl Write) -> Result<(), InterpretError> {
        let program = parse_str(source)?;
        for (index, node) in program.forms.iter().enumerate() {
            let form = index + 1;
            tracing::debug!(form, span = %node.span, "evaluating");
            let value = evaluate(node, &self.env).map_err(|source| InterpretError::Eval { form, source })?;
            if !matches!(value, Value::Unit) {
                writeln!(out, "{}", value)?;
            }
        }
        Ok(())
    }

    /// Like [`Interpreter::run`], collecting the output into a string.
    pub fn run_to_string(&mut self, source: &str) -> Result<String, InterpretError> {
        let mut out = Vec::new();
        self.run(source, &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<String, InterpretError> {
        Interpreter::new().run_to_string(source)
    }

    fn assert_output(source: &str, expected: &str) {
        match run(source) {
            Ok(output) => assert_eq!(output, expected, "Input: '{}'", source),
            Err(e) => panic!("Run failed for input '{}': {}", source, e),
        }
    }

    #[test]
    fn test_prints_each_result() {
        assert_output("(+ 1 2) (* 2 3)", "3\n6\n");
        assert_output("(define sq (lambda (n) (* n n))) (sq 5)", "25\n");
        assert_output("(/ 10 2)", "5.0\n");
        assert_output("", "");
        assert_output("; only a comment", "");
    }

    #[test]
    fn test_define_and_set_print_nothing() {
        assert_output("(define x 1) (set! x 2) x", "2\n");
    }

    #[test]
    fn test_unit_inside_data_is_visible() {
        assert_output("(list (define x 1))", "(#<unit>)\n");
        assert_output("(define x 1) (length (list (set! x 2)))", "1\n");
    }

    #[test]
    fn test_stops_at_first_eval_error() {
        let mut interpreter = Interpreter::new();
        let mut out = Vec::new();
        let err = interpreter
            .run("(define x 1) x (foo) (define y 2)", &mut out)
            .unwrap_err();

        assert_eq!(String::from_utf8(out).unwrap(), "1\n");
        match err {
            InterpretError::Eval { form, source } => {
                assert_eq!(form, 3);
                assert_eq!(
                    source,
                    EvalError::UnboundVariable {
                        name: "foo".to_string(),
                        span: Span::new(16, 19),
                    }
                );
            }
            other => panic!("Expected an evaluation error, got {:?}", other),
        }
        // The form after the failure never ran.
        assert!(Environment::find(interpreter.env(), "y").is_none());
    }

    #[test]
    fn test_parse_error_evaluates_nothing() {
        let mut interpreter = Interpreter::new();
        let mut out = Vec::new();
        let err = interpreter.run("(define x 1) 42 (", &mut out).unwrap_err();

        assert!(matches!(
            err,
            InterpretError::Parse(ParseError::UnexpectedEof { form: 3, .. })
        ));
        assert!(out.is_empty());
        assert!(Environment::find(interpreter.env(), "x").is_none());
    }

    #[test]
    fn test_environment_persists_between_runs() {
        let mut interpreter = Interpreter::new();
        assert_eq!(interpreter.run_to_string("(define n 41)").unwrap(), "");
        assert_eq!(interpreter.run_to_string("(+ n 1)").unwrap(), "42\n");
    }

    #[test]
    fn test_interpreters_are_independent() {
        let mut first = Interpreter::new();
        let mut second = Interpreter::new();
        first.run_to_string("(define only-here 1)").unwrap();
        assert!(second.run_to_string("only-here").is_err());
    }

    #[test]
    fn test_describe_reports_line_column_and_form() {
        let source = "(define a 1)\n\n(+ a\n   missing)";
        let err = run(source).unwrap_err();
        assert_eq!(
            err.describe(source),
            "line 4, column 4 (top-level form 2): Unbound variable: 'missing'"
        );

        let source = "(list 1)\n  )";
        let err = run(source).unwrap_err();
        assert_eq!(
            err.describe(source),
            "line 2, column 3 (top-level form 2): unexpected ')'"
        );
    }
}
