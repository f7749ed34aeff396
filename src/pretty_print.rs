use std::io::{self, Write};
use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::Span;
use crate::evaluator::EvalError;
use crate::interpreter::InterpretError;
use crate::parser::ParseError;

type SourceSpan<'a> = (&'a str, Range<usize>);

fn build<'a>(name: &'a str, span: Span, message: String, label: String) -> ariadne::ReportBuilder<'a, SourceSpan<'a>> {
    Report::build(ReportKind::Error, (name, span.to_range()))
        .with_message(message)
        .with_label(Label::new((name, span.to_range())).with_message(label))
}

impl ParseError {
    fn report<'a>(&self, name: &'a str) -> ariadne::ReportBuilder<'a, SourceSpan<'a>> {
        let report = match self {
            ParseError::UnexpectedEof { span, .. } => build(
                name,
                *span,
                "Unexpected end of input".to_string(),
                "This '(' is never closed".to_string(),
            ),
            ParseError::UnexpectedCloseParen { span, .. } => build(
                name,
                *span,
                "Unexpected ')'".to_string(),
                "There is no '(' to match this".to_string(),
            ),
        };
        report.with_note(format!("while reading top-level form {}", self.form()))
    }
}

impl EvalError {
    fn report<'a>(&self, name: &'a str) -> ariadne::ReportBuilder<'a, SourceSpan<'a>> {
        let label = match self {
            EvalError::UnboundVariable { .. } => {
                "This symbol is not defined in the current scope".to_string()
            }
            EvalError::NotCallable { value, .. } => {
                format!("This evaluates to {}, which cannot be called", value)
            }
            EvalError::ArityMismatch { expected, got, .. } => {
                format!("Expected {} arguments, found {}", expected, got)
            }
            EvalError::TypeMismatch { expected, value, .. } => {
                format!("Expected {}, found {}", expected, value)
            }
            EvalError::InvalidSpecialForm { .. } => {
                "This special form is malformed or incomplete".to_string()
            }
            EvalError::Arithmetic { message, .. } => message.clone(),
        };
        build(name, self.span(), self.to_string(), label)
    }
}

impl InterpretError {
    fn report<'a>(&self, name: &'a str) -> Option<ariadne::ReportBuilder<'a, SourceSpan<'a>>> {
        match self {
            InterpretError::Parse(err) => Some(err.report(name)),
            InterpretError::Eval { form, source } => Some(
                source
                    .report(name)
                    .with_note(format!("while evaluating top-level form {}", form)),
            ),
            InterpretError::Io(_) => None,
        }
    }

    /// Writes an uncolored report for `source` (named `name`) to `w`.
    pub fn write_report<W: Write>(&self, name: &str, source: &str, mut w: W) -> io::Result<()> {
        match self.report(name) {
            Some(report) => report
                .with_config(Config::default().with_color(false))
                .finish()
                .write((name, Source::from(source)), w),
            None => writeln!(w, "Error: {}", self),
        }
    }

    /// Prints a colored report to stderr.
    pub fn print_report(&self, name: &str, source: &str) {
        let Some(report) = self.report(name) else {
            eprintln!("Error: {}", self);
            return;
        };
        if let Err(e) = report.finish().eprint((name, Source::from(source))) {
            eprintln!("Error: {} ({})", self, e);
        }
    }
}
