use crate::environment::{EnvRef, Environment};
use crate::source::Span;
use crate::types::{Closure, Expr, Node, Value};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// How many arguments a procedure accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Between(min, max) => (min..=max).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Between(min, max) => write!(f, "between {} and {}", min, max),
        }
    }
}

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Unbound variable: '{name}'")]
    UnboundVariable { name: String, span: Span },
    #[error("Expected a procedure, but got: {value}")]
    NotCallable { value: String, span: Span },
    #[error("'{procedure}' expects {expected} arguments, got {got}")]
    ArityMismatch {
        procedure: String,
        expected: Arity,
        got: usize,
        span: Span,
    },
    #[error("'{operation}' expects {expected}, got {value}")]
    TypeMismatch {
        operation: String,
        expected: &'static str,
        value: String,
        span: Span,
    },
    #[error("Invalid special form '{form}': {message}")]
    InvalidSpecialForm {
        form: &'static str,
        message: String,
        span: Span,
    },
    #[error("'{operation}': {message}")]
    Arithmetic {
        operation: String,
        message: String,
        span: Span,
    },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::UnboundVariable { span, .. }
            | EvalError::NotCallable { span, .. }
            | EvalError::ArityMismatch { span, .. }
            | EvalError::TypeMismatch { span, .. }
            | EvalError::InvalidSpecialForm { span, .. }
            | EvalError::Arithmetic { span, .. } => *span,
        }
    }

    pub fn type_mismatch(operation: &str, expected: &'static str, value: &Value, span: Span) -> Self {
        EvalError::TypeMismatch {
            operation: operation.to_string(),
            expected,
            value: describe(value),
            span,
        }
    }
}

// Shows the value and its type, e.g. `(2 3) (list)`.
fn describe(value: &Value) -> String {
    format!("{} ({})", value, value.type_name())
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

const SPECIAL_FORMS: [&str; 5] = ["quote", "if", "define", "set!", "lambda"];

/// Keywords handled by the evaluator rather than the environment.
pub fn special_form_identifiers() -> HashSet<String> {
    SPECIAL_FORMS.iter().map(|s| s.to_string()).collect()
}

// --- Evaluate Function ---

/// Evaluates a given AST Node within the specified environment.
pub fn evaluate(node: &Node, env: &EnvRef) -> EvalResult {
    match &node.kind {
        // Self-evaluating atoms
        Expr::Integer(n) => Ok(Value::Integer(*n)),
        Expr::Float(n) => Ok(Value::Float(*n)),

        Expr::Symbol(name) => Environment::lookup(env, name, node.span),

        Expr::List(elements) => match &elements[..] {
            [] => Ok(Value::nil()),
            [first, rest @ ..] => match first.as_symbol() {
                Some("quote") => evaluate_quote(rest, node.span),
                Some("if") => evaluate_if(rest, env, node.span),
                Some("define") => evaluate_define(rest, env, node.span),
                Some("set!") => evaluate_set(rest, env, node.span),
                Some("lambda") => evaluate_lambda(rest, env, node.span),
                _ => evaluate_procedure(first, rest, env, node.span),
            },
        },
    }
}

fn evaluate_procedure(operator: &Node, operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    let procedure = evaluate(operator, env)?;
    if !procedure.is_procedure() {
        return Err(EvalError::NotCallable {
            value: describe(&procedure),
            span: operator.span,
        });
    }

    let args = operands
        .iter()
        .map(|operand| evaluate(operand, env))
        .collect::<EvalResult<Vec<Value>>>()?;

    apply(&procedure, args, span)
}

/// Calls `procedure` with already evaluated arguments. `span` is the call
/// site used for error reporting.
pub fn apply(procedure: &Value, args: Vec<Value>, span: Span) -> EvalResult {
    match procedure {
        Value::Primitive(primitive) => (primitive.func)(&args, span),
        Value::Closure(closure) => {
            if args.len() != closure.params.len() {
                return Err(EvalError::ArityMismatch {
                    procedure: procedure.to_string(),
                    expected: Arity::Exactly(closure.params.len()),
                    got: args.len(),
                    span,
                });
            }
            tracing::trace!(params = ?closure.params, "applying closure");
            let frame = Environment::bind(&closure.params, args, Rc::clone(&closure.env));
            evaluate(&closure.body, &frame)
        }
        other => Err(EvalError::NotCallable {
            value: describe(other),
            span,
        }),
    }
}

fn evaluate_quote(operands: &[Node], span: Span) -> EvalResult {
    if let [node] = operands {
        Ok(Value::from(node))
    } else {
        Err(EvalError::InvalidSpecialForm {
            form: "quote",
            message: "expects exactly one argument".to_string(),
            span,
        })
    }
}

fn evaluate_if(operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    if let [condition, consequent, alternate] = operands {
        if evaluate(condition, env)?.is_truthy() {
            evaluate(consequent, env)
        } else {
            evaluate(alternate, env)
        }
    } else {
        Err(EvalError::InvalidSpecialForm {
            form: "if",
            message: "expects a condition, a consequent and an alternate".to_string(),
            span,
        })
    }
}

fn evaluate_define(operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    match operands {
        [target, expr] => match &target.kind {
            Expr::Symbol(name) => {
                let value = evaluate(expr, env)?;
                env.borrow_mut().define(name.clone(), value);
                Ok(Value::Unit)
            }
            // (define (name params...) body)
            Expr::List(signature) => match signature.split_first() {
                Some((name_node, params)) => {
                    let name = name_node.as_symbol().ok_or_else(|| {
                        EvalError::InvalidSpecialForm {
                            form: "define",
                            message: format!("procedure name must be a symbol, got {}", name_node),
                            span: name_node.span,
                        }
                    })?;
                    let closure = make_closure("define", params, expr, env)?;
                    env.borrow_mut().define(name, closure);
                    Ok(Value::Unit)
                }
                None => Err(EvalError::InvalidSpecialForm {
                    form: "define",
                    message: "missing procedure name".to_string(),
                    span: target.span,
                }),
            },
            _ => Err(EvalError::InvalidSpecialForm {
                form: "define",
                message: format!("expected a symbol, got {}", target),
                span: target.span,
            }),
        },
        _ => Err(EvalError::InvalidSpecialForm {
            form: "define",
            message: "expects a name and an expression".to_string(),
            span,
        }),
    }
}

fn evaluate_set(operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    let [target, expr] = operands else {
        return Err(EvalError::InvalidSpecialForm {
            form: "set!",
            message: "expects a name and an expression".to_string(),
            span,
        });
    };
    let Some(name) = target.as_symbol() else {
        return Err(EvalError::InvalidSpecialForm {
            form: "set!",
            message: format!("expected a symbol, got {}", target),
            span: target.span,
        });
    };
    // An unbound target fails before the expression is evaluated.
    if Environment::find(env, name).is_none() {
        return Err(EvalError::UnboundVariable {
            name: name.to_string(),
            span: target.span,
        });
    }
    let value = evaluate(expr, env)?;
    // The expression may itself have rebound things; locate the frame again.
    match Environment::find(env, name) {
        Some(frame) => {
            frame.borrow_mut().set(name, value);
            Ok(Value::Unit)
        }
        None => Err(EvalError::UnboundVariable {
            name: name.to_string(),
            span: target.span,
        }),
    }
}

fn evaluate_lambda(operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    match operands {
        [params, body] => match &params.kind {
            Expr::List(params) => make_closure("lambda", params, body, env),
            _ => Err(EvalError::InvalidSpecialForm {
                form: "lambda",
                message: format!("expected a parameter list, got {}", params),
                span: params.span,
            }),
        },
        _ => Err(EvalError::InvalidSpecialForm {
            form: "lambda",
            message: "expects a parameter list and a single body expression".to_string(),
            span,
        }),
    }
}

fn make_closure(form: &'static str, params: &[Node], body: &Node, env: &EnvRef) -> EvalResult {
    let mut names: Vec<String> = Vec::with_capacity(params.len());
    for param in params {
        match param.as_symbol() {
            Some(name) if names.iter().any(|seen| seen == name) => {
                return Err(EvalError::InvalidSpecialForm {
                    form,
                    message: format!("duplicate parameter '{}'", name),
                    span: param.span,
                });
            }
            Some(name) => names.push(name.to_string()),
            None => {
                return Err(EvalError::InvalidSpecialForm {
                    form,
                    message: format!("parameters must be symbols, got {}", param),
                    span: param.span,
                });
            }
        }
    }
    Ok(Value::Closure(Rc::new(Closure {
        params: names,
        body: body.clone(),
        env: Rc::clone(env),
    })))
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    // Evaluates every form of `input` in `env`, returning the last value.
    fn eval_in(input: &str, env: &EnvRef) -> EvalResult {
        let program = match parse_str(input) {
            Ok(program) => program,
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        };
        let mut last = Value::Unit;
        for node in &program.forms {
            last = evaluate(node, env)?;
        }
        Ok(last)
    }

    // Helper to evaluate input string and check the result
    fn assert_eval(input: &str, expected: Value) {
        let env = Environment::new_global_populated();
        match eval_in(input, &env) {
            Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Helper to check the printed form of the result
    fn assert_eval_prints(input: &str, expected: &str) {
        let env = Environment::new_global_populated();
        match eval_in(input, &env) {
            Ok(result) => assert_eq!(result.to_string(), expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Helper to assert evaluation errors, comparing variants only
    fn assert_eval_error(input: &str, expected_error_variant: &EvalError) -> EvalError {
        let env = Environment::new_global_populated();
        match eval_in(input, &env) {
            Ok(result) => panic!(
                "Expected evaluation to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
                e
            }
        }
    }

    fn unbound() -> EvalError {
        EvalError::UnboundVariable {
            name: String::new(),
            span: Span::default(),
        }
    }

    fn invalid_form() -> EvalError {
        EvalError::InvalidSpecialForm {
            form: "",
            message: String::new(),
            span: Span::default(),
        }
    }

    fn arity() -> EvalError {
        EvalError::ArityMismatch {
            procedure: String::new(),
            expected: Arity::Exactly(0),
            got: 0,
            span: Span::default(),
        }
    }

    fn not_callable() -> EvalError {
        EvalError::NotCallable {
            value: String::new(),
            span: Span::default(),
        }
    }

    fn ints(items: &[i64]) -> Value {
        Value::list(items.iter().map(|n| Value::Integer(*n)).collect())
    }

    #[test]
    fn test_eval_self_evaluating() {
        assert_eval("123", Value::Integer(123));
        assert_eval("-4.5", Value::Float(-4.5));
        assert_eval("()", Value::nil());
    }

    #[test]
    fn test_eval_symbol_lookup_ok() {
        let env = Environment::new();
        env.borrow_mut().define("x", Value::Integer(100));
        assert_eq!(eval_in("x", &env), Ok(Value::Integer(100)));
    }

    #[test]
    fn test_eval_symbol_lookup_unbound() {
        let env = Environment::new();
        let err = eval_in("y", &env).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnboundVariable {
                name: "y".to_string(),
                span: Span::new(0, 1)
            }
        );
    }

    #[test]
    fn test_eval_quote() {
        assert_eval("(quote 1)", Value::Integer(1));
        assert_eval("(quote a)", Value::symbol("a"));
        assert_eval("(quote ())", Value::nil());
        assert_eval("(quote (1 2))", ints(&[1, 2]));
        assert_eval_prints("(quote (a (b 2.0) c))", "(a (b 2.0) c)");

        assert_eval_error("(quote a b)", &invalid_form());
        assert_eval_error("(quote)", &invalid_form());
    }

    #[test]
    fn test_eval_if() {
        assert_eval("(if #t 1 2)", Value::Integer(1));
        assert_eval("(if #f 1 2)", Value::Integer(2));
        assert_eval("(if 0 1 2)", Value::Integer(1)); // only #f is false
        assert_eval("(if (quote ()) 1 2)", Value::Integer(1));
        assert_eval("(if (< 1 2) (quote yes) (quote no))", Value::symbol("yes"));
    }

    #[test]
    fn test_eval_if_does_not_evaluate_unused_branch() {
        assert_eval("(if #t (quote good) unbound-variable)", Value::symbol("good"));
        assert_eval("(if #f unbound-variable (quote good))", Value::symbol("good"));
    }

    #[test]
    fn test_eval_if_errors() {
        assert_eval_error("(if)", &invalid_form());
        assert_eval_error("(if #t 1)", &invalid_form());
        assert_eval_error("(if #t 1 2 3)", &invalid_form());
        assert_eval_error("(if unbound 1 2)", &unbound());
    }

    #[test]
    fn test_eval_define() {
        assert_eval("(define x 10)", Value::Unit);
        assert_eval("(define x 10) (define x (+ x 1)) x", Value::Integer(11));
        assert_eval("(define (sq n) (* n n)) (sq 7)", Value::Integer(49));
        assert_eval_error("(define 1 2)", &invalid_form());
        assert_eval_error("(define x)", &invalid_form());
        assert_eval_error("(define () 1)", &invalid_form());
    }

    #[test]
    fn test_define_inside_closure_stays_local() {
        let env = Environment::new_global_populated();
        let result = eval_in(
            "(define x 1)
             (define f (lambda () (define x 2)))
             (f)
             x",
            &env,
        );
        assert_eq!(result, Ok(Value::Integer(1)));
    }

    #[test]
    fn test_eval_set() {
        assert_eval("(define x 1) (set! x 2)", Value::Unit);
        assert_eval("(define x 1) (set! x (+ x 41)) x", Value::Integer(42));
        let err = assert_eval_error("(set! nope 1)", &unbound());
        assert!(matches!(err, EvalError::UnboundVariable { name, .. } if name == "nope"));
        assert_eval_error("(set! 1 2)", &invalid_form());
    }

    #[test]
    fn test_set_reaches_outer_frame() {
        let env = Environment::new_global_populated();
        let result = eval_in(
            "(define total 0)
             (define add! (lambda (n) (set! total (+ total n))))
             (add! 5)
             (add! 6)
             total",
            &env,
        );
        assert_eq!(result, Ok(Value::Integer(11)));
    }

    #[test]
    fn test_eval_lambda() {
        assert_eval("((lambda (x y) (+ x y)) 3 4)", Value::Integer(7));
        assert_eval("((lambda () 5))", Value::Integer(5));
        assert_eval_prints("(lambda (a b) a)", "#<lambda (a b)>");
        assert_eval_error("(lambda x x)", &invalid_form());
        assert_eval_error("(lambda (1) 1)", &invalid_form());
        assert_eval_error("(lambda (a a) a)", &invalid_form());
        assert_eval_error("(lambda (a) a a)", &invalid_form());
    }

    #[test]
    fn test_closure_arity_mismatch() {
        let err = assert_eval_error("((lambda (x) x) 1 2)", &arity());
        assert!(matches!(
            err,
            EvalError::ArityMismatch { expected: Arity::Exactly(1), got: 2, .. }
        ));
    }

    #[test]
    fn test_closure_observes_later_set() {
        let env = Environment::new_global_populated();
        let result = eval_in(
            "(define x 1)
             (define get-x (lambda () x))
             (set! x 2)
             (get-x)",
            &env,
        );
        assert_eq!(result, Ok(Value::Integer(2)));
    }

    #[test]
    fn test_closure_ignores_sibling_define() {
        let env = Environment::new_global_populated();
        let result = eval_in(
            "(define x 1)
             (define get-x (lambda () x))
             (define sibling (lambda () (begin (define x 99) x)))
             (sibling)
             (get-x)",
            &env,
        );
        assert_eq!(result, Ok(Value::Integer(1)));
    }

    #[test]
    fn test_closures_from_factory_are_independent() {
        let env = Environment::new_global_populated();
        let result = eval_in(
            "(define make-counter
               (lambda ()
                 ((lambda (count)
                    (lambda () (begin (set! count (+ count 1)) count)))
                  0)))
             (define a (make-counter))
             (define b (make-counter))
             (a) (a) (a)
             (b)
             (list (a) (b))",
            &env,
        );
        assert_eq!(result, Ok(ints(&[4, 2])));
    }

    #[test]
    fn test_recursion() {
        assert_eval(
            "(define fact (lambda (n) (if (<= n 1) 1 (* n (fact (- n 1))))))
             (fact 10)",
            Value::Integer(3628800),
        );
    }

    #[test]
    fn test_eval_not_callable_error() {
        assert_eval_error("(1 2 3)", &not_callable());
        assert_eval_error("((list 1 2) 3)", &not_callable());
        assert_eval_error("((quote sym))", &not_callable());
    }

    #[test]
    fn test_eval_unbound_operator() {
        let err = assert_eval_error("(foo)", &unbound());
        assert!(matches!(err, EvalError::UnboundVariable { name, .. } if name == "foo"));
    }

    #[test]
    fn test_arguments_evaluated_left_to_right() {
        let env = Environment::new_global_populated();
        let result = eval_in(
            "(define trail (quote ()))
             (define note (lambda (x) (begin (set! trail (cons x trail)) x)))
             (list (note 1) (note 2) (note 3))
             trail",
            &env,
        );
        assert_eq!(result, Ok(ints(&[3, 2, 1])));
    }

    #[test]
    fn test_special_form_identifiers() {
        let ids = special_form_identifiers();
        assert!(ids.contains("lambda"));
        assert!(ids.contains("set!"));
        assert_eq!(ids.len(), 5);
    }
}
