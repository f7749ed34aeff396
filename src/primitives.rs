use std::cmp::Ordering;
use std::rc::Rc;

use crate::environment::Environment;
use crate::evaluator::{Arity, EvalError, EvalResult, apply};
use crate::{Span, Value};

/// Installs the builtin procedures and constants into `env`.
pub fn install(env: &mut Environment) {
    // --- Arithmetic ---
    env.add_primitive("+", prim_add);
    env.add_primitive("-", prim_sub);
    env.add_primitive("*", prim_mul);
    env.add_primitive("/", prim_div);
    env.add_primitive("abs", prim_abs);
    env.add_primitive("min", prim_min);
    env.add_primitive("max", prim_max);
    env.add_primitive("round", prim_round);
    env.add_primitive("expt", prim_expt);

    // --- Comparison ---
    env.add_primitive("=", prim_equals);
    env.add_primitive("<", prim_less_than);
    env.add_primitive("<=", prim_less_than_or_equals);
    env.add_primitive(">", prim_greater_than);
    env.add_primitive(">=", prim_greater_than_or_equals);

    // --- Lists ---
    env.add_primitive("car", prim_car);
    env.add_primitive("cdr", prim_cdr);
    env.add_primitive("cons", prim_cons);
    env.add_primitive("list", prim_list);
    env.add_primitive("append", prim_append);
    env.add_primitive("length", prim_length);
    env.add_primitive("map", prim_map);

    // --- Predicates ---
    env.add_primitive("number?", prim_is_number);
    env.add_primitive("symbol?", prim_is_symbol);
    env.add_primitive("list?", prim_is_list);
    env.add_primitive("procedure?", prim_is_procedure);
    env.add_primitive("null?", prim_is_null);
    env.add_primitive("eq?", prim_is_eq);
    env.add_primitive("equal?", prim_is_equal);
    env.add_primitive("not", prim_not);

    env.add_primitive("begin", prim_begin);

    // --- Math ---
    env.add_primitive("sqrt", prim_sqrt);
    env.add_primitive("exp", prim_exp);
    env.add_primitive("expm1", prim_expm1);
    env.add_primitive("log", prim_log);
    env.add_primitive("log2", prim_log2);
    env.add_primitive("log10", prim_log10);
    env.add_primitive("log1p", prim_log1p);
    env.add_primitive("sin", prim_sin);
    env.add_primitive("cos", prim_cos);
    env.add_primitive("tan", prim_tan);
    env.add_primitive("asin", prim_asin);
    env.add_primitive("acos", prim_acos);
    env.add_primitive("atan", prim_atan);
    env.add_primitive("atan2", prim_atan2);
    env.add_primitive("sinh", prim_sinh);
    env.add_primitive("cosh", prim_cosh);
    env.add_primitive("tanh", prim_tanh);
    env.add_primitive("asinh", prim_asinh);
    env.add_primitive("acosh", prim_acosh);
    env.add_primitive("atanh", prim_atanh);
    env.add_primitive("fabs", prim_fabs);
    env.add_primitive("degrees", prim_degrees);
    env.add_primitive("radians", prim_radians);
    env.add_primitive("floor", prim_floor);
    env.add_primitive("ceil", prim_ceil);
    env.add_primitive("trunc", prim_trunc);
    env.add_primitive("fmod", prim_fmod);
    env.add_primitive("pow", prim_pow);
    env.add_primitive("hypot", prim_hypot);
    env.add_primitive("copysign", prim_copysign);
    env.add_primitive("factorial", prim_factorial);
    env.add_primitive("gcd", prim_gcd);
    env.add_primitive("lcm", prim_lcm);
    env.add_primitive("isqrt", prim_isqrt);
    env.add_primitive("cbrt", prim_cbrt);
    env.add_primitive("exp2", prim_exp2);
    env.add_primitive("gamma", prim_gamma);
    env.add_primitive("lgamma", prim_lgamma);
    env.add_primitive("erf", prim_erf);
    env.add_primitive("erfc", prim_erfc);
    env.add_primitive("remainder", prim_remainder);
    env.add_primitive("ldexp", prim_ldexp);
    env.add_primitive("isfinite", prim_is_finite);
    env.add_primitive("isinf", prim_is_inf);
    env.add_primitive("isnan", prim_is_nan);

    env.define("pi", Value::Float(std::f64::consts::PI));
    env.define("e", Value::Float(std::f64::consts::E));
    env.define("tau", Value::Float(std::f64::consts::TAU));
    env.define("inf", Value::Float(f64::INFINITY));
    env.define("nan", Value::Float(f64::NAN));

    // There is no boolean literal syntax; these names are ordinary bindings.
    env.define("#t", Value::Boolean(true));
    env.define("#f", Value::Boolean(false));
}

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, $arity:expr, $span:expr, $name:expr) => {
        if !$arity.accepts($args.len()) {
            return Err(EvalError::ArityMismatch {
                procedure: $name.to_string(),
                expected: $arity,
                got: $args.len(),
                span: $span,
            });
        }
    };
}

// --- Numbers ---

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn to_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        match number {
            Number::Int(n) => Value::Integer(n),
            Number::Float(n) => Value::Float(n),
        }
    }
}

fn expect_number(value: &Value, operation: &str, span: Span) -> EvalResult<Number> {
    match value {
        Value::Integer(n) => Ok(Number::Int(*n)),
        Value::Float(n) => Ok(Number::Float(*n)),
        other => Err(EvalError::type_mismatch(operation, "a number", other, span)),
    }
}

fn expect_integer(value: &Value, operation: &str, span: Span) -> EvalResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(EvalError::type_mismatch(operation, "an integer", other, span)),
    }
}

fn expect_float(value: &Value, operation: &str, span: Span) -> EvalResult<f64> {
    expect_number(value, operation, span).map(Number::to_f64)
}

fn expect_list<'a>(value: &'a Value, operation: &str, span: Span) -> EvalResult<&'a Rc<Vec<Value>>> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(EvalError::type_mismatch(operation, "a list", other, span)),
    }
}

fn overflow(operation: &str, span: Span) -> EvalError {
    EvalError::Arithmetic {
        operation: operation.to_string(),
        message: "integer overflow".to_string(),
        span,
    }
}

// Integers stay integers until a float shows up.
fn combine(
    left: Number,
    right: Number,
    operation: &str,
    span: Span,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult<Number> {
    match (left, right) {
        (Number::Int(a), Number::Int(b)) => int_op(a, b)
            .map(Number::Int)
            .ok_or_else(|| overflow(operation, span)),
        (a, b) => Ok(Number::Float(float_op(a.to_f64(), b.to_f64()))),
    }
}

fn fold_numbers(
    args: &[Value],
    span: Span,
    start: Number,
    operation: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult {
    let mut acc = start;
    for arg in args {
        let num = expect_number(arg, operation, span)?;
        acc = combine(acc, num, operation, span, int_op, float_op)?;
    }
    Ok(acc.into())
}

fn compare_numbers(left: Number, right: Number) -> Option<Ordering> {
    match (left, right) {
        (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
    }
}

pub fn prim_add(args: &[Value], span: Span) -> EvalResult {
    // (+) -> 0
    // (+ 1 2 3) -> 6
    fold_numbers(args, span, Number::Int(0), "+", i64::checked_add, |a, b| a + b)
}

pub fn prim_sub(args: &[Value], span: Span) -> EvalResult {
    // (- x) -> x
    // (- x y z) -> x - y - z
    check_arity!(args, Arity::AtLeast(1), span, "-");
    let first = expect_number(&args[0], "-", span)?;
    fold_numbers(&args[1..], span, first, "-", i64::checked_sub, |a, b| a - b)
}

pub fn prim_mul(args: &[Value], span: Span) -> EvalResult {
    // (*) -> 1
    // (* 1 2 3) -> 6
    fold_numbers(args, span, Number::Int(1), "*", i64::checked_mul, |a, b| a * b)
}

pub fn prim_div(args: &[Value], span: Span) -> EvalResult {
    // (/ x) -> x
    // (/ x y z) -> x / y / z, always a float
    check_arity!(args, Arity::AtLeast(1), span, "/");
    let first = expect_number(&args[0], "/", span)?;
    if args.len() == 1 {
        return Ok(first.into());
    }
    let mut result = first.to_f64();
    for arg in &args[1..] {
        let divisor = expect_float(arg, "/", span)?;
        if divisor == 0.0 {
            return Err(division_by_zero("/", span));
        }
        result /= divisor;
    }
    Ok(Value::Float(result))
}

pub fn prim_abs(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, Arity::Exactly(1), span, "abs");
    match expect_number(&args[0], "abs", span)? {
        Number::Int(n) => n
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| overflow("abs", span)),
        Number::Float(n) => Ok(Value::Float(n.abs())),
    }
}

// (min 3 1 2), or a single list: (min (list 3 1 2))
fn pick_extreme(args: &[Value], span: Span, operation: &str, wanted: Ordering) -> EvalResult {
    check_arity!(args, Arity::AtLeast(1), span, operation);
    let candidates: &[Value] = match args {
        [Value::List(items)] => items.as_slice(),
        _ => args,
    };
    let mut best: Option<(Number, &Value)> = None;
    for value in candidates {
        let num = expect_number(value, operation, span)?;
        best = match best {
            Some((current, _)) if compare_numbers(num, current) == Some(wanted) => Some((num, value)),
            Some(kept) => Some(kept),
            None => Some((num, value)),
        };
    }
    match best {
        Some((_, value)) => Ok(value.clone()),
        None => Err(EvalError::type_mismatch(
            operation,
            "a non-empty list",
            &args[0],
            span,
        )),
    }
}

pub fn prim_min(args: &[Value], span: Span) -> EvalResult {
    pick_extreme(args, span, "min", Ordering::Less)
}

pub fn prim_max(args: &[Value], span: Span) -> EvalResult {
    pick_extreme(args, span, "max", Ordering::Greater)
}

fn float_to_integer(n: f64, operation: &str, span: Span) -> EvalResult {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    if n.is_finite() && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Ok(Value::Integer(n as i64))
    } else {
        Err(EvalError::Arithmetic {
            operation: operation.to_string(),
            message: format!("cannot convert {} to an integer", n),
            span,
        })
    }
}

pub fn prim_round(args: &[Value], span: Span) -> EvalResult {
    // (round x) rounds half to even and yields an integer.
    // (round x digits) yields a float.
    check_arity!(args, Arity::Between(1, 2), span, "round");
    let number = expect_number(&args[0], "round", span)?;
    match (number, args.get(1)) {
        (Number::Int(n), None) => Ok(Value::Integer(n)),
        (Number::Float(n), None) => float_to_integer(n.round_ties_even(), "round", span),
        (number, Some(digits)) => {
            let digits = expect_integer(digits, "round", span)?;
            let exponent = i32::try_from(digits).map_err(|_| overflow("round", span))?;
            Ok(Value::Float(round_to_digits(number.to_f64(), exponent)))
        }
    }
}

// Too many digits leaves x alone; too few rounds it away to a signed zero.
fn round_to_digits(x: f64, digits: i32) -> f64 {
    if digits >= 0 {
        let scale = 10f64.powi(digits);
        let scaled = x * scale;
        if !scaled.is_finite() {
            return x;
        }
        scaled.round_ties_even() / scale
    } else {
        let scale = 10f64.powi(digits.saturating_neg());
        if !scale.is_finite() {
            return 0.0f64.copysign(x);
        }
        (x / scale).round_ties_even() * scale
    }
}

fn division_by_zero(operation: &str, span: Span) -> EvalError {
    EvalError::Arithmetic {
        operation: operation.to_string(),
        message: "division by zero".to_string(),
        span,
    }
}

pub fn prim_expt(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, Arity::Exactly(2), span, "expt");
    let base = expect_number(&args[0], "expt", span)?;
    let power = expect_number(&args[1], "expt", span)?;
    if base.to_f64() == 0.0 && power.to_f64() < 0.0 {
        return Err(division_by_zero("expt", span));
    }
    match (base, power) {
        (Number::Int(b), Number::Int(p)) if p >= 0 => u32::try_from(p)
            .ok()
            .and_then(|p| b.checked_pow(p))
            .map(Value::Integer)
            .ok_or_else(|| overflow("expt", span)),
        (b, p) => Ok(Value::Float(b.to_f64().powf(p.to_f64()))),
    }
}

// --- Comparison ---

fn chain_numbers(args: &[Value], span: Span, operation: &str, test: fn(Ordering) -> bool) -> EvalResult {
    // (< n1 n2 ...) -> boolean
    check_arity!(args, Arity::AtLeast(2), span, operation);
    let numbers = args
        .iter()
        .map(|arg| expect_number(arg, operation, span))
        .collect::<EvalResult<Vec<Number>>>()?;
    let result = numbers
        .windows(2)
        .all(|pair| compare_numbers(pair[0], pair[1]).is_some_and(test));
    Ok(Value::Boolean(result))
}

pub fn prim_equals(args: &[Value], span: Span) -> EvalResult {
    // Value equality, so lists and symbols compare too
    check_arity!(args, Arity::AtLeast(2), span, "=");
    Ok(Value::Boolean(args.windows(2).all(|pair| pair[0].equals(&pair[1]))))
}

pub fn prim_less_than(args: &[Value], span: Span) -> EvalResult {
    chain_numbers(args, span, "<", Ordering::is_lt)
}

pub fn prim_less_than_or_equals(args: &[Value], span: Span) -> EvalResult {
    chain_numbers(args, span, "<=", Ordering::is_le)
}

pub fn prim_greater_than(args: &[Value], span: Span) -> EvalResult {
    chain_numbers(args, span, ">", Ordering::is_gt)
}

pub fn prim_greater_than_or_equals(args: &[Value], span: Span) -> EvalResult {
    chain_numbers(args, span, ">=", Ordering::is_ge)
}

// --- List Primitives ---

pub fn prim_car(args: &[Value], span: Span) -> EvalResult {
    // (car list) -> first item
    check_arity!(args, Arity::Exactly(1), span, "car");
    let items = expect_list(&args[0], "car", span)?;
    items
        .first()
        .cloned()
        .ok_or_else(|| EvalError::type_mismatch("car", "a non-empty list", &args[0], span))
}

pub fn prim_cdr(args: &[Value], span: Span) -> EvalResult {
    // (cdr list) -> rest of list; the rest of () is ()
    check_arity!(args, Arity::Exactly(1), span, "cdr");
    let items = expect_list(&args[0], "cdr", span)?;
    Ok(Value::list(items.iter().skip(1).cloned().collect()))
}

pub fn prim_cons(args: &[Value], span: Span) -> EvalResult {
    // (cons item list) -> [item, ..list]
    check_arity!(args, Arity::Exactly(2), span, "cons");
    let tail = expect_list(&args[1], "cons", span)?;
    let mut items = Vec::with_capacity(tail.len() + 1);
    items.push(args[0].clone());
    items.extend(tail.iter().cloned());
    Ok(Value::list(items))
}

pub fn prim_list(args: &[Value], _span: Span) -> EvalResult {
    // (list item1 item2 ...) -> new list containing items
    Ok(Value::list(args.to_vec()))
}

pub fn prim_append(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, Arity::Exactly(2), span, "append");
    let first = expect_list(&args[0], "append", span)?;
    let second = expect_list(&args[1], "append", span)?;
    Ok(Value::list(first.iter().chain(second.iter()).cloned().collect()))
}

pub fn prim_length(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, Arity::Exactly(1), span, "length");
    let items = expect_list(&args[0], "length", span)?;
    i64::try_from(items.len())
        .map(Value::Integer)
        .map_err(|_| overflow("length", span))
}

pub fn prim_map(args: &[Value], span: Span) -> EvalResult {
    // (map proc list1 list2 ...) stops at the shortest list
    check_arity!(args, Arity::AtLeast(2), span, "map");
    let procedure = &args[0];
    if !procedure.is_procedure() {
        return Err(EvalError::type_mismatch("map", "a procedure", procedure, span));
    }
    let lists = args[1..]
        .iter()
        .map(|arg| expect_list(arg, "map", span))
        .collect::<EvalResult<Vec<_>>>()?;
    let shortest = lists.iter().map(|list| list.len()).min().unwrap_or(0);
    let mut results = Vec::with_capacity(shortest);
    for index in 0..shortest {
        let call_args = lists.iter().map(|list| list[index].clone()).collect();
        results.push(apply(procedure, call_args, span)?);
    }
    Ok(Value::list(results))
}

// --- Type Predicates ---

macro_rules! is_type {
    ($args:expr, $span:expr, $name:expr, $test:expr) => {{
        check_arity!($args, Arity::Exactly(1), $span, $name);
        Ok(Value::Boolean($test(&$args[0])))
    }};
}

pub fn prim_is_number(args: &[Value], span: Span) -> EvalResult {
    is_type!(args, span, "number?", |v: &Value| matches!(
        v,
        Value::Integer(_) | Value::Float(_)
    ))
}

pub fn prim_is_symbol(args: &[Value], span: Span) -> EvalResult {
    is_type!(args, span, "symbol?", |v: &Value| matches!(v, Value::Symbol(_)))
}

pub fn prim_is_list(args: &[Value], span: Span) -> EvalResult {
    is_type!(args, span, "list?", |v: &Value| matches!(v, Value::List(_)))
}

pub fn prim_is_procedure(args: &[Value], span: Span) -> EvalResult {
    is_type!(args, span, "procedure?", Value::is_procedure)
}

pub fn prim_is_null(args: &[Value], span: Span) -> EvalResult {
    is_type!(args, span, "null?", |v: &Value| matches!(v, Value::List(items) if items.is_empty()))
}

pub fn prim_not(args: &[Value], span: Span) -> EvalResult {
    is_type!(args, span, "not", |v: &Value| !v.is_truthy())
}

pub fn prim_is_eq(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, Arity::Exactly(2), span, "eq?");
    Ok(Value::Boolean(args[0].is_same(&args[1])))
}

pub fn prim_is_equal(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, Arity::Exactly(2), span, "equal?");
    Ok(Value::Boolean(args[0].equals(&args[1])))
}

pub fn prim_begin(args: &[Value], span: Span) -> EvalResult {
    // Arguments are already evaluated in order; keep the last one.
    check_arity!(args, Arity::AtLeast(1), span, "begin");
    Ok(args[args.len() - 1].clone())
}

// --- Math ---

// NaN out of a non-NaN input means the argument was outside the domain.
fn checked_float(result: f64, inputs: &[f64], operation: &str, span: Span) -> EvalResult {
    if result.is_nan() && !inputs.iter().any(|n| n.is_nan()) {
        Err(domain_error(operation, span))
    } else {
        Ok(Value::Float(result))
    }
}

fn unary_float(args: &[Value], span: Span, operation: &str, func: fn(f64) -> f64) -> EvalResult {
    check_arity!(args, Arity::Exactly(1), span, operation);
    let x = expect_float(&args[0], operation, span)?;
    checked_float(func(x), &[x], operation, span)
}

fn binary_float(args: &[Value], span: Span, operation: &str, func: fn(f64, f64) -> f64) -> EvalResult {
    check_arity!(args, Arity::Exactly(2), span, operation);
    let x = expect_float(&args[0], operation, span)?;
    let y = expect_float(&args[1], operation, span)?;
    checked_float(func(x, y), &[x, y], operation, span)
}

macro_rules! float_fn {
    ($fn_name:ident, $name:literal, unary $func:expr) => {
        pub fn $fn_name(args: &[Value], span: Span) -> EvalResult {
            unary_float(args, span, $name, $func)
        }
    };
    ($fn_name:ident, $name:literal, binary $func:expr) => {
        pub fn $fn_name(args: &[Value], span: Span) -> EvalResult {
            binary_float(args, span, $name, $func)
        }
    };
}

float_fn!(prim_sqrt, "sqrt", unary f64::sqrt);
float_fn!(prim_exp, "exp", unary f64::exp);
float_fn!(prim_expm1, "expm1", unary f64::exp_m1);
float_fn!(prim_log2, "log2", unary f64::log2);
float_fn!(prim_log10, "log10", unary f64::log10);
float_fn!(prim_log1p, "log1p", unary f64::ln_1p);
float_fn!(prim_sin, "sin", unary f64::sin);
float_fn!(prim_cos, "cos", unary f64::cos);
float_fn!(prim_tan, "tan", unary f64::tan);
float_fn!(prim_asin, "asin", unary f64::asin);
float_fn!(prim_acos, "acos", unary f64::acos);
float_fn!(prim_atan, "atan", unary f64::atan);
float_fn!(prim_sinh, "sinh", unary f64::sinh);
float_fn!(prim_cosh, "cosh", unary f64::cosh);
float_fn!(prim_tanh, "tanh", unary f64::tanh);
float_fn!(prim_asinh, "asinh", unary f64::asinh);
float_fn!(prim_acosh, "acosh", unary f64::acosh);
float_fn!(prim_atanh, "atanh", unary f64::atanh);
float_fn!(prim_fabs, "fabs", unary f64::abs);
float_fn!(prim_degrees, "degrees", unary f64::to_degrees);
float_fn!(prim_radians, "radians", unary f64::to_radians);
float_fn!(prim_atan2, "atan2", binary f64::atan2);
float_fn!(prim_fmod, "fmod", binary |x, y| x % y);
float_fn!(prim_pow, "pow", binary f64::powf);
float_fn!(prim_hypot, "hypot", binary f64::hypot);
float_fn!(prim_copysign, "copysign", binary f64::copysign);
float_fn!(prim_cbrt, "cbrt", unary f64::cbrt);
float_fn!(prim_exp2, "exp2", unary f64::exp2);
float_fn!(prim_erf, "erf", unary libm::erf);
float_fn!(prim_erfc, "erfc", unary libm::erfc);
float_fn!(prim_remainder, "remainder", binary libm::remainder);

fn domain_error(operation: &str, span: Span) -> EvalError {
    EvalError::Arithmetic {
        operation: operation.to_string(),
        message: "math domain error".to_string(),
        span,
    }
}

// Gamma has poles at zero and the negative integers.
fn gamma_like(args: &[Value], span: Span, operation: &str, func: fn(f64) -> f64) -> EvalResult {
    check_arity!(args, Arity::Exactly(1), span, operation);
    let x = expect_float(&args[0], operation, span)?;
    if x <= 0.0 && x.fract() == 0.0 {
        return Err(domain_error(operation, span));
    }
    checked_float(func(x), &[x], operation, span)
}

pub fn prim_gamma(args: &[Value], span: Span) -> EvalResult {
    gamma_like(args, span, "gamma", libm::tgamma)
}

pub fn prim_lgamma(args: &[Value], span: Span) -> EvalResult {
    gamma_like(args, span, "lgamma", libm::lgamma)
}

pub fn prim_ldexp(args: &[Value], span: Span) -> EvalResult {
    // (ldexp x i) -> x * 2^i
    check_arity!(args, Arity::Exactly(2), span, "ldexp");
    let x = expect_float(&args[0], "ldexp", span)?;
    let exponent = expect_integer(&args[1], "ldexp", span)?;
    let exponent = exponent.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    let result = libm::ldexp(x, exponent);
    if result.is_infinite() && x.is_finite() {
        return Err(EvalError::Arithmetic {
            operation: "ldexp".to_string(),
            message: "math range error".to_string(),
            span,
        });
    }
    Ok(Value::Float(result))
}

pub fn prim_log(args: &[Value], span: Span) -> EvalResult {
    // (log x) is the natural log, (log x base) any other
    check_arity!(args, Arity::Between(1, 2), span, "log");
    let x = expect_float(&args[0], "log", span)?;
    match args.get(1) {
        None => checked_float(x.ln(), &[x], "log", span),
        Some(base) => {
            let base = expect_float(base, "log", span)?;
            checked_float(x.ln() / base.ln(), &[x, base], "log", span)
        }
    }
}

fn integral(args: &[Value], span: Span, operation: &str, func: fn(f64) -> f64) -> EvalResult {
    check_arity!(args, Arity::Exactly(1), span, operation);
    match expect_number(&args[0], operation, span)? {
        Number::Int(n) => Ok(Value::Integer(n)),
        Number::Float(n) => float_to_integer(func(n), operation, span),
    }
}

pub fn prim_floor(args: &[Value], span: Span) -> EvalResult {
    integral(args, span, "floor", f64::floor)
}

pub fn prim_ceil(args: &[Value], span: Span) -> EvalResult {
    integral(args, span, "ceil", f64::ceil)
}

pub fn prim_trunc(args: &[Value], span: Span) -> EvalResult {
    integral(args, span, "trunc", f64::trunc)
}

pub fn prim_factorial(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, Arity::Exactly(1), span, "factorial");
    let n = expect_integer(&args[0], "factorial", span)?;
    if n < 0 {
        return Err(EvalError::Arithmetic {
            operation: "factorial".to_string(),
            message: "not defined for negative values".to_string(),
            span,
        });
    }
    (1..=n)
        .try_fold(1i64, |acc, k| acc.checked_mul(k))
        .map(Value::Integer)
        .ok_or_else(|| overflow("factorial", span))
}

fn gcd(mut a: i64, mut b: i64) -> Option<i64> {
    while b != 0 {
        (a, b) = (b, a.checked_rem(b)?);
    }
    a.checked_abs()
}

pub fn prim_gcd(args: &[Value], span: Span) -> EvalResult {
    // (gcd) -> 0
    let mut acc: i64 = 0;
    for arg in args {
        let n = expect_integer(arg, "gcd", span)?;
        acc = gcd(acc, n).ok_or_else(|| overflow("gcd", span))?;
    }
    Ok(Value::Integer(acc))
}

pub fn prim_lcm(args: &[Value], span: Span) -> EvalResult {
    // (lcm) -> 1, and anything with a zero -> 0
    let mut acc: i64 = 1;
    for arg in args {
        let n = expect_integer(arg, "lcm", span)?;
        if acc == 0 || n == 0 {
            acc = 0;
            continue;
        }
        acc = gcd(acc, n)
            .and_then(|d| (acc / d).checked_mul(n))
            .and_then(i64::checked_abs)
            .ok_or_else(|| overflow("lcm", span))?;
    }
    Ok(Value::Integer(acc))
}

pub fn prim_isqrt(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, Arity::Exactly(1), span, "isqrt");
    let n = expect_integer(&args[0], "isqrt", span)?;
    if n < 0 {
        return Err(EvalError::Arithmetic {
            operation: "isqrt".to_string(),
            message: "not defined for negative values".to_string(),
            span,
        });
    }
    Ok(Value::Integer(n.isqrt()))
}

fn float_test(args: &[Value], span: Span, operation: &str, test: fn(f64) -> bool) -> EvalResult {
    check_arity!(args, Arity::Exactly(1), span, operation);
    Ok(Value::Boolean(test(expect_float(&args[0], operation, span)?)))
}

pub fn prim_is_finite(args: &[Value], span: Span) -> EvalResult {
    float_test(args, span, "isfinite", f64::is_finite)
}

pub fn prim_is_inf(args: &[Value], span: Span) -> EvalResult {
    float_test(args, span, "isinf", f64::is_infinite)
}

pub fn prim_is_nan(args: &[Value], span: Span) -> EvalResult {
    float_test(args, span, "isnan", f64::is_nan)
}
