use crate::environment::EnvRef;
use crate::evaluator::EvalResult;
use crate::source::Span;
use std::fmt;
use std::rc::Rc;

/// A parsed expression together with the source span it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Expr,
    pub span: Span,
}

impl Node {
    pub fn new(kind: Expr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(Expr::Integer(n), span)
    }

    pub fn new_float(n: f64, span: Span) -> Self {
        Node::new(Expr::Float(n), span)
    }

    pub fn new_symbol(name: impl Into<String>, span: Span) -> Self {
        Node::new(Expr::Symbol(name.into()), span)
    }

    pub fn new_list(nodes: Vec<Node>, span: Span) -> Self {
        Node::new(Expr::List(nodes), span)
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Compares two trees by shape and content only, ignoring spans.
    pub fn same_shape(&self, other: &Node) -> bool {
        match (&self.kind, &other.kind) {
            (Expr::Integer(a), Expr::Integer(b)) => a == b,
            (Expr::Float(a), Expr::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Expr::Symbol(a), Expr::Symbol(b)) => a == b,
            (Expr::List(a), Expr::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// The syntax tree produced by the parser: atoms and nested lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),
    Float(f64),
    Symbol(String),
    List(Vec<Node>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(n) => write!(f, "{}", n),
            Expr::Float(n) => write_float(f, *n),
            Expr::Symbol(s) => write!(f, "{}", s),
            Expr::List(nodes) => write_seq(f, nodes),
        }
    }
}

// Floats always keep a decimal point so they read back as floats.
fn write_float(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 {
        write!(f, "{:.1}", n)
    } else {
        write!(f, "{}", n)
    }
}

fn write_seq<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "(")?;
    let mut first = true;
    for item in items {
        if !first {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
        first = false;
    }
    write!(f, ")")
}

/// Runtime values.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Symbol(String),
    List(Rc<Vec<Value>>),
    Primitive(Primitive),
    Closure(Rc<Closure>),
    /// Result of `define` and `set!`. The driver doesn't print it at top
    /// level, but it can still end up inside data.
    Unit,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn nil() -> Value {
        Value::list(Vec::new())
    }

    pub fn symbol(name: impl Into<String>) -> Value {
        Value::Symbol(name.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Primitive(_) | Value::Closure(_) => "procedure",
            Value::Unit => "unit",
        }
    }

    /// Only `#f` is false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Primitive(_) | Value::Closure(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Structural equality as used by `=` and `equal?`. Integers and floats
    /// compare by numeric value; procedures compare by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => self.is_same(other),
        }
    }

    /// Identity as used by `eq?`. Lists are identical when they are the same
    /// allocation, or both empty.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || (a.is_empty() && b.is_empty()),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

// Variant-strict equality: `Integer(1) != Float(1.0)`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Primitive(a), Value::Primitive(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Unit, Value::Unit) => true,
            _ => false,
        }
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        match &node.kind {
            Expr::Integer(n) => Value::Integer(*n),
            Expr::Float(n) => Value::Float(*n),
            Expr::Symbol(s) => Value::Symbol(s.clone()),
            Expr::List(nodes) => Value::list(nodes.iter().map(Value::from).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write_float(f, *n),
            Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(items) => write_seq(f, items),
            Value::Primitive(primitive) => write!(f, "#<primitive:{}>", primitive.name),
            Value::Closure(closure) => write!(f, "#<lambda ({})>", closure.params.join(" ")),
            Value::Unit => write!(f, "#<unit>"),
        }
    }
}

pub type PrimitiveFunc = fn(&[Value], Span) -> EvalResult;

/// A procedure implemented in Rust.
#[derive(Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub func: PrimitiveFunc,
}

impl Primitive {
    pub fn new(name: &'static str, func: PrimitiveFunc) -> Self {
        Primitive { name, func }
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive({})", self.name)
    }
}

// Function pointers don't compare reliably, and every primitive has a
// unique name in the root environment.
impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A user procedure created by `lambda`.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Node,
    pub env: EnvRef,
}

// The captured environment may hold this closure, so it is left out.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body.to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(items: &[i64]) -> Value {
        Value::list(items.iter().map(|n| Value::Integer(*n)).collect())
    }

    #[test]
    fn test_display_numbers() {
        assert_eq!(Value::Integer(25).to_string(), "25");
        assert_eq!(Value::Integer(-3).to_string(), "-3");
        assert_eq!(Value::Float(5.0).to_string(), "5.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(-0.125).to_string(), "-0.125");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "inf");
    }

    #[test]
    fn test_display_lists() {
        assert_eq!(ints(&[1, 2, 3]).to_string(), "(1 2 3)");
        assert_eq!(Value::nil().to_string(), "()");
        let nested = Value::list(vec![Value::symbol("a"), ints(&[1]), Value::nil()]);
        assert_eq!(nested.to_string(), "(a (1) ())");
    }

    #[test]
    fn test_display_misc() {
        assert_eq!(Value::Boolean(true).to_string(), "#t");
        assert_eq!(Value::Boolean(false).to_string(), "#f");
        assert_eq!(Value::symbol("foo").to_string(), "foo");
        assert_eq!(Value::Unit.to_string(), "#<unit>");
        let holder = Value::list(vec![Value::Unit, Value::Integer(1)]);
        assert_eq!(holder.to_string(), "(#<unit> 1)");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::nil().is_truthy());
    }

    #[test]
    fn test_equals_promotes_numbers() {
        assert!(Value::Integer(1).equals(&Value::Float(1.0)));
        assert!(!Value::Integer(1).equals(&Value::Float(1.5)));
        assert!(ints(&[1, 2]).equals(&ints(&[1, 2])));
        assert!(!ints(&[1, 2]).equals(&ints(&[1])));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }

    #[test]
    fn test_is_same_uses_identity_for_lists() {
        let a = ints(&[1, 2]);
        assert!(a.is_same(&a.clone()));
        assert!(!a.is_same(&ints(&[1, 2])));
        assert!(Value::nil().is_same(&Value::nil()));
        assert!(Value::symbol("x").is_same(&Value::symbol("x")));
    }

    #[test]
    fn test_value_from_node() {
        let node = Node::new_list(
            vec![
                Node::new_symbol("a", Span::new(1, 2)),
                Node::new_float(1.5, Span::new(3, 6)),
            ],
            Span::new(0, 7),
        );
        let value = Value::from(&node);
        assert_eq!(
            value,
            Value::list(vec![Value::symbol("a"), Value::Float(1.5)])
        );
    }

    #[test]
    fn test_same_shape_ignores_spans() {
        let a = Node::new_list(vec![Node::new_integer(1, Span::new(1, 2))], Span::new(0, 3));
        let b = Node::new_list(vec![Node::new_integer(1, Span::new(5, 6))], Span::new(4, 9));
        assert!(a.same_shape(&b));
        assert_ne!(a, b);
    }
}
