//! Runtime value representation for the script sandbox.
//!
//! Besides plain data, a [`Value`] can be one of the sandbox's own objects:
//! the graph builder `g`, the `result` dict, node handles and the sockets
//! they hand out. Those are what flows into `g.node(...)` calls.

use abracadabra_core::builder::NodeHandle;
use abracadabra_core::graph::{InputValue, Literal, SocketRef};

/// Free functions callable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Rand,
    Int,
    Float,
    Str,
    Len,
    Min,
    Max,
    Abs,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        Some(match name {
            "RAND" => Builtin::Rand,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "str" => Builtin::Str,
            "len" => Builtin::Len,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "abs" => Builtin::Abs,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Rand => "RAND",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Len => "len",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
        }
    }
}

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The graph builder bound to `g`.
    Builder,
    /// The output accumulator bound to `result`.
    ResultDict,
    Builtin(Builtin),
    /// `receiver.name`, waiting to be called.
    Method {
        receiver: Box<Value>,
        name: String,
    },
    Node(NodeHandle),
    Socket(SocketRef),
    Int(i128),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    List(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    /// Python-style type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Builder => "GraphBuilder",
            Value::ResultDict => "dict",
            Value::Builtin(_) => "builtin_function",
            Value::Method { .. } => "method",
            Value::Node(_) => "NodeHandle",
            Value::Socket(_) => "NodeOutput",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::None => "NoneType",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::None => false,
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Converts an input binding supplied by the caller.
    pub fn from_input(input: &InputValue) -> Value {
        match input {
            InputValue::Link(socket) => Value::Socket(socket.clone()),
            InputValue::Literal(literal) => Value::from_literal(literal),
        }
    }

    pub fn from_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Null => Value::None,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Value::Int(v.into())
                } else if let Some(v) = n.as_u64() {
                    Value::Int(v.into())
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Literal::String(s) => Value::Str(s.clone()),
        }
    }

    /// Numeric view used by arithmetic and comparisons; bools count as ints.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(v) => Some(Number::Int(*v)),
            Value::Bool(b) => Some(Number::Int(i128::from(*b))),
            Value::Float(v) => Some(Number::Float(*v)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abracadabra_core::graph::Literal;

    #[test]
    fn test_literal_numbers_keep_integer_range() {
        assert_eq!(
            Value::from_literal(&Literal::from(u64::MAX)),
            Value::Int(u64::MAX as i128)
        );
        assert_eq!(Value::from_literal(&Literal::from(-3i64)), Value::Int(-3));
        assert_eq!(
            Value::from_literal(&Literal::float(0.5).unwrap()),
            Value::Float(0.5)
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(Value::Str("x".into()).truthy());
        assert!(Value::Builder.truthy());
    }
}
