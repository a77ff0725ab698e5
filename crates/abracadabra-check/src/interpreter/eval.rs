//! Tree-walking evaluation of a parsed candidate program.
//!
//! One [`Interpreter`] runs one program once. It owns the graph builder the
//! program grows, the seeded generator behind `RAND()`, and the `result`
//! dict. Loops and branches are never executed; reaching one is an
//! [`ExecutionFault::Unsupported`].

use abracadabra_core::builder::GraphBuilder;
use abracadabra_core::graph::{InputValue, Literal, SocketRef};
use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::ast::{
    BinaryOp, BoolOp, CompareOp, Expr, ExprKind, Keyword, Program, Stmt, StmtKind, Target,
    UnaryOp,
};
use super::error::ExecutionFault;
use super::value::{Builtin, Number, Value};
use super::{Bindings, Execution};

/// Key of the `result` dict that carries the declared outputs.
pub const OUTPUTS_KEY: &str = "outputs";

pub struct Interpreter {
    builder: GraphBuilder,
    rng: ChaCha8Rng,
    scope: IndexMap<String, Value>,
    result: IndexMap<String, Value>,
    max_nodes: usize,
}

impl Interpreter {
    /// Fresh state for one run: empty builder, generator seeded from
    /// `bindings.seed`, and the caller's inputs in scope.
    pub fn new(bindings: &Bindings, max_nodes: usize) -> Self {
        let mut scope = IndexMap::new();
        scope.insert("g".to_string(), Value::Builder);
        scope.insert("result".to_string(), Value::ResultDict);
        for (name, input) in &bindings.inputs {
            scope.insert(name.clone(), Value::from_input(input));
        }

        Interpreter {
            builder: GraphBuilder::with_prefix(bindings.node_prefix.clone()),
            rng: ChaCha8Rng::seed_from_u64(bindings.seed),
            scope,
            result: IndexMap::new(),
            max_nodes,
        }
    }

    /// Runs every statement, then extracts `result['outputs']`.
    pub fn run(mut self, program: &Program) -> Result<Execution, ExecutionFault> {
        for stmt in &program.body {
            self.exec(stmt)?;
        }

        let outputs = match self.result.shift_remove(OUTPUTS_KEY) {
            Some(value) => declared_outputs(value)?,
            None => return Err(ExecutionFault::MissingOutputs),
        };

        Ok(Execution {
            builder: self.builder,
            outputs,
        })
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), ExecutionFault> {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(stmt.line, target, value.clone())?;
                }
                Ok(())
            }
            StmtKind::Expr(expr) => self.eval(expr).map(drop),
            StmtKind::Pass => Ok(()),
            StmtKind::For { .. } | StmtKind::While { .. } => Err(ExecutionFault::Unsupported {
                line: stmt.line,
                message: "loops are not allowed; use batch nodes in the graph instead".into(),
            }),
            StmtKind::If { .. } => Err(ExecutionFault::Unsupported {
                line: stmt.line,
                message: "conditionals are not allowed; express choices in the graph instead"
                    .into(),
            }),
        }
    }

    fn assign(&mut self, line: usize, target: &Target, value: Value) -> Result<(), ExecutionFault> {
        match target {
            Target::Name(name) => {
                self.scope.insert(name.clone(), value);
                Ok(())
            }
            Target::Subscript { value: container, index } => {
                let container = self.eval(container)?;
                let key = self.eval(index)?;
                match (container, key) {
                    (Value::ResultDict, Value::Str(key)) => {
                        self.result.insert(key, value);
                        Ok(())
                    }
                    (Value::ResultDict, key) => Err(ExecutionFault::Type {
                        line,
                        message: format!("result keys must be strings, not {}", key.type_name()),
                    }),
                    (other, _) => Err(ExecutionFault::Type {
                        line,
                        message: format!(
                            "'{}' object does not support item assignment",
                            other.type_name()
                        ),
                    }),
                }
            }
            Target::Tuple(targets) => {
                let items = match value {
                    Value::List(items) | Value::Tuple(items) => items,
                    other => {
                        return Err(ExecutionFault::Type {
                            line,
                            message: format!("cannot unpack non-sequence {}", other.type_name()),
                        })
                    }
                };
                if items.len() != targets.len() {
                    return Err(ExecutionFault::Value {
                        line,
                        message: format!(
                            "expected {} values to unpack, got {}",
                            targets.len(),
                            items.len()
                        ),
                    });
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(line, target, item)?;
                }
                Ok(())
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ExecutionFault> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Name(name) => self.lookup(line, name),
            ExprKind::Int(v) => Ok(Value::Int(*v)),
            ExprKind::Float(v) => Ok(Value::Float(*v)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::None => Ok(Value::None),
            ExprKind::List(items) => Ok(Value::List(self.eval_all(items)?)),
            ExprKind::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            ExprKind::Attribute { value, attr } => {
                let receiver = self.eval(value)?;
                attribute(line, receiver, attr)
            }
            ExprKind::Subscript { value, index } => {
                let container = self.eval(value)?;
                let index = self.eval(index)?;
                self.subscript(line, container, index)
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval(func)?;
                let args = self.eval_all(args)?;
                self.call(line, callee, args, keywords)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                unary(line, *op, operand)
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(line, *op, left, right)
            }
            ExprKind::Compare { left, ops } => {
                let mut left = self.eval(left)?;
                for (op, right) in ops {
                    let right = self.eval(right)?;
                    if !compare(line, *op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::BoolOp { op, values } => {
                let mut last = Value::None;
                for value in values {
                    last = self.eval(value)?;
                    let done = match op {
                        BoolOp::And => !last.truthy(),
                        BoolOp::Or => last.truthy(),
                    };
                    if done {
                        break;
                    }
                }
                Ok(last)
            }
            ExprKind::Conditional { .. } => Err(ExecutionFault::Unsupported {
                line,
                message: "conditional expressions are not allowed".into(),
            }),
            ExprKind::ListComp { .. } => Err(ExecutionFault::Unsupported {
                line,
                message: "comprehensions are not allowed; use batch nodes in the graph instead"
                    .into(),
            }),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, ExecutionFault> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn lookup(&self, line: usize, name: &str) -> Result<Value, ExecutionFault> {
        if let Some(value) = self.scope.get(name) {
            return Ok(value.clone());
        }
        match Builtin::lookup(name) {
            Some(builtin) => Ok(Value::Builtin(builtin)),
            None => Err(ExecutionFault::Name {
                line,
                name: name.to_string(),
            }),
        }
    }

    fn subscript(&self, line: usize, container: Value, index: Value) -> Result<Value, ExecutionFault> {
        match (container, index) {
            (Value::ResultDict, Value::Str(key)) => {
                self.result
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| ExecutionFault::Value {
                        line,
                        message: format!("result has no key '{}'", key),
                    })
            }
            (Value::List(items) | Value::Tuple(items), Value::Int(i)) => {
                let len = items.len() as i128;
                let at = if i < 0 { i + len } else { i };
                if at < 0 || at >= len {
                    return Err(ExecutionFault::Value {
                        line,
                        message: format!("index {} out of range", i),
                    });
                }
                Ok(items[at as usize].clone())
            }
            (container, index) => Err(ExecutionFault::Type {
                line,
                message: format!(
                    "'{}' object cannot be indexed by {}",
                    container.type_name(),
                    index.type_name()
                ),
            }),
        }
    }

    fn call(
        &mut self,
        line: usize,
        callee: Value,
        args: Vec<Value>,
        keywords: &[Keyword],
    ) -> Result<Value, ExecutionFault> {
        match callee {
            Value::Method { receiver, name } => match (*receiver, name.as_str()) {
                (Value::Builder, "node") => self.create_node(line, args, keywords),
                (Value::Node(handle), "out") => {
                    no_keywords(line, "out", keywords)?;
                    match args.as_slice() {
                        [Value::Int(i)] if *i >= 0 => usize::try_from(*i)
                            .map(|index| Value::Socket(handle.out(index)))
                            .map_err(|_| ExecutionFault::Value {
                                line,
                                message: format!("output index {} is too large", i),
                            }),
                        [Value::Int(i)] => Err(ExecutionFault::Value {
                            line,
                            message: format!("output index must not be negative, got {}", i),
                        }),
                        _ => Err(ExecutionFault::Type {
                            line,
                            message: "out() takes exactly one integer output index".into(),
                        }),
                    }
                }
                (receiver, name) => Err(ExecutionFault::Attribute {
                    line,
                    message: format!("'{}' object has no method '{}'", receiver.type_name(), name),
                }),
            },
            Value::Builtin(builtin) => {
                no_keywords(line, "builtin functions", keywords)?;
                self.call_builtin(line, builtin, args)
            }
            other => Err(ExecutionFault::Type {
                line,
                message: format!("'{}' object is not callable", other.type_name()),
            }),
        }
    }

    /// `g.node("Type", name=value, ...)`
    fn create_node(
        &mut self,
        line: usize,
        args: Vec<Value>,
        keywords: &[Keyword],
    ) -> Result<Value, ExecutionFault> {
        let type_name = match args.as_slice() {
            [Value::Str(type_name)] => type_name.clone(),
            [other] => {
                return Err(ExecutionFault::Type {
                    line,
                    message: format!("node type must be a string, not {}", other.type_name()),
                })
            }
            _ => {
                return Err(ExecutionFault::Type {
                    line,
                    message: format!(
                        "node() takes the node type as its only positional argument ({} given); pass inputs as keyword arguments",
                        args.len()
                    ),
                })
            }
        };

        let mut inputs = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let value = self.eval(&keyword.value)?;
            inputs.push((keyword.name.clone(), to_input(keyword.value.line, &keyword.name, value)?));
        }

        if self.builder.node_count() >= self.max_nodes {
            return Err(ExecutionFault::NodeLimitExceeded {
                limit: self.max_nodes,
            });
        }
        Ok(Value::Node(self.builder.node(type_name, inputs)))
    }

    fn call_builtin(
        &mut self,
        line: usize,
        builtin: Builtin,
        args: Vec<Value>,
    ) -> Result<Value, ExecutionFault> {
        let type_error = |message: String| ExecutionFault::Type { line, message };
        match (builtin, args.as_slice()) {
            (Builtin::Rand, []) => Ok(Value::Int(self.rng.gen::<u64>().into())),
            (Builtin::Rand, _) => Err(type_error("RAND() takes no arguments".into())),
            (Builtin::Int, [value]) => match value {
                Value::Int(v) => Ok(Value::Int(*v)),
                Value::Bool(b) => Ok(Value::Int(i128::from(*b))),
                Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i128)),
                Value::Str(s) => s.trim().parse::<i128>().map(Value::Int).map_err(|_| {
                    ExecutionFault::Value {
                        line,
                        message: format!("invalid literal for int(): '{}'", s),
                    }
                }),
                other => Err(type_error(format!("int() argument must be a number or string, not {}", other.type_name()))),
            },
            (Builtin::Float, [value]) => match value {
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    ExecutionFault::Value {
                        line,
                        message: format!("could not convert string to float: '{}'", s),
                    }
                }),
                other => other
                    .as_number()
                    .map(|n| Value::Float(n.as_f64()))
                    .ok_or_else(|| type_error(format!("float() argument must be a number or string, not {}", other.type_name()))),
            },
            (Builtin::Str, [value]) => Ok(Value::Str(display(value))),
            (Builtin::Len, [value]) => match value {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i128)),
                Value::List(items) | Value::Tuple(items) => Ok(Value::Int(items.len() as i128)),
                other => Err(type_error(format!("object of type '{}' has no len()", other.type_name()))),
            },
            (Builtin::Abs, [value]) => match value.as_number() {
                Some(Number::Int(v)) => v.checked_abs().map(Value::Int).ok_or_else(|| ExecutionFault::Value {
                    line,
                    message: "integer overflow".into(),
                }),
                Some(Number::Float(v)) => Ok(Value::Float(v.abs())),
                None => Err(type_error(format!("bad operand type for abs(): '{}'", value.type_name()))),
            },
            (Builtin::Min | Builtin::Max, values) if !values.is_empty() => {
                let values = match values {
                    [Value::List(items) | Value::Tuple(items)] => items.as_slice(),
                    _ => values,
                };
                let want = if builtin == Builtin::Min { CompareOp::Lt } else { CompareOp::Gt };
                let mut best = values
                    .first()
                    .cloned()
                    .ok_or_else(|| ExecutionFault::Value { line, message: "arg is an empty sequence".into() })?;
                for value in &values[1..] {
                    if compare(line, want, value, &best)? {
                        best = value.clone();
                    }
                }
                Ok(best)
            }
            (builtin, args) => Err(type_error(format!(
                "{}() does not accept {} argument(s)",
                builtin.name(),
                args.len()
            ))),
        }
    }
}

/// `value.attr` without a call: only methods exist on sandbox objects.
fn attribute(line: usize, receiver: Value, attr: &str) -> Result<Value, ExecutionFault> {
    let known = matches!(
        (&receiver, attr),
        (Value::Builder, "node") | (Value::Node(_), "out")
    );
    if known {
        return Ok(Value::Method {
            receiver: Box::new(receiver),
            name: attr.to_string(),
        });
    }
    let hint = match &receiver {
        Value::Socket(_) => " (a node output cannot be indexed again; link it directly)",
        _ => "",
    };
    Err(ExecutionFault::Attribute {
        line,
        message: format!(
            "'{}' object has no attribute '{}'{}",
            receiver.type_name(),
            attr,
            hint
        ),
    })
}

fn no_keywords(line: usize, what: &str, keywords: &[Keyword]) -> Result<(), ExecutionFault> {
    match keywords.first() {
        None => Ok(()),
        Some(keyword) => Err(ExecutionFault::Type {
            line,
            message: format!("{} got an unexpected keyword argument '{}'", what, keyword.name),
        }),
    }
}

/// Converts a value passed as a node input into a stored binding.
fn to_input(line: usize, input: &str, value: Value) -> Result<InputValue, ExecutionFault> {
    let literal = match value {
        Value::Socket(socket) => return Ok(InputValue::Link(socket)),
        Value::Node(_) => {
            return Err(ExecutionFault::Type {
                line,
                message: format!(
                    "input '{}' was given a node, not a node output; use node.out(index) to select one of its outputs",
                    input
                ),
            })
        }
        Value::Int(v) => int_literal(v).ok_or_else(|| ExecutionFault::Value {
            line,
            message: format!("integer {} for input '{}' is out of range", v, input),
        })?,
        Value::Float(v) => Literal::float(v).ok_or_else(|| ExecutionFault::Value {
            line,
            message: format!("input '{}' must be a finite number", input),
        })?,
        Value::Str(s) => Literal::String(s),
        Value::Bool(b) => Literal::Bool(b),
        Value::None => Literal::Null,
        other => {
            return Err(ExecutionFault::Type {
                line,
                message: format!(
                    "input '{}' must be a node output or a literal, not {}",
                    input,
                    other.type_name()
                ),
            })
        }
    };
    Ok(InputValue::Literal(literal))
}

fn int_literal(v: i128) -> Option<Literal> {
    if let Ok(v) = i64::try_from(v) {
        return Some(Literal::from(v));
    }
    u64::try_from(v).ok().map(Literal::from)
}

/// Validates the shape of `result['outputs']`.
fn declared_outputs(value: Value) -> Result<Vec<SocketRef>, ExecutionFault> {
    let items = match value {
        Value::List(items) | Value::Tuple(items) => items,
        Value::Socket(_) => {
            return Err(ExecutionFault::InvalidOutputs {
                message: "got a single output; wrap it in a list".into(),
            })
        }
        other => {
            return Err(ExecutionFault::InvalidOutputs {
                message: format!("got {}", other.type_name()),
            })
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            Value::Socket(socket) => Ok(socket),
            Value::Node(_) => Err(ExecutionFault::InvalidOutputs {
                message: format!(
                    "element {} is a node; use node.out(index) to select one of its outputs",
                    position
                ),
            }),
            other => Err(ExecutionFault::InvalidOutputs {
                message: format!("element {} is {}", position, other.type_name()),
            }),
        })
        .collect()
}

fn unary(line: usize, op: UnaryOp, operand: Value) -> Result<Value, ExecutionFault> {
    match (op, operand.as_number()) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!operand.truthy())),
        (UnaryOp::Neg, Some(Number::Int(v))) => v.checked_neg().map(Value::Int).ok_or(ExecutionFault::Value {
            line,
            message: "integer overflow".into(),
        }),
        (UnaryOp::Neg, Some(Number::Float(v))) => Ok(Value::Float(-v)),
        (UnaryOp::Pos, Some(Number::Int(v))) => Ok(Value::Int(v)),
        (UnaryOp::Pos, Some(Number::Float(v))) => Ok(Value::Float(v)),
        (_, None) => Err(ExecutionFault::Type {
            line,
            message: format!("bad operand type for unary operator: '{}'", operand.type_name()),
        }),
    }
}

fn binary(line: usize, op: BinaryOp, left: Value, right: Value) -> Result<Value, ExecutionFault> {
    let overflow = || ExecutionFault::Value {
        line,
        message: "integer overflow".into(),
    };
    let zero = || ExecutionFault::Value {
        line,
        message: "division by zero".into(),
    };

    match (op, &left, &right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            return Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        _ => {}
    }

    let (a, b) = match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ExecutionFault::Type {
                line,
                message: format!(
                    "unsupported operand types for {}: '{}' and '{}'",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
            })
        }
    };

    if let (Number::Int(a), Number::Int(b)) = (a, b) {
        let value = match op {
            BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
            BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
            BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
            BinaryOp::FloorDiv | BinaryOp::Mod => {
                if b == 0 {
                    return Err(zero());
                }
                let q = a.checked_div(b).ok_or_else(overflow)?;
                let r = a.checked_rem(b).ok_or_else(overflow)?;
                // Round toward negative infinity.
                let (q, r) = if r != 0 && ((r < 0) != (b < 0)) {
                    (q.checked_sub(1).ok_or_else(overflow)?, r + b)
                } else {
                    (q, r)
                };
                if op == BinaryOp::FloorDiv {
                    q
                } else {
                    r
                }
            }
            BinaryOp::Pow if b >= 0 => {
                let exp = u32::try_from(b).map_err(|_| overflow())?;
                a.checked_pow(exp).ok_or_else(overflow)?
            }
            BinaryOp::Div | BinaryOp::Pow => return float_binary(op, a as f64, b as f64, zero),
        };
        return Ok(Value::Int(value));
    }

    float_binary(op, a.as_f64(), b.as_f64(), zero)
}

fn float_binary(
    op: BinaryOp,
    a: f64,
    b: f64,
    zero: impl Fn() -> ExecutionFault,
) -> Result<Value, ExecutionFault> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => return Err(zero()),
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => a - b * (a / b).floor(),
        BinaryOp::Pow => a.powf(b),
    };
    Ok(Value::Float(value))
}

fn compare(line: usize, op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExecutionFault> {
    let ordering = || -> Result<std::cmp::Ordering, ExecutionFault> {
        let ordering = match (left, right) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => match (left.as_number(), right.as_number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
                (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
                _ => None,
            },
        };
        ordering.ok_or_else(|| ExecutionFault::Type {
            line,
            message: format!(
                "cannot order '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ),
        })
    };

    Ok(match op {
        CompareOp::Eq => equal(left, right),
        CompareOp::NotEq => !equal(left, right),
        CompareOp::Lt => ordering()?.is_lt(),
        CompareOp::LtEq => ordering()?.is_le(),
        CompareOp::Gt => ordering()?.is_gt(),
        CompareOp::GtEq => ordering()?.is_ge(),
        CompareOp::In | CompareOp::NotIn => {
            let found = match right {
                Value::List(items) | Value::Tuple(items) => items.iter().any(|item| equal(left, item)),
                Value::Str(haystack) => match left {
                    Value::Str(needle) => haystack.contains(needle.as_str()),
                    _ => false,
                },
                other => {
                    return Err(ExecutionFault::Type {
                        line,
                        message: format!("argument of type '{}' is not iterable", other.type_name()),
                    })
                }
            };
            found == (op == CompareOp::In)
        }
        CompareOp::Is => left == right,
        CompareOp::IsNot => left != right,
    })
}

/// Python equality: numbers compare by value across int/float/bool.
fn equal(left: &Value, right: &Value) -> bool {
    match (left.as_number(), right.as_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// `str(value)`
fn display(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Float(v) => format!("{:?}", v),
        Value::Str(s) => s.clone(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::None => "None".into(),
        other => format!("<{}>", other.type_name()),
    }
}
