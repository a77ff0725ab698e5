//! Faults raised while parsing or running a candidate program.
//!
//! Every fault carries the source line where it occurred so the repair
//! feedback can point the collaborator at the offending statement.

use serde::Serialize;

/// A lexing or parsing failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

/// Anything that stops a candidate program from producing a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind")]
pub enum ExecutionFault {
    #[error("SyntaxError: {0}")]
    Syntax(#[from] ParseError),

    #[error("NameError (line {line}): name '{name}' is not defined")]
    Name { line: usize, name: String },

    #[error("AttributeError (line {line}): {message}")]
    Attribute { line: usize, message: String },

    #[error("TypeError (line {line}): {message}")]
    Type { line: usize, message: String },

    #[error("ValueError (line {line}): {message}")]
    Value { line: usize, message: String },

    #[error("Unsupported (line {line}): {message}")]
    Unsupported { line: usize, message: String },

    #[error("result['outputs'] was never set")]
    MissingOutputs,

    #[error("result['outputs'] must be a list of node outputs: {message}")]
    InvalidOutputs { message: String },

    #[error("node limit exceeded: a program may create at most {limit} nodes")]
    NodeLimitExceeded { limit: usize },
}
