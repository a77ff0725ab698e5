//! Socket types: the type tags attached to node inputs and outputs.
//!
//! A type is an opaque identifier such as `IMAGE` or `MASK`. Two special
//! shapes exist besides plain names:
//! - [`SocketType::Any`], the wildcard (`"*"` in catalog data), which matches
//!   every type in both directions.
//! - [`SocketType::OneOf`], an enumerated-choice input that only accepts
//!   literal values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The type of a socket (node input or output).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawSocketType", into = "RawSocketType")]
pub enum SocketType {
    /// Wildcard. Compatible with every other type.
    Any,
    /// A named type such as `IMAGE`.
    Named(String),
    /// A literal-only input restricted to the listed choices.
    OneOf(Vec<String>),
}

impl SocketType {
    /// Spelling of the wildcard in catalog data.
    pub const WILDCARD: &'static str = "*";

    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == Self::WILDCARD {
            SocketType::Any
        } else {
            SocketType::Named(name)
        }
    }

    pub fn one_of<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SocketType::OneOf(choices.into_iter().map(Into::into).collect())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, SocketType::Any)
    }

    /// Whether a value of type `produced` may feed a socket of type `self`.
    ///
    /// The wildcard short-circuits on either side; otherwise types must be
    /// identical.
    pub fn accepts(&self, produced: &SocketType) -> bool {
        self.is_any() || produced.is_any() || self == produced
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketType::Any => f.write_str(Self::WILDCARD),
            SocketType::Named(name) => f.write_str(name),
            SocketType::OneOf(choices) => {
                f.write_str("OneOf[")?;
                for (i, choice) in choices.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}'", choice)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for SocketType {
    fn from(name: &str) -> Self {
        SocketType::named(name)
    }
}

/// Wire shape: a bare string, or an array of choices.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawSocketType {
    Name(String),
    Choices(Vec<String>),
}

impl From<RawSocketType> for SocketType {
    fn from(raw: RawSocketType) -> Self {
        match raw {
            RawSocketType::Name(name) => SocketType::named(name),
            RawSocketType::Choices(choices) => SocketType::OneOf(choices),
        }
    }
}

impl From<SocketType> for RawSocketType {
    fn from(ty: SocketType) -> Self {
        match ty {
            SocketType::Any => RawSocketType::Name(SocketType::WILDCARD.to_string()),
            SocketType::Named(name) => RawSocketType::Name(name),
            SocketType::OneOf(choices) => RawSocketType::Choices(choices),
        }
    }
}
