//! Script sandbox for candidate programs.
//!
//! A candidate program is a straight-line script that grows a graph through
//! a builder. The sandbox is the only way candidate code affects anything:
//! it sees exactly the locals it is given and nothing else.
//!
//! # Architecture
//!
//! - [`lexer`] turns source into tokens (logos plus indentation tracking).
//! - [`parser`] builds a [`Program`] syntax tree. Loops and branches are
//!   parsed so the policy check can see them, but never run.
//! - [`eval::Interpreter`] walks the tree once with a fresh builder, a
//!   `RAND()` generator seeded from the request, and the `result` dict.
//! - [`ScriptSandbox`] ties these together behind the [`Sandbox`] trait.
//!
//! # Locals
//!
//! ```text
//! g       GraphBuilder   g.node("Type", input=value, ...) -> node; node.out(i) -> output
//! RAND    fn() -> int    uniform over 0..=u64::MAX
//! result  dict           result['outputs'] = [node.out(0), ...]
//! <name>  per binding    caller-supplied inputs (node outputs or literals)
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::Program;
pub use error::{ExecutionFault, ParseError};
pub use parser::parse;

use abracadabra_core::builder::GraphBuilder;
use abracadabra_core::graph::{InputValue, SocketRef};
use indexmap::IndexMap;

use eval::Interpreter;

/// Everything a run of candidate code is given besides the code itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    /// Prefix for the ids of nodes the program creates.
    pub node_prefix: String,
    /// Seed for `RAND()`. The generator is re-created from it on every run.
    pub seed: u64,
    /// Named input bindings, visible to the program as locals.
    pub inputs: IndexMap<String, InputValue>,
}

/// The outcome of a successful run: the populated builder (not yet
/// finalized) and the declared outputs in order.
#[derive(Debug, Clone)]
pub struct Execution {
    pub builder: GraphBuilder,
    pub outputs: Vec<SocketRef>,
}

/// Runs candidate code.
pub trait Sandbox {
    fn execute(&self, code: &str, bindings: &Bindings) -> Result<Execution, ExecutionFault>;
}

/// Sandbox limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Maximum nodes one run may create. Default: 256.
    pub max_nodes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig { max_nodes: 256 }
    }
}

/// In-process interpreter for the candidate language.
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    config: SandboxConfig,
}

impl ScriptSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        ScriptSandbox { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }
}

impl Sandbox for ScriptSandbox {
    fn execute(&self, code: &str, bindings: &Bindings) -> Result<Execution, ExecutionFault> {
        let program = parse(code)?;
        Interpreter::new(bindings, self.config.max_nodes).run(&program)
    }
}
