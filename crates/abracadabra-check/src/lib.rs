//! Static checks and sandboxed execution for candidate graph programs.
//!
//! - [`validate`]: structural type checking of a candidate graph against the
//!   catalog and an outer graph. Reports every finding, never fails.
//! - [`policy`]: rejects programs containing loops or branches.
//! - [`interpreter`]: parses and runs candidate programs against a fresh
//!   graph builder.

pub mod interpreter;
pub mod policy;
pub mod validate;

pub use interpreter::{
    parse, Bindings, Execution, ExecutionFault, ParseError, Program, Sandbox, SandboxConfig,
    ScriptSandbox,
};
pub use policy::{check_straight_line, ControlFlow, PolicyViolation};
pub use validate::{validate_declared_outputs, validate_graph, GraphError};
