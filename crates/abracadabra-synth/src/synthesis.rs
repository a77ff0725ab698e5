//! The generate, check, execute, validate and repair loop.
//!
//! Each attempt asks the collaborator for a program and pushes it through
//! three gates in order: the straight-line policy, the sandbox, and the
//! validator (graph plus declared outputs). The first attempt to clear all
//! three wins. A rejection appends the candidate and a feedback message to
//! the conversation; a collaborator failure appends nothing. Either way the
//! attempt is spent.
//!
//! Nothing carries over between attempts except the conversation: every run
//! gets a fresh builder and a `RAND()` generator re-seeded from the request.

use abracadabra_check::{
    check_straight_line, parse, validate_declared_outputs, validate_graph, Bindings,
    ExecutionFault, GraphError, PolicyViolation, Sandbox, ScriptSandbox,
};
use abracadabra_core::catalog::Catalog;
use abracadabra_core::graph::{Graph, InputValue, OuterGraph, SocketRef};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::SynthConfig;
use crate::error::SynthError;
use crate::fewshot::Example;
use crate::llm_provider::{extract_code, ChatMessage, Collaborator};
use crate::prompt;

/// What the caller wants built.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub instruction: String,
    /// Seed for `RAND()`, identical on every attempt.
    pub seed: u64,
    /// Named inputs visible to the program: links into the outer graph or
    /// literals.
    pub inputs: IndexMap<String, InputValue>,
    /// Required length of `result['outputs']`.
    pub output_count: usize,
    /// Prefix for candidate node ids, keeping them clear of outer ids.
    pub node_prefix: String,
}

impl SynthesisRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        SynthesisRequest {
            instruction: instruction.into(),
            seed: 0,
            inputs: IndexMap::new(),
            output_count: 1,
            node_prefix: String::new(),
        }
    }

    fn bindings(&self) -> Bindings {
        Bindings {
            node_prefix: self.node_prefix.clone(),
            seed: self.seed,
            inputs: self.inputs.clone(),
        }
    }
}

/// A validated result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Synthesized {
    pub outputs: Vec<SocketRef>,
    pub graph: Graph,
    /// Attempts spent, including the successful one.
    #[serde(skip)]
    pub attempts: usize,
}

/// Why a candidate was turned away.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Policy(Vec<PolicyViolation>),
    Execution(ExecutionFault),
    Validation(Vec<GraphError>),
}

impl Rejection {
    pub fn stage(&self) -> &'static str {
        match self {
            Rejection::Policy(_) => "policy",
            Rejection::Execution(_) => "execution",
            Rejection::Validation(_) => "validation",
        }
    }

    /// Feedback text appended to the conversation.
    pub fn feedback(&self) -> String {
        match self {
            Rejection::Policy(violations) => prompt::policy_feedback(violations),
            Rejection::Execution(fault) => prompt::execution_feedback(fault),
            Rejection::Validation(errors) => prompt::validation_feedback(errors),
        }
    }

    /// One line per finding.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Rejection::Policy(violations) => violations.iter().map(ToString::to_string).collect(),
            Rejection::Execution(fault) => vec![fault.to_string()],
            Rejection::Validation(errors) => errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Drives the repair loop for one collaborator and sandbox.
pub struct Synthesizer<C, S = ScriptSandbox> {
    collaborator: C,
    sandbox: S,
    examples: Vec<Example>,
    max_attempts: usize,
}

impl<C: Collaborator> Synthesizer<C, ScriptSandbox> {
    /// Uses the in-process script sandbox with the configured limits.
    pub fn with_config(collaborator: C, config: &SynthConfig) -> Self {
        Synthesizer::new(
            collaborator,
            ScriptSandbox::new(config.sandbox.clone()),
            config.max_attempts,
        )
    }
}

impl<C: Collaborator, S: Sandbox> Synthesizer<C, S> {
    pub fn new(collaborator: C, sandbox: S, max_attempts: usize) -> Self {
        Synthesizer {
            collaborator,
            sandbox,
            examples: Vec::new(),
            max_attempts,
        }
    }

    /// Few-shot pairs placed ahead of every request.
    pub fn with_examples(mut self, examples: Vec<Example>) -> Self {
        self.examples = examples;
        self
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    /// Runs the loop until a candidate validates or the budget runs out.
    ///
    /// `outer` is the pre-existing graph that input links point into.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        catalog: &dyn Catalog,
        outer: &dyn OuterGraph,
    ) -> Result<Synthesized, SynthError> {
        let described = prompt::describe_bindings(&request.inputs, catalog, outer);
        let mut messages = prompt::conversation(
            catalog,
            &self.examples,
            prompt::request_message(&request.instruction, &described, request.output_count),
        );
        let bindings = request.bindings();

        info!(
            inputs = request.inputs.len(),
            outputs = request.output_count,
            max_attempts = self.max_attempts,
            "starting synthesis"
        );

        let mut last_candidate = None;
        let mut last_errors = Vec::new();

        for attempt in 1..=self.max_attempts {
            debug!(attempt, messages = messages.len(), "requesting candidate");
            let reply = match self.collaborator.complete(&messages).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(attempt, stage = "collaborator", error = %err, "attempt failed");
                    last_candidate = None;
                    last_errors = vec![err.to_string()];
                    continue;
                }
            };

            let code = extract_code(&reply);
            debug!(attempt, candidate = %code, "received candidate");

            match self.evaluate(&code, &bindings, request.output_count, catalog, outer) {
                Ok((graph, outputs)) => {
                    info!(attempt, nodes = graph.len(), "synthesis succeeded");
                    return Ok(Synthesized {
                        outputs,
                        graph,
                        attempts: attempt,
                    });
                }
                Err(rejection) => {
                    let findings = rejection.messages();
                    warn!(
                        attempt,
                        stage = rejection.stage(),
                        findings = findings.len(),
                        first = findings.first().map(String::as_str).unwrap_or_default(),
                        "candidate rejected"
                    );
                    messages.push(ChatMessage::assistant(code.clone()));
                    messages.push(ChatMessage::system(rejection.feedback()));
                    last_errors = findings;
                    last_candidate = Some(code);
                }
            }
        }

        error!(attempts = self.max_attempts, "no valid candidate within budget");
        Err(SynthError::Exhausted {
            attempts: self.max_attempts,
            last_candidate,
            last_errors,
        })
    }

    fn evaluate(
        &self,
        code: &str,
        bindings: &Bindings,
        output_count: usize,
        catalog: &dyn Catalog,
        outer: &dyn OuterGraph,
    ) -> Result<(Graph, Vec<SocketRef>), Rejection> {
        // Unparseable code falls through and comes back as a syntax fault.
        if let Ok(program) = parse(code) {
            let violations = check_straight_line(&program);
            if !violations.is_empty() {
                return Err(Rejection::Policy(violations));
            }
        }

        let execution = self
            .sandbox
            .execute(code, bindings)
            .map_err(Rejection::Execution)?;
        let graph = execution.builder.finalize();

        let mut errors = validate_graph(&graph, catalog, outer);
        errors.extend(validate_declared_outputs(
            &graph,
            catalog,
            outer,
            &execution.outputs,
            output_count,
        ));
        if errors.is_empty() {
            Ok((graph, execution.outputs))
        } else {
            Err(Rejection::Validation(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abracadabra_check::ControlFlow;

    #[test]
    fn test_request_defaults() {
        let request = SynthesisRequest::new("make a cat");
        assert_eq!(request.output_count, 1);
        assert_eq!(request.seed, 0);
        assert!(request.bindings().inputs.is_empty());
    }

    #[test]
    fn test_rejection_messages() {
        let rejection = Rejection::Policy(vec![PolicyViolation {
            line: 4,
            construct: ControlFlow::WhileLoop,
        }]);
        assert_eq!(rejection.stage(), "policy");
        assert_eq!(rejection.messages(), vec!["line 4: while loop".to_string()]);

        let rejection = Rejection::Execution(ExecutionFault::MissingOutputs);
        assert_eq!(rejection.stage(), "execution");
        assert_eq!(
            rejection.messages(),
            vec!["result['outputs'] was never set".to_string()]
        );
    }
}
