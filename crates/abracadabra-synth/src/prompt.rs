//! Conversation assembly for the collaborator.
//!
//! A conversation is: system instructions, the catalog summary, the few-shot
//! pairs, then the request itself. Rejected attempts append the candidate as
//! an assistant turn followed by a system turn explaining what was wrong.

use std::fmt::Write as _;

use abracadabra_check::{ExecutionFault, GraphError, PolicyViolation};
use abracadabra_core::catalog::Catalog;
use abracadabra_core::graph::{InputValue, OuterGraph};
use abracadabra_core::summary::node_summaries;
use abracadabra_core::types::SocketType;
use indexmap::IndexMap;

use crate::fewshot::Example;
use crate::llm_provider::ChatMessage;

pub const SYSTEM_INSTRUCTIONS: &str = "You build node-graph workflows that carry out the user's instructions. \
You are given the list of available nodes and several examples of workflows built from them. \
Respond with a chunk of Python code that creates the node graph and does nothing else. \
Never use loops or conditionals in the code; batching and branching belong in the graph. \
All IMAGE values are batches of images, so prefer batch operations. \
Bind every required input of every node you create.";

const CATALOG_PREAMBLE: &str =
    "Here is the definition of available nodes. Do not attempt to use any nodes that are not listed here.\n\n";

/// How one input binding is presented to the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDescription {
    pub name: String,
    /// Producer's output type for links, a literal label otherwise.
    pub type_label: String,
    /// Producer's output name, when the catalog has one.
    pub output_name: Option<String>,
}

/// Infers the semantic type of each binding.
///
/// Links take the producer's declared output type (`*` when the producer or
/// the index cannot be resolved); literals map to `STRING`, `INTEGER`,
/// `FLOAT`, `BOOLEAN` or `NONE`.
pub fn describe_bindings(
    inputs: &IndexMap<String, InputValue>,
    catalog: &dyn Catalog,
    outer: &dyn OuterGraph,
) -> Vec<BindingDescription> {
    inputs
        .iter()
        .map(|(name, value)| {
            let (type_label, output_name) = match value {
                InputValue::Literal(literal) => (literal.type_label().to_string(), None),
                InputValue::Link(socket) => {
                    let entry = outer
                        .lookup(&socket.node)
                        .and_then(|type_name| catalog.describe(type_name));
                    match entry.and_then(|e| e.output_types.get(socket.output).map(|t| (e, t))) {
                        Some((entry, ty)) => (
                            ty.to_string(),
                            entry.output_name(socket.output).map(str::to_string),
                        ),
                        None => (SocketType::Any.to_string(), None),
                    }
                }
            };
            BindingDescription {
                name: name.clone(),
                type_label,
                output_name,
            }
        })
        .collect()
}

/// The user message describing one request.
pub fn request_message(
    instruction: &str,
    bindings: &[BindingDescription],
    output_count: usize,
) -> String {
    let mut text = format!(
        "Instruction: {}\n\
         Available locals:\n\
         - g: GraphBuilder\n\
         - RAND: fn() -> int\n\
         - result: dict - Set the 'outputs' key to a list of outputs to return. Ensure that it is a list and not a single value.\n",
        instruction
    );
    for binding in bindings {
        let ty = &binding.type_label;
        let _ = match &binding.output_name {
            Some(output) => writeln!(
                text,
                "- {}: {} - Comes from output named '{}'. Pass directly to sockets of type {} as {}",
                binding.name, ty, output, ty, output
            ),
            None => writeln!(
                text,
                "- {}: {} - Pass directly to sockets of type {}",
                binding.name, ty, ty
            ),
        };
    }
    let _ = write!(
        text,
        "Return exactly {} output(s) in result['outputs'].",
        output_count
    );
    text
}

/// Builds the opening conversation for a request.
pub fn conversation(
    catalog: &dyn Catalog,
    examples: &[Example],
    request: String,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(3 + examples.len() * 2);
    messages.push(ChatMessage::system(SYSTEM_INSTRUCTIONS));
    messages.push(ChatMessage::system(format!(
        "{}{}",
        CATALOG_PREAMBLE,
        node_summaries(catalog)
    )));
    for example in examples {
        messages.push(ChatMessage::user(example.instruction.as_str()));
        messages.push(ChatMessage::assistant(example.program.as_str()));
    }
    messages.push(ChatMessage::user(request));
    messages
}

pub fn policy_feedback(violations: &[PolicyViolation]) -> String {
    let mut text = String::from(
        "You must not use any Python flow control (for or while loops, if statements, \
         conditional expressions, comprehensions). All of that work must be done by the node graph. \
         Remove the following and try again:",
    );
    for violation in violations {
        let _ = write!(text, "\n- {}", violation);
    }
    text
}

pub fn execution_feedback(fault: &ExecutionFault) -> String {
    format!(
        "Your code failed with the following error. Please fix that error and try again. \
         Do not apologize, just respond with the updated code. Error: {}",
        fault
    )
}

pub fn validation_feedback(errors: &[GraphError]) -> String {
    let mut text = String::from(
        "Your code failed to generate a valid graph. Please fix the following errors and try again. \
         Do not apologize, just respond with the updated code. Errors:",
    );
    for error in errors {
        let _ = write!(text, "\n- {}", error);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use abracadabra_check::ControlFlow;
    use abracadabra_core::catalog::{CatalogConfig, CatalogEntry, NodeCatalog};
    use abracadabra_core::graph::{Graph, SocketRef};
    use crate::llm_provider::Role;

    fn catalog() -> NodeCatalog {
        NodeCatalog::new(
            vec![
                CatalogEntry::new("Loader")
                    .description("Loads things.")
                    .required("name", "STRING")
                    .outputs(["MODEL", "CLIP"]),
                CatalogEntry::new("Segment")
                    .required("image", "IMAGE")
                    .outputs(["IMAGE", "IMAGE"])
                    .output_names(["thresholded_mask", "raw_mask"]),
            ],
            &CatalogConfig::all_nodes(),
        )
        .unwrap()
    }

    fn outer() -> Graph {
        Graph::from_prompt_str(
            r#"{"1": {"class_type": "Loader", "inputs": {"name": "x"}},
                "2": {"class_type": "Segment", "inputs": {"image": ["9", 0]}},
                "3": {"class_type": "Mystery", "inputs": {}}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_describe_bindings() {
        let mut inputs = IndexMap::new();
        inputs.insert("model".to_string(), InputValue::Link(SocketRef::new("1", 0)));
        inputs.insert("mask".to_string(), InputValue::Link(SocketRef::new("2", 1)));
        inputs.insert("odd".to_string(), InputValue::Link(SocketRef::new("3", 0)));
        inputs.insert("past_end".to_string(), InputValue::Link(SocketRef::new("1", 7)));
        inputs.insert("steps".to_string(), InputValue::from(20i64));
        inputs.insert("text".to_string(), InputValue::from("hello"));

        let labels: Vec<(String, Option<String>)> = describe_bindings(&inputs, &catalog(), &outer())
            .into_iter()
            .map(|b| (b.type_label, b.output_name))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("MODEL".to_string(), None),
                ("IMAGE".to_string(), Some("raw_mask".to_string())),
                ("*".to_string(), None),
                ("*".to_string(), None),
                ("INTEGER".to_string(), None),
                ("STRING".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_request_message_format() {
        let bindings = vec![
            BindingDescription {
                name: "input1".into(),
                type_label: "IMAGE".into(),
                output_name: Some("raw_mask".into()),
            },
            BindingDescription {
                name: "input2".into(),
                type_label: "INTEGER".into(),
                output_name: None,
            },
        ];
        let text = request_message("Fix the faces", &bindings, 2);
        let expected = "\
Instruction: Fix the faces
Available locals:
- g: GraphBuilder
- RAND: fn() -> int
- result: dict - Set the 'outputs' key to a list of outputs to return. Ensure that it is a list and not a single value.
- input1: IMAGE - Comes from output named 'raw_mask'. Pass directly to sockets of type IMAGE as raw_mask
- input2: INTEGER - Pass directly to sockets of type INTEGER
Return exactly 2 output(s) in result['outputs'].";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_conversation_order() {
        let examples = vec![Example::parse("a.py", "# Instruction: A\nx = 1\n")];
        let messages = conversation(&catalog(), &examples, "Instruction: B".to_string());
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User
            ]
        );
        assert!(messages[1].content.contains("Node: 'Segment'"));
        assert_eq!(messages[2].content, "Instruction: A");
        assert_eq!(messages[3].content, "x = 1\n");
        assert_eq!(messages[4].content, "Instruction: B");
    }

    #[test]
    fn test_feedback_lists_every_finding() {
        let text = policy_feedback(&[
            PolicyViolation {
                line: 2,
                construct: ControlFlow::ForLoop,
            },
            PolicyViolation {
                line: 5,
                construct: ControlFlow::ConditionalExpression,
            },
        ]);
        assert!(text.ends_with("\n- line 2: for loop\n- line 5: conditional expression"));

        let text = validation_feedback(&[GraphError::OutputCountMismatch {
            expected: 1,
            actual: 2,
        }]);
        assert_eq!(text.lines().count(), 2);

        let text = execution_feedback(&ExecutionFault::MissingOutputs);
        assert!(text.contains("Error: "));
    }
}
