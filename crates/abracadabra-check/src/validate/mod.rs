//! Structural type checker for candidate graphs.
//!
//! Provides two passes:
//! - [`validate_graph`]: scans every node of a candidate graph and reports ALL
//!   catalog and link errors at once.
//! - [`validate_declared_outputs`]: checks the ordered output list a candidate
//!   declared against the requested arity and the graphs it points into.
//!
//! Both functions are pure -- they read the graphs and the catalog but never
//! modify them, so repeated calls on unchanged inputs return identical lists.

pub mod diagnostics;

pub use diagnostics::GraphError;

use abracadabra_core::catalog::{Catalog, CatalogEntry};
use abracadabra_core::graph::{Graph, InputValue, NodeInstance, OuterGraph, SocketRef};
use abracadabra_core::id::NodeId;

/// Validates every node of `candidate`, resolving links against the
/// candidate first and then `outer`.
///
/// Returns an empty list when the graph is valid. Findings are ordered by node
/// (candidate iteration order), then by binding order within the node, with
/// missing required inputs last.
pub fn validate_graph(
    candidate: &Graph,
    catalog: &dyn Catalog,
    outer: &dyn OuterGraph,
) -> Vec<GraphError> {
    let mut errors = Vec::new();
    for node in candidate.nodes() {
        check_node(node, candidate, catalog, outer, &mut errors);
    }
    errors
}

fn check_node(
    node: &NodeInstance,
    candidate: &Graph,
    catalog: &dyn Catalog,
    outer: &dyn OuterGraph,
    errors: &mut Vec<GraphError>,
) {
    let entry = match catalog
        .describe(&node.type_name)
        .filter(|_| catalog.is_available(&node.type_name))
    {
        Some(entry) => entry,
        None => {
            // Without a descriptor there is nothing to check the inputs against.
            errors.push(GraphError::UnknownNodeType {
                node: node.id.clone(),
                node_type: node.type_name.clone(),
            });
            return;
        }
    };

    for (input, value) in &node.inputs {
        let expected = entry.input_type(input);
        if expected.is_none() {
            errors.push(GraphError::UnknownInput {
                node: node.id.clone(),
                node_type: node.type_name.clone(),
                input: input.clone(),
            });
        }

        let link = match value {
            InputValue::Link(link) => link,
            InputValue::Literal(_) => continue,
        };

        let (producer_type, producer) =
            match resolve_producer(&link.node, candidate, catalog, outer) {
                Resolved::Missing => {
                    errors.push(GraphError::UnresolvedLink {
                        node: node.id.clone(),
                        node_type: node.type_name.clone(),
                        input: input.clone(),
                        producer: link.node.clone(),
                    });
                    continue;
                }
                // The producer's own UnknownNodeType already covers it.
                Resolved::UnknownCandidate => continue,
                Resolved::Undescribed(producer_type) => {
                    errors.push(GraphError::UnknownProducerType {
                        node: node.id.clone(),
                        node_type: node.type_name.clone(),
                        input: input.clone(),
                        producer: link.node.clone(),
                        producer_type,
                    });
                    continue;
                }
                Resolved::Found(producer_type, producer) => (producer_type, producer),
            };

        let actual = match producer.output_types.get(link.output) {
            Some(actual) => actual,
            None => {
                errors.push(GraphError::OutputIndexOutOfRange {
                    node: node.id.clone(),
                    node_type: node.type_name.clone(),
                    input: input.clone(),
                    producer_type,
                    index: link.output,
                    available: producer.output_types.len(),
                });
                continue;
            }
        };

        // An unknown input was already reported; there is no declared type to
        // compare against.
        if let Some(expected) = expected {
            if !expected.accepts(actual) {
                errors.push(GraphError::TypeMismatch {
                    node: node.id.clone(),
                    node_type: node.type_name.clone(),
                    input: input.clone(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                    producer_type,
                });
            }
        }
    }

    for required in entry.required_inputs.keys() {
        if !node.inputs.contains_key(required) {
            errors.push(GraphError::MissingRequiredInput {
                node: node.id.clone(),
                node_type: node.type_name.clone(),
                input: required.clone(),
            });
        }
    }
}

/// Checks the declared output list: its length must equal `expected`, and
/// every entry must point at an existing output of a resolvable node.
pub fn validate_declared_outputs(
    candidate: &Graph,
    catalog: &dyn Catalog,
    outer: &dyn OuterGraph,
    outputs: &[SocketRef],
    expected: usize,
) -> Vec<GraphError> {
    let mut errors = Vec::new();

    if outputs.len() != expected {
        errors.push(GraphError::OutputCountMismatch {
            expected,
            actual: outputs.len(),
        });
    }

    for (position, output) in outputs.iter().enumerate() {
        match resolve_producer(&output.node, candidate, catalog, outer) {
            Resolved::Missing => errors.push(GraphError::UnresolvedOutput {
                position,
                producer: output.node.clone(),
            }),
            // The producing node's own findings already cover an unknown type.
            Resolved::UnknownCandidate | Resolved::Undescribed(_) => {}
            Resolved::Found(producer_type, producer) => {
                if output.output >= producer.output_types.len() {
                    errors.push(GraphError::DeclaredOutputOutOfRange {
                        position,
                        producer_type,
                        index: output.output,
                        available: producer.output_types.len(),
                    });
                }
            }
        }
    }

    errors
}

enum Resolved<'a> {
    Missing,
    /// A candidate node whose type has no descriptor.
    UnknownCandidate,
    /// An outer node whose type has no descriptor.
    Undescribed(String),
    Found(String, &'a CatalogEntry),
}

/// Looks a producer up in the candidate graph, then the outer graph.
///
/// Uses `describe`, not `is_available`: outer-graph nodes may be of types a
/// candidate is not allowed to place.
fn resolve_producer<'a>(
    id: &NodeId,
    candidate: &Graph,
    catalog: &'a dyn Catalog,
    outer: &dyn OuterGraph,
) -> Resolved<'a> {
    let (type_name, in_candidate) = match candidate.get(id) {
        Some(node) => (node.type_name.as_str(), true),
        None => match outer.lookup(id) {
            Some(type_name) => (type_name, false),
            None => return Resolved::Missing,
        },
    };
    match catalog.describe(type_name) {
        Some(entry) => Resolved::Found(type_name.to_string(), entry),
        None if in_candidate => Resolved::UnknownCandidate,
        None => Resolved::Undescribed(type_name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abracadabra_core::builder::GraphBuilder;
    use abracadabra_core::catalog::{CatalogConfig, NodeCatalog};
    use abracadabra_core::graph::{InputValue, Literal};
    use abracadabra_core::types::SocketType;

    fn catalog() -> NodeCatalog {
        let entries = vec![
            CatalogEntry::new("A").outputs(["MASK"]),
            CatalogEntry::new("B")
                .required("img", "IMAGE")
                .outputs(["IMAGE"]),
            CatalogEntry::new("W").required("img", "*").outputs(["*"]),
            CatalogEntry::new("Sampler")
                .required("sampler_name", SocketType::one_of(["euler", "ddim"]))
                .optional("steps", "INT")
                .outputs(["LATENT"]),
            CatalogEntry::new("Hidden").outputs(["IMAGE"]),
        ];
        NodeCatalog::new(
            entries,
            &CatalogConfig::allowlist(["A", "B", "W", "Sampler"]),
        )
        .unwrap()
    }

    fn no_outer() -> Graph {
        Graph::new()
    }

    #[test]
    fn test_type_mismatch_names_expected_and_actual() {
        let mut g = GraphBuilder::new();
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        g.node("B", [("img", InputValue::Link(a.out(0)))]);

        let errors = validate_graph(&g.finalize(), &catalog(), &no_outer());
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            GraphError::TypeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, &SocketType::named("IMAGE"));
                assert_eq!(actual, &SocketType::named("MASK"));
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_input() {
        let mut g = GraphBuilder::new();
        g.node("B", Vec::<(String, InputValue)>::new());

        let errors = validate_graph(&g.finalize(), &catalog(), &no_outer());
        assert_eq!(
            errors,
            vec![GraphError::MissingRequiredInput {
                node: NodeId::from("1"),
                node_type: "B".into(),
                input: "img".into(),
            }]
        );
    }

    #[test]
    fn test_output_index_out_of_range() {
        let mut g = GraphBuilder::new();
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        g.node("W", [("img", InputValue::Link(a.out(5)))]);

        let errors = validate_graph(&g.finalize(), &catalog(), &no_outer());
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            GraphError::OutputIndexOutOfRange {
                index: 5,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_wildcard_input_accepts_any_producer() {
        let mut g = GraphBuilder::new();
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        let w = g.node("W", [("img", InputValue::Link(a.out(0)))]);
        // Wildcard output feeding a concrete input.
        g.node("B", [("img", InputValue::Link(w.out(0)))]);

        assert!(validate_graph(&g.finalize(), &catalog(), &no_outer()).is_empty());
    }

    #[test]
    fn test_errors_accumulate_across_nodes() {
        let mut g = GraphBuilder::new();
        g.node("B", Vec::<(String, InputValue)>::new());
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        g.node("B", [("img", InputValue::Link(a.out(0)))]);

        let errors = validate_graph(&g.finalize(), &catalog(), &no_outer());
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], GraphError::MissingRequiredInput { .. }));
        assert!(matches!(errors[1], GraphError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_type_skips_input_checks() {
        let mut g = GraphBuilder::new();
        g.node(
            "Nope",
            [("x", InputValue::Link(SocketRef::new("missing", 0)))],
        );
        g.node("Hidden", Vec::<(String, InputValue)>::new());

        let errors = validate_graph(&g.finalize(), &catalog(), &no_outer());
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, GraphError::UnknownNodeType { .. })));
    }

    #[test]
    fn test_unknown_candidate_producer_is_reported_once() {
        let mut g = GraphBuilder::new();
        let nope = g.node("Nope", Vec::<(String, InputValue)>::new());
        g.node("B", [("img", InputValue::Link(nope.out(0)))]);

        let errors = validate_graph(&g.finalize(), &catalog(), &no_outer());
        assert_eq!(
            errors,
            vec![GraphError::UnknownNodeType {
                node: NodeId::from("1"),
                node_type: "Nope".into(),
            }]
        );
    }

    #[test]
    fn test_unknown_input_is_reported_and_link_still_resolved() {
        let mut g = GraphBuilder::new();
        g.node(
            "B",
            [
                ("img", InputValue::Link(SocketRef::new("ghost", 0))),
                ("strength", InputValue::from(1i64)),
            ],
        );

        let errors = validate_graph(&g.finalize(), &catalog(), &no_outer());
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], GraphError::UnresolvedLink { .. }));
        assert!(matches!(
            &errors[1],
            GraphError::UnknownInput { input, .. } if input == "strength"
        ));
    }

    #[test]
    fn test_one_of_input_rejects_links_accepts_literals() {
        let mut g = GraphBuilder::new();
        g.node("Sampler", [("sampler_name", InputValue::from("euler"))]);
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        g.node("Sampler", [("sampler_name", InputValue::Link(a.out(0)))]);

        let errors = validate_graph(&g.finalize(), &catalog(), &no_outer());
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            GraphError::TypeMismatch { node, .. } if node.as_str() == "3"
        ));
    }

    #[test]
    fn test_links_resolve_into_outer_graph() {
        let outer = Graph::from_prompt_str(
            r#"{"7": {"class_type": "Hidden", "inputs": {}},
                "8": {"class_type": "Mystery", "inputs": {}}}"#,
        )
        .unwrap();

        let mut g = GraphBuilder::with_prefix("c.");
        g.node("B", [("img", InputValue::Link(SocketRef::new("7", 0)))]);
        g.node("B", [("img", InputValue::Link(SocketRef::new("8", 0)))]);

        let errors = validate_graph(&g.finalize(), &catalog(), &outer);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            GraphError::UnknownProducerType { producer_type, .. } if producer_type == "Mystery"
        ));
    }

    #[test]
    fn test_literal_values_are_not_type_checked() {
        let mut g = GraphBuilder::new();
        g.node("B", [("img", InputValue::Literal(Literal::Null))]);
        assert!(validate_graph(&g.finalize(), &catalog(), &no_outer()).is_empty());
    }

    #[test]
    fn test_declared_outputs_arity_and_bounds() {
        let mut g = GraphBuilder::new();
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        let graph = g.finalize();
        let cat = catalog();

        assert!(validate_declared_outputs(&graph, &cat, &no_outer(), &[a.out(0)], 1).is_empty());

        let errors = validate_declared_outputs(
            &graph,
            &cat,
            &no_outer(),
            &[a.out(3), SocketRef::new("zz", 0)],
            1,
        );
        assert_eq!(
            errors,
            vec![
                GraphError::OutputCountMismatch {
                    expected: 1,
                    actual: 2
                },
                GraphError::DeclaredOutputOutOfRange {
                    position: 0,
                    producer_type: "A".into(),
                    index: 3,
                    available: 1,
                },
                GraphError::UnresolvedOutput {
                    position: 1,
                    producer: NodeId::from("zz"),
                },
            ]
        );
    }
}
