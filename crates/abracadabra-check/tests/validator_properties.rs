//! Property tests for the graph validator.

use abracadabra_check::{validate_graph, GraphError};
use abracadabra_core::builder::{GraphBuilder, NodeHandle};
use abracadabra_core::catalog::{Catalog, CatalogConfig, CatalogEntry, NodeCatalog};
use abracadabra_core::graph::{Graph, InputValue, SocketRef};
use abracadabra_core::types::SocketType;
use proptest::prelude::*;
use proptest::sample::Index;

const PLACEABLE: &[&str] = &["Encode", "Blur", "ToMask", "Composite", "Passthrough", "Preview"];

fn catalog() -> NodeCatalog {
    let entries = vec![
        CatalogEntry::new("LoadImage").outputs(["IMAGE", "MASK"]),
        CatalogEntry::new("Loader").outputs(["MODEL", "CLIP", "VAE"]),
        CatalogEntry::new("Encode")
            .required("clip", "CLIP")
            .required("text", "STRING")
            .outputs(["CONDITIONING"]),
        CatalogEntry::new("Blur")
            .required("image", "IMAGE")
            .optional("radius", "INT")
            .outputs(["IMAGE"]),
        CatalogEntry::new("ToMask")
            .required("image", "IMAGE")
            .outputs(["MASK"]),
        CatalogEntry::new("Composite")
            .required("image", "IMAGE")
            .required("mask", "MASK")
            .outputs(["IMAGE"]),
        CatalogEntry::new("Passthrough")
            .required("value", "*")
            .outputs(["*"]),
        CatalogEntry::new("Preview").required("images", "IMAGE"),
    ];
    NodeCatalog::new(entries, &CatalogConfig::all_nodes()).unwrap()
}

/// Builds a graph where every required input is bound to a compatible
/// output of an earlier node, or to a literal for scalar inputs.
fn valid_graph(catalog: &NodeCatalog, plan: &[(Index, Vec<Index>)]) -> Graph {
    let mut g = GraphBuilder::with_prefix("p.");
    let mut produced: Vec<(SocketRef, SocketType)> = Vec::new();

    place(catalog, &mut g, &mut produced, "LoadImage", Vec::new());
    place(catalog, &mut g, &mut produced, "Loader", Vec::new());

    for (type_pick, input_picks) in plan {
        let type_name = PLACEABLE[type_pick.index(PLACEABLE.len())];
        let entry = catalog.describe(type_name).unwrap().clone();
        let mut inputs = Vec::new();
        for (slot, (name, expected)) in entry.required_inputs.iter().enumerate() {
            let value = match expected {
                SocketType::Named(ty) if ty == "STRING" => InputValue::from("text"),
                SocketType::Named(ty) if ty == "INT" => InputValue::from(4i64),
                _ => {
                    let candidates: Vec<&SocketRef> = produced
                        .iter()
                        .filter(|(_, actual)| expected.accepts(actual))
                        .map(|(socket, _)| socket)
                        .collect();
                    let pick = input_picks
                        .get(slot)
                        .map_or(0, |p| p.index(candidates.len()));
                    InputValue::Link(candidates[pick].clone())
                }
            };
            inputs.push((name.clone(), value));
        }
        place(catalog, &mut g, &mut produced, type_name, inputs);
    }

    g.finalize()
}

fn place(
    catalog: &NodeCatalog,
    g: &mut GraphBuilder,
    produced: &mut Vec<(SocketRef, SocketType)>,
    type_name: &str,
    inputs: Vec<(String, InputValue)>,
) -> NodeHandle {
    let handle = g.node(type_name, inputs);
    let entry = catalog.describe(type_name).unwrap();
    for (i, ty) in entry.output_types.iter().enumerate() {
        produced.push((handle.out(i), ty.clone()));
    }
    handle
}

fn arbitrary_graph(specs: &[(usize, usize, u8, usize)]) -> Graph {
    let names = ["Blur", "ToMask", "Composite", "Nope", "Passthrough", "LoadImage"];
    let inputs = ["image", "mask", "value", "radius", "bogus"];
    let mut g = GraphBuilder::new();
    for &(ty, input, producer, output) in specs {
        let link = SocketRef::new(producer.to_string(), output);
        g.node(
            names[ty % names.len()],
            [(inputs[input % inputs.len()], InputValue::Link(link))],
        );
    }
    g.finalize()
}

proptest! {
    #[test]
    fn well_formed_graphs_have_no_errors(
        plan in prop::collection::vec(
            (any::<Index>(), prop::collection::vec(any::<Index>(), 2)),
            0..24,
        )
    ) {
        let catalog = catalog();
        let graph = valid_graph(&catalog, &plan);
        let errors = validate_graph(&graph, &catalog, &Graph::new());
        prop_assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn validation_is_idempotent(
        specs in prop::collection::vec((0usize..6, 0usize..5, 0u8..12, 0usize..4), 0..16)
    ) {
        let catalog = catalog();
        let graph = arbitrary_graph(&specs);
        let first = validate_graph(&graph, &catalog, &Graph::new());
        let second = validate_graph(&graph, &catalog, &Graph::new());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_unbound_required_input_is_reported(count in 1usize..12) {
        let catalog = catalog();
        let mut g = GraphBuilder::new();
        for _ in 0..count {
            g.node("Composite", Vec::<(String, InputValue)>::new());
        }
        let errors = validate_graph(&g.finalize(), &catalog, &Graph::new());
        prop_assert_eq!(errors.len(), count * 2);
        let all_missing_required = errors
            .iter()
            .all(|e| matches!(e, GraphError::MissingRequiredInput { .. }));
        prop_assert!(all_missing_required);
    }
}
