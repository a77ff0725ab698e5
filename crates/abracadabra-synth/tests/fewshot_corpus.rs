//! The shipped few-shot programs must themselves pass every check, and
//! corpus directories load in file-name order.

use abracadabra_check::{
    check_straight_line, parse, validate_declared_outputs, validate_graph, Bindings, Sandbox,
    ScriptSandbox,
};
use abracadabra_core::catalog::{CatalogConfig, NodeCatalog};
use abracadabra_core::graph::{Graph, InputValue, SocketRef};
use abracadabra_synth::{builtin_examples, load_examples, SynthError};
use indexmap::IndexMap;

/// Outer sockets standing in for each input type the corpus declares.
const OUTER: &str = r#"{
    "1": {"class_type": "LoadImage", "inputs": {"image": "in.png"}},
    "2": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "v1-5-pruned-emaonly.safetensors"}}
}"#;

/// Binds every `- inputN: TYPE` line of an example header to an outer socket
/// of that type.
fn bindings_for(instruction: &str) -> Bindings {
    let mut inputs = IndexMap::new();
    for line in instruction.lines() {
        let Some((name, rest)) = line
            .strip_prefix("- ")
            .and_then(|l| l.split_once(": "))
            .filter(|(name, _)| name.starts_with("input"))
        else {
            continue;
        };
        let socket = match rest.split(' ').next() {
            Some("IMAGE") => SocketRef::new("1", 0),
            Some("MODEL") => SocketRef::new("2", 0),
            Some("CLIP") => SocketRef::new("2", 1),
            Some("VAE") => SocketRef::new("2", 2),
            other => panic!("no outer socket for {:?}", other),
        };
        inputs.insert(name.to_string(), InputValue::Link(socket));
    }
    Bindings {
        node_prefix: "100.".into(),
        seed: 3,
        inputs,
    }
}

#[test]
fn builtin_examples_validate_against_builtin_catalog() {
    let catalog = NodeCatalog::builtin(&CatalogConfig::default()).unwrap();
    let outer = Graph::from_prompt_str(OUTER).unwrap();

    for example in builtin_examples() {
        let bindings = bindings_for(&example.instruction);
        let program = parse(&example.program).unwrap();
        assert!(check_straight_line(&program).is_empty(), "{}", example.name);

        let execution = ScriptSandbox::default()
            .execute(&example.program, &bindings)
            .unwrap_or_else(|err| panic!("{}: {}", example.name, err));
        let graph = execution.builder.finalize();
        assert_eq!(
            validate_graph(&graph, &catalog, &outer),
            vec![],
            "{}",
            example.name
        );
        assert_eq!(
            validate_declared_outputs(
                &graph,
                &catalog,
                &outer,
                &execution.outputs,
                execution.outputs.len()
            ),
            vec![],
            "{}",
            example.name
        );
    }
}

#[test]
fn multi_input_example_binds_each_declared_type() {
    let example = builtin_examples()
        .into_iter()
        .find(|e| e.name == "make_cat2.py")
        .unwrap();
    let bindings = bindings_for(&example.instruction);
    let names: Vec<&str> = bindings.inputs.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["input1", "input2", "input3"]);

    let execution = ScriptSandbox::default()
        .execute(&example.program, &bindings)
        .unwrap();
    let graph = execution.builder.finalize();
    let sampler = graph
        .nodes()
        .find(|n| n.type_name == "KSampler")
        .unwrap();
    assert_eq!(
        sampler.inputs["model"],
        InputValue::Link(SocketRef::new("2", 0))
    );
}

#[test]
fn load_examples_reads_files_in_name_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        temp_dir.path().join("b_second.py"),
        "# Instruction: second\nx = 2\n",
    )
    .unwrap();
    std::fs::write(
        temp_dir.path().join("a_first.py"),
        "# Instruction: first\n# - input1: IMAGE\nx = 1\n",
    )
    .unwrap();
    std::fs::create_dir(temp_dir.path().join("nested")).unwrap();

    let examples = load_examples(temp_dir.path()).unwrap();
    let names: Vec<&str> = examples.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a_first.py", "b_second.py"]);
    assert_eq!(examples[0].instruction, "Instruction: first\n- input1: IMAGE");
    assert_eq!(examples[0].program, "x = 1\n");
}

#[test]
fn missing_corpus_directory_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = load_examples(temp_dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, SynthError::Examples { .. }));
}
