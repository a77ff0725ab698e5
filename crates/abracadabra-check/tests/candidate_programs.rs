//! End-to-end checks: parse, policy, run in the sandbox, validate against the
//! built-in catalog.

use abracadabra_check::{
    check_straight_line, parse, validate_declared_outputs, validate_graph, Bindings, GraphError,
    Sandbox, ScriptSandbox,
};
use abracadabra_core::catalog::{CatalogConfig, NodeCatalog};
use abracadabra_core::graph::{Graph, InputValue, SocketRef};
use indexmap::IndexMap;

const FACE_FIX: &str = r#"
# Find the faces and grow the mask a little so whole faces are covered.
faces = g.node("Mask By Text", image=input1, prompt="face", negative_prompt="", precision=0.3, normalize="no")
grown = g.node("Mask Morphology", image=faces.out(0), op="dilate", distance=8)
parts = g.node("Separate Mask Components", mask=grown.out(0))
regions = g.node("Mask To Region", mask=parts.out(0), padding=64, constraints="keep_ratio",
                 constraint_x=2, constraint_y=2, min_width=0, min_height=0, batch_behavior="match_ratio")
crops = g.node("Cut By Mask", image=input1, mask=regions.out(0), mask_mapping_optional=parts.out(1),
               force_resize_width=512, force_resize_height=512)
crop_masks = g.node("Cut By Mask", image=parts.out(0), mask=regions.out(0), force_resize_width=512, force_resize_height=512)
rgb = g.node("Change Channel Count", image=crops.out(0), kind="RGB")
mask = g.node("Image To Mask", image=crop_masks.out(0), method="intensity")
loader = g.node("CheckpointLoaderSimple", ckpt_name="sd-v1-5-inpainting.ckpt")
latent = g.node("VAEEncodeForInpaint", pixels=rgb.out(0), mask=mask.out(0), vae=loader.out(2), grow_mask_by=6)
pos = g.node("CLIPTextEncode", clip=loader.out(1), text="photo of a smiling person")
neg = g.node("CLIPTextEncode", clip=loader.out(1), text="blurry, low resolution")
sampled = g.node("KSampler", model=loader.out(0), positive=pos.out(0), negative=neg.out(0),
                 latent_image=latent.out(0), seed=RAND(), steps=80, cfg=8.0,
                 sampler_name="euler", scheduler="normal", denoise=0.9,)
decoded = g.node("VAEDecode", samples=sampled.out(0), vae=loader.out(2))
pasted = g.node("Paste By Mask", image_base=input1, image_to_paste=decoded.out(0), mask=regions.out(0),
                mask_mapping_optional=parts.out(1), resize_behavior="resize")
result['outputs'] = [pasted.out(0)]
"#;

fn outer() -> Graph {
    Graph::from_prompt_str(r#"{"10": {"class_type": "LoadImage", "inputs": {"image": "team.png"}}}"#)
        .unwrap()
}

fn bindings() -> Bindings {
    let mut inputs = IndexMap::new();
    inputs.insert("input1".to_string(), InputValue::Link(SocketRef::new("10", 0)));
    Bindings {
        node_prefix: "20.".into(),
        seed: 7,
        inputs,
    }
}

#[test]
fn face_fix_program_validates_against_builtin_catalog() {
    let catalog = NodeCatalog::builtin(&CatalogConfig::default()).unwrap();
    let program = parse(FACE_FIX).unwrap();
    assert!(check_straight_line(&program).is_empty());

    let execution = ScriptSandbox::default()
        .execute(FACE_FIX, &bindings())
        .unwrap();
    let graph = execution.builder.finalize();
    assert_eq!(graph.len(), 15);

    let outer = outer();
    assert_eq!(validate_graph(&graph, &catalog, &outer), vec![]);
    assert_eq!(
        validate_declared_outputs(&graph, &catalog, &outer, &execution.outputs, 1),
        vec![]
    );
    assert_eq!(execution.outputs, vec![SocketRef::new("20.15", 0)]);
}

#[test]
fn mask_fed_into_image_socket_is_reported() {
    let catalog = NodeCatalog::builtin(&CatalogConfig::default()).unwrap();
    let code = r#"
mask = g.node("Image To Mask", image=input1, method="intensity")
cut = g.node("Cut By Mask", image=input1, mask=mask.out(0), force_resize_width=0)
result['outputs'] = [cut.out(0), cut.out(1)]
"#;
    let execution = ScriptSandbox::default().execute(code, &bindings()).unwrap();
    let graph = execution.builder.finalize();
    let outer = outer();

    let errors = validate_graph(&graph, &catalog, &outer);
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert_eq!(
        errors[0].to_string(),
        "The mask input of node of type 'Cut By Mask' is expecting type 'IMAGE' but got type 'MASK' from node of type 'Image To Mask'."
    );
    assert!(matches!(
        &errors[1],
        GraphError::MissingRequiredInput { input, .. } if input == "force_resize_height"
    ));

    let output_errors = validate_declared_outputs(&graph, &catalog, &outer, &execution.outputs, 1);
    assert_eq!(
        output_errors,
        vec![
            GraphError::OutputCountMismatch {
                expected: 1,
                actual: 2
            },
            GraphError::DeclaredOutputOutOfRange {
                position: 1,
                producer_type: "Cut By Mask".into(),
                index: 1,
                available: 1,
            },
        ]
    );
}

#[test]
fn hidden_types_cannot_be_placed_but_resolve_as_producers() {
    let catalog = NodeCatalog::builtin(&CatalogConfig::default()).unwrap();
    let outer = Graph::from_prompt_str(
        r#"{"5": {"class_type": "Abracadabra", "inputs": {"instructions": "x", "seed": 1}}}"#,
    )
    .unwrap();
    let code = r#"
inner = g.node("Abracadabra", instructions="nested", seed=1)
up = g.node("ImageScaleBy", image=upstream, upscale_method="bilinear", scale_by=2.0)
result['outputs'] = [up.out(0)]
"#;
    let mut bindings = bindings();
    bindings
        .inputs
        .insert("upstream".into(), InputValue::Link(SocketRef::new("5", 3)));

    let graph = ScriptSandbox::default()
        .execute(code, &bindings)
        .unwrap()
        .builder
        .finalize();
    let errors = validate_graph(&graph, &catalog, &outer);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(matches!(errors[0], GraphError::UnknownNodeType { .. }));
}
