//! Node catalog: the set of node types a graph may use, with their
//! input/output signatures.
//!
//! [`Catalog`] is the seam the validator, summary formatter and prompt
//! assembler depend on. [`NodeCatalog`] is the concrete implementation,
//! loaded from JSON and filtered by a [`CatalogConfig`] fixed at construction
//! time.
//!
//! Two sets are distinguished:
//! - the *registered* set: every type with a descriptor. [`Catalog::describe`]
//!   answers for all of them, so links into outer-graph nodes of any known
//!   type can be checked.
//! - the *visible* set: the types a candidate may place.
//!   [`Catalog::list_types`] and [`Catalog::is_available`] answer for these.

use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::SocketType;

/// Signature of one node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "name")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "required", default)]
    pub required_inputs: IndexMap<String, SocketType>,
    #[serde(rename = "optional", default)]
    pub optional_inputs: IndexMap<String, SocketType>,
    #[serde(rename = "outputs", default)]
    pub output_types: Vec<SocketType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_names: Option<Vec<String>>,
}

impl CatalogEntry {
    pub fn new(type_name: impl Into<String>) -> Self {
        CatalogEntry {
            type_name: type_name.into(),
            description: None,
            required_inputs: IndexMap::new(),
            optional_inputs: IndexMap::new(),
            output_types: Vec::new(),
            output_names: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn required(mut self, name: impl Into<String>, ty: impl Into<SocketType>) -> Self {
        self.required_inputs.insert(name.into(), ty.into());
        self
    }

    pub fn optional(mut self, name: impl Into<String>, ty: impl Into<SocketType>) -> Self {
        self.optional_inputs.insert(name.into(), ty.into());
        self
    }

    pub fn outputs<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SocketType>,
    {
        self.output_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn output_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Declared type of an input, required or optional.
    pub fn input_type(&self, name: &str) -> Option<&SocketType> {
        self.required_inputs
            .get(name)
            .or_else(|| self.optional_inputs.get(name))
    }

    pub fn output_name(&self, index: usize) -> Option<&str> {
        self.output_names
            .as_ref()
            .and_then(|names| names.get(index))
            .map(String::as_str)
    }

    fn check_disjoint(&self) -> Result<(), CoreError> {
        match self
            .required_inputs
            .keys()
            .find(|name| self.optional_inputs.contains_key(*name))
        {
            Some(name) => Err(CoreError::OverlappingInputs {
                type_name: self.type_name.clone(),
                input: name.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Read-only access to node type descriptors.
pub trait Catalog {
    /// Names of the node types a candidate may place, in a stable order.
    fn list_types(&self) -> Vec<&str>;

    /// Descriptor for any registered type, visible or not.
    fn describe(&self, type_name: &str) -> Option<&CatalogEntry>;

    /// Whether a candidate may place this type.
    fn is_available(&self, type_name: &str) -> bool {
        self.list_types().contains(&type_name)
    }
}

/// Stock nodes plus the mask-editing family exposed by default.
pub const DEFAULT_ALLOWLIST: &[&str] = &[
    "KSampler",
    "CheckpointLoaderSimple",
    "CLIPTextEncode",
    "CLIPSetLastLayer",
    "VAEDecode",
    "VAEEncode",
    "VAEEncodeForInpaint",
    "VAELoader",
    "EmptyLatentImage",
    "LatentUpscale",
    "LatentUpscaleBy",
    "LatentFromBatch",
    "RepeatLatentBatch",
    "SaveImage",
    "PreviewImage",
    "LoadImage",
    "LoadImageMask",
    "ImageScale",
    "ImageScaleBy",
    "ImageInvert",
    "ImageBatch",
    "ImagePadForOutpaint",
    "EmptyImage",
    "ConditioningAverage",
    "ConditioningCombine",
    "ConditioningConcat",
    "ConditioningSetArea",
    "ConditioningSetAreaPercentage",
    "ConditioningSetAreaStrength",
    "ConditioningSetMask",
    "KSamplerAdvanced",
    "SetLatentNoiseMask",
    "LatentComposite",
    "LatentBlend",
    "LatentRotate",
    "LatentFlip",
    "LatentCrop",
    "LoraLoader",
    "CLIPLoader",
    "UNETLoader",
    "DualCLIPLoader",
    "CLIPVisionEncode",
    "StyleModelApply",
    "unCLIPConditioning",
    "ControlNetApply",
    "ControlNetApplyAdvanced",
    "ControlNetLoader",
    "DiffControlNetLoader",
    "StyleModelLoader",
    "CLIPVisionLoader",
    "VAEDecodeTiled",
    "VAEEncodeTiled",
    "unCLIPCheckpointLoader",
    "GLIGENLoader",
    "GLIGENTextBoxApply",
    "InpaintModelConditioning",
    "CheckpointLoader",
    "DiffusersLoader",
    "LoadLatent",
    "SaveLatent",
    "ConditioningZeroOut",
    "ConditioningSetTimestepRange",
    "LoraLoaderModelOnly",
    "Mask By Text",
    "Mask Morphology",
    "Combine Masks",
    "Unary Mask Op",
    "Unary Image Op",
    "Blur",
    "Image To Mask",
    "Mix Images By Mask",
    "Mix Color By Mask",
    "Mask To Region",
    "Cut By Mask",
    "Paste By Mask",
    "Get Image Size",
    "Change Channel Count",
    "Constant Mask",
    "Prune By Mask",
    "Separate Mask Components",
    "Create Rect Mask",
    "Make Image Batch",
    "Create QR Code",
    "Convert Color Space",
    "MasqueradeIncrementer",
];

/// Controls which registered types are visible to candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Expose every registered type, ignoring the allowlist.
    pub enable_all_nodes: bool,
    /// Visible types (in this order) when `enable_all_nodes` is false.
    pub allowlist: Vec<String>,
}

impl CatalogConfig {
    pub fn all_nodes() -> Self {
        CatalogConfig {
            enable_all_nodes: true,
            allowlist: Vec::new(),
        }
    }

    pub fn allowlist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CatalogConfig {
            enable_all_nodes: false,
            allowlist: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::allowlist(DEFAULT_ALLOWLIST.iter().copied())
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    nodes: Vec<CatalogEntry>,
}

static BUILTIN_CATALOG: &str = include_str!("../catalog/builtin.json");

/// Catalog backed by an in-memory descriptor table.
#[derive(Debug, Clone)]
pub struct NodeCatalog {
    entries: IndexMap<String, CatalogEntry>,
    visible: IndexSet<String>,
}

impl NodeCatalog {
    /// Builds a catalog from descriptors.
    ///
    /// Rejects duplicate type names and entries whose required and optional
    /// inputs overlap. Allowlisted names without a descriptor are skipped.
    pub fn new<I>(entries: I, config: &CatalogConfig) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut table = IndexMap::new();
        for entry in entries {
            entry.check_disjoint()?;
            if table.contains_key(&entry.type_name) {
                return Err(CoreError::DuplicateNodeType {
                    name: entry.type_name,
                });
            }
            table.insert(entry.type_name.clone(), entry);
        }

        let visible = if config.enable_all_nodes {
            table.keys().cloned().collect()
        } else {
            config
                .allowlist
                .iter()
                .filter(|name| table.contains_key(*name))
                .cloned()
                .collect()
        };

        Ok(NodeCatalog {
            entries: table,
            visible,
        })
    }

    /// Parses `{ "nodes": [...] }` catalog JSON.
    pub fn from_json_str(text: &str, config: &CatalogConfig) -> Result<Self, CoreError> {
        let file: CatalogFile = serde_json::from_str(text)?;
        Self::new(file.nodes, config)
    }

    pub fn from_path(path: impl AsRef<Path>, config: &CatalogConfig) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::CatalogIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text, config)
    }

    /// The catalog shipped with the crate.
    pub fn builtin(config: &CatalogConfig) -> Result<Self, CoreError> {
        Self::from_json_str(BUILTIN_CATALOG, config)
    }

    /// Number of registered types.
    pub fn registered_count(&self) -> usize {
        self.entries.len()
    }
}

impl Catalog for NodeCatalog {
    fn list_types(&self) -> Vec<&str> {
        self.visible.iter().map(String::as_str).collect()
    }

    fn describe(&self, type_name: &str) -> Option<&CatalogEntry> {
        self.entries.get(type_name)
    }

    fn is_available(&self, type_name: &str) -> bool {
        self.visible.contains(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new("A").outputs(["MASK"]),
            CatalogEntry::new("B").required("img", "IMAGE").outputs(["IMAGE"]),
            CatalogEntry::new("Hidden").outputs(["LATENT"]),
        ]
    }

    #[test]
    fn allowlist_controls_visibility_but_not_description() {
        let catalog = NodeCatalog::new(entries(), &CatalogConfig::allowlist(["B", "A"])).unwrap();
        assert_eq!(catalog.list_types(), vec!["B", "A"]);
        assert!(!catalog.is_available("Hidden"));
        assert!(catalog.describe("Hidden").is_some());
    }

    #[test]
    fn enable_all_nodes_exposes_everything_in_catalog_order() {
        let catalog = NodeCatalog::new(entries(), &CatalogConfig::all_nodes()).unwrap();
        assert_eq!(catalog.list_types(), vec!["A", "B", "Hidden"]);
    }

    #[test]
    fn unregistered_allowlist_names_are_dropped() {
        let catalog =
            NodeCatalog::new(entries(), &CatalogConfig::allowlist(["A", "Missing"])).unwrap();
        assert_eq!(catalog.list_types(), vec!["A"]);
    }

    #[test]
    fn duplicate_type_names_are_rejected() {
        let mut list = entries();
        list.push(CatalogEntry::new("A"));
        let err = NodeCatalog::new(list, &CatalogConfig::all_nodes()).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateNodeType { name } if name == "A"));
    }

    #[test]
    fn overlapping_inputs_are_rejected() {
        let entry = CatalogEntry::new("C")
            .required("x", "INT")
            .optional("x", "INT");
        let err = NodeCatalog::new([entry], &CatalogConfig::all_nodes()).unwrap_err();
        assert!(matches!(err, CoreError::OverlappingInputs { input, .. } if input == "x"));
    }

    #[test]
    fn input_type_checks_required_then_optional() {
        let entry = CatalogEntry::new("C")
            .required("a", "INT")
            .optional("b", "*");
        assert_eq!(entry.input_type("a"), Some(&SocketType::named("INT")));
        assert_eq!(entry.input_type("b"), Some(&SocketType::Any));
        assert_eq!(entry.input_type("c"), None);
    }

    #[test]
    fn json_field_names() {
        let text = r#"{
            "nodes": [
                {
                    "name": "Get Image Size",
                    "required": { "image": "IMAGE" },
                    "outputs": ["INT", "INT"],
                    "output_names": ["width", "height"]
                }
            ]
        }"#;
        let catalog = NodeCatalog::from_json_str(text, &CatalogConfig::all_nodes()).unwrap();
        let entry = catalog.describe("Get Image Size").unwrap();
        assert_eq!(entry.output_types.len(), 2);
        assert_eq!(entry.output_name(1), Some("height"));
        assert_eq!(entry.output_name(2), None);
    }

    #[test]
    fn builtin_catalog_loads_and_default_config_hides_host_nodes() {
        let catalog = NodeCatalog::builtin(&CatalogConfig::default()).unwrap();
        assert!(catalog.is_available("KSampler"));
        assert!(catalog.is_available("Mask By Text"));
        assert!(!catalog.is_available("Abracadabra"));
        assert!(catalog.describe("Abracadabra").is_some());

        let all = NodeCatalog::builtin(&CatalogConfig::all_nodes()).unwrap();
        assert!(all.is_available("Abracadabra"));
        assert_eq!(all.list_types().len(), all.registered_count());
    }
}
