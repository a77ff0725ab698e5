//! Core error types for abracadabra-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! catalog construction and prompt-graph loading.

use thiserror::Error;

/// Core errors produced by the abracadabra-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two catalog entries share a type name.
    #[error("duplicate node type: '{name}'")]
    DuplicateNodeType { name: String },

    /// An input name appears in both the required and optional sets.
    #[error("node type '{type_name}' declares input '{input}' as both required and optional")]
    OverlappingInputs { type_name: String, input: String },

    /// Catalog JSON could not be decoded.
    #[error("invalid catalog data: {0}")]
    CatalogParse(#[from] serde_json::Error),

    /// Catalog file could not be read.
    #[error("failed to read catalog '{path}': {source}")]
    CatalogIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A prompt-graph document did not have the expected shape.
    #[error("invalid prompt graph: {reason}")]
    InvalidPromptGraph { reason: String },
}
