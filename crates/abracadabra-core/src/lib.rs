pub mod builder;
pub mod catalog;
pub mod error;
pub mod graph;
pub mod id;
pub mod summary;
pub mod types;

// Re-export commonly used types
pub use builder::{GraphBuilder, NodeHandle};
pub use catalog::{Catalog, CatalogConfig, CatalogEntry, NodeCatalog};
pub use error::CoreError;
pub use graph::{Graph, InputValue, Literal, NodeInstance, OuterGraph, SocketRef};
pub use id::NodeId;
pub use summary::node_summaries;
pub use types::SocketType;
