//! Instruction-to-graph synthesis.
//!
//! Wires a generative collaborator to the checks in `abracadabra-check`:
//! the collaborator proposes a program, the loop polices, runs and validates
//! it, and feeds findings back until a candidate passes or the attempt
//! budget is spent.

pub mod config;
pub mod error;
pub mod fewshot;
pub mod llm_provider;
pub mod prompt;
pub mod synthesis;

pub use config::{LlmConfig, Provider, SynthConfig};
pub use error::{ProviderError, SynthError};
pub use fewshot::{builtin_examples, load_examples, Example};
pub use llm_provider::{extract_code, ChatMessage, Collaborator, OpenAiCompatibleClient, Role};
pub use synthesis::{Rejection, SynthesisRequest, Synthesized, Synthesizer};
