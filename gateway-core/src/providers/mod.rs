//! Provider adapters
//!
//! This module implements the adapter contract and the concrete adapters
//! that translate the gateway's operation set onto each provider's API.

pub mod adapter;
pub mod anthropic;
pub mod error;
pub mod huggingface;
pub mod openai;
pub mod prompts;

pub use adapter::{dispatch, ProviderAdapter, UsageTracker};
pub use error::{AdapterError, AdapterResult};

// Re-export concrete adapters
pub use anthropic::AnthropicAdapter;
pub use huggingface::HuggingFaceAdapter;
pub use openai::OpenAiAdapter;
