//! confab-ai: streaming chat client for Ollama-compatible model servers
//!
//! This crate speaks the backend's chat API: it sends a role-tagged message
//! list and exposes the reply as a stream of incremental text fragments.

pub mod error;
pub mod ollama;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use ollama::{ModelInfo, OllamaClient};
pub use stream::{ChunkEvent, ChunkStream};
pub use types::*;
