//! Application state shared across all request handlers.

use std::sync::Arc;

use tokio::sync::Mutex;

use confab_ai::OllamaClient;
use confab_chat::{ChatStore, Responder};

use crate::config::Config;

/// Shared application state.
///
/// One store serves one local browser session. The page submits one
/// question at a time and waits for the reply before submitting again;
/// the mutex keeps the process sound even if that precondition is broken,
/// with submissions then serializing on the lock.
pub struct AppState {
    /// Conversation threads for this session
    pub store: Mutex<ChatStore>,
    /// Drives one request/response cycle per submission
    pub responder: Responder,
    /// Backend client, also used directly for model listing
    pub ollama: Arc<OllamaClient>,
}

impl AppState {
    /// Create application state from the resolved configuration.
    pub fn new(config: &Config) -> Arc<Self> {
        let ollama = Arc::new(OllamaClient::new(&config.ollama_url));
        let responder = Responder::new(ollama.clone(), config.model.clone());

        Arc::new(Self {
            store: Mutex::new(ChatStore::new()),
            responder,
            ollama,
        })
    }
}
