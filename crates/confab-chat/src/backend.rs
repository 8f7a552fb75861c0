//! Backend abstraction between the responder and the model client layer

use async_trait::async_trait;
use confab_ai::{ChatMessage, ChunkStream, OllamaClient};

/// A model backend that can stream a chat reply.
///
/// The responder only needs this seam; tests script it, production wires
/// in [`OllamaClient`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Stream a reply for the given role-tagged message list
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> confab_ai::Result<ChunkStream>;
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> confab_ai::Result<ChunkStream> {
        OllamaClient::chat_stream(self, model, messages).await
    }
}
