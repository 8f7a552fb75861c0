//! Streamed-response assembly: one request/response cycle per call.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use confab_ai::{ChatMessage, ChunkEvent};

use crate::{
    backend::ChatBackend,
    error::{Error, Result},
    events::ChatEvent,
    extract::{Attachment, ContentExtractor, TextExtractor},
    store::ChatStore,
};

/// Drives one turn: builds the outgoing prompt, streams the backend's
/// reply, publishes fragments to subscribers, and commits the finished
/// exchange to the active chat.
///
/// Fragments are accumulated append-only in arrival order. The turn is
/// committed only when the stream ends naturally; on a transport error or
/// an abort the partial buffer is discarded and the store is untouched.
pub struct Responder {
    backend: Arc<dyn ChatBackend>,
    extractor: Arc<dyn ContentExtractor>,
    model: String,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl Responder {
    /// Create a responder with the built-in text extractor
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            backend,
            extractor: Arc::new(TextExtractor),
            model: model.into(),
            event_tx,
        }
    }

    /// Replace the attachment extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Subscribe to turn events for incremental rendering
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// The model name sent with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one request/response cycle against the active chat.
    ///
    /// Returns the full response text. Callers must not run two cycles
    /// against the same store concurrently; the surrounding session flow
    /// provides that ordering.
    pub async fn respond(
        &self,
        store: &mut ChatStore,
        text: &str,
        attachment: Option<&Attachment>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let context = attachment.map(|a| match self.extractor.extract(&a.bytes, &a.mime) {
            Ok(extracted) => extracted,
            Err(e) => {
                // The turn proceeds with the error text as context; the
                // warning lets the page tell the user the file was skipped.
                tracing::warn!(mime = %a.mime, "attachment extraction failed: {e}");
                let _ = self.event_tx.send(ChatEvent::Warning {
                    message: format!("Attachment could not be read: {e}"),
                });
                e.to_string()
            }
        });

        let prompt = match context {
            Some(ctx) => format!("Context from uploaded file:\n{ctx}\n\nQuestion: {text}"),
            None => text.to_string(),
        };

        let mut outgoing = store.active_messages().to_vec();
        outgoing.push(ChatMessage::user(prompt.clone()));

        let mut stream = match self.backend.chat_stream(&self.model, &outgoing).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = self.event_tx.send(ChatEvent::Error {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let _ = self.event_tx.send(ChatEvent::TurnStart {
            chat: store.active_name().to_string(),
        });

        let mut full = String::new();
        loop {
            if cancel.is_cancelled() {
                let _ = self.event_tx.send(ChatEvent::Error {
                    message: "Request aborted".to_string(),
                });
                return Err(Error::Aborted);
            }

            let Some(event) = stream.next().await else {
                return Err(self.fail("stream ended before completion".to_string()));
            };

            match event {
                ChunkEvent::Delta { text } => {
                    full.push_str(&text);
                    let _ = self.event_tx.send(ChatEvent::Delta {
                        delta: text,
                        text: full.clone(),
                    });
                }
                ChunkEvent::Done {
                    prompt_tokens,
                    completion_tokens,
                } => {
                    tracing::debug!(?prompt_tokens, ?completion_tokens, "stream complete");
                    break;
                }
                ChunkEvent::Error { message } => {
                    return Err(self.fail(message));
                }
            }
        }

        let assistant = ChatMessage::assistant(full.clone());
        store.append_to_active(ChatMessage::user(prompt));
        store.append_to_active(assistant.clone());
        let _ = self.event_tx.send(ChatEvent::TurnEnd { message: assistant });

        Ok(full)
    }

    /// Publish a terminal error event and build the matching error value
    fn fail(&self, message: String) -> Error {
        let _ = self.event_tx.send(ChatEvent::Error {
            message: message.clone(),
        });
        Error::Ai(confab_ai::Error::Stream(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;
    use crate::store::DEFAULT_CHAT_NAME;
    use confab_ai::{ChunkStream, Role};
    use std::sync::Mutex;

    /// Backend that replays a fixed event script and records every request
    struct ScriptedBackend {
        events: Vec<ChunkEvent>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedBackend {
        fn new(events: Vec<ChunkEvent>) -> Arc<Self> {
            Arc::new(Self {
                events,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn replying(fragments: &[&str]) -> Arc<Self> {
            let mut events: Vec<ChunkEvent> = fragments
                .iter()
                .map(|f| ChunkEvent::Delta {
                    text: (*f).to_string(),
                })
                .collect();
            events.push(ChunkEvent::Done {
                prompt_tokens: None,
                completion_tokens: None,
            });
            Self::new(events)
        }
    }

    #[async_trait::async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat_stream(
            &self,
            _model: &str,
            messages: &[ChatMessage],
        ) -> confab_ai::Result<ChunkStream> {
            self.requests.lock().unwrap().push(messages.to_vec());
            Ok(Box::pin(tokio_stream::iter(self.events.clone())))
        }
    }

    /// Backend whose requests never get through
    struct UnreachableBackend;

    #[async_trait::async_trait]
    impl ChatBackend for UnreachableBackend {
        async fn chat_stream(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
        ) -> confab_ai::Result<ChunkStream> {
            Err(confab_ai::Error::api(503, "connection refused"))
        }
    }

    struct FailingExtractor;

    impl ContentExtractor for FailingExtractor {
        fn extract(&self, _bytes: &[u8], mime: &str) -> std::result::Result<String, ExtractError> {
            Err(ExtractError::Unsupported(mime.to_string()))
        }
    }

    fn turn_pairs(store: &ChatStore) -> Vec<(Role, &str)> {
        store
            .active_messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_single_turn_commits_user_then_assistant() {
        let backend = ScriptedBackend::replying(&["4"]);
        let responder = Responder::new(backend, "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();

        let reply = responder
            .respond(&mut store, "What is 2+2?", None, &cancel)
            .await
            .unwrap();

        assert_eq!(reply, "4");
        assert_eq!(
            turn_pairs(&store),
            vec![(Role::User, "What is 2+2?"), (Role::Assistant, "4")]
        );
    }

    #[tokio::test]
    async fn test_fragments_concatenate_in_order() {
        let backend = ScriptedBackend::replying(&["Hel", "lo, ", "world"]);
        let responder = Responder::new(backend, "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();

        let reply = responder
            .respond(&mut store, "greet me", None, &cancel)
            .await
            .unwrap();

        assert_eq!(reply, "Hello, world");
        assert_eq!(store.active_messages()[1].content, "Hello, world");
    }

    #[tokio::test]
    async fn test_attachment_context_framing() {
        let backend = ScriptedBackend::replying(&["ok"]);
        let responder = Responder::new(backend, "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();
        let attachment = Attachment::new(b"hello".to_vec(), "text/plain");

        responder
            .respond(&mut store, "Summarize", Some(&attachment), &cancel)
            .await
            .unwrap();

        assert_eq!(
            store.active_messages()[0].content,
            "Context from uploaded file:\nhello\n\nQuestion: Summarize"
        );
    }

    #[tokio::test]
    async fn test_midstream_error_commits_nothing() {
        let backend = ScriptedBackend::new(vec![
            ChunkEvent::Delta { text: "Par".into() },
            ChunkEvent::Delta { text: "tial".into() },
            ChunkEvent::Error {
                message: "connection reset".into(),
            },
        ]);
        let responder = Responder::new(backend, "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();

        let result = responder.respond(&mut store, "hi", None, &cancel).await;

        assert!(matches!(result, Err(Error::Ai(_))));
        assert!(store.active_messages().is_empty());
    }

    #[tokio::test]
    async fn test_truncated_stream_commits_nothing() {
        // No terminal event at all: the backend just stops.
        let backend = ScriptedBackend::new(vec![ChunkEvent::Delta { text: "Par".into() }]);
        let responder = Responder::new(backend, "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();

        let result = responder.respond(&mut store, "hi", None, &cancel).await;

        assert!(matches!(result, Err(Error::Ai(_))));
        assert!(store.active_messages().is_empty());
    }

    #[tokio::test]
    async fn test_backend_unreachable_commits_nothing() {
        let responder = Responder::new(Arc::new(UnreachableBackend), "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();

        let result = responder.respond(&mut store, "hi", None, &cancel).await;

        assert!(matches!(result, Err(Error::Ai(_))));
        assert!(store.active_messages().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_degrades_to_context() {
        let backend = ScriptedBackend::replying(&["ok"]);
        let responder =
            Responder::new(backend, "test-model").with_extractor(Arc::new(FailingExtractor));
        let mut events = responder.subscribe();
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();
        let attachment = Attachment::new(vec![1, 2, 3], "application/pdf");

        responder
            .respond(&mut store, "Summarize", Some(&attachment), &cancel)
            .await
            .unwrap();

        let expected_context =
            "No text extraction backend is available for 'application/pdf' attachments";
        assert_eq!(
            store.active_messages()[0].content,
            format!("Context from uploaded file:\n{expected_context}\n\nQuestion: Summarize")
        );

        // The degradation is surfaced as a warning event.
        let mut saw_warning = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ChatEvent::Warning { .. }) {
                saw_warning = true;
            }
        }
        assert!(saw_warning);
    }

    #[tokio::test]
    async fn test_turn_order_across_calls() {
        let backend = ScriptedBackend::replying(&["pong"]);
        let responder = Responder::new(backend, "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();

        responder
            .respond(&mut store, "first", None, &cancel)
            .await
            .unwrap();
        responder
            .respond(&mut store, "second", None, &cancel)
            .await
            .unwrap();

        assert_eq!(
            turn_pairs(&store),
            vec![
                (Role::User, "first"),
                (Role::Assistant, "pong"),
                (Role::User, "second"),
                (Role::Assistant, "pong"),
            ]
        );
    }

    #[tokio::test]
    async fn test_history_is_sent_to_backend() {
        let backend = ScriptedBackend::replying(&["pong"]);
        let responder = Responder::new(backend.clone(), "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();

        responder
            .respond(&mut store, "first", None, &cancel)
            .await
            .unwrap();
        responder
            .respond(&mut store, "second", None, &cancel)
            .await
            .unwrap();

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].len(), 1);
        let second: Vec<_> = requests[1].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(second, vec!["first", "pong", "second"]);
    }

    #[tokio::test]
    async fn test_cancelled_turn_discards_buffer() {
        let backend = ScriptedBackend::replying(&["never", "committed"]);
        let responder = Responder::new(backend, "test-model");
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = responder.respond(&mut store, "hi", None, &cancel).await;

        assert!(matches!(result, Err(Error::Aborted)));
        assert!(store.active_messages().is_empty());
    }

    #[tokio::test]
    async fn test_delta_events_carry_running_text() {
        let backend = ScriptedBackend::replying(&["Hel", "lo"]);
        let responder = Responder::new(backend, "test-model");
        let mut events = responder.subscribe();
        let mut store = ChatStore::new();
        let cancel = CancellationToken::new();

        responder
            .respond(&mut store, "greet", None, &cancel)
            .await
            .unwrap();

        let mut deltas = Vec::new();
        let mut chat = None;
        while let Ok(event) = events.try_recv() {
            match event {
                ChatEvent::TurnStart { chat: c } => chat = Some(c),
                ChatEvent::Delta { delta, text } => deltas.push((delta, text)),
                _ => {}
            }
        }

        assert_eq!(chat.as_deref(), Some(DEFAULT_CHAT_NAME));
        assert_eq!(
            deltas,
            vec![
                ("Hel".to_string(), "Hel".to_string()),
                ("lo".to_string(), "Hello".to_string()),
            ]
        );
    }
}
