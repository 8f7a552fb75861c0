//! Streaming event types and utilities

use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a reply streams in from the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkEvent {
    /// An incremental text fragment
    Delta { text: String },
    /// Natural end of the reply
    Done {
        /// Prompt tokens evaluated, when the backend reports them
        prompt_tokens: Option<u64>,
        /// Completion tokens generated, when the backend reports them
        completion_tokens: Option<u64>,
    },
    /// The stream failed; no further events follow
    Error { message: String },
}

impl ChunkEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChunkEvent::Done { .. } | ChunkEvent::Error { .. })
    }

    /// Get the fragment text if this is a Delta event
    pub fn as_delta(&self) -> Option<&str> {
        match self {
            ChunkEvent::Delta { text } => Some(text),
            _ => None,
        }
    }
}

/// A stream of chunk events
pub type ChunkStream = Pin<Box<dyn Stream<Item = ChunkEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(
            ChunkEvent::Done {
                prompt_tokens: None,
                completion_tokens: None
            }
            .is_terminal()
        );
        assert!(
            ChunkEvent::Error {
                message: "boom".into()
            }
            .is_terminal()
        );
        assert!(!ChunkEvent::Delta { text: "hi".into() }.is_terminal());
    }

    #[test]
    fn test_as_delta() {
        let e = ChunkEvent::Delta { text: "Hel".into() };
        assert_eq!(e.as_delta(), Some("Hel"));
        assert_eq!(
            ChunkEvent::Done {
                prompt_tokens: Some(1),
                completion_tokens: Some(2)
            }
            .as_delta(),
            None
        );
    }
}
