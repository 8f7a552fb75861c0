//! Events published while a response is assembled

use confab_ai::ChatMessage;
use serde::{Deserialize, Serialize};

/// Events a presentation layer can subscribe to for incremental rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A request/response cycle started for the named chat
    TurnStart { chat: String },

    /// Something degraded but the turn continues (e.g. the attachment
    /// could not be read and its error text was used as context)
    Warning { message: String },

    /// A fragment arrived; `text` is the full response accumulated so far
    Delta { delta: String, text: String },

    /// The turn completed and was committed to the store
    TurnEnd { message: ChatMessage },

    /// The turn failed; nothing was committed
    Error { message: String },
}

impl ChatEvent {
    /// Check if this is a terminal event (TurnEnd or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::TurnEnd { .. } | ChatEvent::Error { .. })
    }
}
