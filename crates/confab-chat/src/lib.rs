//! confab-chat: session-scoped conversation state and streamed-response assembly
//!
//! The two pieces a chat front end builds on: a [`ChatStore`] holding named
//! conversation threads for one session, and a [`Responder`] that drives a
//! single request/response cycle against a model backend, publishing
//! fragments as they arrive and committing the finished turn to the store.

pub mod backend;
pub mod error;
pub mod events;
pub mod extract;
pub mod responder;
pub mod store;

pub use backend::ChatBackend;
pub use error::{Error, Result, StoreError};
pub use events::ChatEvent;
pub use extract::{Attachment, ContentExtractor, ExtractError, TextExtractor};
pub use responder::Responder;
pub use store::{Chat, ChatStore, DEFAULT_CHAT_NAME};
