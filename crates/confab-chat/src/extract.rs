//! File attachment content extraction

use thiserror::Error;

/// An uploaded file: raw bytes plus the declared MIME type
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Attachment {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }
}

/// Errors from content extraction.
///
/// Display strings are written for end users: on failure the responder
/// forwards them verbatim as the "extracted context" instead of aborting
/// the turn.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// No extraction backend is wired up for this MIME category
    #[error("No text extraction backend is available for '{0}' attachments")]
    Unsupported(String),

    /// The file claimed to be text but is not valid UTF-8
    #[error("File is not valid UTF-8 text: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

/// Turns attachment bytes into text usable as prompt context.
///
/// Implementations must not panic on arbitrary input; every failure is a
/// human-readable error.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], mime: &str) -> Result<String, ExtractError>;
}

/// Built-in extractor: decodes text-like attachments as UTF-8.
///
/// Image OCR and PDF text extraction need external engines; this extractor
/// reports them as unsupported so the seam stays in place without pulling
/// those engines in.
#[derive(Debug, Default)]
pub struct TextExtractor;

impl ContentExtractor for TextExtractor {
    fn extract(&self, bytes: &[u8], mime: &str) -> Result<String, ExtractError> {
        if mime.starts_with("image/") || mime == "application/pdf" {
            return Err(ExtractError::Unsupported(mime.to_string()));
        }
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}
