//! Client for the external extraction service.
//!
//! The service takes a free-text instruction plus at most one inline binary
//! payload (image or audio) and answers in free text that is expected to
//! contain, but is not guaranteed to be purely, a JSON object. The
//! `extract_json_object` helper digs that object out; the `Extractor` trait
//! is the seam the rest of the crate (and the tests) program against.

pub mod client;
pub mod json;

use async_trait::async_trait;

pub use client::ExtractionClient;
pub use json::{extract_json_object, DecodeError};

/// One inline binary payload with its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl MediaPayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// Errors from an extraction call.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("extraction request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("extraction service response contained no text")]
    MissingText,

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Seam for the external extraction capability.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Send an instruction (and optionally one binary payload) to the
    /// service and return its raw free-text answer.
    async fn generate(
        &self,
        instruction: &str,
        media: Option<&MediaPayload>,
    ) -> Result<String, ExtractionError>;
}
