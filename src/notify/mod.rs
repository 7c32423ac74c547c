//! Outbound email dispatch.
//!
//! The dispatcher boundary is one operation: send a single email with an
//! HTML body and zero or more binary attachments. Delivery failures surface
//! to the caller; nothing here retries or queues.

pub mod relay;

use async_trait::async_trait;

pub use relay::MailRelayClient;

/// A file attached to an outbound email.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// One email ready for dispatch.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

/// Errors from email dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail relay rejected the message: {status} {detail}")]
    Rejected {
        status: reqwest::StatusCode,
        detail: String,
    },
}

/// Trait for email dispatch backends.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email. No retry on failure.
    async fn send(&self, email: OutgoingEmail) -> Result<(), DeliveryError>;
}
