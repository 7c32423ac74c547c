//! HTTP client for the visitor API.
//!
//! Used by the CLI commands and, through `VisitorSubmitter`, by the capture
//! session when it hands a reviewed visitor to the server.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use uuid::Uuid;

use crate::capture::VisitorSubmitter;
use crate::domain::{ConversationSummary, NewVisitor, VisitorRecord};
use crate::notify::Attachment;

/// Client for a running visitor API server.
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fail_from_response(response: reqwest::Response, doing: &str) -> anyhow::Error {
        let status = response.status();
        let detail = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_default();
        anyhow::anyhow!("{} failed with status {}: {}", doing, status, detail)
    }

    /// POST /api/visitor
    pub async fn create_visitor(&self, visitor: &NewVisitor) -> Result<Uuid> {
        let mut form = Form::new()
            .text("name", visitor.fields.name.clone())
            .text("position", visitor.fields.position.clone())
            .text("email", visitor.fields.email.clone())
            .text("phone", visitor.fields.phone.clone())
            .text("company", visitor.fields.company.clone())
            .text("domain", visitor.fields.domain.clone());

        if let Some(transcript) = &visitor.transcript {
            form = form.text("transcript", transcript.clone());
        }
        if let Some(audio) = &visitor.audio {
            let part = Part::bytes(audio.data.clone())
                .file_name("recording.webm")
                .mime_str(&audio.mime_type)
                .context("Invalid audio MIME type")?;
            form = form.part("audio", part);
        }

        let response = self
            .client
            .post(self.url("/api/visitor"))
            .multipart(form)
            .send()
            .await
            .context("Failed to reach the visitor API")?;

        if !response.status().is_success() {
            return Err(Self::fail_from_response(response, "visitor creation").await);
        }

        let created: CreatedResponse = response
            .json()
            .await
            .context("Failed to parse creation response")?;
        Ok(created.id)
    }

    /// GET /api/visitor/{id}
    pub async fn get_visitor(&self, id: Uuid) -> Result<VisitorRecord> {
        let response = self
            .client
            .get(self.url(&format!("/api/visitor/{}", id)))
            .send()
            .await
            .context("Failed to reach the visitor API")?;

        if !response.status().is_success() {
            return Err(Self::fail_from_response(response, "visitor fetch").await);
        }

        response
            .json()
            .await
            .context("Failed to parse visitor record")
    }

    /// GET /api/visitor
    pub async fn list_visitors(&self) -> Result<Vec<VisitorRecord>> {
        let response = self
            .client
            .get(self.url("/api/visitor"))
            .send()
            .await
            .context("Failed to reach the visitor API")?;

        if !response.status().is_success() {
            return Err(Self::fail_from_response(response, "visitor listing").await);
        }

        response
            .json()
            .await
            .context("Failed to parse visitor listing")
    }

    /// POST /api/visitor/{id}/enrich
    pub async fn enrich_visitor(&self, id: Uuid) -> Result<ConversationSummary> {
        let response = self
            .client
            .post(self.url(&format!("/api/visitor/{}/enrich", id)))
            .send()
            .await
            .context("Failed to reach the visitor API")?;

        if !response.status().is_success() {
            return Err(Self::fail_from_response(response, "enrichment").await);
        }

        response.json().await.context("Failed to parse summary")
    }

    /// POST /api/visitor/{id}/email
    pub async fn send_follow_up(&self, id: Uuid, attachments: Vec<Attachment>) -> Result<()> {
        let mut form = Form::new();
        for attachment in attachments {
            let part = Part::bytes(attachment.content).file_name(attachment.filename);
            form = form.part("attachments", part);
        }

        let response = self
            .client
            .post(self.url(&format!("/api/visitor/{}/email", id)))
            .multipart(form)
            .send()
            .await
            .context("Failed to reach the visitor API")?;

        if !response.status().is_success() {
            return Err(Self::fail_from_response(response, "email dispatch").await);
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl VisitorSubmitter for ApiClient {
    async fn create_visitor(&self, visitor: NewVisitor) -> Result<Uuid> {
        ApiClient::create_visitor(self, &visitor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slashes() {
        let client = ApiClient::new("http://127.0.0.1:5000/");
        assert_eq!(client.url("/api/visitor"), "http://127.0.0.1:5000/api/visitor");

        let id = Uuid::nil();
        assert_eq!(
            client.url(&format!("/api/visitor/{}/enrich", id)),
            format!("http://127.0.0.1:5000/api/visitor/{}/enrich", id)
        );
    }
}
