//! HTTP client for the extraction service's generateContent endpoint.
//!
//! One request/response call: a role-tagged list of parts (the instruction
//! text plus at most one inline base64 payload) goes in, free text comes
//! back out of `candidates[0].content.parts[0].text`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ExtractionError, Extractor, MediaPayload};

/// Client for the extraction service.
pub struct ExtractionClient {
    endpoint: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl ExtractionClient {
    /// Create a client with a bounded per-request timeout.
    ///
    /// The service has unbounded latency and no SLA; the timeout is the only
    /// thing keeping a stuck call from hanging a session forever.
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> Self {
        Self {
            endpoint,
            api_key,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn request_url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key)
    }

    fn build_request(instruction: &str, media: Option<&MediaPayload>) -> GenerateRequest {
        let mut parts = vec![RequestPart {
            text: Some(instruction.to_string()),
            inline_data: None,
        }];

        if let Some(payload) = media {
            parts.push(RequestPart {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: payload.mime_type.clone(),
                    data: STANDARD.encode(&payload.data),
                }),
            });
        }

        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        }
    }
}

#[async_trait]
impl Extractor for ExtractionClient {
    async fn generate(
        &self,
        instruction: &str,
        media: Option<&MediaPayload>,
    ) -> Result<String, ExtractionError> {
        let request = Self::build_request(instruction, media);

        let response = self
            .client
            .post(self.request_url())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Status(status));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or(ExtractionError::MissingText)?;

        debug!(chars = text.len(), "extraction service answered");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_appends_key() {
        let client = ExtractionClient::new(
            "https://ai.example/v1/generate".to_string(),
            "SECRET".to_string(),
            Duration::from_secs(5),
        );
        assert_eq!(
            client.request_url(),
            "https://ai.example/v1/generate?key=SECRET"
        );
    }

    #[test]
    fn request_body_tags_role_and_inlines_media() {
        let payload = MediaPayload::new("image/jpeg", vec![0xff, 0xd8]);
        let request = ExtractionClient::build_request("read the card", Some(&payload));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "read the card");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "/9g=");
    }

    #[test]
    fn text_only_request_has_a_single_part() {
        let request = ExtractionClient::build_request("summarize this", None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn response_text_is_unwrapped() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "hello there"}]}}
            ]
        }"#;
        let body: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text);
        assert_eq!(text.as_deref(), Some("hello there"));
    }
}
