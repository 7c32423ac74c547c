//! HTTP mail relay client.
//!
//! Posts one multipart form per message to a relay endpoint: sender and
//! recipient addresses, subject, HTML body, and each attachment as a file
//! part carrying its original filename.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::info;

use super::{DeliveryError, Mailer, OutgoingEmail};

/// Mail relay API client.
pub struct MailRelayClient {
    relay_url: String,
    api_key: String,
    from_address: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl MailRelayClient {
    pub fn new(
        relay_url: String,
        api_key: String,
        from_address: String,
        timeout: Duration,
    ) -> Self {
        Self {
            relay_url,
            api_key,
            from_address,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn build_form(&self, email: &OutgoingEmail) -> Form {
        let mut form = Form::new()
            .text("from", self.from_address.clone())
            .text("to", email.to.clone())
            .text("subject", email.subject.clone())
            .text("html", email.html_body.clone());

        for attachment in &email.attachments {
            let part =
                Part::bytes(attachment.content.clone()).file_name(attachment.filename.clone());
            form = form.part("attachment", part);
        }

        form
    }
}

#[async_trait]
impl Mailer for MailRelayClient {
    async fn send(&self, email: OutgoingEmail) -> Result<(), DeliveryError> {
        let form = self.build_form(&email);

        let response = self
            .client
            .post(&self.relay_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status, detail });
        }

        info!(to = %email.to, attachments = email.attachments.len(), "email dispatched");
        Ok(())
    }
}
