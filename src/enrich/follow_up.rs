//! Creation-time follow-up email drafting.

use serde::Deserialize;
use tracing::warn;

use crate::domain::{ContactFields, FollowUpDraft};
use crate::extraction::{extract_json_object, ExtractionError, Extractor};

/// Subject used when the service answers without one.
const DEFAULT_SUBJECT: &str = "Follow-up";
/// Minimal valid HTML body.
const DEFAULT_BODY: &str = "<p></p>";

/// Raw shape of the service answer; both keys may be absent or empty.
#[derive(Debug, Deserialize)]
struct RawDraft {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

fn draft_instruction(fields: &ContactFields, transcript: Option<&str>) -> String {
    format!(
        "Write a professional follow-up email for the booth visitor described below.\n\
         \n\
         Name: {name}\n\
         Position: {position}\n\
         Email: {email}\n\
         Phone: {phone}\n\
         Company: {company}\n\
         Domain: {domain}\n\
         Transcript: {transcript}\n\
         \n\
         Tone: friendly and professional.\n\
         Format: a single JSON object with the following keys:\n\
         {{\n\
           \"subject\": \"Follow-up email subject\",\n\
           \"body\": \"Follow-up email body in HTML format with proper tags like <p>, <br>, <strong> etc.\"\n\
         }}\n\
         Do not use placeholders like [Your Company Name] or [Your Name]. Use realistic \
         dummy values instead. The body must be valid HTML, not plain text.",
        name = fields.name,
        position = fields.position,
        email = fields.email,
        phone = fields.phone,
        company = fields.company,
        domain = fields.domain,
        transcript = transcript.unwrap_or(""),
    )
}

/// Generate a follow-up draft for a visitor about to be created.
///
/// Total function: every failure path collapses to the fallback draft so the
/// caller can persist the visitor unconditionally.
pub async fn draft_follow_up(
    extractor: &dyn Extractor,
    fields: &ContactFields,
    transcript: Option<&str>,
) -> FollowUpDraft {
    let instruction = draft_instruction(fields, transcript);

    match request_draft(extractor, &instruction).await {
        Ok(draft) => draft,
        Err(e) => {
            warn!(error = %e, "follow-up draft generation failed, using fallback");
            FollowUpDraft::fallback()
        }
    }
}

async fn request_draft(
    extractor: &dyn Extractor,
    instruction: &str,
) -> Result<FollowUpDraft, ExtractionError> {
    let text = extractor.generate(instruction, None).await?;
    let raw: RawDraft = extract_json_object(&text)?;

    Ok(FollowUpDraft {
        subject: raw
            .subject
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        body: raw
            .body
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BODY.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_carries_every_field_and_the_transcript() {
        let fields = ContactFields {
            name: "Ava Carter".to_string(),
            position: "CTO".to_string(),
            email: "ava@skyline.test".to_string(),
            phone: "555-0100".to_string(),
            company: "Skyline".to_string(),
            domain: "skyline.test".to_string(),
        };

        let instruction = draft_instruction(&fields, Some("Discussed pricing."));
        for needle in [
            "Ava Carter",
            "CTO",
            "ava@skyline.test",
            "555-0100",
            "Skyline",
            "skyline.test",
            "Discussed pricing.",
        ] {
            assert!(instruction.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let raw: RawDraft = serde_json::from_str("{}").unwrap();
        assert!(raw.subject.is_none());
        assert!(raw.body.is_none());

        let draft = FollowUpDraft {
            subject: raw
                .subject
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            body: raw
                .body
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_BODY.to_string()),
        };
        assert_eq!(draft.subject, "Follow-up");
        assert_eq!(draft.body, "<p></p>");
    }
}
