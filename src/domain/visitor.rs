//! Visitor records and the shapes exchanged with the extraction service.
//!
//! Wire names are camelCase to stay compatible with the original dashboard
//! payloads (`aiSummary`, `enrichedData.keyPoints`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six fields read off a business card.
///
/// Every field is an independently editable string; the extraction service
/// is instructed to fill unreadable fields with realistic placeholder values
/// rather than leave them empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub name: String,
    pub position: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub domain: String,
}

/// Structured enrichment produced by the conversation summary stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedData {
    #[serde(default)]
    pub key_points: Vec<String>,

    #[serde(default)]
    pub action_items: Vec<String>,

    #[serde(default)]
    pub sentiment: String,
}

/// A finalized audio recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Input to visitor creation: reviewed fields plus the recorded conversation.
#[derive(Debug, Clone, Default)]
pub struct NewVisitor {
    pub fields: ContactFields,
    pub transcript: Option<String>,
    pub audio: Option<AudioClip>,
}

/// Follow-up email draft generated at visitor creation time.
///
/// Draft generation is a total function: callers always get a subject/body
/// pair, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpDraft {
    pub subject: String,
    pub body: String,
}

impl FollowUpDraft {
    /// The draft used when generation fails: empty subject, minimal valid HTML.
    pub fn fallback() -> Self {
        Self {
            subject: String::new(),
            body: "<p></p>".to_string(),
        }
    }
}

/// Result of the conversation summary stage.
///
/// All four keys are required; a service response missing any of them is
/// rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub sentiment: String,
}

/// A persisted booth visitor.
///
/// Created once, read many times, never deleted. The follow-up subject/body
/// are written by the creation-time draft stage; `ai_summary`/`enriched_data`
/// stay empty until the summary stage runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRecord {
    pub id: Uuid,

    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub position: String,
    pub domain: String,

    #[serde(default)]
    pub transcript: Option<String>,

    /// Recorded conversation audio, base64 in JSON.
    #[serde(default, with = "base64_bytes")]
    pub audio: Option<Vec<u8>>,

    #[serde(default)]
    pub audio_mime_type: Option<String>,

    pub subject: String,
    pub body: String,

    #[serde(default)]
    pub ai_summary: String,

    #[serde(default)]
    pub enriched_data: EnrichedData,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VisitorRecord {
    /// A transcript counts as present only when it has content.
    pub fn has_transcript(&self) -> bool {
        self.transcript
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Base64 (de)serialization for optional binary columns.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => ser.serialize_some(&STANDARD.encode(bytes)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(de)?;
        match encoded {
            Some(s) => STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> VisitorRecord {
        VisitorRecord {
            id: Uuid::new_v4(),
            name: "Ava Carter".to_string(),
            email: "ava@skyline.test".to_string(),
            company: "Skyline".to_string(),
            phone: "555-0100".to_string(),
            position: "CTO".to_string(),
            domain: "skyline.test".to_string(),
            transcript: Some("Discussed pricing for 200 seats.".to_string()),
            audio: Some(vec![1, 2, 3, 4]),
            audio_mime_type: Some("audio/webm".to_string()),
            subject: "Great meeting you".to_string(),
            body: "<p>Hello</p>".to_string(),
            ai_summary: String::new(),
            enriched_data: EnrichedData::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn record_roundtrips_through_json_with_base64_audio() {
        let record = sample_record();
        let json = serde_json::to_value(&record).unwrap();

        // Audio is a base64 string on the wire, camelCase keys throughout
        assert_eq!(json["audio"], serde_json::json!("AQIDBA=="));
        assert!(json.get("aiSummary").is_some());
        assert!(json.get("enrichedData").is_some());

        let parsed: VisitorRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.audio, record.audio);
        assert_eq!(parsed.name, record.name);
    }

    #[test]
    fn has_transcript_requires_content() {
        let mut record = sample_record();
        assert!(record.has_transcript());

        record.transcript = Some("   ".to_string());
        assert!(!record.has_transcript());

        record.transcript = None;
        assert!(!record.has_transcript());
    }

    #[test]
    fn enriched_data_defaults_are_empty() {
        let enriched: EnrichedData = serde_json::from_str("{}").unwrap();
        assert!(enriched.key_points.is_empty());
        assert!(enriched.action_items.is_empty());
        assert!(enriched.sentiment.is_empty());
    }

    #[test]
    fn summary_rejects_missing_keys() {
        let err = serde_json::from_str::<ConversationSummary>(
            r#"{"summary": "short", "keyPoints": []}"#,
        );
        assert!(err.is_err());
    }
}
