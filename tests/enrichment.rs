//! Enrichment Stage Tests
//!
//! The follow-up draft must be a total function; the conversation summary
//! must fail loudly and overwrite wholesale.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use boothscan::domain::{ContactFields, FollowUpDraft, NewVisitor};
use boothscan::enrich::{draft_follow_up, generate_summary};
use boothscan::extraction::{ExtractionError, Extractor, MediaPayload};
use boothscan::store::VisitorStore;

struct ScriptedExtractor {
    responses: Mutex<VecDeque<Result<String, ()>>>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    fn new(responses: Vec<Result<String, ()>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn generate(
        &self,
        _instruction: &str,
        _media: Option<&MediaPayload>,
    ) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            _ => Err(ExtractionError::MissingText),
        }
    }
}

fn ava() -> ContactFields {
    ContactFields {
        name: "Ava Carter".to_string(),
        position: "CTO".to_string(),
        email: "ava@skyline.test".to_string(),
        phone: "555-0100".to_string(),
        company: "Skyline".to_string(),
        domain: "skyline.test".to_string(),
    }
}

// --- Follow-up draft -----------------------------------------------------

#[tokio::test]
async fn draft_parses_a_wrapped_answer() {
    let extractor = ScriptedExtractor::new(vec![Ok(r#"Of course! Here's a draft:
        {"subject": "Great to meet you at the booth",
         "body": "<p>Hi Ava,</p><p>Thanks for stopping by.</p>"}
        Hope this helps."#
        .to_string())]);

    let draft = draft_follow_up(&extractor, &ava(), Some("Discussed pricing.")).await;
    assert_eq!(draft.subject, "Great to meet you at the booth");
    assert_eq!(draft.body, "<p>Hi Ava,</p><p>Thanks for stopping by.</p>");
}

#[tokio::test]
async fn draft_survives_a_service_failure() {
    let extractor = ScriptedExtractor::new(vec![Err(())]);

    let draft = draft_follow_up(&extractor, &ava(), None).await;
    assert_eq!(draft, FollowUpDraft::fallback());
    assert_eq!(draft.subject, "");
    assert_eq!(draft.body, "<p></p>");
}

#[tokio::test]
async fn draft_survives_unparsable_text() {
    let extractor =
        ScriptedExtractor::new(vec![Ok("no structured data in this answer".to_string())]);

    let draft = draft_follow_up(&extractor, &ava(), Some("chat")).await;
    assert_eq!(draft, FollowUpDraft::fallback());
}

#[tokio::test]
async fn draft_fills_in_missing_keys() {
    let extractor = ScriptedExtractor::new(vec![Ok(r#"{"subject": ""}"#.to_string())]);

    let draft = draft_follow_up(&extractor, &ava(), None).await;
    // Empty subject and absent body fall back to usable values
    assert_eq!(draft.subject, "Follow-up");
    assert_eq!(draft.body, "<p></p>");
}

// --- Conversation summary ------------------------------------------------

const SUMMARY_JSON: &str = r#"Here is the analysis you requested:
    {"summary": "Ava wants a 200-seat quote.",
     "keyPoints": ["pricing", "rollout timeline"],
     "actionItems": ["Send pricing info", "Schedule a demo"],
     "sentiment": "Very Positive"}"#;

#[tokio::test]
async fn summary_parses_and_is_fully_typed() {
    let extractor = ScriptedExtractor::new(vec![Ok(SUMMARY_JSON.to_string())]);

    let summary = generate_summary(&extractor, "Discussed pricing for 200 seats.")
        .await
        .unwrap();
    assert_eq!(summary.summary, "Ava wants a 200-seat quote.");
    assert_eq!(summary.key_points, vec!["pricing", "rollout timeline"]);
    assert_eq!(
        summary.action_items,
        vec!["Send pricing info", "Schedule a demo"]
    );
    assert_eq!(summary.sentiment, "Very Positive");
}

#[tokio::test]
async fn summary_propagates_a_malformed_answer() {
    let extractor = ScriptedExtractor::new(vec![Ok(
        r#"{"summary": "text but nothing else"}"#.to_string()
    )]);

    let err = generate_summary(&extractor, "some transcript")
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Decode(_)));
}

#[tokio::test]
async fn summary_propagates_a_service_failure() {
    let extractor = ScriptedExtractor::new(vec![Err(())]);

    let err = generate_summary(&extractor, "some transcript")
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::MissingText));
    assert_eq!(extractor.calls(), 1);
}

// --- Summary against the store -------------------------------------------

#[tokio::test]
async fn two_summaries_leave_only_the_second_in_the_store() {
    let store = VisitorStore::open_in_memory().unwrap();
    let visitor = NewVisitor {
        fields: ava(),
        transcript: Some("Long conversation.".to_string()),
        audio: None,
    };
    let id = store.insert(&visitor, &FollowUpDraft::fallback()).unwrap();

    let first_extractor = ScriptedExtractor::new(vec![Ok(SUMMARY_JSON.to_string())]);
    let first = generate_summary(&first_extractor, "Long conversation.")
        .await
        .unwrap();
    store.save_enrichment(id, &first).unwrap();

    let second_extractor = ScriptedExtractor::new(vec![Ok(r#"
        {"summary": "Second analysis.", "keyPoints": ["budget"],
         "actionItems": [], "sentiment": "Neutral"}"#
        .to_string())]);
    let second = generate_summary(&second_extractor, "Long conversation.")
        .await
        .unwrap();
    store.save_enrichment(id, &second).unwrap();

    // Last write wins, no merging with the first result
    let record = store.get(id).unwrap().unwrap();
    assert_eq!(record.ai_summary, "Second analysis.");
    assert_eq!(record.enriched_data.key_points, vec!["budget"]);
    assert!(record.enriched_data.action_items.is_empty());
    assert_eq!(record.enriched_data.sentiment, "Neutral");
}
