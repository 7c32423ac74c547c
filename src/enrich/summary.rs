//! On-demand conversation summary generation.

use tracing::info;

use crate::domain::ConversationSummary;
use crate::extraction::{extract_json_object, ExtractionError, Extractor};

fn summary_instruction(transcript: &str) -> String {
    format!(
        "You are a skilled sales and marketing assistant for a trade show booth exhibitor. \
         Analyze the conversation transcript below and produce a concise, structured summary. \
         The output must be a single JSON object.\n\
         \n\
         Transcript:\n\
         \"{transcript}\"\n\
         \n\
         Format: a JSON object with the following keys:\n\
         {{\n\
           \"summary\": \"A concise summary of the conversation.\",\n\
           \"keyPoints\": [\"Key takeaways or main topics discussed.\"],\n\
           \"actionItems\": [\"Specific follow-up tasks, e.g. 'Send pricing info'.\"],\n\
           \"sentiment\": \"Overall sentiment of the visitor, e.g. 'Very Positive', 'Neutral', 'Negative'.\"\n\
         }}",
    )
}

/// Generate a structured summary from a stored transcript.
///
/// Unlike drafting, this propagates every failure: a malformed or empty
/// answer leaves any previously stored summary untouched and surfaces as an
/// operation error. Callers gate on transcript presence before invoking.
pub async fn generate_summary(
    extractor: &dyn Extractor,
    transcript: &str,
) -> Result<ConversationSummary, ExtractionError> {
    let instruction = summary_instruction(transcript);
    let text = extractor.generate(&instruction, None).await?;
    let summary: ConversationSummary = extract_json_object(&text)?;

    info!(
        key_points = summary.key_points.len(),
        action_items = summary.action_items.len(),
        "conversation summary generated"
    );
    Ok(summary)
}
