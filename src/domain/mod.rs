//! Data structures for the capture and enrichment domain.

pub mod visitor;

pub use visitor::{
    AudioClip, ContactFields, ConversationSummary, EnrichedData, FollowUpDraft, NewVisitor,
    VisitorRecord,
};
