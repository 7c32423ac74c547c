//! Server-side enrichment stages.
//!
//! Two independent stages share the extraction service but not an error
//! policy. The follow-up draft runs inline during visitor creation and is
//! deliberately a total function: a failed draft must never block a save.
//! The conversation summary runs on demand and fails loudly instead, since
//! there is no safe default to distinguish "no summary yet" from "summary
//! failed".

pub mod follow_up;
pub mod summary;

pub use follow_up::draft_follow_up;
pub use summary::generate_summary;
