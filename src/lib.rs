//! boothscan - Trade-show visitor capture and AI enrichment
//!
//! Captures booth visitors end to end: a business card is photographed and
//! OCR'd into contact fields, the conversation is recorded and transcribed,
//! and the reviewed record is submitted to a server that drafts a follow-up
//! email at creation time and can generate a structured conversation summary
//! on demand.
//!
//! # Architecture
//!
//! - The client side is a capture session state machine: one tagged state
//!   per workflow step, a single in-flight network call at a time, and a
//!   generation token so responses arriving after a retake are discarded.
//! - The server side is a warp HTTP API over a SQLite-backed visitor store.
//!   The follow-up draft runs inline during creation and never blocks a
//!   save; the summary runs on demand and fails loudly.
//! - Both sides talk to the same external extraction service, which answers
//!   in free text expected to contain a JSON object somewhere inside it.
//!
//! # Modules
//!
//! - `capture`: Capture session state machine and its driver
//! - `extraction`: Extraction service client and JSON-from-prose decoding
//! - `enrich`: Follow-up draft and conversation summary stages
//! - `store`: SQLite visitor store
//! - `server`: HTTP API
//! - `notify`: Outbound email dispatch
//! - `client`: HTTP client for the visitor API
//! - `domain`: Data structures (VisitorRecord, ContactFields, ...)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the API server
//! boothscan serve
//!
//! # Drive a capture session from files against a running server
//! boothscan scan --image card.jpg --audio talk.webm --submit
//!
//! # Enrich a stored visitor with an AI summary
//! boothscan enrich <visitor-id>
//! ```

pub mod capture;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod enrich;
pub mod extraction;
pub mod notify;
pub mod server;
pub mod store;

// Re-export main types at crate root for convenience
pub use capture::{CaptureSession, SessionDriver, SessionError, SessionEvent, Step};
pub use domain::{ContactFields, ConversationSummary, EnrichedData, FollowUpDraft, VisitorRecord};
pub use extraction::{extract_json_object, DecodeError, ExtractionClient, ExtractionError, Extractor};
pub use store::VisitorStore;
