//! Client-side capture workflow.
//!
//! `CaptureSession` is the pure state machine for one scan-to-submission
//! cycle; `SessionDriver` runs it against the camera, microphone,
//! extraction service, and submission boundary.

pub mod driver;
pub mod media;
pub mod session;

pub use driver::{SessionDriver, SessionEvent, VisitorSubmitter};
pub use media::{Camera, DeviceError, FileCamera, FileMicrophone, Microphone};
pub use session::{ApplyOutcome, CaptureSession, SessionError, SessionState, Step};
