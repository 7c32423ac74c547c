//! Session driver: wires the state machine to its collaborators.
//!
//! The driver owns the session behind a mutex and never holds the lock
//! across an await. Each network operation snapshots the generation token
//! and its inputs under the lock, performs the call unlocked, then re-locks
//! and applies the result only if the session has not been superseded in
//! the meantime.
//!
//! UI-facing notifications go out on a broadcast channel scoped to this
//! driver instance, not process-wide state, so two concurrent capture
//! screens cannot leak alerts into each other.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{ContactFields, NewVisitor};
use crate::extraction::{extract_json_object, Extractor, MediaPayload};

use super::media::{Camera, DeviceError, Microphone};
use super::session::{ApplyOutcome, CaptureSession, SessionError, SessionState, Step};

/// Fixed instruction for business-card field extraction.
const EXTRACT_FIELDS_INSTRUCTION: &str = "You are an expert data extraction tool. Extract the \
    following from the attached business card: full name, position, email, phone number, \
    company name, and company domain. Format the output as a single JSON object: \
    {\"name\": \"\", \"position\": \"\", \"email\": \"\", \"phone\": \"\", \"company\": \"\", \
    \"domain\": \"\"}. If a piece of information is missing or cannot be read from the card, \
    use a realistic dummy value for that field instead of leaving it empty.";

fn transcription_instruction(fields: &ContactFields) -> String {
    format!(
        "You are a voice transcription tool. Transcribe the attached audio clearly and \
         concisely, ignoring any background or random noise. Output only the transcribed \
         text. If the audio contains no actual conversation (silent, unclear, or noise \
         only), output a realistic dummy transcript instead: a brief, natural-sounding \
         exchange between an exhibitor and a walk-in booth visitor, focused on the \
         visitor's details and interest. The visitor is {name} ({position}) from {company}.",
        name = fields.name,
        position = fields.position,
        company = fields.company,
    )
}

/// Submission boundary: whatever persists the reviewed visitor.
#[async_trait::async_trait]
pub trait VisitorSubmitter: Send + Sync {
    async fn create_visitor(&self, visitor: NewVisitor) -> anyhow::Result<Uuid>;
}

/// Notifications for whatever UI is attached to this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StepChanged(Step),
    LoadingChanged(bool),
    ErrorRaised(String),
    Submitted(Uuid),
}

/// Drives one capture session against its collaborators.
pub struct SessionDriver {
    session: Arc<Mutex<CaptureSession>>,
    camera: Arc<dyn Camera>,
    microphone: Arc<dyn Microphone>,
    extractor: Arc<dyn Extractor>,
    submitter: Arc<dyn VisitorSubmitter>,
    events: broadcast::Sender<SessionEvent>,
}

impl Clone for SessionDriver {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            camera: Arc::clone(&self.camera),
            microphone: Arc::clone(&self.microphone),
            extractor: Arc::clone(&self.extractor),
            submitter: Arc::clone(&self.submitter),
            events: self.events.clone(),
        }
    }
}

impl SessionDriver {
    pub fn new(
        camera: Arc<dyn Camera>,
        microphone: Arc<dyn Microphone>,
        extractor: Arc<dyn Extractor>,
        submitter: Arc<dyn VisitorSubmitter>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Arc::new(Mutex::new(CaptureSession::new())),
            camera,
            microphone,
            extractor,
            submitter,
            events,
        }
    }

    /// Subscribe to UI notifications for this session instance.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut CaptureSession) -> R) -> R {
        // Transitions never partially apply, so state behind a poisoned
        // lock is still consistent.
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut session)
    }

    pub fn step(&self) -> Step {
        self.with_session(|s| s.step())
    }

    pub fn error(&self) -> Option<String> {
        self.with_session(|s| s.error().map(str::to_string))
    }

    pub fn is_busy(&self) -> bool {
        self.with_session(|s| s.is_busy())
    }

    /// Snapshot of the extracted fields, once populated.
    pub fn fields(&self) -> Option<ContactFields> {
        self.with_session(|s| match s.state() {
            SessionState::Recording { fields, .. } | SessionState::Reviewing { fields, .. } => {
                Some(fields.clone())
            }
            SessionState::Capturing { .. } => None,
        })
    }

    /// Snapshot of the transcript, once in review.
    pub fn transcript(&self) -> Option<String> {
        self.with_session(|s| match s.state() {
            SessionState::Reviewing { transcript, .. } => Some(transcript.clone()),
            _ => None,
        })
    }

    fn raise_device_error(&self, e: &DeviceError) -> SessionError {
        let message = e.to_string();
        self.with_session(|s| s.set_error(message.clone()));
        self.emit(SessionEvent::ErrorRaised(message.clone()));
        match e {
            DeviceError::PermissionDenied(_) => SessionError::PermissionDenied(message),
            DeviceError::Unavailable(_) => SessionError::Device(message),
        }
    }

    /// Acquire the camera. Failure leaves the session in the capture step
    /// with a visible error; the user retries, nothing retries for them.
    pub async fn start_camera(&self) -> Result<(), SessionError> {
        match self.camera.start().await {
            Ok(()) => {
                self.with_session(|s| s.clear_error());
                Ok(())
            }
            Err(e) => Err(self.raise_device_error(&e)),
        }
    }

    /// Snapshot the current frame; the camera stream stops.
    pub async fn capture_photo(&self) -> Result<(), SessionError> {
        let frame = match self.camera.capture().await {
            Ok(frame) => frame,
            Err(e) => return Err(self.raise_device_error(&e)),
        };
        self.with_session(|s| s.frame_captured(frame))
    }

    /// Discard the captured frame (and any extracted state) and restart the
    /// camera for another shot.
    pub async fn retake(&self) -> Result<(), SessionError> {
        self.camera.stop().await;
        self.with_session(|s| s.retake())?;
        self.emit(SessionEvent::StepChanged(Step::Capture));
        self.start_camera().await
    }

    /// Run field extraction on the captured frame. On success the session
    /// advances to the recording step and the microphone starts.
    pub async fn extract_fields(&self) -> Result<(), SessionError> {
        let (generation, frame) = self.with_session(|s| s.begin_extraction())?;
        self.emit(SessionEvent::LoadingChanged(true));

        let result = match self
            .extractor
            .generate(EXTRACT_FIELDS_INSTRUCTION, Some(&frame))
            .await
        {
            Ok(text) => extract_json_object::<ContactFields>(&text).map_err(Into::into),
            Err(e) => Err(e),
        };

        let applied = self.with_session(|s| s.apply_extraction(generation, result));
        self.emit(SessionEvent::LoadingChanged(false));

        match applied {
            Ok(ApplyOutcome::Applied) => {
                debug!("fields extracted, advancing to recording");
                self.emit(SessionEvent::StepChanged(Step::Record));
                self.start_recording().await
            }
            Ok(ApplyOutcome::Stale) => {
                warn!("discarding extraction response for a superseded session");
                Ok(())
            }
            Err(e) => {
                self.emit(SessionEvent::ErrorRaised(e.to_string()));
                Err(e)
            }
        }
    }

    /// Start the conversation recording.
    pub async fn start_recording(&self) -> Result<(), SessionError> {
        match self.microphone.start().await {
            Ok(()) => self.with_session(|s| s.recording_started()),
            Err(e) => Err(self.raise_device_error(&e)),
        }
    }

    /// Stop recording; transcription runs immediately and the session lands
    /// in review whether or not it succeeded.
    pub async fn stop_recording(&self) -> Result<(), SessionError> {
        let clip = match self.microphone.stop().await {
            Ok(clip) => clip,
            Err(e) => return Err(self.raise_device_error(&e)),
        };
        self.with_session(|s| s.recording_stopped(clip))?;

        let (generation, clip, fields) = self.with_session(|s| s.begin_transcription())?;
        self.emit(SessionEvent::LoadingChanged(true));

        let instruction = transcription_instruction(&fields);
        let media = MediaPayload::new(clip.mime_type, clip.data);
        let result = self.extractor.generate(&instruction, Some(&media)).await;

        let applied = self.with_session(|s| s.apply_transcription(generation, result))?;
        self.emit(SessionEvent::LoadingChanged(false));

        match applied {
            ApplyOutcome::Applied => {
                if let Some(message) = self.error() {
                    self.emit(SessionEvent::ErrorRaised(message));
                }
                self.emit(SessionEvent::StepChanged(Step::Review));
            }
            ApplyOutcome::Stale => {
                warn!("discarding transcription response for a superseded session");
            }
        }
        Ok(())
    }

    /// Replace the editable fields.
    pub fn update_fields(&self, fields: ContactFields) -> Result<(), SessionError> {
        self.with_session(|s| s.update_fields(fields))
    }

    /// Replace the transcript during review.
    pub fn update_transcript(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.with_session(|s| s.update_transcript(text))
    }

    /// Submit the reviewed visitor. On success the session is discarded and
    /// the persisted identifier is returned for the redirect; on failure
    /// the session stays in review for a retry.
    pub async fn submit(&self) -> Result<Option<Uuid>, SessionError> {
        let (generation, payload) = self.with_session(|s| s.begin_submission())?;
        self.emit(SessionEvent::LoadingChanged(true));

        let result = self
            .submitter
            .create_visitor(payload)
            .await
            .map_err(|e| e.to_string());

        let applied = self.with_session(|s| s.apply_submission(generation, result));
        self.emit(SessionEvent::LoadingChanged(false));

        match applied {
            Ok(Some(id)) => {
                self.emit(SessionEvent::Submitted(id));
                Ok(Some(id))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.emit(SessionEvent::ErrorRaised(e.to_string()));
                Err(e)
            }
        }
    }
}
