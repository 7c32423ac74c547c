//! Capture session state machine.
//!
//! One session tracks a single visitor-scan-to-submission cycle. State is a
//! tagged variant per workflow step so that combinations like "transcript
//! set while still capturing" are unrepresentable. All transitions here are
//! pure and synchronous; the driver owns the devices and the network.
//!
//! Network responses are applied through `apply_*` methods that compare the
//! generation token captured at request time against the session's current
//! one. A retake bumps the token, so a late answer meant for the superseded
//! session is discarded instead of clobbering the new one.

use uuid::Uuid;

use crate::domain::{AudioClip, ContactFields, NewVisitor};
use crate::extraction::{ExtractionError, MediaPayload};

/// Workflow step, ordered and forward-advancing except for retake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Capture,
    Record,
    Review,
}

/// Session state; each variant carries only the fields valid in that step.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Waiting for (or holding) a captured still frame.
    Capturing { frame: Option<MediaPayload> },

    /// Fields extracted; conversation being recorded.
    Recording {
        frame: MediaPayload,
        fields: ContactFields,
        recording: bool,
        clip: Option<AudioClip>,
    },

    /// Everything on screen for review and submission.
    Reviewing {
        frame: MediaPayload,
        fields: ContactFields,
        clip: Option<AudioClip>,
        transcript: String,
    },
}

/// Errors surfaced by session transitions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("camera or microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture device unavailable: {0}")]
    Device(String),

    #[error("another request is already in flight")]
    Busy,

    #[error("action '{action}' is not valid during {step:?}")]
    InvalidAction { step: Step, action: &'static str },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("submission failed: {0}")]
    Submission(String),
}

/// Whether an async response landed on the session that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The session was superseded (retake/reset) while the call was in
    /// flight; the response was discarded.
    Stale,
}

/// Client-resident, ephemeral workflow state for one capture cycle.
#[derive(Debug)]
pub struct CaptureSession {
    state: SessionState,
    generation: u64,
    busy: bool,
    error: Option<String>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Capturing { frame: None },
            generation: 0,
            busy: false,
            error: None,
        }
    }

    pub fn step(&self) -> Step {
        match self.state {
            SessionState::Capturing { .. } => Step::Capture,
            SessionState::Recording { .. } => Step::Record,
            SessionState::Reviewing { .. } => Step::Review,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidAction {
            step: self.step(),
            action,
        }
    }

    /// Store a captured still frame. The camera stream is expected to have
    /// stopped; re-capturing replaces the previous frame.
    pub fn frame_captured(&mut self, frame: MediaPayload) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Capturing { frame: slot } => {
                *slot = Some(frame);
                self.error = None;
                Ok(())
            }
            _ => Err(self.invalid("capture photo")),
        }
    }

    /// Back to an empty capture step. Only valid before review; bumps the
    /// generation so any in-flight response is discarded on arrival.
    pub fn retake(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Capturing { .. } | SessionState::Recording { .. } => {
                self.state = SessionState::Capturing { frame: None };
                self.generation += 1;
                self.busy = false;
                self.error = None;
                Ok(())
            }
            SessionState::Reviewing { .. } => Err(self.invalid("retake")),
        }
    }

    /// Gate and snapshot inputs for the field-extraction call.
    pub fn begin_extraction(&mut self) -> Result<(u64, MediaPayload), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        match &self.state {
            SessionState::Capturing { frame: Some(frame) } => {
                self.busy = true;
                self.error = None;
                Ok((self.generation, frame.clone()))
            }
            _ => Err(self.invalid("extract fields")),
        }
    }

    /// Apply the field-extraction result.
    ///
    /// Success advances to the recording step; failure keeps the captured
    /// frame so extraction can be retried without re-shooting the card.
    pub fn apply_extraction(
        &mut self,
        generation: u64,
        result: Result<ContactFields, ExtractionError>,
    ) -> Result<ApplyOutcome, SessionError> {
        if generation != self.generation {
            return Ok(ApplyOutcome::Stale);
        }
        self.busy = false;

        match result {
            Ok(fields) => {
                let frame = match std::mem::replace(
                    &mut self.state,
                    SessionState::Capturing { frame: None },
                ) {
                    SessionState::Capturing { frame: Some(frame) } => frame,
                    other => {
                        self.state = other;
                        return Err(self.invalid("apply extraction"));
                    }
                };
                self.state = SessionState::Recording {
                    frame,
                    fields,
                    recording: false,
                    clip: None,
                };
                self.error = None;
                Ok(ApplyOutcome::Applied)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Mark the microphone as live.
    pub fn recording_started(&mut self) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Recording { recording, .. } => {
                *recording = true;
                Ok(())
            }
            _ => Err(self.invalid("start recording")),
        }
    }

    /// Store the finalized clip once the microphone stops.
    pub fn recording_stopped(&mut self, clip: AudioClip) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Recording {
                recording,
                clip: slot,
                ..
            } if *recording => {
                *recording = false;
                *slot = Some(clip);
                Ok(())
            }
            _ => Err(self.invalid("stop recording")),
        }
    }

    /// Gate and snapshot inputs for the transcription call.
    pub fn begin_transcription(
        &mut self,
    ) -> Result<(u64, AudioClip, ContactFields), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        match &self.state {
            SessionState::Recording {
                clip: Some(clip),
                fields,
                recording: false,
                ..
            } => {
                self.busy = true;
                Ok((self.generation, clip.clone(), fields.clone()))
            }
            _ => Err(self.invalid("transcribe")),
        }
    }

    /// Apply the transcription result.
    ///
    /// Success and failure both advance to review: a failed transcription
    /// records the error and leaves the transcript empty for manual entry.
    /// A fabricated placeholder conversation from the service is a normal
    /// success, not a distinct state.
    pub fn apply_transcription(
        &mut self,
        generation: u64,
        result: Result<String, ExtractionError>,
    ) -> Result<ApplyOutcome, SessionError> {
        if generation != self.generation {
            return Ok(ApplyOutcome::Stale);
        }
        self.busy = false;

        let (frame, fields, clip) = match std::mem::replace(
            &mut self.state,
            SessionState::Capturing { frame: None },
        ) {
            SessionState::Recording {
                frame,
                fields,
                clip,
                ..
            } => (frame, fields, clip),
            other => {
                self.state = other;
                return Err(self.invalid("apply transcription"));
            }
        };

        let transcript = match result {
            Ok(text) => {
                self.error = None;
                text.trim().to_string()
            }
            Err(e) => {
                self.error = Some(e.to_string());
                String::new()
            }
        };

        self.state = SessionState::Reviewing {
            frame,
            fields,
            clip,
            transcript,
        };
        Ok(ApplyOutcome::Applied)
    }

    /// Replace the editable fields. Valid once extraction has populated them.
    pub fn update_fields(&mut self, updated: ContactFields) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Recording { fields, .. } | SessionState::Reviewing { fields, .. } => {
                *fields = updated;
                Ok(())
            }
            _ => Err(self.invalid("edit fields")),
        }
    }

    /// Replace the transcript text during review.
    pub fn update_transcript(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Reviewing { transcript, .. } => {
                *transcript = text.into();
                Ok(())
            }
            _ => Err(self.invalid("edit transcript")),
        }
    }

    /// Gate and package the submission payload.
    pub fn begin_submission(&mut self) -> Result<(u64, NewVisitor), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        match &self.state {
            SessionState::Reviewing {
                fields,
                clip,
                transcript,
                ..
            } => {
                self.busy = true;
                self.error = None;
                let payload = NewVisitor {
                    fields: fields.clone(),
                    transcript: if transcript.trim().is_empty() {
                        None
                    } else {
                        Some(transcript.clone())
                    },
                    audio: clip.clone(),
                };
                Ok((self.generation, payload))
            }
            _ => Err(self.invalid("submit")),
        }
    }

    /// Apply the submission result.
    ///
    /// Success discards the session (a fresh capture cycle begins) and
    /// yields the persisted identifier; failure keeps the review state for
    /// another attempt.
    pub fn apply_submission(
        &mut self,
        generation: u64,
        result: Result<Uuid, String>,
    ) -> Result<Option<Uuid>, SessionError> {
        if generation != self.generation {
            return Ok(None);
        }
        self.busy = false;

        match result {
            Ok(id) => {
                self.state = SessionState::Capturing { frame: None };
                self.generation += 1;
                self.error = None;
                Ok(Some(id))
            }
            Err(message) => {
                self.error = Some(message.clone());
                Err(SessionError::Submission(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::DecodeError;

    fn frame() -> MediaPayload {
        MediaPayload::new("image/jpeg", vec![0xff, 0xd8, 0xff])
    }

    fn clip() -> AudioClip {
        AudioClip {
            mime_type: "audio/webm".to_string(),
            data: vec![1, 2, 3],
        }
    }

    fn fields() -> ContactFields {
        ContactFields {
            name: "Ava Carter".to_string(),
            position: "CTO".to_string(),
            email: "ava@skyline.test".to_string(),
            phone: "555-0100".to_string(),
            company: "Skyline".to_string(),
            domain: "skyline.test".to_string(),
        }
    }

    fn decode_failure() -> ExtractionError {
        ExtractionError::Decode(DecodeError::NoObject)
    }

    /// Walk a session through to recording, ready to transcribe.
    fn session_at_record() -> CaptureSession {
        let mut session = CaptureSession::new();
        session.frame_captured(frame()).unwrap();
        let (gen, _) = session.begin_extraction().unwrap();
        session.apply_extraction(gen, Ok(fields())).unwrap();
        session.recording_started().unwrap();
        session.recording_stopped(clip()).unwrap();
        session
    }

    fn session_at_review() -> CaptureSession {
        let mut session = session_at_record();
        let (gen, _, _) = session.begin_transcription().unwrap();
        session
            .apply_transcription(gen, Ok("Discussed pricing for 200 seats.".to_string()))
            .unwrap();
        session
    }

    #[test]
    fn happy_path_reaches_review() {
        let session = session_at_review();
        assert_eq!(session.step(), Step::Review);
        assert!(!session.is_busy());
        assert!(session.error().is_none());

        match session.state() {
            SessionState::Reviewing {
                fields, transcript, ..
            } => {
                assert_eq!(fields.name, "Ava Carter");
                assert_eq!(transcript, "Discussed pricing for 200 seats.");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn extraction_requires_a_captured_frame() {
        let mut session = CaptureSession::new();
        let err = session.begin_extraction().unwrap_err();
        assert!(matches!(err, SessionError::InvalidAction { .. }));
    }

    #[test]
    fn extraction_failure_keeps_frame_and_is_retryable() {
        let mut session = CaptureSession::new();
        session.frame_captured(frame()).unwrap();

        let (gen, _) = session.begin_extraction().unwrap();
        let err = session.apply_extraction(gen, Err(decode_failure())).unwrap_err();
        assert!(matches!(err, SessionError::Extraction(_)));

        // Still in capture, frame retained, error visible, no longer busy
        assert_eq!(session.step(), Step::Capture);
        assert!(session.error().is_some());
        assert!(!session.is_busy());
        assert!(matches!(
            session.state(),
            SessionState::Capturing { frame: Some(_) }
        ));

        // Retry without re-capturing
        let (gen, _) = session.begin_extraction().unwrap();
        session.apply_extraction(gen, Ok(fields())).unwrap();
        assert_eq!(session.step(), Step::Record);
    }

    #[test]
    fn busy_gate_rejects_second_call() {
        let mut session = CaptureSession::new();
        session.frame_captured(frame()).unwrap();

        session.begin_extraction().unwrap();
        let err = session.begin_extraction().unwrap_err();
        assert!(matches!(err, SessionError::Busy));
    }

    #[test]
    fn stale_extraction_response_is_discarded() {
        let mut session = CaptureSession::new();
        session.frame_captured(frame()).unwrap();
        let (old_gen, _) = session.begin_extraction().unwrap();

        // User retakes while the call is in flight
        session.retake().unwrap();
        assert_eq!(session.step(), Step::Capture);

        let outcome = session.apply_extraction(old_gen, Ok(fields())).unwrap();
        assert_eq!(outcome, ApplyOutcome::Stale);

        // The superseding session is untouched: still empty capture state
        assert!(matches!(
            session.state(),
            SessionState::Capturing { frame: None }
        ));
        assert!(!session.is_busy());
    }

    #[test]
    fn stale_transcription_response_is_discarded() {
        let mut session = session_at_record();
        let (old_gen, _, _) = session.begin_transcription().unwrap();

        session.retake().unwrap();

        let outcome = session
            .apply_transcription(old_gen, Ok("late text".to_string()))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Stale);
        assert_eq!(session.step(), Step::Capture);
    }

    #[test]
    fn transcription_failure_still_reaches_review() {
        let mut session = session_at_record();
        let (gen, _, _) = session.begin_transcription().unwrap();

        let outcome = session
            .apply_transcription(gen, Err(decode_failure()))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(session.step(), Step::Review);
        assert!(session.error().is_some());

        // Transcript can be entered manually
        session.update_transcript("typed by hand").unwrap();
        match session.state() {
            SessionState::Reviewing { transcript, .. } => assert_eq!(transcript, "typed by hand"),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn transcript_is_trimmed_on_success() {
        let mut session = session_at_record();
        let (gen, _, _) = session.begin_transcription().unwrap();
        session
            .apply_transcription(gen, Ok("  some text \n".to_string()))
            .unwrap();

        match session.state() {
            SessionState::Reviewing { transcript, .. } => assert_eq!(transcript, "some text"),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn retake_from_record_goes_back_to_capture() {
        let mut session = session_at_record();
        let before = session.generation();

        session.retake().unwrap();
        assert_eq!(session.step(), Step::Capture);
        assert_eq!(session.generation(), before + 1);
    }

    #[test]
    fn retake_is_not_allowed_during_review() {
        let mut session = session_at_review();
        let err = session.retake().unwrap_err();
        assert!(matches!(err, SessionError::InvalidAction { .. }));
    }

    #[test]
    fn editing_is_confined_to_later_steps() {
        let mut session = CaptureSession::new();
        assert!(session.update_fields(fields()).is_err());
        assert!(session.update_transcript("nope").is_err());

        let mut session = session_at_review();
        let mut edited = fields();
        edited.email = "new@skyline.test".to_string();
        session.update_fields(edited).unwrap();
        session.update_transcript("edited transcript").unwrap();
    }

    #[test]
    fn submission_packages_fields_transcript_and_audio() {
        let mut session = session_at_review();
        let (gen, payload) = session.begin_submission().unwrap();

        assert_eq!(payload.fields.name, "Ava Carter");
        assert_eq!(
            payload.transcript.as_deref(),
            Some("Discussed pricing for 200 seats.")
        );
        assert!(payload.audio.is_some());

        let id = Uuid::new_v4();
        let returned = session.apply_submission(gen, Ok(id)).unwrap();
        assert_eq!(returned, Some(id));

        // Session is discarded: a fresh capture cycle begins
        assert_eq!(session.step(), Step::Capture);
        assert!(matches!(
            session.state(),
            SessionState::Capturing { frame: None }
        ));
    }

    #[test]
    fn submission_failure_stays_in_review_for_retry() {
        let mut session = session_at_review();
        let (gen, _) = session.begin_submission().unwrap();

        let err = session
            .apply_submission(gen, Err("server unavailable".to_string()))
            .unwrap_err();
        assert!(matches!(err, SessionError::Submission(_)));
        assert_eq!(session.step(), Step::Review);
        assert!(session.error().is_some());

        // Retry is possible
        let (gen, _) = session.begin_submission().unwrap();
        session.apply_submission(gen, Ok(Uuid::new_v4())).unwrap();
    }

    #[test]
    fn empty_transcript_submits_as_absent() {
        let mut session = session_at_record();
        let (gen, _, _) = session.begin_transcription().unwrap();
        session.apply_transcription(gen, Err(decode_failure())).unwrap();

        let (_, payload) = session.begin_submission().unwrap();
        assert!(payload.transcript.is_none());
    }
}
