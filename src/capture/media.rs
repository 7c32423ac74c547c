//! Capture device seams.
//!
//! The camera and microphone are collaborators outside this crate (browser
//! media streams, OS capture APIs). The traits here are the boundary the
//! session driver talks to; the file-backed implementations feed the CLI
//! `scan` command and the tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::AudioClip;
use crate::extraction::MediaPayload;

/// Errors from acquiring or operating a capture device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// A still-frame source (the booth camera).
#[async_trait]
pub trait Camera: Send + Sync {
    /// Acquire the device and begin streaming.
    async fn start(&self) -> Result<(), DeviceError>;

    /// Snapshot the current frame. The stream stops once a frame is taken.
    async fn capture(&self) -> Result<MediaPayload, DeviceError>;

    /// Stop the stream without capturing (retake, abandon).
    async fn stop(&self);
}

/// An audio source (the booth microphone).
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Acquire the device and start recording.
    async fn start(&self) -> Result<(), DeviceError>;

    /// Stop recording and finalize the clip.
    async fn stop(&self) -> Result<AudioClip, DeviceError>;
}

fn image_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

fn audio_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        _ => "audio/webm",
    }
}

/// Camera backed by an image file on disk.
pub struct FileCamera {
    path: PathBuf,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn start(&self) -> Result<(), DeviceError> {
        if !self.path.exists() {
            return Err(DeviceError::Unavailable(format!(
                "image not found: {}",
                self.path.display()
            )));
        }
        Ok(())
    }

    async fn capture(&self) -> Result<MediaPayload, DeviceError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| DeviceError::Unavailable(format!("{}: {}", self.path.display(), e)))?;

        Ok(MediaPayload::new(image_mime(&self.path), data))
    }

    async fn stop(&self) {}
}

/// Microphone backed by an audio file on disk.
pub struct FileMicrophone {
    path: PathBuf,
}

impl FileMicrophone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Microphone for FileMicrophone {
    async fn start(&self) -> Result<(), DeviceError> {
        if !self.path.exists() {
            return Err(DeviceError::Unavailable(format!(
                "audio not found: {}",
                self.path.display()
            )));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<AudioClip, DeviceError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| DeviceError::Unavailable(format!("{}: {}", self.path.display(), e)))?;

        Ok(AudioClip {
            mime_type: audio_mime(&self.path).to_string(),
            data,
        })
    }
}
