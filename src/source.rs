use std::path::Path;
use std::sync::Arc;

use crate::codec::MediaInfo;
use crate::error::{PipelineError, Result};

/// Container extension assumed when the caller gives none
const DEFAULT_CONTAINER: &str = "mp4";

/// One loop-generation request: the clip plus the desired output length
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    clip: Arc<Vec<u8>>,
    container: String,
    target_duration_minutes: f64,
}

impl ProcessingRequest {
    pub fn new(clip: impl Into<Vec<u8>>, target_duration_minutes: f64) -> Result<Self> {
        if !(target_duration_minutes.is_finite() && target_duration_minutes > 0.0) {
            return Err(PipelineError::InvalidRequest {
                details: format!("target duration must be positive, got {} minutes", target_duration_minutes),
            });
        }

        Ok(Self {
            clip: Arc::new(clip.into()),
            container: DEFAULT_CONTAINER.to_string(),
            target_duration_minutes,
        })
    }

    /// Read the clip from disk, keeping its extension as the container hint
    pub async fn from_path<P: AsRef<Path>>(path: P, target_duration_minutes: f64) -> Result<Self> {
        let path = path.as_ref();
        let clip = tokio::fs::read(path).await.map_err(|e| PipelineError::SourceUnreadable {
            reason: format!("{}: {}", path.display(), e),
        })?;

        let request = Self::new(clip, target_duration_minutes)?;
        Ok(match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => request.with_container(ext),
            None => request,
        })
    }

    pub fn with_container(mut self, extension: &str) -> Self {
        let extension: String = extension
            .trim_start_matches('.')
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        if !extension.is_empty() {
            self.container = extension.to_ascii_lowercase();
        }
        self
    }

    pub fn clip(&self) -> &Arc<Vec<u8>> {
        &self.clip
    }

    pub fn target_duration_minutes(&self) -> f64 {
        self.target_duration_minutes
    }

    pub fn target_seconds(&self) -> f64 {
        self.target_duration_minutes * 60.0
    }

    /// Base name the clip is staged under in scratch storage
    pub fn input_name(&self) -> String {
        format!("input.{}", self.container)
    }
}

/// The uploaded clip together with its probed metadata. Immutable.
#[derive(Debug, Clone)]
pub struct SourceVideo {
    bytes: Arc<Vec<u8>>,
    info: MediaInfo,
}

impl SourceVideo {
    pub fn new(bytes: Arc<Vec<u8>>, info: MediaInfo) -> Self {
        Self { bytes, info }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn duration(&self) -> f64 {
        self.info.duration
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn frame_rate(&self) -> Option<f64> {
        self.info.frame_rate
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    /// Average bytes per second of the source
    pub fn estimated_bitrate(&self) -> f64 {
        if self.info.duration > 0.0 {
            self.byte_size() as f64 / self.info.duration
        } else {
            0.0
        }
    }
}
