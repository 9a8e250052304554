use thiserror::Error;

/// Main error type for the seamloop pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source video is unreadable: {reason}")]
    SourceUnreadable { reason: String },

    #[error("Codec engine error: {0}")]
    Codec(#[from] CodecError),

    #[error("Interpolation model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("A run is already active on this orchestrator")]
    RunInProgress,

    #[error("Invalid processing request: {details}")]
    InvalidRequest { details: String },

    /// Internal unwinding signal; the orchestrator turns it into
    /// [`RunOutcome::Cancelled`](crate::pipeline::RunOutcome::Cancelled).
    #[error("Run was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Codec engine (ffmpeg / ffprobe) errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Codec engine failed to initialize: {reason}")]
    EngineInit { reason: String },

    #[error("Transcode failed: `{command}`: {native_message}")]
    Transcode {
        command: String,
        native_message: String,
    },

    #[error("Scratch artifact not found: {name}")]
    NotFound { name: String },

    #[error("Media probe failed: {reason}")]
    Probe { reason: String },
}

/// Frame-interpolation model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model download from {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Model failed to load: {reason}")]
    LoadFailed { reason: String },

    #[error("Inference failed: {reason}")]
    Inference { reason: String },

    #[error("No inference backend is available")]
    NoBackend,
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Coarse classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SourceUnreadable,
    EngineInit,
    ModelLoad,
    Transcode,
    Other,
}

/// Convenience type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnreadable { .. } => ErrorKind::SourceUnreadable,
            Self::Codec(CodecError::EngineInit { .. }) => ErrorKind::EngineInit,
            Self::Codec(CodecError::Transcode { .. }) => ErrorKind::Transcode,
            Self::Model(_) => ErrorKind::ModelLoad,
            _ => ErrorKind::Other,
        }
    }

    /// Check if the orchestrator may recover from this error by switching
    /// the bridge to fallback mode
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Nothing to recover once the caller asked us to stop
            Self::Cancelled => false,
            // Without a codec engine neither mode can produce a bridge
            Self::Codec(CodecError::EngineInit { .. }) => false,
            Self::SourceUnreadable { .. } => false,
            _ => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::SourceUnreadable { .. } => {
                "The video could not be read. Please check it is a valid, non-empty video file.".to_string()
            }
            Self::Codec(CodecError::EngineInit { .. }) => {
                "The video engine could not be started. Please check that FFmpeg is installed.".to_string()
            }
            Self::Codec(CodecError::Transcode { .. }) => {
                "Video processing failed. Please try again, or try a different clip.".to_string()
            }
            Self::RunInProgress => {
                "Another loop is still being generated. Wait for it to finish or cancel it first.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
