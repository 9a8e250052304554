//! # Codec Engine
//!
//! Wraps the native transcoder (ffmpeg/ffprobe) behind a lazily-initialized
//! engine that owns a private scratch directory. Higher layers only stage
//! buffers, run commands, read results and remove artifacts.

pub mod encode;
pub mod engine;
pub mod ffmpeg;
pub mod probe;
pub mod scope;

pub use encode::EncodeSettings;
pub use engine::{scale_percent, CodecEngine, EngineHandle};
pub use ffmpeg::{to_args, FfmpegCli, FfmpegRunner};
pub use probe::MediaInfo;
pub use scope::RunScope;
