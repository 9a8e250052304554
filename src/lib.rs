//! # Seamloop
//!
//! Turn a short clip into a long, seamlessly looping video.
//!
//! A run synthesizes a transition ("bridge") from the clip's last frame back
//! to its first, joins it to the clip's main body to form one loop unit, and
//! repeats that unit to the requested length with a stream copy.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seamloop::{Config, EngineContext, NullObserver, Orchestrator, ProcessingRequest, RunOutcome};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let orchestrator = Orchestrator::new(config.clone(), EngineContext::from_config(&config));
//!
//! let request = ProcessingRequest::from_path("clip.mp4", 10.0).await?;
//! if let RunOutcome::Completed(output) = orchestrator
//!     .run(request, &NullObserver, CancellationToken::new())
//!     .await?
//! {
//!     output.write_to("loop.mp4").await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`codec`] - ffmpeg-backed engine over a private scratch directory
//! - [`interpolation`] - cached model weights and neural in-betweening
//! - [`bridge`] - AI and crossfade bridge synthesis
//! - [`assembly`] - loop unit construction, compression policy, expansion
//! - [`pipeline`] - stage machine, progress and cancellation
//! - [`config`] - Configuration management

pub mod assembly;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod interpolation;
pub mod pipeline;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use crate::{
    bridge::BridgeMode,
    config::Config,
    error::{ErrorKind, PipelineError, Result},
    pipeline::{
        Callbacks, EngineContext, NullObserver, Orchestrator, PipelineEvent, PipelineObserver, RunHandle,
        RunOutcome, RunOutput, Stage,
    },
    source::{ProcessingRequest, SourceVideo},
};
