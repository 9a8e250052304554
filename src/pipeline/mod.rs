//! # Pipeline Orchestration
//!
//! Drives a run through its fixed stage order, chooses between the AI and
//! crossfade bridge, and folds every sub-operation's progress into one
//! monotonic 0-100 scale delivered as [`PipelineEvent`]s.

pub mod events;
pub mod orchestrator;
pub mod progress;

pub use events::{BridgeMode, Callbacks, FnObserver, NullObserver, PipelineEvent, PipelineObserver, Stage};
pub use orchestrator::{EngineContext, Orchestrator, RunHandle, RunOutcome, RunOutput};
pub use progress::ProgressTracker;
