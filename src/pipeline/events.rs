use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

pub use crate::bridge::BridgeMode;

/// Named stages of a run, in the only order they may occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Analyzing,
    Interpolating,
    Generating,
    Finalizing,
    Complete,
}

impl Stage {
    /// Global progress band `[start, end]` owned by this stage
    pub fn band(self) -> (u8, u8) {
        match self {
            Self::Analyzing => (0, 5),
            Self::Interpolating => (5, 50),
            Self::Generating => (50, 80),
            Self::Finalizing => (80, 100),
            Self::Complete => (100, 100),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Analyzing => "analyzing",
            Self::Interpolating => "interpolating",
            Self::Generating => "generating",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
    Stage(Stage),
    Progress(u8),
    ModeChanged(BridgeMode),
}

/// Receives the events of one run, in order, on the run's task
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: PipelineEvent);
}

impl PipelineObserver for mpsc::UnboundedSender<PipelineEvent> {
    fn on_event(&self, event: PipelineEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.send(event);
    }
}

/// Discards every event
pub struct NullObserver;

impl PipelineObserver for NullObserver {
    fn on_event(&self, _event: PipelineEvent) {}
}

/// Adapts a closure into an observer
pub struct FnObserver<F>(pub F);

impl<F> PipelineObserver for FnObserver<F>
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    fn on_event(&self, event: PipelineEvent) {
        (self.0)(event)
    }
}

type Callback<T> = Box<dyn Fn(T) + Send + Sync>;

/// Separate stage / progress / mode callbacks, for callers that prefer them
/// over matching on [`PipelineEvent`]
#[derive(Default)]
pub struct Callbacks {
    on_stage: Option<Callback<Stage>>,
    on_progress: Option<Callback<u8>>,
    on_mode: Option<Callback<BridgeMode>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_stage(mut self, callback: impl Fn(Stage) + Send + Sync + 'static) -> Self {
        self.on_stage = Some(Box::new(callback));
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn on_mode_change(mut self, callback: impl Fn(BridgeMode) + Send + Sync + 'static) -> Self {
        self.on_mode = Some(Box::new(callback));
        self
    }
}

impl PipelineObserver for Callbacks {
    fn on_event(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Stage(stage) => {
                if let Some(callback) = &self.on_stage {
                    callback(stage);
                }
            }
            PipelineEvent::Progress(percent) => {
                if let Some(callback) = &self.on_progress {
                    callback(percent);
                }
            }
            PipelineEvent::ModeChanged(mode) => {
                if let Some(callback) = &self.on_mode {
                    callback(mode);
                }
            }
        }
    }
}
