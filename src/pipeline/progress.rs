use tracing::warn;

use crate::pipeline::events::{BridgeMode, PipelineEvent, PipelineObserver, Stage};

/// Maps stage-local progress onto the global 0-100 scale.
///
/// Emitted percentages never decrease and stages only move forward; anything
/// else is dropped before it reaches the observer.
pub struct ProgressTracker<'a> {
    observer: &'a dyn PipelineObserver,
    stage: Option<Stage>,
    last_percent: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn PipelineObserver) -> Self {
        Self {
            observer,
            stage: None,
            last_percent: None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last_percent
    }

    /// Move to `stage` and report its start; returns false for out-of-order stages
    pub fn enter(&mut self, stage: Stage) -> bool {
        if self.stage.map_or(false, |current| stage <= current) {
            warn!("Ignoring out-of-order stage {} after {:?}", stage, self.stage);
            return false;
        }

        self.stage = Some(stage);
        self.observer.on_event(PipelineEvent::Stage(stage));
        self.report(0);
        true
    }

    /// Report progress `local` (0-100) within the current stage
    pub fn report(&mut self, local: u8) {
        let Some(stage) = self.stage else {
            return;
        };

        let (start, end) = stage.band();
        let global = start + ((end - start) as u32 * local.min(100) as u32 / 100) as u8;
        if self.last_percent.map_or(true, |last| global > last) {
            self.last_percent = Some(global);
            self.observer.on_event(PipelineEvent::Progress(global));
        }
    }

    pub fn mode_changed(&mut self, mode: BridgeMode) {
        self.observer.on_event(PipelineEvent::ModeChanged(mode));
    }

    pub fn complete(&mut self) {
        self.enter(Stage::Complete);
    }
}
