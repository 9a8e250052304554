use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::engine::CodecEngine;
use crate::codec::probe::MediaInfo;
use crate::error::{PipelineError, Result};

/// One run's view of the codec engine.
///
/// Namespaces scratch artifacts per run, remembers every artifact it hands
/// out so they can all be removed on exit, and polls the run's cancellation
/// token before and after each native invocation.
pub struct RunScope {
    engine: Arc<CodecEngine>,
    token: CancellationToken,
    prefix: String,
    artifacts: Mutex<Vec<String>>,
}

impl RunScope {
    pub fn new(engine: Arc<CodecEngine>, token: CancellationToken) -> Self {
        let prefix = format!("run{}_", engine.next_run_id());
        Self {
            engine,
            token,
            prefix,
            artifacts: Mutex::new(Vec::new()),
        }
    }

    pub fn engine(&self) -> &Arc<CodecEngine> {
        &self.engine
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail with [`PipelineError::Cancelled`] once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run-unique name for `base` without reserving it, e.g. for `%03d` patterns
    pub fn scoped_name(&self, base: &str) -> String {
        format!("{}{}", self.prefix, base)
    }

    /// Reserve a run-unique artifact name and track it for cleanup
    pub fn artifact(&self, base: &str) -> String {
        let name = self.scoped_name(base);
        let mut artifacts = self.artifacts.lock().unwrap_or_else(|e| e.into_inner());
        if !artifacts.contains(&name) {
            artifacts.push(name.clone());
        }
        name
    }

    /// Snapshot of every artifact reserved so far
    pub fn artifacts(&self) -> Vec<String> {
        self.artifacts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn stage(&self, base: &str, bytes: &[u8]) -> Result<String> {
        self.check()?;
        let name = self.artifact(base);
        self.engine.stage(&name, bytes).await?;
        Ok(name)
    }

    pub async fn exec(
        &self,
        args: Vec<String>,
        expected_duration: Option<f64>,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<()> {
        self.check()?;
        self.engine.run(&args, expected_duration, progress).await?;
        self.check()
    }

    pub async fn probe(&self, name: &str) -> Result<MediaInfo> {
        self.check()?;
        self.engine.probe(name).await
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.engine.read(name).await
    }

    /// Remove a subset of this run's artifacts (e.g. abandoned partial work)
    pub async fn discard(&self, names: &[String]) {
        for name in names {
            self.engine.remove(name).await;
        }
        let mut artifacts = self.artifacts.lock().unwrap_or_else(|e| e.into_inner());
        artifacts.retain(|a| !names.contains(a));
    }

    /// Best-effort removal of everything this run created
    pub async fn cleanup(&self) {
        let names = std::mem::take(&mut *self.artifacts.lock().unwrap_or_else(|e| e.into_inner()));
        debug!("Cleaning up {} scratch artifacts", names.len());
        for name in &names {
            self.engine.remove(name).await;
        }
    }
}
