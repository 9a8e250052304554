use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::codec::ffmpeg::FfmpegRunner;
use crate::codec::probe::MediaInfo;
use crate::error::{CodecError, Result};

/// An initialized codec engine: runtime version plus its private scratch directory
#[derive(Debug, Clone)]
pub struct EngineHandle {
    version: Arc<str>,
    scratch: Arc<TempDir>,
}

impl EngineHandle {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

/// Lazily-initialized transcoding engine over a private scratch filesystem.
///
/// Initialization happens once per engine; concurrent `ensure_ready` callers
/// await the same attempt. Native invocations are serialized.
pub struct CodecEngine {
    runner: Arc<dyn FfmpegRunner>,
    ready: OnceCell<EngineHandle>,
    invoke_lock: Mutex<()>,
    run_counter: AtomicU64,
}

impl CodecEngine {
    pub fn new(runner: Arc<dyn FfmpegRunner>) -> Self {
        Self {
            runner,
            ready: OnceCell::new(),
            invoke_lock: Mutex::new(()),
            run_counter: AtomicU64::new(0),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Initialize the engine if needed, reporting 0-100
    pub async fn ensure_ready(&self, progress: &mut (dyn FnMut(u8) + Send)) -> Result<EngineHandle> {
        if let Some(handle) = self.ready.get() {
            progress(100);
            return Ok(handle.clone());
        }

        let init = async {
            progress(0);
            let version = self.runner.version().await?;
            progress(50);

            let scratch = tempfile::Builder::new()
                .prefix("seamloop-scratch-")
                .tempdir()
                .map_err(|e| CodecError::EngineInit {
                    reason: format!("could not create scratch directory: {}", e),
                })?;

            info!("Codec engine ready: {} (scratch: {:?})", version, scratch.path());
            Ok::<_, crate::error::PipelineError>(EngineHandle {
                version: Arc::from(version.as_str()),
                scratch: Arc::new(scratch),
            })
        };

        let handle = self.ready.get_or_try_init(|| init).await?.clone();
        progress(100);
        Ok(handle)
    }

    fn handle(&self) -> Result<&EngineHandle> {
        self.ready.get().ok_or_else(|| {
            CodecError::EngineInit {
                reason: "engine used before ensure_ready".to_string(),
            }
            .into()
        })
    }

    /// Allocate a fresh run id for namespacing scratch artifacts
    pub fn next_run_id(&self) -> u64 {
        self.run_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn artifact_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.handle()?.scratch_dir().join(name))
    }

    /// Write `bytes` into scratch storage under `name`
    pub async fn stage(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.artifact_path(name)?;
        tokio::fs::write(&path, bytes).await?;
        debug!("Staged {} ({} bytes)", name, bytes.len());
        Ok(())
    }

    /// Execute one native invocation; `expected_duration` scales progress to 0-100
    pub async fn run(
        &self,
        args: &[String],
        expected_duration: Option<f64>,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<()> {
        let handle = self.handle()?.clone();
        let _guard = self.invoke_lock.lock().await;

        debug!("ffmpeg {}", args.join(" "));
        let mut on_time = |seconds: f64| {
            if let Some(total) = expected_duration.filter(|t| *t > 0.0) {
                progress(percent_of(seconds, total));
            }
        };
        self.runner.transcode(args, handle.scratch_dir(), &mut on_time).await?;
        progress(100);
        Ok(())
    }

    /// Probe a scratch artifact
    pub async fn probe(&self, name: &str) -> Result<MediaInfo> {
        let path = self.artifact_path(name)?;
        let _guard = self.invoke_lock.lock().await;
        self.runner.probe(&path).await
    }

    /// Read a finished artifact out of scratch storage
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.artifact_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CodecError::NotFound {
                name: name.to_string(),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.artifact_path(name) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Delete a scratch artifact; failures are logged and swallowed
    pub async fn remove(&self, name: &str) {
        let Ok(path) = self.artifact_path(name) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed scratch artifact {}", name),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove scratch artifact {}: {}", name, e),
        }
    }
}

/// Map a 0-100 sub-progress into `from..=to`
pub fn scale_percent(percent: u8, from: u8, to: u8) -> u8 {
    from + ((to.saturating_sub(from)) as u32 * percent.min(100) as u32 / 100) as u8
}

fn percent_of(value: f64, total: f64) -> u8 {
    ((value / total) * 100.0).clamp(0.0, 100.0) as u8
}
