//! Scripted stand-ins for the native transcoder and the inference runtime

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgb, RgbImage};
use ndarray::Array4;

use crate::codec::{CodecEngine, FfmpegRunner, MediaInfo};
use crate::config::ModelConfig;
use crate::error::{CodecError, ModelError, Result};
use crate::interpolation::{ComputeBackend, FrameInterpolator, InterpolationModel, ModelStore, SessionFactory};
use crate::pipeline::{EngineContext, PipelineEvent, PipelineObserver};

type CommandHook = Box<dyn Fn(&[String]) + Send + Sync>;

/// Fake ffmpeg: records every command and writes a plausible output file.
///
/// Still-frame outputs (`.png`) get a real PNG of `frame_size`; everything
/// else gets placeholder bytes. Probes answer with `source` unless a
/// per-name override matches.
pub struct ScriptedRunner {
    init_delay: Option<Duration>,
    fail_init: bool,
    progress_times: Vec<f64>,
    frame_size: (u32, u32),
    source: MediaInfo,
    probe_overrides: Vec<(String, MediaInfo)>,
    unreadable: Vec<String>,
    fail_when: Vec<String>,
    hook: Option<CommandHook>,
    commands: Mutex<Vec<Vec<String>>>,
    version_calls: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            init_delay: None,
            fail_init: false,
            progress_times: Vec::new(),
            frame_size: (64, 36),
            source: MediaInfo {
                duration: 10.0,
                width: 320,
                height: 180,
                codec: "h264".to_string(),
                frame_rate: Some(30.0),
            },
            probe_overrides: Vec::new(),
            unreadable: Vec::new(),
            fail_when: Vec::new(),
            hook: None,
            commands: Mutex::new(Vec::new()),
            version_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn with_progress_times(mut self, times: Vec<f64>) -> Self {
        self.progress_times = times;
        self
    }

    pub fn with_source(mut self, info: MediaInfo) -> Self {
        self.frame_size = (info.width.min(96), info.height.min(96));
        self.source = info;
        self
    }

    /// Probes of artifacts whose name contains `pattern` answer with `info`
    pub fn with_probe(mut self, pattern: &str, info: MediaInfo) -> Self {
        self.probe_overrides.push((pattern.to_string(), info));
        self
    }

    /// Probes of artifacts whose name contains `pattern` fail
    pub fn unreadable(mut self, pattern: &str) -> Self {
        self.unreadable.push(pattern.to_string());
        self
    }

    /// Commands containing `needle` in any argument exit with an error
    pub fn fail_when(mut self, needle: &str) -> Self {
        self.fail_when.push(needle.to_string());
        self
    }

    /// Called with the arguments of every command before it "runs"
    pub fn on_command(mut self, hook: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }

    /// Commands that had an argument containing `needle`
    pub fn commands_with(&self, needle: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|args| args.iter().any(|a| a.contains(needle)))
            .collect()
    }

    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    fn still_frame(&self) -> Vec<u8> {
        let (width, height) = self.frame_size;
        let frame = RgbImage::from_pixel(width, height, Rgb([90, 120, 150]));
        let mut bytes = Vec::new();
        frame
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }
}

#[async_trait]
impl FfmpegRunner for ScriptedRunner {
    async fn version(&self) -> Result<String> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_init {
            return Err(CodecError::EngineInit {
                reason: "scripted init failure".to_string(),
            }
            .into());
        }
        Ok("ffmpeg version scripted".to_string())
    }

    async fn transcode(&self, args: &[String], workdir: &Path, on_time: &mut (dyn FnMut(f64) + Send)) -> Result<()> {
        self.commands.lock().unwrap().push(args.to_vec());
        if let Some(hook) = &self.hook {
            hook(args);
        }

        if let Some(needle) = self.fail_when.iter().find(|n| args.iter().any(|a| a.contains(n.as_str()))) {
            return Err(CodecError::Transcode {
                command: args.join(" "),
                native_message: format!("scripted failure on {}", needle),
            }
            .into());
        }

        for time in &self.progress_times {
            on_time(*time);
        }

        if let Some(output) = args.last() {
            let bytes = if output.ends_with(".png") {
                self.still_frame()
            } else {
                format!("scripted output of {} args", args.len()).into_bytes()
            };
            tokio::fs::write(workdir.join(output), bytes).await?;
        }
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if self.unreadable.iter().any(|p| name.contains(p.as_str())) {
            return Err(CodecError::Probe {
                reason: format!("scripted unreadable {}", name),
            }
            .into());
        }
        if let Some((_, info)) = self.probe_overrides.iter().find(|(p, _)| name.contains(p.as_str())) {
            return Ok(info.clone());
        }
        Ok(self.source.clone())
    }
}

/// Linear cross-fade standing in for a learned interpolation model
struct BlendModel {
    fail: bool,
}

impl InterpolationModel for BlendModel {
    fn infer(&mut self, frame_a: &Array4<f32>, frame_b: &Array4<f32>, t: f32) -> Result<Array4<f32>> {
        if self.fail {
            return Err(ModelError::Inference {
                reason: "scripted inference failure".to_string(),
            }
            .into());
        }
        Ok(frame_a * (1.0 - t) + frame_b * t)
    }
}

/// Builds [`BlendModel`]s, optionally only on one backend
#[derive(Default)]
pub struct BlendFactory {
    only: Option<ComputeBackend>,
    fail_inference: bool,
    attempts: Mutex<Vec<ComputeBackend>>,
}

impl BlendFactory {
    pub fn only(backend: ComputeBackend) -> Self {
        Self {
            only: Some(backend),
            ..Self::default()
        }
    }

    /// Sessions build fine but every inference call fails
    pub fn failing_inference() -> Self {
        Self {
            fail_inference: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> Vec<ComputeBackend> {
        self.attempts.lock().unwrap().clone()
    }
}

impl SessionFactory for BlendFactory {
    fn is_available(&self) -> bool {
        true
    }

    fn build(&self, _weights: &[u8], backend: ComputeBackend) -> Result<Box<dyn InterpolationModel>> {
        self.attempts.lock().unwrap().push(backend);
        match self.only {
            Some(only) if only != backend => Err(ModelError::LoadFailed {
                reason: format!("{} not present", backend),
            }
            .into()),
            _ => Ok(Box::new(BlendModel {
                fail: self.fail_inference,
            })),
        }
    }
}

/// Claims availability but cannot bind any backend
pub struct FailingFactory;

impl SessionFactory for FailingFactory {
    fn is_available(&self) -> bool {
        true
    }

    fn build(&self, _weights: &[u8], backend: ComputeBackend) -> Result<Box<dyn InterpolationModel>> {
        Err(ModelError::LoadFailed {
            reason: format!("{} refused the model", backend),
        }
        .into())
    }
}

/// Collects every pipeline event in order
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Engine context over a scripted runner and a pre-seeded model cache
pub async fn scripted_context(
    runner: Arc<ScriptedRunner>,
    factory: Arc<dyn SessionFactory>,
    cache_dir: &Path,
) -> EngineContext {
    let model = ModelConfig {
        cache_dir: Some(cache_dir.to_path_buf()),
        ..ModelConfig::default()
    };
    let store = ModelStore::new(&model);
    store.store(b"fake-weights").await.unwrap();

    EngineContext::new(
        Arc::new(CodecEngine::new(runner)),
        Arc::new(FrameInterpolator::new(store, factory, true, 32)),
    )
}
