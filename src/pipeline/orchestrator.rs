use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembly::LoopAssembler;
use crate::bridge::{BridgeClip, BridgeMode, BridgeSynthesizer};
use crate::codec::{scale_percent, CodecEngine, EncodeSettings, FfmpegCli, RunScope};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::interpolation::{default_factory, FrameInterpolator, ModelStore};
use crate::pipeline::events::{PipelineObserver, Stage};
use crate::pipeline::progress::ProgressTracker;
use crate::source::{ProcessingRequest, SourceVideo};

/// Long-lived engines shared by every run of an orchestrator
#[derive(Clone)]
pub struct EngineContext {
    pub codec: Arc<CodecEngine>,
    pub interpolator: Arc<FrameInterpolator>,
}

impl EngineContext {
    pub fn new(codec: Arc<CodecEngine>, interpolator: Arc<FrameInterpolator>) -> Self {
        Self { codec, interpolator }
    }

    /// ffmpeg executables plus the interpolation backend compiled into this build
    pub fn from_config(config: &Config) -> Self {
        let codec = CodecEngine::new(Arc::new(FfmpegCli::new(&config.engine)));
        let interpolator = FrameInterpolator::new(
            ModelStore::new(&config.model),
            default_factory(&config.model),
            config.model.enabled,
            config.bridge.alignment,
        );
        Self::new(Arc::new(codec), Arc::new(interpolator))
    }
}

/// The finished loop
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub bytes: Vec<u8>,
    pub duration_secs: f64,
    pub unit_duration_secs: f64,
    pub repeat_count: u32,
    pub mode: BridgeMode,
    pub compressed: bool,
}

impl RunOutput {
    pub async fn write_to<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        tokio::fs::write(path, &self.bytes).await?;
        Ok(())
    }
}

/// How a run ended, when it did not fail
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunOutput),
    Cancelled,
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn output(self) -> Option<RunOutput> {
        match self {
            Self::Completed(output) => Some(output),
            Self::Cancelled => None,
        }
    }
}

/// A run executing on its own task
pub struct RunHandle {
    id: u64,
    token: CancellationToken,
    task: JoinHandle<Result<RunOutcome>>,
}

impl RunHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request cooperative cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(self) -> Result<RunOutcome> {
        self.task
            .await
            .map_err(|e| PipelineError::generic(format!("run task failed: {}", e)))?
    }
}

/// Releases the single active-run slot when dropped
struct ActiveRun {
    flag: Arc<AtomicBool>,
}

impl ActiveRun {
    fn claim(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::RunInProgress)?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives one loop-generation run at a time through
/// Analyzing → Interpolating → Generating → Finalizing → Complete.
///
/// A second run started while one is active is rejected with
/// [`PipelineError::RunInProgress`].
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    context: EngineContext,
    synthesizer: BridgeSynthesizer,
    assembler: LoopAssembler,
    active: Arc<AtomicBool>,
    run_ids: AtomicU64,
}

/// What Analyzing hands to the later stages
struct Analysis {
    source: SourceVideo,
    input: String,
    encode: EncodeSettings,
}

impl Orchestrator {
    pub fn new(config: Config, context: EngineContext) -> Self {
        let synthesizer = BridgeSynthesizer::new(config.bridge.clone(), context.interpolator.clone());
        let assembler = LoopAssembler::new(config.output.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                context,
                synthesizer,
                assembler,
                active: Arc::new(AtomicBool::new(false)),
                run_ids: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Whether runs will start in AI mode. Does not touch engine state.
    pub fn is_ai_backend_available(&self) -> bool {
        self.inner.context.interpolator.is_available()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Execute a run on the current task
    pub async fn run(
        &self,
        request: ProcessingRequest,
        observer: &dyn PipelineObserver,
        token: CancellationToken,
    ) -> Result<RunOutcome> {
        let _active = ActiveRun::claim(&self.inner.active)?;
        let id = self.inner.run_ids.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.execute(id, request, observer, token).await
    }

    /// Execute a run on a spawned task
    pub fn start_run(&self, request: ProcessingRequest, observer: Arc<dyn PipelineObserver>) -> Result<RunHandle> {
        let active = ActiveRun::claim(&self.inner.active)?;
        let id = self.inner.run_ids.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        let inner = self.inner.clone();
        let run_token = token.clone();
        let task = tokio::spawn(async move {
            let _active = active;
            inner.execute(id, request, observer.as_ref(), run_token).await
        });

        Ok(RunHandle { id, token, task })
    }

    pub fn cancel(&self, handle: &RunHandle) {
        handle.cancel();
    }
}

impl Inner {
    async fn execute(
        &self,
        id: u64,
        request: ProcessingRequest,
        observer: &dyn PipelineObserver,
        token: CancellationToken,
    ) -> Result<RunOutcome> {
        info!(
            "Run {} started: {} byte clip to {} min",
            id,
            request.clip().len(),
            request.target_duration_minutes()
        );
        let scope = RunScope::new(self.context.codec.clone(), token);
        let mut tracker = ProgressTracker::new(observer);

        let result = self.drive(&request, &scope, &mut tracker).await;
        scope.cleanup().await;

        match result {
            Ok(output) => {
                tracker.complete();
                info!(
                    "Run {} complete: {:.1}s in {} mode, {} repeats",
                    id, output.duration_secs, output.mode, output.repeat_count
                );
                Ok(RunOutcome::Completed(output))
            }
            Err(PipelineError::Cancelled) => {
                info!("Run {} cancelled", id);
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                warn!("Run {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        request: &ProcessingRequest,
        scope: &RunScope,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<RunOutput> {
        let analysis = self.analyze(request, scope, tracker).await?;

        tracker.enter(Stage::Interpolating);
        scope.check()?;
        let bridge = self.synthesize_bridge(&analysis, scope, tracker).await?;

        tracker.enter(Stage::Generating);
        scope.check()?;
        let unit = self
            .assembler
            .build_loop_unit(scope, &analysis.input, &bridge, &analysis.encode, &mut |p| tracker.report(p))
            .await?;
        let target_minutes = request.target_duration_minutes();
        let repeat_count = self.assembler.compute_repeat_count(unit.duration, target_minutes);
        debug!("Unit {:.3}s needs {} repeats for {} min", unit.duration, repeat_count, target_minutes);

        tracker.enter(Stage::Finalizing);
        scope.check()?;
        let target_secs = request.target_seconds();
        let output = self
            .assembler
            .expand_loop(scope, &unit, repeat_count, target_secs, &mut |p| tracker.report(scale_percent(p, 0, 90)))
            .await?;
        let bytes = scope.read(&output).await?;
        tracker.report(95);
        scope.check()?;

        Ok(RunOutput {
            bytes,
            duration_secs: target_secs.min(unit.duration * (repeat_count as f64 + 1.0)),
            unit_duration_secs: unit.duration,
            repeat_count,
            mode: bridge.mode,
            compressed: analysis.encode.compressed,
        })
    }

    async fn analyze(
        &self,
        request: &ProcessingRequest,
        scope: &RunScope,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<Analysis> {
        tracker.enter(Stage::Analyzing);
        scope.check()?;
        self.context
            .codec
            .ensure_ready(&mut |p| tracker.report(scale_percent(p, 0, 60)))
            .await?;

        if request.clip().is_empty() {
            return Err(PipelineError::SourceUnreadable {
                reason: "the clip is empty".to_string(),
            });
        }

        let input = scope.stage(&request.input_name(), request.clip()).await?;
        tracker.report(70);
        let info = scope.probe(&input).await.map_err(|e| match e {
            PipelineError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::SourceUnreadable {
                reason: other.to_string(),
            },
        })?;
        debug!(
            "Source {}x{} {} {:.3}s",
            info.width, info.height, info.codec, info.duration
        );

        let source = SourceVideo::new(request.clip().clone(), info);
        let compressed = self
            .assembler
            .estimate_compression_need(&source, request.target_duration_minutes());
        let encode = self.assembler.encode_settings(compressed);
        tracker.report(100);

        Ok(Analysis { source, input, encode })
    }

    /// At most two attempts: the initial mode, then fallback if AI failed
    async fn synthesize_bridge(
        &self,
        analysis: &Analysis,
        scope: &RunScope,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<BridgeClip> {
        let mut mode = if self.context.interpolator.is_available() {
            BridgeMode::Ai
        } else {
            BridgeMode::Fallback
        };
        tracker.mode_changed(mode);

        loop {
            let before = scope.artifacts();
            let attempt = self
                .synthesizer
                .synthesize(
                    scope,
                    &analysis.source,
                    &analysis.input,
                    mode,
                    &analysis.encode,
                    &mut |p| tracker.report(p),
                )
                .await;

            let error = match attempt {
                Ok(bridge) => return Ok(bridge),
                Err(e) => e,
            };

            match mode.after_failure() {
                Some(next) if error.is_recoverable() => {
                    warn!("{} bridge failed, switching to {}: {}", mode, next, error);
                    let partial: Vec<String> = scope
                        .artifacts()
                        .into_iter()
                        .filter(|name| !before.contains(name))
                        .collect();
                    scope.discard(&partial).await;
                    mode = next;
                    tracker.mode_changed(mode);
                    scope.check()?;
                }
                _ => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MediaInfo;
    use crate::error::ErrorKind;
    use crate::interpolation::{SessionFactory, UnavailableFactory};
    use crate::pipeline::events::PipelineEvent;
    use crate::testing::{scripted_context, BlendFactory, FailingFactory, RecordingObserver, ScriptedRunner};

    struct Harness {
        orchestrator: Orchestrator,
        runner: Arc<ScriptedRunner>,
        codec: Arc<CodecEngine>,
        _cache: tempfile::TempDir,
    }

    async fn harness(runner: ScriptedRunner, factory: Arc<dyn SessionFactory>) -> Harness {
        let cache = tempfile::tempdir().unwrap();
        let runner = Arc::new(runner);
        let context = scripted_context(runner.clone(), factory, cache.path()).await;
        let codec = context.codec.clone();
        Harness {
            orchestrator: Orchestrator::new(Config::default(), context),
            runner,
            codec,
            _cache: cache,
        }
    }

    fn request(minutes: f64) -> ProcessingRequest {
        ProcessingRequest::new(b"source clip".to_vec(), minutes).unwrap()
    }

    fn stages(events: &[PipelineEvent]) -> Vec<Stage> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Stage(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }

    fn modes(events: &[PipelineEvent]) -> Vec<BridgeMode> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::ModeChanged(mode) => Some(*mode),
                _ => None,
            })
            .collect()
    }

    async fn scratch_is_empty(codec: &CodecEngine) -> bool {
        let dir = codec.ensure_ready(&mut |_| {}).await.unwrap().scratch_dir().to_path_buf();
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_fallback_run_completes() {
        let h = harness(ScriptedRunner::new(), Arc::new(UnavailableFactory)).await;
        assert!(!h.orchestrator.is_ai_backend_available());

        let observer = RecordingObserver::default();
        let outcome = h
            .orchestrator
            .run(request(5.0), &observer, CancellationToken::new())
            .await
            .unwrap();
        let output = outcome.output().unwrap();

        assert_eq!(output.mode, BridgeMode::Fallback);
        assert_eq!(output.unit_duration_secs, 9.75);
        assert_eq!(output.repeat_count, 30);
        assert_eq!(output.duration_secs, 300.0);
        assert!(!output.compressed);
        assert!(!output.bytes.is_empty());

        let events = observer.events();
        assert_eq!(
            stages(&events),
            vec![
                Stage::Analyzing,
                Stage::Interpolating,
                Stage::Generating,
                Stage::Finalizing,
                Stage::Complete
            ]
        );
        assert_eq!(events.last(), Some(&PipelineEvent::Progress(100)));
        assert!(scratch_is_empty(&h.codec).await);
    }

    #[tokio::test]
    async fn test_unavailable_ai_selects_fallback_once_up_front() {
        let h = harness(ScriptedRunner::new(), Arc::new(UnavailableFactory)).await;
        let observer = RecordingObserver::default();
        h.orchestrator
            .run(request(5.0), &observer, CancellationToken::new())
            .await
            .unwrap();

        let events = observer.events();
        assert_eq!(modes(&events), vec![BridgeMode::Fallback]);

        let entered = events
            .iter()
            .position(|e| *e == PipelineEvent::Stage(Stage::Interpolating))
            .unwrap();
        let mode_at = events
            .iter()
            .position(|e| matches!(e, PipelineEvent::ModeChanged(_)))
            .unwrap();
        let first_progress = events
            .iter()
            .skip(entered)
            .position(|e| matches!(e, PipelineEvent::Progress(p) if *p > 5))
            .map(|i| i + entered)
            .unwrap();
        assert!(entered < mode_at && mode_at < first_progress);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let runner = ScriptedRunner::new().with_progress_times(vec![0.1, 0.2, 5.0, 1.0, 400.0]);
        let h = harness(runner, Arc::new(BlendFactory::default())).await;
        let observer = RecordingObserver::default();
        h.orchestrator
            .run(request(5.0), &observer, CancellationToken::new())
            .await
            .unwrap();

        let progress = observer.progress();
        assert_eq!(progress.first(), Some(&0));
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_ai_run_uses_interpolated_bridge() {
        let h = harness(ScriptedRunner::new(), Arc::new(BlendFactory::default())).await;
        let observer = RecordingObserver::default();
        let output = h
            .orchestrator
            .run(request(1.0), &observer, CancellationToken::new())
            .await
            .unwrap()
            .output()
            .unwrap();

        assert_eq!(output.mode, BridgeMode::Ai);
        assert!((output.unit_duration_secs - 10.4).abs() < 1e-9);
        assert_eq!(modes(&observer.events()), vec![BridgeMode::Ai]);
        assert!(h.runner.commands_with("xfade").is_empty());
        assert!(scratch_is_empty(&h.codec).await);
    }

    #[tokio::test]
    async fn test_ai_failure_falls_back_exactly_once() {
        let h = harness(ScriptedRunner::new(), Arc::new(FailingFactory)).await;
        let observer = RecordingObserver::default();
        let output = h
            .orchestrator
            .run(request(5.0), &observer, CancellationToken::new())
            .await
            .unwrap()
            .output()
            .unwrap();

        assert_eq!(output.mode, BridgeMode::FallbackDueToError);
        assert_eq!(output.repeat_count, 30);
        assert_eq!(
            modes(&observer.events()),
            vec![BridgeMode::Ai, BridgeMode::FallbackDueToError]
        );
    }

    #[tokio::test]
    async fn test_partial_ai_work_is_discarded_before_fallback() {
        let h = harness(ScriptedRunner::new(), Arc::new(BlendFactory::failing_inference())).await;
        let observer = RecordingObserver::default();
        let output = h
            .orchestrator
            .run(request(2.0), &observer, CancellationToken::new())
            .await
            .unwrap()
            .output()
            .unwrap();

        assert_eq!(output.mode, BridgeMode::FallbackDueToError);
        // Boundary frames were grabbed by the failed attempt
        assert_eq!(h.runner.commands_with("bridge_last.png").len(), 1);
        assert!(scratch_is_empty(&h.codec).await);
    }

    #[tokio::test]
    async fn test_fallback_failure_is_fatal() {
        let runner = ScriptedRunner::new().fail_when("xfade");
        let h = harness(runner, Arc::new(FailingFactory)).await;
        let observer = RecordingObserver::default();
        let err = h
            .orchestrator
            .run(request(5.0), &observer, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transcode);
        assert_eq!(h.runner.commands_with("xfade").len(), 1);
        assert!(!stages(&observer.events()).contains(&Stage::Complete));
        assert!(scratch_is_empty(&h.codec).await);
    }

    #[tokio::test]
    async fn test_unreadable_source_is_fatal() {
        let runner = ScriptedRunner::new().unreadable("input");
        let h = harness(runner, Arc::new(BlendFactory::default())).await;
        let observer = RecordingObserver::default();
        let err = h
            .orchestrator
            .run(request(5.0), &observer, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceUnreadable);
        assert_eq!(stages(&observer.events()), vec![Stage::Analyzing]);
        assert!(modes(&observer.events()).is_empty());
    }

    #[tokio::test]
    async fn test_engine_init_failure_is_fatal() {
        let h = harness(ScriptedRunner::new().failing_init(), Arc::new(BlendFactory::default())).await;
        let err = h
            .orchestrator
            .run(request(5.0), &RecordingObserver::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineInit);
        assert!(!h.orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_long_target_enables_compression() {
        let h = harness(ScriptedRunner::new(), Arc::new(UnavailableFactory)).await;
        let output = h
            .orchestrator
            .run(request(45.0), &RecordingObserver::default(), CancellationToken::new())
            .await
            .unwrap()
            .output()
            .unwrap();

        assert!(output.compressed);
        let crf = Config::default().output.compressed_crf.to_string();
        for args in h.runner.commands_with("-crf") {
            let at = args.iter().position(|a| a == "-crf").unwrap();
            assert_eq!(args[at + 1], crf);
        }
    }

    #[tokio::test]
    async fn test_cancel_during_generating() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let runner = ScriptedRunner::new().on_command(move |args| {
            if args.iter().any(|a| a.ends_with("concat.txt")) {
                trigger.cancel();
            }
        });
        let h = harness(runner, Arc::new(UnavailableFactory)).await;

        let observer = RecordingObserver::default();
        let outcome = h.orchestrator.run(request(5.0), &observer, token).await.unwrap();
        assert!(outcome.is_cancelled());

        let events = observer.events();
        assert_eq!(stages(&events).last(), Some(&Stage::Generating));
        assert!(!stages(&events).contains(&Stage::Complete));
        assert!(h.runner.commands_with("-stream_loop").is_empty());
        assert!(scratch_is_empty(&h.codec).await);

        // The orchestrator is free again and starts from the top
        let next = RecordingObserver::default();
        let outcome = h
            .orchestrator
            .run(request(5.0), &next, CancellationToken::new())
            .await
            .unwrap();
        assert!(!outcome.is_cancelled());
        assert_eq!(next.events().first(), Some(&PipelineEvent::Stage(Stage::Analyzing)));
        assert_eq!(next.events()[1], PipelineEvent::Progress(0));
    }

    #[tokio::test]
    async fn test_cancel_during_ai_bridge_does_not_fall_back() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let runner = ScriptedRunner::new().on_command(move |args| {
            if args.iter().any(|a| a.ends_with("bridge_last.png")) {
                trigger.cancel();
            }
        });
        let h = harness(runner, Arc::new(BlendFactory::default())).await;

        let observer = RecordingObserver::default();
        let outcome = h.orchestrator.run(request(5.0), &observer, token).await.unwrap();
        assert!(outcome.is_cancelled());

        let events = observer.events();
        assert_eq!(modes(&events), vec![BridgeMode::Ai]);
        assert_eq!(stages(&events).last(), Some(&Stage::Interpolating));
        assert!(h.runner.commands_with("xfade").is_empty());
        assert!(h.runner.commands_with("bridge_first.png").is_empty());
        assert!(scratch_is_empty(&h.codec).await);
        assert!(!h.orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_fallback_runs_are_repeatable() {
        let h = harness(ScriptedRunner::new(), Arc::new(UnavailableFactory)).await;
        let mut results = Vec::new();
        for _ in 0..2 {
            let output = h
                .orchestrator
                .run(request(3.0), &RecordingObserver::default(), CancellationToken::new())
                .await
                .unwrap()
                .output()
                .unwrap();
            results.push((output.duration_secs, output.repeat_count, output.unit_duration_secs));
        }
        assert_eq!(results[0], results[1]);
    }

    #[tokio::test]
    async fn test_overlapping_run_is_rejected() {
        let runner = ScriptedRunner::new().with_init_delay(std::time::Duration::from_millis(100));
        let h = harness(runner, Arc::new(UnavailableFactory)).await;

        let first = h
            .orchestrator
            .start_run(request(1.0), Arc::new(RecordingObserver::default()))
            .unwrap();
        assert!(h.orchestrator.is_busy());

        let second = h
            .orchestrator
            .start_run(request(1.0), Arc::new(RecordingObserver::default()));
        assert!(matches!(second, Err(PipelineError::RunInProgress)));

        let outcome = first.wait().await.unwrap();
        assert!(!outcome.is_cancelled());
        assert!(!h.orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_handle_cancel_is_idempotent() {
        let runner = ScriptedRunner::new().with_init_delay(std::time::Duration::from_millis(50));
        let h = harness(runner, Arc::new(UnavailableFactory)).await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = h.orchestrator.start_run(request(1.0), Arc::new(tx)).unwrap();
        h.orchestrator.cancel(&handle);
        handle.cancel();
        assert!(handle.is_cancelled());

        let outcome = handle.wait().await.unwrap();
        assert!(outcome.is_cancelled());

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(!stages(&events).contains(&Stage::Complete));
        assert!(!h.orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_source_metadata_drives_geometry() {
        let short = MediaInfo {
            duration: 1.0,
            width: 320,
            height: 180,
            codec: "h264".to_string(),
            frame_rate: Some(30.0),
        };
        let h = harness(ScriptedRunner::new().with_source(short), Arc::new(UnavailableFactory)).await;
        let output = h
            .orchestrator
            .run(request(0.5), &RecordingObserver::default(), CancellationToken::new())
            .await
            .unwrap()
            .output()
            .unwrap();

        // 1s clip: the crossfade window shrinks to 0.125s
        assert!((output.unit_duration_secs - 0.875).abs() < 1e-9);
        assert_eq!(output.repeat_count, 34);
    }
}
