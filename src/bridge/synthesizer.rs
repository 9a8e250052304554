use std::io::Cursor;
use std::sync::Arc;

use image::{ImageOutputFormat, RgbImage};
use tracing::{debug, info};

use crate::bridge::types::{BridgeClip, BridgeMode, BridgeResult};
use crate::codec::{scale_percent, to_args, EncodeSettings, RunScope};
use crate::config::BridgeConfig;
use crate::error::{ModelError, PipelineError, Result};
use crate::interpolation::tensor::bound_long_edge;
use crate::interpolation::FrameInterpolator;
use crate::source::SourceVideo;

/// Boundary offsets never exceed this share of the clip
const MAX_EPSILON_FRACTION: f64 = 0.1;

/// Frame rate of an AI bridge with `steps` frames lasting `duration` seconds
pub fn bridge_frame_rate(steps: u32, duration: f64, min_fps: f64) -> f64 {
    (steps as f64 / duration).max(min_fps)
}

/// Crossfade window for a clip of `source_duration` seconds
pub fn blend_window(config: &BridgeConfig, source_duration: f64) -> f64 {
    config.blend_window.min(source_duration * config.max_blend_fraction)
}

/// Produces the transition clip joining a source's end to its start.
///
/// Has no recovery logic: a failed attempt is reported to the caller, which
/// decides whether another mode should be tried.
pub struct BridgeSynthesizer {
    config: BridgeConfig,
    interpolator: Arc<FrameInterpolator>,
}

impl BridgeSynthesizer {
    pub fn new(config: BridgeConfig, interpolator: Arc<FrameInterpolator>) -> Self {
        Self { config, interpolator }
    }

    /// Synthesize a bridge for the staged source `input`, reporting 0-100
    pub async fn synthesize(
        &self,
        scope: &RunScope,
        source: &SourceVideo,
        input: &str,
        mode: BridgeMode,
        encode: &EncodeSettings,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<BridgeClip> {
        scope.check()?;
        info!("Synthesizing {} bridge for {:.2}s source", mode, source.duration());

        let clip = match mode {
            BridgeMode::Ai => self.synthesize_ai(scope, source, input, encode, progress).await?,
            BridgeMode::Fallback | BridgeMode::FallbackDueToError => {
                self.synthesize_crossfade(scope, source, input, mode, encode, progress).await?
            }
        };

        debug!(
            "Bridge {} lasts {:.3}s, main body {:.3}s..{:.3}s",
            clip.name, clip.duration, clip.main_start, clip.main_end
        );
        progress(100);
        Ok(clip)
    }

    fn epsilon(&self, source_duration: f64) -> f64 {
        self.config
            .boundary_epsilon
            .min(source_duration * MAX_EPSILON_FRACTION)
    }

    async fn synthesize_ai(
        &self,
        scope: &RunScope,
        source: &SourceVideo,
        input: &str,
        encode: &EncodeSettings,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<BridgeClip> {
        self.interpolator
            .ensure_model_ready(&mut |p| progress(scale_percent(p, 0, 30)))
            .await?;
        scope.check()?;

        let duration = source.duration();
        let epsilon = self.epsilon(duration);
        let last = grab_frame(scope, input, duration - epsilon, "bridge_last.png").await?;
        let first = grab_frame(scope, input, epsilon, "bridge_first.png").await?;
        progress(35);

        let max_edge = self.config.max_inference_edge;
        let steps = self.config.interpolation_steps;
        let mut sequence = self.interpolator.interpolate(
            &bound_long_edge(&last, max_edge),
            &bound_long_edge(&first, max_edge),
            steps,
        )?;

        let inference_size = sequence.inference_size();
        let mut frames = Vec::with_capacity(steps as usize);
        while let Some(frame) = sequence.next_frame().await {
            scope.check()?;
            frames.push(frame?);
            progress(scale_percent((frames.len() as u32 * 100 / steps) as u8, 35, 80));
        }

        let result = BridgeResult {
            frames,
            inference_size,
            original_size: (source.width(), source.height()),
        };
        let encoded = tokio::task::spawn_blocking(move || {
            result
                .upscale()
                .iter()
                .map(encode_png)
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| PipelineError::generic(format!("bridge upscale task failed: {}", e)))??;

        for (index, png) in encoded.iter().enumerate() {
            scope.stage(&frame_name(index + 1), png).await?;
        }
        progress(85);

        let fps = bridge_frame_rate(steps, self.config.ai_bridge_duration, self.config.min_bridge_fps);
        let bridge_duration = steps as f64 / fps;
        let name = scope.artifact("bridge_ai.mp4");

        let mut args = to_args(&["-framerate", &format!("{:.6}", fps), "-start_number", "1", "-i"]);
        args.push(scope.scoped_name("bridge_%03d.png"));
        args.extend(to_args(&["-frames:v", &steps.to_string(), "-an"]));
        args.extend(encode.args());
        args.push(name.clone());

        scope
            .exec(args, Some(bridge_duration), &mut |p| progress(scale_percent(p, 85, 100)))
            .await?;

        Ok(BridgeClip {
            name,
            duration: bridge_duration,
            main_start: epsilon,
            main_end: duration - epsilon,
            mode: BridgeMode::Ai,
        })
    }

    async fn synthesize_crossfade(
        &self,
        scope: &RunScope,
        source: &SourceVideo,
        input: &str,
        mode: BridgeMode,
        encode: &EncodeSettings,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<BridgeClip> {
        let duration = source.duration();
        let window = blend_window(&self.config, duration);
        let tail_start = duration - window;

        let filter = format!(
            "[0:v]trim=start={tail:.6}:end={end:.6},setpts=PTS-STARTPTS[tail];\
             [0:v]trim=start=0:end={w:.6},setpts=PTS-STARTPTS[head];\
             [tail][head]xfade=transition={transition}:duration={w:.6}:offset=0,format={pix}[bridge]",
            tail = tail_start,
            end = duration,
            w = window,
            transition = self.config.transition,
            pix = encode.pixel_format,
        );

        let name = scope.artifact("bridge_fade.mp4");
        let mut args = to_args(&["-i", input, "-filter_complex", &filter, "-map", "[bridge]", "-an"]);
        args.extend(encode.args());
        args.push(name.clone());

        scope.exec(args, Some(window), progress).await?;

        Ok(BridgeClip {
            name,
            duration: window,
            main_start: window,
            main_end: tail_start,
            mode,
        })
    }
}

async fn grab_frame(scope: &RunScope, input: &str, at: f64, base: &str) -> Result<RgbImage> {
    let name = scope.artifact(base);
    let args = to_args(&["-ss", &format!("{:.3}", at.max(0.0)), "-i", input, "-frames:v", "1", "-an", &name]);
    scope.exec(args, None, &mut |_| {}).await?;

    let bytes = scope.read(&name).await?;
    let frame = image::load_from_memory(&bytes).map_err(|e| ModelError::Inference {
        reason: format!("boundary frame at {:.3}s is not decodable: {}", at, e),
    })?;
    Ok(frame.to_rgb8())
}

fn encode_png(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .map_err(|e| PipelineError::generic(format!("PNG encoding failed: {}", e)))?;
    Ok(bytes)
}

fn frame_name(index: usize) -> String {
    format!("bridge_{:03}.png", index)
}
