use tracing::{debug, info};

use crate::assembly::policy::{compute_repeat_count, estimate_compression_need};
use crate::bridge::BridgeClip;
use crate::codec::{scale_percent, to_args, EncodeSettings, RunScope};
use crate::config::OutputConfig;
use crate::error::Result;
use crate::source::SourceVideo;

/// One full cycle of the loop (main body followed by the bridge)
#[derive(Debug, Clone, PartialEq)]
pub struct LoopUnit {
    pub name: String,
    pub duration: f64,
    /// Whether main body and bridge were joined without re-encoding
    pub stream_copied: bool,
}

/// Trims, joins and replicates clips into the final loop
pub struct LoopAssembler {
    output: OutputConfig,
}

impl LoopAssembler {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    pub fn estimate_compression_need(&self, source: &SourceVideo, target_minutes: f64) -> bool {
        let compressed = estimate_compression_need(source, target_minutes, &self.output);
        debug!(
            "Projected output {:.0} MB for {} min, compression {}",
            source.estimated_bitrate() * target_minutes * 60.0 / 1_000_000.0,
            target_minutes,
            if compressed { "on" } else { "off" }
        );
        compressed
    }

    /// Encoder settings for every re-encoded segment of a run
    pub fn encode_settings(&self, compressed: bool) -> EncodeSettings {
        EncodeSettings::for_output(&self.output, compressed)
    }

    pub fn compute_repeat_count(&self, unit_duration_secs: f64, target_minutes: f64) -> u32 {
        compute_repeat_count(unit_duration_secs, target_minutes)
    }

    /// Trim the source to the part the bridge does not cover and append the bridge
    pub async fn build_loop_unit(
        &self,
        scope: &RunScope,
        input: &str,
        bridge: &BridgeClip,
        encode: &EncodeSettings,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<LoopUnit> {
        let main = scope.artifact("main.mp4");
        let main_duration = bridge.main_duration();

        let mut args = to_args(&[
            "-ss",
            &format!("{:.6}", bridge.main_start),
            "-i",
            input,
            "-t",
            &format!("{:.6}", main_duration),
            "-map",
            "0:v:0",
            "-an",
        ]);
        args.extend(encode.args());
        args.push(main.clone());
        scope
            .exec(args, Some(main_duration), &mut |p| progress(scale_percent(p, 0, 60)))
            .await?;

        let main_info = scope.probe(&main).await?;
        let bridge_info = scope.probe(&bridge.name).await?;
        let stream_copied = main_info.is_concat_compatible(&bridge_info);

        let unit = scope.artifact("unit.mp4");
        let duration = bridge.unit_duration();
        let args = if stream_copied {
            let list = concat_list(&[main.as_str(), bridge.name.as_str()]);
            let list = scope.stage("concat.txt", list.as_bytes()).await?;
            to_args(&["-f", "concat", "-safe", "0", "-i", &list, "-c", "copy", &unit])
        } else {
            debug!(
                "Bridge {} ({}x{} {}) differs from main body ({}x{} {}), re-encoding at concat",
                bridge.name,
                bridge_info.width,
                bridge_info.height,
                bridge_info.codec,
                main_info.width,
                main_info.height,
                main_info.codec
            );
            let filter = format!(
                "[0:v]scale={w}:{h},setsar=1[main];[1:v]scale={w}:{h},setsar=1[bridge];\
                 [main][bridge]concat=n=2:v=1:a=0[unit]",
                w = main_info.width,
                h = main_info.height,
            );
            let mut args = to_args(&["-i", &main, "-i", &bridge.name, "-filter_complex", &filter, "-map", "[unit]"]);
            args.extend(encode.args());
            args.push(unit.clone());
            args
        };

        scope
            .exec(args, Some(duration), &mut |p| progress(scale_percent(p, 60, 100)))
            .await?;

        info!(
            "Loop unit {} lasts {:.3}s ({})",
            unit,
            duration,
            if stream_copied { "stream copy" } else { "re-encoded" }
        );
        Ok(LoopUnit {
            name: unit,
            duration,
            stream_copied,
        })
    }

    /// Repeat the unit `repeat_count` extra times and cut at the target, without re-encoding
    pub async fn expand_loop(
        &self,
        scope: &RunScope,
        unit: &LoopUnit,
        repeat_count: u32,
        target_secs: f64,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<String> {
        let output = scope.artifact("loop.mp4");
        let args = to_args(&[
            "-stream_loop",
            &repeat_count.to_string(),
            "-i",
            &unit.name,
            "-t",
            &format!("{:.6}", target_secs),
            "-map",
            "0:v:0",
            "-c",
            "copy",
            "-movflags",
            "+faststart",
            &output,
        ]);

        info!("Expanding {} x{} to {:.1}s", unit.name, repeat_count + 1, target_secs);
        scope.exec(args, Some(target_secs), progress).await?;
        Ok(output)
    }
}

fn concat_list(names: &[&str]) -> String {
    names.iter().map(|name| format!("file '{}'\n", name)).collect()
}
