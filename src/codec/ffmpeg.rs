use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::codec::probe::{probe_args, MediaInfo};
use crate::config::EngineConfig;
use crate::error::{CodecError, Result};

/// How much of ffmpeg's stderr is kept for diagnostics
const STDERR_TAIL_CHARS: usize = 2000;

/// Native codec invocations.
///
/// One implementation drives the `ffmpeg`/`ffprobe` executables; tests swap in
/// a scripted runner. `transcode` reports encoded output time in seconds.
#[async_trait]
pub trait FfmpegRunner: Send + Sync {
    /// Verify the runtime is usable, returning its version banner
    async fn version(&self) -> Result<String>;

    /// Run one ffmpeg invocation with `workdir` as the current directory
    async fn transcode(
        &self,
        args: &[String],
        workdir: &Path,
        on_time: &mut (dyn FnMut(f64) + Send),
    ) -> Result<()>;

    /// Read video stream metadata of `path`
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// ffmpeg/ffprobe executables driven through `tokio::process`
pub struct FfmpegCli {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegCli {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }

    async fn banner(program: &Path) -> Result<String> {
        let output = Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| CodecError::EngineInit {
                reason: format!("{} could not be started: {}", program.display(), e),
            })?;

        if !output.status.success() {
            return Err(CodecError::EngineInit {
                reason: format!("{} -version exited with {}", program.display(), output.status),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl FfmpegRunner for FfmpegCli {
    async fn version(&self) -> Result<String> {
        let version = Self::banner(&self.ffmpeg).await?;
        Self::banner(&self.ffprobe).await?;
        Ok(version)
    }

    async fn transcode(
        &self,
        args: &[String],
        workdir: &Path,
        on_time: &mut (dyn FnMut(f64) + Send),
    ) -> Result<()> {
        let command_line = format_command(&self.ffmpeg, args);

        let mut child = Command::new(&self.ffmpeg)
            .current_dir(workdir)
            .args(["-hide_banner", "-nostdin", "-y", "-progress", "pipe:1", "-nostats"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CodecError::Transcode {
                command: command_line.clone(),
                native_message: format!("failed to spawn: {}", e),
            })?;

        // Drain stderr concurrently so a chatty encoder never blocks on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut log = String::new();
                let _ = stderr.read_to_string(&mut log).await;
                log
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(seconds) = parse_progress_line(&line) {
                    on_time(seconds);
                }
            }
        }

        let status = child.wait().await.map_err(|e| CodecError::Transcode {
            command: command_line.clone(),
            native_message: e.to_string(),
        })?;

        let stderr_log = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(CodecError::Transcode {
                command: command_line,
                native_message: format!("exit {}: {}", status, tail(&stderr_log, STDERR_TAIL_CHARS)),
            }
            .into());
        }

        debug!("ffmpeg finished: {}", command_line);
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .args(probe_args())
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CodecError::Probe {
                reason: format!("ffprobe could not be started: {}", e),
            })?;

        if !output.status.success() {
            return Err(CodecError::Probe {
                reason: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_CHARS).to_string(),
            }
            .into());
        }

        MediaInfo::from_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse one `-progress` line into encoded output seconds.
///
/// `out_time_ms` is microseconds despite its name.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.parse::<i64>().ok().map(|us| us.max(0) as f64 / 1_000_000.0),
        "out_time" => parse_timestamp(value),
        _ => None,
    }
}

/// `HH:MM:SS.micro` to seconds
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total >= 0.0).then_some(total)
}

/// Owned argument list from string slices
pub fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn format_command(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) || arg.contains(';') {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

fn tail(text: &str, max_chars: usize) -> &str {
    let text = text.trim_end();
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &text[start..]
}
