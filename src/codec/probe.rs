use serde::Deserialize;

use crate::error::{CodecError, Result};

/// Video stream metadata as reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub frame_rate: Option<f64>,
}

/// Frame rates closer than this are treated as the same timebase
const FRAME_RATE_TOLERANCE: f64 = 0.01;

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// ffprobe arguments producing the JSON understood by [`MediaInfo::from_ffprobe_json`]
pub fn probe_args() -> Vec<String> {
    [
        "-v", "error",
        "-select_streams", "v:0",
        "-show_entries", "stream=codec_name,width,height,r_frame_rate,duration:format=duration",
        "-of", "json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl MediaInfo {
    pub fn from_ffprobe_json(json: &str) -> Result<Self> {
        let output: ProbeOutput = serde_json::from_str(json).map_err(|e| CodecError::Probe {
            reason: format!("unparseable ffprobe output: {}", e),
        })?;

        let stream = output.streams.into_iter().next().ok_or_else(|| CodecError::Probe {
            reason: "no video stream".to_string(),
        })?;

        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(CodecError::Probe {
                    reason: "video stream has no dimensions".to_string(),
                }
                .into())
            }
        };

        // The video stream's own length; the container may be stretched by other tracks
        let positive = |d: Option<String>| d.and_then(|d| d.parse::<f64>().ok()).filter(|d| d.is_finite() && *d > 0.0);
        let duration = positive(stream.duration)
            .or_else(|| positive(output.format.and_then(|f| f.duration)))
            .ok_or_else(|| CodecError::Probe {
                reason: "unknown or zero duration".to_string(),
            })?;

        Ok(Self {
            duration,
            width,
            height,
            codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
            frame_rate: stream.r_frame_rate.as_deref().and_then(parse_rational),
        })
    }

    /// Whether two clips can be joined with the concat demuxer without re-encoding
    pub fn is_concat_compatible(&self, other: &MediaInfo) -> bool {
        let same_rate = match (self.frame_rate, other.frame_rate) {
            (Some(a), Some(b)) => (a - b).abs() <= FRAME_RATE_TOLERANCE,
            (None, None) => true,
            _ => false,
        };
        self.codec == other.codec && self.width == other.width && self.height == other.height && same_rate
    }
}

/// Parse ffprobe rationals such as `30000/1001`
fn parse_rational(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}
