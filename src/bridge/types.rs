use std::fmt;

use image::imageops::FilterType;
use image::RgbImage;
use rayon::prelude::*;
use serde::Serialize;

/// How the seam between the clip's end and its start is bridged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeMode {
    /// Neural interpolation between the last and first frame
    Ai,
    /// Crossfade, chosen up front because no AI backend is available
    Fallback,
    /// Crossfade, after the AI path failed during this run
    FallbackDueToError,
}

impl BridgeMode {
    pub fn is_ai(self) -> bool {
        self == Self::Ai
    }

    /// The mode to retry with after an attempt in this mode failed.
    /// Only the AI path gets a second chance, and only once.
    pub fn after_failure(self) -> Option<Self> {
        match self {
            Self::Ai => Some(Self::FallbackDueToError),
            Self::Fallback | Self::FallbackDueToError => None,
        }
    }
}

impl fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ai => "ai",
            Self::Fallback => "fallback",
            Self::FallbackDueToError => "fallback_due_to_error",
        };
        write!(f, "{}", name)
    }
}

/// An encoded bridge clip in scratch storage.
///
/// `main_start..main_end` is the part of the source that plays between two
/// bridges; the bridge itself stands in for everything outside that range.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeClip {
    pub name: String,
    pub duration: f64,
    pub main_start: f64,
    pub main_end: f64,
    pub mode: BridgeMode,
}

impl BridgeClip {
    pub fn main_duration(&self) -> f64 {
        (self.main_end - self.main_start).max(0.0)
    }

    /// Source time the bridge replaces at the seam
    pub fn covered_duration(&self, source_duration: f64) -> f64 {
        (source_duration - self.main_duration()).max(0.0)
    }

    /// Length of one loop unit built around this bridge
    pub fn unit_duration(&self) -> f64 {
        self.main_duration() + self.duration
    }
}

/// Interpolated frames at inference resolution, awaiting upsampling
pub struct BridgeResult {
    pub frames: Vec<RgbImage>,
    pub inference_size: (u32, u32),
    pub original_size: (u32, u32),
}

impl BridgeResult {
    /// Resample every frame back to the source resolution in parallel
    pub fn upscale(self) -> Vec<RgbImage> {
        let (width, height) = self.original_size;
        if self.inference_size == self.original_size {
            return self.frames;
        }

        self.frames
            .into_par_iter()
            .map(|frame| image::imageops::resize(&frame, width, height, FilterType::Lanczos3))
            .collect()
    }
}
