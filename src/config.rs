use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for seamloop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Native codec engine settings
    pub engine: EngineConfig,

    /// Frame-interpolation model settings
    pub model: ModelConfig,

    /// Bridge synthesis settings
    pub bridge: BridgeConfig,

    /// Output encoding and compression policy
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string(),
            }
            .into()
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.bridge.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> crate::error::PipelineError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

/// Locations of the native codec executables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

/// Frame-interpolation model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Allow the AI bridge at all
    pub enabled: bool,

    /// Cache key: identifier of the model
    pub model_id: String,

    /// Cache key: version of the weights
    pub version: String,

    /// Where to fetch the ONNX weights on a cache miss
    pub download_url: String,

    /// Persistent cache directory (platform cache dir when unset)
    pub cache_dir: Option<PathBuf>,

    /// Total download attempts before giving up
    pub download_attempts: u32,

    /// Delay between download attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Intra-op threads for the CPU backend
    pub inference_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_id: "rife".to_string(),
            version: "4.6".to_string(),
            download_url: "https://huggingface.co/yuvraj108c/rife-onnx/resolve/main/rife46.onnx".to_string(),
            cache_dir: None,
            download_attempts: 3,
            retry_delay_ms: 1500,
            inference_threads: num_cpus::get(),
        }
    }
}

impl ModelConfig {
    /// Resolved cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs_next::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("seamloop")
                .join("models")
        })
    }

    fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(invalid("model.model_id", &self.model_id));
        }

        if self.download_attempts == 0 {
            return Err(invalid("model.download_attempts", self.download_attempts));
        }

        if self.inference_threads == 0 {
            return Err(invalid("model.inference_threads", self.inference_threads));
        }

        Ok(())
    }
}

/// Bridge synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Distance from the clip boundaries when grabbing first/last frames (seconds)
    pub boundary_epsilon: f64,

    /// Number of interpolated frames in the AI bridge
    pub interpolation_steps: u32,

    /// Long-edge bound of the inference resolution (pixels)
    pub max_inference_edge: u32,

    /// Model dimension alignment (pixels)
    pub alignment: u32,

    /// Duration of the AI bridge clip (seconds)
    pub ai_bridge_duration: f64,

    /// Lower bound of the AI bridge frame rate
    pub min_bridge_fps: f64,

    /// Crossfade window length in fallback mode (seconds)
    pub blend_window: f64,

    /// Cap of the crossfade window as a fraction of the source duration
    pub max_blend_fraction: f64,

    /// xfade transition used in fallback mode
    pub transition: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            boundary_epsilon: 0.05,
            interpolation_steps: 8,
            max_inference_edge: 512,
            alignment: 32,
            ai_bridge_duration: 0.5,
            min_bridge_fps: 8.0,
            blend_window: 0.25,
            max_blend_fraction: 0.125,
            transition: "fade".to_string(),
        }
    }
}

impl BridgeConfig {
    fn validate(&self) -> Result<()> {
        if !(self.boundary_epsilon > 0.0 && self.boundary_epsilon < 1.0) {
            return Err(invalid("bridge.boundary_epsilon", self.boundary_epsilon));
        }

        if self.interpolation_steps == 0 {
            return Err(invalid("bridge.interpolation_steps", self.interpolation_steps));
        }

        if self.alignment == 0 || self.max_inference_edge < self.alignment {
            return Err(invalid(
                "bridge.max_inference_edge",
                format!("{} (alignment {})", self.max_inference_edge, self.alignment),
            ));
        }

        if self.ai_bridge_duration <= 0.0 || self.min_bridge_fps <= 0.0 {
            return Err(invalid(
                "bridge.ai_bridge_duration",
                format!("{}s @ min {} fps", self.ai_bridge_duration, self.min_bridge_fps),
            ));
        }

        if self.blend_window <= 0.0 {
            return Err(invalid("bridge.blend_window", self.blend_window));
        }

        if !(self.max_blend_fraction > 0.0 && self.max_blend_fraction < 0.5) {
            return Err(invalid("bridge.max_blend_fraction", self.max_blend_fraction));
        }

        if self.transition.trim().is_empty() {
            return Err(invalid("bridge.transition", &self.transition));
        }

        Ok(())
    }
}

/// Output encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Video encoder for every re-encoded segment
    pub codec: String,

    /// Encoder speed preset
    pub preset: String,

    pub pixel_format: String,

    /// CRF when no compression is needed
    pub crf: u8,

    /// CRF when the compression policy triggers
    pub compressed_crf: u8,

    /// Projected output size above which compression kicks in (bytes)
    pub size_ceiling_bytes: u64,

    /// Target duration above which compression kicks in (minutes)
    pub compression_threshold_minutes: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            pixel_format: "yuv420p".to_string(),
            crf: 20,
            compressed_crf: 28,
            size_ceiling_bytes: 2_000_000_000,
            compression_threshold_minutes: 30.0,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.crf > 51 || self.compressed_crf > 51 {
            return Err(invalid(
                "output.crf",
                format!("{}/{}", self.crf, self.compressed_crf),
            ));
        }

        if self.size_ceiling_bytes == 0 {
            return Err(invalid("output.size_ceiling_bytes", self.size_ceiling_bytes));
        }

        if self.compression_threshold_minutes <= 0.0 {
            return Err(invalid(
                "output.compression_threshold_minutes",
                self.compression_threshold_minutes,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("seamloop.toml");

        let mut original = Config::default();
        original.bridge.interpolation_steps = 12;
        original.model.cache_dir = Some(dir.path().join("models"));

        original.save_to_file(&file_path).unwrap();
        let loaded = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded.bridge.interpolation_steps, 12);
        assert_eq!(loaded.model.cache_dir, original.model.cache_dir);
        assert_eq!(loaded.output.size_ceiling_bytes, original.output.size_ceiling_bytes);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[bridge]\nblend_window = 0.4\n").unwrap();

        let loaded = Config::from_file(&file_path).unwrap();
        assert_eq!(loaded.bridge.blend_window, 0.4);
        assert_eq!(loaded.bridge.interpolation_steps, 8);
        assert_eq!(loaded.output.codec, "libx264");
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_file("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.bridge.interpolation_steps = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.crf = 60;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bridge.max_blend_fraction = 0.6;
        assert!(config.validate().is_err());
    }
}
