use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};

/// Sidecar metadata written next to cached weights
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntryMeta {
    pub model_id: String,
    pub version: String,
    pub size_bytes: u64,
    pub cached_at: DateTime<Utc>,
}

struct DownloadFailure {
    reason: String,
    retriable: bool,
}

/// Persistent cache of model weights keyed by model id and version.
///
/// A cache entry is `<id>-<version>.onnx` plus `<id>-<version>.json`; the
/// entry only counts when both exist and the recorded size matches.
pub struct ModelStore {
    dir: PathBuf,
    model_id: String,
    version: String,
    url: String,
    attempts: u32,
    retry_delay: Duration,
}

impl ModelStore {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            dir: config.cache_dir(),
            model_id: config.model_id.clone(),
            version: config.version.clone(),
            url: config.download_url.clone(),
            attempts: config.download_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    fn key(&self) -> String {
        let clean = |s: &str| {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
                .collect::<String>()
        };
        format!("{}-{}", clean(&self.model_id), clean(&self.version))
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(format!("{}.onnx", self.key()))
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key()))
    }

    /// Cached weights, if a complete entry exists
    pub async fn load_cached(&self) -> Result<Option<Vec<u8>>> {
        let meta = match tokio::fs::read_to_string(self.meta_path()).await {
            Ok(text) => text,
            Err(_) => return Ok(None),
        };
        let meta: CacheEntryMeta = match serde_json::from_str(&meta) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Ignoring corrupt model cache metadata: {}", e);
                return Ok(None);
            }
        };

        let weights = match tokio::fs::read(self.weights_path()).await {
            Ok(bytes) => bytes,
            Err(_) => return Ok(None),
        };

        if weights.len() as u64 != meta.size_bytes || meta.model_id != self.model_id || meta.version != self.version {
            warn!(
                "Model cache entry {} is stale ({} bytes on disk, {} recorded)",
                self.key(),
                weights.len(),
                meta.size_bytes
            );
            return Ok(None);
        }

        debug!("Model cache hit: {} (cached {})", self.key(), meta.cached_at.to_rfc3339());
        Ok(Some(weights))
    }

    /// Write weights and metadata into the cache
    pub async fn store(&self, weights: &[u8]) -> Result<CacheEntryMeta> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let weights_path = self.weights_path();
        let temp_path = weights_path.with_extension("onnx.part");
        tokio::fs::write(&temp_path, weights).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &weights_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let meta = CacheEntryMeta {
            model_id: self.model_id.clone(),
            version: self.version.clone(),
            size_bytes: weights.len() as u64,
            cached_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&meta).map_err(|e| ModelError::LoadFailed {
            reason: format!("could not serialize cache metadata: {}", e),
        })?;
        tokio::fs::write(self.meta_path(), json).await?;

        info!("Cached model {} ({} bytes)", self.key(), weights.len());
        Ok(meta)
    }

    /// Cached weights or a fresh download, reporting byte-level progress 0-100
    pub async fn fetch(&self, progress: &mut (dyn FnMut(u8) + Send)) -> Result<Vec<u8>> {
        if let Some(weights) = self.load_cached().await? {
            progress(100);
            return Ok(weights);
        }

        if self.url.trim().is_empty() {
            return Err(ModelError::Download {
                url: self.url.clone(),
                reason: "no download URL configured".to_string(),
            }
            .into());
        }

        let mut last_reason = String::new();
        for attempt in 1..=self.attempts {
            info!("Downloading model {} (attempt {}/{})", self.key(), attempt, self.attempts);
            match self.download_once(progress).await {
                Ok(weights) => {
                    self.store(&weights).await?;
                    progress(100);
                    return Ok(weights);
                }
                Err(failure) => {
                    warn!("Model download failed: {}", failure.reason);
                    last_reason = failure.reason;
                    if !failure.retriable {
                        break;
                    }
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(ModelError::Download {
            url: self.url.clone(),
            reason: last_reason,
        }
        .into())
    }

    async fn download_once(
        &self,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> std::result::Result<Vec<u8>, DownloadFailure> {
        let transient = |reason: String| DownloadFailure { reason, retriable: true };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3600))
            .build()
            .map_err(|e| DownloadFailure {
                reason: format!("failed to create HTTP client: {}", e),
                retriable: false,
            })?;

        let mut response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transient(format!("failed to start download: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadFailure {
                reason: format!("HTTP {} from download URL", status.as_u16()),
                // Client errors will not fix themselves
                retriable: !status.is_client_error(),
            });
        }

        let total_bytes = response.content_length();
        let mut weights = Vec::with_capacity(total_bytes.unwrap_or(0) as usize);
        progress(0);

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    weights.extend_from_slice(&chunk);
                    if let Some(total) = total_bytes.filter(|t| *t > 0) {
                        let percent = (weights.len() as f64 / total as f64 * 100.0).min(100.0);
                        progress(percent as u8);
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(transient(format!("download error: {}", e))),
            }
        }

        if let Some(total) = total_bytes {
            if weights.len() as u64 != total {
                return Err(transient(format!(
                    "truncated download: {} of {} bytes",
                    weights.len(),
                    total
                )));
            }
        }

        Ok(weights)
    }
}
