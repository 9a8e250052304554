use crate::config::OutputConfig;

/// Encoder arguments shared by every re-encoded segment of one run
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub codec: String,
    pub preset: String,
    pub pixel_format: String,
    pub crf: u8,
    pub compressed: bool,
}

impl EncodeSettings {
    pub fn for_output(config: &OutputConfig, compressed: bool) -> Self {
        Self {
            codec: config.codec.clone(),
            preset: config.preset.clone(),
            pixel_format: config.pixel_format.clone(),
            crf: if compressed { config.compressed_crf } else { config.crf },
            compressed,
        }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
        ]
    }
}
