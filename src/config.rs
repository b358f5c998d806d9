use std::fmt::Display;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::OptionLabel;

/// Tunables for one evaluation run. Every value here is resolution
/// dependent, so scanners at a different DPI need their own config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationConfig {
    pub preprocess: PreprocessOptions,
    pub bubbles: BubbleAreaBand,
    pub grid: GridOptions,
    pub marks: MarkThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreprocessOptions {
    /// Side length of the Gaussian kernel. Must be odd.
    pub blur_kernel_size: u32,
    /// Pixels at or below this intensity become foreground.
    pub threshold: u8,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            blur_kernel_size: 7,
            threshold: 120,
        }
    }
}

impl PreprocessOptions {
    /// Gaussian sigma for the configured kernel size.
    pub fn blur_sigma(&self) -> f32 {
        0.3 * ((self.blur_kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }
}

/// Contour areas (in square pixels) that count as a bubble. Both bounds are
/// exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BubbleAreaBand {
    pub min_area: f64,
    pub max_area: f64,
}

impl Default for BubbleAreaBand {
    fn default() -> Self {
        Self {
            min_area: 250.0,
            max_area: 600.0,
        }
    }
}

impl BubbleAreaBand {
    pub fn contains(&self, area: f64) -> bool {
        self.min_area < area && area < self.max_area
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridOptions {
    /// Labels assigned top to bottom within each question. The number of
    /// labels is the group size.
    pub option_labels: String,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            option_labels: "ABCDE".to_string(),
        }
    }
}

impl GridOptions {
    pub fn labels(&self) -> Vec<OptionLabel> {
        self.option_labels.chars().collect()
    }

    pub fn group_size(&self) -> usize {
        self.option_labels.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkThresholds {
    /// A bubble is marked when its fill ratio is strictly greater than this.
    pub fill_ratio: f32,
}

impl Default for MarkThresholds {
    fn default() -> Self {
        Self { fill_ratio: 0.5 }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "cannot parse config: {}", e),
            ConfigError::Invalid(reason) => write!(f, "invalid config: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EvaluationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: EvaluationConfig = serde_json::from_str(&json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let kernel = self.preprocess.blur_kernel_size;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "blur kernel size must be odd and positive, got {}",
                kernel
            )));
        }

        let band = &self.bubbles;
        if !(band.min_area >= 0.0 && band.min_area < band.max_area) {
            return Err(ConfigError::Invalid(format!(
                "bubble area band {}..{} is empty or negative",
                band.min_area, band.max_area
            )));
        }

        let labels = self.grid.labels();
        if labels.is_empty() {
            return Err(ConfigError::Invalid("option labels are empty".to_string()));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(ConfigError::Invalid(format!(
                    "option label {:?} is repeated",
                    label
                )));
            }
        }

        let fill_ratio = self.marks.fill_ratio;
        if !(0.0..=1.0).contains(&fill_ratio) {
            return Err(ConfigError::Invalid(format!(
                "fill ratio threshold must be within 0..=1, got {}",
                fill_ratio
            )));
        }

        Ok(())
    }
}
