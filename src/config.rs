use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::preprocess::Normalization;

const DEFAULT_SOURCE_URL: &str = "stub://camera0";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SENSOR_ORIENTATION: i32 = 90;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 224;
const DEFAULT_STATS_INTERVAL_SECS: u64 = 5;

/// Memory layout of the model input tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    #[default]
    Nhwc,
    Nchw,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierdConfigFile {
    source: Option<SourceConfigFile>,
    display_rotation: Option<i32>,
    classifier: Option<ClassifierConfigFile>,
    normalization: Option<Normalization>,
    stats_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    sensor_orientation: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    layout: Option<TensorLayout>,
}

#[derive(Debug, Clone)]
pub struct ClassifierdConfig {
    pub source: SourceSettings,
    /// Display rotation in degrees, subtracted from the sensor orientation.
    pub display_rotation: i32,
    pub classifier: ClassifierSettings,
    pub normalization: Normalization,
    pub stats_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub sensor_orientation: i32,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub layout: TensorLayout,
}

impl ClassifierdConfig {
    /// Load from the file named by `CLASSIFIER_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CLASSIFIER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ClassifierdConfigFile) -> Self {
        let source = file.source.unwrap_or_default();
        let classifier = file.classifier.unwrap_or_default();
        Self {
            source: SourceSettings {
                url: source
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                sensor_orientation: source
                    .sensor_orientation
                    .unwrap_or(DEFAULT_SENSOR_ORIENTATION),
            },
            display_rotation: file.display_rotation.unwrap_or(0),
            classifier: ClassifierSettings {
                backend: classifier
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: classifier.model_path,
                labels_path: classifier.labels_path,
                input_width: classifier.input_width.unwrap_or(DEFAULT_INPUT_SIZE),
                input_height: classifier.input_height.unwrap_or(DEFAULT_INPUT_SIZE),
                layout: classifier.layout.unwrap_or_default(),
            },
            normalization: file.normalization.unwrap_or_default(),
            stats_interval: Duration::from_secs(
                file.stats_interval_secs
                    .unwrap_or(DEFAULT_STATS_INTERVAL_SECS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("CLASSIFIER_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(backend) = std::env::var("CLASSIFIER_BACKEND") {
            if !backend.trim().is_empty() {
                self.classifier.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("CLASSIFIER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.classifier.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("CLASSIFIER_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.classifier.labels_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(rotation) = std::env::var("CLASSIFIER_DISPLAY_ROTATION") {
            self.display_rotation = rotation.trim().parse().map_err(|_| {
                anyhow!("CLASSIFIER_DISPLAY_ROTATION must be an integer number of degrees")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.classifier.input_width == 0 || self.classifier.input_height == 0 {
            return Err(anyhow!(
                "classifier input width and height must be greater than zero"
            ));
        }
        if self.display_rotation % 90 != 0 {
            return Err(anyhow!(
                "display_rotation must be a multiple of 90, got {}",
                self.display_rotation
            ));
        }
        if self.source.sensor_orientation % 90 != 0 {
            return Err(anyhow!(
                "source sensor_orientation must be a multiple of 90, got {}",
                self.source.sensor_orientation
            ));
        }
        if self.normalization.stddev == 0.0 || !self.normalization.stddev.is_finite() {
            return Err(anyhow!("normalization stddev must be finite and non-zero"));
        }
        if self.classifier.backend == "tract"
            && (self.classifier.model_path.is_none() || self.classifier.labels_path.is_none())
        {
            return Err(anyhow!(
                "tract backend requires classifier.model_path and classifier.labels_path"
            ));
        }
        Ok(())
    }

    /// Time between frames at the configured rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.source.target_fps.max(1) as u64)
    }
}

fn read_config_file(path: &Path) -> Result<ClassifierdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
