//! Persistent service configuration.
//!
//! Stored as JSON in a platform-appropriate config directory. Missing fields
//! take their defaults, so older files keep loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vision::{FuzzyMatcher, Region};

/// Overrides the directory holding `templates/` and `ScreenDebug/`.
pub const DATA_DIR_ENV: &str = "SCOUT_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture region; `None` means the whole virtual desktop.
    pub region: Option<Region>,

    /// Pause between two grabs of the capture loop.
    pub capture_interval_ms: u64,

    /// How long a query waits for the first frame.
    pub capture_wait_ms: u64,

    /// How long `start` waits for the loop to produce a frame.
    pub ready_timeout_ms: u64,

    /// Words below this OCR confidence (0-100) are dropped.
    pub ocr_confidence: f32,

    /// Fuzzy thresholds supplied by callers are clamped to this.
    pub threshold_ceiling: f32,
    pub long_line_ratio: f32,
    pub long_line_penalty: f32,

    /// Template image directory. Defaults to `<data dir>/templates`.
    pub template_dir: Option<PathBuf>,

    pub debug: bool,
    /// Debug artifact directory. Defaults to `<data dir>/ScreenDebug`.
    pub debug_dir: Option<PathBuf>,

    /// Prefix of the recognition model files, e.g. `latin`.
    pub ocr_language: String,
}

impl Default for Config {
    fn default() -> Self {
        let fuzzy = FuzzyMatcher::default();
        Self {
            region: None,
            capture_interval_ms: 100,
            capture_wait_ms: 1000,
            ready_timeout_ms: 2000,
            ocr_confidence: vision::TextRecognizer::DEFAULT_MIN_CONFIDENCE,
            threshold_ceiling: fuzzy.threshold_ceiling,
            long_line_ratio: fuzzy.long_line_ratio,
            long_line_penalty: fuzzy.long_line_penalty,
            template_dir: None,
            debug: false,
            debug_dir: None,
            ocr_language: "latin".to_string(),
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("scout").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults on any failure.
    pub fn load_or_default() -> Self {
        match Self::try_load() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to load config; using defaults");
                Self::default()
            }
        }
    }

    pub fn try_load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Missing file reads as defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        Ok(cfg)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    pub fn fuzzy(&self) -> FuzzyMatcher {
        FuzzyMatcher {
            threshold_ceiling: self.threshold_ceiling,
            long_line_ratio: self.long_line_ratio,
            long_line_penalty: self.long_line_penalty,
        }
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn capture_wait(&self) -> Duration {
        Duration::from_millis(self.capture_wait_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn template_dir(&self) -> PathBuf {
        self.template_dir.clone().unwrap_or_else(|| data_root().join("templates"))
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.debug_dir.clone().unwrap_or_else(default_debug_dir)
    }
}

/// Root for runtime data, `$SCOUT_DATA_DIR` or the platform data dir.
pub fn data_root() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("scout"))
        .unwrap_or_else(|| PathBuf::from("Data"))
}

pub fn default_debug_dir() -> PathBuf {
    data_root().join("ScreenDebug")
}
