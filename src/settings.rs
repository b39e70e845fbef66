//! Run settings loaded from a JSON file

use crate::proxy::labeler::{DEFAULT_BRAND, DEFAULT_EMOJI};
use crate::Result;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-probe timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 5.0;

/// Default output root
pub const DEFAULT_OUT_DIR: &str = "subscriptions";

/// Source locators, either as a plain list or as `{"files": [...]}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SourceList {
    Locators(Vec<String>),
    Files {
        #[serde(default)]
        files: Vec<String>,
    },
}

impl Default for SourceList {
    fn default() -> Self {
        SourceList::Locators(Vec::new())
    }
}

impl SourceList {
    pub fn locators(&self) -> &[String] {
        match self {
            SourceList::Locators(locators) => locators,
            SourceList::Files { files } => files,
        }
    }
}

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sources: SourceList,
    /// Per-probe connect timeout in seconds
    pub timeout: f64,
    pub out_dir: PathBuf,
    pub brands: Vec<String>,
    pub emojis: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: SourceList::default(),
            timeout: DEFAULT_TIMEOUT_SECS,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            brands: vec![DEFAULT_BRAND.to_string()],
            emojis: vec![DEFAULT_EMOJI.to_string()],
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("invalid settings in {}", path.display()))
    }

    /// Parse settings from JSON text, filling in defaults
    pub fn from_json(content: &str) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(content)?;
        match Duration::try_from_secs_f64(settings.timeout) {
            Ok(timeout) if !timeout.is_zero() => {}
            _ => bail!(
                "timeout must be a positive number of seconds, got {}",
                settings.timeout
            ),
        }
        if settings.brands.is_empty() {
            settings.brands = vec![DEFAULT_BRAND.to_string()];
        }
        if settings.emojis.is_empty() {
            settings.emojis = vec![DEFAULT_EMOJI.to_string()];
        }
        Ok(settings)
    }

    pub fn locators(&self) -> &[String] {
        self.sources.locators()
    }

    /// Per-probe timeout; out-of-range values set on a hand-built `Settings` fall back to the default
    pub fn probe_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }
}
