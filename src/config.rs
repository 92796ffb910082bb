//! Engine configuration.
//!
//! Loaded from a YAML file; every field has a default so an empty file or
//! no file at all yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["docscan.yaml", ".docscan.yaml"];

/// Environment variable naming an explicit Go helper binary.
pub const GO_PARSER_ENV: &str = "DOCSCAN_GO_PARSER";

/// Helper binary name looked up on `PATH`.
pub const GO_PARSER_BIN: &str = "go-parser";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub batch: BatchOptions,
    #[serde(default)]
    pub helper: HelperConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

impl EngineConfig {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        // serde_yaml rejects an empty document for a struct.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from an explicit path, or discover one in `dir`, or fall back
    /// to defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Self> {
        let config = match explicit {
            Some(path) => Self::parse_file(path)?,
            None => match discover(dir) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "using discovered config");
                    Self::parse_file(path)?
                }
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check option values that would make the engine unusable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch.max_concurrency == 0 {
            anyhow::bail!("batch.max_concurrency must be at least 1");
        }
        if self.budget.max_duration_ms == 0 {
            anyhow::bail!("budget.max_duration_ms must be at least 1");
        }
        for pattern in self.batch.prioritized.iter().chain(&self.batch.excluded) {
            globset::Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid glob {:?}: {}", pattern, e))?;
        }
        Ok(())
    }
}

/// Discover a configuration file in a directory.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Per-file resource budget.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct Budget {
    /// Largest file, in bytes, that is analyzed at all.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Wall-clock limit for one strategy invocation. A file whose primary
    /// strategy times out gets one more invocation (its manual path) under
    /// the same limit, so a file can take up to twice this long.
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_duration_ms: default_max_duration_ms(),
        }
    }
}

impl Budget {
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }
}

/// Options for one batch run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BatchOptions {
    /// Keep admitting files after one fails (default: true).
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Glob patterns for paths analyzed first.
    #[serde(default)]
    pub prioritized: Vec<String>,
    /// Glob patterns for paths skipped entirely.
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            max_concurrency: default_max_concurrency(),
            prioritized: Vec::new(),
            excluded: Vec::new(),
        }
    }
}

/// External helper settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HelperConfig {
    /// Explicit Go helper binary. When unset, `DOCSCAN_GO_PARSER` and then
    /// `PATH` are searched.
    #[serde(default)]
    pub go_parser: Option<PathBuf>,
    #[serde(default = "default_helper_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            go_parser: None,
            timeout_ms: default_helper_timeout_ms(),
        }
    }
}

impl HelperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Resilience layer settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ResilienceConfig {
    /// Bytes of source that may be in flight across concurrent analyses.
    #[serde(default = "default_memory_budget")]
    pub memory_budget: u64,
    /// Number of recent errors kept for health reporting.
    #[serde(default = "default_error_window")]
    pub error_window: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            memory_budget: default_memory_budget(),
            error_window: default_error_window(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_duration_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_helper_timeout_ms() -> u64 {
    10_000
}

fn default_memory_budget() -> u64 {
    512 * 1024 * 1024
}

fn default_error_window() -> usize {
    256
}
