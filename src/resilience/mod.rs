//! Resilient analysis of a single file.
//!
//! Wraps one strategy invocation with pre-parse checks (readability, size,
//! memory, binary content), a per-file timeout and an ordered fallback
//! chain. The caller always gets a well-formed result:
//!
//! 1. the primary strategy (which may itself degrade, e.g. Go without its helper)
//! 2. the strategy's manual path, after the primary timed out; it gets its
//!    own `max_duration`, so a file is bounded by twice that limit
//! 3. the generic cross-language regex scan
//! 4. a minimal empty result
//!
//! Every error seen on the way is recorded as a [`StructuredError`].

pub mod generic;
mod health;

pub use health::{assess, ErrorWindow, HealthReport, HealthStatus, MemoryGuard, Reservation};

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use crate::analysis::{AnalysisResult, Extraction, LanguageStrategy, SourceFile, StrategyRegistry};
use crate::config::{Budget, EngineConfig, ResilienceConfig};
use crate::error::{
    AnalysisError, FileAccessError, ParseError, ResourceConstraintError, StructuredError,
};

/// Bytes inspected by the binary-content check.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;
/// Share of control bytes above which content counts as binary.
const BINARY_CONTROL_RATIO: f64 = 0.3;

/// Name recorded for the generic regex fallback.
pub const GENERIC_FALLBACK: &str = "generic";
/// Name recorded for the minimal empty result.
pub const MINIMAL_FALLBACK: &str = "minimal";

/// How deep into the fallback chain a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletenessLevel {
    Minimal,
    GenericSparse,
    Generic,
    LanguageFallback,
    Primary,
}

impl CompletenessLevel {
    pub fn score(&self) -> f64 {
        match self {
            CompletenessLevel::Primary => 1.0,
            CompletenessLevel::LanguageFallback => 0.8,
            CompletenessLevel::Generic => 0.6,
            CompletenessLevel::GenericSparse => 0.3,
            CompletenessLevel::Minimal => 0.0,
        }
    }
}

/// Why a file was refused before any strategy ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    FileAccess,
    Binary,
    Oversized,
    MemoryPressure,
}

/// Result of one resilient analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ResilientOutcome {
    pub path: PathBuf,
    pub result: AnalysisResult,
    /// Errors in the order they were encountered.
    pub errors: Vec<StructuredError>,
    /// Fallback paths actually used, in order.
    pub fallbacks_used: Vec<String>,
    pub completeness: f64,
    pub level: CompletenessLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<RejectReason>,
}

/// Errors and fallbacks collected while analyzing one file.
struct Trail<'a> {
    path: &'a Path,
    errors: Vec<StructuredError>,
    fallbacks: Vec<String>,
}

impl<'a> Trail<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            errors: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    fn error(&mut self, error: &AnalysisError) {
        self.errors.push(StructuredError::new(self.path, error));
    }

    fn fallback(&mut self, name: &str) {
        self.fallbacks.push(name.to_string());
    }

    fn finish(
        self,
        result: AnalysisResult,
        level: CompletenessLevel,
        rejected: Option<RejectReason>,
    ) -> ResilientOutcome {
        ResilientOutcome {
            path: self.path.to_path_buf(),
            result,
            errors: self.errors,
            fallbacks_used: self.fallbacks,
            completeness: level.score(),
            level,
            rejected,
        }
    }
}

/// Check for content that is not worth treating as text.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t' | 0x0c))
        .count();
    control as f64 / sample.len() as f64 > BINARY_CONTROL_RATIO
}

/// Language name used for results when no strategy claims the file.
fn fallback_language(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Run blocking strategy work under the per-file time limit.
async fn run_blocking<T, F>(limit: Duration, work: F) -> Result<T, AnalysisError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ParseError> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
        Err(_) => Err(ResourceConstraintError::Timeout { limit }.into()),
        Ok(Err(join)) => Err(AnalysisError::Unexpected(format!("strategy failed: {}", join))),
        Ok(Ok(result)) => result.map_err(AnalysisError::from),
    }
}

/// The resilience layer: strategies plus shared health state.
pub struct ResilientAnalyzer {
    registry: Arc<StrategyRegistry>,
    window: ErrorWindow,
    memory: MemoryGuard,
    strategy_invocations: AtomicUsize,
}

impl ResilientAnalyzer {
    /// Build from configuration, probing the Go helper once.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_registry(Arc::new(StrategyRegistry::new(config)), &config.resilience)
    }

    pub fn with_registry(registry: Arc<StrategyRegistry>, config: &ResilienceConfig) -> Self {
        Self {
            registry,
            window: ErrorWindow::new(config.error_window),
            memory: MemoryGuard::new(config.memory_budget),
            strategy_invocations: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Number of primary strategy invocations so far.
    pub fn strategy_invocations(&self) -> usize {
        self.strategy_invocations.load(Ordering::SeqCst)
    }

    /// Aggregate recent errors and memory pressure.
    pub fn health_status(&self) -> HealthReport {
        assess(&self.window.snapshot(), self.memory.pressure())
    }

    /// Analyze one file. Never fails; see the module docs for the chain.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn analyze_resilient(
        &self,
        path: &Path,
        content: Option<&[u8]>,
        budget: &Budget,
    ) -> ResilientOutcome {
        let outcome = self.analyze_inner(path, content, budget).await;
        for error in &outcome.errors {
            self.window.record(error.clone());
        }
        outcome
    }

    async fn analyze_inner(
        &self,
        path: &Path,
        content: Option<&[u8]>,
        budget: &Budget,
    ) -> ResilientOutcome {
        let mut trail = Trail::new(path);
        let strategy = self.registry.for_path(path);
        let language = strategy
            .map(|s| s.language_id().to_string())
            .unwrap_or_else(|| fallback_language(path));

        let (bytes, _reservation) = match self.load(path, content, budget).await {
            Ok(loaded) => loaded,
            Err((error, reason)) => {
                tracing::info!(error = %error, "file rejected before parsing");
                trail.error(&error);
                trail.fallback(MINIMAL_FALLBACK);
                return trail.finish(
                    generic::minimal(&language),
                    CompletenessLevel::Minimal,
                    Some(reason),
                );
            }
        };
        let text: Arc<str> = Arc::from(String::from_utf8_lossy(&bytes));
        drop(bytes);
        let from_disk = content.is_none();

        let Some(strategy) = strategy else {
            trail.error(
                &ParseError::UnsupportedLanguage {
                    extension: fallback_language(path),
                }
                .into(),
            );
            return self.generic(trail, &language, text);
        };

        self.strategy_invocations.fetch_add(1, Ordering::SeqCst);
        let primary = {
            let registry = Arc::clone(&self.registry);
            let path = path.to_path_buf();
            let text = Arc::clone(&text);
            run_blocking(budget.max_duration(), move || {
                let strategy = registry.for_path(&path).ok_or_else(|| {
                    ParseError::UnsupportedLanguage {
                        extension: fallback_language(&path),
                    }
                })?;
                strategy.analyze(&SourceFile::new(&path, &text, from_disk))
            })
            .await
        };

        let error = match primary {
            Ok(Extraction {
                result,
                degraded_to: None,
            }) => {
                tracing::debug!(strategy = strategy.name(), "primary strategy succeeded");
                return trail.finish(result, CompletenessLevel::Primary, None);
            }
            Ok(Extraction {
                result,
                degraded_to: Some(name),
            }) => {
                tracing::debug!(strategy = strategy.name(), fallback = name, "strategy degraded");
                trail.fallback(name);
                return trail.finish(result, CompletenessLevel::LanguageFallback, None);
            }
            Err(error) => error,
        };

        tracing::warn!(strategy = strategy.name(), error = %error, "primary strategy failed");
        let timed_out = matches!(
            error,
            AnalysisError::ResourceConstraint(ResourceConstraintError::Timeout { .. })
        );
        trail.error(&error);

        // The primary path already includes any manual degradation except
        // when it was cut off by the time limit.
        if timed_out {
            let registry = Arc::clone(&self.registry);
            let owned_path = path.to_path_buf();
            let manual_text = Arc::clone(&text);
            let manual = run_blocking(budget.max_duration(), move || {
                match registry.for_path(&owned_path) {
                    Some(strategy) => strategy
                        .manual_fallback(&SourceFile::new(&owned_path, &manual_text, from_disk))
                        .transpose(),
                    None => Ok(None),
                }
            })
            .await;
            match manual {
                Ok(Some(result)) => {
                    trail.fallback(strategy.manual_fallback_name());
                    return trail.finish(result, CompletenessLevel::LanguageFallback, None);
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(error = %error, "manual fallback failed");
                    trail.error(&error);
                }
            }
        }

        self.generic(trail, &language, text)
    }

    /// Generic regex scan, or the minimal result if even that fails.
    fn generic(&self, mut trail: Trail<'_>, language: &str, text: Arc<str>) -> ResilientOutcome {
        let scanned = panic::catch_unwind(AssertUnwindSafe(|| generic::extract(language, &text)));
        match scanned {
            Ok(result) => {
                trail.fallback(GENERIC_FALLBACK);
                let level = if result.has_declarations() {
                    CompletenessLevel::Generic
                } else {
                    CompletenessLevel::GenericSparse
                };
                tracing::debug!(?level, "generic fallback used");
                trail.finish(result, level, None)
            }
            Err(_) => {
                trail.error(&AnalysisError::Unexpected(
                    "generic fallback panicked".to_string(),
                ));
                trail.fallback(MINIMAL_FALLBACK);
                trail.finish(generic::minimal(language), CompletenessLevel::Minimal, None)
            }
        }
    }

    /// Obtain the bytes to analyze, refusing unreadable, oversized, binary
    /// or over-budget content. The reservation must be held until the
    /// analysis finishes.
    async fn load(
        &self,
        path: &Path,
        content: Option<&[u8]>,
        budget: &Budget,
    ) -> Result<(Vec<u8>, Reservation), (AnalysisError, RejectReason)> {
        let file_access = |e: FileAccessError| (AnalysisError::from(e), RejectReason::FileAccess);

        let size = match content {
            Some(bytes) => bytes.len() as u64,
            None => {
                let metadata = tokio::fs::metadata(path)
                    .await
                    .map_err(|e| file_access(FileAccessError::from_io(path, &e)))?;
                if !metadata.is_file() {
                    return Err(file_access(FileAccessError::Unreadable {
                        path: path.to_path_buf(),
                        reason: "not a regular file".to_string(),
                    }));
                }
                metadata.len()
            }
        };

        if size > budget.max_file_size {
            let error = ResourceConstraintError::FileTooLarge {
                size,
                limit: budget.max_file_size,
            };
            return Err((error.into(), RejectReason::Oversized));
        }

        let reservation = self
            .memory
            .reserve(size)
            .map_err(|e| (AnalysisError::from(e), RejectReason::MemoryPressure))?;

        let bytes = match content {
            Some(bytes) => bytes.to_vec(),
            None => tokio::fs::read(path)
                .await
                .map_err(|e| file_access(FileAccessError::from_io(path, &e)))?,
        };

        if looks_binary(&bytes) {
            let error = FileAccessError::Binary {
                path: path.to_path_buf(),
            };
            return Err((error.into(), RejectReason::Binary));
        }

        Ok((bytes, reservation))
    }
}
