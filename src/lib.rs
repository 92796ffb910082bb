//! Docscan - multi-language declaration extraction for documentation.
//!
//! Docscan turns a source file into a language-agnostic description of its
//! declarations: functions, classes, interfaces, imports, exports, comments,
//! work markers and HTTP routes.
//!
//! # Architecture
//!
//! - `analysis`: the shared result model and one strategy per language
//!   (tree-sitter for TypeScript/JavaScript, an indentation scanner for
//!   Python, an external helper with a text-scanning fallback for Go)
//! - `resilience`: pre-parse checks, timeouts and the fallback chain that
//!   guarantee a result for every file
//! - `batch`: bounded-concurrency driver over many files
//! - `config`: YAML configuration
//! - `error`: error taxonomy and the structured error record
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/`. Implement `LanguageStrategy` and route the
//! extensions in `languages/mod.rs`.

pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod resilience;

use std::borrow::Cow;
use std::path::Path;

pub use analysis::{
    default_registry, AnalysisResult, Extraction, GoHelper, LanguageStrategy, SourceFile, Strategy,
    StrategyRegistry,
};
pub use batch::{BatchCoordinator, BatchReport, BatchSummary, CancellationHandle, FileStatus};
pub use config::{BatchOptions, Budget, EngineConfig};
pub use error::{AnalysisError, FileAccessError, ParseError, ResourceConstraintError};
pub use resilience::{HealthReport, HealthStatus, ResilientAnalyzer, ResilientOutcome};

/// Analyze one file with its language strategy only; no fallbacks.
///
/// `content`, when given, is analyzed verbatim instead of reading `path`.
pub fn analyze(path: &Path, content: Option<&str>) -> Result<AnalysisResult, AnalysisError> {
    let strategy = default_registry()
        .for_path(path)
        .ok_or_else(|| ParseError::UnsupportedLanguage {
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
        })?;

    let text = match content {
        Some(text) => Cow::Borrowed(text),
        None => {
            let bytes =
                std::fs::read(path).map_err(|e| FileAccessError::from_io(path, &e))?;
            Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
        }
    };

    let source = SourceFile::new(path, &text, content.is_none());
    Ok(strategy.analyze(&source)?.result)
}
