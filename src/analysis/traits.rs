//! Core traits for language strategies.

use std::path::Path;

use super::AnalysisResult;
use crate::error::ParseError;

/// Source text handed to a strategy.
///
/// `from_disk` is false when the caller supplied in-memory content; such
/// content must be used verbatim, so strategies that would otherwise hand
/// the path to an external process must not do so.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub path: &'a Path,
    pub text: &'a str,
    pub from_disk: bool,
}

impl<'a> SourceFile<'a> {
    pub fn new(path: &'a Path, text: &'a str, from_disk: bool) -> Self {
        Self {
            path,
            text,
            from_disk,
        }
    }

    /// The file extension without the dot, or "".
    pub fn extension(&self) -> &str {
        self.path.extension().and_then(|e| e.to_str()).unwrap_or("")
    }
}

/// Result of one strategy invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub result: AnalysisResult,
    /// Name of the internal degraded path taken, if the strategy could not
    /// use its preferred extraction path.
    pub degraded_to: Option<&'static str>,
}

impl Extraction {
    pub fn clean(result: AnalysisResult) -> Self {
        Self {
            result,
            degraded_to: None,
        }
    }

    pub fn degraded(result: AnalysisResult, path: &'static str) -> Self {
        Self {
            result,
            degraded_to: Some(path),
        }
    }
}

/// Language strategy contract.
///
/// Each strategy builds a complete `AnalysisResult` from source text or
/// fails with a `ParseError`. Strategies never touch the filesystem for
/// the analyzed file and hold no per-file state between calls.
pub trait LanguageStrategy: Send + Sync {
    /// Strategy name used in logs and fallback lists (e.g., "tree-sitter").
    fn name(&self) -> &'static str;

    /// Language identifier written into results (e.g., "python").
    fn language_id(&self) -> &'static str;

    /// File extensions handled, without dot.
    fn file_extensions(&self) -> &'static [&'static str];

    /// Extract all facts from a source file.
    fn analyze(&self, source: &SourceFile<'_>) -> Result<Extraction, ParseError>;

    /// Language-specific manual extraction used when the primary path failed
    /// or timed out. `None` when the strategy has no separate manual path.
    fn manual_fallback(&self, _source: &SourceFile<'_>) -> Option<Result<AnalysisResult, ParseError>> {
        None
    }

    /// Name recorded when `manual_fallback` is used.
    fn manual_fallback_name(&self) -> &'static str {
        "manual"
    }

    /// Check if this strategy handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
