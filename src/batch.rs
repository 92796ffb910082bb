//! Bounded-concurrency analysis of many files.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future;
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;

use crate::config::{BatchOptions, Budget};
use crate::resilience::{HealthReport, RejectReason, ResilientAnalyzer, ResilientOutcome};

/// Why a file was not analyzed (or analyzed only to be refused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Excluded,
    Binary,
    Oversized,
    /// Never admitted because the batch was cancelled or stopped.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FileStatus {
    Successful,
    Partial,
    Failed,
    Skipped(SkipReason),
}

/// Per-file entry of a batch report.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Absent for files that were never analyzed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ResilientOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    fn count(&mut self, status: FileStatus) {
        self.total += 1;
        match status {
            FileStatus::Successful => self.successful += 1,
            FileStatus::Partial => self.partial += 1,
            FileStatus::Failed => self.failed += 1,
            FileStatus::Skipped(_) => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub summary: BatchSummary,
    pub health: HealthReport,
}

/// Handle that stops a running batch from admitting more files.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Classify a finished analysis.
pub fn classify(outcome: &ResilientOutcome) -> FileStatus {
    match outcome.rejected {
        Some(RejectReason::Binary) => FileStatus::Skipped(SkipReason::Binary),
        Some(RejectReason::Oversized) => FileStatus::Skipped(SkipReason::Oversized),
        _ if outcome.errors.is_empty() && outcome.rejected.is_none() => FileStatus::Successful,
        _ if outcome.completeness > 0.5 => FileStatus::Partial,
        _ => FileStatus::Failed,
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).map_err(|e| anyhow::anyhow!("invalid glob {:?}: {}", pattern, e))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Drives the resilience layer over a set of files.
pub struct BatchCoordinator {
    analyzer: Arc<ResilientAnalyzer>,
    budget: Budget,
    cancel: CancellationHandle,
}

impl BatchCoordinator {
    pub fn new(analyzer: Arc<ResilientAnalyzer>, budget: Budget) -> Self {
        Self {
            analyzer,
            budget,
            cancel: CancellationHandle::default(),
        }
    }

    pub fn analyzer(&self) -> &ResilientAnalyzer {
        &self.analyzer
    }

    /// Handle for cancelling batches run by this coordinator. Files already
    /// admitted run to their own terminal state.
    pub fn cancellation(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Analyze `paths` with at most `options.max_concurrency` files in
    /// flight. Prioritized matches run first; excluded matches are skipped.
    ///
    /// Only an invalid glob makes this fail; per-file problems are reported
    /// in the outcomes.
    pub async fn analyze_batch(
        &self,
        paths: &[PathBuf],
        options: &BatchOptions,
    ) -> anyhow::Result<BatchReport> {
        let excluded = build_globset(&options.excluded)?;
        let prioritized = build_globset(&options.prioritized)?;

        let mut skipped = Vec::new();
        let (mut queue, rest): (Vec<&PathBuf>, Vec<&PathBuf>) = paths
            .iter()
            .filter(|path| {
                if excluded.is_match(path) {
                    skipped.push(FileOutcome {
                        path: (*path).clone(),
                        status: FileStatus::Skipped(SkipReason::Excluded),
                        outcome: None,
                    });
                    false
                } else {
                    true
                }
            })
            .partition(|path| prioritized.is_match(path));
        queue.extend(rest);

        tracing::info!(
            files = queue.len(),
            excluded = skipped.len(),
            concurrency = options.max_concurrency,
            "starting batch"
        );

        let stop = AtomicBool::new(false);
        let stop = &stop;
        let budget = &self.budget;
        let analyzer = &self.analyzer;
        let continue_on_error = options.continue_on_error;

        let finished: Vec<(usize, ResilientOutcome)> = stream::iter(queue.iter().copied().enumerate())
            .take_while(|_| {
                let admit = !self.cancel.is_cancelled() && !stop.load(Ordering::SeqCst);
                if !admit {
                    tracing::info!("batch admission stopped");
                }
                future::ready(admit)
            })
            .map(|(index, path)| async move {
                let outcome = analyzer.analyze_resilient(path, None, budget).await;
                if !continue_on_error && classify(&outcome) == FileStatus::Failed {
                    stop.store(true, Ordering::SeqCst);
                }
                (index, outcome)
            })
            .buffer_unordered(options.max_concurrency.max(1))
            .collect()
            .await;

        // Single accumulation point: slot outcomes back into queue order.
        let mut slots: Vec<Option<ResilientOutcome>> = vec![None; queue.len()];
        for (index, outcome) in finished {
            slots[index] = Some(outcome);
        }

        let mut summary = BatchSummary::default();
        let mut outcomes = Vec::with_capacity(paths.len());
        for (path, slot) in queue.into_iter().zip(slots) {
            let status = match &slot {
                Some(outcome) => classify(outcome),
                None => FileStatus::Skipped(SkipReason::Cancelled),
            };
            summary.count(status);
            outcomes.push(FileOutcome {
                path: path.clone(),
                status,
                outcome: slot,
            });
        }
        for outcome in skipped {
            summary.count(outcome.status);
            outcomes.push(outcome);
        }

        tracing::info!(
            total = summary.total,
            successful = summary.successful,
            partial = summary.partial,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch finished"
        );

        Ok(BatchReport {
            outcomes,
            summary,
            health: self.analyzer.health_status(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResult;
    use crate::error::{AnalysisError, ParseError, StructuredError};
    use crate::resilience::CompletenessLevel;
    use std::path::Path;

    fn outcome(level: CompletenessLevel, errors: usize, rejected: Option<RejectReason>) -> ResilientOutcome {
        let error: AnalysisError = ParseError::Unbalanced {
            what: "braces",
            line: 1,
        }
        .into();
        ResilientOutcome {
            path: PathBuf::from("a.go"),
            result: AnalysisResult::new("go"),
            errors: (0..errors)
                .map(|_| StructuredError::new(Path::new("a.go"), &error))
                .collect(),
            fallbacks_used: Vec::new(),
            completeness: level.score(),
            level,
            rejected,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&outcome(CompletenessLevel::Primary, 0, None)),
            FileStatus::Successful
        );
        assert_eq!(
            classify(&outcome(CompletenessLevel::LanguageFallback, 0, None)),
            FileStatus::Successful
        );
        assert_eq!(
            classify(&outcome(CompletenessLevel::Generic, 1, None)),
            FileStatus::Partial
        );
        assert_eq!(
            classify(&outcome(CompletenessLevel::GenericSparse, 1, None)),
            FileStatus::Failed
        );
        assert_eq!(
            classify(&outcome(CompletenessLevel::Minimal, 1, Some(RejectReason::Oversized))),
            FileStatus::Skipped(SkipReason::Oversized)
        );
        assert_eq!(
            classify(&outcome(CompletenessLevel::Minimal, 1, Some(RejectReason::FileAccess))),
            FileStatus::Failed
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = BatchSummary::default();
        summary.count(FileStatus::Successful);
        summary.count(FileStatus::Skipped(SkipReason::Excluded));
        summary.count(FileStatus::Failed);
        assert_eq!(
            summary,
            BatchSummary {
                total: 3,
                successful: 1,
                partial: 0,
                failed: 1,
                skipped: 1,
            }
        );
    }

    #[test]
    fn test_invalid_glob() {
        assert!(build_globset(&["src/[".to_string()]).is_err());
        let set = build_globset(&["**/vendor/**".to_string()]).unwrap();
        assert!(set.is_match("a/vendor/b.go"));
    }

    #[test]
    fn test_cancellation_handle_is_shared() {
        let handle = CancellationHandle::default();
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
    }
}
