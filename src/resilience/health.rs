//! Error window and memory accounting behind the health query.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{ErrorCategory, ResourceConstraintError, Severity, StructuredError};

/// Share of the memory budget at which the engine counts as degraded.
const DEGRADED_PRESSURE: f64 = 0.7;
/// Share of the memory budget at which the engine counts as critical.
const CRITICAL_PRESSURE: f64 = 0.9;
const CRITICAL_HIGH_ERRORS: usize = 10;
const DEGRADED_MEDIUM_ERRORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Critical => "critical",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot returned by the health query.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub recommendations: Vec<String>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    /// In-flight bytes as a share of the memory budget.
    pub memory_pressure: f64,
    /// Errors currently held in the window.
    pub recent_errors: usize,
}

/// Bounded window of recently recorded errors.
#[derive(Debug)]
pub struct ErrorWindow {
    capacity: usize,
    errors: Mutex<VecDeque<StructuredError>>,
}

impl ErrorWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            errors: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, error: StructuredError) {
        // A poisoned lock only means another recorder panicked mid-push.
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        if errors.len() == self.capacity {
            errors.pop_front();
        }
        errors.push_back(error);
    }

    pub fn snapshot(&self) -> Vec<StructuredError> {
        let errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.iter().cloned().collect()
    }
}

/// Tracks bytes of source currently being analyzed.
#[derive(Debug)]
pub struct MemoryGuard {
    budget: u64,
    in_flight: Arc<AtomicU64>,
}

/// Bytes held by one analysis; released on drop.
#[derive(Debug)]
pub struct Reservation {
    bytes: u64,
    in_flight: Arc<AtomicU64>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(self.bytes, Ordering::SeqCst);
    }
}

impl MemoryGuard {
    pub fn new(budget: u64) -> Self {
        Self {
            budget: budget.max(1),
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reserve `bytes`, failing when the budget would be exceeded.
    pub fn reserve(&self, bytes: u64) -> Result<Reservation, ResourceConstraintError> {
        let mut current = self.in_flight.load(Ordering::SeqCst);
        loop {
            let available = self.budget.saturating_sub(current);
            if bytes > available {
                return Err(ResourceConstraintError::MemoryPressure {
                    requested: bytes,
                    available,
                });
            }
            match self.in_flight.compare_exchange(
                current,
                current + bytes,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Ok(Reservation {
                        bytes,
                        in_flight: Arc::clone(&self.in_flight),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn pressure(&self) -> f64 {
        self.in_flight.load(Ordering::SeqCst) as f64 / self.budget as f64
    }
}

/// Derive the health report from recorded errors and memory pressure.
pub fn assess(errors: &[StructuredError], memory_pressure: f64) -> HealthReport {
    let mut by_severity = BTreeMap::new();
    let mut by_category = BTreeMap::new();
    for error in errors {
        *by_severity.entry(error.severity).or_insert(0) += 1;
        *by_category.entry(error.category).or_insert(0) += 1;
    }
    let count = |severity| by_severity.get(&severity).copied().unwrap_or(0);
    let critical = count(Severity::Critical);
    let high = count(Severity::High);
    let medium = count(Severity::Medium);

    let status = if critical > 0
        || high >= CRITICAL_HIGH_ERRORS
        || memory_pressure >= CRITICAL_PRESSURE
    {
        HealthStatus::Critical
    } else if high > 0 || medium >= DEGRADED_MEDIUM_ERRORS || memory_pressure >= DEGRADED_PRESSURE
    {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let mut recommendations = Vec::new();
    if critical > 0 {
        recommendations.push(
            "Internal failures occurred; report the affected files along with the error details."
                .to_string(),
        );
    }
    if high > 0 {
        recommendations.push(
            "Analyses are timing out or running out of memory; raise budget.max_duration_ms or lower batch.max_concurrency."
                .to_string(),
        );
    }
    if memory_pressure >= DEGRADED_PRESSURE {
        recommendations.push(
            "Memory pressure is high; lower batch.max_concurrency or raise resilience.memory_budget."
                .to_string(),
        );
    }
    if medium >= DEGRADED_MEDIUM_ERRORS {
        recommendations.push(
            "Many files failed to parse; their results come from fallback extraction and may be incomplete."
                .to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push("No action needed.".to_string());
    }

    HealthReport {
        status,
        recommendations,
        by_severity,
        by_category,
        memory_pressure,
        recent_errors: errors.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalysisError, ParseError};
    use std::path::Path;
    use std::time::Duration;

    fn parse_error() -> StructuredError {
        let err: AnalysisError = ParseError::Unbalanced {
            what: "braces",
            line: 3,
        }
        .into();
        StructuredError::new(Path::new("a.go"), &err)
    }

    fn timeout() -> StructuredError {
        let err: AnalysisError = ResourceConstraintError::Timeout {
            limit: Duration::from_secs(1),
        }
        .into();
        StructuredError::new(Path::new("b.ts"), &err)
    }

    #[test]
    fn test_status_thresholds() {
        let report = assess(&[], 0.0);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.recommendations, vec!["No action needed."]);

        let report = assess(&[parse_error()], 0.0);
        assert_eq!(report.status, HealthStatus::Healthy);

        let errors: Vec<_> = (0..5).map(|_| parse_error()).collect();
        let report = assess(&errors, 0.0);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.by_category[&ErrorCategory::Parse], 5);

        assert_eq!(assess(&[timeout()], 0.0).status, HealthStatus::Degraded);
        assert_eq!(assess(&[], 0.75).status, HealthStatus::Degraded);
        assert_eq!(assess(&[], 0.95).status, HealthStatus::Critical);

        let errors: Vec<_> = (0..10).map(|_| timeout()).collect();
        assert_eq!(assess(&errors, 0.0).status, HealthStatus::Critical);

        let panic = StructuredError::new(Path::new("c.py"), &AnalysisError::Unexpected("boom".into()));
        assert_eq!(assess(&[panic], 0.0).status, HealthStatus::Critical);
    }

    #[test]
    fn test_window_drops_oldest() {
        let window = ErrorWindow::new(2);
        window.record(parse_error());
        window.record(timeout());
        window.record(timeout());
        let kept = window.snapshot();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|e| e.severity == Severity::High));
    }

    #[test]
    fn test_memory_reservations() {
        let guard = MemoryGuard::new(100);
        let first = guard.reserve(60).unwrap();
        assert!((guard.pressure() - 0.6).abs() < f64::EPSILON);
        assert!(matches!(
            guard.reserve(50),
            Err(ResourceConstraintError::MemoryPressure { available: 40, .. })
        ));
        drop(first);
        assert_eq!(guard.pressure(), 0.0);
        assert!(guard.reserve(100).is_ok());
    }
}
