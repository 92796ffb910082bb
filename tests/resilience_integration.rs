//! Integration tests for the fallback chain and pre-parse checks.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docscan::config::ResilienceConfig;
use docscan::error::{ErrorCategory, Severity};
use docscan::resilience::{CompletenessLevel, RejectReason, GENERIC_FALLBACK, MINIMAL_FALLBACK};
use docscan::{Budget, EngineConfig, HealthStatus, ResilientAnalyzer, StrategyRegistry};
use tempfile::TempDir;

fn testdata(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

fn analyzer() -> ResilientAnalyzer {
    ResilientAnalyzer::with_registry(
        Arc::new(StrategyRegistry::with_go_helper(None)),
        &ResilienceConfig::default(),
    )
}

#[cfg(feature = "tree-sitter")]
#[tokio::test]
async fn test_unbalanced_class_falls_back_to_generic() {
    let analyzer = analyzer();
    let outcome = analyzer
        .analyze_resilient(&testdata("broken.ts"), None, &Budget::default())
        .await;

    assert_eq!(outcome.level, CompletenessLevel::Generic);
    assert!(outcome.completeness > 0.0 && outcome.completeness < 1.0);
    assert_eq!(outcome.fallbacks_used, vec![GENERIC_FALLBACK]);
    assert!(outcome
        .errors
        .iter()
        .any(|e| e.category == ErrorCategory::Parse && e.severity == Severity::Medium));

    let names: Vec<_> = outcome.result.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["formatName", "trailingHelper"]);
    assert!(outcome.result.classes.iter().any(|c| c.name == "Broken"));
    assert_eq!(analyzer.strategy_invocations(), 1);
}

#[tokio::test]
async fn test_go_scan_error_falls_back_to_generic() {
    let analyzer = analyzer();
    let source = b"package main\n\nfunc Open() {\n/* never closed\n";
    let outcome = analyzer
        .analyze_resilient(Path::new("open.go"), Some(source.as_slice()), &Budget::default())
        .await;

    assert_eq!(outcome.level, CompletenessLevel::Generic);
    assert_eq!(outcome.completeness, 0.6);
    assert_eq!(outcome.fallbacks_used, vec![GENERIC_FALLBACK]);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].category, ErrorCategory::Parse);
    assert_eq!(outcome.result.functions[0].name, "Open");
    assert!(outcome.result.exports.is_empty());
}

#[tokio::test]
async fn test_oversized_file_is_rejected_before_parsing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("huge.ts");
    // Sparse file: 50 MB on paper, nothing written.
    let file = fs::File::create(&path).unwrap();
    file.set_len(50 * 1024 * 1024).unwrap();
    drop(file);

    let analyzer = analyzer();
    let budget = Budget {
        max_file_size: 10 * 1024 * 1024,
        ..Budget::default()
    };
    let outcome = analyzer.analyze_resilient(&path, None, &budget).await;

    assert_eq!(outcome.rejected, Some(RejectReason::Oversized));
    assert_eq!(outcome.completeness, 0.0);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].category, ErrorCategory::ResourceConstraint);
    assert_eq!(outcome.fallbacks_used, vec![MINIMAL_FALLBACK]);
    assert!(!outcome.result.has_declarations());
    assert_eq!(analyzer.strategy_invocations(), 0);
}

#[tokio::test]
async fn test_binary_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blob.py");
    fs::write(&path, [0x7f, b'E', b'L', b'F', 0, 0, 1, 2]).unwrap();

    let analyzer = analyzer();
    let outcome = analyzer.analyze_resilient(&path, None, &Budget::default()).await;

    assert_eq!(outcome.rejected, Some(RejectReason::Binary));
    assert_eq!(outcome.errors[0].category, ErrorCategory::FileAccess);
    assert_eq!(outcome.errors[0].severity, Severity::Low);
    assert_eq!(analyzer.strategy_invocations(), 0);
}

#[tokio::test]
async fn test_missing_file_yields_minimal_result() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gone.go");

    let analyzer = analyzer();
    let outcome = analyzer.analyze_resilient(&path, None, &Budget::default()).await;

    assert_eq!(outcome.rejected, Some(RejectReason::FileAccess));
    assert_eq!(outcome.level, CompletenessLevel::Minimal);
    assert_eq!(outcome.result.language, "go");
    assert_eq!(outcome.errors[0].file, path.to_string_lossy());
    assert_eq!(outcome.errors[0].message, "The file does not exist.");
    assert!(outcome.errors[0].detail.contains("gone.go"));
}

#[tokio::test]
async fn test_primary_success_scores_full() {
    let analyzer = analyzer();
    let outcome = analyzer
        .analyze_resilient(&testdata("service.py"), None, &Budget::default())
        .await;

    assert_eq!(outcome.level, CompletenessLevel::Primary);
    assert_eq!(outcome.completeness, 1.0);
    assert!(outcome.errors.is_empty());
    assert!(outcome.fallbacks_used.is_empty());
    assert_eq!(analyzer.health_status().status, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_go_without_helper_scores_language_fallback() {
    let analyzer = analyzer();
    let outcome = analyzer
        .analyze_resilient(&testdata("server.go"), None, &Budget::default())
        .await;

    assert_eq!(outcome.level, CompletenessLevel::LanguageFallback);
    assert_eq!(outcome.completeness, 0.8);
    assert_eq!(outcome.fallbacks_used, vec!["go-manual"]);
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn test_config_loaded_analyzer_handles_in_memory_content() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("docscan.yaml"),
        "budget:\n  max_file_size: 64\nhelper:\n  go_parser: /nonexistent/go-parser\n",
    )
    .unwrap();
    let config = EngineConfig::load(None, dir.path()).unwrap();
    assert_eq!(config.budget.max_file_size, 64);

    let analyzer = ResilientAnalyzer::new(&config);
    let outcome = analyzer
        .analyze_resilient(
            Path::new("virtual.py"),
            Some(b"def f():\n    pass\n".as_slice()),
            &config.budget,
        )
        .await;
    assert_eq!(outcome.level, CompletenessLevel::Primary);
    assert_eq!(outcome.result.functions[0].name, "f");

    let too_big = vec![b'x'; 65];
    let outcome = analyzer
        .analyze_resilient(Path::new("virtual.py"), Some(too_big.as_slice()), &config.budget)
        .await;
    assert_eq!(outcome.rejected, Some(RejectReason::Oversized));
}

#[cfg(unix)]
mod helper_process {
    use super::*;
    use docscan::GoHelper;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn analyzer_with(helper: GoHelper) -> ResilientAnalyzer {
        ResilientAnalyzer::with_registry(
            Arc::new(StrategyRegistry::with_go_helper(Some(helper))),
            &ResilienceConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_failing_helper_degrades_to_manual() {
        let dir = TempDir::new().unwrap();
        let failing = script(dir.path(), "go-parser", "echo 'cannot parse' >&2\nexit 1");
        let analyzer = analyzer_with(GoHelper::new(failing, Duration::from_secs(5)));

        let outcome = analyzer
            .analyze_resilient(&testdata("server.go"), None, &Budget::default())
            .await;

        assert_eq!(outcome.fallbacks_used, vec!["go-manual"]);
        assert_eq!(outcome.completeness, 0.8);
        assert!(outcome.errors.is_empty());
        assert!(outcome.result.classes.iter().any(|c| c.name == "Server"));
    }

    #[tokio::test]
    async fn test_timed_out_primary_runs_manual_within_two_budgets() {
        let dir = TempDir::new().unwrap();
        let slow = script(dir.path(), "go-parser", "sleep 10");
        // The helper outlives the file budget, so the primary attempt times out.
        let analyzer = analyzer_with(GoHelper::new(slow, Duration::from_secs(1)));
        let budget = Budget {
            max_duration_ms: 200,
            ..Budget::default()
        };

        let started = std::time::Instant::now();
        let outcome = analyzer
            .analyze_resilient(&testdata("server.go"), None, &budget)
            .await;
        let elapsed = started.elapsed();

        assert_eq!(outcome.level, CompletenessLevel::LanguageFallback);
        assert_eq!(outcome.fallbacks_used, vec!["go-manual"]);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].category, ErrorCategory::ResourceConstraint);
        assert_eq!(outcome.errors[0].severity, Severity::High);
        assert!(elapsed < budget.max_duration() * 2 + Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_hanging_helper_degrades_to_manual() {
        let dir = TempDir::new().unwrap();
        let slow = script(dir.path(), "go-parser", "sleep 10");
        let analyzer = analyzer_with(GoHelper::new(slow, Duration::from_millis(200)));

        let outcome = analyzer
            .analyze_resilient(&testdata("server.go"), None, &Budget::default())
            .await;

        assert_eq!(outcome.level, CompletenessLevel::LanguageFallback);
        assert_eq!(outcome.fallbacks_used, vec!["go-manual"]);
        assert!(outcome.result.functions.iter().any(|f| f.name == "NewServer"));
    }

    #[tokio::test]
    async fn test_helper_output_is_used_when_valid() {
        let dir = TempDir::new().unwrap();
        let json = r#"{"package":{"name":"server"},"functions":[{"name":"NewServer","startLine":21,"endLine":23,"isExported":true}]}"#;
        let helper = script(dir.path(), "go-parser", &format!("echo '{}'", json));
        let analyzer = analyzer_with(GoHelper::new(helper, Duration::from_secs(5)));

        let outcome = analyzer
            .analyze_resilient(&testdata("server.go"), None, &Budget::default())
            .await;

        assert_eq!(outcome.level, CompletenessLevel::Primary);
        assert!(outcome.fallbacks_used.is_empty());
        assert_eq!(outcome.result.package.as_deref(), Some("server"));
        assert_eq!(outcome.result.functions.len(), 1);
        assert!(outcome.result.functions[0].is_exported);
    }
}
