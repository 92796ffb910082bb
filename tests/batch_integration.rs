//! Integration tests for batch analysis.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use docscan::batch::SkipReason;
use docscan::config::ResilienceConfig;
use docscan::{
    BatchCoordinator, BatchOptions, BatchSummary, Budget, FileStatus, HealthStatus,
    ResilientAnalyzer, StrategyRegistry,
};
use tempfile::TempDir;

fn coordinator() -> BatchCoordinator {
    let analyzer = ResilientAnalyzer::with_registry(
        Arc::new(StrategyRegistry::with_go_helper(None)),
        &ResilienceConfig::default(),
    );
    BatchCoordinator::new(Arc::new(analyzer), Budget::default())
}

/// Writes a small project and returns its files in a fixed order.
fn project(dir: &TempDir) -> Vec<PathBuf> {
    let root = dir.path();
    fs::create_dir_all(root.join("api")).unwrap();
    fs::create_dir_all(root.join("gen")).unwrap();

    let files = [
        ("util.py", "def slugify(text):\n    return text.lower()\n"),
        ("api/handlers.py", "def get_user(user_id):\n    pass\n"),
        ("gen/models.py", "class Generated:\n    pass\n"),
        ("main.go", "package main\n\nfunc main() {}\n"),
        ("blob.py", "\0\0\0\0"),
    ];
    files
        .iter()
        .map(|(name, body)| {
            let path = root.join(name);
            fs::write(&path, body).unwrap();
            path
        })
        .collect()
}

fn status_of(report: &docscan::BatchReport, suffix: &str) -> FileStatus {
    report
        .outcomes
        .iter()
        .find(|o| o.path.ends_with(suffix))
        .map(|o| o.status)
        .unwrap()
}

#[tokio::test]
async fn test_batch_summary_and_exclusion() {
    let dir = TempDir::new().unwrap();
    let files = project(&dir);
    let options = BatchOptions {
        excluded: vec!["**/gen/**".to_string()],
        ..BatchOptions::default()
    };

    let report = coordinator().analyze_batch(&files, &options).await.unwrap();

    assert_eq!(
        report.summary,
        BatchSummary {
            total: 5,
            successful: 3,
            partial: 0,
            failed: 0,
            skipped: 2,
        }
    );
    assert_eq!(
        status_of(&report, "gen/models.py"),
        FileStatus::Skipped(SkipReason::Excluded)
    );
    assert_eq!(
        status_of(&report, "blob.py"),
        FileStatus::Skipped(SkipReason::Binary)
    );
    assert_eq!(status_of(&report, "main.go"), FileStatus::Successful);
    assert!(report
        .outcomes
        .iter()
        .find(|o| o.path.ends_with("gen/models.py"))
        .unwrap()
        .outcome
        .is_none());
    assert_eq!(report.health.status, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_prioritized_files_come_first() {
    let dir = TempDir::new().unwrap();
    let files = project(&dir);
    let options = BatchOptions {
        prioritized: vec!["**/api/**".to_string(), "**/*.go".to_string()],
        max_concurrency: 1,
        ..BatchOptions::default()
    };

    let report = coordinator().analyze_batch(&files, &options).await.unwrap();

    let order: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| o.path.strip_prefix(dir.path()).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        order,
        vec![
            PathBuf::from("api/handlers.py"),
            PathBuf::from("main.go"),
            PathBuf::from("util.py"),
            PathBuf::from("gen/models.py"),
            PathBuf::from("blob.py"),
        ]
    );
}

#[tokio::test]
async fn test_cancelled_batch_admits_nothing() {
    let dir = TempDir::new().unwrap();
    let files = project(&dir);
    let coordinator = coordinator();
    coordinator.cancellation().cancel();

    let report = coordinator
        .analyze_batch(&files, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(report.summary.total, 5);
    assert_eq!(report.summary.skipped, 5);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == FileStatus::Skipped(SkipReason::Cancelled)));
    assert_eq!(coordinator.analyzer().strategy_invocations(), 0);
}

#[tokio::test]
async fn test_fail_fast_stops_admission() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.py");
    let mut files = vec![missing];
    for i in 0..4 {
        let path = dir.path().join(format!("ok{}.py", i));
        fs::write(&path, "def f():\n    pass\n").unwrap();
        files.push(path);
    }
    let options = BatchOptions {
        continue_on_error: false,
        max_concurrency: 1,
        ..BatchOptions::default()
    };

    let report = coordinator().analyze_batch(&files, &options).await.unwrap();

    assert_eq!(report.outcomes[0].status, FileStatus::Failed);
    assert_eq!(report.summary.failed, 1);
    assert!(report.summary.skipped >= 1);
    assert_eq!(report.summary.total, 5);
}

#[tokio::test]
async fn test_invalid_glob_fails_the_batch() {
    let options = BatchOptions {
        excluded: vec!["src/[".to_string()],
        ..BatchOptions::default()
    };
    assert!(coordinator().analyze_batch(&[], &options).await.is_err());
}

#[tokio::test]
async fn test_report_serializes_status_tags() {
    let dir = TempDir::new().unwrap();
    let files = project(&dir);
    let options = BatchOptions {
        excluded: vec!["**/gen/**".to_string()],
        ..BatchOptions::default()
    };
    let report = coordinator().analyze_batch(&files, &options).await.unwrap();

    let json = serde_json::to_value(&report).unwrap();
    let excluded = json["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["path"].as_str().unwrap().ends_with("models.py"))
        .unwrap();
    assert_eq!(excluded["status"], "skipped");
    assert_eq!(excluded["reason"], "excluded");
    assert_eq!(json["summary"]["total"], 5);
}
