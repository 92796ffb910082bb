//! Command-line interface for docscan.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::batch::{self, BatchCoordinator, FileStatus};
use crate::config::EngineConfig;
use crate::report;
use crate::resilience::ResilientAnalyzer;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Extract declarations from source files for documentation.
///
/// Docscan reads TypeScript, JavaScript, Python and Go sources and reports
/// their functions, classes, interfaces, imports, exports, comments, work
/// markers and HTTP routes. Files that cannot be parsed still produce a
/// best-effort result with a completeness score.
#[derive(Parser)]
#[command(name = "docscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze files and directories
    #[command(visible_alias = "scan")]
    Analyze(AnalyzeArgs),
    /// Print the full analysis of one file as JSON
    Inspect(InspectArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Files or directories to analyze
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Maximum number of files analyzed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Glob for files analyzed first (repeatable)
    #[arg(long = "priority")]
    pub priority: Vec<String>,

    /// Glob for files to skip (repeatable)
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Stop admitting files after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the inspect command.
#[derive(Parser)]
pub struct InspectArgs {
    /// File to analyze
    pub file: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Collect analyzable files under `root`.
pub fn collect_files(root: &Path, extensions: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            // Skip hidden, vendored and build output directories
            !(name.starts_with('.')
                || name == "vendor"
                || name == "node_modules"
                || name == "__pycache__"
                || name == "target"
                || name == "dist")
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            if extensions.contains(&ext.as_str()) {
                files.push(path.to_path_buf());
            }
        }
    }

    Ok(files)
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let cwd = std::env::current_dir()?;
    EngineConfig::load(explicit, &cwd)
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Command-line options override the file
    if let Some(concurrency) = args.concurrency {
        config.batch.max_concurrency = concurrency;
    }
    config.batch.prioritized.extend(args.priority.iter().cloned());
    config.batch.excluded.extend(args.exclude.iter().cloned());
    if args.fail_fast {
        config.batch.continue_on_error = false;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return Ok(EXIT_ERROR);
    }

    let analyzer = Arc::new(ResilientAnalyzer::new(&config));
    let extensions = analyzer.registry().extensions();

    let mut files = Vec::new();
    for path in &args.paths {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Error: cannot access path {:?}: {}", path, e);
                return Ok(EXIT_ERROR);
            }
        };
        if metadata.is_dir() {
            files.extend(collect_files(path, &extensions)?);
        } else {
            // Explicit files go through even with an unknown extension.
            files.push(path.clone());
        }
    }

    if files.is_empty() {
        eprintln!("Warning: no files to analyze");
        return Ok(EXIT_SUCCESS);
    }

    let coordinator = BatchCoordinator::new(analyzer, config.budget);
    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(coordinator.analyze_batch(&files, &config.batch))?;

    match args.format.as_str() {
        "json" => report::write_json(&report)?,
        _ => {
            let scanned = args
                .paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            report::write_pretty(&scanned, &report);
        }
    }

    if report.summary.failed > 0 {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the inspect command.
pub fn run_inspect(args: &InspectArgs) -> anyhow::Result<i32> {
    let config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let analyzer = ResilientAnalyzer::new(&config);
    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(analyzer.analyze_resilient(&args.file, None, &config.budget));

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if batch::classify(&outcome) == FileStatus::Failed {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_skips_vendored_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/app.ts"), "export const a = 1;").unwrap();
        fs::write(dir.path().join("src/notes.md"), "# notes").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "").unwrap();
        fs::write(dir.path().join(".git/hook.py"), "").unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();

        let files = collect_files(dir.path(), &["ts", "go", "js", "py"]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("main.go"), PathBuf::from("src/app.ts")]);
    }

    #[test]
    fn test_collect_files_ignores_extension_case() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Foo.TS"), "export const a = 1;").unwrap();
        fs::write(dir.path().join("Main.Go"), "package main").unwrap();
        fs::write(dir.path().join("README.MD"), "# readme").unwrap();

        let files = collect_files(dir.path(), &["ts", "go"]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("Foo.TS"), PathBuf::from("Main.Go")]);
    }

    #[test]
    fn test_cli_parses_repeated_globs() {
        let cli = Cli::try_parse_from([
            "docscan",
            "analyze",
            "src",
            "lib",
            "--priority",
            "**/api/**",
            "--exclude",
            "**/gen/**",
            "--exclude",
            "**/*.d.ts",
            "--fail-fast",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.paths.len(), 2);
                assert_eq!(args.priority, vec!["**/api/**"]);
                assert_eq!(args.exclude.len(), 2);
                assert!(args.fail_fast);
                assert_eq!(args.format, "pretty");
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_analyze_rejects_unknown_format() {
        let args = AnalyzeArgs {
            paths: vec![PathBuf::from(".")],
            config: None,
            format: "sarif".to_string(),
            concurrency: None,
            priority: Vec::new(),
            exclude: Vec::new(),
            fail_fast: false,
        };
        assert_eq!(run_analyze(&args).unwrap(), EXIT_ERROR);
    }
}
