//! Per-language extraction of declarative facts.
//!
//! Every supported language has one strategy that turns source text into an
//! [`AnalysisResult`]. Three disciplines sit behind the same contract:
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌────────────────┐
//! │ path + text  │────▶│ StrategyRegistry   │────▶│ AnalysisResult │
//! └──────────────┘     │  tree-sitter (TS)  │     │ (functions,    │
//!                      │  indentation (Py)  │     │  classes, ...) │
//!                      │  hybrid (Go)       │     └────────────────┘
//!                      └────────────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement the `LanguageStrategy` trait
//! 3. Add a `Strategy` variant and route its extensions in `languages/mod.rs`

pub mod comments;
mod facts;
mod languages;
pub mod routes;
mod traits;

pub use facts::*;
#[cfg(feature = "tree-sitter")]
pub use languages::{Dialect, SyntaxTreeStrategy};
pub use languages::{
    default_registry, GoHelper, HelperError, HybridStrategy, IndentationStrategy, Strategy,
    StrategyRegistry,
};
pub use traits::{Extraction, LanguageStrategy, SourceFile};
