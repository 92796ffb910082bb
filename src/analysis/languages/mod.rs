//! Language strategy implementations and the extension router.

mod go;
mod python;
#[cfg(feature = "tree-sitter")]
mod typescript;

pub use go::{GoHelper, HelperError, HybridStrategy};
pub use python::IndentationStrategy;
#[cfg(feature = "tree-sitter")]
pub use typescript::{Dialect, SyntaxTreeStrategy};

use once_cell::sync::OnceCell;
use std::path::Path;

use super::{AnalysisResult, Extraction, LanguageStrategy, SourceFile};
use crate::config::EngineConfig;
use crate::error::ParseError;

/// The closed set of extraction strategies.
pub enum Strategy {
    #[cfg(feature = "tree-sitter")]
    SyntaxTree(SyntaxTreeStrategy),
    Indentation(IndentationStrategy),
    Hybrid(HybridStrategy),
}

impl Strategy {
    fn inner(&self) -> &dyn LanguageStrategy {
        match self {
            #[cfg(feature = "tree-sitter")]
            Strategy::SyntaxTree(s) => s,
            Strategy::Indentation(s) => s,
            Strategy::Hybrid(s) => s,
        }
    }
}

impl LanguageStrategy for Strategy {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn language_id(&self) -> &'static str {
        self.inner().language_id()
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        self.inner().file_extensions()
    }

    fn analyze(&self, source: &SourceFile<'_>) -> Result<Extraction, ParseError> {
        self.inner().analyze(source)
    }

    fn manual_fallback(&self, source: &SourceFile<'_>) -> Option<Result<AnalysisResult, ParseError>> {
        self.inner().manual_fallback(source)
    }

    fn manual_fallback_name(&self) -> &'static str {
        self.inner().manual_fallback_name()
    }
}

/// One strategy instance per supported language, built once.
pub struct StrategyRegistry {
    #[cfg(feature = "tree-sitter")]
    typescript: Strategy,
    #[cfg(feature = "tree-sitter")]
    tsx: Strategy,
    #[cfg(feature = "tree-sitter")]
    javascript: Strategy,
    python: Strategy,
    go: Strategy,
}

impl StrategyRegistry {
    /// Build the registry. The Go helper is discovered here and nowhere else.
    pub fn new(config: &EngineConfig) -> Self {
        let helper = GoHelper::discover(&config.helper);
        match &helper {
            Some(h) => tracing::debug!(helper = %h.program().display(), "go helper available"),
            None => tracing::debug!("go helper not found, using manual extraction"),
        }
        Self::with_go_helper(helper)
    }

    /// Build the registry with an explicit helper (or none).
    pub fn with_go_helper(helper: Option<GoHelper>) -> Self {
        Self {
            #[cfg(feature = "tree-sitter")]
            typescript: Strategy::SyntaxTree(SyntaxTreeStrategy::new(Dialect::TypeScript)),
            #[cfg(feature = "tree-sitter")]
            tsx: Strategy::SyntaxTree(SyntaxTreeStrategy::new(Dialect::Tsx)),
            #[cfg(feature = "tree-sitter")]
            javascript: Strategy::SyntaxTree(SyntaxTreeStrategy::new(Dialect::JavaScript)),
            python: Strategy::Indentation(IndentationStrategy::new()),
            go: Strategy::Hybrid(HybridStrategy::new(helper)),
        }
    }

    /// Get the strategy for a file extension (without dot).
    pub fn for_extension(&self, ext: &str) -> Option<&Strategy> {
        match ext.to_ascii_lowercase().as_str() {
            #[cfg(feature = "tree-sitter")]
            "ts" | "mts" | "cts" => Some(&self.typescript),
            #[cfg(feature = "tree-sitter")]
            "tsx" => Some(&self.tsx),
            #[cfg(feature = "tree-sitter")]
            "js" | "jsx" | "mjs" | "cjs" => Some(&self.javascript),
            "py" | "pyi" => Some(&self.python),
            "go" => Some(&self.go),
            _ => None,
        }
    }

    /// Get the strategy for a path.
    pub fn for_path(&self, path: &Path) -> Option<&Strategy> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        self.for_extension(ext)
    }

    /// All file extensions with a registered strategy.
    pub fn extensions(&self) -> Vec<&'static str> {
        self.strategies()
            .iter()
            .flat_map(|s| s.file_extensions().iter().copied())
            .collect()
    }

    fn strategies(&self) -> Vec<&Strategy> {
        let mut strategies = Vec::new();
        #[cfg(feature = "tree-sitter")]
        strategies.extend([&self.typescript, &self.tsx, &self.javascript]);
        strategies.push(&self.python);
        strategies.push(&self.go);
        strategies
    }
}

/// Static storage for the default registry.
static DEFAULT_REGISTRY: OnceCell<StrategyRegistry> = OnceCell::new();

/// Registry built from the default configuration on first use.
pub fn default_registry() -> &'static StrategyRegistry {
    DEFAULT_REGISTRY.get_or_init(|| StrategyRegistry::new(&EngineConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_by_extension() {
        let registry = StrategyRegistry::with_go_helper(None);
        assert_eq!(
            registry.for_path(Path::new("app/models.py")).map(|s| s.name()),
            Some("indentation")
        );
        assert_eq!(
            registry.for_path(Path::new("main.go")).map(|s| s.language_id()),
            Some("go")
        );
        assert!(registry.for_path(Path::new("README.md")).is_none());
        assert!(registry.for_path(Path::new("Makefile")).is_none());
    }

    #[cfg(feature = "tree-sitter")]
    #[test]
    fn test_routes_syntax_tree_languages() {
        let registry = StrategyRegistry::with_go_helper(None);
        for file in ["a.ts", "b.tsx", "c.js", "d.mjs", "E.TS"] {
            let strategy = registry.for_path(Path::new(file)).unwrap();
            assert_eq!(strategy.name(), "tree-sitter", "{}", file);
        }
        assert_eq!(
            registry.for_path(Path::new("c.jsx")).map(|s| s.language_id()),
            Some("javascript")
        );
    }

    #[test]
    fn test_every_extension_routes_back() {
        let registry = StrategyRegistry::with_go_helper(None);
        for ext in registry.extensions() {
            let strategy = registry.for_extension(ext).unwrap();
            assert!(strategy.handles_extension(ext));
        }
    }
}
