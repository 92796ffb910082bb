//! Integration tests for the per-language strategies through the public API.

use std::path::{Path, PathBuf};

use docscan::analysis::{ParameterInfo, TodoKind};
use docscan::{analyze, AnalysisError, ParseError, StrategyRegistry};
use docscan::{LanguageStrategy, SourceFile};

fn testdata(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

#[test]
fn test_python_function_with_docstring() {
    let result = analyze(&testdata("service.py"), None).unwrap();

    assert_eq!(result.language, "python");
    let add = result.functions.iter().find(|f| f.name == "add").unwrap();
    assert_eq!(
        add.parameters,
        vec![ParameterInfo::typed("a", "int"), ParameterInfo::typed("b", "int")]
    );
    assert_eq!(add.return_type.as_deref(), Some("int"));
    assert_eq!(add.description.as_deref(), Some("Add two numbers."));
    assert!(add.is_exported);

    let private = result
        .functions
        .iter()
        .find(|f| f.name == "_private_helper")
        .unwrap();
    assert!(!private.is_exported);

    let service = result.classes.iter().find(|c| c.name == "UserService").unwrap();
    assert_eq!(service.description.as_deref(), Some("Manages users."));
    assert!(service.methods.iter().any(|m| m.name == "fetch"));
    assert!(result.exports_consistent());
}

#[cfg(feature = "tree-sitter")]
#[test]
fn test_typescript_route_and_todo() {
    let result = analyze(&testdata("routes.ts"), None).unwrap();

    assert_eq!(result.api_endpoints.len(), 1);
    let endpoint = &result.api_endpoints[0];
    assert_eq!(endpoint.method, "GET");
    assert_eq!(endpoint.path, "/users/:id");
    assert_eq!(endpoint.handler, "getUser");
    assert_eq!(endpoint.parameters, vec![ParameterInfo::named("id")]);

    assert_eq!(result.todos.len(), 1);
    assert_eq!(result.todos[0].kind, TodoKind::Todo);
    assert_eq!(result.todos[0].content, "fix this");
    assert_eq!(result.todos[0].line, 6);
    assert_eq!(
        result.comments.iter().filter(|c| c.start_line == 6).count(),
        1
    );

    let get_user = result.functions.iter().find(|f| f.name == "getUser").unwrap();
    assert!(get_user.is_async);
    assert!(get_user.is_exported);
    assert!(result.interfaces.iter().any(|i| i.name == "User" && i.is_exported));
}

#[cfg(feature = "tree-sitter")]
#[test]
fn test_typescript_syntax_error_is_reported() {
    let err = analyze(&testdata("broken.ts"), None).unwrap_err();
    assert!(matches!(err, AnalysisError::Parse(ParseError::Syntax { .. })));
}

#[test]
fn test_go_manual_path_from_disk() {
    // No helper: the hybrid strategy goes straight to the manual path.
    let registry = StrategyRegistry::with_go_helper(None);
    let path = testdata("server.go");
    let text = std::fs::read_to_string(&path).unwrap();
    let strategy = registry.for_path(&path).unwrap();
    let extraction = strategy.analyze(&SourceFile::new(&path, &text, true)).unwrap();

    assert_eq!(extraction.degraded_to, Some("go-manual"));
    let result = extraction.result;
    assert_eq!(result.package.as_deref(), Some("server"));
    assert_eq!(result.imports.len(), 2);
    assert_eq!(result.imports[1].alias.as_deref(), Some("log"));

    let new_server = result.functions.iter().find(|f| f.name == "NewServer").unwrap();
    assert!(new_server.is_exported);
    assert!(new_server
        .description
        .as_deref()
        .unwrap_or_default()
        .contains("builds a Server"));

    let server = result.classes.iter().find(|c| c.name == "Server").unwrap();
    let methods: Vec<_> = server.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(methods, vec!["routes", "handleUser"]);
    assert!(server.methods.iter().all(|m| !m.is_exported));
    assert!(result.interfaces.iter().any(|i| i.name == "Store"));

    assert_eq!(result.api_endpoints.len(), 1);
    assert_eq!(result.api_endpoints[0].method, "GET");
    assert_eq!(result.api_endpoints[0].path, "/users/{id}");
    assert_eq!(result.api_endpoints[0].handler, "s.handleUser");

    assert!(result
        .todos
        .iter()
        .any(|t| t.kind == TodoKind::Fixme && t.content == "add auth middleware"));
}

#[test]
fn test_unknown_extension_is_unsupported() {
    let err = analyze(Path::new("notes.rb"), Some("def x; end")).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Parse(ParseError::UnsupportedLanguage { ref extension }) if extension == "rb"
    ));
}

#[test]
fn test_in_memory_content_wins_over_disk() {
    let result = analyze(
        &testdata("service.py"),
        Some("# TODO: fix this\ndef only(): pass\n"),
    )
    .unwrap();
    assert_eq!(result.functions.len(), 1);
    assert_eq!(result.functions[0].name, "only");
    assert_eq!(result.todos.len(), 1);
    assert_eq!(result.todos[0].content, "fix this");
    assert_eq!(result.comments.len(), 1);
    assert_eq!(result.comments[0].start_line, result.todos[0].line);
}

#[test]
fn test_analysis_is_idempotent() {
    for name in ["service.py", "server.go", "routes.ts"] {
        if cfg!(not(feature = "tree-sitter")) && name.ends_with(".ts") {
            continue;
        }
        let path = testdata(name);
        let first = serde_json::to_string(&analyze(&path, None).unwrap()).unwrap();
        let second = serde_json::to_string(&analyze(&path, None).unwrap()).unwrap();
        assert_eq!(first, second, "{} changed between runs", name);
    }
}
