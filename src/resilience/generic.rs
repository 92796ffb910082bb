//! Cross-language regex fallback.
//!
//! Recognizes only universally shaped tokens, line by line. Nothing it
//! finds is marked exported and every span is a single line.

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::comments::{clean_comment, extract_todos};
use crate::analysis::{AnalysisResult, ClassInfo, CommentInfo, FunctionInfo};

/// Comment text recorded on the last-resort result.
pub const MINIMAL_MARKER: &str = "minimal fallback used";

lazy_static! {
    static ref FUNCTION: Regex =
        Regex::new(r"\b(?:function|def|func)\s+(?:\([^)]*\)\s*)?([A-Za-z_$][\w$]*)").unwrap();
    static ref CLASS: Regex = Regex::new(r"\b(?:class|type)\s+([A-Za-z_$][\w$]*)").unwrap();
}

/// Languages in which any `#` outside quotes starts a comment.
const HASH_COMMENT_LANGUAGES: &[&str] = &[
    "python", "py", "rb", "sh", "bash", "pl", "r", "toml", "yaml", "yml",
];

/// Offset where a `//` or `#` comment starts on this line, ignoring
/// markers inside quotes.
///
/// Outside hash-comment languages a `#` only counts when followed by
/// whitespace or the end of the line, so `#private` fields and `#[attr]`
/// stay code.
fn comment_start(line: &str, hash_comments: bool) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut prev = '\0';
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q && prev != '\\' => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                '#' if hash_comments
                    || line[i + 1..].chars().next().map_or(true, char::is_whitespace) =>
                {
                    return Some(i)
                }
                '/' if line[i + 1..].starts_with('/') => return Some(i),
                _ => {}
            },
        }
        prev = c;
    }
    None
}

/// Best-effort extraction that never fails.
pub fn extract(language: &str, text: &str) -> AnalysisResult {
    let mut result = AnalysisResult::new(language);
    let hash_comments = HASH_COMMENT_LANGUAGES.contains(&language);

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let (code, comment) = match comment_start(line, hash_comments) {
            Some(at) => (&line[..at], Some(&line[at..])),
            None => (line, None),
        };

        if let Some(caps) = FUNCTION.captures(code) {
            result.functions.push(FunctionInfo {
                name: caps[1].to_string(),
                start_line: number,
                end_line: number,
                ..Default::default()
            });
        } else if let Some(caps) = CLASS.captures(code) {
            result.classes.push(ClassInfo {
                name: caps[1].to_string(),
                start_line: number,
                end_line: number,
                ..Default::default()
            });
        }

        if let Some(raw) = comment {
            let (kind, text) = clean_comment(raw);
            result.todos.extend(extract_todos(&text, number));
            result.comments.push(CommentInfo {
                kind,
                text,
                start_line: number,
                end_line: number,
            });
        }
    }

    result
}

/// The last-resort result: empty apart from a marker comment.
pub fn minimal(language: &str) -> AnalysisResult {
    let mut result = AnalysisResult::new(language);
    result.comments.push(CommentInfo {
        text: MINIMAL_MARKER.to_string(),
        start_line: 1,
        end_line: 1,
        ..Default::default()
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TodoKind;

    #[test]
    fn test_recovers_shapes_across_languages() {
        let text = [
            "class Broken {",
            "  method() {",
            "export function helper(a) {",
            "def scan(path):",
            "func (s *Server) Start() error {",
            "type Config struct {",
            "  s := \"https://example.com\" // trailing",
            "# NOTE: shell style",
        ]
        .join("\n");
        let result = extract("typescript", &text);

        let functions: Vec<_> = result.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(functions, vec!["helper", "scan", "Start"]);
        let classes: Vec<_> = result.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(classes, vec!["Broken", "Config"]);
        assert!(result.functions.iter().all(|f| !f.is_exported));
        assert!(result.exports.is_empty());

        assert_eq!(result.comments.len(), 2);
        assert_eq!(result.comments[0].text, "trailing");
        assert_eq!(result.todos[0].kind, TodoKind::Note);
        assert_eq!(result.todos[0].line, 8);
    }

    #[test]
    fn test_todo_comment_line() {
        let result = extract("go", "package main\n\n// TODO: fix this\n");
        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.comments[0].start_line, 3);
        assert_eq!(result.todos.len(), 1);
        assert_eq!(result.todos[0].content, "fix this");
        assert_eq!(result.todos[0].line, 3);
    }

    #[test]
    fn test_declarations_in_comments_are_ignored() {
        let result = extract("python", "# def not_real():\nx = 1\n");
        assert!(result.functions.is_empty());
        assert_eq!(result.comments.len(), 1);
    }

    #[test]
    fn test_private_fields_are_not_comments() {
        let text = ["class Counter {", "  #count = 0;", "  # NOTE: spaced", "}"].join("\n");
        let result = extract("typescript", &text);
        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.comments[0].start_line, 3);

        let result = extract("python", "#compact comment\nx = 1\n");
        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.comments[0].text, "compact comment");
    }

    #[test]
    fn test_minimal() {
        let result = minimal("unknown");
        assert!(!result.has_declarations());
        assert_eq!(result.comments[0].text, MINIMAL_MARKER);
    }
}
