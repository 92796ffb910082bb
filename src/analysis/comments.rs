//! Comment normalization and work-marker extraction shared by all strategies.

use lazy_static::lazy_static;
use regex::Regex;

use super::{CommentInfo, CommentKind, TodoInfo, TodoKind};

lazy_static! {
    /// Work marker followed by a colon and free text. Unanchored, so a marker
    /// may end a longer word (`FOOTNOTE:` reads as `NOTE:`).
    static ref TODO_PATTERN: Regex = Regex::new(r"(?i)(TODO|FIXME|HACK|NOTE):\s*(.+)").unwrap();
}

/// Scan comment text for work markers.
///
/// `start_line` is the line of the first line of `text`; each line of a
/// multi-line comment is scanned separately so markers keep their own line.
pub fn extract_todos(text: &str, start_line: usize) -> Vec<TodoInfo> {
    let mut todos = Vec::new();
    for (offset, line) in text.lines().enumerate() {
        let Some(caps) = TODO_PATTERN.captures(line) else {
            continue;
        };
        let Some(kind) = caps.get(1).and_then(|m| TodoKind::parse(m.as_str())) else {
            continue;
        };
        let content = caps
            .get(2)
            .map(|m| m.as_str().trim().trim_end_matches("*/").trim())
            .unwrap_or("");
        if content.is_empty() {
            continue;
        }
        todos.push(TodoInfo {
            kind,
            content: content.to_string(),
            line: start_line + offset,
        });
    }
    todos
}

/// Split a raw comment into its lines with decoration removed.
///
/// The returned lines stay aligned with the raw lines: line `n` of the
/// result comes from line `n` of `raw`, even when it ends up empty.
fn decorated_lines(raw: &str) -> (CommentKind, Vec<&str>) {
    let trimmed = raw.trim();
    if let Some(body) = trimmed.strip_prefix("/*") {
        let body = body.strip_suffix("*/").unwrap_or(body);
        let body = body.strip_prefix('*').unwrap_or(body);
        let lines = body
            .split('\n')
            .map(|line| {
                let line = line.trim();
                line.strip_prefix('*').map(str::trim_start).unwrap_or(line)
            })
            .collect();
        return (CommentKind::Multi, lines);
    }
    let body = trimmed
        .strip_prefix("//")
        .or_else(|| trimmed.strip_prefix('#'))
        .unwrap_or(trimmed);
    let body = body.strip_prefix('/').unwrap_or(body);
    (CommentKind::Single, vec![body.trim()])
}

/// Strip `//`, `#`, `/* */` and leading `*` decoration from a raw comment.
pub fn clean_comment(raw: &str) -> (CommentKind, String) {
    let (kind, lines) = decorated_lines(raw);
    (kind, lines.join("\n").trim().to_string())
}

/// Work markers of a raw comment whose first line is `start_line`.
pub fn comment_todos(raw: &str, start_line: usize) -> Vec<TodoInfo> {
    let (_, lines) = decorated_lines(raw);
    extract_todos(&lines.join("\n"), start_line)
}

/// Build a `CommentInfo` and its work markers from a raw comment.
pub fn comment_with_todos(
    raw: &str,
    start_line: usize,
    end_line: usize,
) -> (CommentInfo, Vec<TodoInfo>) {
    let (kind, text) = clean_comment(raw);
    let todos = comment_todos(raw, start_line);
    let comment = CommentInfo {
        kind,
        text,
        start_line,
        end_line: end_line.max(start_line),
    };
    (comment, todos)
}

/// Extract the description part of a documentation comment.
///
/// Leading tag lines such as `@param` end the description.
pub fn doc_description(raw: &str) -> Option<String> {
    let (_, text) = clean_comment(raw);
    let description: Vec<&str> = text
        .lines()
        .map(str::trim)
        .take_while(|line| !line.starts_with('@'))
        .collect();
    let description = description.join("\n").trim().to_string();
    if description.is_empty() {
        None
    } else {
        Some(description)
    }
}
