//! Hybrid strategy for Go.
//!
//! The preferred path hands the file to an external `go-parser` helper that
//! prints the file's declarations as JSON. When the helper is missing, exits
//! non-zero, times out or prints something unreadable, the strategy falls
//! back to [`manual`] text scanning. Both paths feed the same [`finish`]
//! step, so consumers cannot tell which one produced a result except by the
//! degraded marker on the extraction.

mod helper;
mod manual;

pub use helper::{GoHelper, HelperError};

use std::collections::HashMap;
use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::routes::{http_verb, path_parameters};
use crate::analysis::{
    AnalysisResult, ApiEndpointInfo, ExportInfo, ExportKind, Extraction,
    LanguageStrategy, ParameterInfo, SourceFile,
};
use crate::error::ParseError;

/// Name recorded when the manual path produced the result.
pub const MANUAL_PATH: &str = "go-manual";

lazy_static! {
    static ref INTERFACE_HEADER: Regex =
        Regex::new(r"(?m)^\s*(?:type\s+)?([A-Za-z_]\w*)(?:\[[^\]]*\])?\s+interface\s*\{").unwrap();
    static ref EMBEDDED_NAME: Regex =
        Regex::new(r"^\s*(\*?[A-Za-z_][\w.]*)\s*(?://.*)?$").unwrap();
    static ref HANDLE_FUNC: Regex = Regex::new(
        r#"\b\w+\.HandleFunc\(\s*"([^"]+)"\s*,\s*([\w.]+)[^)]*\)(?:\s*\.Methods\(([^)]*)\))?"#
    )
    .unwrap();
    static ref VERB_ROUTE: Regex = Regex::new(
        r#"\b\w+\.(GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS|Get|Post|Put|Delete|Patch|Head|Options)\(\s*"([^"]+)"\s*,\s*([\w.]+)"#
    )
    .unwrap();
    static ref QUOTED: Regex = Regex::new(r#""([^"]*)""#).unwrap();
}

pub struct HybridStrategy {
    helper: Option<GoHelper>,
}

impl HybridStrategy {
    pub fn new(helper: Option<GoHelper>) -> Self {
        Self { helper }
    }

    pub fn has_helper(&self) -> bool {
        self.helper.is_some()
    }

    fn manual(&self, source: &SourceFile<'_>) -> Result<AnalysisResult, ParseError> {
        manual::extract(source.text).map(|result| finish(result, source.text))
    }
}

impl LanguageStrategy for HybridStrategy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn language_id(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn analyze(&self, source: &SourceFile<'_>) -> Result<Extraction, ParseError> {
        // In-memory content must be analyzed verbatim, so the helper (which
        // reads the path itself) is only used for on-disk files.
        if let (Some(helper), true) = (&self.helper, source.from_disk) {
            match helper.run(source.path) {
                Ok(output) => {
                    let result = helper::translate(output, source.text);
                    return Ok(Extraction::clean(finish(result, source.text)));
                }
                Err(e) => {
                    tracing::warn!(
                        path = %source.path.display(),
                        error = %e,
                        "go helper failed, using manual extraction"
                    );
                }
            }
        }

        self.manual(source)
            .map(|result| Extraction::degraded(result, MANUAL_PATH))
    }

    fn manual_fallback(&self, source: &SourceFile<'_>) -> Option<Result<AnalysisResult, ParseError>> {
        Some(self.manual(source))
    }

    fn manual_fallback_name(&self) -> &'static str {
        MANUAL_PATH
    }
}

/// Post-processing shared by the helper and manual paths.
///
/// Attaches receiver methods to their owning type, fills interface
/// embedding, computes exports from identifier case and scans the source
/// for route registrations.
pub(crate) fn finish(mut result: AnalysisResult, text: &str) -> AnalysisResult {
    let mut free = Vec::new();
    for function in std::mem::take(&mut result.functions) {
        let owner = function
            .receiver
            .as_ref()
            .and_then(|r| result.classes.iter().position(|c| &c.name == r));
        match owner {
            Some(i) => result.classes[i].methods.push(function),
            None => free.push(function),
        }
    }
    result.functions = free;

    let embedded = embedded_interfaces(text);
    for interface in &mut result.interfaces {
        if interface.extends.is_empty() {
            if let Some(names) = embedded.get(&interface.name) {
                interface.extends = names.clone();
            }
        }
    }

    let functions = result
        .functions
        .iter()
        .filter(|f| f.is_exported && f.receiver.is_none())
        .map(|f| (f.name.clone(), ExportKind::Function));
    let classes = result
        .classes
        .iter()
        .filter(|c| c.is_exported)
        .map(|c| (c.name.clone(), ExportKind::Class));
    let interfaces = result
        .interfaces
        .iter()
        .filter(|i| i.is_exported)
        .map(|i| (i.name.clone(), ExportKind::Interface));
    result.exports = functions
        .chain(classes)
        .chain(interfaces)
        .map(|(name, kind)| ExportInfo {
            name,
            kind,
            is_default: false,
        })
        .collect();

    result.api_endpoints = routes(text);
    result
}

/// Embedded interface names per interface declared in `text`.
fn embedded_interfaces(text: &str) -> HashMap<String, Vec<String>> {
    let mut found = HashMap::new();
    for caps in INTERFACE_HEADER.captures_iter(text) {
        let (Some(name), Some(header)) = (caps.get(1), caps.get(0)) else {
            continue;
        };
        let mut depth = 1;
        let mut names = Vec::new();
        for line in text[header.end()..].lines() {
            if depth == 1 {
                if let Some(embed) = EMBEDDED_NAME.captures(line) {
                    names.push(embed[1].trim_start_matches('*').to_string());
                }
            }
            depth += line.matches('{').count() as i32 - line.matches('}').count() as i32;
            if depth <= 0 {
                break;
            }
        }
        if !names.is_empty() {
            found.insert(name.as_str().to_string(), names);
        }
    }
    found
}

/// Route registrations: `HandleFunc` (with optional `.Methods`) and
/// verb-style router calls.
fn routes(text: &str) -> Vec<ApiEndpointInfo> {
    // Match against the masked source so calls inside comments and string
    // literals never count; literal contents are read back from `text` at
    // the same byte offsets.
    let Ok(code) = manual::mask_code(text) else {
        return Vec::new();
    };
    let literal = |m: Option<regex::Match<'_>>| m.map_or("", |m| &text[m.range()]);
    let line_of = |offset: usize| text[..offset].matches('\n').count() + 1;

    let mut endpoints = Vec::new();
    for caps in HANDLE_FUNC.captures_iter(&code) {
        let Some(whole) = caps.get(0) else { continue };
        let mut methods: Vec<String> = QUOTED
            .captures_iter(literal(caps.get(3)))
            .filter_map(|q| http_verb(&q[1]))
            .collect();

        // Method-qualified patterns: "GET /users/{id}".
        let mut path = literal(caps.get(1));
        if let Some((verb, rest)) = path.split_once(' ') {
            if let Some(verb) = http_verb(verb) {
                methods = vec![verb];
                path = rest.trim();
            }
        }
        if !path.starts_with('/') {
            continue;
        }
        if methods.is_empty() {
            methods.push("ANY".to_string());
        }
        for method in methods {
            endpoints.push(ApiEndpointInfo {
                method,
                path: path.to_string(),
                handler: caps[2].to_string(),
                parameters: path_parameters(path),
                line: line_of(whole.start()),
            });
        }
    }

    for caps in VERB_ROUTE.captures_iter(&code) {
        let Some(whole) = caps.get(0) else { continue };
        let path = literal(caps.get(2));
        if !path.starts_with('/') {
            continue;
        }
        let Some(method) = http_verb(&caps[1]) else {
            continue;
        };
        endpoints.push(ApiEndpointInfo {
            method,
            path: path.to_string(),
            handler: caps[3].to_string(),
            parameters: path_parameters(path),
            line: line_of(whole.start()),
        });
    }

    endpoints.sort_by_key(|e| e.line);
    endpoints
}

const TYPE_KEYWORDS: &[&str] = &["chan", "func", "map", "struct", "interface"];

/// Byte ranges of the comma-separated items of `text`, ignoring commas
/// nested in brackets.
fn split_top_level(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                ranges.push(start..i);
                start = i + 1;
            }
            _ => {}
        }
    }
    ranges.push(start..text.len());
    ranges.retain(|r| !text[r.clone()].trim().is_empty());
    ranges
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Parse a Go parameter or result list (without the parentheses).
///
/// `a, b int` gives both names the type `int`; a list with no names at all
/// (`int, error`) yields entries with an empty name.
fn parse_fields(list: &str) -> Vec<ParameterInfo> {
    let entries: Vec<(Option<&str>, &str)> = split_top_level(list)
        .into_iter()
        .map(|r| split_name_type(list[r].trim()))
        .collect();

    if entries.iter().all(|(name, _)| name.is_none()) {
        return entries
            .into_iter()
            .map(|(_, type_name)| ParameterInfo::typed("", collapse(type_name)))
            .collect();
    }

    let mut fields = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    for (name, type_name) in entries {
        match name {
            None => pending.push(type_name),
            Some(name) => {
                for grouped in pending.drain(..) {
                    fields.push(ParameterInfo::typed(grouped, collapse(type_name)));
                }
                fields.push(ParameterInfo::typed(name, collapse(type_name)));
            }
        }
    }
    fields.extend(pending.into_iter().map(ParameterInfo::named));
    fields
}

fn split_name_type(entry: &str) -> (Option<&str>, &str) {
    let Some(ws) = entry.find(char::is_whitespace) else {
        return (None, entry);
    };
    let head = &entry[..ws];
    if is_identifier(head) && !TYPE_KEYWORDS.contains(&head) {
        (Some(head), entry[ws..].trim())
    } else {
        (None, entry)
    }
}

/// Render a result list as a return type.
fn format_results(results: &[ParameterInfo]) -> Option<String> {
    match results {
        [] => None,
        [only] if only.name.is_empty() => only.type_name.clone(),
        _ => {
            let parts: Vec<String> = results
                .iter()
                .map(|r| {
                    let type_name = r.type_name.as_deref().unwrap_or("");
                    if r.name.is_empty() {
                        type_name.to_string()
                    } else {
                        format!("{} {}", r.name, type_name)
                    }
                })
                .collect();
            Some(format!("({})", parts.join(", ")))
        }
    }
}

/// Single-space a type or value that may span several lines.
fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Field name of an embedded struct field: `*pkg.Base[T]` is `Base`.
fn embedded_field_name(type_name: &str) -> String {
    let base = type_name.trim().trim_start_matches('*');
    let base = base.split('[').next().unwrap_or(base);
    base.rsplit('.').next().unwrap_or(base).to_string()
}
