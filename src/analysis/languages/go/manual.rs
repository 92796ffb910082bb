//! Manual Go extraction by text scanning.
//!
//! The source is first masked: comment bodies and string contents are
//! replaced by spaces, byte for byte, so delimiter matching on the masked
//! copy never trips over braces inside literals while offsets still index
//! the original text. Top-level declarations are then walked keyword by
//! keyword.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use super::{collapse, embedded_field_name, format_results, parse_fields, split_top_level};
use crate::analysis::comments::{clean_comment, comment_with_todos};
use crate::analysis::{
    is_capitalized, AnalysisResult, ClassInfo, FunctionInfo, ImportInfo,
    InterfaceInfo, ParameterInfo, PropertyInfo, VariableInfo, VariableKind, NAMESPACE_SENTINEL,
};
use crate::error::ParseError;

const MAX_VALUE_CHARS: usize = 80;

lazy_static! {
    static ref TYPE_PARAMS: Regex =
        Regex::new(r"^\[\s*[A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*\s+\S").unwrap();
    static ref FIELD: Regex =
        Regex::new(r"^([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s+(\S.*)$").unwrap();
    static ref METHOD: Regex = Regex::new(r"^([A-Za-z_]\w*)\s*\(").unwrap();
    static ref VALUE_NAMES: Regex =
        Regex::new(r"(?s)^([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*(.*)$").unwrap();
}

/// A comment found while masking.
struct RawComment {
    raw: String,
    start_line: usize,
    end_line: usize,
    /// Nothing but whitespace precedes it on its line.
    standalone: bool,
}

/// Masked copy of the source plus the comments removed from it.
struct Masked<'a> {
    text: &'a str,
    code: String,
    comments: Vec<RawComment>,
    line_starts: Vec<usize>,
}

impl<'a> Masked<'a> {
    fn new(text: &'a str) -> Result<Self, ParseError> {
        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let mut masked = Masked {
            text,
            code: String::new(),
            comments: Vec::new(),
            line_starts,
        };
        masked.code = masked.mask()?;
        Ok(masked)
    }

    fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    fn mask(&mut self) -> Result<String, ParseError> {
        let text = self.text;
        let bytes = text.as_bytes();
        let mut out = bytes.to_vec();
        let blank = |out: &mut Vec<u8>, range: Range<usize>| {
            for b in &mut out[range] {
                if *b != b'\n' {
                    *b = b' ';
                }
            }
        };

        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    let end = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
                    self.push_comment(i, end);
                    blank(&mut out, i..end);
                    i = end;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let end = text[i + 2..]
                        .find("*/")
                        .map(|n| i + 2 + n + 2)
                        .ok_or(ParseError::Unterminated {
                            what: "block comment",
                            line: self.line_of(i),
                        })?;
                    self.push_comment(i, end);
                    blank(&mut out, i..end);
                    i = end;
                }
                b'`' => {
                    let end = text[i + 1..]
                        .find('`')
                        .map(|n| i + 1 + n)
                        .ok_or(ParseError::Unterminated {
                            what: "raw string",
                            line: self.line_of(i),
                        })?;
                    blank(&mut out, i + 1..end);
                    i = end + 1;
                }
                quote @ (b'"' | b'\'') => {
                    let what = if quote == b'"' { "string literal" } else { "rune literal" };
                    let mut j = i + 1;
                    loop {
                        match bytes.get(j) {
                            Some(b'\\') => j += 2,
                            Some(&b) if b == quote => break,
                            Some(b'\n') | None => {
                                return Err(ParseError::Unterminated {
                                    what,
                                    line: self.line_of(i),
                                })
                            }
                            Some(_) => j += 1,
                        }
                    }
                    blank(&mut out, i + 1..j.min(bytes.len()));
                    i = j + 1;
                }
                _ => i += 1,
            }
        }

        // Only whole characters inside literals and comments were replaced.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn push_comment(&mut self, start: usize, end: usize) {
        let line_start = self.text[..start].rfind('\n').map_or(0, |n| n + 1);
        self.comments.push(RawComment {
            raw: self.text[start..end].to_string(),
            start_line: self.line_of(start),
            end_line: self.line_of(end.saturating_sub(1).max(start)),
            standalone: self.text[line_start..start].trim().is_empty(),
        });
    }

    /// Documentation: the contiguous standalone comments ending right above
    /// `line`.
    fn doc_above(&self, line: usize) -> Option<String> {
        let mut parts = Vec::new();
        let mut expect = line.checked_sub(1)?;
        while let Some(comment) = self
            .comments
            .iter()
            .find(|c| c.standalone && c.end_line == expect)
        {
            parts.push(clean_comment(&comment.raw).1);
            match comment.start_line.checked_sub(1) {
                Some(prev) if prev > 0 => expect = prev,
                _ => break,
            }
        }
        parts.reverse();
        let doc = parts.join("\n").trim().to_string();
        (!doc.is_empty()).then_some(doc)
    }
}

/// Declaration walker over the masked source.
struct Parser<'a> {
    src: &'a Masked<'a>,
    bytes: &'a [u8],
    result: AnalysisResult,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn ends_with_keyword(text: &str, keyword: &str) -> bool {
    text.strip_suffix(keyword)
        .is_some_and(|head| !head.bytes().last().is_some_and(is_ident_byte))
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.strip_prefix(keyword)
        .is_some_and(|tail| !tail.bytes().next().is_some_and(is_ident_byte))
}

/// Type text as the helper renders it: function, interface and struct
/// literals are abbreviated.
fn simplify(type_text: &str) -> String {
    let type_text = collapse(type_text);
    if starts_with_keyword(&type_text, "func") {
        "func".to_string()
    } else if starts_with_keyword(&type_text, "interface") {
        "interface{}".to_string()
    } else if starts_with_keyword(&type_text, "struct") {
        "struct{}".to_string()
    } else {
        type_text
    }
}

fn summarize(value: &str) -> String {
    let value = collapse(value);
    if value.chars().count() <= MAX_VALUE_CHARS {
        return value;
    }
    let head: String = value.chars().take(MAX_VALUE_CHARS - 3).collect();
    format!("{}...", head)
}

fn simplified_fields(list: &str) -> Vec<ParameterInfo> {
    parse_fields(list)
        .into_iter()
        .map(|mut p| {
            p.type_name = p.type_name.as_deref().map(simplify);
            p
        })
        .collect()
}

/// Parse a result list: `(a int, err error)`, `error`, or nothing.
fn parse_results(text: &str) -> Vec<ParameterInfo> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => simplified_fields(inner),
        None => vec![ParameterInfo::typed("", simplify(text))],
    }
}

impl<'a> Parser<'a> {
    fn new(src: &'a Masked<'a>) -> Self {
        Self {
            src,
            bytes: src.code.as_bytes(),
            result: AnalysisResult::new("go"),
        }
    }

    fn code(&self, range: Range<usize>) -> &'a str {
        &self.src.code[range]
    }

    fn original(&self, range: Range<usize>) -> &'a str {
        &self.src.text[range]
    }

    fn skip_space(&self, mut pos: usize) -> usize {
        while pos < self.bytes.len() && self.bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        pos
    }

    fn skip_inline_space(&self, mut pos: usize) -> usize {
        while pos < self.bytes.len() && matches!(self.bytes[pos], b' ' | b'\t' | b'\r') {
            pos += 1;
        }
        pos
    }

    fn word(&self, pos: usize) -> Range<usize> {
        let mut end = pos;
        while end < self.bytes.len() && is_ident_byte(self.bytes[end]) {
            end += 1;
        }
        pos..end
    }

    /// Offset of the delimiter closing the one at `open`.
    fn matching(&self, open: usize) -> Result<usize, ParseError> {
        let what = match self.bytes[open] {
            b'(' => "parentheses",
            b'[' => "brackets",
            _ => "braces",
        };
        let mut depth = 0usize;
        for (i, &b) in self.bytes.iter().enumerate().skip(open) {
            match b {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        Err(ParseError::Unbalanced {
            what,
            line: self.src.line_of(open),
        })
    }

    /// End of the statement starting at `pos`: a newline or `;` outside any
    /// brackets, an unmatched closer, or `limit`.
    fn statement_end(&self, pos: usize, limit: usize) -> Result<usize, ParseError> {
        let mut depth = 0i32;
        for i in pos..limit {
            match self.bytes[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Ok(i);
                    }
                }
                b'\n' | b';' if depth == 0 => return Ok(i),
                _ => {}
            }
        }
        if depth > 0 {
            return Err(ParseError::Unbalanced {
                what: "declaration",
                line: self.src.line_of(pos),
            });
        }
        Ok(limit)
    }

    /// Non-empty statements in `start..end`.
    fn statements(&self, start: usize, end: usize) -> Result<Vec<Range<usize>>, ParseError> {
        let mut statements = Vec::new();
        let mut pos = start;
        loop {
            while pos < end && (self.bytes[pos].is_ascii_whitespace() || self.bytes[pos] == b';') {
                pos += 1;
            }
            if pos >= end {
                return Ok(statements);
            }
            let stop = self.statement_end(pos, end)?;
            if stop > pos {
                statements.push(pos..stop);
            }
            pos = stop.max(pos) + 1;
        }
    }

    /// Specs of a declaration whose keyword ends at `pos`: either one spec
    /// or a parenthesized group. Returns the specs and the resume offset.
    fn specs(&self, pos: usize) -> Result<(Vec<Range<usize>>, usize), ParseError> {
        let pos = self.skip_space(pos);
        if self.bytes.get(pos) == Some(&b'(') {
            let close = self.matching(pos)?;
            return Ok((self.statements(pos + 1, close)?, close + 1));
        }
        let end = self.statement_end(pos, self.bytes.len())?;
        Ok((vec![pos..end], end + 1))
    }

    fn run(mut self) -> Result<AnalysisResult, ParseError> {
        let len = self.bytes.len();
        let mut pos = 0;
        while pos < len {
            pos = self.skip_space(pos);
            if pos >= len {
                break;
            }
            let word = self.word(pos);
            if word.is_empty() {
                pos = self.statement_end(pos, len)?.max(pos) + 1;
                continue;
            }
            let keyword_line = self.src.line_of(pos);
            pos = match self.code(word.clone()) {
                "package" => {
                    let name = self.word(self.skip_space(word.end));
                    if !name.is_empty() {
                        self.result.package = Some(self.code(name.clone()).to_string());
                    }
                    name.end.max(word.end)
                }
                "import" => {
                    let (specs, next) = self.specs(word.end)?;
                    for spec in specs {
                        self.import(spec);
                    }
                    next
                }
                "func" => self.function(word.start, word.end)?,
                "type" => {
                    let (specs, next) = self.specs(word.end)?;
                    let doc = self.src.doc_above(keyword_line);
                    for spec in specs {
                        self.type_spec(spec, doc.clone())?;
                    }
                    next
                }
                kind @ ("const" | "var") => {
                    let kind = if kind == "const" {
                        VariableKind::Const
                    } else {
                        VariableKind::Var
                    };
                    let (specs, next) = self.specs(word.end)?;
                    let doc = self.src.doc_above(keyword_line);
                    for spec in specs {
                        self.value_spec(spec, kind, doc.clone());
                    }
                    next
                }
                _ => self.statement_end(pos, len)?.max(pos) + 1,
            };
        }

        let src = self.src;
        for c in &src.comments {
            let (comment, todos) = comment_with_todos(&c.raw, c.start_line, c.end_line);
            self.result.comments.push(comment);
            self.result.todos.extend(todos);
        }
        Ok(self.result)
    }

    fn import(&mut self, spec: Range<usize>) {
        let code = self.code(spec.clone());
        let Some(open) = code.find(['"', '`']) else {
            return;
        };
        let Some(close) = code[open + 1..].find(['"', '`']).map(|n| open + 1 + n) else {
            return;
        };
        let alias = code[..open].trim();
        self.result.imports.push(ImportInfo {
            source: self.original(spec.start + open + 1..spec.start + close).to_string(),
            symbols: vec![NAMESPACE_SENTINEL.to_string()],
            alias: (!alias.is_empty() && alias != "." && alias != "_").then(|| alias.to_string()),
            is_default: false,
            is_namespace: true,
            line: self.src.line_of(spec.start + open),
        });
    }

    /// Parse `func [(recv)] Name[T any](params) results [{ body }]`.
    fn function(&mut self, keyword: usize, after: usize) -> Result<usize, ParseError> {
        let mut pos = self.skip_space(after);
        let mut receiver = None;
        if self.bytes.get(pos) == Some(&b'(') {
            let close = self.matching(pos)?;
            let text = self.code(pos + 1..close);
            let text = text.split('[').next().unwrap_or(text);
            receiver = text
                .split_whitespace()
                .last()
                .map(|t| t.trim_start_matches('*').to_string())
                .filter(|t| !t.is_empty());
            pos = self.skip_space(close + 1);
        }

        let name = self.word(pos);
        if name.is_empty() {
            return Ok(self.statement_end(keyword, self.bytes.len())?.max(after) + 1);
        }
        pos = self.skip_space(name.end);
        if self.bytes.get(pos) == Some(&b'[') {
            pos = self.skip_space(self.matching(pos)? + 1);
        }
        if self.bytes.get(pos) != Some(&b'(') {
            return Ok(self.statement_end(pos, self.bytes.len())?.max(pos) + 1);
        }
        let params_close = self.matching(pos)?;
        let parameters = simplified_fields(self.code(pos + 1..params_close));

        let (results_end, body) = self.signature_tail(params_close + 1)?;
        let results = parse_results(self.code(params_close + 1..results_end));
        let end = match body {
            Some(open) => self.matching(open)?,
            None => results_end,
        };

        let start_line = self.src.line_of(keyword);
        let name = self.code(name).to_string();
        self.result.functions.push(FunctionInfo {
            is_exported: is_capitalized(&name),
            name,
            parameters,
            return_type: format_results(&results),
            description: self.src.doc_above(start_line),
            start_line,
            end_line: self.src.line_of(end).max(start_line),
            receiver,
            ..Default::default()
        });
        Ok(end + 1)
    }

    /// Find where a function's result list ends and its body (if any)
    /// opens. Braces belonging to `interface{}` or `struct{}` result types
    /// are skipped.
    fn signature_tail(&self, from: usize) -> Result<(usize, Option<usize>), ParseError> {
        let mut i = from;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\n' | b';' => return Ok((i, None)),
                b'(' | b'[' => i = self.matching(i)? + 1,
                b'{' => {
                    let before = self.code(from..i).trim_end();
                    if ends_with_keyword(before, "interface") || ends_with_keyword(before, "struct") {
                        i = self.matching(i)? + 1;
                    } else {
                        return Ok((i, Some(i)));
                    }
                }
                _ => i += 1,
            }
        }
        Ok((self.bytes.len(), None))
    }

    fn type_spec(&mut self, spec: Range<usize>, doc: Option<String>) -> Result<(), ParseError> {
        let name = self.word(spec.start);
        if name.is_empty() {
            return Ok(());
        }
        let mut pos = self.skip_space(name.end);
        if self.bytes.get(pos) == Some(&b'[') && TYPE_PARAMS.is_match(self.code(pos..spec.end)) {
            pos = self.skip_space(self.matching(pos)? + 1);
        }
        if self.bytes.get(pos) == Some(&b'=') {
            pos = self.skip_space(pos + 1);
        }

        let start_line = self.src.line_of(spec.start);
        let name = self.code(name).to_string();
        let rest = self.code(pos..spec.end);
        let is_exported = is_capitalized(&name);

        if starts_with_keyword(rest, "struct") || starts_with_keyword(rest, "interface") {
            let Some(open) = rest.find('{').map(|n| pos + n) else {
                return Ok(());
            };
            let close = self.matching(open)?;
            let end_line = self.src.line_of(close);
            if starts_with_keyword(rest, "struct") {
                let properties = self.struct_fields(open + 1, close)?;
                self.result.classes.push(ClassInfo {
                    name,
                    properties,
                    description: doc,
                    is_exported,
                    start_line,
                    end_line,
                    ..Default::default()
                });
            } else {
                let methods = self.interface_methods(open + 1, close)?;
                self.result.interfaces.push(InterfaceInfo {
                    name,
                    methods,
                    description: doc,
                    is_exported,
                    start_line,
                    end_line,
                    ..Default::default()
                });
            }
            return Ok(());
        }

        let underlying = simplify(rest);
        self.result.classes.push(ClassInfo {
            name,
            extends: (!underlying.is_empty()).then_some(underlying),
            description: doc,
            is_exported,
            start_line,
            end_line: start_line,
            ..Default::default()
        });
        Ok(())
    }

    fn struct_fields(&self, start: usize, end: usize) -> Result<Vec<PropertyInfo>, ParseError> {
        let mut properties = Vec::new();
        for statement in self.statements(start, end)? {
            let code = self.code(statement.clone());
            // Cut the field tag.
            let decl = code.find(['`', '"']).map_or(code, |n| &code[..n]);
            let decl = collapse(decl);
            if decl.is_empty() {
                continue;
            }
            let description = self.src.doc_above(self.src.line_of(statement.start));
            match FIELD.captures(&decl) {
                Some(caps) => {
                    let type_name = simplify(&caps[2]);
                    for name in caps[1].split(',').map(str::trim) {
                        properties.push(PropertyInfo {
                            name: name.to_string(),
                            type_name: Some(type_name.clone()),
                            description: description.clone(),
                            ..Default::default()
                        });
                    }
                }
                None => properties.push(PropertyInfo {
                    name: embedded_field_name(&decl),
                    type_name: Some(decl.clone()),
                    description,
                    ..Default::default()
                }),
            }
        }
        Ok(properties)
    }

    fn interface_methods(&self, start: usize, end: usize) -> Result<Vec<FunctionInfo>, ParseError> {
        let mut methods = Vec::new();
        for statement in self.statements(start, end)? {
            let code = self.code(statement.clone());
            let Some(caps) = METHOD.captures(code) else {
                // Embedded interface or type union.
                continue;
            };
            let open = statement.start + caps[0].len() - 1;
            let close = self.matching(open)?;
            let results = parse_results(self.code(close + 1..statement.end));
            let line = self.src.line_of(statement.start);
            let name = caps[1].to_string();
            methods.push(FunctionInfo {
                is_exported: is_capitalized(&name),
                name,
                parameters: simplified_fields(self.code(open + 1..close)),
                return_type: format_results(&results),
                description: self.src.doc_above(line),
                start_line: line,
                end_line: line,
                ..Default::default()
            });
        }
        Ok(methods)
    }

    fn value_spec(&mut self, spec: Range<usize>, kind: VariableKind, doc: Option<String>) {
        let code = self.code(spec.clone());
        let assign = top_level_assign(code);
        let lhs = &code[..assign.unwrap_or(code.len())];
        let Some(caps) = VALUE_NAMES.captures(lhs.trim()) else {
            return;
        };
        let type_text = caps[2].trim();
        let type_name = (!type_text.is_empty()).then(|| simplify(type_text));

        let values: Vec<String> = match assign {
            Some(eq) => {
                let rhs = self.original(spec.start + eq + 1..spec.end);
                split_top_level(self.code(spec.start + eq + 1..spec.end))
                    .into_iter()
                    .map(|r| summarize(&rhs[r]))
                    .collect()
            }
            None => Vec::new(),
        };

        let line = self.src.line_of(spec.start);
        for (i, name) in caps[1].split(',').map(str::trim).enumerate() {
            if name == "_" {
                continue;
            }
            self.result.variables.push(VariableInfo {
                name: name.to_string(),
                kind,
                type_name: type_name.clone(),
                value: values.get(i).cloned(),
                description: doc.clone(),
                is_exported: is_capitalized(name),
                line,
            });
        }
    }
}

/// Offset of the first `=` that is an assignment, outside brackets.
fn top_level_assign(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                let compound = matches!(prev, Some(b'=' | b'!' | b'<' | b'>' | b':'));
                if !compound && next != Some(b'=') {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// The source with comments and literal contents blanked, byte for byte.
pub(super) fn mask_code(text: &str) -> Result<String, ParseError> {
    Masked::new(text).map(|masked| masked.code)
}

/// Extract declarations from Go source without the helper.
pub(super) fn extract(text: &str) -> Result<AnalysisResult, ParseError> {
    let masked = Masked::new(text)?;
    Parser::new(&masked).run()
}
