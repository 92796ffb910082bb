//! Indentation-scanning strategy for Python.
//!
//! A single forward pass over the lines with an explicit [`ScanState`]:
//! the stack of open classes, the open multi-line string (if any) and the
//! open blocks whose end line is not known yet. Each line is matched
//! against the rules below in priority order; the first rule that applies
//! decides what the line means.
//!
//! 1. Inside a multi-line string: only look for the closing delimiter.
//! 2. A triple-quote delimiter appearing an odd number of times opens one.
//! 3. Blank and comment-only lines contribute comments and work markers.
//! 4. A code line at or left of an open class/def closes it.
//! 5. `import` / `from ... import` lines.
//! 6. `class` headers.
//! 7. `def` headers, possibly spanning several lines.
//! 8. Assignments: class attributes, `self.x` attributes, module variables.

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::comments::comment_with_todos;
use crate::analysis::routes::{http_verb, path_parameters};
use crate::analysis::{
    AnalysisResult, ApiEndpointInfo, ClassInfo, ExportInfo, ExportKind, Extraction, FunctionInfo,
    ImportInfo, LanguageStrategy, ParameterInfo, PropertyInfo, SourceFile, VariableInfo,
    VariableKind, NAMESPACE_SENTINEL,
};
use crate::error::ParseError;

/// How many lines after a header are searched for a docstring.
const DOCSTRING_WINDOW: usize = 3;

const TAB_WIDTH: usize = 8;

const MAX_VALUE_LEN: usize = 80;

lazy_static! {
    static ref IMPORT: Regex = Regex::new(r"^import\s+(.+)$").unwrap();
    static ref FROM_IMPORT: Regex = Regex::new(r"^from\s+(\S+)\s+import\s+(.*)$").unwrap();
    static ref CLASS_HEADER: Regex = Regex::new(r"^class\s+([A-Za-z_]\w*)").unwrap();
    static ref CLASS_BASES: Regex =
        Regex::new(r"^class\s+[A-Za-z_]\w*\s*(?:\[[^\]]*\])?\s*(?:\((.*)\))?\s*:").unwrap();
    static ref DEF_START: Regex =
        Regex::new(r"^(async\s+)?def\s+([A-Za-z_]\w*)\s*(?:\[[^\]]*\])?\s*\(").unwrap();
    static ref CLASS_ATTRIBUTE: Regex =
        Regex::new(r"^([A-Za-z_]\w*)\s*:\s*([^=]+?)\s*(?:=\s*(.*))?$").unwrap();
    static ref BARE_ASSIGNMENT: Regex = Regex::new(r"^([A-Za-z_]\w*)\s*=\s*([^=].*)$").unwrap();
    static ref SELF_ATTRIBUTE: Regex =
        Regex::new(r"\bself\.([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*=[^=]").unwrap();
    static ref EXPORT_LIST: Regex = Regex::new(r"^__all__\s*(?::[^=]*)?\+?=").unwrap();
    static ref QUOTED_NAME: Regex = Regex::new(r#"['"]([A-Za-z_]\w*)['"]"#).unwrap();
    static ref ROUTE_DECORATOR: Regex =
        Regex::new(r#"^[\w.]+\.route\(\s*['"]([^'"]+)['"](.*)\)\s*$"#).unwrap();
    static ref VERB_DECORATOR: Regex =
        Regex::new(r#"^[\w.]+\.(\w+)\(\s*['"]([^'"]+)['"]"#).unwrap();
    static ref ROUTE_METHODS: Regex = Regex::new(r"methods\s*=\s*[\[(]([^\])]*)[\])]").unwrap();
}

pub struct IndentationStrategy;

impl IndentationStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IndentationStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageStrategy for IndentationStrategy {
    fn name(&self) -> &'static str {
        "indentation"
    }

    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn analyze(&self, source: &SourceFile<'_>) -> Result<Extraction, ParseError> {
        Scanner::new(self.language_id(), source.text)
            .run()
            .map(Extraction::clean)
    }
}

/// A class whose body is still being scanned.
#[derive(Debug, Clone, Copy)]
struct OpenClass {
    /// Position in `AnalysisResult::classes`.
    index: usize,
    indent: usize,
    /// Indentation of the first line of the body, once seen.
    body_indent: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct OpenString {
    delimiter: &'static str,
    line: usize,
}

/// Declaration whose end line is assigned when its block closes.
#[derive(Debug, Clone, Copy)]
enum BlockTarget {
    Function(usize),
    Method { class: usize, method: usize },
    Class(usize),
}

#[derive(Debug, Clone, Copy)]
struct OpenBlock {
    indent: usize,
    target: BlockTarget,
}

/// Scanner state threaded through the line loop.
#[derive(Debug, Default)]
struct ScanState {
    /// Open classes, innermost last.
    classes: Vec<OpenClass>,
    string: Option<OpenString>,
    blocks: Vec<OpenBlock>,
    last_code_line: usize,
}

struct Scanner<'a> {
    lines: Vec<&'a str>,
    result: AnalysisResult,
    state: ScanState,
    /// Names collected from `__all__`, if the module declares one.
    export_list: Option<Vec<String>>,
}

impl<'a> Scanner<'a> {
    fn new(language: &str, text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            result: AnalysisResult::new(language),
            state: ScanState::default(),
            export_list: None,
        }
    }

    fn run(mut self) -> Result<AnalysisResult, ParseError> {
        let mut index = 0;
        while index < self.lines.len() {
            index = self.step(index)?;
        }

        if let Some(open) = self.state.string {
            return Err(ParseError::Unterminated {
                what: "triple-quoted string",
                line: open.line,
            });
        }
        self.close_scopes(0);
        self.finish_exports();
        Ok(self.result)
    }

    /// Process the line at `index` and return the index of the next
    /// unconsumed line.
    fn step(&mut self, index: usize) -> Result<usize, ParseError> {
        let line_no = index + 1;
        let line = self.lines[index];

        // 1. Multi-line string body.
        if let Some(open) = self.state.string {
            if line.matches(open.delimiter).count() % 2 == 1 {
                self.state.string = None;
                self.state.last_code_line = line_no;
            }
            return Ok(index + 1);
        }

        let (code, comment) = split_comment(line);
        let code = code.trim();

        // 2. Multi-line string start.
        if let Some(delimiter) = opens_string(code) {
            self.state.string = Some(OpenString {
                delimiter,
                line: line_no,
            });
        }

        // 3. Blank or comment-only.
        if code.is_empty() {
            if let Some(comment) = comment {
                let (info, todos) = comment_with_todos(comment, line_no, line_no);
                self.result.comments.push(info);
                self.result.todos.extend(todos);
            }
            return Ok(index + 1);
        }

        // 4. Dedent closes classes and blocks.
        let indent = indentation(line);
        self.close_scopes(indent);
        self.state.last_code_line = line_no;
        if let Some(top) = self.state.classes.last_mut() {
            if top.body_indent.is_none() && indent > top.indent {
                top.body_indent = Some(indent);
            }
        }

        // 5-8.
        if IMPORT.is_match(code) || FROM_IMPORT.is_match(code) {
            return self.import(index, code);
        }
        if CLASS_HEADER.is_match(code) {
            return self.class(index, indent);
        }
        if DEF_START.is_match(code) {
            return self.function(index, indent);
        }
        let next = self.assignment(index, indent, code, comment)?;
        if next == index + 1 {
            return self.continuation(index, code);
        }
        Ok(next)
    }

    /// Consume the lines of a statement left open by brackets, so their
    /// indentation neither closes scopes nor reads as new statements.
    fn continuation(&mut self, index: usize, code: &str) -> Result<usize, ParseError> {
        if self.state.string.is_some() || bracket_depth(code) <= 0 {
            return Ok(index + 1);
        }
        let (_, end) = self.gather(index, |t| bracket_depth(t) <= 0, "bracketed expression")?;
        for line_index in index + 1..=end {
            if let (_, Some(comment)) = split_comment(self.lines[line_index]) {
                let line_no = line_index + 1;
                let (info, todos) = comment_with_todos(comment, line_no, line_no);
                self.result.comments.push(info);
                self.result.todos.extend(todos);
            }
        }
        self.state.last_code_line = end + 1;
        Ok(end + 1)
    }

    fn close_scopes(&mut self, indent: usize) {
        let end = self.state.last_code_line;
        while let Some(block) = self.state.blocks.last().copied() {
            if indent > block.indent {
                break;
            }
            self.state.blocks.pop();
            self.set_end(block.target, end);
        }
        while self
            .state
            .classes
            .last()
            .is_some_and(|class| indent <= class.indent)
        {
            self.state.classes.pop();
        }
    }

    fn set_end(&mut self, target: BlockTarget, end: usize) {
        let slot = match target {
            BlockTarget::Function(i) => self.result.functions.get_mut(i).map(|f| &mut f.end_line),
            BlockTarget::Class(i) => self.result.classes.get_mut(i).map(|c| &mut c.end_line),
            BlockTarget::Method { class, method } => self
                .result
                .classes
                .get_mut(class)
                .and_then(|c| c.methods.get_mut(method))
                .map(|m| &mut m.end_line),
        };
        if let Some(slot) = slot {
            *slot = end.max(*slot);
        }
    }

    /// Join the code parts of lines starting at `index` until `complete`
    /// accepts the text. Returns the joined text and the last line index.
    fn gather(
        &self,
        index: usize,
        complete: impl Fn(&str) -> bool,
        what: &'static str,
    ) -> Result<(String, usize), ParseError> {
        let mut text = split_comment(self.lines[index]).0.trim().to_string();
        let mut end = index;
        while !complete(&text) {
            end += 1;
            let Some(line) = self.lines.get(end) else {
                return Err(ParseError::Unterminated {
                    what,
                    line: index + 1,
                });
            };
            if text.ends_with('\\') {
                text.pop();
            }
            text.push(' ');
            text.push_str(split_comment(line).0.trim());
        }
        Ok((text, end))
    }

    // 5.
    fn import(&mut self, index: usize, code: &str) -> Result<usize, ParseError> {
        let line = index + 1;
        let (text, end) = if bracket_depth(code) > 0 || code.ends_with('\\') {
            self.gather(
                index,
                |t| bracket_depth(t) <= 0 && !t.ends_with('\\'),
                "import list",
            )?
        } else {
            (code.to_string(), index)
        };

        if let Some(caps) = FROM_IMPORT.captures(&text) {
            let list = caps[2].trim().trim_start_matches('(').trim_end_matches(')');
            let mut import = ImportInfo {
                source: caps[1].to_string(),
                line,
                ..Default::default()
            };
            for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if item == NAMESPACE_SENTINEL {
                    import.is_namespace = true;
                }
                let name = item.split_whitespace().next().unwrap_or(item);
                import.symbols.push(name.to_string());
            }
            self.result.imports.push(import);
        } else if let Some(caps) = IMPORT.captures(&text) {
            for item in caps[1].split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let mut parts = item.split_whitespace();
                let source = parts.next().unwrap_or(item).to_string();
                let alias = match (parts.next(), parts.next()) {
                    (Some("as"), Some(alias)) => Some(alias.to_string()),
                    _ => None,
                };
                self.result.imports.push(ImportInfo {
                    source,
                    symbols: vec![NAMESPACE_SENTINEL.to_string()],
                    alias,
                    is_default: false,
                    is_namespace: true,
                    line,
                });
            }
        }

        self.state.last_code_line = end + 1;
        Ok(end + 1)
    }

    /// Whether a declaration at `indent` is recorded, and whether it sits
    /// directly in a class body.
    fn placement(&self, indent: usize) -> Option<Option<OpenClass>> {
        match self.state.classes.last() {
            Some(top) if top.body_indent == Some(indent) => Some(Some(*top)),
            Some(_) => None,
            None if indent == 0 => Some(None),
            None => None,
        }
    }

    // 6.
    fn class(&mut self, index: usize, indent: usize) -> Result<usize, ParseError> {
        let (header, end) = self.gather(
            index,
            |t| bracket_depth(t) <= 0 && has_block_colon(t),
            "class header",
        )?;
        self.state.last_code_line = end + 1;

        let Some(placement) = self.placement(indent) else {
            return Ok(end + 1);
        };
        let Some(name) = CLASS_HEADER.captures(&header).map(|c| c[1].to_string()) else {
            return Ok(end + 1);
        };

        let mut bases: Vec<String> = CLASS_BASES
            .captures(&header)
            .and_then(|c| c.get(1))
            .map(|m| {
                split_top_level(m.as_str())
                    .into_iter()
                    .map(str::trim)
                    .filter(|b| !b.is_empty() && !b.contains('=') && *b != "object")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let extends = (!bases.is_empty()).then(|| bases.remove(0));

        let class = ClassInfo {
            name,
            extends,
            implements: bases,
            description: self.docstring(end + 1),
            decorators: self
                .decorators(index, indent)
                .into_iter()
                .map(|(text, _)| text)
                .collect(),
            is_exported: placement.is_none(),
            start_line: index + 1,
            end_line: end + 1,
            ..Default::default()
        };

        let class_index = self.result.classes.len();
        self.result.classes.push(class);
        self.state.classes.push(OpenClass {
            index: class_index,
            indent,
            body_indent: None,
        });
        self.state.blocks.push(OpenBlock {
            indent,
            target: BlockTarget::Class(class_index),
        });
        Ok(end + 1)
    }

    // 7.
    fn function(&mut self, index: usize, indent: usize) -> Result<usize, ParseError> {
        let (header, end) =
            self.gather(index, |t| parse_def_header(t).is_some(), "function header")?;
        self.state.last_code_line = end + 1;

        let Some(placement) = self.placement(indent) else {
            return Ok(end + 1);
        };
        let Some(def) = parse_def_header(&header) else {
            return Ok(end + 1);
        };

        let decorators = self.decorators(index, indent);
        let is_exported = match placement {
            Some(_) => !def.name.starts_with('_'),
            None => true,
        };
        let function = FunctionInfo {
            name: def.name.to_string(),
            parameters: split_top_level(def.params)
                .into_iter()
                .filter_map(parse_parameter)
                .collect(),
            return_type: def.returns.map(str::to_string),
            description: self.docstring(end + 1),
            is_async: def.is_async,
            is_exported,
            start_line: index + 1,
            end_line: end + 1,
            receiver: None,
            decorators: decorators.iter().map(|(text, _)| text.clone()).collect(),
        };

        for (decorator, line) in &decorators {
            self.route(decorator, *line, &function.name);
        }

        let target = match placement {
            Some(class) => {
                let methods = &mut self.result.classes[class.index].methods;
                methods.push(function);
                BlockTarget::Method {
                    class: class.index,
                    method: methods.len() - 1,
                }
            }
            None => {
                self.result.functions.push(function);
                BlockTarget::Function(self.result.functions.len() - 1)
            }
        };
        self.state.blocks.push(OpenBlock { indent, target });
        Ok(end + 1)
    }

    // 8.
    fn assignment(
        &mut self,
        index: usize,
        indent: usize,
        code: &str,
        comment: Option<&str>,
    ) -> Result<usize, ParseError> {
        let description = comment
            .map(|c| c.trim_start_matches('#').trim().to_string())
            .filter(|c| !c.is_empty());

        if let Some(top) = self.state.classes.last().copied() {
            if top.body_indent == Some(indent) {
                let property = if let Some(caps) = CLASS_ATTRIBUTE.captures(code) {
                    Some(attribute(&caps[1], Some(caps[2].trim()), description))
                } else {
                    BARE_ASSIGNMENT
                        .captures(code)
                        .map(|caps| attribute(&caps[1], None, description))
                };
                if let Some(property) = property {
                    self.add_property(top.index, property);
                }
            } else if indent > top.indent {
                let found: Vec<PropertyInfo> = SELF_ATTRIBUTE
                    .captures_iter(code)
                    .map(|caps| {
                        attribute(
                            &caps[1],
                            caps.get(2).map(|m| m.as_str().trim()),
                            description.clone(),
                        )
                    })
                    .collect();
                for property in found {
                    self.add_property(top.index, property);
                }
            }
            return Ok(index + 1);
        }

        if indent != 0 {
            return Ok(index + 1);
        }

        if EXPORT_LIST.is_match(code) {
            let (text, end) = self.gather(index, |t| bracket_depth(t) <= 0, "__all__ list")?;
            let names = QUOTED_NAME.captures_iter(&text).map(|c| c[1].to_string());
            self.export_list.get_or_insert_with(Vec::new).extend(names);
            self.state.last_code_line = end + 1;
            return Ok(end + 1);
        }

        let parsed = CLASS_ATTRIBUTE
            .captures(code)
            .map(|c| {
                (
                    c[1].to_string(),
                    Some(c[2].trim().to_string()),
                    c.get(3).map(|m| m.as_str().to_string()),
                )
            })
            .or_else(|| {
                BARE_ASSIGNMENT
                    .captures(code)
                    .map(|c| (c[1].to_string(), None, Some(c[2].to_string())))
            });
        if let Some((name, type_name, value)) = parsed {
            let kind = if is_constant_name(&name) {
                VariableKind::Const
            } else {
                VariableKind::Var
            };
            self.result.variables.push(VariableInfo {
                is_exported: !name.starts_with('_'),
                name,
                kind,
                type_name,
                value: value.map(|v| summarize(&v)),
                description,
                line: index + 1,
            });
        }
        Ok(index + 1)
    }

    fn add_property(&mut self, class: usize, property: PropertyInfo) {
        let properties = &mut self.result.classes[class].properties;
        if !properties.iter().any(|p| p.name == property.name) {
            properties.push(property);
        }
    }

    /// Decorators directly above the header at `index`, in source order,
    /// with the `@` stripped and their 1-based line.
    fn decorators(&self, index: usize, indent: usize) -> Vec<(String, usize)> {
        let mut found = Vec::new();
        let mut continuation: Vec<&str> = Vec::new();
        let mut i = index;
        while i > 0 {
            i -= 1;
            let line = self.lines[i];
            let code = split_comment(line).0.trim();
            if code.is_empty() {
                break;
            }
            let line_indent = indentation(line);
            if line_indent == indent && code.starts_with('@') {
                let mut text = code[1..].to_string();
                for part in continuation.drain(..).rev() {
                    text.push(' ');
                    text.push_str(part);
                }
                found.push((text, i + 1));
            } else if line_indent > indent || (line_indent == indent && code.starts_with(')')) {
                continuation.push(code);
            } else {
                break;
            }
        }
        found.reverse();
        found
    }

    /// Docstring starting within a few lines of `start` (0-based index).
    fn docstring(&self, start: usize) -> Option<String> {
        for index in start..(start + DOCSTRING_WINDOW).min(self.lines.len()) {
            if self.lines[index].trim().is_empty() {
                continue;
            }
            return read_docstring(&self.lines[index..]);
        }
        None
    }

    fn route(&mut self, decorator: &str, line: usize, handler: &str) {
        let mut push = |method: String, path: &str| {
            if path.starts_with('/') {
                self.result.api_endpoints.push(ApiEndpointInfo {
                    method,
                    path: path.to_string(),
                    handler: handler.to_string(),
                    parameters: path_parameters(path),
                    line,
                });
            }
        };

        if let Some(caps) = ROUTE_DECORATOR.captures(decorator) {
            let methods: Vec<String> = ROUTE_METHODS
                .captures(&caps[2])
                .map(|m| {
                    QUOTED_NAME
                        .captures_iter(&m[1])
                        .map(|c| c[1].to_ascii_uppercase())
                        .collect()
                })
                .unwrap_or_default();
            if methods.is_empty() {
                push("GET".to_string(), &caps[1]);
            }
            for method in methods {
                push(method, &caps[1]);
            }
        } else if let Some(caps) = VERB_DECORATOR.captures(decorator) {
            if let Some(method) = http_verb(&caps[1]) {
                push(method, &caps[2]);
            }
        }
    }

    fn finish_exports(&mut self) {
        // Only module-level classes start out exported.
        let module_classes: Vec<usize> = self
            .result
            .classes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_exported)
            .map(|(i, _)| i)
            .collect();

        let Some(names) = self.export_list.take() else {
            let functions = self
                .result
                .functions
                .iter()
                .map(|f| (f.name.clone(), ExportKind::Function));
            let classes = module_classes
                .iter()
                .map(|&i| (self.result.classes[i].name.clone(), ExportKind::Class));
            let exports: Vec<ExportInfo> = functions
                .chain(classes)
                .map(|(name, kind)| ExportInfo {
                    name,
                    kind,
                    is_default: false,
                })
                .collect();
            self.result.exports = exports;
            return;
        };

        let listed = |name: &str| names.iter().any(|n| n == name);
        for function in &mut self.result.functions {
            function.is_exported = listed(&function.name);
        }
        for &i in &module_classes {
            let class = &mut self.result.classes[i];
            class.is_exported = listed(&class.name);
        }
        for variable in &mut self.result.variables {
            variable.is_exported = listed(&variable.name);
        }

        let mut exports: Vec<ExportInfo> = Vec::new();
        for name in &names {
            if exports.iter().any(|e| &e.name == name) {
                continue;
            }
            let kind = if self.result.functions.iter().any(|f| &f.name == name) {
                ExportKind::Function
            } else if module_classes
                .iter()
                .any(|&i| &self.result.classes[i].name == name)
            {
                ExportKind::Class
            } else {
                ExportKind::Variable
            };
            exports.push(ExportInfo {
                name: name.clone(),
                kind,
                is_default: false,
            });
        }
        self.result.exports = exports;
    }
}

/// Parsed pieces of a `def` header.
struct DefHeader<'t> {
    is_async: bool,
    name: &'t str,
    params: &'t str,
    returns: Option<&'t str>,
}

/// Parse a complete `def` header, or `None` if more lines are needed.
fn parse_def_header(text: &str) -> Option<DefHeader<'_>> {
    let caps = DEF_START.captures(text)?;
    let open = caps.get(0)?.end() - 1;
    let close = matching_close(text, open)?;
    let rest = &text[close + 1..];
    let colon = find_top_level(rest, ':')?;
    let returns = rest[..colon]
        .trim()
        .strip_prefix("->")
        .map(str::trim)
        .filter(|r| !r.is_empty());
    Some(DefHeader {
        is_async: caps.get(1).is_some(),
        name: caps.get(2)?.as_str(),
        params: &text[open + 1..close],
        returns,
    })
}

/// Parse one parameter. `self`, `cls` and the bare `*` and `/` markers
/// yield nothing.
fn parse_parameter(raw: &str) -> Option<ParameterInfo> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" || raw == "/" {
        return None;
    }
    let (declaration, default) = match find_top_level(raw, '=') {
        Some(i) => (raw[..i].trim(), Some(raw[i + 1..].trim())),
        None => (raw, None),
    };
    let (name, type_name) = match declaration.find(':') {
        Some(i) => (declaration[..i].trim(), Some(declaration[i + 1..].trim())),
        None => (declaration, None),
    };
    if name == "self" || name == "cls" {
        return None;
    }
    Some(ParameterInfo {
        name: name.to_string(),
        is_optional: default.is_some() || type_name.is_some_and(is_optional_type),
        type_name: type_name.map(str::to_string),
        default_value: default.map(str::to_string),
    })
}

fn is_optional_type(type_name: &str) -> bool {
    type_name.starts_with("Optional[") || type_name.split('|').any(|part| part.trim() == "None")
}

fn attribute(name: &str, type_name: Option<&str>, description: Option<String>) -> PropertyInfo {
    PropertyInfo {
        name: name.to_string(),
        is_optional: type_name.is_some_and(is_optional_type),
        is_readonly: type_name.is_some_and(|t| t.starts_with("Final")),
        type_name: type_name.map(str::to_string),
        description,
    }
}

/// Read a docstring beginning on the first line of `lines`.
fn read_docstring(lines: &[&str]) -> Option<String> {
    let first = lines.first()?.trim();
    let first = first
        .strip_prefix(['r', 'R', 'u', 'U'])
        .filter(|rest| rest.starts_with(['"', '\'']))
        .unwrap_or(first);
    let delimiter = ["\"\"\"", "'''"]
        .into_iter()
        .find(|d| first.starts_with(d))?;
    let body = &first[delimiter.len()..];

    let text = if let Some(end) = body.find(delimiter) {
        body[..end].trim().to_string()
    } else {
        let mut parts = vec![body.trim()];
        let mut closed = false;
        for line in &lines[1..] {
            if let Some(end) = line.find(delimiter) {
                parts.push(line[..end].trim());
                closed = true;
                break;
            }
            parts.push(line.trim());
        }
        if !closed {
            return None;
        }
        parts.join("\n").trim().to_string()
    };
    (!text.is_empty()).then_some(text)
}

/// Split a line into its code part and trailing `#` comment.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '#') => return (&line[..i], Some(&line[i..])),
            _ => {}
        }
    }
    (line, None)
}

/// The triple-quote delimiter this line leaves open, if any.
fn opens_string(code: &str) -> Option<&'static str> {
    ["\"\"\"", "'''"]
        .into_iter()
        .find(|d| code.matches(d).count() % 2 == 1)
}

fn indentation(line: &str) -> usize {
    let mut width = 0;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
            _ => break,
        }
    }
    width
}

/// Walk `text` from byte `start` skipping string literals, calling `visit`
/// with each byte offset and character at its nesting depth (0 = top).
fn scan_nesting(text: &str, start: usize, mut visit: impl FnMut(usize, char, i32) -> bool) {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        let i = i + start;
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' | '{' => {
                depth += 1;
                if !visit(i, ch, depth) {
                    return;
                }
            }
            ')' | ']' | '}' => {
                if !visit(i, ch, depth) {
                    return;
                }
                depth -= 1;
            }
            _ => {
                if !visit(i, ch, depth) {
                    return;
                }
            }
        }
    }
}

/// Net bracket depth at the end of `text`.
fn bracket_depth(text: &str) -> i32 {
    let mut last = 0;
    scan_nesting(text, 0, |_, ch, depth| {
        last = match ch {
            ')' | ']' | '}' => depth - 1,
            _ => depth,
        };
        true
    });
    last
}

/// Byte offset of the bracket closing the one at `open`.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut found = None;
    scan_nesting(text, open, |i, ch, depth| {
        if depth == 1 && matches!(ch, ')' | ']' | '}') && i > open {
            found = Some(i);
            return false;
        }
        true
    });
    found
}

/// First occurrence of `target` outside brackets and strings.
fn find_top_level(text: &str, target: char) -> Option<usize> {
    let mut found = None;
    scan_nesting(text, 0, |i, ch, depth| {
        if depth == 0 && ch == target {
            found = Some(i);
            return false;
        }
        true
    });
    found
}

fn has_block_colon(text: &str) -> bool {
    find_top_level(text, ':').is_some()
}

/// Split on commas outside brackets and strings.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    scan_nesting(text, 0, |i, ch, depth| {
        if depth == 0 && ch == ',' {
            parts.push(&text[start..i]);
            start = i + 1;
        }
        true
    });
    parts.push(&text[start..]);
    parts.retain(|p| !p.trim().is_empty());
    parts
}

fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn summarize(value: &str) -> String {
    let value = value.trim();
    if value.chars().count() > MAX_VALUE_LEN {
        let cut: String = value.chars().take(MAX_VALUE_LEN).collect();
        format!("{}...", cut)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TodoKind;
    use std::path::Path;

    fn scan(source: &str) -> AnalysisResult {
        Scanner::new("python", source).run().unwrap()
    }

    #[test]
    fn test_single_function_with_docstring() {
        let result = scan("def add(a: int, b: int) -> int:\n    \"\"\"Add two numbers.\"\"\"\n    return a + b\n");

        assert_eq!(result.functions.len(), 1);
        let add = &result.functions[0];
        assert_eq!(add.name, "add");
        assert_eq!(
            add.parameters,
            vec![ParameterInfo::typed("a", "int"), ParameterInfo::typed("b", "int")]
        );
        assert_eq!(add.return_type.as_deref(), Some("int"));
        assert_eq!(add.description.as_deref(), Some("Add two numbers."));
        assert!(add.is_exported);
        assert_eq!((add.start_line, add.end_line), (1, 3));
        assert_eq!(result.exports.len(), 1);
        assert!(result.exports_consistent());
    }

    #[test]
    fn test_class_with_methods_and_properties() {
        let source = [
            "@dataclass",
            "class UserService(BaseService, Auditable, metaclass=Meta):",
            "    '''Manages users.'''",
            "    table: str = 'users'  # backing table",
            "    retries = 3",
            "",
            "    def __init__(self, db, cache=None):",
            "        self.db = db",
            "        self.cache: Cache = cache",
            "",
            "    async def fetch(self, user_id: str) -> Optional[User]:",
            "        def inner():",
            "            return 1",
            "        return await self.db.get(user_id)",
            "",
            "    def _evict(self):",
            "        pass",
            "",
            "def helper():",
            "    pass",
        ]
        .join("\n");
        let result = scan(&source);

        assert_eq!(result.classes.len(), 1);
        let class = &result.classes[0];
        assert_eq!(class.name, "UserService");
        assert_eq!(class.extends.as_deref(), Some("BaseService"));
        assert_eq!(class.implements, vec!["Auditable"]);
        assert_eq!(class.decorators, vec!["dataclass"]);
        assert_eq!(class.description.as_deref(), Some("Manages users."));
        assert_eq!((class.start_line, class.end_line), (2, 17));

        let props: Vec<_> = class.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(props, vec!["table", "retries", "db", "cache"]);
        assert_eq!(class.properties[0].type_name.as_deref(), Some("str"));
        assert_eq!(class.properties[0].description.as_deref(), Some("backing table"));

        let methods: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["__init__", "fetch", "_evict"]);
        let init = &class.methods[0];
        assert_eq!(init.parameters.len(), 2);
        assert_eq!(init.parameters[1].default_value.as_deref(), Some("None"));
        assert!(init.parameters[1].is_optional);
        assert!(!init.is_exported);
        let fetch = &class.methods[1];
        assert!(fetch.is_async);
        assert!(fetch.is_exported);
        assert_eq!(fetch.return_type.as_deref(), Some("Optional[User]"));
        assert_eq!((fetch.start_line, fetch.end_line), (11, 14));

        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.functions[0].name, "helper");
        assert_eq!(result.functions[0].end_line, 20);
        assert!(result.spans_within(20));
    }

    #[test]
    fn test_multiline_header() {
        let source = [
            "def configure(",
            "    name: str,",
            "    *args,",
            "    timeout: float = 1.5,",
            "    **kwargs,",
            ") -> Dict[str, int]:",
            "    return {}",
        ]
        .join("\n");
        let result = scan(&source);

        let f = &result.functions[0];
        let names: Vec<_> = f.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "*args", "timeout", "**kwargs"]);
        assert_eq!(f.parameters[2].default_value.as_deref(), Some("1.5"));
        assert_eq!(f.return_type.as_deref(), Some("Dict[str, int]"));
        assert_eq!((f.start_line, f.end_line), (1, 7));
    }

    #[test]
    fn test_imports() {
        let source = [
            "import os, sys as system",
            "from typing import (",
            "    Dict,",
            "    List as L,",
            ")",
            "from .models import *",
        ]
        .join("\n");
        let result = scan(&source);

        assert_eq!(result.imports.len(), 4);
        assert_eq!(result.imports[0].source, "os");
        assert!(result.imports[0].is_namespace);
        assert_eq!(result.imports[1].alias.as_deref(), Some("system"));
        assert_eq!(result.imports[2].source, "typing");
        assert_eq!(result.imports[2].symbols, vec!["Dict", "List"]);
        assert_eq!(result.imports[3].symbols, vec![NAMESPACE_SENTINEL]);
        assert!(result.imports[3].is_namespace);
        assert_eq!(result.imports[3].line, 6);
    }

    #[test]
    fn test_export_list_overrides() {
        let source = [
            "__all__ = [",
            "    'public',",
            "    \"VERSION\",",
            "]",
            "VERSION = '1.0'",
            "def public(): pass",
            "def hidden(): pass",
        ]
        .join("\n");
        let result = scan(&source);

        let exported: Vec<_> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(exported, vec!["public", "VERSION"]);
        assert_eq!(result.exports[1].kind, ExportKind::Variable);
        assert!(result.functions[0].is_exported);
        assert!(!result.functions[1].is_exported);
        assert_eq!(result.variables[0].kind, VariableKind::Const);
        assert!(result.variables[0].is_exported);
    }

    #[test]
    fn test_comments_skip_string_bodies() {
        let source = [
            "# TODO: fix this",
            "QUERY = \"\"\"",
            "# NOTE: not a comment",
            "\"\"\"",
            "x = 1  # trailing",
        ]
        .join("\n");
        let result = scan(&source);

        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.comments[0].start_line, 1);
        assert_eq!(result.todos.len(), 1);
        assert_eq!(result.todos[0].kind, TodoKind::Todo);
        assert_eq!(result.todos[0].content, "fix this");
        assert_eq!(result.variables.len(), 2);
    }

    #[test]
    fn test_nested_classes() {
        let source = [
            "class Outer:",
            "    class Meta:",
            "        ordering = 'id'",
            "        def key(self): pass",
            "    def run(self): pass",
        ]
        .join("\n");
        let result = scan(&source);

        assert_eq!(result.classes.len(), 2);
        assert_eq!(result.classes[0].methods[0].name, "run");
        assert_eq!(result.classes[1].name, "Meta");
        assert!(!result.classes[1].is_exported);
        assert_eq!(result.classes[1].properties[0].name, "ordering");
        assert_eq!(result.classes[1].methods[0].name, "key");
        assert_eq!(result.exports.len(), 1);
    }

    #[test]
    fn test_flask_routes() {
        let source = [
            "@app.route('/analytics/users/<user_id>', methods=['GET', 'POST'])",
            "def user_stats(user_id):",
            "    pass",
            "@router.delete(\"/items/{item_id}\")",
            "async def remove(item_id: int):",
            "    pass",
        ]
        .join("\n");
        let result = scan(&source);

        assert_eq!(result.api_endpoints.len(), 3);
        let get = &result.api_endpoints[0];
        assert_eq!(get.method, "GET");
        assert_eq!(get.handler, "user_stats");
        assert_eq!(get.parameters, vec![ParameterInfo::named("user_id")]);
        assert_eq!(get.line, 1);
        assert_eq!(result.api_endpoints[1].method, "POST");
        let delete = &result.api_endpoints[2];
        assert_eq!(delete.method, "DELETE");
        assert_eq!(delete.handler, "remove");
    }

    #[test]
    fn test_unterminated_constructs() {
        let err = Scanner::new("python", "x = 1\ns = '''never closed\n").run().unwrap_err();
        assert_eq!(
            err,
            ParseError::Unterminated {
                what: "triple-quoted string",
                line: 2
            }
        );

        let err = Scanner::new("python", "def broken(a,\n    b\n").run().unwrap_err();
        assert!(matches!(err, ParseError::Unterminated { what: "function header", line: 1 }));
    }

    #[test]
    fn test_bracket_continuation_is_not_a_statement() {
        let source = [
            "setup(",
            "name='docscan',",
            "version=VERSION,  # TODO: read from file",
            ")",
            "DEBUG = False",
            "",
            "class Config:",
            "    defaults = dict(",
            "retries=3,",
            "    )",
            "    timeout = 30",
        ]
        .join("\n");
        let result = scan(&source);

        let names: Vec<_> = result.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["DEBUG"]);
        assert_eq!(result.variables[0].line, 5);

        let config = &result.classes[0];
        let properties: Vec<_> = config.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(properties, vec!["defaults", "timeout"]);
        assert_eq!(config.end_line, 11);

        assert_eq!(result.todos.len(), 1);
        assert_eq!(result.todos[0].line, 3);
    }

    #[test]
    fn test_strategy_contract() {
        let strategy = IndentationStrategy::new();
        let file = SourceFile::new(Path::new("m.py"), "def f():\n    pass\n", false);
        let extraction = strategy.analyze(&file).unwrap();
        assert!(extraction.degraded_to.is_none());
        assert_eq!(extraction.result.language, "python");
        assert!(strategy.manual_fallback(&file).is_none());
    }
}
