//! Declarative facts extracted from a single source file.
//!
//! `AnalysisResult` is the intermediate representation every strategy
//! populates. Collections are always present (empty when nothing was
//! found) and every line number is 1-based.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Symbol used in `ImportInfo::symbols` for whole-namespace imports.
pub const NAMESPACE_SENTINEL: &str = "*";

/// A single function or method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub is_optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl ParameterInfo {
    /// A parameter that only carries a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A parameter with a name and type text.
    pub fn typed(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            ..Default::default()
        }
    }
}

/// A function, method, or method signature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionInfo {
    pub name: String,
    pub parameters: Vec<ParameterInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_async: bool,
    pub is_exported: bool,
    pub start_line: usize,
    pub end_line: usize,
    /// Owning type for methods declared with a receiver clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub decorators: Vec<String>,
}

/// A class field, struct field, or interface property.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyInfo {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub is_optional: bool,
    pub is_readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A class, struct, or named record type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassInfo {
    pub name: String,
    pub methods: Vec<FunctionInfo>,
    pub properties: Vec<PropertyInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    pub implements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub decorators: Vec<String>,
    pub is_exported: bool,
    pub start_line: usize,
    pub end_line: usize,
}

/// An interface: properties and bodiless method signatures.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceInfo {
    pub name: String,
    pub properties: Vec<PropertyInfo>,
    pub methods: Vec<FunctionInfo>,
    pub extends: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_exported: bool,
    pub start_line: usize,
    pub end_line: usize,
}

/// Whether a module-level binding is constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Const,
    #[default]
    Var,
}

/// A module-level constant or variable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableInfo {
    pub name: String,
    pub kind: VariableKind,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_exported: bool,
    pub line: usize,
}

/// An import statement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportInfo {
    pub source: String,
    /// Imported names, or [`NAMESPACE_SENTINEL`] for the whole module.
    pub symbols: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub is_default: bool,
    pub is_namespace: bool,
    pub line: usize,
}

/// Coarse kind tag for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Class,
    Interface,
    #[default]
    Variable,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Function => "function",
            ExportKind::Class => "class",
            ExportKind::Interface => "interface",
            ExportKind::Variable => "variable",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An exported symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportInfo {
    pub name: String,
    pub kind: ExportKind,
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    #[default]
    Single,
    Multi,
}

/// A comment with its delimiters stripped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentInfo {
    pub kind: CommentKind,
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// The closed set of work-marker tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TodoKind {
    #[default]
    #[serde(rename = "TODO")]
    Todo,
    #[serde(rename = "FIXME")]
    Fixme,
    #[serde(rename = "HACK")]
    Hack,
    #[serde(rename = "NOTE")]
    Note,
}

impl TodoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoKind::Todo => "TODO",
            TodoKind::Fixme => "FIXME",
            TodoKind::Hack => "HACK",
            TodoKind::Note => "NOTE",
        }
    }

    /// Case-insensitive tag lookup.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "TODO" => Some(TodoKind::Todo),
            "FIXME" => Some(TodoKind::Fixme),
            "HACK" => Some(TodoKind::Hack),
            "NOTE" => Some(TodoKind::Note),
            _ => None,
        }
    }
}

impl fmt::Display for TodoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A work marker found inside a comment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodoInfo {
    #[serde(rename = "type")]
    pub kind: TodoKind,
    pub content: String,
    pub line: usize,
}

/// An HTTP route registration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiEndpointInfo {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub parameters: Vec<ParameterInfo>,
    pub line: usize,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub interfaces: Vec<InterfaceInfo>,
    pub variables: Vec<VariableInfo>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub comments: Vec<CommentInfo>,
    pub todos: Vec<TodoInfo>,
    pub api_endpoints: Vec<ApiEndpointInfo>,
}

impl AnalysisResult {
    /// Create an empty result for a language.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    /// True when no declaration of any kind was recovered.
    pub fn has_declarations(&self) -> bool {
        !self.functions.is_empty() || !self.classes.is_empty() || !self.interfaces.is_empty()
    }

    /// Iterate `(name, start_line, end_line)` for every declaration,
    /// including methods and interface signatures.
    pub fn declaration_spans(&self) -> impl Iterator<Item = (&str, usize, usize)> + '_ {
        let functions = self
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.start_line, f.end_line));
        let classes = self.classes.iter().flat_map(|c| {
            std::iter::once((c.name.as_str(), c.start_line, c.end_line)).chain(
                c.methods
                    .iter()
                    .map(|m| (m.name.as_str(), m.start_line, m.end_line)),
            )
        });
        let interfaces = self.interfaces.iter().flat_map(|i| {
            std::iter::once((i.name.as_str(), i.start_line, i.end_line)).chain(
                i.methods
                    .iter()
                    .map(|m| (m.name.as_str(), m.start_line, m.end_line)),
            )
        });
        functions.chain(classes).chain(interfaces)
    }

    /// Check that every declaration span satisfies `1 <= start <= end <= line_count`.
    pub fn spans_within(&self, line_count: usize) -> bool {
        self.declaration_spans()
            .all(|(_, start, end)| start >= 1 && start <= end && end <= line_count)
    }

    /// Check that every export names a declaration flagged as exported.
    pub fn exports_consistent(&self) -> bool {
        self.exports.iter().all(|export| {
            self.functions
                .iter()
                .any(|f| f.name == export.name && f.is_exported)
                || self
                    .classes
                    .iter()
                    .any(|c| c.name == export.name && c.is_exported)
                || self
                    .interfaces
                    .iter()
                    .any(|i| i.name == export.name && i.is_exported)
        })
    }
}

/// Number of lines in a source text, never less than one.
pub fn line_count(source: &str) -> usize {
    source.lines().count().max(1)
}

/// Whether an identifier is exported under first-character-case rules.
pub fn is_capitalized(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}
