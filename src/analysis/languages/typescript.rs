//! Syntax-tree strategy for TypeScript, TSX and JavaScript using tree-sitter.
//!
//! Extracts:
//! - Function declarations and function-valued `const`/`let` bindings
//! - Classes (heritage, fields, methods) and interfaces
//! - Imports (ES modules and CommonJS `require`) and exports
//! - Comments, work markers and JSDoc descriptions
//! - HTTP route registrations of the form `router.get('/path', handler)`
//!
//! Any ERROR or MISSING node fails the whole file; recovery belongs to the
//! resilience layer.

use once_cell::sync::OnceCell;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::analysis::comments::{comment_with_todos, doc_description};
use crate::analysis::routes::{http_verb, path_parameters, unquote};
use crate::analysis::{
    AnalysisResult, ApiEndpointInfo, ClassInfo, ExportInfo, ExportKind, Extraction, FunctionInfo,
    ImportInfo, InterfaceInfo, LanguageStrategy, ParameterInfo, PropertyInfo, SourceFile,
    VariableInfo, VariableKind, NAMESPACE_SENTINEL,
};
use crate::error::ParseError;

/// Tree-sitter query for route registrations.
///
/// The first argument must be a string literal; verb filtering and the
/// leading-slash check happen in code.
const ROUTE_QUERY: &str = r#"
(call_expression
  function: (member_expression
    object: (_) @router
    property: (property_identifier) @verb)
  arguments: (arguments . [(string) (template_string)] @path)) @call
"#;

/// Node kinds whose value makes a variable binding a function.
const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Longest variable value text kept in results.
const MAX_VALUE_LEN: usize = 80;

/// Grammar flavor handled by a strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
    JavaScript,
}

pub struct SyntaxTreeStrategy {
    dialect: Dialect,
    language: Language,
    /// Compiled on first use, then shared by every file of this dialect.
    route_query: OnceCell<Query>,
}

impl SyntaxTreeStrategy {
    pub fn new(dialect: Dialect) -> Self {
        let language = match dialect {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        };
        Self {
            dialect,
            language,
            route_query: OnceCell::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn parse(&self, text: &str) -> Result<Tree, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ParseError::Grammar(e.to_string()))?;
        parser.parse(text, None).ok_or_else(|| ParseError::Syntax {
            language: self.language_id(),
            line: 1,
            message: "parser produced no tree".to_string(),
        })
    }

    fn syntax_error(&self, root: Node<'_>, source: &[u8]) -> ParseError {
        let Some(node) = first_error(root) else {
            return ParseError::Syntax {
                language: self.language_id(),
                line: 1,
                message: "syntax error".to_string(),
            };
        };
        let message = if node.is_missing() {
            format!("missing `{}`", node.kind())
        } else {
            let snippet = node.utf8_text(source).unwrap_or("");
            let snippet: String = snippet.lines().next().unwrap_or("").chars().take(40).collect();
            format!("unexpected `{}`", snippet.trim())
        };
        ParseError::Syntax {
            language: self.language_id(),
            line: start_line(node),
            message,
        }
    }

    fn route_query(&self) -> Result<&Query, ParseError> {
        self.route_query.get_or_try_init(|| {
            Query::new(&self.language, ROUTE_QUERY).map_err(|e| ParseError::Grammar(e.to_string()))
        })
    }

    /// Secondary pass: route registrations.
    fn extract_routes(&self, tree: &Tree, text: &str) -> Result<Vec<ApiEndpointInfo>, ParseError> {
        let query = self.route_query()?;
        let source = text.as_bytes();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        let mut endpoints = Vec::new();
        while let Some(m) = matches.next() {
            let mut verb = None;
            let mut path_node = None;
            let mut call_node = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "verb" => verb = capture.node.utf8_text(source).ok(),
                    "path" => path_node = Some(capture.node),
                    "call" => call_node = Some(capture.node),
                    _ => {}
                }
            }

            let (Some(verb), Some(path_node), Some(call_node)) = (verb, path_node, call_node)
            else {
                continue;
            };
            let Some(method) = http_verb(verb) else {
                continue;
            };
            let raw = path_node.utf8_text(source).unwrap_or("");
            if raw.contains("${") {
                continue;
            }
            let path = unquote(raw);
            if !path.starts_with('/') {
                continue;
            }

            let args: Vec<Node> = call_node
                .child_by_field_name("arguments")
                .map(named_children)
                .unwrap_or_default()
                .into_iter()
                .filter(|n| n.kind() != "comment")
                .collect();
            if args.len() < 2 {
                continue;
            }
            let handler = args
                .last()
                .filter(|n| matches!(n.kind(), "identifier" | "member_expression"))
                .and_then(|n| n.utf8_text(source).ok())
                .unwrap_or("anonymous")
                .to_string();

            endpoints.push(ApiEndpointInfo {
                method,
                path: path.to_string(),
                handler,
                parameters: path_parameters(path),
                line: start_line(call_node),
            });
        }

        Ok(endpoints)
    }
}

impl LanguageStrategy for SyntaxTreeStrategy {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn language_id(&self) -> &'static str {
        match self.dialect {
            Dialect::TypeScript | Dialect::Tsx => "typescript",
            Dialect::JavaScript => "javascript",
        }
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        match self.dialect {
            Dialect::TypeScript => &["ts", "mts", "cts"],
            Dialect::Tsx => &["tsx"],
            Dialect::JavaScript => &["js", "jsx", "mjs", "cjs"],
        }
    }

    fn analyze(&self, source: &SourceFile<'_>) -> Result<Extraction, ParseError> {
        let tree = self.parse(source.text)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(self.syntax_error(root, source.text.as_bytes()));
        }

        let mut visitor = Visitor::new(self.language_id(), source.text.as_bytes());
        visitor.walk(root, Scope::Nested);
        let mut result = visitor.finish();
        result.api_endpoints = self.extract_routes(&tree, source.text)?;

        Ok(Extraction::clean(result))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Direct children of the program node.
    Module,
    /// Anything deeper; only comments are collected.
    Nested,
}

/// Single-pass tree walker populating the IR.
struct Visitor<'s> {
    source: &'s [u8],
    result: AnalysisResult,
    /// Local names listed in `export { ... }` clauses.
    export_clause: Vec<String>,
    /// Identifier named by `export default <identifier>`.
    default_export: Option<String>,
}

impl<'s> Visitor<'s> {
    fn new(language: &str, source: &'s [u8]) -> Self {
        Self {
            source,
            result: AnalysisResult::new(language),
            export_clause: Vec::new(),
            default_export: None,
        }
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn walk(&mut self, node: Node<'_>, scope: Scope) {
        if node.kind() == "comment" {
            self.comment(node);
            return;
        }
        if scope == Scope::Module {
            self.statement(node);
        }
        let inner = if node.kind() == "program" {
            Scope::Module
        } else {
            Scope::Nested
        };
        for child in named_children(node) {
            self.walk(child, inner);
        }
    }

    fn statement(&mut self, node: Node<'_>) {
        match node.kind() {
            "import_statement" => self.import(node),
            "export_statement" => self.export(node),
            _ => self.declaration(node, node, false, false),
        }
    }

    /// Record a declaration. `anchor` is the node documentation attaches to
    /// (the export statement for exported declarations).
    fn declaration(&mut self, node: Node<'_>, anchor: Node<'_>, exported: bool, is_default: bool) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                let function = self.function(node, node, anchor, None, exported);
                self.push_export(&function.name, ExportKind::Function, exported, is_default);
                self.result.functions.push(function);
            }
            "class_declaration" | "abstract_class_declaration" | "class" => {
                let class = self.class(node, anchor, exported);
                self.push_export(&class.name, ExportKind::Class, exported, is_default);
                self.result.classes.push(class);
            }
            "interface_declaration" => {
                let interface = self.interface(node, anchor, exported);
                self.push_export(&interface.name, ExportKind::Interface, exported, is_default);
                self.result.interfaces.push(interface);
            }
            "lexical_declaration" | "variable_declaration" => {
                self.bindings(node, anchor, exported);
            }
            _ => {}
        }
    }

    fn push_export(&mut self, name: &str, kind: ExportKind, exported: bool, is_default: bool) {
        if !exported || name.is_empty() {
            return;
        }
        if self.result.exports.iter().any(|e| e.name == name) {
            return;
        }
        self.result.exports.push(ExportInfo {
            name: name.to_string(),
            kind,
            is_default,
        });
    }

    fn export(&mut self, node: Node<'_>) {
        let is_default = has_child_kind(node, "default");

        if let Some(declaration) = node.child_by_field_name("declaration") {
            self.declaration(declaration, node, true, is_default);
            return;
        }

        if let Some(value) = node.child_by_field_name("value") {
            match value.kind() {
                "identifier" => self.default_export = Some(self.text(value).to_string()),
                kind if FUNCTION_VALUES.contains(&kind) => {
                    let mut function = self.function(value, value, node, None, true);
                    if function.name.is_empty() {
                        function.name = "default".to_string();
                    }
                    self.push_export(&function.name, ExportKind::Function, true, is_default);
                    self.result.functions.push(function);
                }
                "class" => self.declaration(value, node, true, is_default),
                _ => {}
            }
            return;
        }

        // Re-exports (`export { x } from './y'`) name no local declaration.
        if node.child_by_field_name("source").is_some() {
            return;
        }
        for clause in named_children(node) {
            if clause.kind() != "export_clause" {
                continue;
            }
            for specifier in named_children(clause) {
                if specifier.kind() != "export_specifier" {
                    continue;
                }
                if let Some(name) = specifier.child_by_field_name("name") {
                    self.export_clause.push(self.text(name).to_string());
                }
            }
        }
    }

    fn import(&mut self, node: Node<'_>) {
        let source = node
            .child_by_field_name("source")
            .map(|n| unquote(self.text(n)).to_string())
            .unwrap_or_default();
        let mut import = ImportInfo {
            source,
            line: start_line(node),
            ..Default::default()
        };

        for clause in named_children(node) {
            if clause.kind() != "import_clause" {
                continue;
            }
            for part in named_children(clause) {
                match part.kind() {
                    "identifier" => {
                        import.symbols.push(self.text(part).to_string());
                        import.is_default = true;
                    }
                    "namespace_import" => {
                        import.symbols.push(NAMESPACE_SENTINEL.to_string());
                        import.is_namespace = true;
                        import.alias = named_children(part)
                            .into_iter()
                            .find(|n| n.kind() == "identifier")
                            .map(|n| self.text(n).to_string());
                    }
                    "named_imports" => {
                        for specifier in named_children(part) {
                            if specifier.kind() != "import_specifier" {
                                continue;
                            }
                            if let Some(name) = specifier.child_by_field_name("name") {
                                import.symbols.push(self.text(name).to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        self.result.imports.push(import);
    }

    /// `const x = require('m')` or `const { a, b } = require('m')`.
    fn require_import(&mut self, declarator: Node<'_>, value: Node<'_>) -> bool {
        if value.kind() != "call_expression" {
            return false;
        }
        let is_require = value
            .child_by_field_name("function")
            .is_some_and(|f| f.kind() == "identifier" && self.text(f) == "require");
        if !is_require {
            return false;
        }
        let Some(module) = value
            .child_by_field_name("arguments")
            .and_then(|args| named_children(args).into_iter().find(|n| n.kind() == "string"))
        else {
            return false;
        };

        let mut import = ImportInfo {
            source: unquote(self.text(module)).to_string(),
            line: start_line(declarator),
            ..Default::default()
        };
        match declarator.child_by_field_name("name") {
            Some(name) if name.kind() == "identifier" => {
                import.symbols.push(NAMESPACE_SENTINEL.to_string());
                import.is_namespace = true;
                import.alias = Some(self.text(name).to_string());
            }
            Some(pattern) => {
                for part in named_children(pattern) {
                    let local = match part.kind() {
                        "shorthand_property_identifier_pattern" => Some(part),
                        "pair_pattern" => part.child_by_field_name("key"),
                        _ => None,
                    };
                    if let Some(local) = local {
                        import.symbols.push(self.text(local).to_string());
                    }
                }
            }
            None => {}
        }
        self.result.imports.push(import);
        true
    }

    fn bindings(&mut self, node: Node<'_>, anchor: Node<'_>, exported: bool) {
        let kind = if has_child_kind(node, "const") {
            VariableKind::Const
        } else {
            VariableKind::Var
        };

        for declarator in named_children(node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(name_node).to_string();
            let value = declarator.child_by_field_name("value");

            if let Some(value) = value.filter(|v| FUNCTION_VALUES.contains(&v.kind())) {
                let function = self.function(value, node, anchor, Some(name), exported);
                self.push_export(&function.name, ExportKind::Function, exported, false);
                self.result.functions.push(function);
                continue;
            }

            if let Some(value) = value {
                if self.require_import(declarator, value) {
                    continue;
                }
            }

            self.result.variables.push(VariableInfo {
                name,
                kind,
                type_name: declarator.child_by_field_name("type").map(|t| self.type_text(t)),
                value: value.map(|v| summarize(self.text(v))),
                description: self.doc_comment(anchor),
                is_exported: exported,
                line: start_line(declarator),
            });
        }
    }

    /// Build a function from a node carrying `parameters`/`return_type`.
    /// `span` supplies the line range and `anchor` the documentation.
    fn function(
        &self,
        node: Node<'_>,
        span: Node<'_>,
        anchor: Node<'_>,
        name: Option<String>,
        exported: bool,
    ) -> FunctionInfo {
        let name = name.unwrap_or_else(|| {
            node.child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default()
        });
        let parameters = match node.child_by_field_name("parameters") {
            Some(params) => self.parameters(params),
            // Single-identifier arrow function: `x => x`.
            None => node
                .child_by_field_name("parameter")
                .map(|p| vec![ParameterInfo::named(self.text(p))])
                .unwrap_or_default(),
        };

        FunctionInfo {
            name,
            parameters,
            return_type: node
                .child_by_field_name("return_type")
                .map(|t| self.type_text(t)),
            description: self.doc_comment(anchor),
            is_async: has_child_kind(node, "async"),
            is_exported: exported,
            start_line: start_line(span),
            end_line: end_line(span),
            receiver: None,
            decorators: Vec::new(),
        }
    }

    fn parameters(&self, params: Node<'_>) -> Vec<ParameterInfo> {
        let mut parameters = Vec::new();
        for param in named_children(params) {
            match param.kind() {
                "required_parameter" | "optional_parameter" => {
                    let name = param
                        .child_by_field_name("pattern")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    if name == "this" {
                        continue;
                    }
                    let default_value = param
                        .child_by_field_name("value")
                        .map(|v| self.text(v).to_string());
                    parameters.push(ParameterInfo {
                        name,
                        type_name: param.child_by_field_name("type").map(|t| self.type_text(t)),
                        is_optional: param.kind() == "optional_parameter"
                            || default_value.is_some(),
                        default_value,
                    });
                }
                "assignment_pattern" => {
                    let name = param
                        .child_by_field_name("left")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    parameters.push(ParameterInfo {
                        name,
                        type_name: None,
                        is_optional: true,
                        default_value: param
                            .child_by_field_name("right")
                            .map(|v| self.text(v).to_string()),
                    });
                }
                "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => {
                    parameters.push(ParameterInfo::named(self.text(param)));
                }
                _ => {}
            }
        }
        parameters
    }

    fn class(&self, node: Node<'_>, anchor: Node<'_>, exported: bool) -> ClassInfo {
        let mut class = ClassInfo {
            name: node
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_else(|| "default".to_string()),
            description: self.doc_comment(anchor),
            is_exported: exported,
            start_line: start_line(node),
            end_line: end_line(node),
            ..Default::default()
        };

        let mut decorated = named_children(node);
        if anchor.id() != node.id() {
            decorated.extend(named_children(anchor));
        }
        class.decorators = decorated
            .into_iter()
            .filter(|n| n.kind() == "decorator")
            .map(|n| self.text(n).trim_start_matches('@').to_string())
            .collect();

        for heritage in named_children(node) {
            if heritage.kind() != "class_heritage" {
                continue;
            }
            for clause in named_children(heritage) {
                match clause.kind() {
                    "extends_clause" => {
                        class.extends = clause
                            .child_by_field_name("value")
                            .or_else(|| named_children(clause).into_iter().next())
                            .map(|n| self.text(n).to_string());
                    }
                    "implements_clause" => {
                        class.implements = named_children(clause)
                            .into_iter()
                            .map(|n| self.text(n).to_string())
                            .collect();
                    }
                    // JavaScript: `class_heritage` holds the expression directly.
                    _ if class.extends.is_none() => {
                        class.extends = Some(self.text(clause).to_string());
                    }
                    _ => {}
                }
            }
        }

        let Some(body) = node.child_by_field_name("body") else {
            return class;
        };
        for member in named_children(body) {
            match member.kind() {
                "method_definition" | "method_signature" | "abstract_method_signature" => {
                    let visible = exported && !is_private_member(member, self.source);
                    let mut method = self.function(member, member, member, None, visible);
                    method.decorators = named_children(member)
                        .into_iter()
                        .filter(|n| n.kind() == "decorator")
                        .map(|n| self.text(n).trim_start_matches('@').to_string())
                        .collect();
                    class.methods.push(method);
                }
                "public_field_definition" | "field_definition" => {
                    let name = member
                        .child_by_field_name("name")
                        .or_else(|| member.child_by_field_name("property"))
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    if name.is_empty() || class.properties.iter().any(|p| p.name == name) {
                        continue;
                    }
                    class.properties.push(PropertyInfo {
                        name,
                        type_name: member.child_by_field_name("type").map(|t| self.type_text(t)),
                        is_optional: has_child_kind(member, "?"),
                        is_readonly: has_child_kind(member, "readonly"),
                        description: self.doc_comment(member),
                    });
                }
                _ => {}
            }
        }

        class
    }

    fn interface(&self, node: Node<'_>, anchor: Node<'_>, exported: bool) -> InterfaceInfo {
        let mut interface = InterfaceInfo {
            name: node
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default(),
            description: self.doc_comment(anchor),
            is_exported: exported,
            start_line: start_line(node),
            end_line: end_line(node),
            ..Default::default()
        };

        for clause in named_children(node) {
            if clause.kind() == "extends_type_clause" {
                interface.extends = named_children(clause)
                    .into_iter()
                    .map(|n| self.text(n).to_string())
                    .collect();
            }
        }

        let Some(body) = node.child_by_field_name("body") else {
            return interface;
        };
        for member in named_children(body) {
            match member.kind() {
                "property_signature" => {
                    interface.properties.push(PropertyInfo {
                        name: member
                            .child_by_field_name("name")
                            .map(|n| self.text(n).to_string())
                            .unwrap_or_default(),
                        type_name: member.child_by_field_name("type").map(|t| self.type_text(t)),
                        is_optional: has_child_kind(member, "?"),
                        is_readonly: has_child_kind(member, "readonly"),
                        description: self.doc_comment(member),
                    });
                }
                "method_signature" => {
                    let method = self.function(member, member, member, None, exported);
                    interface.methods.push(method);
                }
                _ => {}
            }
        }

        interface
    }

    fn comment(&mut self, node: Node<'_>) {
        let (comment, todos) =
            comment_with_todos(self.text(node), start_line(node), end_line(node));
        self.result.comments.push(comment);
        self.result.todos.extend(todos);
    }

    /// A `/** */` comment immediately preceding `anchor`.
    fn doc_comment(&self, anchor: Node<'_>) -> Option<String> {
        let previous = anchor.prev_named_sibling()?;
        if previous.kind() != "comment" {
            return None;
        }
        let text = self.text(previous);
        if !text.starts_with("/**") {
            return None;
        }
        if previous.end_position().row + 1 < anchor.start_position().row {
            return None;
        }
        doc_description(text)
    }

    /// Type annotation text without the leading colon.
    fn type_text(&self, node: Node<'_>) -> String {
        let text = self.text(node).trim();
        text.strip_prefix(':').unwrap_or(text).trim().to_string()
    }

    fn finish(mut self) -> AnalysisResult {
        let listed = std::mem::take(&mut self.export_clause);
        for name in listed {
            self.mark_exported(&name, false);
        }
        if let Some(name) = self.default_export.take() {
            self.mark_exported(&name, true);
        }
        self.result
    }

    /// Flag a local declaration named in an export clause.
    fn mark_exported(&mut self, name: &str, is_default: bool) {
        let result = &mut self.result;
        let kind = if let Some(f) = result.functions.iter_mut().find(|f| f.name == name) {
            f.is_exported = true;
            ExportKind::Function
        } else if let Some(c) = result.classes.iter_mut().find(|c| c.name == name) {
            c.is_exported = true;
            ExportKind::Class
        } else if let Some(i) = result.interfaces.iter_mut().find(|i| i.name == name) {
            i.is_exported = true;
            ExportKind::Interface
        } else {
            if let Some(v) = result.variables.iter_mut().find(|v| v.name == name) {
                v.is_exported = true;
            }
            return;
        };
        self.push_export(name, kind, true, is_default);
    }
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

fn is_private_member(member: Node<'_>, source: &[u8]) -> bool {
    let private_name = member
        .child_by_field_name("name")
        .is_some_and(|n| n.kind() == "private_property_identifier");
    let restricted = named_children(member).into_iter().any(|n| {
        n.kind() == "accessibility_modifier"
            && matches!(n.utf8_text(source), Ok("private") | Ok("protected"))
    });
    private_name || restricted
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn start_line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn end_line(node: Node<'_>) -> usize {
    let start = node.start_position();
    let end = node.end_position();
    if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    }
}

fn summarize(text: &str) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    if first.chars().count() > MAX_VALUE_LEN {
        let cut: String = first.chars().take(MAX_VALUE_LEN).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}
