//! External `go-parser` helper process.
//!
//! The helper is invoked as `go-parser <path>` and prints one JSON document
//! describing the file's top-level declarations. Its output is bounded and
//! its run time is limited; any failure is reported as a [`HelperError`]
//! and the strategy degrades to manual extraction.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use super::{collapse, embedded_field_name, format_results};
use crate::analysis::comments::comment_with_todos;
use crate::analysis::{
    is_capitalized, line_count, AnalysisResult, ClassInfo, FunctionInfo, ImportInfo, InterfaceInfo,
    ParameterInfo, PropertyInfo, VariableInfo, VariableKind, NAMESPACE_SENTINEL,
};
use crate::config::{HelperConfig, GO_PARSER_BIN, GO_PARSER_ENV};

/// Largest helper output accepted, in bytes.
pub const MAX_OUTPUT_BYTES: u64 = 16 * 1024 * 1024;

const MAX_STDERR_BYTES: u64 = 64 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

lazy_static! {
    static ref RECEIVER_TYPE: Regex =
        Regex::new(r"func\s*\(\s*(?:\w+\s+)?\*?\s*([A-Za-z_]\w*)").unwrap();
}

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("failed to start helper: {0}")]
    Spawn(#[source] io::Error),

    #[error("helper exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("helper did not finish within {0:?}")]
    Timeout(Duration),

    #[error("helper output exceeds 16 MiB")]
    TooLarge,

    #[error("malformed helper output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("helper I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A discovered, runnable helper binary.
#[derive(Debug, Clone)]
pub struct GoHelper {
    program: PathBuf,
    timeout: Duration,
}

impl GoHelper {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Locate the helper: the configured path, then `DOCSCAN_GO_PARSER`,
    /// then `go-parser` on `PATH`. Only executables are accepted.
    pub fn discover(config: &HelperConfig) -> Option<Self> {
        let from_env = std::env::var_os(GO_PARSER_ENV).map(PathBuf::from);
        let candidates = config
            .go_parser
            .clone()
            .into_iter()
            .chain(from_env)
            .chain(search_path(GO_PARSER_BIN));

        candidates
            .into_iter()
            .find(|candidate| is_executable(candidate))
            .map(|program| Self::new(program, config.timeout()))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the helper on one file and decode its output.
    pub fn run(&self, path: &Path) -> Result<HelperOutput, HelperError> {
        let mut child = Command::new(&self.program)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(HelperError::Spawn)?;

        let stdout = child.stdout.take().map(|out| spawn_reader(out, MAX_OUTPUT_BYTES + 1));
        let stderr = child.stderr.take().map(|err| spawn_reader(err, MAX_STDERR_BYTES));

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // Already-exited races are fine; the kill result is irrelevant.
                let _ = child.kill();
                let _ = child.wait();
                return Err(HelperError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = join_reader(stdout)?;
        let stderr = join_reader(stderr)?;

        if !status.success() {
            return Err(HelperError::Exit {
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        if stdout.len() as u64 > MAX_OUTPUT_BYTES {
            return Err(HelperError::TooLarge);
        }

        Ok(serde_json::from_slice(&stdout)?)
    }
}

type Reader = thread::JoinHandle<io::Result<Vec<u8>>>;

/// Read up to `limit` bytes, then drain the rest so the child never blocks.
fn spawn_reader<R: Read + Send + 'static>(source: R, limit: u64) -> Reader {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let mut limited = source.take(limit);
        limited.read_to_end(&mut buf)?;
        io::copy(&mut limited.into_inner(), &mut io::sink())?;
        Ok(buf)
    })
}

fn join_reader(reader: Option<Reader>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "helper reader panicked"))?,
        None => Ok(Vec::new()),
    }
}

fn search_path(name: &str) -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(name))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Go marshals nil slices as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decoded helper output.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperOutput {
    pub package: HelperPackage,
    #[serde(deserialize_with = "null_as_empty")]
    pub imports: Vec<HelperImport>,
    #[serde(deserialize_with = "null_as_empty")]
    pub functions: Vec<HelperFunction>,
    #[serde(deserialize_with = "null_as_empty")]
    pub structs: Vec<HelperStruct>,
    #[serde(deserialize_with = "null_as_empty")]
    pub interfaces: Vec<HelperInterface>,
    #[serde(deserialize_with = "null_as_empty")]
    pub constants: Vec<HelperValue>,
    #[serde(deserialize_with = "null_as_empty")]
    pub variables: Vec<HelperValue>,
    #[serde(deserialize_with = "null_as_empty")]
    pub types: Vec<HelperType>,
    #[serde(deserialize_with = "null_as_empty")]
    pub comments: Vec<HelperComment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HelperPackage {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HelperImport {
    pub path: String,
    pub name: String,
    pub alias: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HelperParam {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperReceiver {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub is_pointer: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperFunction {
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub parameters: Vec<HelperParam>,
    #[serde(deserialize_with = "null_as_empty")]
    pub results: Vec<HelperParam>,
    pub receiver: Option<HelperReceiver>,
    pub doc: String,
    pub is_exported: bool,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub tag: String,
    pub doc: String,
    pub is_exported: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperStruct {
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub fields: Vec<HelperField>,
    pub doc: String,
    pub is_exported: bool,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HelperMethod {
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub parameters: Vec<HelperParam>,
    #[serde(deserialize_with = "null_as_empty")]
    pub results: Vec<HelperParam>,
    pub doc: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperInterface {
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub methods: Vec<HelperMethod>,
    pub doc: String,
    pub is_exported: bool,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperValue {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
    pub doc: String,
    pub is_exported: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperType {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub doc: String,
    pub is_exported: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperComment {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

fn non_empty(text: String) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn params(list: Vec<HelperParam>) -> Vec<ParameterInfo> {
    list.into_iter()
        .map(|p| ParameterInfo::typed(p.name, collapse(&p.type_name)))
        .collect()
}

/// Line lookups the helper output does not carry.
struct Lines<'a> {
    lines: Vec<&'a str>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            last: line_count(text),
        }
    }

    fn clamp(&self, line: usize) -> usize {
        line.clamp(1, self.last)
    }

    /// First line (1-based) in `from..=to` matching `re`.
    fn find(&self, re: &Regex, from: usize, to: usize) -> Option<usize> {
        let from = from.max(1);
        self.lines
            .iter()
            .enumerate()
            .skip(from - 1)
            .take_while(|(i, _)| *i < to)
            .find(|(_, line)| re.is_match(line))
            .map(|(i, _)| i + 1)
    }

    fn find_anywhere(&self, re: &Regex) -> usize {
        self.find(re, 1, self.last).unwrap_or(1)
    }

    fn line(&self, number: usize) -> &str {
        self.lines.get(number.wrapping_sub(1)).copied().unwrap_or("")
    }
}

fn line_pattern(pattern: String) -> Option<Regex> {
    Regex::new(&pattern).ok()
}

/// Translate helper output into the shared result shape.
///
/// Line numbers the helper omits (imports, values, named types, interface
/// methods) are recovered from the source text.
pub fn translate(output: HelperOutput, text: &str) -> AnalysisResult {
    let lines = Lines::new(text);
    let mut result = AnalysisResult::new("go");
    result.package = non_empty(output.package.name);

    for import in output.imports {
        let line = line_pattern(format!("\"{}\"", regex::escape(&import.path)))
            .map(|re| lines.find_anywhere(&re))
            .unwrap_or(1);
        result.imports.push(ImportInfo {
            source: import.path,
            symbols: vec![NAMESPACE_SENTINEL.to_string()],
            alias: non_empty(import.alias),
            is_default: false,
            is_namespace: true,
            line,
        });
    }

    for function in output.functions {
        let start_line = lines.clamp(function.start_line);
        let receiver = function.receiver.and_then(|r| {
            non_empty(r.type_name).or_else(|| {
                // Generic receivers are not named by the helper.
                RECEIVER_TYPE
                    .captures(lines.line(start_line))
                    .map(|c| c[1].to_string())
            })
        });
        let results = params(function.results);
        result.functions.push(FunctionInfo {
            name: function.name,
            parameters: params(function.parameters),
            return_type: format_results(&results),
            description: non_empty(function.doc),
            is_async: false,
            is_exported: function.is_exported,
            start_line,
            end_line: lines.clamp(function.end_line).max(start_line),
            receiver,
            decorators: Vec::new(),
        });
    }

    for record in output.structs {
        let start_line = lines.clamp(record.start_line);
        let properties = record
            .fields
            .into_iter()
            .map(|field| PropertyInfo {
                name: if field.name.is_empty() {
                    embedded_field_name(&field.type_name)
                } else {
                    field.name
                },
                type_name: non_empty(field.type_name),
                is_optional: false,
                is_readonly: false,
                description: non_empty(field.doc),
            })
            .collect();
        result.classes.push(ClassInfo {
            name: record.name,
            properties,
            description: non_empty(record.doc),
            is_exported: record.is_exported,
            start_line,
            end_line: lines.clamp(record.end_line).max(start_line),
            ..Default::default()
        });
    }

    for named in output.types {
        let line = line_pattern(format!(
            r"^\s*(?:type\s+)?{}\b(?:\[[^\]]*\])?\s",
            regex::escape(&named.name)
        ))
        .map(|re| lines.find_anywhere(&re))
        .unwrap_or(1);
        result.classes.push(ClassInfo {
            name: named.name,
            extends: non_empty(named.type_name),
            description: non_empty(named.doc),
            is_exported: named.is_exported,
            start_line: line,
            end_line: line,
            ..Default::default()
        });
    }
    result.classes.sort_by_key(|c| c.start_line);

    for interface in output.interfaces {
        let start_line = lines.clamp(interface.start_line);
        let end_line = lines.clamp(interface.end_line).max(start_line);
        let methods = interface
            .methods
            .into_iter()
            .map(|method| {
                let line = line_pattern(format!(r"^\s*{}\s*\(", regex::escape(&method.name)))
                    .and_then(|re| lines.find(&re, start_line, end_line))
                    .unwrap_or(start_line);
                let results = params(method.results);
                FunctionInfo {
                    is_exported: is_capitalized(&method.name),
                    name: method.name,
                    parameters: params(method.parameters),
                    return_type: format_results(&results),
                    description: non_empty(method.doc),
                    start_line: line,
                    end_line: line,
                    ..Default::default()
                }
            })
            .collect();
        result.interfaces.push(InterfaceInfo {
            name: interface.name,
            methods,
            description: non_empty(interface.doc),
            is_exported: interface.is_exported,
            start_line,
            end_line,
            ..Default::default()
        });
    }

    let values = output
        .constants
        .into_iter()
        .map(|v| (VariableKind::Const, v))
        .chain(output.variables.into_iter().map(|v| (VariableKind::Var, v)));
    for (kind, value) in values {
        let line = line_pattern(format!(
            r"^\s*(?:(?:const|var)\s+)?(?:\w+\s*,\s*)*{}\b",
            regex::escape(&value.name)
        ))
        .map(|re| lines.find_anywhere(&re))
        .unwrap_or(1);
        result.variables.push(VariableInfo {
            name: value.name,
            kind,
            type_name: non_empty(value.type_name),
            value: non_empty(value.value),
            description: non_empty(value.doc),
            is_exported: value.is_exported,
            line,
        });
    }
    result.variables.sort_by_key(|v| v.line);

    for comment in output.comments {
        let raw = if comment.text.starts_with("/*") {
            comment.text.clone()
        } else {
            format!("//{}", comment.text)
        };
        let start_line = lines.clamp(comment.start_line);
        let end_line = lines.clamp(start_line + raw.matches('\n').count());
        let (comment, todos) = comment_with_todos(&raw, start_line, end_line);
        result.comments.push(comment);
        result.todos.extend(todos);
    }

    result
}
