//! HTTP route helpers shared by strategies that recognize routing idioms.

use lazy_static::lazy_static;
use regex::Regex;

use super::ParameterInfo;

lazy_static! {
    /// `:id`, `{id}`, `{id:[0-9]+}`, `<id>` and `<int:id>` placeholders.
    static ref PLACEHOLDER: Regex =
        Regex::new(r":([A-Za-z_]\w*)|\{([A-Za-z_]\w*)(?::[^}]*)?\}|<(?:[A-Za-z_]\w*:)?([A-Za-z_]\w*)>")
            .unwrap();
}

/// Router method names treated as HTTP verbs.
pub const HTTP_VERBS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options", "all"];

/// Map a router method name to an HTTP verb, if it is one.
pub fn http_verb(method: &str) -> Option<String> {
    let lower = method.to_ascii_lowercase();
    HTTP_VERBS
        .contains(&lower.as_str())
        .then(|| lower.to_ascii_uppercase())
}

/// Extract named placeholders from a path template, in order of appearance.
pub fn path_parameters(path: &str) -> Vec<ParameterInfo> {
    PLACEHOLDER
        .captures_iter(path)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| ParameterInfo::named(m.as_str()))
        .collect()
}

/// Strip one layer of matching quotes from a string literal.
pub fn unquote(literal: &str) -> &str {
    let literal = literal.trim();
    for quote in ['"', '\'', '`'] {
        if literal.len() >= 2 && literal.starts_with(quote) && literal.ends_with(quote) {
            return &literal[1..literal.len() - 1];
        }
    }
    literal
}
