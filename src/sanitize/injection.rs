use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::rules::{SanitizeRules, StripMode};

pub const SENTINEL: char = '$';

/// Query operator keywords recognized after the sentinel in lenient mode.
pub const RESERVED_OPERATORS: &[&str] = &[
    "elemMatch", "exists", "regex", "where", "expr", "text", "type", "size", "all", "and",
    "nor", "not", "nin", "gte", "lte", "set", "unset", "push", "pull", "inc", "mod", "ne",
    "eq", "gt", "lt", "in", "or",
];

static OPERATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = RESERVED_OPERATORS.join("|");
    Regex::new(&format!(r"(?i)\$(?:{alternatives})\b")).expect("operator pattern compiles")
});

/// Record of a sentinel-prefixed key dropped from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedKey {
    pub path: String,
    pub key: String,
}

/// Strip query-injection syntax from every string leaf and drop
/// sentinel-prefixed object keys. Objects left with no keys become absent.
pub fn strip(value: Value, rules: &SanitizeRules, blocked: &mut Vec<BlockedKey>) -> Option<Value> {
    walk(value, "", "", rules, blocked)
}

fn walk(
    value: Value,
    path: &str,
    field: &str,
    rules: &SanitizeRules,
    blocked: &mut Vec<BlockedKey>,
) -> Option<Value> {
    match value {
        Value::String(text) => {
            let cleaned = strip_string(&text, rules.resolve(path, field));
            Some(Value::String(cleaned.into_owned()))
        }
        Value::Array(items) => {
            let cleaned = items
                .into_iter()
                .enumerate()
                .filter_map(|(idx, item)| {
                    let item_path = format!("{path}[{idx}]");
                    walk(item, &item_path, field, rules, blocked)
                })
                .collect();
            Some(Value::Array(cleaned))
        }
        Value::Object(entries) => {
            let mut cleaned = Map::new();
            for (key, entry) in entries {
                let entry_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                if key.starts_with(SENTINEL) {
                    log::warn!("sanitize: blocked injection key '{}' at '{}'", key, entry_path);
                    blocked.push(BlockedKey {
                        path: entry_path,
                        key,
                    });
                    continue;
                }
                if let Some(entry) = walk(entry, &entry_path, &key, rules, blocked) {
                    cleaned.insert(key, entry);
                }
            }
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        other => Some(other),
    }
}

pub fn strip_string(text: &str, mode: StripMode) -> Cow<'_, str> {
    match mode {
        StripMode::None => Cow::Borrowed(text),
        StripMode::Strict => {
            if text.contains([SENTINEL, '{', '}']) {
                Cow::Owned(text.chars().filter(|c| !matches!(c, '$' | '{' | '}')).collect())
            } else {
                Cow::Borrowed(text)
            }
        }
        StripMode::Lenient => {
            if !text.contains(SENTINEL) {
                return Cow::Borrowed(text);
            }
            let without_operators = OPERATOR_PATTERN.replace_all(text, "");
            Cow::Owned(without_operators.replace("$.", ""))
        }
    }
}
