//! Two-pass request sanitization.
//!
//! Pass A strips structured-query injection syntax (sentinel-prefixed keys,
//! operator keywords, braces) according to a [`SanitizeRules`] set. Pass B
//! trims every string and removes all markup. The output of [`sanitize`] is
//! what schema validation and the store layer see.

pub mod injection;
pub mod markup;
pub mod rules;

use serde_json::Value;

pub use injection::{BlockedKey, RESERVED_OPERATORS, SENTINEL};
pub use rules::{SanitizeRules, StripMode};

/// Result of running both passes over a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    /// `None` when nothing survived (an object whose every key was dropped).
    pub value: Option<Value>,
    pub blocked: Vec<BlockedKey>,
}

impl Sanitized {
    pub fn has_blocked_keys(&self) -> bool {
        !self.blocked.is_empty()
    }
}

pub fn sanitize(value: Value, rules: &SanitizeRules) -> Sanitized {
    let mut blocked = Vec::new();
    let stripped = injection::strip(value, rules, &mut blocked);
    Sanitized {
        value: stripped.map(markup::purify),
        blocked,
    }
}
