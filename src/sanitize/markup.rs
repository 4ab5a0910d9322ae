use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

// Raw-text elements are dropped together with their content.
static RAW_TEXT_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|iframe|noscript|template)\b[^>]*>.*?</(script|style|iframe|noscript|template)\s*>")
        .expect("raw text pattern compiles")
});

static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(-->|$)").expect("comment pattern compiles"));

static TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)</?[A-Za-z][^>]*(>|$)|<[!?][^>]*(>|$)").expect("tag pattern compiles")
});

// A `<` that could still open a tag once stripping is done.
static TAG_OPENERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([/!?A-Za-z])").expect("tag opener pattern compiles"));

// Nested markup needs one pass per level; deeper input is finished by TAG_OPENERS.
const MAX_STRIP_PASSES: usize = 8;

/// Trim and strip all markup from every string leaf.
pub fn purify(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(purify_text(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(purify).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, entry)| (key, purify(entry)))
                .collect(),
        ),
        other => other,
    }
}

pub fn purify_text(text: &str) -> String {
    if !text.contains('<') {
        return text.trim().to_string();
    }
    let mut current = text.to_string();
    for _ in 0..MAX_STRIP_PASSES {
        let stripped = strip_once(&current);
        if stripped == current {
            break;
        }
        current = stripped;
    }
    TAG_OPENERS.replace_all(&current, "$1").trim().to_string()
}

fn strip_once(text: &str) -> String {
    let without_blocks = RAW_TEXT_BLOCKS.replace_all(text, "");
    let without_comments = COMMENTS.replace_all(&without_blocks, "");
    TAGS.replace_all(&without_comments, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_tags_and_keeps_text() {
        assert_eq!(purify_text("  <b>Sunny</b> flat "), "Sunny flat");
        assert_eq!(purify_text("<a href=\"x\" onclick=\"y()\">link</a>"), "link");
    }

    #[test]
    fn drops_script_bodies() {
        assert_eq!(
            purify_text("hi<script type=\"text/javascript\">alert(1)</script>there"),
            "hithere"
        );
        assert_eq!(purify_text("<STYLE>p{}</STYLE>ok"), "ok");
    }

    #[test]
    fn removes_comments_and_dangling_tags() {
        assert_eq!(purify_text("a<!-- hidden -->b"), "ab");
        assert_eq!(purify_text("text <img src=x onerror=alert(1)"), "text");
    }

    #[test]
    fn nested_tags_cannot_rebuild_markup() {
        assert_eq!(purify_text("<<b>script>alert(1)<</b>/script>"), "");
        let split = purify_text("<scr<i></i>ipt>alert(1)");
        assert!(!split.contains('<'), "markup survived: {split}");
        let deep = purify_text(&format!("{}img src=x onerror=alert(1)>", "<".repeat(20)));
        assert!(!TAG_OPENERS.is_match(&deep), "markup survived: {deep}");
    }

    #[test]
    fn leaves_comparisons_alone() {
        assert_eq!(purify_text("3 < 4 and 5 > 2"), "3 < 4 and 5 > 2");
    }

    #[test]
    fn recurses_and_skips_non_strings() {
        let out = purify(json!({"a": [" <i>x</i> ", 3], "b": {"c": "<p>y</p>"}, "d": false}));
        assert_eq!(out, json!({"a": ["x", 3], "b": {"c": "y"}, "d": false}));
    }
}
