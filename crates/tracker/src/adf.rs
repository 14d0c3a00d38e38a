//! Atlassian Document Format flattening.
//!
//! Jira v3 returns rich-text fields as an ADF node tree. Text nodes are
//! concatenated; block nodes end with a newline so paragraphs stay apart.

use serde_json::Value;

const BLOCK_NODES: &[&str] = &[
    "paragraph",
    "heading",
    "listItem",
    "blockquote",
    "codeBlock",
    "tableRow",
    "rule",
];

/// Render a rich-text field as plain text.
///
/// Accepts a plain string, an ADF document, or null.
pub fn to_plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(_) => {
            let mut out = String::new();
            walk(value, &mut out);
            normalize(&out)
        }
        _ => String::new(),
    }
}

fn walk(node: &Value, out: &mut String) {
    let kind = node.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "text" => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        "hardBreak" => out.push('\n'),
        "mention" | "emoji" => {
            if let Some(text) = node.pointer("/attrs/text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        _ => {}
    }

    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            walk(child, out);
        }
    }

    if BLOCK_NODES.contains(&kind) && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Trim trailing whitespace per line and collapse runs of blank lines.
fn normalize(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines().map(str::trim_end) {
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}
