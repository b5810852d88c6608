//! The rich-text document body: an opaque structured JSON tree.
//!
//! The tree shape is owned by the editing surface (paragraph/text
//! nodes with optional marks); this crate treats it as a whole value.
//! Writers always replace the entire tree atomically, so a stored
//! `ContentTree` is never partially written. Equality in the sync loop
//! is decided on the canonical serialized form, never on structural
//! diffing.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A fully-formed rich-text document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentTree(Value);

impl ContentTree {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The empty document: a doc node with no children.
    pub fn empty() -> Self {
        Self(json!({ "type": "doc", "content": [] }))
    }

    /// Build a document from plain text, one paragraph per line.
    pub fn from_plain_text(text: &str) -> Self {
        let paragraphs: Vec<Value> = text
            .split('\n')
            .map(|line| {
                if line.is_empty() {
                    json!({ "type": "paragraph" })
                } else {
                    json!({
                        "type": "paragraph",
                        "content": [{ "type": "text", "text": line }],
                    })
                }
            })
            .collect();
        Self(json!({ "type": "doc", "content": paragraphs }))
    }

    /// Canonical serialized form, used for change detection.
    ///
    /// `serde_json` orders object keys deterministically, so two equal
    /// trees always serialize identically.
    pub fn serialized(&self) -> String {
        self.0.to_string()
    }

    /// Concatenated text runs, with block nodes joined by newlines.
    ///
    /// Character offsets into this projection are the coordinate space
    /// for cursor positions.
    pub fn plain_text(&self) -> String {
        node_text(&self.0)
    }

    /// Number of characters in the plain-text projection.
    pub fn char_count(&self) -> usize {
        self.plain_text().chars().count()
    }

    /// True for a document with no text content.
    pub fn is_empty(&self) -> bool {
        self.char_count() == 0
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::empty()
    }
}

fn node_text(value: &Value) -> String {
    let mut out = String::new();
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        out.push_str(text);
    }
    if let Some(children) = value.get("content").and_then(Value::as_array) {
        let is_block_parent = value.get("type").and_then(Value::as_str) == Some("doc");
        let separator = if is_block_parent { "\n" } else { "" };
        let parts: Vec<String> = children.iter().map(node_text).collect();
        out.push_str(&parts.join(separator));
    }
    out
}
