//! Rendering of stored plugin payloads for human review.
//!
//! A payload is a JSON list of `{"type": ..., "output": {...}}` items. Each
//! item is rendered by an `OutputRenderer` and the pieces are concatenated.

use serde::Deserialize;
use serde_json::Value;

/// Turns one payload item into display text.
pub trait OutputRenderer {
    fn render(&self, item_type: &str, output: &Value) -> String;
}

/// Renders items as `"[type] {json}"` lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRenderer;

impl OutputRenderer for PlainRenderer {
    fn render(&self, item_type: &str, output: &Value) -> String {
        format!("[{}] {}\n", item_type, output)
    }
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    output: Value,
}

/// Renders a stored payload. Payloads that are not an item list render as
/// an empty string.
pub fn render_output(renderer: &dyn OutputRenderer, stored: &str) -> String {
    match serde_json::from_str::<Vec<OutputItem>>(stored) {
        Ok(items) => items
            .iter()
            .map(|item| renderer.render(&item.item_type, &item.output))
            .collect(),
        Err(e) => {
            log::warn!("Stored plugin output is not an item list: {}", e);
            String::new()
        }
    }
}
