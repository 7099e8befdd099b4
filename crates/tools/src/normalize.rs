//! Conversion of raw `tools/call` payloads into content blocks.

use proto::{ContentBlock, ToolOutput};
use rmcp::model::CallToolResult;
use serde_json::Value;

/// Spellings of the error flag seen across tool servers.
const ERROR_FLAG_KEYS: [&str; 3] = ["isError", "is_error", "iserror"];

/// Normalizes a tool result payload.
///
/// An object with `content` contributes its items, an array contributes its
/// elements, and anything else becomes a single item. Typed items are parsed
/// as content blocks, `{"text": ...}` objects become text, and any other item
/// is rendered as JSON text.
pub fn normalize_tool_result(payload: Value) -> ToolOutput {
    let is_error = ERROR_FLAG_KEYS
        .iter()
        .find_map(|key| payload.get(key).and_then(Value::as_bool))
        .unwrap_or(false);

    let items = match payload {
        Value::Object(mut map) if map.contains_key("content") => match map.remove("content") {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        },
        Value::Array(items) => items,
        other => vec![other],
    };

    ToolOutput {
        content: items.into_iter().map(normalize_item).collect(),
        is_error,
    }
}

/// Normalizes a typed `tools/call` result through its wire form.
pub fn normalize_call_result(result: &CallToolResult) -> ToolOutput {
    match serde_json::to_value(result) {
        Ok(payload) => normalize_tool_result(payload),
        Err(e) => ToolOutput {
            content: vec![ContentBlock::text(format!("unreadable tool result: {e}"))],
            is_error: true,
        },
    }
}

fn normalize_item(item: Value) -> ContentBlock {
    if item.get("type").is_some_and(Value::is_string) {
        return ContentBlock::from_value(item.clone()).unwrap_or_else(|_| render(&item));
    }
    if let Some(text) = item.get("text").and_then(Value::as_str) {
        return ContentBlock::text(text);
    }
    render(&item)
}

fn render(item: &Value) -> ContentBlock {
    match item {
        Value::String(s) => ContentBlock::text(s.as_str()),
        other => ContentBlock::text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use rmcp::model::Content;
    use serde_json::json;

    use super::*;

    #[test]
    fn object_with_content_list_yields_blocks() {
        let out = normalize_tool_result(json!({
            "content": [
                {"type": "text", "text": "row 1"},
                {"type": "text", "text": "row 2"}
            ],
            "isError": false
        }));
        assert_eq!(
            out.content,
            vec![ContentBlock::text("row 1"), ContentBlock::text("row 2")]
        );
        assert!(!out.is_error);
    }

    #[test]
    fn every_error_flag_spelling_is_honored() {
        for key in ERROR_FLAG_KEYS {
            let mut payload = json!({"content": [{"type": "text", "text": "denied"}]});
            payload[key] = json!(true);
            assert!(normalize_tool_result(payload).is_error, "key {key}");
        }
    }

    #[test]
    fn bare_list_and_scalar_payloads() {
        let list = normalize_tool_result(json!(["a", 1]));
        assert_eq!(list.content, vec![ContentBlock::text("a"), ContentBlock::text("1")]);

        let scalar = normalize_tool_result(json!("plain"));
        assert_eq!(scalar.content, vec![ContentBlock::text("plain")]);

        let number = normalize_tool_result(json!(42));
        assert_eq!(number.content, vec![ContentBlock::text("42")]);
    }

    #[test]
    fn object_without_content_is_serialized() {
        let out = normalize_tool_result(json!({"rows": 3}));
        assert_eq!(out.content, vec![ContentBlock::text(r#"{"rows":3}"#)]);
    }

    #[test]
    fn text_only_object_becomes_text() {
        let out = normalize_tool_result(json!({"content": [{"text": "untyped"}]}));
        assert_eq!(out.content, vec![ContentBlock::text("untyped")]);
    }

    #[test]
    fn unknown_typed_item_is_passed_through() {
        let image = json!({"type": "image", "data": "AAAA", "mimeType": "image/png"});
        let out = normalize_tool_result(json!({"content": [image.clone()]}));
        assert_eq!(out.content, vec![ContentBlock::Other(image)]);
    }

    #[test]
    fn malformed_typed_item_falls_back_to_json_text() {
        let out = normalize_tool_result(json!({"content": [{"type": "text"}]}));
        assert_eq!(out.content, vec![ContentBlock::text(r#"{"type":"text"}"#)]);
    }

    #[test]
    fn typed_call_result_keeps_text_and_error_flag() {
        let ok = CallToolResult::success(vec![Content::text("3 rows")]);
        let out = normalize_call_result(&ok);
        assert_eq!(out.content, vec![ContentBlock::text("3 rows")]);
        assert!(!out.is_error);

        let failed = CallToolResult::error(vec![Content::text("view not found")]);
        let out = normalize_call_result(&failed);
        assert_eq!(out.content, vec![ContentBlock::text("view not found")]);
        assert!(out.is_error);
    }

    #[test]
    fn single_non_list_content_is_wrapped() {
        let out = normalize_tool_result(json!({"content": "just text"}));
        assert_eq!(out.content, vec![ContentBlock::text("just text")]);
    }
}
