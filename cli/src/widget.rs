//! Terminal rendition of the chat widget: turns stream records into the
//! events the panel understands plus assistant text to print.

use merak_core::panel::WidgetEvent;
use merak_core::sse::SseRecord;
use serde_json::{Value, json};

const CLIENT_TOOL_CALL_ITEM: &str = "client_tool_call";
const TEXT_DELTA_UPDATE: &str = "assistant_message.content_part.text_delta";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Widget(WidgetEvent),
    Text(String),
}

/// Decode one record. Records the terminal has no use for yield nothing.
pub fn decode_record(record: &SseRecord) -> Option<StreamUpdate> {
    let payload: Value = match serde_json::from_str(&record.data) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(error = %err, "Skipping unparseable chat record");
            return None;
        }
    };

    match payload.get("type").and_then(Value::as_str)? {
        "thread.created" | "thread.updated" => {
            let thread_id = payload
                .pointer("/thread/id")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(StreamUpdate::Widget(WidgetEvent::ThreadChange { thread_id }))
        }
        "thread.item.updated" => {
            let update = payload.get("update")?;
            if update.get("type").and_then(Value::as_str) != Some(TEXT_DELTA_UPDATE) {
                return None;
            }
            let delta = update.get("delta").and_then(Value::as_str)?;
            Some(StreamUpdate::Text(delta.to_string()))
        }
        "thread.item.done" => {
            let item = payload.get("item")?;
            if item.get("type").and_then(Value::as_str) != Some(CLIENT_TOOL_CALL_ITEM) {
                return None;
            }
            let name = item.get("name").and_then(Value::as_str)?.to_string();
            let params = tool_arguments(item.get("arguments"));
            Some(StreamUpdate::Widget(WidgetEvent::ClientTool { name, params }))
        }
        "error" => {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            Some(StreamUpdate::Widget(WidgetEvent::Error { message }))
        }
        _ => None,
    }
}

/// Tool arguments arrive either as an object or as its JSON encoding.
fn tool_arguments(arguments: Option<&Value>) -> Value {
    match arguments {
        Some(Value::String(encoded)) => serde_json::from_str(encoded).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "Tool arguments are not valid JSON");
            json!({})
        }),
        Some(value) => value.clone(),
        None => json!({}),
    }
}

/// Request envelope for one user message, starting a thread when needed.
pub fn user_message_envelope(thread_id: Option<&str>, text: &str) -> Value {
    let input = json!({
        "content": [{"type": "input_text", "text": text}],
        "attachments": [],
        "inference_options": {}
    });
    match thread_id {
        Some(thread_id) => json!({
            "type": "threads.add_user_message",
            "params": {"thread_id": thread_id, "input": input}
        }),
        None => json!({
            "type": "threads.create",
            "params": {"input": input}
        }),
    }
}
