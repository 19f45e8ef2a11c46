use serde_json::Value;
use thiserror::Error;

/// Token counts carried by a chunk's top-level `usage` object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// One partial tool-call update addressed by its position in the turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Typed view of a single streamed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_call: Option<ToolCallFragment>,
    pub usage: Option<Usage>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.tool_call.is_none() && self.usage.is_none()
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode one `data:` payload into a [`Delta`].
///
/// Only the first choice and the first tool-call entry of that choice are
/// read. Fields of the wrong type are treated as absent. A tool-call entry
/// without a non-negative integer `index` is ignored.
pub fn decode_delta(payload: &str) -> Result<Delta, DecodeError> {
    let value = serde_json::from_str::<Value>(payload)?;
    let mut delta = Delta {
        usage: value.get("usage").and_then(map_usage),
        ..Delta::default()
    };

    let Some(update) = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
    else {
        return Ok(delta);
    };

    delta.content = update
        .get("content")
        .and_then(|value| value.as_str())
        .map(ToString::to_string);
    delta.tool_call = update
        .get("tool_calls")
        .and_then(|calls| calls.get(0))
        .and_then(map_tool_call);

    Ok(delta)
}

fn map_usage(usage: &Value) -> Option<Usage> {
    if !usage.is_object() {
        return None;
    }
    let count = |key: &str| usage.get(key).and_then(|value| value.as_u64()).unwrap_or(0);
    Some(Usage {
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
    })
}

fn map_tool_call(call: &Value) -> Option<ToolCallFragment> {
    let index = call
        .get("index")
        .and_then(|value| value.as_u64())
        .and_then(|value| usize::try_from(value).ok())?;
    let function = call.get("function");
    let function_field = |key: &str| {
        function
            .and_then(|function| function.get(key))
            .and_then(|value| value.as_str())
            .map(ToString::to_string)
    };

    Some(ToolCallFragment {
        index,
        id: call
            .get("id")
            .and_then(|value| value.as_str())
            .map(ToString::to_string),
        name: function_field("name"),
        arguments: function_field("arguments"),
    })
}
