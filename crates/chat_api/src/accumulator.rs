use crate::events::{Delta, ToolCallFragment, Usage};

/// Highest number of tool-call slots one turn may open. Fragments addressed
/// past it are dropped so a corrupt index cannot exhaust memory.
pub const MAX_TOOL_CALL_SLOTS: usize = 128;

/// Tool call reconstructed from every fragment addressed to one slot.
///
/// Arguments stay as the concatenated wire text; parsing belongs to the
/// provider-neutral `ToolCallRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatedToolCall {
    pub id: String,
    pub name: String,
    pub raw_arguments: String,
}

/// Finished turn produced by [`TurnAccumulator::finish`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedTurn {
    pub text: String,
    pub tool_calls: Vec<AccumulatedToolCall>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default)]
struct SlotBuffer {
    id: String,
    name: String,
    arguments: String,
}

/// Folds a turn's deltas, in arrival order, into text, tool calls and usage.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text: String,
    slots: Vec<SlotBuffer>,
    usage: Usage,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one delta. Non-empty text is passed to `live` before it is retained.
    pub fn apply(&mut self, delta: Delta, live: &mut dyn FnMut(&str)) {
        if let Some(content) = delta.content.filter(|content| !content.is_empty()) {
            live(&content);
            self.text.push_str(&content);
        }

        if let Some(fragment) = delta.tool_call {
            self.apply_fragment(fragment);
        }

        if let Some(usage) = delta.usage {
            // Later chunks may report zero; keep the last non-zero count.
            if usage.prompt_tokens != 0 {
                self.usage.prompt_tokens = usage.prompt_tokens;
            }
            if usage.completion_tokens != 0 {
                self.usage.completion_tokens = usage.completion_tokens;
            }
        }
    }

    fn apply_fragment(&mut self, fragment: ToolCallFragment) {
        if fragment.index >= MAX_TOOL_CALL_SLOTS {
            tracing::debug!(index = fragment.index, "dropping tool call fragment with out-of-range index");
            return;
        }
        if self.slots.len() <= fragment.index {
            self.slots.resize_with(fragment.index + 1, SlotBuffer::default);
        }
        let slot = &mut self.slots[fragment.index];

        if let Some(id) = fragment.id {
            slot.id.push_str(&id);
        }
        if let Some(name) = fragment.name {
            slot.name.push_str(&name);
        }
        if let Some(arguments) = fragment.arguments {
            slot.arguments.push_str(&arguments);
        }
    }

    /// Finalize every slot, in index order, into a tool call.
    pub fn finish(self) -> AccumulatedTurn {
        let tool_calls = self
            .slots
            .into_iter()
            .map(|slot| AccumulatedToolCall {
                id: slot.id,
                name: slot.name,
                raw_arguments: slot.arguments,
            })
            .collect();

        AccumulatedTurn {
            text: self.text,
            tool_calls,
            usage: self.usage,
        }
    }
}
