use agent_provider::{CompletedTurn, Message, ToolCallRequest};

/// Ordered message history plus the tool calls still awaiting a result.
///
/// History only grows, except for retracting a trailing user message after a
/// failed send. Pending calls are answered by id or discarded wholesale when
/// the user speaks again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationStore {
    messages: Vec<Message>,
    pending: Vec<ToolCallRequest>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn pending(&self) -> &[ToolCallRequest] {
        &self.pending
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends a user message, abandoning any unanswered tool calls without
    /// producing results for them.
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        if !self.pending.is_empty() {
            tracing::debug!(count = self.pending.len(), "discarding pending tool calls");
            self.pending.clear();
        }
        self.messages.push(Message::user(content));
    }

    /// Records a finished assistant turn. Turns without text or tool calls
    /// leave history untouched; the pending set always becomes the turn's calls.
    pub fn record_turn(&mut self, turn: &CompletedTurn) {
        if !turn.text.is_empty() || !turn.tool_calls.is_empty() {
            let content = (!turn.text.is_empty()).then(|| turn.text.clone());
            self.messages.push(Message::Assistant {
                content,
                tool_calls: turn.tool_calls.clone(),
            });
        }
        self.pending = turn.tool_calls.clone();
    }

    /// Appends a tool result and resolves the matching pending call.
    pub fn add_tool_result(&mut self, tool_call_id: &str, content: impl Into<String>) {
        self.messages.push(Message::tool(tool_call_id, content));
        if let Some(index) = self.pending.iter().position(|call| call.id == tool_call_id) {
            self.pending.remove(index);
        }
    }

    /// Removes the last message only if it is a user message.
    pub fn retract_last_user_message(&mut self) -> bool {
        if self.messages.last().is_some_and(Message::is_user) {
            self.messages.pop();
            return true;
        }
        false
    }

    /// Builds the outgoing message list, prepending `system_prompt` unless it
    /// is empty or history already starts with a system message.
    #[must_use]
    pub fn request_messages(&self, system_prompt: Option<&str>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(prompt) = system_prompt.filter(|prompt| !prompt.is_empty()) {
            if !self.messages.first().is_some_and(Message::is_system) {
                messages.push(Message::system(prompt));
            }
        }
        messages.extend(self.messages.iter().cloned());
        messages
    }
}
