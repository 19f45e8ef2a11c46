use std::sync::Arc;

use agent_provider::{
    CancelSignal, CompletedTurn, ProviderProfile, ToolDefinition, TurnError, TurnProvider,
    TurnRequest,
};

use crate::conversation::ConversationStore;

/// Conversation state bound to one provider, system prompt and tool set.
pub struct Agent {
    provider: Arc<dyn TurnProvider>,
    conversation: ConversationStore,
    system_prompt: Option<String>,
    tools: Vec<ToolDefinition>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn TurnProvider>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            provider,
            conversation: ConversationStore::new(),
            system_prompt,
            tools,
        }
    }

    #[must_use]
    pub fn profile(&self) -> ProviderProfile {
        self.provider.profile()
    }

    #[must_use]
    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Sends one turn. A non-empty `prompt` becomes a user message first; an
    /// empty one continues after tool results.
    ///
    /// On any failure, including cancellation, the user message added here is
    /// retracted so history looks as if the call never happened.
    pub fn send(
        &mut self,
        prompt: &str,
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<CompletedTurn, TurnError> {
        let added_user_message = !prompt.is_empty();
        if added_user_message {
            self.conversation.add_user_message(prompt);
        }

        let request = TurnRequest {
            messages: self
                .conversation
                .request_messages(self.system_prompt.as_deref()),
            tools: self.tools.clone(),
        };

        match self.provider.send_turn(&request, cancel, on_text) {
            Ok(turn) => {
                self.conversation.record_turn(&turn);
                Ok(turn)
            }
            Err(error) => {
                if added_user_message {
                    self.conversation.retract_last_user_message();
                }
                Err(error)
            }
        }
    }

    pub fn add_tool_result(&mut self, tool_call_id: &str, content: impl Into<String>) {
        self.conversation.add_tool_result(tool_call_id, content);
    }
}
