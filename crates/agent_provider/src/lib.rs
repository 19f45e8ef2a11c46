//! Minimal provider-agnostic contract for executing one model turn.
//!
//! This crate defines only the conversation data model and the turn-level
//! provider seam. It excludes transport details, wire payloads, and tool
//! execution, which live in `chat_api` and `coding_agent` respectively.

use std::fmt;
use std::ops::AddAssign;
use std::sync::{atomic::AtomicBool, Arc};

use serde_json::Value;

/// Shared cooperative cancellation flag for an invocation.
///
/// The flag is only ever flipped from `false` to `true` (typically by the
/// interrupt handler) and polled by the transport and the agent loop.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing/configuring a provider before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// One tool invocation requested by the model.
///
/// `raw_arguments` is kept verbatim even when it failed to parse, in which
/// case `arguments` is an empty JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub raw_arguments: String,
}

impl ToolCallRequest {
    /// Builds a request from accumulated argument text, defaulting the parsed
    /// form to `{}` when the text is not valid JSON.
    #[must_use]
    pub fn from_raw(
        id: impl Into<String>,
        name: impl Into<String>,
        raw_arguments: impl Into<String>,
    ) -> Self {
        let raw_arguments = raw_arguments.into();
        let arguments = serde_json::from_str::<Value>(&raw_arguments)
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            raw_arguments,
        }
    }
}

/// Conversation history item; each role carries only the fields it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Returns the wire role name for this message.
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

/// Generic tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Token counts reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(rhs.output_tokens);
    }
}

/// Input required to send one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// A fully reconstructed model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: TokenUsage,
}

/// Why a turn did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// The shared cancel signal was observed; carries no user-facing text.
    Cancelled,
    /// Transport or endpoint failure, already formatted for display.
    Failed(String),
}

impl TurnError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("request was cancelled"),
            Self::Failed(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for TurnError {}

/// Immutable metadata describing a turn provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for sending one turn and streaming its text.
pub trait TurnProvider {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Sends the request and blocks until the turn completes, fails, or is cancelled.
    ///
    /// Every non-empty text fragment is passed to `on_text` in arrival order
    /// before the call returns.
    fn send_turn(
        &self,
        request: &TurnRequest,
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<CompletedTurn, TurnError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Message, TokenUsage, ToolCallRequest, TurnError};

    #[test]
    fn tool_call_from_raw_parses_valid_arguments() {
        let call = ToolCallRequest::from_raw("call_1", "read", r#"{"path":"a.txt"}"#);

        assert_eq!(call.arguments, json!({"path": "a.txt"}));
        assert_eq!(call.raw_arguments, r#"{"path":"a.txt"}"#);
    }

    #[test]
    fn tool_call_from_raw_defaults_to_empty_object_and_keeps_raw_text() {
        let call = ToolCallRequest::from_raw("call_1", "read", r#"{"a":"#);

        assert_eq!(call.arguments, json!({}));
        assert_eq!(call.raw_arguments, r#"{"a":"#);
    }

    #[test]
    fn message_roles_match_wire_names() {
        assert_eq!(Message::system("s").role(), "system");
        assert_eq!(Message::user("u").role(), "user");
        assert_eq!(Message::tool("id", "r").role(), "tool");
        assert_eq!(
            Message::Assistant {
                content: None,
                tool_calls: Vec::new(),
            }
            .role(),
            "assistant"
        );
    }

    #[test]
    fn token_usage_adds_component_wise() {
        let mut total = TokenUsage::default();
        total += TokenUsage::new(10, 5);
        total += TokenUsage::new(0, 0);
        total += TokenUsage::new(20, 8);

        assert_eq!(total, TokenUsage::new(30, 13));
    }

    #[test]
    fn cancelled_is_distinguishable_from_failure() {
        assert!(TurnError::Cancelled.is_cancelled());
        assert!(!TurnError::Failed("boom".to_string()).is_cancelled());
    }
}
