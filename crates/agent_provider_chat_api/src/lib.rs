//! Chat-completions-backed implementation of the shared `agent_provider` contract.
//!
//! This adapter translates provider-neutral conversation messages into the
//! `chat_api` wire shape, drives one streaming request on a reusable blocking
//! runtime, and maps the accumulated turn back into a [`CompletedTurn`].

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use agent_provider::{
    CancelSignal, CompletedTurn, Message, ProviderInitError, ProviderProfile, TokenUsage,
    ToolCallRequest, ToolDefinition, TurnError, TurnProvider, TurnRequest,
};
use chat_api::accumulator::AccumulatedTurn;
use chat_api::payload::{ChatMessage, ToolSpec, WireToolCall};
use chat_api::{ChatApiClient, ChatApiConfig, ChatApiError, ChatRequest};

/// Stable provider identifier used by `coding_agent` startup selection.
pub const CHAT_API_PROVIDER_ID: &str = "chat-api";

/// Runtime configuration for the chat-completions provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatApiProviderConfig {
    pub api_key: String,
    pub model_id: String,
    pub base_url: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl ChatApiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: model_id.into(),
            base_url: None,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn into_chat_api_config(self) -> ChatApiConfig {
        let mut config = ChatApiConfig::new(self.model_id).with_api_key(self.api_key);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.connect_timeout {
            config = config.with_connect_timeout(timeout);
        }

        config
    }
}

trait StreamClient: Send + Sync {
    fn stream_turn(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<AccumulatedTurn, ChatApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: ChatApiClient,
    runtime: tokio::runtime::Runtime,
}

impl StreamClient for DefaultStreamClient {
    fn stream_turn(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<AccumulatedTurn, ChatApiError> {
        self.runtime
            .block_on(self.client.stream_turn(request, Some(cancel), on_text))
    }
}

/// `TurnProvider` adapter backed by `chat_api` transport primitives.
pub struct ChatApiProvider {
    model_id: String,
    stream_client: Arc<dyn StreamClient>,
}

impl ChatApiProvider {
    /// Creates a provider using real chat-completions transport.
    pub fn new(config: ChatApiProviderConfig) -> Result<Self, ProviderInitError> {
        let model_id = sanitize_model_id(&config.model_id)?;
        if let Some(base_url) = config.base_url.as_deref() {
            validate_base_url(base_url)?;
        }

        let client = ChatApiClient::new(ChatApiProviderConfig {
            model_id: model_id.clone(),
            ..config
        }
        .into_chat_api_config())
        .map_err(map_init_error)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                ProviderInitError::new(format!("failed to initialize tokio runtime: {error}"))
            })?;

        Ok(Self {
            model_id,
            stream_client: Arc::new(DefaultStreamClient { client, runtime }),
        })
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(model_id: &str, stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            model_id: model_id.to_string(),
            stream_client,
        }
    }
}

impl TurnProvider for ChatApiProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: CHAT_API_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn send_turn(
        &self,
        request: &TurnRequest,
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<CompletedTurn, TurnError> {
        if cancel.load(Ordering::Acquire) {
            return Err(TurnError::Cancelled);
        }

        let chat_request = ChatRequest::new(
            self.model_id.clone(),
            request.messages.iter().map(to_chat_message).collect(),
            request.tools.iter().map(to_tool_spec).collect(),
        );

        match self.stream_client.stream_turn(&chat_request, cancel, on_text) {
            Ok(turn) => Ok(from_accumulated_turn(turn)),
            Err(ChatApiError::Cancelled) => Err(TurnError::Cancelled),
            Err(error) => {
                tracing::debug!(%error, "chat completion request failed");
                Err(TurnError::Failed(error.to_string()))
            }
        }
    }
}

fn to_chat_message(message: &Message) -> ChatMessage {
    match message {
        Message::System { content } => ChatMessage::text("system", content.clone()),
        Message::User { content } => ChatMessage::text("user", content.clone()),
        Message::Assistant {
            content,
            tool_calls,
        } => ChatMessage::assistant(
            content.clone().filter(|content| !content.is_empty()),
            tool_calls.iter().map(to_wire_tool_call).collect(),
        ),
        Message::Tool {
            tool_call_id,
            content,
        } => ChatMessage::tool_result(tool_call_id.clone(), content.clone()),
    }
}

fn to_wire_tool_call(call: &ToolCallRequest) -> WireToolCall {
    let arguments = if call.raw_arguments.is_empty() {
        "{}".to_string()
    } else {
        call.raw_arguments.clone()
    };
    WireToolCall::function(call.id.clone(), call.name.clone(), arguments)
}

fn to_tool_spec(tool: &ToolDefinition) -> ToolSpec {
    ToolSpec::function(
        tool.name.clone(),
        tool.description.clone(),
        tool.parameters.clone(),
    )
}

fn from_accumulated_turn(turn: AccumulatedTurn) -> CompletedTurn {
    CompletedTurn {
        text: turn.text,
        tool_calls: turn
            .tool_calls
            .into_iter()
            .map(|call| ToolCallRequest::from_raw(call.id, call.name, call.raw_arguments))
            .collect(),
        usage: TokenUsage::new(turn.usage.prompt_tokens, turn.usage.completion_tokens),
    }
}

fn sanitize_model_id(model_id: &str) -> Result<String, ProviderInitError> {
    let trimmed = model_id.trim();
    if trimmed.is_empty() {
        return Err(ProviderInitError::new(
            "no model configured; set ARTIFICE_MODEL or pass --model",
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_base_url(base_url: &str) -> Result<(), ProviderInitError> {
    if base_url.trim().is_empty() {
        return Ok(());
    }
    let parsed = url::Url::parse(base_url.trim())
        .map_err(|error| ProviderInitError::new(format!("invalid base URL '{base_url}': {error}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ProviderInitError::new(format!(
            "invalid base URL '{base_url}': unsupported scheme '{scheme}'"
        ))),
    }
}

fn map_init_error(error: ChatApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize chat-api provider: {error}"))
}
