use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::accumulator::{AccumulatedTurn, TurnAccumulator};
use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::events::{decode_delta, Delta};
use crate::headers::build_headers;
use crate::payload::{ChatMessage, ChatRequest, ToolSpec};
use crate::sse::SseLineSplitter;
use crate::url::normalize_chat_completions_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Reusable handle for streaming chat-completions requests.
///
/// Headers and body are rebuilt for every call, so no state from a previous
/// request leaks into the next one.
#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_chat_completions_url(&self.config.base_url)
    }

    /// Build a request body for the configured model.
    pub fn request(&self, messages: Vec<ChatMessage>, tools: Vec<ToolSpec>) -> ChatRequest {
        ChatRequest::new(self.config.model.clone(), messages, tools)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ChatApiError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config) {
            let name =
                HeaderName::from_bytes(key.as_bytes()).map_err(|error| ChatApiError::InvalidHeader {
                    name: key.clone(),
                    reason: error.to_string(),
                })?;
            let value = HeaderValue::from_str(&value).map_err(|error| ChatApiError::InvalidHeader {
                name: key.clone(),
                reason: error.to_string(),
            })?;
            out.insert(name, value);
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        let headers = self.build_headers()?;
        let mut payload = request.clone();
        payload.stream = true;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(&payload))
    }

    /// Send the request and return the response once its status is known.
    ///
    /// 4xx and 5xx statuses are turned into [`ChatApiError::Status`] carrying
    /// the response body.
    pub async fn send(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ChatApiError> {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        tracing::debug!(
            endpoint = %self.normalized_endpoint(),
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion request"
        );
        let response = await_or_cancel(self.build_request(request)?.send(), cancellation).await??;
        let status = response.status();
        tracing::debug!(status = status.as_u16(), "chat completion response");

        if !(status.is_client_error() || status.is_server_error()) {
            return Ok(response);
        }

        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        Err(ChatApiError::Status {
            status,
            message: parse_error_message(status, &body),
        })
    }

    /// Stream the response, passing every decoded delta to `on_delta` in arrival order.
    pub async fn stream_with_handler<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_delta: F,
    ) -> Result<(), ChatApiError>
    where
        F: FnMut(Delta),
    {
        let response = self.send(request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut splitter = SseLineSplitter::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            let chunk = chunk?;
            for payload in splitter.feed(&chunk) {
                match decode_delta(&payload) {
                    Ok(delta) => on_delta(delta),
                    Err(error) => tracing::debug!(%error, "skipping undecodable event payload"),
                }
            }
        }

        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }
        if !splitter.is_empty_buffer() {
            tracing::debug!("stream ended with an unterminated line");
        }

        Ok(())
    }

    /// Stream one turn to completion, forwarding text fragments to `on_text` as they arrive.
    pub async fn stream_turn(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<AccumulatedTurn, ChatApiError> {
        let mut accumulator = TurnAccumulator::new();
        self.stream_with_handler(request, cancellation, |delta| {
            accumulator.apply(delta, &mut *on_text);
        })
        .await?;
        Ok(accumulator.finish())
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
