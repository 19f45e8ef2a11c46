//! Deterministic mock implementation of the shared `agent_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and loop-level integration testing. Turns are served from a
//! script in order; once the script is exhausted the provider echoes the most
//! recent user message.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use agent_provider::{
    CancelSignal, CompletedTurn, Message, ProviderProfile, TokenUsage, ToolCallRequest,
    TurnError, TurnProvider, TurnRequest,
};
use serde_json::Value;

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// One scripted outcome for a `send_turn` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedTurn {
    /// Stream `chunks`, then complete with the given tool calls and usage.
    Reply {
        chunks: Vec<String>,
        tool_calls: Vec<ToolCallRequest>,
        usage: TokenUsage,
    },
    /// Fail without streaming anything.
    Fail(String),
    /// Stream `chunks`, then raise the cancel signal as an interrupt would.
    Interrupt { chunks: Vec<String> },
}

impl ScriptedTurn {
    /// Text-only reply.
    #[must_use]
    pub fn text<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Reply {
            chunks: chunks.into_iter().map(Into::into).collect(),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    /// Reply that requests a single tool call with JSON arguments.
    #[must_use]
    pub fn tool_call(id: &str, name: &str, arguments: Value) -> Self {
        Self::tool_calls(vec![ToolCallRequest::from_raw(id, name, arguments.to_string())])
    }

    /// Reply that requests several tool calls and streams no text.
    #[must_use]
    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Reply {
            chunks: Vec::new(),
            tool_calls,
            usage: TokenUsage::default(),
        }
    }

    /// Sets the usage reported by a `Reply`; other variants are returned unchanged.
    #[must_use]
    pub fn with_usage(self, input_tokens: u64, output_tokens: u64) -> Self {
        match self {
            Self::Reply {
                chunks, tool_calls, ..
            } => Self::Reply {
                chunks,
                tool_calls,
                usage: TokenUsage::new(input_tokens, output_tokens),
            },
            other => other,
        }
    }
}

/// Deterministic scripted provider used by `coding_agent` tests and offline runs.
#[derive(Debug)]
pub struct MockProvider {
    model_id: String,
    chunk_delay: Duration,
    script: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<TurnRequest>>,
}

impl MockProvider {
    /// Creates a mock provider that serves `script` in order.
    #[must_use]
    pub fn new(script: Vec<ScriptedTurn>) -> Self {
        Self {
            model_id: "mock".to_string(),
            chunk_delay: Duration::ZERO,
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Overrides the model identifier reported by [`TurnProvider::profile`].
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        if !model_id.trim().is_empty() {
            self.model_id = model_id.trim().to_string();
        }
        self
    }

    /// Sleeps between streamed chunks so progress output can be observed.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Every request received so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<TurnRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    /// Number of scripted turns not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        lock_unpoisoned(&self.script).len()
    }

    fn stream_chunks(
        &self,
        chunks: &[String],
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<String, TurnError> {
        let mut text = String::new();
        for chunk in chunks {
            if cancel.load(Ordering::SeqCst) {
                return Err(TurnError::Cancelled);
            }
            if chunk.is_empty() {
                continue;
            }
            on_text(chunk);
            text.push_str(chunk);
            if !self.chunk_delay.is_zero() {
                thread::sleep(self.chunk_delay);
            }
        }
        Ok(text)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Vec::new()).with_chunk_delay(Duration::from_millis(40))
    }
}

impl TurnProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn send_turn(
        &self,
        request: &TurnRequest,
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<CompletedTurn, TurnError> {
        lock_unpoisoned(&self.requests).push(request.clone());

        if cancel.load(Ordering::SeqCst) {
            return Err(TurnError::Cancelled);
        }

        let next = lock_unpoisoned(&self.script).pop_front();
        match next.unwrap_or_else(|| echo_turn(request)) {
            ScriptedTurn::Reply {
                chunks,
                tool_calls,
                usage,
            } => {
                let text = self.stream_chunks(&chunks, cancel, on_text)?;
                Ok(CompletedTurn {
                    text,
                    tool_calls,
                    usage,
                })
            }
            ScriptedTurn::Fail(message) => Err(TurnError::Failed(message)),
            ScriptedTurn::Interrupt { chunks } => {
                self.stream_chunks(&chunks, cancel, on_text)?;
                cancel.store(true, Ordering::SeqCst);
                Err(TurnError::Cancelled)
            }
        }
    }
}

fn echo_turn(request: &TurnRequest) -> ScriptedTurn {
    let last_user = request.messages.iter().rev().find_map(|message| match message {
        Message::User { content } => Some(content.as_str()),
        _ => None,
    });
    let reply = match last_user {
        Some(content) => format!("mock reply: {content}\n"),
        None => "mock reply\n".to_string(),
    };

    let mut chunks = Vec::new();
    let mut pending = String::new();
    for ch in reply.chars() {
        pending.push(ch);
        if matches!(ch, ' ' | '\n') {
            chunks.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        chunks.push(pending);
    }

    ScriptedTurn::text(chunks)
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
