//! Transport-only chat-completions client primitives.
//!
//! This crate owns request building, the streamed SSE decoding pipeline, and
//! turn reconstruction for a single `/chat/completions` endpoint. It has no
//! knowledge of tools, approval, or terminal output.
//!
//! The pipeline runs leaf to root: [`SseLineSplitter`] turns arbitrary byte
//! chunks into `data:` payloads, [`decode_delta`] maps one payload to a
//! [`Delta`], and [`TurnAccumulator`] folds deltas into an [`AccumulatedTurn`].

pub mod accumulator;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use accumulator::{AccumulatedTurn, TurnAccumulator};
pub use client::{CancellationSignal, ChatApiClient};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::{decode_delta, DecodeError, Delta, ToolCallFragment};
pub use payload::ChatRequest;
pub use sse::SseLineSplitter;
pub use url::{normalize_chat_completions_url, DEFAULT_BASE_URL};
