//! One-shot command-line coding agent.
//!
//! ## Provider bootstrap
//!
//! The provider comes from `ARTIFICE_PROVIDER` or `--provider`:
//!
//! - `chat-api` (default) streams from an OpenAI-compatible
//!   `/chat/completions` endpoint. A model is required (`ARTIFICE_MODEL`,
//!   `--model`, or the settings file).
//! - `mock` answers offline from a scripted provider.
//!
//! Settings layering and the settings file shape are described in
//! [`settings`].
//!
//! ## Run contract
//!
//! One invocation sends one user message, then keeps answering the model's
//! tool calls until it replies without any. Every tool call goes through the
//! [`approval::ApprovalPolicy`] before [`tools::BuiltinToolExecutor`] runs
//! it; results are replayed to the model in request order.
//!
//! Conversation memory contract: [`conversation::ConversationStore`] owns the
//! model-facing history and replays it on every turn through
//! provider-neutral `Message` values.

pub mod agent;
pub mod approval;
pub mod cli;
pub mod conversation;
pub mod input;
pub mod prompts;
pub mod providers;
pub mod runner;
pub mod settings;
pub mod tools;
pub mod transcript;
