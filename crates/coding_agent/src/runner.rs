//! The agent loop: send, approve and execute requested tools, continue until
//! the model stops asking for tools.

use std::io::{BufRead, Write};
use std::sync::atomic::Ordering;

use agent_provider::{CancelSignal, CompletedTurn, TokenUsage, TurnError};
use serde_json::Value;

use crate::agent::Agent;
use crate::approval::{ApprovalDecision, ApprovalPolicy};
use crate::tools::{ToolExecutor, UNKNOWN_TOOL_OUTPUT};

pub const CANCELLED_BY_USER: &str = "\nOperation cancelled by user.\n";
const DISPLAY_VALUE_MAX_CHARS: usize = 40;
const DISPLAY_VALUE_KEEP_CHARS: usize = 37;

/// Observer notified around every request to the model.
pub trait TurnHooks {
    fn turn_started(&mut self) {}
    fn turn_finished(&mut self) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTurnHooks;

impl TurnHooks for NoTurnHooks {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    /// The model finished without requesting further tools.
    Completed,
    /// The cancel signal was raised during a send or between tool calls.
    Interrupted,
    /// The user cancelled at an approval prompt or closed its input.
    Aborted,
    /// A send failed; carries the message already shown to the user.
    Failed(String),
}

/// Result of one loop invocation. `text` and `usage` cover every turn that
/// completed before the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub text: String,
    pub usage: TokenUsage,
    pub status: LoopStatus,
}

impl LoopOutcome {
    fn new() -> Self {
        Self {
            text: String::new(),
            usage: TokenUsage::default(),
            status: LoopStatus::Completed,
        }
    }

    fn absorb(&mut self, turn: &CompletedTurn) {
        self.text.push_str(&turn.text);
        self.usage += turn.usage;
    }

    fn finish(mut self, status: LoopStatus) -> Self {
        self.status = status;
        self
    }
}

/// Collaborators the loop borrows for one run. `console` receives tool
/// display lines and approval prompts; streamed model text goes to `on_text`.
pub struct AgentLoop<'a> {
    pub executor: &'a mut dyn ToolExecutor,
    pub approval: &'a mut ApprovalPolicy,
    pub prompt_input: &'a mut dyn BufRead,
    pub console: &'a mut dyn Write,
    pub hooks: &'a mut dyn TurnHooks,
    pub show_tool_output: bool,
}

impl AgentLoop<'_> {
    pub fn run(
        &mut self,
        agent: &mut Agent,
        prompt: &str,
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> LoopOutcome {
        let mut outcome = LoopOutcome::new();
        let mut next_prompt = prompt;

        loop {
            tracing::debug!(continuation = next_prompt.is_empty(), "sending turn");
            let turn = match self.send(agent, next_prompt, cancel, on_text) {
                Ok(turn) => turn,
                Err(TurnError::Cancelled) => return outcome.finish(LoopStatus::Interrupted),
                Err(TurnError::Failed(message)) => {
                    tracing::debug!(%message, "turn failed");
                    let _ = writeln!(self.console, "Error: {message}");
                    return outcome.finish(LoopStatus::Failed(message));
                }
            };
            outcome.absorb(&turn);

            if turn.tool_calls.is_empty() {
                return outcome.finish(LoopStatus::Completed);
            }

            let _ = self.console.write_all(b"\n");
            for call in &turn.tool_calls {
                if is_cancelled(cancel) {
                    return outcome.finish(LoopStatus::Interrupted);
                }

                let decision = self.approval.check(
                    &call.name,
                    &call.arguments,
                    &mut *self.prompt_input,
                    &mut *self.console,
                );
                if decision == ApprovalDecision::Cancel {
                    let _ = self.console.write_all(CANCELLED_BY_USER.as_bytes());
                    return outcome.finish(LoopStatus::Aborted);
                }

                let _ = write!(
                    self.console,
                    "{}({})",
                    call.name,
                    format_tool_arguments(&call.arguments)
                );

                if decision == ApprovalDecision::Allow {
                    let output = self.executor.execute_named(&call.name, &call.arguments);
                    if output.content == UNKNOWN_TOOL_OUTPUT {
                        tracing::warn!(tool = %call.name, "model requested an unknown tool");
                    }
                    agent.add_tool_result(&call.id, output.content.as_str());

                    if self.show_tool_output {
                        let _ = write!(self.console, "\n{}", output.content);
                    }
                    let _ = writeln!(self.console, " → +{} chars", output.content.len());
                } else {
                    tracing::debug!(tool = %call.name, "tool call denied");
                    agent.add_tool_result(
                        &call.id,
                        format!("Tool call {} was denied by user", call.name),
                    );
                    let _ = writeln!(self.console, " → denied");
                }
            }
            let _ = self.console.flush();

            if is_cancelled(cancel) {
                return outcome.finish(LoopStatus::Interrupted);
            }
            next_prompt = "";
        }
    }

    fn send(
        &mut self,
        agent: &mut Agent,
        prompt: &str,
        cancel: &CancelSignal,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<CompletedTurn, TurnError> {
        self.hooks.turn_started();
        let result = agent.send(prompt, cancel, on_text);
        self.hooks.turn_finished();
        result
    }
}

fn is_cancelled(cancel: &CancelSignal) -> bool {
    cancel.load(Ordering::Acquire)
}

/// Renders call arguments as `key="value" key=1`, abbreviating long strings
/// and eliding nested values.
#[must_use]
pub fn format_tool_arguments(arguments: &Value) -> String {
    let Some(object) = arguments.as_object() else {
        return String::new();
    };

    object
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(text) if text.chars().count() > DISPLAY_VALUE_MAX_CHARS => {
                    let kept: String = text.chars().take(DISPLAY_VALUE_KEEP_CHARS).collect();
                    format!("\"{kept}...\"")
                }
                Value::String(text) => format!("\"{text}\""),
                Value::Number(number) => number.to_string(),
                _ => "...".to_string(),
            };
            format!("{key}={rendered}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::format_tool_arguments;

    #[test]
    fn formats_strings_numbers_and_nested_values() {
        let rendered = format_tool_arguments(&json!({
            "command": "ls",
            "timeout": 5,
            "extra": {"nested": true}
        }));

        assert_eq!(rendered, "command=\"ls\" timeout=5 extra=...");
    }

    #[test]
    fn keys_render_in_the_order_the_model_sent_them() {
        let call = agent_provider::ToolCallRequest::from_raw(
            "c1",
            "write",
            r#"{"path":"b.txt","content":"x","append":1}"#,
        );

        assert_eq!(
            format_tool_arguments(&call.arguments),
            "path=\"b.txt\" content=\"x\" append=1"
        );
    }

    #[test]
    fn abbreviates_long_strings() {
        let long = "x".repeat(41);
        let rendered = format_tool_arguments(&json!({ "content": long }));

        assert_eq!(rendered, format!("content=\"{}...\"", "x".repeat(37)));

        let exact = "y".repeat(40);
        let rendered = format_tool_arguments(&json!({ "content": exact }));
        assert_eq!(rendered, format!("content=\"{exact}\""));
    }

    #[test]
    fn non_object_arguments_render_empty() {
        assert_eq!(format_tool_arguments(&json!(null)), "");
    }
}
