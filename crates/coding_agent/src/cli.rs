use clap::Parser;

use crate::approval::ApprovalMode;
use crate::settings::{parse_tool_patterns, SettingsOverrides};

/// Simple LLM prompt tool with tool support.
#[derive(Debug, Parser)]
#[command(name = "art", version)]
pub struct Cli {
    /// Named prompt to use as the system prompt.
    #[arg(short = 'p', long = "prompt-name", value_name = "NAME")]
    pub prompt_name: Option<String>,

    /// Literal system prompt.
    #[arg(short = 's', long = "system-prompt", value_name = "TEXT")]
    pub system_prompt: Option<String>,

    /// Comma-separated tool patterns (e.g. '*').
    #[arg(long, value_name = "PATTERNS")]
    pub tools: Option<String>,

    /// ask, auto, or deny.
    #[arg(long = "tool-approval", value_name = "MODE")]
    pub tool_approval: Option<ApprovalMode>,

    /// Show tool execution output.
    #[arg(long = "tool-output")]
    pub tool_output: bool,

    /// Don't save a session transcript.
    #[arg(long = "no-session")]
    pub no_session: bool,

    /// Enable debug logging to stderr.
    #[arg(long)]
    pub logging: bool,

    /// Model identifier sent to the endpoint.
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Provider backend (chat-api or mock).
    #[arg(long, value_name = "ID")]
    pub provider: Option<String>,

    /// List available named prompts and exit.
    #[arg(long = "list-prompts")]
    pub list_prompts: bool,

    /// Prompt words; `@path` attaches a file.
    #[arg(value_name = "PROMPT")]
    pub args: Vec<String>,
}

impl Cli {
    /// Command-line values that take precedence over file and environment
    /// settings. A literal system prompt is applied by the caller since it
    /// competes with `--prompt-name`.
    #[must_use]
    pub fn settings_overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            system_prompt: None,
            tools: self.tools.as_deref().map(parse_tool_patterns),
            tool_approval: self.tool_approval,
            no_session: self.no_session,
        }
    }
}
