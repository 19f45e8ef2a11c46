//! Builtin tool registry and executors.
//!
//! Every executor reports failure through [`ToolOutput`] text instead of an
//! error value so the model can read the problem and retry.

use std::path::{Path, PathBuf};

use agent_provider::{CancelSignal, ToolDefinition};
use glob::Pattern;
use serde::Serialize;
use serde_json::{json, Value};

mod find;
mod fs;
mod shell;

pub use shell::{run_shell, ShellRun, ShellTermination};

pub const DEFAULT_SHELL_TIMEOUT_SEC: u64 = 30;
pub const MAX_SHELL_TIMEOUT_SEC: u64 = 300;
pub const DEFAULT_SHELL_MAX_OUTPUT_BYTES: usize = 512 * 1024;
pub const READ_MAX_FILE_BYTES: u64 = 1024 * 1024;
pub const GLOB_MAX_COLLECTED: usize = 200;
pub const GLOB_MAX_DISPLAYED: usize = 100;

pub const UNKNOWN_TOOL_OUTPUT: &str = "Tool not found or no executor";

/// Names of every builtin tool, in registry order.
pub const TOOL_NAMES: [&str; 5] = ["read", "write", "glob", "edit", "shell"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Read {
        path: String,
        offset: i64,
        limit: i64,
    },
    Write {
        path: String,
        content: String,
    },
    Glob {
        pattern: String,
        path: Option<String>,
    },
    Edit {
        path: String,
        old_string: String,
        new_string: String,
    },
    Shell {
        command: String,
        timeout_sec: u64,
    },
}

impl ToolCall {
    /// Builds a typed call from a tool name and its JSON arguments.
    ///
    /// Unknown names and missing required arguments are returned as the
    /// output the model should see for that call.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolOutput> {
        match name {
            "read" => {
                let Some(path) = string_argument(arguments, "path") else {
                    return Err(ToolOutput::fail("Error: 'path' parameter required"));
                };
                Ok(Self::Read {
                    path,
                    offset: integer_argument(arguments, "offset").unwrap_or(0),
                    limit: integer_argument(arguments, "limit").unwrap_or(0),
                })
            }
            "write" => {
                let Some(path) = string_argument(arguments, "path") else {
                    return Err(ToolOutput::fail(failure_json("'path' parameter required")));
                };
                let Some(content) = string_argument(arguments, "content") else {
                    return Err(ToolOutput::fail(failure_json(
                        "'content' parameter required",
                    )));
                };
                Ok(Self::Write { path, content })
            }
            "glob" => {
                let Some(pattern) = string_argument(arguments, "pattern") else {
                    return Err(ToolOutput::fail("Error: 'pattern' parameter required"));
                };
                Ok(Self::Glob {
                    pattern,
                    path: string_argument(arguments, "path"),
                })
            }
            "edit" => {
                let (Some(path), Some(old_string), Some(new_string)) = (
                    string_argument(arguments, "path"),
                    string_argument(arguments, "old_string"),
                    string_argument(arguments, "new_string"),
                ) else {
                    return Err(ToolOutput::fail(failure_json(
                        "path, old_string, and new_string required",
                    )));
                };
                Ok(Self::Edit {
                    path,
                    old_string,
                    new_string,
                })
            }
            "shell" => {
                let Some(command) = string_argument(arguments, "command") else {
                    return Err(ToolOutput::fail(shell::spawn_failure_json(
                        "'command' parameter required",
                    )));
                };
                let timeout_sec = integer_argument(arguments, "timeout")
                    .map(clamp_shell_timeout)
                    .unwrap_or(DEFAULT_SHELL_TIMEOUT_SEC);
                Ok(Self::Shell {
                    command,
                    timeout_sec,
                })
            }
            _ => Err(ToolOutput::fail(UNKNOWN_TOOL_OUTPUT)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Glob { .. } => "glob",
            Self::Edit { .. } => "edit",
            Self::Shell { .. } => "shell",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub ok: bool,
    pub content: String,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            ok: true,
            content: content.into(),
        }
    }

    pub fn fail(content: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: content.into(),
        }
    }
}

pub trait ToolExecutor {
    fn execute(&mut self, call: ToolCall) -> ToolOutput;

    /// Parses and runs a model-requested call by name.
    fn execute_named(&mut self, name: &str, arguments: &Value) -> ToolOutput {
        match ToolCall::parse(name, arguments) {
            Ok(call) => self.execute(call),
            Err(output) => output,
        }
    }
}

/// Runs tools against the local filesystem, resolving relative paths against
/// a base directory (the process working directory by default).
#[derive(Debug, Clone)]
pub struct BuiltinToolExecutor {
    base_dir: PathBuf,
    shell_max_output_bytes: usize,
    cancel: Option<CancelSignal>,
}

impl BuiltinToolExecutor {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, String> {
        let base_dir = base_dir.into();
        let canonical = base_dir
            .canonicalize()
            .map_err(|err| format!("Failed to resolve base directory: {err}"))?;

        if !canonical.is_dir() {
            return Err("Base directory must be a directory".to_string());
        }

        Ok(Self {
            base_dir: canonical,
            shell_max_output_bytes: DEFAULT_SHELL_MAX_OUTPUT_BYTES,
            cancel: None,
        })
    }

    pub fn from_current_dir() -> Result<Self, String> {
        let cwd = std::env::current_dir()
            .map_err(|err| format!("Failed to resolve current directory: {err}"))?;
        Self::new(cwd)
    }

    /// Lets a pending interrupt terminate a running shell command early.
    #[must_use]
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_shell_max_output_bytes(mut self, max_bytes: usize) -> Self {
        self.shell_max_output_bytes = max_bytes;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Expands `~`, canonicalizes existing paths and anchors relative ones at
    /// the base directory. Paths that do not exist yet are returned joined but
    /// unresolved.
    pub fn resolve_path(&self, input: &str) -> PathBuf {
        if let Some(rest) = input.strip_prefix('~') {
            if rest.is_empty() || rest.starts_with('/') {
                if let Some(home) = std::env::var_os("HOME") {
                    let mut expanded = home;
                    expanded.push(rest);
                    let expanded = PathBuf::from(expanded);
                    return expanded.canonicalize().unwrap_or(expanded);
                }
            }
        }

        let candidate = Path::new(input);
        let anchored = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        };

        anchored.canonicalize().unwrap_or(anchored)
    }

    /// Renders a path relative to the base directory when it lies inside it.
    pub fn display_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.base_dir) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

impl ToolExecutor for BuiltinToolExecutor {
    fn execute(&mut self, call: ToolCall) -> ToolOutput {
        tracing::debug!(tool = call.name(), "executing tool");
        match call {
            ToolCall::Read {
                path,
                offset,
                limit,
            } => fs::read(self, &path, offset, limit),
            ToolCall::Write { path, content } => fs::write(self, &path, &content),
            ToolCall::Glob { pattern, path } => find::glob(self, &pattern, path.as_deref()),
            ToolCall::Edit {
                path,
                old_string,
                new_string,
            } => fs::edit(self, &path, &old_string, &new_string),
            ToolCall::Shell {
                command,
                timeout_sec,
            } => shell::execute(
                &command,
                timeout_sec,
                self.shell_max_output_bytes,
                &self.base_dir,
                self.cancel.as_ref(),
            ),
        }
    }
}

/// Returns the model-facing definitions of the tools whose names match any of
/// `patterns`, in registry order.
#[must_use]
pub fn tool_definitions(patterns: &[String]) -> Vec<ToolDefinition> {
    let compiled: Vec<Pattern> = patterns
        .iter()
        .filter_map(|pattern| match Pattern::new(pattern) {
            Ok(compiled) => Some(compiled),
            Err(error) => {
                tracing::warn!(%pattern, %error, "ignoring invalid tool pattern");
                None
            }
        })
        .collect();

    TOOL_NAMES
        .iter()
        .filter(|name| compiled.iter().any(|pattern| pattern.matches(name)))
        .map(|name| definition_for(name))
        .collect()
}

fn definition_for(name: &str) -> ToolDefinition {
    let (description, parameters) = match name {
        "read" => (
            "Read the contents of a file.",
            json!({
                "type": "object",
                "required": ["path"],
                "properties": {
                    "path": {"type": "string", "description": "Absolute or relative file path."},
                    "offset": {"type": "integer", "description": "Line number to start reading from (0-based)."},
                    "limit": {"type": "integer", "description": "Maximum number of lines to read."}
                }
            }),
        ),
        "write" => (
            "Write or create a file with the given content.",
            json!({
                "type": "object",
                "required": ["path", "content"],
                "properties": {
                    "path": {"type": "string", "description": "Absolute or relative file path."},
                    "content": {"type": "string", "description": "Content to write to the file."}
                }
            }),
        ),
        "glob" => (
            "Search for files matching a glob pattern.",
            json!({
                "type": "object",
                "required": ["pattern"],
                "properties": {
                    "pattern": {"type": "string", "description": "Glob pattern (supports ** for recursive)."},
                    "path": {"type": "string", "description": "Directory to search in (default: current directory)."}
                }
            }),
        ),
        "edit" => (
            "Replace a unique string in a file with a new string. The old_string must appear exactly once.",
            json!({
                "type": "object",
                "required": ["path", "old_string", "new_string"],
                "properties": {
                    "path": {"type": "string", "description": "Absolute or relative file path."},
                    "old_string": {"type": "string", "description": "The exact text to find and replace. Must be unique."},
                    "new_string": {"type": "string", "description": "The replacement text."}
                }
            }),
        ),
        _ => (
            "Execute a shell command and return its output (stdout and stderr combined). Use for running tests, builds, git commands, etc.",
            json!({
                "type": "object",
                "required": ["command"],
                "properties": {
                    "command": {"type": "string", "description": "Shell command to execute."},
                    "timeout": {"type": "integer", "description": "Timeout in seconds (default: 30, max: 300)."}
                }
            }),
        ),
    };

    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

#[must_use]
pub fn clamp_shell_timeout(requested: i64) -> u64 {
    requested.clamp(1, MAX_SHELL_TIMEOUT_SEC as i64) as u64
}

fn string_argument(arguments: &Value, key: &str) -> Option<String> {
    arguments.get(key)?.as_str().map(str::to_string)
}

/// Reads an integer argument, truncating fractional numbers toward zero.
fn integer_argument(arguments: &Value, key: &str) -> Option<i64> {
    let value = arguments.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|number| number as i64))
}

#[derive(Serialize)]
struct FailureReport<'a> {
    success: bool,
    error: &'a str,
}

fn failure_json(error: &str) -> String {
    serde_json::to_string(&FailureReport {
        success: false,
        error,
    })
    .unwrap_or_default()
}

/// Counts lines the way an editor gutter does: a trailing newline does not
/// start a new line and empty text has none.
fn count_lines(text: &str) -> usize {
    text.split_terminator('\n').count()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_reports_tool_specific_missing_argument_errors() {
        let read = ToolCall::parse("read", &json!({})).expect_err("path is required");
        assert_eq!(read.content, "Error: 'path' parameter required");

        let write = ToolCall::parse("write", &json!({"path": "a"})).expect_err("content is required");
        assert_eq!(
            write.content,
            r#"{"success":false,"error":"'content' parameter required"}"#
        );

        let glob = ToolCall::parse("glob", &json!({"path": "."})).expect_err("pattern is required");
        assert_eq!(glob.content, "Error: 'pattern' parameter required");

        let edit = ToolCall::parse("edit", &json!({"path": "a", "old_string": "x"}))
            .expect_err("new_string is required");
        assert!(edit.content.contains("path, old_string, and new_string required"));

        let shell = ToolCall::parse("shell", &json!({"timeout": 3})).expect_err("command is required");
        assert!(shell.content.contains("\"exit_code\":-1"));
        assert!(shell.content.contains("'command' parameter required"));
    }

    #[test]
    fn parse_rejects_unknown_tool_names() {
        let output = ToolCall::parse("teleport", &json!({})).expect_err("unknown tool");
        assert_eq!(output.content, UNKNOWN_TOOL_OUTPUT);
    }

    #[test]
    fn shell_timeout_is_clamped_and_defaulted() {
        let call = ToolCall::parse("shell", &json!({"command": "true"})).expect("valid call");
        assert_eq!(
            call,
            ToolCall::Shell {
                command: "true".to_string(),
                timeout_sec: DEFAULT_SHELL_TIMEOUT_SEC
            }
        );

        assert_eq!(clamp_shell_timeout(0), 1);
        assert_eq!(clamp_shell_timeout(-5), 1);
        assert_eq!(clamp_shell_timeout(5000), MAX_SHELL_TIMEOUT_SEC);
        assert_eq!(clamp_shell_timeout(45), 45);
    }

    #[test]
    fn read_offsets_accept_fractional_numbers() {
        let call = ToolCall::parse("read", &json!({"path": "a", "offset": 2.9, "limit": 3}))
            .expect("valid call");
        assert_eq!(
            call,
            ToolCall::Read {
                path: "a".to_string(),
                offset: 2,
                limit: 3
            }
        );
    }

    #[test]
    fn tool_definitions_follow_enabled_patterns() {
        let all = tool_definitions(&["*".to_string()]);
        let names: Vec<&str> = all.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, TOOL_NAMES.to_vec());

        let subset = tool_definitions(&["re*".to_string(), "shell".to_string()]);
        let names: Vec<&str> = subset.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec!["read", "shell"]);

        assert!(tool_definitions(&[]).is_empty());
    }

    #[test]
    fn tool_schemas_list_required_arguments() {
        let edit = tool_definitions(&["edit".to_string()]);
        assert_eq!(
            edit[0].parameters["required"],
            json!(["path", "old_string", "new_string"])
        );
    }

    #[test]
    fn count_lines_ignores_trailing_newline() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("a"), 1);
        assert_eq!(count_lines("a\n"), 1);
        assert_eq!(count_lines("a\nb"), 2);
        assert_eq!(count_lines("a\n\nb\n"), 3);
    }
}
