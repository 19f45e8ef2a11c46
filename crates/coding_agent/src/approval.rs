//! Tool approval policy.
//!
//! Checks run in a fixed order: the `auto`/`deny` modes, then the static
//! allowlist patterns, then names granted "always" earlier in this process,
//! and finally an interactive prompt.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use glob::Pattern;
use serde::Deserialize;
use serde_json::Value;

pub const APPROVAL_QUESTION: &str = "\nApprove this tool call? [Y]es [N]o [A]lways [C]ancel: ";
pub const INVALID_RESPONSE: &str = "Invalid response. Please enter Y, N, A, or C.\n";
pub const PROMPT_CLOSED: &str = "\nOperation cancelled.\n";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    #[default]
    Ask,
    Auto,
    Deny,
}

impl ApprovalMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Auto => "auto",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(Self::Ask),
            "auto" => Ok(Self::Auto),
            "deny" => Ok(Self::Deny),
            other => Err(format!(
                "invalid tool approval mode '{other}' (expected ask, auto, or deny)"
            )),
        }
    }
}

/// Outcome of checking one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Allow,
    Deny,
    /// Deny this call and abandon the remaining loop.
    Cancel,
}

#[derive(Debug, Clone, Default)]
pub struct ApprovalPolicy {
    mode: ApprovalMode,
    allowlist: Vec<Pattern>,
    always_allowed: BTreeSet<String>,
}

impl ApprovalPolicy {
    /// Creates a policy; allowlist entries that are not valid glob patterns
    /// are skipped.
    pub fn new(mode: ApprovalMode, allowlist: &[String]) -> Self {
        let allowlist = allowlist
            .iter()
            .filter_map(|pattern| match Pattern::new(pattern) {
                Ok(compiled) => Some(compiled),
                Err(error) => {
                    tracing::warn!(%pattern, %error, "ignoring invalid allowlist pattern");
                    None
                }
            })
            .collect();

        Self {
            mode,
            allowlist,
            always_allowed: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    /// Returns the decision reachable without asking, if any.
    #[must_use]
    pub fn preapproved(&self, tool_name: &str) -> Option<ApprovalDecision> {
        match self.mode {
            ApprovalMode::Auto => return Some(ApprovalDecision::Allow),
            ApprovalMode::Deny => return Some(ApprovalDecision::Deny),
            ApprovalMode::Ask => {}
        }

        let allowlisted = self
            .allowlist
            .iter()
            .any(|pattern| pattern.matches(tool_name));
        if allowlisted || self.always_allowed.contains(tool_name) {
            return Some(ApprovalDecision::Allow);
        }

        None
    }

    #[must_use]
    pub fn is_always_allowed(&self, tool_name: &str) -> bool {
        self.always_allowed.contains(tool_name)
    }

    /// Decides whether a call may run, prompting on `output` and reading the
    /// answer from `input` when no rule applies.
    pub fn check(
        &mut self,
        tool_name: &str,
        arguments: &Value,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> ApprovalDecision {
        if let Some(decision) = self.preapproved(tool_name) {
            return decision;
        }

        let _ = write!(output, "\nTool Call: {tool_name}\n");
        if !arguments.is_null() {
            let pretty =
                serde_json::to_string_pretty(arguments).unwrap_or_else(|_| arguments.to_string());
            let _ = writeln!(output, "   Arguments: {pretty}");
        }

        loop {
            let _ = output.write_all(APPROVAL_QUESTION.as_bytes());
            let _ = output.flush();

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    let _ = output.write_all(PROMPT_CLOSED.as_bytes());
                    let _ = output.flush();
                    return ApprovalDecision::Cancel;
                }
                Ok(_) => {}
            }

            let answer = line
                .trim_start()
                .chars()
                .next()
                .map(|c| c.to_ascii_lowercase());
            match answer {
                Some('y') => return ApprovalDecision::Allow,
                Some('n') => return ApprovalDecision::Deny,
                Some('a') => {
                    self.always_allowed.insert(tool_name.to_string());
                    return ApprovalDecision::Allow;
                }
                Some('c') => return ApprovalDecision::Cancel,
                _ => {
                    let _ = output.write_all(INVALID_RESPONSE.as_bytes());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;

    fn answer(policy: &mut ApprovalPolicy, name: &str, replies: &str) -> (ApprovalDecision, String) {
        let mut input = Cursor::new(replies.as_bytes().to_vec());
        let mut output = Vec::new();
        let decision = policy.check(name, &json!({"path": "a.txt"}), &mut input, &mut output);
        (decision, String::from_utf8_lossy(&output).into_owned())
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("ASK".parse::<ApprovalMode>(), Ok(ApprovalMode::Ask));
        assert_eq!(" auto ".parse::<ApprovalMode>(), Ok(ApprovalMode::Auto));
        assert_eq!("deny".parse::<ApprovalMode>(), Ok(ApprovalMode::Deny));
        assert!("sometimes".parse::<ApprovalMode>().is_err());
    }

    #[test]
    fn auto_and_deny_modes_never_prompt() {
        let mut auto = ApprovalPolicy::new(ApprovalMode::Auto, &[]);
        let (decision, transcript) = answer(&mut auto, "shell", "");
        assert_eq!(decision, ApprovalDecision::Allow);
        assert!(transcript.is_empty());

        let mut deny = ApprovalPolicy::new(ApprovalMode::Deny, &["*".to_string()]);
        let (decision, transcript) = answer(&mut deny, "read", "");
        assert_eq!(decision, ApprovalDecision::Deny);
        assert!(transcript.is_empty());
    }

    #[test]
    fn allowlist_uses_glob_semantics() {
        let policy = ApprovalPolicy::new(ApprovalMode::Ask, &["read*".to_string()]);

        assert_eq!(policy.preapproved("read"), Some(ApprovalDecision::Allow));
        assert_eq!(policy.preapproved("readdir"), Some(ApprovalDecision::Allow));
        assert_eq!(policy.preapproved("write"), None);
        assert_eq!(policy.preapproved("READ"), None);
    }

    #[test]
    fn prompt_shows_name_and_pretty_arguments() {
        let mut policy = ApprovalPolicy::default();
        let (decision, transcript) = answer(&mut policy, "read", "y\n");

        assert_eq!(decision, ApprovalDecision::Allow);
        assert!(transcript.starts_with("\nTool Call: read\n   Arguments: {\n"));
        assert!(transcript.ends_with(APPROVAL_QUESTION));
    }

    #[test]
    fn answers_are_trimmed_and_case_insensitive() {
        let mut policy = ApprovalPolicy::default();

        assert_eq!(answer(&mut policy, "read", "  Yes\n").0, ApprovalDecision::Allow);
        assert_eq!(answer(&mut policy, "read", "\tN\n").0, ApprovalDecision::Deny);
        assert_eq!(answer(&mut policy, "read", "cancel\n").0, ApprovalDecision::Cancel);
    }

    #[test]
    fn always_grants_persist_for_the_policy_lifetime() {
        let mut policy = ApprovalPolicy::default();

        let (decision, _) = answer(&mut policy, "shell", "a\n");
        assert_eq!(decision, ApprovalDecision::Allow);
        assert!(policy.is_always_allowed("shell"));

        let (decision, transcript) = answer(&mut policy, "shell", "");
        assert_eq!(decision, ApprovalDecision::Allow);
        assert!(transcript.is_empty());
        assert_eq!(policy.preapproved("read"), None);
    }

    #[test]
    fn invalid_answers_reprompt() {
        let mut policy = ApprovalPolicy::default();
        let (decision, transcript) = answer(&mut policy, "edit", "maybe\n\nn\n");

        assert_eq!(decision, ApprovalDecision::Deny);
        assert_eq!(transcript.matches(INVALID_RESPONSE).count(), 2);
        assert_eq!(transcript.matches(APPROVAL_QUESTION).count(), 3);
    }

    #[test]
    fn end_of_input_cancels() {
        let mut policy = ApprovalPolicy::default();
        let (decision, transcript) = answer(&mut policy, "edit", "");

        assert_eq!(decision, ApprovalDecision::Cancel);
        assert!(transcript.ends_with(PROMPT_CLOSED));
    }
}
