//! Runtime settings resolution.
//!
//! Sources, lowest to highest priority: built-in defaults, an optional JSON
//! settings file, `ARTIFICE_*` environment variables, command-line overrides.
//!
//! ```json
//! {
//!   "provider": "chat-api",
//!   "model": "gpt-4o-mini",
//!   "api_key_env": "OPENAI_API_KEY",
//!   "base_url": "https://api.openai.com/v1",
//!   "tools": ["*"],
//!   "tool_approval": "ask",
//!   "tool_allowlist": ["read", "glob"],
//!   "save_session": true,
//!   "connect_timeout_sec": 10
//! }
//! ```
//!
//! Unknown fields are rejected.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_provider_chat_api::CHAT_API_PROVIDER_ID;
use chat_api::DEFAULT_BASE_URL;
use serde::Deserialize;
use thiserror::Error;

use crate::approval::ApprovalMode;

pub const CONFIG_PATH_ENV_VAR: &str = "ARTIFICE_CONFIG_PATH";
pub const PROVIDER_ENV_VAR: &str = "ARTIFICE_PROVIDER";
pub const MODEL_ENV_VAR: &str = "ARTIFICE_MODEL";
pub const API_KEY_ENV_VAR: &str = "ARTIFICE_API_KEY";
pub const FALLBACK_API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV_VAR: &str = "ARTIFICE_BASE_URL";
pub const SYSTEM_PROMPT_ENV_VAR: &str = "ARTIFICE_SYSTEM_PROMPT";
pub const TOOL_APPROVAL_ENV_VAR: &str = "ARTIFICE_TOOL_APPROVAL";

/// Settings file consulted under `$HOME` when no explicit path is given.
pub const HOME_CONFIG_RELATIVE_PATH: [&str; 2] = [".artifice", "config.json"];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error while reading settings at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings JSON at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    InvalidApprovalMode(String),

    #[error("connect_timeout_sec must be > 0 when provided")]
    InvalidConnectTimeout,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    api_key_env: Option<String>,
    base_url: Option<String>,
    system_prompt: Option<String>,
    tools: Option<Vec<String>>,
    tool_approval: Option<ApprovalMode>,
    tool_allowlist: Option<Vec<String>>,
    save_session: Option<bool>,
    connect_timeout_sec: Option<u64>,
}

/// Values supplied on the command line; `None` leaves lower layers in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub tools: Option<Vec<String>>,
    pub tool_approval: Option<ApprovalMode>,
    pub no_session: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: String,
    pub system_prompt: Option<String>,
    /// Tool name patterns to advertise; empty disables tools.
    pub tools: Vec<String>,
    pub tool_approval: ApprovalMode,
    pub tool_allowlist: Vec<String>,
    pub connect_timeout: Option<Duration>,
    pub save_transcript: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: CHAT_API_PROVIDER_ID.to_string(),
            model: None,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            system_prompt: None,
            tools: Vec::new(),
            tool_approval: ApprovalMode::Ask,
            tool_allowlist: Vec::new(),
            connect_timeout: None,
            save_transcript: true,
        }
    }
}

impl Settings {
    /// Resolves settings from the process environment.
    pub fn from_env(overrides: &SettingsOverrides) -> Result<Self, SettingsError> {
        let lookup = |name: &str| std::env::var(name).ok();
        let config_path = lookup(CONFIG_PATH_ENV_VAR)
            .and_then(non_empty)
            .map(PathBuf::from)
            .or_else(|| {
                let home = std::env::var_os("HOME")?;
                let candidate = HOME_CONFIG_RELATIVE_PATH
                    .iter()
                    .fold(PathBuf::from(home), |path, part| path.join(part));
                candidate.is_file().then_some(candidate)
            });

        Self::resolve(config_path.as_deref(), &lookup, overrides)
    }

    /// Resolves settings from an optional file, an environment lookup and
    /// command-line overrides.
    pub fn resolve(
        config_path: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
        overrides: &SettingsOverrides,
    ) -> Result<Self, SettingsError> {
        let file = match config_path {
            Some(path) => load_settings_file(path)?,
            None => SettingsFile::default(),
        };
        let lookup = |name: &str| env(name).and_then(non_empty);

        let mut settings = Self::default();

        if let Some(provider) = file.provider.and_then(non_empty) {
            settings.provider = provider;
        }
        settings.model = file.model.and_then(non_empty);
        settings.api_key = file.api_key.and_then(non_empty).or_else(|| {
            file.api_key_env
                .as_deref()
                .and_then(|name| lookup(name))
        });
        if let Some(base_url) = file.base_url.and_then(non_empty) {
            settings.base_url = base_url;
        }
        settings.system_prompt = file.system_prompt.and_then(non_empty);
        if let Some(tools) = file.tools {
            settings.tools = tools;
        }
        if let Some(mode) = file.tool_approval {
            settings.tool_approval = mode;
        }
        settings.tool_allowlist = file.tool_allowlist.unwrap_or_default();
        if let Some(save) = file.save_session {
            settings.save_transcript = save;
        }
        settings.connect_timeout = match file.connect_timeout_sec {
            Some(0) => return Err(SettingsError::InvalidConnectTimeout),
            Some(seconds) => Some(Duration::from_secs(seconds)),
            None => None,
        };

        if let Some(provider) = lookup(PROVIDER_ENV_VAR) {
            settings.provider = provider;
        }
        if let Some(model) = lookup(MODEL_ENV_VAR) {
            settings.model = Some(model);
        }
        if let Some(api_key) = lookup(API_KEY_ENV_VAR) {
            settings.api_key = Some(api_key);
        }
        if settings.api_key.is_none() {
            settings.api_key = lookup(FALLBACK_API_KEY_ENV_VAR);
        }
        if let Some(base_url) = lookup(BASE_URL_ENV_VAR) {
            settings.base_url = base_url;
        }
        if let Some(system_prompt) = lookup(SYSTEM_PROMPT_ENV_VAR) {
            settings.system_prompt = Some(system_prompt);
        }
        if let Some(mode) = lookup(TOOL_APPROVAL_ENV_VAR) {
            settings.tool_approval = mode.parse().map_err(SettingsError::InvalidApprovalMode)?;
        }

        if let Some(provider) = overrides.provider.clone().and_then(non_empty) {
            settings.provider = provider;
        }
        if let Some(model) = overrides.model.clone().and_then(non_empty) {
            settings.model = Some(model);
        }
        if let Some(system_prompt) = overrides.system_prompt.clone() {
            settings.system_prompt = non_empty(system_prompt);
        }
        if let Some(tools) = overrides.tools.clone() {
            settings.tools = tools;
        }
        if let Some(mode) = overrides.tool_approval {
            settings.tool_approval = mode;
        }
        if overrides.no_session {
            settings.save_transcript = false;
        }

        Ok(settings)
    }
}

/// Splits a comma-separated pattern list, trimming spaces and dropping empty
/// entries.
#[must_use]
pub fn parse_tool_patterns(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(str::to_string)
        .collect()
}

fn load_settings_file(path: &Path) -> Result<SettingsFile, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let settings =
            Settings::resolve(None, &env_from(&[]), &SettingsOverrides::default()).expect("resolve");

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.base_url, "https://api.openai.com/v1");
        assert_eq!(settings.tool_approval, ApprovalMode::Ask);
    }

    #[test]
    fn layers_apply_in_priority_order() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"model":"file-model","tool_approval":"deny","tools":["read"],"save_session":false}"#,
        )
        .expect("write settings");

        let env = env_from(&[(MODEL_ENV_VAR, "env-model"), (TOOL_APPROVAL_ENV_VAR, "auto")]);
        let overrides = SettingsOverrides {
            model: Some("cli-model".to_string()),
            ..SettingsOverrides::default()
        };

        let settings = Settings::resolve(Some(&path), &env, &overrides).expect("resolve");

        assert_eq!(settings.model.as_deref(), Some("cli-model"));
        assert_eq!(settings.tool_approval, ApprovalMode::Auto);
        assert_eq!(settings.tools, vec!["read".to_string()]);
        assert!(!settings.save_transcript);
    }

    #[test]
    fn api_key_falls_back_through_named_env_and_openai_key() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_key_env":"MY_KEY"}"#).expect("write settings");

        let named = Settings::resolve(
            Some(&path),
            &env_from(&[("MY_KEY", "named"), (FALLBACK_API_KEY_ENV_VAR, "fallback")]),
            &SettingsOverrides::default(),
        )
        .expect("resolve");
        assert_eq!(named.api_key.as_deref(), Some("named"));

        let fallback = Settings::resolve(
            None,
            &env_from(&[(FALLBACK_API_KEY_ENV_VAR, "fallback")]),
            &SettingsOverrides::default(),
        )
        .expect("resolve");
        assert_eq!(fallback.api_key.as_deref(), Some("fallback"));

        let explicit = Settings::resolve(
            None,
            &env_from(&[(API_KEY_ENV_VAR, "explicit"), (FALLBACK_API_KEY_ENV_VAR, "fallback")]),
            &SettingsOverrides::default(),
        )
        .expect("resolve");
        assert_eq!(explicit.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"model":"m","agents":{}}"#).expect("write settings");

        let error = Settings::resolve(Some(&path), &env_from(&[]), &SettingsOverrides::default())
            .expect_err("unknown field should fail");
        assert!(matches!(error, SettingsError::Parse { .. }));
    }

    #[test]
    fn invalid_env_approval_mode_is_an_error() {
        let error = Settings::resolve(
            None,
            &env_from(&[(TOOL_APPROVAL_ENV_VAR, "sometimes")]),
            &SettingsOverrides::default(),
        )
        .expect_err("invalid mode should fail");
        assert!(error.to_string().contains("sometimes"));
    }

    #[test]
    fn no_session_override_disables_transcripts() {
        let overrides = SettingsOverrides {
            no_session: true,
            ..SettingsOverrides::default()
        };
        let settings = Settings::resolve(None, &env_from(&[]), &overrides).expect("resolve");
        assert!(!settings.save_transcript);
    }

    #[test]
    fn tool_patterns_are_split_and_trimmed() {
        assert_eq!(
            parse_tool_patterns(" read , glob,,shell* "),
            vec!["read".to_string(), "glob".to_string(), "shell*".to_string()]
        );
        assert!(parse_tool_patterns("").is_empty());
    }
}
