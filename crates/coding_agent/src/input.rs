//! Builds the first user message from positional arguments, `@file`
//! attachments and piped stdin.

use std::fs;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

const ATTACHMENT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Error: File not found: {0}")]
    FileNotFound(String),

    #[error("Error reading {name}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Positional arguments with `@file` attachments separated out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptArgs {
    pub attachments: Vec<String>,
    pub words: Vec<String>,
}

impl PromptArgs {
    /// Splits `@name` arguments from prompt words. Every attachment must name
    /// an existing regular file.
    pub fn split(args: &[String]) -> Result<Self, InputError> {
        let mut parsed = Self::default();
        for arg in args {
            match arg.strip_prefix('@') {
                Some(name) if !name.is_empty() => {
                    if !Path::new(name).is_file() {
                        return Err(InputError::FileNotFound(name.to_string()));
                    }
                    parsed.attachments.push(name.to_string());
                }
                _ => parsed.words.push(arg.clone()),
            }
        }
        Ok(parsed)
    }

    #[must_use]
    pub fn prompt(&self) -> String {
        self.words.join(" ")
    }
}

/// Reads all of `reader` as text. Unreadable or non-UTF-8 input is replaced
/// lossily.
pub fn read_piped(reader: &mut dyn Read) -> String {
    let mut bytes = Vec::new();
    if let Err(error) = reader.read_to_end(&mut bytes) {
        tracing::debug!(%error, "stdin read stopped early");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Assembles attachments, the prompt and piped input into one message.
pub fn build_user_message(
    prompt: &str,
    attachments: &[String],
    piped: Option<&str>,
) -> Result<String, InputError> {
    let mut message = String::new();

    for name in attachments {
        let bytes = fs::read(name).map_err(|source| InputError::Read {
            name: name.clone(),
            source,
        })?;
        if !message.is_empty() {
            message.push_str("\n\n");
        }
        message.push_str(&format!("--- {name} ---\n"));
        message.push_str(&String::from_utf8_lossy(&bytes));
    }
    if !message.is_empty() {
        message.push_str(ATTACHMENT_SEPARATOR);
    }

    message.push_str(prompt);

    if let Some(piped) = piped.filter(|text| !text.is_empty()) {
        if !message.is_empty() {
            message.push_str("\n\n");
        }
        message.push_str(piped);
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn split_separates_attachments_from_words() {
        let dir = tempdir().expect("temp dir");
        let file = dir.path().join("notes.txt");
        fs::write(&file, "hello").expect("write file");
        let attachment = format!("@{}", file.display());

        let parsed = PromptArgs::split(&strings(&["explain", &attachment, "@", "this"]))
            .expect("split args");

        assert_eq!(parsed.attachments, vec![file.display().to_string()]);
        assert_eq!(parsed.prompt(), "explain @ this");
    }

    #[test]
    fn split_rejects_missing_attachment() {
        let error = PromptArgs::split(&strings(&["@/definitely/not/here.txt"]))
            .expect_err("missing file");

        assert_eq!(
            error.to_string(),
            "Error: File not found: /definitely/not/here.txt"
        );
    }

    #[test]
    fn split_rejects_directory_attachment() {
        let dir = tempdir().expect("temp dir");
        let arg = format!("@{}", dir.path().display());

        assert!(matches!(
            PromptArgs::split(&[arg]),
            Err(InputError::FileNotFound(_))
        ));
    }

    #[test]
    fn message_orders_attachments_prompt_then_stdin() {
        let dir = tempdir().expect("temp dir");
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        fs::write(&first, "alpha\n").expect("write a");
        fs::write(&second, "beta").expect("write b");
        let names = vec![first.display().to_string(), second.display().to_string()];

        let message =
            build_user_message("review these", &names, Some("piped")).expect("build message");

        assert_eq!(
            message,
            format!(
                "--- {} ---\nalpha\n\n\n--- {} ---\nbeta\n\n---\n\nreview these\n\npiped",
                names[0], names[1]
            )
        );
    }

    #[test]
    fn message_without_prompt_or_input_is_empty() {
        assert_eq!(build_user_message("", &[], Some("")).expect("build"), "");
        assert_eq!(build_user_message("", &[], None).expect("build"), "");
    }

    #[test]
    fn piped_input_alone_becomes_the_message() {
        assert_eq!(
            build_user_message("", &[], Some("from stdin")).expect("build"),
            "from stdin"
        );
    }
}
