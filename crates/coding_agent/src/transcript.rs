use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

pub const TRANSCRIPT_DIR: [&str; 2] = [".artifice", "sessions"];

const STAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]-[hour][minute][second]-[subsecond digits:6]");

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to format transcript timestamp: {0}")]
    ClockFormat(#[source] time::error::Format),
}

/// Everything recorded about one successful invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcript<'a> {
    pub prompt: &'a str,
    pub system_prompt: Option<&'a str>,
    pub model: &'a str,
    pub provider: &'a str,
    pub text: &'a str,
}

pub trait TranscriptWriter {
    /// Persists `transcript`, returning where it was written.
    fn save(&self, transcript: &Transcript<'_>) -> Result<PathBuf, TranscriptError>;
}

/// Writes one markdown file per invocation into a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownTranscriptWriter {
    dir: PathBuf,
}

impl MarkdownTranscriptWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn in_home(home: &Path) -> Self {
        Self::new(home.join(TRANSCRIPT_DIR[0]).join(TRANSCRIPT_DIR[1]))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TranscriptWriter for MarkdownTranscriptWriter {
    fn save(&self, transcript: &Transcript<'_>) -> Result<PathBuf, TranscriptError> {
        fs::create_dir_all(&self.dir).map_err(|source| TranscriptError::Io {
            operation: "creating transcript directory",
            path: self.dir.clone(),
            source,
        })?;

        let stamp = OffsetDateTime::now_utc()
            .format(STAMP_FORMAT)
            .map_err(TranscriptError::ClockFormat)?;
        let path = self.dir.join(format!("{stamp}.md"));

        fs::write(&path, render_markdown(&stamp, transcript)).map_err(|source| {
            TranscriptError::Io {
                operation: "writing transcript",
                path: path.clone(),
                source,
            }
        })?;

        Ok(path)
    }
}

fn render_markdown(stamp: &str, transcript: &Transcript<'_>) -> String {
    format!(
        "# Session: {stamp}\n\n\
         ## Model\n\
         - **Provider**: {provider}\n\
         - **Model**: {model}\n\n\
         ## System Prompt\n{system}\n\n\
         ## User Prompt\n{prompt}\n\n\
         ## Response\n{text}\n",
        provider = transcript.provider,
        model = transcript.model,
        system = transcript.system_prompt.unwrap_or("(none)"),
        prompt = transcript.prompt,
        text = transcript.text,
    )
}
