use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {}: {message}", status.as_u16())]
    Status { status: StatusCode, message: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("request was cancelled")]
    Cancelled,
}

impl ChatApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
}

/// Extract the most useful message from an error response body.
///
/// Prefers `error.message` from a JSON body, then the raw body text, then the
/// canonical reason phrase for `status`.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let explicit = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty());
    if let Some(message) = explicit {
        return message;
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
