/// Default base URL for chat-completions requests.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const ENDPOINT_SUFFIX: &str = "/chat/completions";

/// Normalize a base URL to a chat-completions endpoint.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_BASE_URL`]
/// 2) trailing slashes are dropped
/// 3) keep `/chat/completions` unchanged
/// 4) append `/chat/completions` otherwise
pub fn normalize_chat_completions_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(ENDPOINT_SUFFIX) {
        return trimmed.to_string();
    }
    format!("{trimmed}{ENDPOINT_SUFFIX}")
}
