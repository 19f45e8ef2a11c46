use chat_api::error::parse_error_message;
use chat_api::ChatApiError;
use reqwest::StatusCode;

#[test]
fn parse_error_message_prefers_json_error_message() {
    let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
    assert_eq!(
        parse_error_message(StatusCode::UNAUTHORIZED, body),
        "Incorrect API key provided"
    );
}

#[test]
fn parse_error_message_falls_back_to_raw_body() {
    assert_eq!(
        parse_error_message(StatusCode::BAD_GATEWAY, "upstream exploded\n"),
        "upstream exploded"
    );
}

#[test]
fn parse_error_message_uses_reason_phrase_for_empty_body() {
    assert_eq!(
        parse_error_message(StatusCode::TOO_MANY_REQUESTS, ""),
        "Too Many Requests"
    );
}

#[test]
fn status_error_display_includes_code_and_message() {
    let error = ChatApiError::Status {
        status: StatusCode::NOT_FOUND,
        message: "model not found".to_string(),
    };
    assert_eq!(error.to_string(), "HTTP 404: model not found");
}
