//! Blocking HTTP plumbing shared by both clients.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use tabsync_core::RemoteError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body excerpt kept in a message.
const MAX_BODY_EXCERPT: usize = 300;

pub(crate) fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("tabsync/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Turn a failed request into a [`RemoteError`].
///
/// 408, 429 and 5xx are transient, as is every transport failure (DNS,
/// connect, timeout). A `Retry-After` header given in seconds becomes the
/// retry hint.
pub(crate) fn classify(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => {
            let retry_after = response
                .header("Retry-After")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.into_string().unwrap_or_default();
            let message = error_message(&body);
            match RemoteError::from_status(status, message) {
                RemoteError::Transient {
                    status, message, ..
                } => RemoteError::Transient {
                    status,
                    message,
                    retry_after,
                },
                permanent => permanent,
            }
        }
        ureq::Error::Transport(transport) => RemoteError::transient(transport.to_string()),
    }
}

/// Pull a readable message out of an API error body.
///
/// Notion answers `{"message": ...}`, Google `{"error": {"message": ...}}`.
/// Anything else is returned as a trimmed excerpt.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = json
            .get("message")
            .or_else(|| json.pointer("/error/message"))
            .and_then(Value::as_str);
        if let Some(message) = message {
            return message.to_string();
        }
    }
    let body = body.trim();
    if body.is_empty() {
        return "empty response body".to_string();
    }
    body.chars().take(MAX_BODY_EXCERPT).collect()
}

/// Decode a JSON response body.
pub(crate) fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T, RemoteError> {
    response
        .into_json::<T>()
        .map_err(|e| RemoteError::permanent(format!("malformed response: {e}")))
}
