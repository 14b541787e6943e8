//! Error types for the relay.
//!
//! Upstream failures never leave the relay as errors: the relay turns each
//! one into a sentinel line carrying its `Display` text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// No API key was provided at start-up.
    #[error("GEMINI_API_KEY is not set (pass --api-key or export the variable)")]
    MissingApiKey,

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Network or transport failure talking to the remote API.
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("Gemini API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The remote safety filter rejected the prompt.
    #[error("prompt blocked: {0}")]
    Blocked(String),

    /// The model stopped a response for a reason other than completion.
    #[error("generation stopped: {0}")]
    Stopped(String),

    /// The remote stream carried something we could not parse.
    #[error("malformed stream payload: {0}")]
    Decode(String),

    /// The stream broke off for any other reason.
    #[error("{0}")]
    Stream(String),
}

impl RelayError {
    /// Build an [`RelayError::Api`] from a status and a raw error body.
    ///
    /// Prefers `error.message` from the Google JSON error envelope.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.trim().to_string());
        RelayError::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_uses_envelope_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        let err = RelayError::from_status(400, body);
        assert_eq!(
            err.to_string(),
            "Gemini API returned HTTP 400: API key not valid."
        );
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        let err = RelayError::from_status(502, "bad gateway\n");
        assert_eq!(err.to_string(), "Gemini API returned HTTP 502: bad gateway");
    }
}
