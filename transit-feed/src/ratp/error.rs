//! Upstream API error types.

/// Errors from a single upstream request.
///
/// A fetch cycle never propagates these: each one is logged and turned into
/// "no usable fresh data" for the query that hit it.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport failure (connection refused, timeout, TLS, ...)
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    /// The body is not valid JSON or does not have the expected shape
    #[error("JSON parse error: {message}")]
    Parse {
        message: String,
        body: Option<String>,
    },

    /// The upstream answered with an error status or an error document
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The configured station slug is not part of the line
    #[error("station {station} not found on line {line}")]
    StationNotFound { station: String, line: String },
}

impl ApiError {
    /// Parse error carrying at most the first 500 characters of the body.
    pub(crate) fn parse(message: impl ToString, body: &str) -> Self {
        ApiError::Parse {
            message: message.to_string(),
            body: Some(body.chars().take(500).collect()),
        }
    }
}
