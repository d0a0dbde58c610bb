//! Error types for SOAP dispatch.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure to turn a request body into an [`crate::Envelope`].
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("EOF: request body contains no XML element")]
    Empty,

    #[error("XML syntax error at byte {position}: {source}")]
    Syntax {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid UTF-8 at byte {position}: {source}")]
    Utf8 {
        position: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("unexpected EOF: element <{0}> is not closed")]
    Unclosed(String),

    #[error("unexpected end tag at byte {0}")]
    UnmatchedEnd(usize),

    #[error("XML nesting exceeds maximum depth {0}")]
    DepthExceeded(u32),
}

/// Terminal failures of the request pipeline.
///
/// Each kind maps to one fixed status and body. The body text is the
/// `Display` output, so the messages below are part of the wire contract.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unsupported SOAP body type")]
    UnresolvedAction,

    #[error("handler for this SOAP action is missing")]
    MissingHandler { action: String },
}

impl DispatchError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Parse(_) => StatusCode::BAD_REQUEST,
            // Not-found for a resolution miss is kept for client compatibility.
            Self::UnresolvedAction => StatusCode::NOT_FOUND,
            Self::MissingHandler { .. } => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Stable code used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::UnresolvedAction => "UNRESOLVED_ACTION",
            Self::MissingHandler { .. } => "MISSING_HANDLER",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
