//! SOAP action resolution.
//!
//! Two sources are consulted, in order, and nothing else:
//! 1. the `SOAPAction` header, taken literally (quotes are kept);
//! 2. a `SOAPAction="..."` parameter inside `Content-Type`, matched
//!    case-insensitively.

use std::fmt;
use std::sync::LazyLock;

use axum::http::{header, HeaderMap};
use regex::Regex;

use crate::error::DispatchError;

/// Name of the SOAP 1.1 action header.
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

// Matches the literal `SOAPAction` token, not the SOAP 1.2 `action` parameter.
static CONTENT_TYPE_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)SOAPAction\s*=\s*"(.*?)""#).expect("SOAPAction pattern is valid")
});

/// Where the action was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSource {
    /// `SOAPAction` header
    Header,
    /// `SOAPAction=` parameter of `Content-Type`
    ContentType,
}

impl fmt::Display for ActionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::ContentType => f.write_str("content-type"),
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    pub action: String,
    pub source: ActionSource,
}

/// Determine the intended action from request headers.
pub fn resolve_action(headers: &HeaderMap) -> Result<ResolvedAction, DispatchError> {
    if let Some(value) = headers.get(SOAP_ACTION_HEADER) {
        if !value.is_empty() {
            return Ok(ResolvedAction {
                action: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                source: ActionSource::Header,
            });
        }
    }

    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| action_from_content_type(&String::from_utf8_lossy(value.as_bytes())))
        .map(|action| ResolvedAction {
            action,
            source: ActionSource::ContentType,
        })
        .ok_or(DispatchError::UnresolvedAction)
}

/// Extract the first `SOAPAction="..."` value from a Content-Type string.
pub fn action_from_content_type(content_type: &str) -> Option<String> {
    CONTENT_TYPE_ACTION
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
