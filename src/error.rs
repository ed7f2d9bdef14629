//! Error taxonomy.
//!
//! Two families, deliberately kept apart:
//!
//! - [`ConfigError`]: raised while *registering* routes. A route that fails
//!   validation is never stored, so these can only happen during server
//!   configuration, not under traffic.
//! - [`HttpError`]: raised while *executing* a matched handler. The dispatch
//!   core does not catch these; they propagate to the server boundary which
//!   renders an error page.
//!
//! Match misses (wrong url, wrong method) are not errors at all, they are
//! ranked [`Match`](crate::Match) outcomes.

use bytes::Bytes;
use http::StatusCode;
use std::io;
use thiserror::Error;

use crate::payload::Payload;

/// A route registration was rejected.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("expected {expected} parameters in '{pattern}', handler takes {actual}")]
    ParameterCountMismatch { pattern: String, expected: usize, actual: usize },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid bindings for '{pattern}': {reason}")]
    InvalidBindings { pattern: String, reason: String },
}

impl ConfigError {
    pub fn parameter_count_mismatch(pattern: &str, expected: usize, actual: usize) -> Self {
        Self::ParameterCountMismatch { pattern: pattern.to_string(), expected, actual }
    }

    pub fn invalid_pattern<S: ToString>(pattern: &str, reason: S) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_bindings<S: ToString>(pattern: &str, reason: S) -> Self {
        Self::InvalidBindings { pattern: pattern.to_string(), reason: reason.to_string() }
    }
}

/// A matched handler failed.
#[derive(Error, Debug)]
pub enum HttpError {
    /// Raised by a handler to yield a 404 even though the route matched.
    #[error("not found")]
    NotFound,

    #[error("bad request: {reason}")]
    BadRequest { reason: String },

    #[error("payload conversion failed: {source}")]
    Payload {
        #[from]
        source: serde_json::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl HttpError {
    pub fn bad_request<S: ToString>(reason: S) -> Self {
        Self::BadRequest { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn internal<S: ToString>(reason: S) -> Self {
        Self::Internal { reason: reason.to_string() }
    }

    /// Status code rendered at the server boundary for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Payload { .. } | Self::Io { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders the generic error bodies served for non-OK outcomes.
///
/// 404/405 bodies never carry route internals. 500 bodies carry the error
/// detail only when the server runs in dev mode.
#[derive(Debug)]
pub struct ErrorPage {
    code: StatusCode,
    detail: Option<String>,
}

impl ErrorPage {
    pub fn new(code: StatusCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail<S: ToString>(mut self, detail: S) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn payload(&self) -> Payload {
        let reason = self.code.canonical_reason().unwrap_or("Error");
        let mut body = format!("<h1>{} {}</h1>", self.code.as_u16(), reason);
        if let Some(detail) = &self.detail {
            body.push_str("<pre>");
            body.push_str(detail);
            body.push_str("</pre>");
        }
        Payload::new(mime::TEXT_HTML, Bytes::from(body)).with_code(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorPage, HttpError};
    use http::StatusCode;

    #[test]
    fn error_statuses() {
        assert_eq!(HttpError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(HttpError::bad_request("nope").status(), StatusCode::BAD_REQUEST);
        assert_eq!(HttpError::internal("boom").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_page_is_generic_without_detail() {
        let payload = ErrorPage::new(StatusCode::NOT_FOUND).payload();

        assert_eq!(payload.code(), StatusCode::NOT_FOUND);
        let body = String::from_utf8(payload.data().to_vec()).unwrap();
        assert_eq!(body, "<h1>404 Not Found</h1>");
    }

    #[test]
    fn error_page_carries_detail_when_asked() {
        let payload = ErrorPage::new(StatusCode::INTERNAL_SERVER_ERROR).with_detail("stack").payload();

        let body = String::from_utf8(payload.data().to_vec()).unwrap();
        assert!(body.contains("<pre>stack</pre>"));
    }
}
