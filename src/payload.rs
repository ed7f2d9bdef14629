//! Response payload and the conversion contract for handler return values.
//!
//! Handlers return anything implementing [`IntoPayload`]; the routing layer
//! converts once, right after invocation, and writes the resulting
//! [`Payload`] to the exchange. Conversion failure is a handler error
//! ([`HttpError`]), never a routing outcome.

use bytes::Bytes;
use http::StatusCode;
use mime::Mime;
use serde::Serialize;

use crate::error::HttpError;

/// An immutable response value: status code, content type and body bytes.
#[derive(Debug, Clone)]
pub struct Payload {
    code: StatusCode,
    content_type: Option<Mime>,
    data: Bytes,
}

impl Payload {
    pub fn new(content_type: Mime, data: impl Into<Bytes>) -> Self {
        Self { code: StatusCode::OK, content_type: Some(content_type), data: data.into() }
    }

    /// An empty 200 payload with no content type.
    pub fn empty() -> Self {
        Self { code: StatusCode::OK, content_type: None, data: Bytes::new() }
    }

    /// Serializes `value` as a JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HttpError> {
        let data = serde_json::to_vec(value)?;
        Ok(Self::new(mime::APPLICATION_JSON, data))
    }

    pub fn with_code(mut self, code: StatusCode) -> Self {
        self.code = code;
        self
    }

    /// Replaces the content type, keeping body and code.
    pub fn with_content_type(mut self, content_type: Mime) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Conversion from a handler return value into a [`Payload`].
///
/// Strings render as `text/html`, raw bytes as `application/octet-stream`,
/// numbers and [`serde_json::Value`] as `application/json`. `Option::None`
/// becomes an empty 404 payload; `Result::Err` propagates as a handler
/// error.
pub trait IntoPayload {
    fn into_payload(self) -> Result<Payload, HttpError>;
}

impl IntoPayload for Payload {
    fn into_payload(self) -> Result<Payload, HttpError> {
        Ok(self)
    }
}

impl IntoPayload for () {
    fn into_payload(self) -> Result<Payload, HttpError> {
        Ok(Payload::new(mime::TEXT_HTML, Bytes::new()))
    }
}

impl IntoPayload for &'static str {
    fn into_payload(self) -> Result<Payload, HttpError> {
        Ok(Payload::new(mime::TEXT_HTML, self.as_bytes()))
    }
}

impl IntoPayload for String {
    fn into_payload(self) -> Result<Payload, HttpError> {
        Ok(Payload::new(mime::TEXT_HTML, self))
    }
}

impl IntoPayload for Vec<u8> {
    fn into_payload(self) -> Result<Payload, HttpError> {
        Ok(Payload::new(mime::APPLICATION_OCTET_STREAM, self))
    }
}

impl IntoPayload for Bytes {
    fn into_payload(self) -> Result<Payload, HttpError> {
        Ok(Payload::new(mime::APPLICATION_OCTET_STREAM, self))
    }
}

impl IntoPayload for serde_json::Value {
    fn into_payload(self) -> Result<Payload, HttpError> {
        Payload::json(&self)
    }
}

macro_rules! impl_into_payload_for_number {
    ($($number:ty)*) => {
        $(
            impl IntoPayload for $number {
                fn into_payload(self) -> Result<Payload, HttpError> {
                    Payload::json(&self)
                }
            }
        )*
    };
}

impl_into_payload_for_number! { i32 i64 u32 u64 f64 }

impl<T: IntoPayload> IntoPayload for Option<T> {
    fn into_payload(self) -> Result<Payload, HttpError> {
        match self {
            Some(value) => value.into_payload(),
            None => Ok(Payload::empty().with_code(StatusCode::NOT_FOUND)),
        }
    }
}

impl<T: IntoPayload, E: Into<HttpError>> IntoPayload for Result<T, E> {
    fn into_payload(self) -> Result<Payload, HttpError> {
        match self {
            Ok(value) => value.into_payload(),
            Err(e) => Err(e.into()),
        }
    }
}
