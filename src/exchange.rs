//! The live request/response pair handed to filters and matched routes.
//!
//! An [`Exchange`] is built by the transport once per request and owns four
//! accessor objects: the immutable [`Request`], the writable [`Response`],
//! the parsed [`Cookies`] and a generic per-request [`Context`]. Resource
//! routes can have any of these injected as handler arguments (see
//! [`crate::routes::resource`]).
//!
//! Accessors take `&self` everywhere: the response and context use interior
//! mutability so that one request worker can thread a shared `&Exchange`
//! through the filter chain and the matched route. An exchange is never
//! shared between requests.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::HttpError;
use crate::payload::Payload;

/// Read-only view of the incoming request.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request path, with no query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A single header value, when present and valid utf-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Query-string parameters, empty when absent or unparseable.
    pub fn query(&self) -> HashMap<String, String> {
        let raw = self.uri.query().unwrap_or("");
        serde_urlencoded::from_str::<Vec<(String, String)>>(raw).unwrap_or_default().into_iter().collect()
    }

    pub fn content(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as utf-8 text.
    pub fn text(&self) -> Result<String, HttpError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpError::bad_request(format!("body is not utf-8: {e}")))
    }
}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Write side of the exchange.
///
/// Handlers normally just return a payload; this accessor exists for the
/// cases that need direct control over status, headers or cookies.
#[derive(Debug)]
pub struct Response {
    state: Mutex<ResponseState>,
}

impl Response {
    fn new() -> Self {
        Self { state: Mutex::new(ResponseState { status: StatusCode::OK, headers: HeaderMap::new(), body: Bytes::new() }) }
    }

    pub fn set_status(&self, status: StatusCode) {
        self.lock().status = status;
    }

    pub fn status(&self) -> StatusCode {
        self.lock().status
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.lock().headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
    }

    /// Appends a `Set-Cookie` header.
    pub fn set_cookie(&self, name: &str, value: &str) -> Result<(), HttpError> {
        let cookie = HeaderValue::from_str(&format!("{name}={value}"))
            .map_err(|e| HttpError::internal(format!("invalid cookie value: {e}")))?;
        self.lock().headers.append(SET_COOKIE, cookie);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResponseState> {
        // an exchange belongs to exactly one request worker
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Request cookies, parsed once when the exchange is built.
#[derive(Debug)]
pub struct Cookies {
    values: HashMap<String, String>,
}

impl Cookies {
    fn parse(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else { continue };
            for pair in header.split(';') {
                if let Some((name, value)) = pair.split_once('=') {
                    values.insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
        Self { values }
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Generic per-request key/value store, shared between filters and handlers.
#[derive(Debug)]
pub struct Context {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl Context {
    fn new() -> Self {
        Self { values: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        match self.values.lock() {
            Ok(guard) => guard.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    pub fn set(&self, key: &str, value: impl Into<serde_json::Value>) {
        let value = value.into();
        match self.values.lock() {
            Ok(mut guard) => {
                guard.insert(key.to_string(), value);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key.to_string(), value);
            }
        }
    }
}

/// One in-flight request/response pair.
#[derive(Debug)]
pub struct Exchange {
    request: Request,
    response: Response,
    cookies: Cookies,
    context: Context,
}

impl Exchange {
    pub fn new(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let cookies = Cookies::parse(&parts.headers);
        let request =
            Request { method: parts.method, uri: parts.uri, version: parts.version, headers: parts.headers, body };
        Self { request, response: Response::new(), cookies, context: Context::new() }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Writes a payload to the response side.
    ///
    /// The payload's status wins over a handler-set one only when it is not
    /// the plain 200 default; a content type set directly on the response
    /// accessor is never overwritten.
    pub fn write(&self, payload: &Payload) {
        let mut state = self.response.lock();
        if payload.code() != StatusCode::OK {
            state.status = payload.code();
        }
        if let Some(content_type) = payload.content_type()
            && !state.headers.contains_key(CONTENT_TYPE)
            && let Ok(value) = HeaderValue::from_str(content_type.as_ref())
        {
            state.headers.insert(CONTENT_TYPE, value);
        }
        state.body = payload.data().clone();
    }

    /// Consumes the exchange into the final wire response.
    pub fn into_response(self) -> http::Response<Bytes> {
        let state = self.response.state.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut response = http::Response::new(state.body);
        *response.status_mut() = state.status;
        *response.headers_mut() = state.headers;
        response
    }
}
