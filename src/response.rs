//! Outgoing response type and the response contract.
//!
//! A [`Response`] is kept as raw parts (a `u16` status and string headers)
//! while it moves through the pipeline, so middleware can rewrite it freely.
//! [`Response::check`] is the contract every middleware result must pass
//! before it is handed to the previous node. A response that passes the check
//! always converts into an `http::Response` via [`Response::into_http`].

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;

use crate::error::Violation;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing response.
///
/// # Shortcuts
///
/// ```rust
/// use tsu_pipeline::Response;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(http::StatusCode::NO_CONTENT);
/// ```
///
/// # Builder
///
/// ```rust
/// use tsu_pipeline::{ContentType, Response};
///
/// Response::builder()
///     .status(http::StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder()
///     .bytes(ContentType::Html, b"<p>ok</p>".to_vec());
/// ```
///
/// [`Response::default()`] is `200 OK` with no headers and an empty body. It
/// is what [`Pipeline::process`](crate::Pipeline::process) starts from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    body: Bytes,
    headers: Vec<(String, String)>,
    status: u16,
}

impl Response {
    /// `200 OK`: `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`: `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: impl Into<u16>) -> Self {
        Self { body: Bytes::new(), headers: Vec::new(), status: code.into() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK.as_u16() }
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the status code.
    pub fn with_status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    /// Appends a header. Existing headers with the same name are kept.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Verifies the response can be sent: the status is a valid HTTP status
    /// code and every header name and value is valid on the wire.
    pub fn check(&self) -> Result<(), Violation> {
        StatusCode::from_u16(self.status).map_err(|_| Violation::Status(self.status))?;
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Violation::HeaderName(name.clone()))?;
            HeaderValue::from_str(value)
                .map_err(|_| Violation::HeaderValue { name: name.clone() })?;
        }
        Ok(())
    }

    /// Converts into an `http::Response` ready for a transport.
    pub fn into_http(self) -> Result<http::Response<Full<Bytes>>, Violation> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|_| Violation::Status(self.status))?;

        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = status;

        let headers = res.headers_mut();
        for (name, value) in self.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Violation::HeaderName(name.clone()))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| Violation::HeaderValue { name })?;
            headers.append(header, value);
        }
        Ok(res)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::status(StatusCode::OK)
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(ContentType::Json, body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text, Bytes::from(body.into()))
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    fn finish(self, content_type: ContentType, body: Bytes) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.as_str().to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}
