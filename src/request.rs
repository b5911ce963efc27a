//! Incoming request type.

use bytes::Bytes;
use http::{Method, Uri};

/// An incoming request travelling through the pipeline.
///
/// Middleware receives it by shared reference: the request is read-only for
/// the whole dispatch. Only the response is replaced as it moves through the
/// chain.
#[derive(Debug)]
pub struct Request {
    inner: http::Request<Bytes>,
}

impl Request {
    /// A request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        let mut inner = http::Request::new(Bytes::new());
        *inner.method_mut() = method;
        *inner.uri_mut() = uri;
        Self { inner }
    }

    pub fn method(&self) -> &Method { self.inner.method() }
    pub fn path(&self) -> &str { self.inner.uri().path() }
    pub fn body(&self) -> &[u8] { self.inner.body() }

    /// Header lookup. Returns `None` for absent or non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(inner: http::Request<Bytes>) -> Self {
        Self { inner }
    }
}
