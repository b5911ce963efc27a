//! Per-request tracing span with method, path, status and latency.
//!
//! Register it first so its span covers every middleware after it:
//!
//! ```rust
//! use tsu_pipeline::Pipeline;
//! use tsu_pipeline::middleware::trace::Trace;
//!
//! let pipeline = Pipeline::new();
//! pipeline.add(Trace::new()).unwrap();
//! ```

use std::borrow::Cow;
use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use super::{Middleware, Next};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Wraps the rest of the chain in an `info`-level `request` span.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Trace {
    /// Same as [`Trace::default()`].
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Trace {
    fn handle(&self, req: &Request, res: Response, next: Next<'_>) -> Result<Response, Error> {
        let span = info_span!("request", method = %req.method(), path = req.path());
        let _enter = span.enter();
        let started = Instant::now();

        let result = next.run(req, res);

        let latency_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        match &result {
            Ok(res) => info!(status = res.status_code(), latency_us, "request completed"),
            // The failing node already warned about the violation.
            Err(Error::ContractViolation { .. }) => debug!(latency_us, "request aborted"),
            Err(e) => warn!(latency_us, "request failed: {e}"),
        }
        result
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("trace")
    }
}
