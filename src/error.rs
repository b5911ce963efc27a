//! Unified error type.

use std::borrow::Cow;

use thiserror::Error;

/// The error type returned by the pipeline's fallible operations.
///
/// Application-level outcomes (401, 404, etc.) are expressed as
/// [`Response`](crate::Response) values. This type surfaces misuse of the
/// pipeline itself and handlers that break the response contract.
#[derive(Debug, Error)]
pub enum Error {
    /// [`Pipeline::add`](crate::Pipeline::add) was called while a dispatch
    /// was running.
    #[error("middleware cannot be added while the pipeline is dispatching")]
    Locked,

    /// A middleware returned a response that cannot be sent.
    #[error("middleware `{middleware}` returned an invalid response: {violation}")]
    ContractViolation {
        middleware: Cow<'static, str>,
        violation: Violation,
    },

    /// Dispatch was attempted on a pipeline with no middleware registered.
    #[error("pipeline has no middleware to dispatch to")]
    EmptyChain,

    /// A middleware failed on its own terms. Built with [`Error::handler`].
    #[error("middleware failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps a middleware's own failure so it can be returned with `?`.
    ///
    /// Outcomes a client should see (401, 503, ...) belong in a
    /// [`Response`](crate::Response); this is for failures the caller of
    /// [`Pipeline::process`](crate::Pipeline::process) has to handle.
    pub fn handler(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Handler(err.into())
    }
}

/// The part of the response contract a [`Response`](crate::Response) broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("status code {0} is not a valid HTTP status")]
    Status(u16),

    #[error("header name {0:?} is not a valid HTTP header name")]
    HeaderName(String),

    #[error("value of header {name:?} is not a valid HTTP header value")]
    HeaderValue { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violation_names_the_middleware() {
        let err = Error::ContractViolation {
            middleware: Cow::Borrowed("auth"),
            violation: Violation::Status(42),
        };
        assert_eq!(
            err.to_string(),
            "middleware `auth` returned an invalid response: status code 42 is not a valid HTTP status",
        );
    }

    #[test]
    fn handler_error_keeps_its_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timed out");
        let err = Error::handler(io);

        assert_eq!(err.to_string(), "middleware failed: upstream timed out");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "upstream timed out");
    }
}
