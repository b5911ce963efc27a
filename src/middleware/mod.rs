//! Middleware layer.
//!
//! Middleware intercepts the request and the response and is the right place
//! for cross-cutting concerns: structured tracing, request-id injection,
//! authentication-header inspection.
//!
//! # How the chain is run
//!
//! The pipeline stores its middleware as a plain ordered list. Running the
//! chain is a walk over that list, one stack frame per middleware that
//! decides to delegate:
//!
//! ```text
//! [auth, trace, app]                 ← registration order
//!        ↓ process(req)
//! auth.handle(req, res, Next[trace, app])
//!        ↓ next.run(req, res)
//! trace.handle(req, res, Next[app])
//!        ↓ next.run(req, res)
//! app.handle(req, res, Next[])
//!        ↓ next.run(req, res)
//! Ok(res)                            ← terminal: response returned unchanged
//! ```
//!
//! A middleware that does not call `next.run` short-circuits: nothing after
//! it runs, and its response travels back up the stack.
//!
//! [`Next::run`] takes `self`, so a middleware can delegate at most once. The
//! compiler rejects a second call.
//!
//! Every response a middleware returns is checked with
//! [`Response::check`](crate::Response::check) before it is passed back to
//! the previous middleware. A failing check aborts the dispatch with
//! [`Error::ContractViolation`].

pub mod trace;

use std::any::type_name;
use std::borrow::Cow;
use std::sync::Arc;

use tracing::warn;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

// ── Middleware trait ──────────────────────────────────────────────────────────

/// A handler participating in the pipeline.
///
/// Implement it on your own types, or wrap a closure with [`from_fn`].
///
/// ```rust
/// use std::borrow::Cow;
/// use tsu_pipeline::{Error, Request, Response};
/// use tsu_pipeline::middleware::{Middleware, Next};
///
/// struct RequireAuth;
///
/// impl Middleware for RequireAuth {
///     fn handle(&self, req: &Request, res: Response, next: Next<'_>) -> Result<Response, Error> {
///         match req.header("authorization") {
///             Some(_) => next.run(req, res),
///             None => Ok(res.with_status(http::StatusCode::UNAUTHORIZED)),
///         }
///     }
///
///     fn name(&self) -> Cow<'static, str> {
///         Cow::Borrowed("require-auth")
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    /// Handles one request. Call `next.run(req, res)` to delegate to the rest
    /// of the chain, or return a response directly to short-circuit.
    fn handle(&self, req: &Request, res: Response, next: Next<'_>) -> Result<Response, Error>;

    /// The name reported in logs and in [`Error::ContractViolation`].
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_name::<Self>())
    }
}

// ── Closure adapter ───────────────────────────────────────────────────────────

/// Wraps a closure as a [`Middleware`].
///
/// ```rust
/// use tsu_pipeline::Pipeline;
/// use tsu_pipeline::middleware::from_fn;
///
/// let pipeline = Pipeline::new();
/// pipeline
///     .add(from_fn(|req, res, next| {
///         let res = next.run(req, res)?;
///         Ok(res.with_header("x-powered-by", "tsu"))
///     }).named("powered-by"))
///     .unwrap();
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&Request, Response, Next<'_>) -> Result<Response, Error> + Send + Sync + 'static,
{
    FromFn { f, name: None }
}

/// Middleware built from a closure. Returned by [`from_fn`].
pub struct FromFn<F> {
    f: F,
    name: Option<Cow<'static, str>>,
}

impl<F> FromFn<F> {
    /// Overrides the reported name. Without it the closure's type name is used.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<F> Middleware for FromFn<F>
where
    F: Fn(&Request, Response, Next<'_>) -> Result<Response, Error> + Send + Sync + 'static,
{
    fn handle(&self, req: &Request, res: Response, next: Next<'_>) -> Result<Response, Error> {
        (self.f)(req, res, next)
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone().unwrap_or(Cow::Borrowed(type_name::<F>()))
    }
}

// ── Chain nodes ───────────────────────────────────────────────────────────────

/// One registered middleware together with the name it was registered under.
///
/// Cloning is one `Arc` increment; the pipeline clones the node list only
/// when it is extended while an old snapshot is still alive.
#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) name: Cow<'static, str>,
    middleware: Arc<dyn Middleware>,
}

impl Node {
    pub(crate) fn new(middleware: impl Middleware) -> Self {
        Self { name: middleware.name(), middleware: Arc::new(middleware) }
    }

    /// Invokes the middleware and enforces the response contract on its result.
    fn call(&self, req: &Request, res: Response, next: Next<'_>) -> Result<Response, Error> {
        let res = self.middleware.handle(req, res, next)?;
        if let Err(violation) = res.check() {
            warn!(middleware = %self.name, %violation, "middleware broke the response contract");
            return Err(Error::ContractViolation { middleware: self.name.clone(), violation });
        }
        Ok(res)
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain after the current middleware.
///
/// Consumed by [`Next::run`]. Once everything registered later has been
/// walked, running it returns the response unchanged.
pub struct Next<'a> {
    rest: &'a [Node],
}

impl<'a> Next<'a> {
    pub(crate) fn new(rest: &'a [Node]) -> Self {
        Self { rest }
    }

    /// Runs the remaining middleware and returns their final response.
    pub fn run(self, req: &Request, res: Response) -> Result<Response, Error> {
        match self.rest.split_first() {
            Some((node, rest)) => node.call(req, res, Next { rest }),
            None => Ok(res),
        }
    }

    /// How many middleware are still ahead.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}
