//! Chain building and dispatch.
//!
//! # Locking
//!
//! The node list and the number of in-flight dispatches live behind one
//! mutex. [`Pipeline::add`] takes the mutex, refuses to proceed while any
//! dispatch is running, and appends. A dispatch takes the mutex only long
//! enough to bump the counter and clone an `Arc` to the current node list;
//! the chain itself runs without holding it, so middleware may call back into
//! the pipeline (and get [`Error::Locked`] from `add`).
//!
//! The counter is decremented by a drop guard. A dispatch that fails or
//! panics still releases the lock.
//!
//! # Reuse
//!
//! Each dispatch runs against a snapshot of the node list. Nothing is
//! consumed, so one pipeline serves any number of requests.

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, debug_span, warn};

use crate::error::Error;
use crate::middleware::{Middleware, Next, Node};
use crate::request::Request;
use crate::response::Response;

/// What [`Pipeline::process`] does when no middleware is registered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyChain {
    /// Fail with [`Error::EmptyChain`].
    #[default]
    Reject,
    /// Return the input response unchanged.
    PassThrough,
}

/// An ordered middleware pipeline.
///
/// Middleware runs in registration order: the first one added is invoked
/// first and receives everything added after it as its [`Next`].
///
/// ```rust
/// use tsu_pipeline::{Pipeline, Request, Response};
/// use tsu_pipeline::middleware::from_fn;
/// use http::{Method, Uri};
///
/// let pipeline = Pipeline::new();
/// pipeline
///     .add(from_fn(|req, res, next| {
///         let res = next.run(req, res)?;
///         Ok(res.with_header("x-outer", "1"))
///     }))?
///     .add(from_fn(|_req, _res, _next| Ok(Response::text("hello"))))?;
///
/// let req = Request::new(Method::GET, Uri::from_static("/"));
/// let res = pipeline.process(&req)?;
/// assert_eq!(res.body(), b"hello");
/// assert_eq!(res.header("x-outer"), Some("1"));
/// # Ok::<(), tsu_pipeline::Error>(())
/// ```
pub struct Pipeline {
    state: Mutex<State>,
    on_empty: EmptyChain,
}

struct State {
    chain: Arc<Vec<Node>>,
    in_flight: usize,
}

impl Pipeline {
    /// An empty pipeline that rejects dispatch until middleware is added.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State { chain: Arc::new(Vec::new()), in_flight: 0 }),
            on_empty: EmptyChain::default(),
        }
    }

    /// Sets the behaviour for dispatching with no middleware registered.
    pub fn on_empty(mut self, policy: EmptyChain) -> Self {
        self.on_empty = policy;
        self
    }

    /// Appends `middleware` to the end of the chain.
    ///
    /// Returns `self` so registrations chain with `?`.
    ///
    /// # Errors
    ///
    /// [`Error::Locked`] if a dispatch is running.
    pub fn add(&self, middleware: impl Middleware) -> Result<&Self, Error> {
        let mut state = self.state.lock();
        if state.in_flight > 0 {
            warn!(in_flight = state.in_flight, "refusing to add middleware during dispatch");
            return Err(Error::Locked);
        }

        let node = Node::new(middleware);
        debug!(index = state.chain.len(), middleware = %node.name, "middleware registered");
        Arc::make_mut(&mut state.chain).push(node);
        Ok(self)
    }

    /// Runs the chain once, starting from [`Response::default()`].
    pub fn process(&self, req: &Request) -> Result<Response, Error> {
        self.process_with(req, Response::default())
    }

    /// Runs the chain once, starting from `res`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyChain`] if nothing is registered and the pipeline was
    ///   not configured with [`EmptyChain::PassThrough`].
    /// - [`Error::ContractViolation`] if a middleware returned an invalid
    ///   response.
    /// - Whatever a middleware returned itself, e.g. [`Error::Handler`].
    pub fn process_with(&self, req: &Request, res: Response) -> Result<Response, Error> {
        let (chain, _guard) = self.begin();

        if chain.is_empty() {
            return match self.on_empty {
                EmptyChain::Reject => Err(Error::EmptyChain),
                EmptyChain::PassThrough => Ok(res),
            };
        }

        let span = debug_span!("dispatch", middleware = chain.len());
        let _enter = span.enter();
        Next::new(&chain).run(req, res)
    }

    /// Number of registered middleware.
    pub fn len(&self) -> usize {
        self.state.lock().chain.len()
    }

    /// Whether no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the registered middleware, in invocation order.
    pub fn names(&self) -> Vec<Cow<'static, str>> {
        self.state.lock().chain.iter().map(|node| node.name.clone()).collect()
    }

    /// Whether a dispatch is running right now.
    pub fn is_dispatching(&self) -> bool {
        self.state.lock().in_flight > 0
    }

    fn begin(&self) -> (Arc<Vec<Node>>, DispatchGuard<'_>) {
        let mut state = self.state.lock();
        state.in_flight += 1;
        (Arc::clone(&state.chain), DispatchGuard { state: &self.state })
    }
}

impl Default for Pipeline {
    fn default() -> Self { Self::new() }
}

/// Releases the dispatch lock when dropped.
struct DispatchGuard<'a> {
    state: &'a Mutex<State>,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().in_flight -= 1;
    }
}
