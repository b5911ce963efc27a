//! # tsu-pipeline
//!
//! An ordered middleware pipeline. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! Middleware is registered in order and runs in that order. Each one gets
//! the request, the response built so far, and [`Next`](middleware::Next):
//! the rest of the chain. It either delegates by calling `next.run`, or
//! returns a response of its own and stops the chain there.
//!
//! What the pipeline owns:
//!
//! - **Ordering**: first registered, first invoked
//! - **The response contract**: every middleware result is checked before
//!   it travels back up the chain ([`Response::check`])
//! - **Mutation safety**: no registration while a dispatch is running
//!
//! What it leaves to you: routing, body parsing, connections. Bring your own
//! transport and hand the pipeline a [`Request`].
//!
//! ## Quick start
//!
//! ```rust
//! use tsu_pipeline::{Pipeline, Request, Response};
//! use tsu_pipeline::middleware::{from_fn, trace::Trace};
//! use http::{Method, StatusCode, Uri};
//!
//! let pipeline = Pipeline::new();
//! pipeline
//!     .add(Trace::new())?
//!     .add(from_fn(|req, res, next| {
//!         if req.header("authorization").is_none() {
//!             return Ok(Response::status(StatusCode::UNAUTHORIZED));
//!         }
//!         next.run(req, res)
//!     }))?
//!     .add(from_fn(|req, _res, _next| {
//!         Ok(Response::text(format!("hello from {}", req.path())))
//!     }))?;
//!
//! let res = pipeline.process(&Request::new(Method::GET, Uri::from_static("/me")))?;
//! assert_eq!(res.status_code(), 401);
//! # Ok::<(), tsu_pipeline::Error>(())
//! ```

mod error;
mod pipeline;
mod request;
mod response;

pub mod middleware;

pub use error::{Error, Violation};
pub use pipeline::{EmptyChain, Pipeline};
pub use request::Request;
pub use response::{ContentType, Response, ResponseBuilder};
