//! Minimal tsu-pipeline demo: tracing, request ids, auth and an app handler.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic

use std::sync::atomic::{AtomicU64, Ordering};

use http::{Method, StatusCode, Uri};
use tsu_pipeline::middleware::{from_fn, trace::Trace};
use tsu_pipeline::{Error, Pipeline, Request, Response};

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let ids = AtomicU64::new(1);

    let pipeline = Pipeline::new();
    pipeline
        .add(Trace::new())?
        // Stamp every response, including short-circuited ones.
        .add(from_fn(move |req, res, next| {
            let id = ids.fetch_add(1, Ordering::Relaxed);
            let res = next.run(req, res)?;
            Ok(res.with_header("x-request-id", id.to_string()))
        }).named("request-id"))?
        .add(from_fn(|req, res, next| {
            match req.header("authorization") {
                Some(_) => next.run(req, res),
                None => Ok(Response::status(StatusCode::UNAUTHORIZED)),
            }
        }).named("auth"))?
        .add(from_fn(|req, _res, _next| {
            Ok(Response::json(format!(r#"{{"path":"{}"}}"#, req.path())))
        }).named("app"))?;

    println!("chain: {:?}", pipeline.names());

    let anonymous = Request::new(Method::GET, Uri::from_static("/users/42"));
    report(&pipeline.process(&anonymous)?);

    let signed_in = Request::from(
        http::Request::get("/users/42")
            .header("authorization", "Bearer demo")
            .body(bytes::Bytes::new())
            .expect("valid request"),
    );
    report(&pipeline.process(&signed_in)?);

    Ok(())
}

fn report(res: &Response) {
    println!(
        "{} {:?} {}",
        res.status_code(),
        res.header("x-request-id"),
        String::from_utf8_lossy(res.body()),
    );
}
