use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use http::{Method, StatusCode, Uri};
use parking_lot::Mutex;
use tsu_pipeline::middleware::{Middleware, from_fn};
use tsu_pipeline::{EmptyChain, Error, Pipeline, Request, Response, Violation};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn request() -> Request {
    Request::new(Method::GET, Uri::from_static("/users/42"))
}

/// Appends `name` to the log, then delegates.
fn marker(log: &Log, name: &'static str) -> impl Middleware + use<> {
    let log = Arc::clone(log);
    from_fn(move |req, res, next| {
        log.lock().push(name);
        next.run(req, res)
    })
    .named(name)
}

/// Prefixes the response body with `tag` after the rest of the chain ran.
fn prefix(tag: &'static str) -> impl Middleware {
    from_fn(move |req, res, next| {
        let res = next.run(req, res)?;
        let body = [tag.as_bytes(), res.body()].concat();
        Ok(res.with_body(body))
    })
}

#[test]
fn handlers_run_in_registration_order() {
    let log = Log::default();
    let pipeline = Pipeline::new();
    for name in ["one", "two", "three", "four"] {
        pipeline.add(marker(&log, name)).unwrap();
    }

    pipeline.process(&request()).unwrap();

    assert_eq!(*log.lock(), ["one", "two", "three", "four"]);
}

#[test]
fn first_registered_wraps_the_rest() {
    let pipeline = Pipeline::new();
    pipeline.add(prefix("A-")).unwrap().add(prefix("B-")).unwrap();

    let res = pipeline.process(&request()).unwrap();

    assert_eq!(res.body(), b"A-B-");
}

#[test]
fn short_circuit_skips_later_handlers() {
    let log = Log::default();
    let pipeline = Pipeline::new();
    pipeline
        .add(marker(&log, "first")).unwrap()
        .add(from_fn(|_, _, _| Ok(Response::status(StatusCode::FORBIDDEN)))).unwrap()
        .add(marker(&log, "never")).unwrap();

    let res = pipeline.process(&request()).unwrap();

    assert_eq!(res.status_code(), 403);
    assert_eq!(*log.lock(), ["first"]);
}

#[test]
fn single_delegating_handler_returns_input_unchanged() {
    let pipeline = Pipeline::new();
    pipeline.add(from_fn(|req, res, next| next.run(req, res))).unwrap();

    let input = Response::text("as-is").with_header("x-kept", "yes");
    assert_eq!(pipeline.process_with(&request(), input.clone()).unwrap(), input);
    assert_eq!(pipeline.process(&request()).unwrap(), Response::default());
}

#[test]
fn invalid_response_fails_dispatch_and_stops_chain() {
    let log = Log::default();
    let pipeline = Pipeline::new();
    pipeline
        .add(from_fn(|req, res, next| next.run(req, res))).unwrap()
        .add(from_fn(|_, res, _| Ok(res.with_status(1200u16))).named("broken")).unwrap()
        .add(marker(&log, "never")).unwrap();

    let err = pipeline.process(&request()).unwrap_err();

    match err {
        Error::ContractViolation { middleware, violation } => {
            assert_eq!(middleware, "broken");
            assert_eq!(violation, Violation::Status(1200));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(log.lock().is_empty());
}

#[test]
fn outer_handler_cannot_smuggle_an_invalid_response() {
    let pipeline = Pipeline::new();
    pipeline
        .add(from_fn(|req, res, next| {
            let res = next.run(req, res)?;
            Ok(res.with_header("x-broken", "a\r\nb"))
        }).named("outer"))
        .unwrap()
        .add(from_fn(|_, _, _| Ok(Response::text("fine"))))
        .unwrap();

    let err = pipeline.process(&request()).unwrap_err();

    assert!(matches!(
        err,
        Error::ContractViolation { ref middleware, violation: Violation::HeaderValue { .. } }
            if middleware == "outer"
    ));
}

#[test]
fn add_during_dispatch_is_refused() {
    let pipeline = Arc::new(Pipeline::new());
    let refused = Arc::new(AtomicBool::new(false));

    let inner = Arc::downgrade(&pipeline);
    let seen = Arc::clone(&refused);
    pipeline
        .add(from_fn(move |req, res, next| {
            if let Some(pipeline) = inner.upgrade() {
                let outcome = pipeline.add(from_fn(|_, res, _| Ok(res)));
                seen.store(matches!(outcome, Err(Error::Locked)), Ordering::SeqCst);
            }
            next.run(req, res)
        }))
        .unwrap();

    pipeline.process(&request()).unwrap();

    assert!(refused.load(Ordering::SeqCst));
    assert_eq!(pipeline.len(), 1);
    assert!(pipeline.add(from_fn(|_, res, _| Ok(res))).is_ok());
    assert_eq!(pipeline.len(), 2);
}

#[test]
fn add_from_another_thread_is_refused_during_dispatch() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let pipeline = Pipeline::new();
    let (inside, hold) = (Arc::clone(&entered), Arc::clone(&release));
    pipeline
        .add(from_fn(move |req, res, next| {
            inside.wait();
            hold.wait();
            next.run(req, res)
        }))
        .unwrap();

    let (dispatching, refused, outcome) = thread::scope(|s| {
        let dispatch = s.spawn(|| pipeline.process(&request()));

        entered.wait();
        let dispatching = pipeline.is_dispatching();
        let refused = matches!(pipeline.add(from_fn(|_, res, _| Ok(res))), Err(Error::Locked));
        release.wait();

        (dispatching, refused, dispatch.join().unwrap())
    });

    assert!(dispatching);
    assert!(refused);
    assert_eq!(outcome.unwrap(), Response::default());
    assert!(!pipeline.is_dispatching());
    assert!(pipeline.add(from_fn(|_, res, _| Ok(res))).is_ok());
    assert_eq!(pipeline.len(), 2);
}

#[test]
fn concurrent_dispatches_run_side_by_side() {
    let both_inside = Arc::new(Barrier::new(2));

    let pipeline = Pipeline::new();
    pipeline
        .add(from_fn(move |req, res, next| {
            both_inside.wait();
            next.run(req, res)
        }))
        .unwrap()
        .add(from_fn(|_, _, _| Ok(Response::text("done"))))
        .unwrap();

    let responses: Vec<Response> = thread::scope(|s| {
        let workers: Vec<_> = (0..2).map(|_| s.spawn(|| pipeline.process(&request()))).collect();
        workers.into_iter().map(|w| w.join().unwrap().unwrap()).collect()
    });

    assert_eq!(responses.len(), 2);
    assert!(responses.iter().all(|res| res.body() == b"done"));
    assert!(!pipeline.is_dispatching());
}

#[test]
fn handler_failure_reaches_the_caller() {
    let log = Log::default();
    let pipeline = Pipeline::new();
    pipeline
        .add(from_fn(|req, res, next| next.run(req, res))).unwrap()
        .add(from_fn(|_, _, _| Err(Error::handler("backend unavailable")))).unwrap()
        .add(marker(&log, "never")).unwrap();

    let err = pipeline.process(&request()).unwrap_err();

    assert_eq!(err.to_string(), "middleware failed: backend unavailable");
    assert!(log.lock().is_empty());
    assert!(!pipeline.is_dispatching());
}

#[test]
fn lock_is_released_after_failed_dispatch() {
    let pipeline = Pipeline::new();
    pipeline.add(from_fn(|_, _, _| Ok(Response::status(5u16)))).unwrap();

    assert!(pipeline.process(&request()).is_err());
    assert!(!pipeline.is_dispatching());
    assert!(pipeline.add(from_fn(|_, res, _| Ok(res))).is_ok());
}

#[test]
fn empty_chain_is_rejected_by_default() {
    let pipeline = Pipeline::new();
    assert!(matches!(pipeline.process(&request()), Err(Error::EmptyChain)));
}

#[test]
fn empty_chain_can_pass_through() {
    let pipeline = Pipeline::new().on_empty(EmptyChain::PassThrough);
    let input = Response::text("untouched");

    assert_eq!(pipeline.process_with(&request(), input.clone()).unwrap(), input);
}

#[test]
fn pipeline_serves_repeated_dispatches() {
    let log = Log::default();
    let pipeline = Pipeline::new();
    pipeline.add(marker(&log, "hit")).unwrap();

    for _ in 0..3 {
        pipeline.process(&request()).unwrap();
    }

    assert_eq!(log.lock().len(), 3);
}

#[test]
fn handler_sees_the_request() {
    let pipeline = Pipeline::new();
    pipeline
        .add(from_fn(|req, _, _| Ok(Response::text(format!("{} {}", req.method(), req.path())))))
        .unwrap();

    let res = pipeline.process(&request()).unwrap();

    assert_eq!(res.body(), b"GET /users/42");
    assert_eq!(res.into_http().unwrap().status(), StatusCode::OK);
}
