//! Axum router wiring.
//!
//! The API is `/hello/{name}`; ops endpoints are mounted when `ops.enabled`.
//! Layers, outermost first: trace context propagation, then the request span.

use axum::{middleware, routing::get, Router};
use tower_http::trace::{DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{app_state::AppState, http, obs::trace_ctx, ops};

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/hello/:name", get(http::hello::hello))
        .route("/hello/", get(http::hello::hello_empty));

    if state.cfg().ops.enabled {
        router = router
            .route("/healthz", get(ops::healthz))
            .route("/readyz", get(ops::readyz))
            .route("/metrics", get(ops::metrics));
    }

    let trace = TraceLayer::new_for_http()
        .make_span_with(trace_ctx::make_request_span)
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    router
        .layer(trace)
        .layer(middleware::from_fn(trace_ctx::propagate))
        .with_state(state)
}
