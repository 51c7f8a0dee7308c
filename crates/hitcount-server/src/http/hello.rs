//! `GET /hello/{name}`: bump the caller's counter and greet them with it.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::Instrument;

use hitcount_core::greeting;

use crate::app_state::AppState;
use crate::obs::metrics::GaugeVec;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// `GET /hello/{name}`. A segment that does not decode is rejected by the
/// extractor (400) and never reaches the store.
pub async fn hello(State(app): State<AppState>, Path(name): Path<String>) -> Response {
    greet(app, name).await
}

/// `GET /hello/`: the missing segment counts as the empty name.
pub async fn hello_empty(State(app): State<AppState>) -> Response {
    greet(app, String::new()).await
}

async fn greet(app: AppState, name: String) -> Response {
    tracing::info!(name = %name, "handling hello request");

    let metrics = app.metrics();
    let in_flight = InFlight::enter(&metrics.hello_in_flight);
    let started = Instant::now();

    let res = app
        .store()
        .increment_and_get(&name)
        .instrument(tracing::info_span!("updateRequestCount", span.kind = "custom"))
        .await;

    metrics.storage_duration.observe(&[], started.elapsed());
    drop(in_flight);

    match res {
        Ok(count) => {
            metrics.hello_requests.inc(&[("outcome", "ok")]);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                greeting::render(&name, count),
            )
                .into_response()
        }
        Err(e) => {
            let outcome = e.client_code().as_str().to_ascii_lowercase();
            metrics.hello_requests.inc(&[("outcome", outcome.as_str())]);
            tracing::error!(name = %name, error = %e, "failed to update request count");

            let mut resp =
                (StatusCode::INTERNAL_SERVER_ERROR, greeting::UPDATE_FAILED_BODY).into_response();
            let headers = resp.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
            headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
            resp
        }
    }
}

/// Holds the in-flight gauge up until dropped, including on cancellation.
struct InFlight<'a>(&'a GaugeVec);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a GaugeVec) -> Self {
        gauge.inc(&[]);
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.dec(&[]);
    }
}
