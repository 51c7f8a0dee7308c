//! Request trace context (W3C `traceparent`).
//!
//! - An incoming valid `traceparent` keeps its trace id; otherwise a fresh one
//!   is minted.
//! - Every request gets its own transaction id (the span id we hand back).
//! - The response carries `traceparent: 00-{trace}-{transaction}-01`.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::field::Empty;
use tracing::Span;
use uuid::Uuid;

pub const TRACEPARENT: &str = "traceparent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// 32 lowercase hex chars.
    pub trace_id: String,
    /// Caller's span id, when the request arrived with a valid `traceparent`.
    pub parent_id: Option<String>,
    /// 16 lowercase hex chars, unique per request.
    pub transaction_id: String,
}

impl TraceContext {
    pub fn new_root() -> Self {
        Self {
            trace_id: new_trace_id(),
            parent_id: None,
            transaction_id: new_transaction_id(),
        }
    }

    /// Continue the caller's trace if `header` is a valid version-00 style
    /// `traceparent`, else start a new one.
    pub fn from_header(header: Option<&str>) -> Self {
        match header.and_then(parse_traceparent) {
            Some((trace_id, parent_id)) => Self {
                trace_id,
                parent_id: Some(parent_id),
                transaction_id: new_transaction_id(),
            },
            None => Self::new_root(),
        }
    }

    pub fn traceparent(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.transaction_id)
    }
}

/// Returns `(trace_id, parent_id)`.
pub fn parse_traceparent(s: &str) -> Option<(String, String)> {
    let mut parts = s.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let parent_id = parts.next()?;
    let flags = parts.next()?;

    if !is_hex(version, 2) || version == "ff" {
        return None;
    }
    // Version 00 has exactly four fields; later versions may append more.
    if version == "00" && parts.next().is_some() {
        return None;
    }
    if !is_hex(trace_id, 32) || !is_hex(parent_id, 16) || !is_hex(flags, 2) {
        return None;
    }
    if is_zero(trace_id) || is_zero(parent_id) {
        return None;
    }
    Some((trace_id.to_string(), parent_id.to_string()))
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn is_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn new_transaction_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

// --------------------
// Middleware + span
// --------------------

/// Outermost layer: attaches a `TraceContext` to the request and echoes it on
/// the response.
pub async fn propagate(mut req: Request, next: Next) -> Response {
    let header = req
        .headers()
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok());
    let ctx = TraceContext::from_header(header);
    let traceparent = ctx.traceparent();
    req.extensions_mut().insert(ctx);

    let mut resp = next.run(req).await;
    if let Ok(v) = HeaderValue::from_str(&traceparent) {
        resp.headers_mut().insert(TRACEPARENT, v);
    }
    resp
}

/// `make_span_with` for the HTTP trace layer.
pub fn make_request_span(req: &Request) -> Span {
    let span = tracing::info_span!(
        "http.request",
        http.method = %req.method(),
        url.path = %req.uri().path(),
        trace.id = Empty,
        transaction.id = Empty,
        trace.parent_id = Empty,
    );
    if let Some(ctx) = req.extensions().get::<TraceContext>() {
        span.record("trace.id", ctx.trace_id.as_str());
        span.record("transaction.id", ctx.transaction_id.as_str());
        if let Some(parent) = &ctx.parent_id {
            span.record("trace.parent_id", parent.as_str());
        }
    }
    span
}
