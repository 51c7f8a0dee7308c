//! hitcount server library entry.
//!
//! Wires config, the counter store, the hello handler, operational endpoints and
//! request tracing into one axum router. Consumed by the binary (`main.rs`)
//! and by integration tests.

pub mod app_state;
pub mod config;
pub mod http;
pub mod obs;
pub mod ops;
pub mod router;
pub mod storage;
