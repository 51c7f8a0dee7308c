//! hitcount core: the per-name request counter and the error surface shared
//! by the server and its tests.
//!
//! The store here is synchronous and runtime-free. Callers on an async
//! runtime are expected to move calls onto a blocking thread.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Every storage failure surfaces as `HitError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod greeting;
pub mod store;

/// Shared result type.
pub use error::{HitError, Result};
pub use store::{CounterDb, StoreOptions, StorePath};
