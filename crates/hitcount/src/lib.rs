//! Top-level facade crate for hitcount.
//!
//! Re-exports the counter store and the server library so users can depend on a single crate.

pub mod core {
    pub use hitcount_core::*;
}

pub mod server {
    pub use hitcount_server::*;
}
