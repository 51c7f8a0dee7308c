//! Observability: log output, request trace context and in-process metrics.
//!
//! - `ecs`       : JSON event formatter with ECS field names
//! - `metrics`   : Prometheus-compatible counters/gauges/histograms
//! - `trace_ctx` : W3C `traceparent` propagation and the per-request span

pub mod ecs;
pub mod metrics;
pub mod trace_ctx;

use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::{fmt, EnvFilter};

use hitcount_core::error::{HitError, Result};

use crate::config::{LogFormat, LogSection};

/// Install the global subscriber. `RUST_LOG` wins over `log.level`.
pub fn init_logging(cfg: &LogSection) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let installed = match cfg.format {
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .fmt_fields(JsonFields::new())
            .event_format(ecs::EcsFormat::default())
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| HitError::Internal(format!("logging init failed: {e}")))
}
