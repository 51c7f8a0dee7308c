//! Service config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use hitcount_core::error::{HitError, Result};

pub use schema::{
    HitcountConfig, LogFormat, LogSection, OpsSection, ServerSection, StorageSection,
};

/// Used when no path is given on the command line or in `HITCOUNT_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "hitcount.yaml";

pub fn load_from_file(path: &str) -> Result<HitcountConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| HitError::Config(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<HitcountConfig> {
    let cfg: HitcountConfig = serde_yaml::from_str(s)
        .map_err(|e| HitError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// An explicit path must exist. Without one, a missing `hitcount.yaml` falls
/// back to built-in defaults.
pub fn load(explicit: Option<&str>) -> Result<HitcountConfig> {
    match explicit {
        Some(path) => load_from_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH),
        None => {
            let cfg = HitcountConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}
