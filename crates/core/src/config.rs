//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the core.
//! Nothing in the core reads environment variables itself; binaries do that and hand
//! the raw values to the helpers here.

use crate::constants::{
    CATALOG_FILENAME, DEFAULT_CATALOG_DIR, DEFAULT_EPISODE_DURATION_DAYS,
    MAX_EPISODE_DURATION_DAYS,
};
use crate::{HmoError, HmoResult};
use chrono::Duration;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    catalog_path: PathBuf,
    episode_duration: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`HmoError::InvalidInput`] if the episode duration is not positive or
    /// exceeds [`MAX_EPISODE_DURATION_DAYS`].
    pub fn new(catalog_path: PathBuf, episode_duration: Duration) -> HmoResult<Self> {
        if episode_duration <= Duration::zero() {
            return Err(HmoError::InvalidInput(
                "episode duration must be positive".into(),
            ));
        }
        if episode_duration.num_days() > MAX_EPISODE_DURATION_DAYS {
            return Err(HmoError::InvalidInput(format!(
                "episode duration cannot exceed {MAX_EPISODE_DURATION_DAYS} days"
            )));
        }

        Ok(Self {
            catalog_path,
            episode_duration,
        })
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn episode_duration(&self) -> Duration {
        self.episode_duration
    }
}

/// Resolve the catalog file without reading environment variables.
///
/// If `override_path` is provided it must point at an existing file. Otherwise this
/// looks for `catalog/catalog.yaml` relative to the current working directory and then
/// walks up from `CARGO_MANIFEST_DIR`.
pub fn resolve_catalog_path(override_path: Option<PathBuf>) -> HmoResult<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path);
        }
        return Err(HmoError::InvalidInput(format!(
            "catalog override {} is not a file",
            path.display()
        )));
    }

    let cwd_relative = Path::new(DEFAULT_CATALOG_DIR).join(CATALOG_FILENAME);
    if cwd_relative.is_file() {
        return Ok(cwd_relative);
    }

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for ancestor in manifest_dir.ancestors() {
        let candidate = ancestor.join(DEFAULT_CATALOG_DIR).join(CATALOG_FILENAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(HmoError::InvalidInput(format!(
        "could not locate {DEFAULT_CATALOG_DIR}/{CATALOG_FILENAME}"
    )))
}

/// Parse the episode duration (whole days) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default of
/// [`DEFAULT_EPISODE_DURATION_DAYS`] days. Values must lie in
/// `1..=MAX_EPISODE_DURATION_DAYS`.
pub fn episode_duration_from_env_value(value: Option<String>) -> HmoResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let days = match value {
        Some(v) => v.parse::<i64>().map_err(|_| {
            HmoError::InvalidInput(format!(
                "episode duration must be a whole number of days, got {v:?}"
            ))
        })?,
        None => DEFAULT_EPISODE_DURATION_DAYS,
    };

    if !(1..=MAX_EPISODE_DURATION_DAYS).contains(&days) {
        return Err(HmoError::InvalidInput(format!(
            "episode duration must be between 1 and {MAX_EPISODE_DURATION_DAYS} days, got {days}"
        )));
    }

    Duration::try_days(days).ok_or_else(|| {
        HmoError::InvalidInput(format!("episode duration of {days} days is out of range"))
    })
}
