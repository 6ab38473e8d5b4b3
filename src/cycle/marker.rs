//! Last-run marker: a flat file holding one floating-point Unix timestamp.
//!
//! No locking. Two processes sharing a marker can both pass the debounce
//! check and run a cycle at the same time.

use crate::error::{Result, StateError};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LastRunMarker {
    path: PathBuf,
}

impl LastRunMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last run time. A missing or unparseable file reads as 0.0.
    pub async fn read(&self) -> Result<f64> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(0.0),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.display().to_string(),
                    source,
                }
                .into());
            }
        };

        match raw.trim().parse::<f64>() {
            Ok(timestamp) if timestamp.is_finite() => Ok(timestamp),
            _ => {
                tracing::warn!(
                    path = %self.path.display(),
                    contents = %raw.trim(),
                    "last-run marker is not a timestamp, treating as never run"
                );
                Ok(0.0)
            }
        }
    }

    /// Overwrite the marker with `timestamp`.
    pub async fn write(&self, timestamp: f64) -> Result<()> {
        tokio::fs::write(&self.path, timestamp.to_string())
            .await
            .map_err(|source| {
                StateError::Write {
                    path: self.path.display().to_string(),
                    source,
                }
                .into()
            })
    }
}

/// Current wall-clock time as fractional Unix seconds.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
