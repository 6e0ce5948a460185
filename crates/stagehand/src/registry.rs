//! Ordered registry of configuration files handed to the engine at start.

use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::staging::{ResourceStager, STAGING_TARGET, StageError, StageOutcome};

/// Accumulates staged configuration-file paths in registration order.
///
/// Each registration stages the file's basename from the bundle to the given
/// path first; only a successful stage appends the path. Registering the same
/// path twice lists it twice.
#[derive(Debug)]
pub struct ConfigRegistry {
    stager: Arc<ResourceStager>,
    entries: Mutex<Vec<Utf8PathBuf>>,
}

impl ConfigRegistry {
    /// Builds an empty registry that stages through `stager`.
    #[must_use]
    pub fn new(stager: Arc<ResourceStager>) -> Self {
        Self {
            stager,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Stages the file backing `path` and appends `path` to the list.
    ///
    /// # Errors
    ///
    /// Propagates the [`StageError`] from staging; the list is left
    /// unchanged on failure.
    pub fn register(&self, path: &Utf8Path) -> Result<StageOutcome, StageError> {
        let Some(name) = path.file_name() else {
            return Err(StageError::InvalidDestination {
                path: path.to_path_buf(),
            });
        };
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let outcome = self.stager.stage(name, path)?;
        entries.push(path.to_path_buf());
        debug!(
            target: STAGING_TARGET,
            path = %path,
            position = entries.len(),
            "registered configuration file"
        );
        Ok(outcome)
    }

    /// Snapshot of the registered paths in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<Utf8PathBuf> {
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Number of registered paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }

    /// Whether nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
