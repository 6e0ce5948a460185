//! Idempotent staging of bundled resources into writable locations.
//!
//! Staging copies a named resource out of the read-only [`Bundle`] exactly
//! once per destination. When the destination already exists the call is a
//! no-op; no content comparison happens, so a truncated copy left behind by
//! an interrupted stage is only repaired through [`ResourceStager::restage`].

mod error;

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use camino::Utf8Path;
use tracing::{debug, info, warn};

use crate::bundle::Bundle;
use crate::fs::Filesystem;

pub use error::{StageError, StageErrorKind};

pub(crate) const STAGING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::staging");

/// Size of the streaming copy buffer.
pub const COPY_BUFFER_SIZE: usize = 1024;

/// Result of a successful stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The resource was copied into place.
    Copied {
        /// Number of bytes written.
        bytes: u64,
    },
    /// The destination already existed; nothing was read or written.
    AlreadyPresent,
}

/// Copies bundled resources into place at most once per destination.
pub struct ResourceStager {
    bundle: Arc<dyn Bundle>,
    fs: Arc<dyn Filesystem>,
    // Serialises the exists-then-create sequence across callers.
    lock: Mutex<()>,
}

impl ResourceStager {
    /// Builds a stager over the given bundle and filesystem.
    #[must_use]
    pub fn new(bundle: Arc<dyn Bundle>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            bundle,
            fs,
            lock: Mutex::new(()),
        }
    }

    /// Materialises `name` at `destination` unless the destination exists.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] when the destination is not absolute, the
    /// bundle lacks the resource, or any filesystem step fails. A failed copy
    /// may leave a truncated destination behind.
    pub fn stage(&self, name: &str, destination: &Utf8Path) -> Result<StageOutcome, StageError> {
        let parent = destination_parent(destination)?;
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        self.stage_locked(name, destination, parent)
    }

    /// Removes any existing destination and stages the resource afresh.
    ///
    /// This is the explicit cleanup-and-retry path for destinations left
    /// truncated by an interrupted [`stage`](Self::stage).
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Cleanup`] when the old copy cannot be removed,
    /// otherwise the same errors as [`stage`](Self::stage).
    pub fn restage(&self, name: &str, destination: &Utf8Path) -> Result<StageOutcome, StageError> {
        let parent = destination_parent(destination)?;
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if self.probe(destination)? {
            self.fs
                .remove_file(destination)
                .map_err(|source| StageError::Cleanup {
                    path: destination.to_path_buf(),
                    source,
                })?;
            info!(
                target: STAGING_TARGET,
                destination = %destination,
                "removed previous copy before restaging"
            );
        }
        self.stage_locked(name, destination, parent)
    }

    fn stage_locked(
        &self,
        name: &str,
        destination: &Utf8Path,
        parent: &Utf8Path,
    ) -> Result<StageOutcome, StageError> {
        if self.probe(destination)? {
            debug!(
                target: STAGING_TARGET,
                resource = name,
                destination = %destination,
                "destination exists; skipping copy"
            );
            return Ok(StageOutcome::AlreadyPresent);
        }

        self.fs
            .create_dir_all(parent)
            .map_err(|source| StageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;

        let mut reader = self.bundle.open_resource(name)?;
        let copy_error = |source: io::Error| StageError::Copy {
            name: name.to_owned(),
            path: destination.to_path_buf(),
            source,
        };
        let mut writer = self.fs.create_file(destination).map_err(copy_error)?;
        let bytes = match copy_stream(&mut reader, &mut writer) {
            Ok(bytes) => bytes,
            Err(source) => {
                warn!(
                    target: STAGING_TARGET,
                    resource = name,
                    destination = %destination,
                    error = %source,
                    "copy interrupted; destination may be truncated until restaged"
                );
                return Err(copy_error(source));
            }
        };

        info!(
            target: STAGING_TARGET,
            resource = name,
            destination = %destination,
            bytes,
            "staged bundled resource"
        );
        Ok(StageOutcome::Copied { bytes })
    }

    fn probe(&self, destination: &Utf8Path) -> Result<bool, StageError> {
        self.fs
            .exists(destination)
            .map_err(|source| StageError::Probe {
                path: destination.to_path_buf(),
                source,
            })
    }
}

impl std::fmt::Debug for ResourceStager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStager").finish_non_exhaustive()
    }
}

fn destination_parent(destination: &Utf8Path) -> Result<&Utf8Path, StageError> {
    let parent = destination
        .parent()
        .filter(|_| destination.is_absolute() && destination.file_name().is_some());
    parent.ok_or_else(|| StageError::InvalidDestination {
        path: destination.to_path_buf(),
    })
}

fn copy_stream(reader: &mut dyn Read, writer: &mut dyn Write) -> io::Result<u64> {
    let mut buffer = [0_u8; COPY_BUFFER_SIZE];
    let mut total = 0_u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        let chunk = buffer
            .get(..read)
            .ok_or_else(|| io::Error::other("reader reported more bytes than the buffer holds"))?;
        writer.write_all(chunk)?;
        total = total.saturating_add(read as u64);
    }
    writer.flush()?;
    Ok(total)
}
