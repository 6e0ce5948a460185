//! Error surface for resource staging.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::bundle::BundleError;

/// Coarse category of a staging failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageErrorKind {
    /// The bundle lacks the named resource. Not retried.
    ResourceNotFound,
    /// Directory creation or the copy itself failed.
    IoFault,
    /// The destination is not an absolute file path.
    InvalidDestination,
}

/// Errors raised while staging a bundled resource.
#[derive(Debug, Error)]
pub enum StageError {
    /// The bundle has no resource with this name.
    #[error("resource '{name}' not found in bundle")]
    ResourceNotFound {
        /// Requested resource name.
        name: String,
    },
    /// Opening the resource in the bundle failed.
    #[error("failed to read resource '{name}' from bundle: {source}")]
    BundleRead {
        /// Requested resource name.
        name: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The destination was relative or had no file name.
    #[error("staging destination '{path}' must be an absolute file path")]
    InvalidDestination {
        /// Rejected destination.
        path: Utf8PathBuf,
    },
    /// Probing the destination failed.
    #[error("failed to check staging destination '{path}': {source}")]
    Probe {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The destination's parent directory could not be created.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Copying bytes into the destination failed; it may be truncated.
    #[error("failed to copy resource '{name}' to '{path}': {source}")]
    Copy {
        /// Resource being copied.
        name: String,
        /// Destination path, possibly left partially written.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Removing an earlier copy before restaging failed.
    #[error("failed to remove stale copy '{path}': {source}")]
    Cleanup {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl StageError {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> StageErrorKind {
        match self {
            Self::ResourceNotFound { .. } => StageErrorKind::ResourceNotFound,
            Self::InvalidDestination { .. } => StageErrorKind::InvalidDestination,
            Self::BundleRead { .. }
            | Self::Probe { .. }
            | Self::CreateDirectory { .. }
            | Self::Copy { .. }
            | Self::Cleanup { .. } => StageErrorKind::IoFault,
        }
    }
}

impl From<BundleError> for StageError {
    fn from(error: BundleError) -> Self {
        match error {
            BundleError::NotFound { name } => Self::ResourceNotFound { name },
            BundleError::Io { name, source } => Self::BundleRead { name, source },
        }
    }
}
