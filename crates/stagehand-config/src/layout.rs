//! Derives the storage roots and staging destinations for a namespace.
//!
//! The layout is a compatibility contract with the engine:
//!
//! - internal root: `<internal_root>/<namespace>`
//! - external root: `<external_root>/<vendor>/data/<namespace>`
//! - databases: `<external root>/db/<file>`
//! - ini files: `<internal root>/user_data/<file>`

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::Config;

const DATABASE_DIR: &str = "db";
const INI_DIR: &str = "user_data";

/// Storage roots for one application namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    namespace: String,
    internal: Utf8PathBuf,
    external: Utf8PathBuf,
}

impl StorageLayout {
    /// Derives the layout from the shared configuration.
    pub fn from_config(config: &Config) -> Result<Self, LayoutError> {
        Self::new(
            config.namespace(),
            &config.internal_root,
            &config.external_root,
            &config.vendor,
        )
    }

    /// Builds a layout from explicit platform roots.
    pub fn new(
        namespace: &str,
        internal_root: &Utf8Path,
        external_root: &Utf8Path,
        vendor: &str,
    ) -> Result<Self, LayoutError> {
        validate_segment(namespace).map_err(|reason| LayoutError::InvalidNamespace {
            namespace: namespace.to_owned(),
            reason,
        })?;
        validate_segment(vendor).map_err(|reason| LayoutError::InvalidVendor {
            vendor: vendor.to_owned(),
            reason,
        })?;
        Ok(Self {
            namespace: namespace.to_owned(),
            internal: internal_root.join(namespace),
            external: external_root.join(vendor).join("data").join(namespace),
        })
    }

    /// Namespace the layout was derived for.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Internal storage root for the namespace.
    #[must_use]
    pub fn data_path(&self) -> &Utf8Path {
        &self.internal
    }

    /// External storage root for the namespace.
    #[must_use]
    pub fn external_path(&self) -> &Utf8Path {
        &self.external
    }

    /// Destination of a database file installed from the bundle.
    pub fn database_destination(&self, file_name: &str) -> Result<Utf8PathBuf, LayoutError> {
        validate_file_name(file_name)?;
        Ok(self.external.join(DATABASE_DIR).join(file_name))
    }

    /// Destination of an ini file copied from the bundle.
    pub fn ini_destination(&self, file_name: &str) -> Result<Utf8PathBuf, LayoutError> {
        validate_file_name(file_name)?;
        Ok(self.internal.join(INI_DIR).join(file_name))
    }
}

fn validate_file_name(file_name: &str) -> Result<(), LayoutError> {
    validate_segment(file_name).map_err(|reason| LayoutError::InvalidFileName {
        file_name: file_name.to_owned(),
        reason,
    })
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("must not be empty");
    }
    if segment == "." || segment == ".." {
        return Err("must not be a relative directory reference");
    }
    if segment.contains(['/', '\\']) {
        return Err("must not contain a path separator");
    }
    Ok(())
}

/// Errors raised while deriving storage paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The namespace cannot be used as a single path segment.
    #[error("invalid namespace '{namespace}': {reason}")]
    InvalidNamespace {
        /// Rejected namespace.
        namespace: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The vendor cannot be used as a single path segment.
    #[error("invalid vendor '{vendor}': {reason}")]
    InvalidVendor {
        /// Rejected vendor.
        vendor: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// A staged file name would escape its directory.
    #[error("invalid file name '{file_name}': {reason}")]
    InvalidFileName {
        /// Rejected file name.
        file_name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}
