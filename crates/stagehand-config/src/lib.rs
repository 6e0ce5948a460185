//! Shared configuration for the stagehand engine bootstrap.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file, then `STAGEHAND_*` environment variables,
//! then command-line flags. Every field has a default so an empty
//! environment always loads.
//!
//! [`StorageLayout`] turns a loaded [`Config`] into the on-disk layout the
//! engine expects: an internal root per namespace for ini files and an
//! external root per vendor and namespace for databases.

mod defaults;
mod layout;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use defaults::{
    DEFAULT_BUNDLE_DIR, DEFAULT_ENGINE_COMMAND, DEFAULT_INTERNAL_ROOT, DEFAULT_LOG_FILTER,
    DEFAULT_NAMESPACE, DEFAULT_RELEASE, DEFAULT_VENDOR, default_bundle_dir,
    default_engine_command, default_external_root, default_internal_root, default_log_filter,
    default_log_format, default_namespace, default_release, default_vendor,
};
pub use layout::{LayoutError, StorageLayout};

/// Output format for the tracing subscriber.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Single-line text for terminals.
    Compact,
}

/// Error returned when a log format name is not recognised.
pub type LogFormatParseError = strum::ParseError;

/// Resolved bootstrap configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "STAGEHAND")]
pub struct Config {
    /// Namespace of the owning application, e.g. `com.example.app`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Release identifier launched when the caller does not name one.
    #[serde(default = "default_release")]
    pub release: String,
    /// Platform internal storage root.
    #[serde(default = "default_internal_root")]
    pub internal_root: Utf8PathBuf,
    /// Platform external storage root.
    #[serde(default = "default_external_root")]
    pub external_root: Utf8PathBuf,
    /// Vendor segment of the external storage root.
    #[serde(default = "default_vendor")]
    pub vendor: String,
    /// Directory backing the read-only resource bundle.
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: Utf8PathBuf,
    /// Engine executable launched by the process service host.
    #[serde(default = "default_engine_command")]
    pub engine_command: Utf8PathBuf,
    /// Database files installed from the bundle before start.
    #[serde(default)]
    pub databases: Vec<String>,
    /// Ini files copied from the bundle and handed to the engine.
    #[serde(default)]
    pub ini_files: Vec<String>,
    /// Tracing filter expression.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Tracing output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            release: default_release(),
            internal_root: default_internal_root(),
            external_root: default_external_root(),
            vendor: default_vendor(),
            bundle_dir: default_bundle_dir(),
            engine_command: default_engine_command(),
            databases: Vec::new(),
            ini_files: Vec::new(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Namespace of the owning application.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Default release identifier.
    #[must_use]
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Tracing output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Derives the storage layout for this configuration.
    pub fn storage_layout(&self) -> Result<StorageLayout, LayoutError> {
        StorageLayout::from_config(self)
    }
}
