//! Default values shared by the loader, the binary, and tests.

use std::env;

use camino::Utf8PathBuf;

use crate::LogFormat;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "com.example.app";

/// Bundled engine build launched when no release identifier is supplied.
pub const DEFAULT_RELEASE: &str = "couchbase-1.0-dp-ebc0925";

/// Platform root under which per-application internal storage lives.
pub const DEFAULT_INTERNAL_ROOT: &str = "/data/data";

/// Vendor segment inserted into the external storage root.
pub const DEFAULT_VENDOR: &str = "Android";

/// Directory holding the read-only bundle when none is configured.
pub const DEFAULT_BUNDLE_DIR: &str = "assets";

/// Executable launched by the process service host.
pub const DEFAULT_ENGINE_COMMAND: &str = "couchbase-engine";

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned namespace value for serde defaults.
pub fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

/// Owned release identifier for serde defaults.
pub fn default_release() -> String {
    DEFAULT_RELEASE.to_owned()
}

/// Internal storage root for serde defaults.
pub fn default_internal_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_INTERNAL_ROOT)
}

/// External storage root.
///
/// Prefers the user's data directory and falls back to the temporary
/// directory when the platform exposes none (or it is not UTF-8).
pub fn default_external_root() -> Utf8PathBuf {
    dirs::data_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .or_else(|| Utf8PathBuf::from_path_buf(env::temp_dir()).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("/tmp"))
}

/// Vendor segment for serde defaults.
pub fn default_vendor() -> String {
    DEFAULT_VENDOR.to_owned()
}

/// Bundle directory for serde defaults.
pub fn default_bundle_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_BUNDLE_DIR)
}

/// Engine executable for serde defaults.
pub fn default_engine_command() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ENGINE_COMMAND)
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
