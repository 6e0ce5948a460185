//! Read-only resource bundles.
//!
//! A bundle is the package shipped alongside the application: config
//! templates, seed databases, and engine builds. Staging only ever reads
//! from it, one named resource at a time.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Byte stream over a single bundled resource.
pub type ResourceStream = Box<dyn Read + Send>;

/// Source of named resources.
pub trait Bundle: Send + Sync {
    /// Opens the named resource for reading.
    fn open_resource(&self, name: &str) -> Result<ResourceStream, BundleError>;
}

impl<T> Bundle for Arc<T>
where
    T: Bundle + ?Sized,
{
    fn open_resource(&self, name: &str) -> Result<ResourceStream, BundleError> {
        (**self).open_resource(name)
    }
}

/// Errors raised while opening a bundled resource.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The bundle does not contain the named resource.
    #[error("bundle has no resource named '{name}'")]
    NotFound {
        /// Requested resource name.
        name: String,
    },
    /// The resource exists but could not be opened.
    #[error("failed to open bundled resource '{name}': {source}")]
    Io {
        /// Requested resource name.
        name: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Bundle backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirBundle {
    root: Utf8PathBuf,
}

impl DirBundle {
    /// Serves resources from `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the bundle reads from.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<Utf8PathBuf> {
        let relative = Utf8Path::new(name);
        let confined = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Utf8Component::Normal(_)));
        confined.then(|| self.root.join(relative))
    }
}

impl Bundle for DirBundle {
    fn open_resource(&self, name: &str) -> Result<ResourceStream, BundleError> {
        let Some(path) = self.resolve(name) else {
            return Err(BundleError::NotFound {
                name: name.to_owned(),
            });
        };
        match File::open(path.as_std_path()) {
            Ok(file) if path.is_file() => Ok(Box::new(file)),
            Ok(_) => Err(BundleError::NotFound {
                name: name.to_owned(),
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Err(BundleError::NotFound {
                name: name.to_owned(),
            }),
            Err(source) => Err(BundleError::Io {
                name: name.to_owned(),
                source,
            }),
        }
    }
}

/// In-memory bundle that counts how often resources are opened.
#[derive(Debug, Default)]
pub struct MemoryBundle {
    resources: HashMap<String, Arc<[u8]>>,
    opened: AtomicUsize,
}

impl MemoryBundle {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource, replacing any previous content under `name`.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, bytes: impl AsRef<[u8]>) -> Self {
        self.resources.insert(name.into(), Arc::from(bytes.as_ref()));
        self
    }

    /// Number of successful `open_resource` calls so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Bundle for MemoryBundle {
    fn open_resource(&self, name: &str) -> Result<ResourceStream, BundleError> {
        let bytes = self
            .resources
            .get(name)
            .cloned()
            .ok_or_else(|| BundleError::NotFound {
                name: name.to_owned(),
            })?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(bytes)))
    }
}
