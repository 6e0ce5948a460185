//! Filesystem capabilities used by staging.

use std::fs::{self, File};
use std::io::{self, Write};

use camino::Utf8Path;

/// Writable byte sink for a staged file.
pub type FileSink = Box<dyn Write + Send>;

/// Filesystem primitives the stager relies on.
pub trait Filesystem: Send + Sync {
    /// Reports whether `path` exists.
    fn exists(&self, path: &Utf8Path) -> io::Result<bool>;

    /// Creates `path` and any missing parents.
    fn create_dir_all(&self, path: &Utf8Path) -> io::Result<()>;

    /// Creates (or truncates) the file at `path` for writing.
    fn create_file(&self, path: &Utf8Path) -> io::Result<FileSink>;

    /// Removes the file at `path`.
    fn remove_file(&self, path: &Utf8Path) -> io::Result<()>;
}

/// Filesystem backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    fn exists(&self, path: &Utf8Path) -> io::Result<bool> {
        path.as_std_path().try_exists()
    }

    fn create_dir_all(&self, path: &Utf8Path) -> io::Result<()> {
        fs::create_dir_all(path.as_std_path())
    }

    fn create_file(&self, path: &Utf8Path) -> io::Result<FileSink> {
        let file = File::create(path.as_std_path())?;
        Ok(Box::new(file))
    }

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        fs::remove_file(path.as_std_path())
    }
}
