use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Source of directory grants.
///
/// A picker asks the user for a directory and either returns it or reports
/// why no grant was made (`PermissionDenied`, `Unsupported`,
/// `InsecureContext`).
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    async fn pick_directory(&self) -> Result<PathBuf>;
}

/// Picker for a directory chosen up front (command line or config).
pub struct FixedDirectoryPicker {
    path: Option<PathBuf>,
}

impl FixedDirectoryPicker {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DirectoryPicker for FixedDirectoryPicker {
    async fn pick_directory(&self) -> Result<PathBuf> {
        let path = self.path.clone().ok_or_else(|| {
            Error::Unsupported("no local directory was provided (use --root)".to_string())
        })?;

        // Listing the directory is the access check.
        match tokio::fs::read_dir(&path).await {
            Ok(_) => Ok(path),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(Error::PermissionDenied(
                format!("cannot read {}", path.display()),
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::InvalidRepository(format!(
                "{} does not exist",
                path.display()
            ))),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
