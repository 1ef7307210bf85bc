//! Credential persistence on the local filesystem.
//!
//! The credential is stored as a JSON document whose shape matches
//! [`Credential`]. The file holds a bearer token, so on Unix it is created
//! with owner-only permissions (`0600`).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::auth::tokens::Credential;
use crate::error::{AppError, Result};

/// File-backed credential storage.
///
/// Provides methods to save, load, and delete the credential at a
/// configured path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store for the credential file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the credential file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves the credential, replacing any previous one.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if the directory or file cannot be written.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Persistence(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(credential)?;
        write_private(&self.path, &json)
            .map_err(|e| AppError::Persistence(format!("{}: {e}", self.path.display())))?;

        tracing::debug!(path = %self.path.display(), "Credential saved");
        Ok(())
    }

    /// Loads the credential.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CredentialNotFound`] if no file exists and
    /// [`AppError::Decode`] if the contents are malformed or incomplete.
    /// Callers recover from both by asking the user to log in again.
    pub fn load(&self) -> Result<Credential> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::CredentialNotFound)
            },
            Err(e) => return Err(e.into()),
        };

        let credential: Credential = serde_json::from_str(&contents)
            .map_err(|e| AppError::Decode(format!("stored credential: {e}")))?;
        credential.validate()?;

        Ok(credential)
    }

    /// Deletes the stored credential.
    ///
    /// Returns `true` if a file was removed, `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if the file exists but cannot be removed.
    pub fn delete(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Persistence(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Checks whether a credential file is present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}
