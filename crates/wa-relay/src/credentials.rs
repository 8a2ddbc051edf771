//! Credential directory handling.
//!
//! The directory content belongs to the messaging bridge. The relay only makes
//! sure it exists before a session opens and wipes it on reset.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::RelayError;

/// Location of the persisted session credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// Relative paths resolve against the current directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_relative() {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        } else {
            root
        };
        Self { root }
    }

    /// Directory handed to the transport.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory if needed so the bridge can load or create credentials.
    pub fn ensure(&self) -> Result<(), RelayError> {
        std::fs::create_dir_all(&self.root).map_err(|err| {
            RelayError::Credentials(format!("create {}: {err}", self.root.display()).into())
        })
    }

    /// Deletes the directory and everything in it. Missing is not an error.
    pub fn clear(&self) -> Result<(), RelayError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RelayError::Credentials(
                format!("remove {}: {err}", self.root.display()).into(),
            )),
        }
    }
}
