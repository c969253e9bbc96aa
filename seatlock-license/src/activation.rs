//! Persisted activation state.
//!
//! The record is a copy of the last token that passed full verification,
//! stored as a token file so it can be verified again on every start. The
//! store never deletes it on its own.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{LicenseError, LicenseResult};
use crate::token::Token;

/// File name of the record inside the application data directory.
pub const ACTIVATION_FILE_NAME: &str = "activation.json";

const APP_DIR_NAME: &str = "seatlock";

/// File name used directly in the temp directory when no data directory exists.
const TEMP_FILE_NAME: &str = "seatlock_activation.json";

/// Durable storage for one activation record at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationStore {
    path: PathBuf,
}

impl ActivationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store at [`ActivationStore::default_path`].
    pub fn at_default_location() -> Self {
        Self::new(Self::default_path())
    }

    /// `<local data dir>/seatlock/activation.json`, or the temp directory
    /// when the platform has no data directory.
    pub fn default_path() -> PathBuf {
        match dirs::data_local_dir() {
            Some(dir) => dir.join(APP_DIR_NAME).join(ACTIVATION_FILE_NAME),
            None => std::env::temp_dir().join(TEMP_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically writes `token` as the activation record.
    ///
    /// The bytes go to a temp file in the target directory, are synced, get
    /// owner-only permissions, and are then renamed over the record. Readers
    /// see either the old record or the new one.
    pub fn persist(&self, token: &Token) -> LicenseResult<()> {
        let bytes = token.to_json_pretty()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        restrict_to_owner(tmp.as_file())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| LicenseError::Io(e.error))?;

        debug!(path = %self.path.display(), "activation record written");
        Ok(())
    }

    /// True if a record exists. Says nothing about whether it is still valid;
    /// see [`crate::TokenVerifier::activation_status`] for that.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the raw record, or `None` if there is none.
    pub fn load(&self) -> LicenseResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the record. Returns false if there was nothing to remove.
    pub fn clear(&self) -> LicenseResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "activation record removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_to_owner(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_file: &File) -> io::Result<()> {
    Ok(())
}
