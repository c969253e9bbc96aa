//! Program fingerprinting.
//!
//! A fingerprint is the lowercase hex SHA-256 of an executable's bytes on
//! disk. The issuer hashes the binary it distributes; the verifier hashes
//! itself. Any rebuild changes the value.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::LicenseResult;

/// Source of the local program fingerprint.
pub trait ProgramFingerprintProvider: Send + Sync {
    /// Returns the lowercase hex SHA-256 of the program image.
    fn fingerprint(&self) -> LicenseResult<String>;
}

/// Hashes the executable of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentExecutable;

impl ProgramFingerprintProvider for CurrentExecutable {
    fn fingerprint(&self) -> LicenseResult<String> {
        let exe = std::env::current_exe()?;
        sha256_file(exe)
    }
}

/// Hashes a specific executable file, e.g. a build about to be shipped.
#[derive(Debug, Clone)]
pub struct ExecutableFile {
    path: PathBuf,
}

impl ExecutableFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgramFingerprintProvider for ExecutableFile {
    fn fingerprint(&self) -> LicenseResult<String> {
        sha256_file(&self.path)
    }
}

/// Returns a fixed value. For tests and issuer tooling.
#[derive(Debug, Clone)]
pub struct FixedFingerprint(String);

impl FixedFingerprint {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }
}

impl ProgramFingerprintProvider for FixedFingerprint {
    fn fingerprint(&self) -> LicenseResult<String> {
        Ok(self.0.clone())
    }
}

/// Streams a file through SHA-256 and returns the lowercase hex digest.
pub fn sha256_file(path: impl AsRef<Path>) -> LicenseResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex SHA-256 of an in-memory buffer.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
