//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
///
/// Messages name the offending field but never include key material,
/// signature bytes, or identity values read from the local machine.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Private or public key could not be parsed, is not RSA, or is too small.
    #[error("key error: {0}")]
    Key(String),

    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Token bytes are not a well-formed token.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// RSA-PSS verification failed or the signature is not valid base64.
    #[error("token signature invalid")]
    SignatureInvalid,

    /// The token's expiry instant has been reached.
    #[error("token expired at {0}")]
    Expired(String),

    /// The running executable is not the build the token was issued for.
    #[error("program fingerprint does not match token field `program_hash`")]
    FingerprintMismatch,

    /// The token is bound to a different machine.
    #[error("machine identity does not match token field `machine_id`")]
    MachineMismatch,

    /// No machine identity strategy produced a value.
    #[error("machine identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// Filesystem error (fingerprinting, token files, activation record).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LicenseError {
    /// Returns the discriminant of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Key(_) => ErrorKind::Key,
            Self::Signing(_) => ErrorKind::Signing,
            Self::MalformedToken(_) => ErrorKind::MalformedToken,
            Self::SignatureInvalid => ErrorKind::SignatureInvalid,
            Self::Expired(_) => ErrorKind::Expired,
            Self::FingerprintMismatch => ErrorKind::FingerprintMismatch,
            Self::MachineMismatch => ErrorKind::MachineMismatch,
            Self::IdentityUnavailable(_) => ErrorKind::IdentityUnavailable,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns true if the user has to obtain a different token.
    #[must_use]
    pub fn requires_new_token(&self) -> bool {
        self.kind().requires_new_token()
    }

    /// Returns true if the failure came from the local environment and may be retried.
    #[must_use]
    pub fn is_environmental(&self) -> bool {
        self.kind().is_environmental()
    }
}

/// Fieldless mirror of [`LicenseError`], for matching and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Key,
    Signing,
    MalformedToken,
    SignatureInvalid,
    Expired,
    FingerprintMismatch,
    MachineMismatch,
    IdentityUnavailable,
    Io,
}

impl ErrorKind {
    /// Token-side failures: retrying with the same token can never succeed.
    #[must_use]
    pub fn requires_new_token(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken
                | Self::SignatureInvalid
                | Self::Expired
                | Self::FingerprintMismatch
                | Self::MachineMismatch
        )
    }

    /// Host-side failures that may be transient.
    #[must_use]
    pub fn is_environmental(&self) -> bool {
        matches!(self, Self::IdentityUnavailable | Self::Io)
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
