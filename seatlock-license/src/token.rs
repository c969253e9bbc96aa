//! The activation token and its file format.
//!
//! A token file is a JSON object with exactly five string fields:
//!
//! ```json
//! {
//!   "machine_id": "82:ff:d9:2d:e2:dd",
//!   "program_hash": "856106cb...3515f",
//!   "expiry": "2026-12-31T23:59:59Z",
//!   "extra": "",
//!   "signature": "<base64>"
//! }
//! ```
//!
//! The signature covers [`Token::canonical_payload`], never the file bytes.

use std::fmt;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::canonical_payload;
use crate::error::{LicenseError, LicenseResult};
use crate::signer::ActivationParams;

/// A signed activation token. Immutable once constructed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Token {
    machine_id: String,
    program_hash: String,
    expiry: String,
    extra: String,
    signature: String,
}

impl Token {
    pub(crate) fn from_params(params: &ActivationParams, signature: String) -> Self {
        Self {
            machine_id: params.machine_id.clone(),
            program_hash: params.program_hash.clone(),
            expiry: params.expiry.clone(),
            extra: params.extra.clone(),
            signature,
        }
    }

    /// Parses token file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::MalformedToken`] if the bytes are not a JSON
    /// object with exactly the five token fields.
    pub fn from_json(bytes: &[u8]) -> LicenseResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| LicenseError::MalformedToken(e.to_string()))
    }

    /// Reads and parses a token file.
    pub fn from_file(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    /// Serializes the token as two-space indented JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> LicenseResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self).map_err(std::io::Error::from)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Returns the bytes the signature is computed over.
    pub fn canonical_payload(&self) -> LicenseResult<Vec<u8>> {
        canonical_payload(
            &self.machine_id,
            &self.program_hash,
            &self.expiry,
            &self.extra,
        )
    }

    /// Decodes the base64 signature.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::SignatureInvalid`] if the field is not standard base64.
    pub fn signature_bytes(&self) -> LicenseResult<Vec<u8>> {
        BASE64
            .decode(self.signature.as_bytes())
            .map_err(|_| LicenseError::SignatureInvalid)
    }

    /// Parses the RFC3339 expiry.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::MalformedToken`] if `expiry` is not RFC3339.
    pub fn expires_at(&self) -> LicenseResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expiry)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| LicenseError::MalformedToken(format!("field `expiry`: {e}")))
    }

    /// Returns true if `now` is at or past the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> LicenseResult<bool> {
        Ok(now >= self.expires_at()?)
    }

    #[must_use]
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    #[must_use]
    pub fn program_hash(&self) -> &str {
        &self.program_hash
    }

    #[must_use]
    pub fn expiry(&self) -> &str {
        &self.expiry
    }

    #[must_use]
    pub fn extra(&self) -> &str {
        &self.extra
    }

    /// Returns the base64 signature string.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("machine_id", &self.machine_id)
            .field("program_hash", &self.program_hash)
            .field("expiry", &self.expiry)
            .field("extra", &self.extra)
            .field("signature", &"[REDACTED]")
            .finish()
    }
}
