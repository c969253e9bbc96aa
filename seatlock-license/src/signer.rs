//! Issuer side: build the canonical payload and sign it.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use crate::canonical::canonical_payload;
use crate::error::LicenseResult;
use crate::key::{IssuerPrivateKey, IssuerPublicKey};
use crate::token::Token;

/// What a token binds together. The four strings are signed verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParams {
    /// Identity of the machine the token is issued for.
    pub machine_id: String,
    /// Lowercase hex SHA-256 of the licensed executable.
    pub program_hash: String,
    /// RFC3339 instant at which the token stops being valid.
    pub expiry: String,
    /// Opaque issuer data.
    pub extra: String,
}

impl ActivationParams {
    pub fn new(
        machine_id: impl Into<String>,
        program_hash: impl Into<String>,
        expiry: impl Into<String>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            program_hash: program_hash.into(),
            expiry: expiry.into(),
            extra: String::new(),
        }
    }

    /// Sets the opaque `extra` payload.
    #[must_use]
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// The bytes a signature over these parameters covers.
    pub fn canonical_payload(&self) -> LicenseResult<Vec<u8>> {
        canonical_payload(
            &self.machine_id,
            &self.program_hash,
            &self.expiry,
            &self.extra,
        )
    }
}

/// Signs activation tokens with the issuer's private key.
#[derive(Debug)]
pub struct TokenSigner {
    key: IssuerPrivateKey,
}

impl TokenSigner {
    pub fn new(key: IssuerPrivateKey) -> Self {
        Self { key }
    }

    /// Loads the signing key from PEM text.
    pub fn from_pem(pem: &str) -> LicenseResult<Self> {
        IssuerPrivateKey::from_pem(pem).map(Self::new)
    }

    /// Loads the signing key from a PEM file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> LicenseResult<Self> {
        IssuerPrivateKey::from_pem_file(path).map(Self::new)
    }

    /// The public key verifiers need to accept this signer's tokens.
    #[must_use]
    pub fn public_key(&self) -> IssuerPublicKey {
        self.key.public_key()
    }

    /// Signs `params` and returns the finished token.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LicenseError::Signing`] if the RSA operation fails.
    pub fn sign(&self, params: &ActivationParams) -> LicenseResult<Token> {
        let payload = params.canonical_payload()?;
        let signature = self.key.sign_pss(&payload)?;
        debug!(
            payload_len = payload.len(),
            key_bits = self.key.bits(),
            "signed activation payload"
        );
        Ok(Token::from_params(params, BASE64.encode(signature)))
    }
}
