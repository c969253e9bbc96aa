//! RSA key loading and RSA-PSS signing/verification.
//!
//! Keys are PEM encoded. The public half is PKIX (SubjectPublicKeyInfo); the
//! private half is PKCS#8, with PKCS#1 accepted as a fallback. Signatures are
//! RSASSA-PSS over SHA-256 with a salt as long as the digest (32 bytes).

use std::fmt;
use std::path::Path;

use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{LicenseError, LicenseResult};

/// Smallest accepted modulus, in bits.
pub const MIN_KEY_BITS: usize = 2048;

/// Issuer public key compiled into verifying builds.
const ISSUER_PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAnD35RdK9k7bibWkIN3Z1
6cChDi6LAOaIIXstlCVC0JB0Kp28aeHngmDjtMG3hvpeZLtlVaTjFbJSjCr+IpWh
0bAL8R1yPOU4Mb1elJbwMeCSEIdxYKZlfGutrFmYXsU8rO1DzgQ+pTDbvj/tcx0p
qVjd+0GSNnSCBFBHFwoY8R/PVvJD1aejB6gwsIHU/ptNZir2dLJ3CNyldDv7AUVG
0XOVhwl1rugVRztQnFD5FDdris1Uvawcfz8ontC86d6ZstD+EUJQIQahkDOEZaie
Dx/xyKWzfhYXfgmJJufabi9Y0exHt8uHzWbznBW1UE2UaRVvkuIOnkwnCKRIizbu
4QIDAQAB
-----END PUBLIC KEY-----
";

/// RSA private key held by the issuer.
pub struct IssuerPrivateKey(RsaPrivateKey);

/// RSA public key held by verifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerPublicKey(RsaPublicKey);

impl IssuerPrivateKey {
    /// Parses a PEM private key, trying PKCS#8 first and PKCS#1 second.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Key`] if neither encoding parses as RSA or the
    /// modulus is below [`MIN_KEY_BITS`].
    pub fn from_pem(pem: &str) -> LicenseResult<Self> {
        let key = match RsaPrivateKey::from_pkcs8_pem(pem) {
            Ok(key) => key,
            Err(pkcs8_err) => RsaPrivateKey::from_pkcs1_pem(pem).map_err(|_| {
                LicenseError::Key(format!("not an RSA private key: {pkcs8_err}"))
            })?,
        };
        check_modulus_bits(key.n().bits())?;
        Ok(Self(key))
    }

    /// Reads and parses a PEM private key file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn public_key(&self) -> IssuerPublicKey {
        IssuerPublicKey(self.0.to_public_key())
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.0.n().bits()
    }

    /// Hashes `message` with SHA-256 and signs it with RSA-PSS.
    pub(crate) fn sign_pss(&self, message: &[u8]) -> LicenseResult<Vec<u8>> {
        let signing_key = BlindedSigningKey::<Sha256>::new(self.0.clone());
        let signature = signing_key
            .try_sign_with_rng(&mut OsRng, message)
            .map_err(|e| LicenseError::Signing(e.to_string()))?;
        Ok(signature.to_vec())
    }
}

impl fmt::Debug for IssuerPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerPrivateKey")
            .field("bits", &self.bits())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl IssuerPublicKey {
    /// Parses a PKIX PEM public key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Key`] if the PEM is not an RSA
    /// SubjectPublicKeyInfo or the modulus is below [`MIN_KEY_BITS`].
    pub fn from_pem(pem: &str) -> LicenseResult<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| LicenseError::Key(format!("not an RSA public key: {e}")))?;
        check_modulus_bits(key.n().bits())?;
        Ok(Self(key))
    }

    /// Reads and parses a PEM public key file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    /// The issuer key compiled into this build.
    pub fn embedded() -> LicenseResult<Self> {
        Self::from_pem(ISSUER_PUBLIC_KEY_PEM)
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.0.n().bits()
    }

    /// Verifies an RSA-PSS signature over `message`.
    ///
    /// Every failure, including a signature of the wrong length, collapses
    /// into [`LicenseError::SignatureInvalid`].
    pub(crate) fn verify_pss(&self, message: &[u8], signature: &[u8]) -> LicenseResult<()> {
        let signature =
            Signature::try_from(signature).map_err(|_| LicenseError::SignatureInvalid)?;
        VerifyingKey::<Sha256>::new(self.0.clone())
            .verify(message, &signature)
            .map_err(|_| LicenseError::SignatureInvalid)
    }
}

fn check_modulus_bits(bits: usize) -> LicenseResult<()> {
    if bits < MIN_KEY_BITS {
        return Err(LicenseError::Key(format!(
            "RSA modulus is {bits} bits, minimum is {MIN_KEY_BITS}"
        )));
    }
    Ok(())
}
