//! Machine-bound, time-limited activation tokens.
//!
//! This crate handles:
//! - Issuing tokens: RSA-PSS signatures over a canonical payload
//! - Offline verification: signature, expiry, program fingerprint, machine identity
//! - Activation state: an atomically written, re-verifiable local record
//! - Machine identity strategies per platform
//!
//! # Token Format
//!
//! A token is a JSON object with the string fields `machine_id`,
//! `program_hash`, `expiry` (RFC3339), `extra`, and `signature` (base64).
//! The signature is RSASSA-PSS/SHA-256 (salt = 32 bytes) over the compact
//! JSON of all five fields with `signature` set to `""`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use seatlock_license::{
//!     platform_identity_provider, ActivationStore, CurrentExecutable, IssuerPublicKey,
//!     TokenVerifier,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = TokenVerifier::new(
//!     IssuerPublicKey::embedded()?,
//!     Arc::new(platform_identity_provider()),
//!     Arc::new(CurrentExecutable),
//!     ActivationStore::at_default_location(),
//! );
//!
//! if !verifier.activation_status().is_active() {
//!     let token = std::fs::read("token.json")?;
//!     verifier.verify(&token)?;
//! }
//! # Ok(())
//! # }
//! ```

mod activation;
mod canonical;
mod error;
mod fingerprint;
mod identity;
mod key;
mod signer;
mod token;
mod verifier;

pub use activation::{ActivationStore, ACTIVATION_FILE_NAME};
pub use canonical::canonical_payload;
pub use error::{ErrorKind, LicenseError, LicenseResult};
pub use fingerprint::{
    sha256_file, sha256_hex, CurrentExecutable, ExecutableFile, FixedFingerprint,
    ProgramFingerprintProvider,
};
pub use identity::{
    platform_identity_provider, FallbackChain, FixedIdentity, MacAddress, MachineIdFile,
    MachineIdentityProvider, PlatformUuid, WindowsMachineGuid,
};
pub use key::{IssuerPrivateKey, IssuerPublicKey, MIN_KEY_BITS};
pub use signer::{ActivationParams, TokenSigner};
pub use token::Token;
pub use verifier::{verify_token, ActivationStatus, TokenVerifier};
