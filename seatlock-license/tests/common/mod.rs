//! Shared test helpers for license tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use seatlock_license::{
    sha256_hex, ActivationParams, ActivationStore, IssuerPublicKey, LicenseError, LicenseResult,
    MachineIdentityProvider, ProgramFingerprintProvider, TokenSigner, TokenVerifier,
};
use tempfile::TempDir;

pub const ISSUER_PKCS8_PEM: &str = include_str!("../fixtures/issuer_pkcs8.pem");
pub const ISSUER_PKCS1_PEM: &str = include_str!("../fixtures/issuer_pkcs1.pem");
pub const ISSUER_PUB_PEM: &str = include_str!("../fixtures/issuer_pub.pem");
pub const OTHER_PKCS8_PEM: &str = include_str!("../fixtures/other_pkcs8.pem");
pub const OTHER_PUB_PEM: &str = include_str!("../fixtures/other_pub.pem");
pub const WEAK_PKCS8_PEM: &str = include_str!("../fixtures/weak_1024.pem");
pub const WEAK_PUB_PEM: &str = include_str!("../fixtures/weak_1024_pub.pem");
pub const ED25519_PEM: &str = include_str!("../fixtures/ed25519.pem");

/// Token signed by openssl (PSS, salt 32) over HTML-safe escaped canonical
/// bytes, as an external issuer produces them.
pub const INTEROP_TOKEN: &str = include_str!("../fixtures/interop_token.json");
pub const INTEROP_MACHINE_ID: &str = "82:ff:d9:2d:e2:dd";
pub const INTEROP_PROGRAM_HASH: &str =
    "856106cbbc7cac9da7debebce1a86b6892764eb2049faa942bfee174d3b3515f";

pub const MACHINE_ID: &str = "AA:BB:CC";
pub const PROGRAM_IMAGE: &[u8] = b"seatlock test program image v1";
pub const FAR_FUTURE: &str = "2099-01-01T00:00:00Z";
pub const LONG_AGO: &str = "2000-01-01T00:00:00Z";

/// The fixture signer, parsed once per test binary.
pub fn signer() -> &'static TokenSigner {
    static SIGNER: OnceLock<TokenSigner> = OnceLock::new();
    SIGNER.get_or_init(|| TokenSigner::from_pem(ISSUER_PKCS8_PEM).unwrap())
}

pub fn issuer_public_key() -> IssuerPublicKey {
    IssuerPublicKey::from_pem(ISSUER_PUB_PEM).unwrap()
}

pub fn program_hash() -> String {
    sha256_hex(PROGRAM_IMAGE)
}

pub fn params_expiring(expiry: &str) -> ActivationParams {
    ActivationParams::new(MACHINE_ID, program_hash(), expiry).with_extra("seats=1")
}

/// Signs `params` with the fixture key and returns token file bytes.
pub fn signed_token_bytes(params: &ActivationParams) -> Vec<u8> {
    signer().sign(params).unwrap().to_json_pretty().unwrap()
}

/// Rewrites one string field of a token file, leaving the signature alone.
pub fn with_field(token_bytes: &[u8], field: &str, f: impl FnOnce(&str) -> String) -> Vec<u8> {
    let mut value: serde_json::Value = serde_json::from_slice(token_bytes).unwrap();
    let current = value[field].as_str().unwrap().to_string();
    value[field] = serde_json::Value::String(f(&current));
    serde_json::to_vec_pretty(&value).unwrap()
}

/// A store inside a fresh temp directory. Keep the `TempDir` alive.
pub fn temp_store() -> (TempDir, ActivationStore) {
    let dir = TempDir::new().unwrap();
    let store = ActivationStore::new(dir.path().join("activation.json"));
    (dir, store)
}

/// Identity provider that counts how often it is consulted.
pub struct CountingIdentity {
    id: Option<String>,
    calls: AtomicUsize,
}

impl CountingIdentity {
    pub fn returning(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: Some(id.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            id: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MachineIdentityProvider for CountingIdentity {
    fn identify(&self) -> LicenseResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.id
            .clone()
            .ok_or_else(|| LicenseError::IdentityUnavailable("no probe succeeded".into()))
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Fingerprint provider that counts how often it is consulted.
pub struct CountingFingerprint {
    hash: String,
    calls: AtomicUsize,
}

impl CountingFingerprint {
    pub fn returning(hash: &str) -> Arc<Self> {
        Arc::new(Self {
            hash: hash.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProgramFingerprintProvider for CountingFingerprint {
    fn fingerprint(&self) -> LicenseResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hash.clone())
    }
}

/// Everything a verification test needs, with handles on the providers.
pub struct Harness {
    pub dir: TempDir,
    pub identity: Arc<CountingIdentity>,
    pub fingerprint: Arc<CountingFingerprint>,
    pub verifier: TokenVerifier,
}

impl Harness {
    pub fn new(machine_id: &str, program_hash: &str) -> Self {
        Self::with_identity(CountingIdentity::returning(machine_id), program_hash)
    }

    pub fn with_identity(identity: Arc<CountingIdentity>, program_hash: &str) -> Self {
        let (dir, store) = temp_store();
        let fingerprint = CountingFingerprint::returning(program_hash);
        let verifier = TokenVerifier::new(
            issuer_public_key(),
            identity.clone(),
            fingerprint.clone(),
            store,
        );
        Self {
            dir,
            identity,
            fingerprint,
            verifier,
        }
    }

    /// Providers that match [`params_expiring`].
    pub fn matching() -> Self {
        Self::new(MACHINE_ID, &program_hash())
    }

    pub fn is_activated(&self) -> bool {
        self.verifier.store().is_activated()
    }
}
