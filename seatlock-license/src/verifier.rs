//! Verifier side: the activation check sequence.
//!
//! The steps run in a fixed order and stop at the first failure:
//!
//! 1. parse the token
//! 2. verify the signature over the canonical payload
//! 3. expiry
//! 4. program fingerprint
//! 5. machine identity
//!
//! Nothing read from the token is acted on before step 2 succeeds. Only when
//! all five pass is the activation record written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::activation::ActivationStore;
use crate::error::{ErrorKind, LicenseError, LicenseResult};
use crate::fingerprint::ProgramFingerprintProvider;
use crate::identity::MachineIdentityProvider;
use crate::key::IssuerPublicKey;
use crate::token::Token;

/// State of the persisted activation after re-verifying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationStatus {
    /// A record exists and passes every check.
    Active {
        /// RFC3339 expiry of the stored token.
        expiry: String,
    },
    /// No record has been persisted.
    NotActivated,
    /// A record exists but no longer verifies (expired, moved to another
    /// machine, program rebuilt, corrupted, unreadable).
    Invalid {
        /// Why it was rejected.
        kind: ErrorKind,
    },
}

impl ActivationStatus {
    /// Returns true if the program may run as activated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Verifies tokens against one issuer key and the local machine.
#[derive(Clone)]
pub struct TokenVerifier {
    public_key: IssuerPublicKey,
    identity: Arc<dyn MachineIdentityProvider>,
    fingerprint: Arc<dyn ProgramFingerprintProvider>,
    store: ActivationStore,
}

impl TokenVerifier {
    pub fn new(
        public_key: IssuerPublicKey,
        identity: Arc<dyn MachineIdentityProvider>,
        fingerprint: Arc<dyn ProgramFingerprintProvider>,
        store: ActivationStore,
    ) -> Self {
        Self {
            public_key,
            identity,
            fingerprint,
            store,
        }
    }

    pub fn public_key(&self) -> &IssuerPublicKey {
        &self.public_key
    }

    pub fn store(&self) -> &ActivationStore {
        &self.store
    }

    /// Runs the full sequence and persists the activation on success.
    pub fn verify(&self, token_bytes: &[u8]) -> LicenseResult<Token> {
        self.verify_at(token_bytes, Utc::now())
    }

    /// [`TokenVerifier::verify`] with an explicit current instant.
    pub fn verify_at(&self, token_bytes: &[u8], now: DateTime<Utc>) -> LicenseResult<Token> {
        verify_and_persist(
            token_bytes,
            now,
            &self.public_key,
            self.identity.as_ref(),
            self.fingerprint.as_ref(),
            &self.store,
        )
    }

    /// Runs every check but does not touch the activation record.
    pub fn check(&self, token_bytes: &[u8]) -> LicenseResult<Token> {
        self.check_at(token_bytes, Utc::now())
    }

    /// [`TokenVerifier::check`] with an explicit current instant.
    pub fn check_at(&self, token_bytes: &[u8], now: DateTime<Utc>) -> LicenseResult<Token> {
        run_checks(
            token_bytes,
            now,
            &self.public_key,
            self.identity.as_ref(),
            self.fingerprint.as_ref(),
        )
    }

    /// Re-verifies the persisted record.
    ///
    /// Presence alone is not trusted: a stored token that has since expired,
    /// or was copied from another machine, reports `Invalid`.
    pub fn activation_status(&self) -> ActivationStatus {
        self.activation_status_at(Utc::now())
    }

    /// [`TokenVerifier::activation_status`] with an explicit current instant.
    pub fn activation_status_at(&self, now: DateTime<Utc>) -> ActivationStatus {
        let bytes = match self.store.load() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return ActivationStatus::NotActivated,
            Err(e) => {
                warn!(kind = ?e.kind(), "activation record unreadable");
                return ActivationStatus::Invalid { kind: e.kind() };
            }
        };
        match self.check_at(&bytes, now) {
            Ok(token) => ActivationStatus::Active {
                expiry: token.expiry().to_string(),
            },
            Err(e) => ActivationStatus::Invalid { kind: e.kind() },
        }
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("key_bits", &self.public_key.bits())
            .field("identity", &self.identity.name())
            .field("store", &self.store)
            .finish()
    }
}

/// One-shot form of [`TokenVerifier::verify`].
pub fn verify_token(
    token_bytes: &[u8],
    public_key: &IssuerPublicKey,
    identity: &dyn MachineIdentityProvider,
    fingerprint: &dyn ProgramFingerprintProvider,
    store: &ActivationStore,
) -> LicenseResult<Token> {
    verify_and_persist(token_bytes, Utc::now(), public_key, identity, fingerprint, store)
}

fn verify_and_persist(
    token_bytes: &[u8],
    now: DateTime<Utc>,
    public_key: &IssuerPublicKey,
    identity: &dyn MachineIdentityProvider,
    fingerprint: &dyn ProgramFingerprintProvider,
    store: &ActivationStore,
) -> LicenseResult<Token> {
    let token = run_checks(token_bytes, now, public_key, identity, fingerprint)?;
    store.persist(&token)?;
    info!(expiry = %token.expiry(), "activation persisted");
    Ok(token)
}

fn run_checks(
    token_bytes: &[u8],
    now: DateTime<Utc>,
    public_key: &IssuerPublicKey,
    identity: &dyn MachineIdentityProvider,
    fingerprint: &dyn ProgramFingerprintProvider,
) -> LicenseResult<Token> {
    let result = checks_in_order(token_bytes, now, public_key, identity, fingerprint);
    if let Err(e) = &result {
        warn!(kind = ?e.kind(), "token rejected");
    }
    result
}

fn checks_in_order(
    token_bytes: &[u8],
    now: DateTime<Utc>,
    public_key: &IssuerPublicKey,
    identity: &dyn MachineIdentityProvider,
    fingerprint: &dyn ProgramFingerprintProvider,
) -> LicenseResult<Token> {
    let token = Token::from_json(token_bytes)?;

    let signature = token.signature_bytes()?;
    public_key.verify_pss(&token.canonical_payload()?, &signature)?;
    debug!("token signature valid");

    if token.is_expired_at(now)? {
        return Err(LicenseError::Expired(token.expiry().to_string()));
    }
    debug!("token not expired");

    if fingerprint.fingerprint()? != token.program_hash() {
        return Err(LicenseError::FingerprintMismatch);
    }
    debug!("program fingerprint matches");

    if identity.identify()? != token.machine_id() {
        return Err(LicenseError::MachineMismatch);
    }
    debug!(provider = identity.name(), "machine identity matches");

    Ok(token)
}
