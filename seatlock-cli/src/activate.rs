//! `seatlock-activate`: verify a token on this machine and record the activation.
//!
//! The program fingerprint checked here is the SHA-256 of the executable
//! running the verification, i.e. `seatlock-activate` itself. Tokens for it
//! are issued with `seatlock-sign --program <path to seatlock-activate>`. An
//! application that embeds [`TokenVerifier`] with
//! [`seatlock_license::CurrentExecutable`] is issued tokens for its own binary
//! instead.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use seatlock_license::{
    platform_identity_provider, ActivationStatus, ActivationStore, CurrentExecutable,
    IssuerPublicKey, MachineIdentityProvider, TokenVerifier,
};
use tracing::{debug, info};

/// Overrides [`ActivationStore::default_path`] when set.
pub const ACTIVATION_FILE_ENV: &str = "SEATLOCK_ACTIVATION_FILE";

#[derive(Parser, Debug)]
#[command(name = "seatlock-activate")]
#[command(about = "Activate this machine with a signed token")]
pub struct ActivateArgs {
    /// Token file issued for this machine; not needed once activated
    pub token: Option<PathBuf>,

    /// Issuer public key (PKIX PEM); defaults to the key built into this binary
    #[arg(long)]
    pub public_key: Option<PathBuf>,

    /// Print this machine's identity and exit
    #[arg(long)]
    pub machine_id: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The stored activation still verifies; the token argument was not read.
    AlreadyActivated { expiry: String },
    /// The token verified and was persisted.
    Activated { expiry: String },
    /// `--machine-id` was given.
    MachineIdentity { id: String, provider: &'static str },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActivated { expiry } => {
                write!(f, "already activated (valid until {expiry})")
            }
            Self::Activated { expiry } => write!(f, "activation successful (valid until {expiry})"),
            Self::MachineIdentity { id, provider } => write!(f, "{id} ({provider})"),
        }
    }
}

/// Runs the binary against the real host.
pub fn run(args: &ActivateArgs) -> Result<Outcome> {
    let identity = platform_identity_provider();
    debug!(providers = ?identity.provider_names(), "identity chain");

    if args.machine_id {
        let (id, provider) = identity
            .identify_with_source()
            .context("could not determine this machine's identity")?;
        return Ok(Outcome::MachineIdentity { id, provider });
    }

    run_on(
        args,
        Arc::new(identity),
        store_from_env(std::env::var_os(ACTIVATION_FILE_ENV)),
    )
}

/// [`run`] with the machine identity and store supplied by the caller.
///
/// The fingerprint is always taken from the running executable.
pub fn run_on(
    args: &ActivateArgs,
    identity: Arc<dyn MachineIdentityProvider>,
    store: ActivationStore,
) -> Result<Outcome> {
    let verifier = TokenVerifier::new(
        load_public_key(args.public_key.as_deref())?,
        identity,
        Arc::new(CurrentExecutable),
        store,
    );
    activate(&verifier, args.token.as_deref())
}

/// Short-circuits when the stored activation still verifies, otherwise
/// verifies and persists the token at `token_path`.
pub fn activate(verifier: &TokenVerifier, token_path: Option<&Path>) -> Result<Outcome> {
    match verifier.activation_status() {
        ActivationStatus::Active { expiry } => return Ok(Outcome::AlreadyActivated { expiry }),
        ActivationStatus::Invalid { kind } => {
            info!(?kind, "stored activation no longer valid");
        }
        ActivationStatus::NotActivated => {}
    }

    let path = token_path.context("this machine is not activated and no token was given")?;
    let bytes =
        fs::read(path).with_context(|| format!("failed to read token {}", path.display()))?;
    let token = verifier.verify(&bytes).context("activation failed")?;

    Ok(Outcome::Activated {
        expiry: token.expiry().to_string(),
    })
}

/// The issuer key from `path`, or the embedded one.
pub fn load_public_key(path: Option<&Path>) -> Result<IssuerPublicKey> {
    match path {
        Some(path) => IssuerPublicKey::from_pem_file(path)
            .with_context(|| format!("failed to load public key {}", path.display())),
        None => IssuerPublicKey::embedded().context("embedded issuer key is invalid"),
    }
}

/// The store at `value` if non-empty, else the default location.
pub fn store_from_env(value: Option<OsString>) -> ActivationStore {
    match value {
        Some(path) if !path.is_empty() => ActivationStore::new(path),
        _ => ActivationStore::at_default_location(),
    }
}
