//! `seatlock-sign`: issue a token for one machine and one program build.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use clap::{ArgGroup, Parser};
use seatlock_license::{sha256_file, ActivationParams, Token, TokenSigner};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "seatlock-sign")]
#[command(about = "Issue a machine-bound, time-limited activation token")]
#[command(group(
    ArgGroup::new("program_source")
        .required(true)
        .args(["program_hash", "program"])
))]
pub struct SignArgs {
    /// Issuer private key (PKCS#8 or PKCS#1 PEM)
    #[arg(long = "private", default_value = "private.pem")]
    pub private_key: PathBuf,

    /// Identity of the target machine, as printed by `seatlock-activate --machine-id`
    #[arg(long, value_parser = parse_machine_id)]
    pub machine_id: String,

    /// Hex SHA-256 of the executable that will run the verification
    #[arg(long, value_parser = parse_program_hash)]
    pub program_hash: Option<String>,

    /// Executable that will run the verification (`seatlock-activate`, or an
    /// application embedding the verifier), hashed instead of --program-hash
    #[arg(long)]
    pub program: Option<PathBuf>,

    /// RFC3339 instant at which the token stops being valid
    #[arg(long, value_parser = parse_expiry)]
    pub expiry: String,

    /// Opaque data carried in the token
    #[arg(long, default_value = "")]
    pub extra: String,

    /// Where to write the token file
    #[arg(short, long, default_value = "token.json")]
    pub out: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Signs the token described by `args` and writes it to `args.out`.
pub fn run(args: &SignArgs) -> Result<Token> {
    let signer = TokenSigner::from_pem_file(&args.private_key).with_context(|| {
        format!("failed to load private key {}", args.private_key.display())
    })?;

    let program_hash = match (&args.program_hash, &args.program) {
        (Some(hash), _) => hash.clone(),
        (None, Some(program)) => sha256_file(program)
            .with_context(|| format!("failed to hash {}", program.display()))?,
        (None, None) => bail!("one of --program-hash or --program is required"),
    };

    let params = ActivationParams::new(args.machine_id.clone(), program_hash, args.expiry.clone())
        .with_extra(args.extra.clone());
    let token = signer.sign(&params).context("failed to sign token")?;

    fs::write(&args.out, token.to_json_pretty()?)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    info!(out = %args.out.display(), expiry = %token.expiry(), "token written");

    Ok(token)
}

fn parse_machine_id(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("machine id must not be empty".to_string());
    }
    Ok(s.to_string())
}

/// Accepts 64 hex digits in either case and normalises to lowercase.
fn parse_program_hash(s: &str) -> Result<String, String> {
    if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("expected 64 hex characters (SHA-256)".to_string());
    }
    Ok(s.to_ascii_lowercase())
}

/// Checks the value is RFC3339 but keeps it verbatim; the string is what gets signed.
fn parse_expiry(s: &str) -> Result<String, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|_| s.to_string())
        .map_err(|e| format!("expected an RFC3339 timestamp: {e}"))
}
