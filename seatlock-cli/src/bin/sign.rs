//! Issuer tool.
//!
//! Usage:
//!   seatlock-sign --machine-id 82:ff:d9:2d:e2:dd --program ./seatlock-activate \
//!       --expiry 2026-12-31T23:59:59Z --extra "seats=5"
//!
//! `--program` names the binary that performs the verification on the
//! licensed machine, since that is the executable whose hash is checked.
//!
//! Reads `private.pem` unless `--private` says otherwise and writes `token.json`.

use anyhow::Result;
use clap::Parser;
use seatlock_cli::{init_tracing, sign};

fn main() -> Result<()> {
    let args = sign::SignArgs::parse();
    init_tracing(args.verbose);

    let token = sign::run(&args)?;
    println!("token written to {}", args.out.display());
    println!("  machine:  {}", token.machine_id());
    println!("  program:  {}", token.program_hash());
    println!("  expires:  {}", token.expiry());
    Ok(())
}
