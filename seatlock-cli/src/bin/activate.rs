//! Activation tool for the licensed machine.
//!
//! Usage:
//!   seatlock-activate token.json
//!   seatlock-activate
//!   seatlock-activate --machine-id
//!
//! Without a token it only reports whether the stored activation still holds.
//! Tokens must be issued for this binary's own hash.
//!
//! Exits non-zero when the token is rejected; nothing is recorded in that case.

use anyhow::Result;
use clap::Parser;
use seatlock_cli::{activate, init_tracing};

fn main() -> Result<()> {
    let args = activate::ActivateArgs::parse();
    init_tracing(args.verbose);

    let outcome = activate::run(&args)?;
    println!("{outcome}");
    Ok(())
}
