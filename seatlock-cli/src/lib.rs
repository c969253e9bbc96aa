//! Shared argument types and entry points for the seatlock binaries.
//!
//! - `seatlock-sign` runs on the issuer's machine and writes token files.
//! - `seatlock-activate` runs on the licensed machine and activates itself;
//!   its own executable is the program the token is bound to.
//!
//! Both binaries are thin wrappers: parse arguments, install logging, call
//! [`sign::run`] or [`activate::run`], print the outcome.

pub mod activate;
pub mod sign;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber: compact lines on stderr, no targets.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
