//! # Tracing Setup
//!
//! `RUST_LOG` wins when set; otherwise the configured filter applies.
//!
//! ```bash
//! RUST_LOG=ledger_engine=trace cargo run -p ledger-engine --bin seed
//! ```

use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.
///
/// Returns `false` if a subscriber was already installed (tests, embedding
/// applications), leaving that one in place.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
