pub mod config;
pub mod models;
pub mod pipeline; // Guardrail, gateway, response parsing, turn control
pub mod triage; // Layered sessions + service registry

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber, logging to stderr.
///
/// `RUST_LOG` wins when set; otherwise `fallback_filter` applies. Calling this
/// more than once is harmless.
pub fn init_tracing(fallback_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
