//! Structured logging setup shared by the prompt library binaries.
//!
//! Library crates only emit `tracing` events. Binaries call [`init_tracing`]
//! once at startup to install a formatting subscriber filtered by `RUST_LOG`.

#![warn(missing_docs, clippy::pedantic)]

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the event filter from `RUST_LOG`, falling back to `fallback`.
#[must_use]
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global fmt subscriber.
///
/// Returns `false` when a global subscriber was already set, in which case the
/// existing one stays active.
pub fn init_tracing() -> bool {
    init_tracing_with(DEFAULT_FILTER)
}

/// Same as [`init_tracing`] with a custom fallback filter directive.
pub fn init_tracing_with(fallback: &str) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(fallback, "tracing initialised");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_keeps_existing_subscriber() {
        let _ = init_tracing();
        assert!(!init_tracing_with("debug"));
    }

    #[test]
    fn fallback_filter_parses() {
        let filter = EnvFilter::new("promptlib_kernel=debug,warn");
        assert!(filter.to_string().contains("promptlib_kernel=debug"));
    }
}
