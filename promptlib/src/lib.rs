//! Prompt library facade.
//!
//! Bundles the component crates behind feature flags so applications can
//! pull in only what they need. All features are enabled by default.

#![warn(missing_docs, clippy::pedantic)]

/// Shared domain types.
pub use promptlib_primitives as primitives;

/// RACE rendering, prompt composition and input sanitizing (enabled by `compose` feature).
#[cfg(feature = "compose")]
pub use promptlib_compose as compose;

/// Persistent role and template stores (enabled by `store` feature).
#[cfg(feature = "store")]
pub use promptlib_store as store;

/// Enhancement backends and rate limiting (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use promptlib_adapters as adapters;

/// Application store (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use promptlib_kernel as kernel;

/// Environment and file configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use promptlib_config as config;

/// Logging setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use promptlib_telemetry as telemetry;
