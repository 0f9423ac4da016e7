//! Logging setup for applications embedding the engine.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, or by
/// `default_directive` when the variable is unset or invalid.
///
/// Returns `false` if a global subscriber was already installed, so calling
/// this more than once is harmless.
///
/// # Examples
///
/// ```rust
/// quarry::logging::init("quarry=debug");
/// ```
pub fn init(default_directive: &str) -> bool {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_thread_names(true)
    .compact()
    .try_init()
    .is_ok()
}
