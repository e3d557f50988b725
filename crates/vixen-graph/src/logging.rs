//! Structured logging init, thin wrapper around `env_logger`.

pub use log::{debug, error, info, trace, warn};

/// Initialize the process-wide logger. Safe to call more than once; only
/// the first call takes effect.
pub fn init() {
    let _ = env_logger::builder().is_test(false).try_init();
}
