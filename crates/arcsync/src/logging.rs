//! Tracing initialization for embedding applications.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber and the `log` bridge.
///
/// Filter comes from `RUST_LOG` and defaults to `info`. Safe to call more
/// than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_log::LogTracer::init();
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
