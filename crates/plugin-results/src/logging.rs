//! Log subscriber setup.
//!
//! Library code logs through the `log` facade and `tracing` spans; both end
//! up in one `tracing-subscriber` fmt layer.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Installs the global subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init(default_filter: &str) {
    INIT.call_once(|| {
        if let Err(e) = tracing_log::LogTracer::init() {
            eprintln!("Failed to bridge log records into tracing: {}", e);
        }

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true));

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Failed to install tracing subscriber: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("debug");
        init("info");
        log::info!("logging initialized twice without panicking");
    }
}
