//! Tracing setup for binaries and hosts embedding the runtime.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Defaults to debug output for this crate. Calling it twice is harmless.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harbor_client=debug,harbor_flush=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
