use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Structured logging for the service binaries.
///
/// `RUST_LOG` overrides the default of `info` with debug output for this crate.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_choreography=debug")),
        )
        .init();
}
