//! Logging setup on the `tracing` ecosystem.
//!
//! Everything is written to stderr so the supervised process keeps stdout to itself.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber. Call once, before anything logs.
///
/// The level is chosen in this order:
/// 1. `verbose`: debug for this crate
/// 2. `quiet`: errors only
/// 3. `RUST_LOG`
/// 4. info for this crate
pub fn init_logger(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("wc_reload=debug")
    } else if quiet {
        EnvFilter::new("wc_reload=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wc_reload=info"))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
