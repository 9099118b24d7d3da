use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Diagnostics on stderr, filtered by `RUST_LOG`.
///
/// Progress lines are printed by the reporter, so the default only lets
/// warnings through.
pub fn init(verbose: bool) {
    let default = if verbose { "apicheck=debug,warn" } else { "apicheck=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
