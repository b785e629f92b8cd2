use tracing_subscriber::{fmt, EnvFilter};


/// Installs the global `tracing` subscriber. `RUST_LOG` takes precedence over `verbose`.
///
/// Calling this more than once keeps the first subscriber.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "job_scraper=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .try_init();
}
