use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive, e.g. `HOL_LOG=sim=trace`
pub const LOG_ENV: &str = "HOL_LOG";

/// Install the stderr subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
