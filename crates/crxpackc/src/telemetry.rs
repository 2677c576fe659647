use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

/// Install a stderr `fmt` subscriber filtered by `env_filter`.
///
/// Log lines go to stderr so that `--json` output on stdout stays parseable.
pub fn install(env_filter: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
}
