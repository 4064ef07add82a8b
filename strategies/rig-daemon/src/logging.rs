use tracing_subscriber::EnvFilter;

use crate::errors::RuntimeError;

/// Environment variable holding the log filter, e.g. `RIG_LOG=rig_assembly=debug`
pub const LOG_ENV: &str = "RIG_LOG";

/// Installs a global `fmt` subscriber writing to stderr
///
/// The filter is read from [LOG_ENV], `default_directives` apply if it is unset or invalid.
pub fn init_logging(default_directives: &str) -> Result<(), RuntimeError> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directives))
        .map_err(|error| RuntimeError::Logging(error.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init()
        .map_err(|error| RuntimeError::Logging(error.to_string()))
}
