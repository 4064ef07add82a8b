use rig_assembly::{AssemblyError, DynError};
use rig_config::{SourceError, ValidationError};
use thiserror::Error;

/// Errors aborting the startup or run of a [Runtime](crate::Runtime)
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The runtime's own settings are invalid
    #[error("Invalid runtime settings - {0}")]
    Settings(#[from] ValidationError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("No daemon unit has been deployed")]
    NoDaemon,

    #[error("Daemon failed - error: {0}")]
    Daemon(#[source] DynError),

    #[error("Failed to install the log subscriber: {0}")]
    Logging(String),
}
