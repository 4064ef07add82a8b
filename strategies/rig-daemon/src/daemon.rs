use rig_assembly::DynError;

/// The process entry point of a runtime
///
/// Exactly one deployed unit declares this facet:
/// ```rust,ignore
/// Declaration::new().facet::<dyn Daemon>(|unit| unit)
/// ```
pub trait Daemon: Send + Sync {
    /// Runs the daemon, will be called once after deployment.
    ///
    /// Returns when the daemon has shut down.
    fn run(&self) -> Result<(), DynError>;
}
