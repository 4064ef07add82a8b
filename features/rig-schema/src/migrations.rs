use rig_assembly::DynError;

use crate::engine::Engine;

/// Versioned migrations of a [Schema](crate::Schema)
///
/// Deploying a schema upgrades an existing database and stamps a freshly
/// created one as being at the latest revision.
pub trait Migrations: Send + Sync {
    fn has_revisions(&self) -> bool;

    /// Brings the database up to the latest revision
    fn upgrade(&self, engine: &dyn Engine) -> Result<(), DynError>;

    /// Marks the database as being at the latest revision without running anything
    fn stamp(&self, engine: &dyn Engine) -> Result<(), DynError>;
}
