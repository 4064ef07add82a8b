use rig_assembly::{AssemblyError, DynError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema '{0}' has not been declared")]
    Undeclared(String),

    #[error("No connector registered for '{scheme}' (url: '{url}')")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("'{0}' is not a valid database url")]
    InvalidUrl(String),

    #[error("Schema '{schema}' has no migrations named '{migrations}'")]
    MissingMigrations { schema: String, migrations: String },

    /// The database rejected an operation
    #[error("Database operation '{operation}' failed for '{url}' - error: {source}")]
    Database {
        operation: &'static str,
        url: String,
        #[source]
        source: DynError,
    },

    #[error("Session is closed")]
    SessionClosed,

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

impl SchemaError {
    pub(crate) fn database<'a>(operation: &'static str, url: &'a str) -> impl FnOnce(DynError) -> Self + 'a {
        move |source| SchemaError::Database {
            operation,
            url: url.to_owned(),
            source,
        }
    }
}
