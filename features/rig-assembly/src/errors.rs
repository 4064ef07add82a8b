use std::sync::Arc;

use rig_config::ValidationError;
use thiserror::Error;

use crate::types::DynError;

/// Errors raised by an [Assembly](crate::Assembly) and the units it constructs
#[derive(Error, Debug, Clone)]
pub enum AssemblyError {
    /// The token was never configured and no schema resolves it
    #[error("No configuration found for '{0}'")]
    ConfigurationNotFound(String),

    /// A singleton lookup matched more than one unit
    #[error("Expected at most one '{supertype}' but found {}: {identities:?}", .identities.len())]
    AmbiguousSingleton {
        supertype: &'static str,
        identities: Vec<String>,
    },

    /// A required dependency could not be resolved to a unit
    #[error("'{required_by}' requires '{token}' but it is not available")]
    MissingRequiredDependency {
        token: String,
        required_by: String,
        #[source]
        reason: Option<ValidationError>,
    },

    /// The unit was never configured and its schema cannot be satisfied by defaults
    #[error("Unit '{token}' is not configured")]
    Unconfigured {
        token: String,
        #[source]
        source: ValidationError,
    },

    /// A unit constructor failed
    #[error("Construction of '{identity}' ({type_name}) failed - error: {error}")]
    ConstructionFailed {
        identity: String,
        type_name: &'static str,
        error: Arc<DynError>,
    },

    /// Configuration data failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No unit with this identity is registered in the catalog
    #[error("No unit registered as '{0}'")]
    UnknownUnit(String),

    /// A unit asked for a dependency it never declared
    #[error("'{unit}' has no dependency named '{name}'")]
    UndeclaredDependency { unit: String, name: String },

    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },

    /// A configured property could not be read as the requested type
    #[error("Property '{key}' of '{identity}' is invalid: {message}")]
    Property {
        identity: String,
        key: String,
        message: String,
    },

    /// A unit was requested again while it was being constructed
    #[error("Circular construction through {}", .chain.join(" -> "))]
    CircularConstruction { chain: Vec<String> },
}

impl AssemblyError {
    pub(crate) fn construction_failed(
        identity: &str,
        type_name: &'static str,
        error: DynError,
    ) -> Self {
        // Errors raised by nested assembly calls inside a constructor pass through untouched
        match error.downcast::<AssemblyError>() {
            Ok(error) => *error,
            Err(error) => AssemblyError::ConstructionFailed {
                identity: identity.to_owned(),
                type_name,
                error: Arc::new(error),
            },
        }
    }
}
