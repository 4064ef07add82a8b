use crate::{construction::Construction, errors::AssemblyError};

pub mod arc;
pub mod deferred;

/// Allows custom behaviour when a unit takes one of its declared dependencies
pub trait Resolver: Sized {
    fn resolve(construction: &Construction<'_>, name: &str) -> Result<Self, AssemblyError>;
}
