use std::{any::type_name, sync::Arc};

use crate::{
    construction::Construction,
    errors::AssemblyError,
    resolver::Resolver,
    types::{Injectable, Instance},
};

impl<T: Injectable> Resolver for Arc<T> {
    fn resolve(construction: &Construction<'_>, name: &str) -> Result<Self, AssemblyError> {
        let slot = construction.slot(name)?;
        match slot.resolve_with(construction.assembly())? {
            Some(instance) => downcast(&instance),
            None => Err(AssemblyError::MissingRequiredDependency {
                token: slot.dependency().identity(),
                required_by: slot.required_by().to_owned(),
                reason: None,
            }),
        }
    }
}

impl<T: Injectable> Resolver for Option<Arc<T>> {
    fn resolve(construction: &Construction<'_>, name: &str) -> Result<Self, AssemblyError> {
        let slot = construction.slot(name)?;
        // Absent optional dependencies resolve to None, anything else still fails
        slot.resolve_with(construction.assembly())?
            .map(|instance| downcast(&instance))
            .transpose()
    }
}

pub(crate) fn downcast<T: Injectable>(instance: &Instance) -> Result<Arc<T>, AssemblyError> {
    instance
        .downcast::<T>()
        .map_err(|actual_type| AssemblyError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        })
}
