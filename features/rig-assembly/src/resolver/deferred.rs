use std::{fmt::Debug, marker::PhantomData, sync::Arc};

use crate::{
    construction::Construction,
    dependency::DependencySlot,
    errors::AssemblyError,
    resolver::{arc::downcast, Resolver},
    types::Injectable,
};

/// Lazily resolved dependency
///
/// Resolution happens on first access, against whatever assembly is
/// [current](crate::Assembly::current) at that moment. This need not be the
/// assembly that constructed the owning unit.
///
/// Note:
///
/// A failed resolution is not remembered, the next access tries again.
pub struct Deferred<T: Injectable> {
    slot: Arc<DependencySlot>,
    _marker: PhantomData<fn() -> T>,
}
impl<T: Injectable> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred {
            slot: self.slot.clone(),
            _marker: PhantomData,
        }
    }
}
impl<T: Injectable> Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Deferred").field(&self.slot).finish()
    }
}
impl<T: Injectable> Resolver for Deferred<T> {
    fn resolve(construction: &Construction<'_>, name: &str) -> Result<Self, AssemblyError> {
        Ok(Deferred {
            slot: construction.slot(name)?.clone(),
            _marker: PhantomData,
        })
    }
}
impl<T: Injectable> Deferred<T> {
    /// Accesses the dependency, resolving it if needed
    pub fn get(&self) -> Result<Arc<T>, AssemblyError> {
        match self.slot.get()? {
            Some(instance) => downcast(&instance),
            None => Err(AssemblyError::MissingRequiredDependency {
                token: self.slot.dependency().identity(),
                required_by: self.slot.required_by().to_owned(),
                reason: None,
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.is_resolved()
    }
}

/// Lazily resolved dependency which may be absent
pub struct DeferredOption<T: Injectable> {
    slot: Arc<DependencySlot>,
    _marker: PhantomData<fn() -> T>,
}
impl<T: Injectable> Clone for DeferredOption<T> {
    fn clone(&self) -> Self {
        DeferredOption {
            slot: self.slot.clone(),
            _marker: PhantomData,
        }
    }
}
impl<T: Injectable> Debug for DeferredOption<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DeferredOption").field(&self.slot).finish()
    }
}
impl<T: Injectable> Resolver for DeferredOption<T> {
    fn resolve(construction: &Construction<'_>, name: &str) -> Result<Self, AssemblyError> {
        Ok(DeferredOption {
            slot: construction.slot(name)?.clone(),
            _marker: PhantomData,
        })
    }
}
impl<T: Injectable> DeferredOption<T> {
    /// Accesses the dependency - `None` if it is not available
    pub fn get(&self) -> Result<Option<Arc<T>>, AssemblyError> {
        self.slot
            .get()?
            .map(|instance| downcast(&instance))
            .transpose()
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.is_resolved()
    }
}
