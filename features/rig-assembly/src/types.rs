use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
};

use crate::dependency::DependencySlot;

/// All errors raised by unit code
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Assemblies are shared between threads
/// So anything held by an assembly needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// A type erased unit
pub type AnyUnit = Arc<dyn Any + Send + Sync>;

type Caster = Arc<dyn Fn(AnyUnit) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// The supertypes a unit can be viewed as.
///
/// Every unit is a facet of its own concrete type. Declarations add trait
/// objects, e.g. `dyn Daemon`, so that [collate](crate::Assembly::collate)
/// can find units polymorphically.
#[derive(Clone, Default)]
pub struct Facets {
    casters: HashMap<TypeId, (TypeInfo, Caster)>,
}
impl Debug for Facets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.casters.values().map(|(info, _)| info.type_name))
            .finish()
    }
}
impl Facets {
    pub(crate) fn insert<U, S>(&mut self, cast: fn(Arc<U>) -> Arc<S>)
    where
        U: Injectable,
        S: ?Sized + Send + Sync + 'static,
    {
        let caster: Caster = Arc::new(move |unit: AnyUnit| {
            unit.downcast::<U>()
                .ok()
                .map(|unit| Box::new(cast(unit)) as Box<dyn Any + Send + Sync>)
        });
        self.casters
            .insert(TypeId::of::<S>(), (TypeInfo::of::<S>(), caster));
    }

    /// Checks if units with these facets can be viewed as `S`
    pub fn contains<S: ?Sized + 'static>(&self) -> bool {
        self.casters.contains_key(&TypeId::of::<S>())
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.casters.values().map(|(info, _)| info.type_name).collect();
        names.sort_unstable();
        names
    }

    fn view<S: ?Sized + Send + Sync + 'static>(&self, unit: &AnyUnit) -> Option<Arc<S>> {
        let (_, caster) = self.casters.get(&TypeId::of::<S>())?;
        caster(unit.clone())?
            .downcast::<Arc<S>>()
            .ok()
            .map(|view| *view)
    }
}

/// A unit held in an assembly's cache
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    identity: Arc<str>,
    unit: AnyUnit,
    facets: Arc<Facets>,
    dependencies: Arc<[Arc<DependencySlot>]>,
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("identity", &self.identity)
            .field("type", &self.info.type_name)
            .field(
                "dependencies",
                &self.dependencies.iter().map(|slot| slot.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Instance {
    pub(crate) fn new(
        info: TypeInfo,
        identity: &str,
        unit: AnyUnit,
        facets: Arc<Facets>,
        dependencies: Vec<Arc<DependencySlot>>,
    ) -> Self {
        Instance {
            info,
            identity: identity.into(),
            unit,
            facets,
            dependencies: dependencies.into(),
        }
    }

    /// Wraps an already existing value, it is only a facet of its own type
    pub fn from_value<T: Injectable>(identity: &str, value: T) -> Self {
        let mut facets = Facets::default();
        facets.insert::<T, T>(|value| value);
        Self::new(TypeInfo::of::<T>(), identity, Arc::new(value), Arc::new(facets), Vec::new())
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.unit.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    /// Views the unit as one of its facets
    pub fn view<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.facets.view::<S>(&self.unit)
    }

    /// Checks if the unit can be viewed as `S`
    pub fn is<S: ?Sized + 'static>(&self) -> bool {
        self.facets.contains::<S>()
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    /// Dependencies declared by the unit, in declaration order
    pub fn dependencies(&self) -> &[Arc<DependencySlot>] {
        &self.dependencies
    }

    /// Checks if both instances hold the same unit
    pub fn same(&self, other: &Instance) -> bool {
        self.address() == other.address()
    }

    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.unit) as *const () as usize
    }
}

/// Information about a declared dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    /// The required unit type
    pub type_info: TypeInfo,
    /// The identity token the dependency resolves under
    pub token: String,
    /// If it is optional or required
    pub optional: bool,
    /// If the dependency is resolved on first access
    pub deferred: bool,
}
