use std::{any::type_name, fmt::Debug, marker::PhantomData, sync::Arc};

use rig_config::{Field, Structure};
use serde_json::{Map, Value};

use crate::{
    construction::Construction,
    dependency::Dependency,
    types::{AnyUnit, DynError, Facets, Injectable, TypeInfo},
};

/// A configurable component an [Assembly](crate::Assembly) constructs at most once.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
///
/// use rig_assembly::{Assembly, Construction, Declaration, DynError, Unit};
/// use rig_config::{Field, Structure};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl Unit for Greeter {
///     fn declare() -> Declaration<Self> {
///         Declaration::new()
///             .identity("example:greeter")
///             .configuration(Structure::new().field("greeting", Field::text().default("hello")))
///     }
///
///     fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
///         Ok(Greeter {
///             greeting: construction.configuration().property("greeting")?,
///         })
///     }
/// }
///
/// let assembly = Assembly::new();
/// let greeter: Arc<Greeter> = assembly.instantiate().unwrap();
/// assert_eq!(greeter.greeting, "hello");
/// ```
pub trait Unit: Injectable + Sized {
    /// Declares the identity, configuration schema, dependencies and facets of the unit
    fn declare() -> Declaration<Self>;

    /// Builds the unit from its resolved configuration and dependencies
    fn construct(construction: &Construction<'_>) -> Result<Self, DynError>;
}

/// Type level declaration of a [Unit]
pub struct Declaration<U> {
    identity: String,
    schema: Structure,
    dependencies: Vec<(String, Dependency)>,
    facets: Facets,
    _marker: PhantomData<fn() -> U>,
}

impl<U: Unit> Default for Declaration<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Unit> Declaration<U> {
    /// The identity defaults to the unit's type name
    pub fn new() -> Self {
        let mut facets = Facets::default();
        facets.insert::<U, U>(|unit| unit);
        Declaration {
            identity: type_name::<U>().to_owned(),
            schema: Structure::new(),
            dependencies: Vec::new(),
            facets,
            _marker: PhantomData,
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// The schema the unit's configuration is validated against
    pub fn configuration(mut self, schema: Structure) -> Self {
        self.schema = schema;
        self
    }

    pub fn dependency(mut self, name: impl Into<String>, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.push((name.into(), dependency.into()));
        self
    }

    /// Lets the unit be collated as `S`
    ///
    /// ```rust,ignore
    /// Declaration::new().facet::<dyn Daemon>(|unit| unit)
    /// ```
    pub fn facet<S: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<U>) -> Arc<S>) -> Self {
        self.facets.insert::<U, S>(cast);
        self
    }

    pub fn into_descriptor(self) -> UnitDescriptor {
        UnitDescriptor {
            info: TypeInfo::of::<U>(),
            identity: self.identity.into(),
            schema: Arc::new(self.schema),
            dependencies: self.dependencies.into(),
            facets: Arc::new(self.facets),
            constructor: construct_erased::<U>,
        }
    }
}

fn construct_erased<U: Unit>(construction: &Construction<'_>) -> Result<AnyUnit, DynError> {
    U::construct(construction).map(|unit| Arc::new(unit) as AnyUnit)
}

/// Type erased [Declaration], everything an assembly needs to construct a unit
#[derive(Clone)]
pub struct UnitDescriptor {
    pub info: TypeInfo,
    identity: Arc<str>,
    schema: Arc<Structure>,
    dependencies: Arc<[(String, Dependency)]>,
    facets: Arc<Facets>,
    constructor: fn(&Construction<'_>) -> Result<AnyUnit, DynError>,
}
impl Debug for UnitDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitDescriptor")
            .field("identity", &self.identity)
            .field("type", &self.info.type_name)
            .field("dependencies", &self.dependencies)
            .field("facets", &self.facets)
            .finish()
    }
}

impl UnitDescriptor {
    pub fn of<U: Unit>() -> Self {
        U::declare().into_descriptor()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn schema(&self) -> &Structure {
        &self.schema
    }

    pub fn dependencies(&self) -> &[(String, Dependency)] {
        &self.dependencies
    }

    pub fn facets(&self) -> &Arc<Facets> {
        &self.facets
    }

    /// The schema for the unit resolved with `contributed` parameters.
    ///
    /// Contributed values become defaults, explicitly configured values override them.
    pub fn scoped_schema(&self, contributed: &Map<String, Value>) -> Structure {
        let mut schema = (*self.schema).clone();
        for (key, value) in contributed {
            let field = schema.get(key).cloned().unwrap_or_else(Field::any);
            schema = schema.field(key.clone(), field.default(value.clone()));
        }
        schema
    }

    pub(crate) fn construct(&self, construction: &Construction<'_>) -> Result<AnyUnit, DynError> {
        (self.constructor)(construction)
    }
}
