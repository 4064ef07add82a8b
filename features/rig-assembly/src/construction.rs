use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    assembly::Assembly, dependency::DependencySlot, errors::AssemblyError, resolver::Resolver,
};

/// Handle passed to [Unit::construct](crate::Unit::construct).
///
/// Gives access to the unit's validated configuration and its declared
/// dependencies. Only valid while the unit is being constructed.
pub struct Construction<'a> {
    assembly: &'a Assembly,
    identity: &'a str,
    configuration: UnitConfiguration,
    dependencies: &'a [Arc<DependencySlot>],
}

impl<'a> Construction<'a> {
    pub(crate) fn new(
        assembly: &'a Assembly,
        identity: &'a str,
        configuration: UnitConfiguration,
        dependencies: &'a [Arc<DependencySlot>],
    ) -> Self {
        Construction {
            assembly,
            identity,
            configuration,
            dependencies,
        }
    }

    /// The assembly constructing the unit
    pub fn assembly(&self) -> &Assembly {
        self.assembly
    }

    /// The identity token the unit is cached under
    pub fn identity(&self) -> &str {
        self.identity
    }

    pub fn configuration(&self) -> &UnitConfiguration {
        &self.configuration
    }

    /// Resolves the declared dependency `name`
    ///
    /// `R` selects how: `Arc<T>`, `Option<Arc<T>>`, `Deferred<T>` or `DeferredOption<T>`.
    pub fn dependency<R: Resolver>(&self, name: &str) -> Result<R, AssemblyError> {
        R::resolve(self, name)
    }

    pub(crate) fn slot(&self, name: &str) -> Result<&Arc<DependencySlot>, AssemblyError> {
        self.dependencies
            .iter()
            .find(|slot| slot.name() == name)
            .ok_or_else(|| AssemblyError::UndeclaredDependency {
                unit: self.identity.to_owned(),
                name: name.to_owned(),
            })
    }
}

/// Validated configuration of a single unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitConfiguration {
    identity: String,
    values: Map<String, Value>,
}

impl UnitConfiguration {
    pub(crate) fn new(identity: &str, values: Map<String, Value>) -> Self {
        UnitConfiguration {
            identity: identity.to_owned(),
            values,
        }
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|value| !value.is_null())
    }

    /// Reads an optional property, absent and null values are `None`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AssemblyError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|error| self.property_error(key, error.to_string())),
        }
    }

    /// Reads a property that must be present
    pub fn property<T: DeserializeOwned>(&self, key: &str) -> Result<T, AssemblyError> {
        self.get(key)?
            .ok_or_else(|| self.property_error(key, "missing".to_owned()))
    }

    /// Deserializes the whole configuration into `T`
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, AssemblyError> {
        T::deserialize(&Value::Object(self.values.clone()))
            .map_err(|error| self.property_error("*", error.to_string()))
    }

    fn property_error(&self, key: &str, message: String) -> AssemblyError {
        AssemblyError::Property {
            identity: self.identity.clone(),
            key: key.to_owned(),
            message,
        }
    }
}
