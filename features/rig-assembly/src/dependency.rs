use std::{
    fmt::Debug,
    sync::OnceLock,
};

use serde_json::{Map, Value};

use crate::{
    assembly::Assembly,
    errors::AssemblyError,
    types::{DependencyInfo, Instance, TypeInfo},
    unit::{Unit, UnitDescriptor},
};

/// Describes a unit another unit depends on.
///
/// A dependency resolves under an identity token. The token is either given
/// explicitly (`schema:example`) or derived from the target identity and the
/// contributed parameters, so that equal requests share one cached instance.
///
/// # Example
/// ```rust,ignore
/// Declaration::new()
///     .dependency("schema", Dependency::on::<SchemaInterface>()
///         .token("schema:example")
///         .contribute("schema", "example"))
///     .dependency("audit", Dependency::on::<AuditLog>().optional().deferred())
/// ```
#[derive(Clone)]
pub struct Dependency {
    target: fn() -> UnitDescriptor,
    target_info: TypeInfo,
    token: Option<String>,
    optional: bool,
    deferred: bool,
    contributed: Map<String, Value>,
}
impl Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("unit", &self.target_info.type_name)
            .field("token", &self.token)
            .field("optional", &self.optional)
            .field("deferred", &self.deferred)
            .field("contributed", &self.contributed)
            .finish()
    }
}

impl Dependency {
    pub fn on<T: Unit>() -> Self {
        Dependency {
            target: UnitDescriptor::of::<T>,
            target_info: TypeInfo::of::<T>(),
            token: None,
            optional: false,
            deferred: false,
            contributed: Map::new(),
        }
    }

    /// Resolve under an explicit identity token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Absence of the unit resolves to `None` instead of an error
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Resolve on first access, against the assembly current at that time
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Adds a parameter to the target's configuration scope
    pub fn contribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.contributed.insert(key.into(), value.into());
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn contributed(&self) -> &Map<String, Value> {
        &self.contributed
    }

    pub fn target_info(&self) -> TypeInfo {
        self.target_info
    }

    /// The target unit's descriptor
    pub fn target(&self) -> UnitDescriptor {
        (self.target)()
    }

    /// The identity token this dependency resolves under
    pub fn identity(&self) -> String {
        self.identity_for(&self.target())
    }

    pub(crate) fn identity_for(&self, target: &UnitDescriptor) -> String {
        if let Some(token) = &self.token {
            return token.clone();
        }
        if self.contributed.is_empty() {
            return target.identity().to_owned();
        }

        let params = canonical(&Value::Object(self.contributed.clone()));
        format!("{}/{params}", target.identity())
    }

    pub fn info(&self) -> DependencyInfo {
        DependencyInfo {
            type_info: self.target_info,
            token: self.identity(),
            optional: self.optional,
            deferred: self.deferred,
        }
    }
}

/// Rebuilds `value` with every object's keys in sorted order, so equal
/// parameters always render to the same text
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect(),
            )
        }
        Value::Array(values) => Value::Array(values.iter().map(canonical).collect()),
        value => value.clone(),
    }
}

/// A declared dependency of one constructed unit.
///
/// Eager dependencies are resolved while the owner is constructed. Deferred
/// ones stay empty until first accessed. A successful resolution is kept,
/// a failed one is retried on the next access.
pub struct DependencySlot {
    name: String,
    dependency: Dependency,
    required_by: String,
    resolved: OnceLock<Option<Instance>>,
}
impl Debug for DependencySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencySlot")
            .field("name", &self.name)
            .field("required_by", &self.required_by)
            .field("resolved", &self.resolved.get().map(|r| r.as_ref().map(Instance::identity)))
            .finish()
    }
}

impl DependencySlot {
    pub(crate) fn new(name: &str, dependency: Dependency, required_by: &str) -> Self {
        DependencySlot {
            name: name.to_owned(),
            dependency,
            required_by: required_by.to_owned(),
            resolved: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    /// Identity of the unit that declared this dependency
    pub fn required_by(&self) -> &str {
        &self.required_by
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolves against the current assembly unless already resolved
    pub fn get(&self) -> Result<Option<Instance>, AssemblyError> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved.clone());
        }
        self.resolve_with(&Assembly::current())
    }

    /// Resolves against `assembly` unless already resolved
    pub fn resolve_with(&self, assembly: &Assembly) -> Result<Option<Instance>, AssemblyError> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved.clone());
        }

        let resolved = assembly.resolve_dependency(&self.dependency, &self.required_by)?;
        Ok(self.resolved.get_or_init(|| resolved).clone())
    }
}
