use std::{
    any::type_name,
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::Arc,
};

use parking_lot::ReentrantMutex;
use rig_config::{merge_value, Schema, SchemaRegistry, ValidationError};
use serde_json::{Map, Value};

use crate::{
    catalog::UnitCatalog,
    construction::{Construction, UnitConfiguration},
    dependency::{Dependency, DependencySlot},
    errors::AssemblyError,
    resolver::arc::downcast,
    types::{Injectable, Instance},
    unit::{Unit, UnitDescriptor},
};

/// Reported as the requiring unit of dependencies resolved through [Assembly::resolve]
const ADHOC: &str = "(adhoc)";

/// State guarded by the assembly lock
#[derive(Default)]
struct AssemblyState {
    /// Constructed units by identity token
    cache: HashMap<String, Instance>,
    /// Validated configuration by token
    configuration: Map<String, Value>,
    /// Raw configuration waiting for a schema
    pending: Map<String, Value>,
    /// Keys currently being constructed, outermost first
    constructing: Vec<String>,
}

impl AssemblyState {
    /// Validates resolved, pending and incoming data for `token` as one tree
    /// and stores the result as the resolved configuration.
    ///
    /// Nothing is changed if validation fails.
    fn resolve(
        &mut self,
        token: String,
        schema: &dyn Schema,
        incoming: Option<Value>,
    ) -> Result<(), ValidationError> {
        let mut combined = self
            .configuration
            .get(&token)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        if let Some(pending) = self.pending.get(&token) {
            merge_value(&mut combined, pending.clone());
        }
        if let Some(incoming) = incoming {
            merge_value(&mut combined, incoming);
        }

        let processed = schema.process(combined, true)?;
        self.pending.remove(&token);
        self.configuration.insert(token, processed);
        Ok(())
    }
}

/// Pops the construction stack when a constructor returns or unwinds
struct ConstructionFrame<'a> {
    state: &'a RefCell<AssemblyState>,
}
impl Drop for ConstructionFrame<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().constructing.pop();
    }
}

pub(crate) struct AssemblyInner {
    guard: ReentrantMutex<RefCell<AssemblyState>>,
    registry: Arc<SchemaRegistry>,
    catalog: UnitCatalog,
}

/// Container constructing and holding units
///
/// An assembly instantiates every unit at most once, resolving the unit's
/// configuration and dependencies on the way. All state sits behind a single
/// reentrant lock, constructors run while it is held and may call back into
/// the same assembly from the constructing thread.
///
/// Note:
///
/// Construction holds the lock for its whole duration. A slow constructor
/// stalls every other instantiation and configuration read on this assembly.
#[derive(Clone)]
pub struct Assembly(pub(crate) Arc<AssemblyInner>);

impl Debug for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Assembly({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for Assembly {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Assembly {}

impl Default for Assembly {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembly {
    /// Creates an assembly validating against the process-wide [SchemaRegistry]
    pub fn new() -> Self {
        Self::with_registry(SchemaRegistry::standard())
    }

    pub fn with_registry(registry: Arc<SchemaRegistry>) -> Self {
        Assembly(Arc::new(AssemblyInner {
            guard: ReentrantMutex::new(RefCell::new(AssemblyState::default())),
            registry,
            catalog: UnitCatalog::new(),
        }))
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.0.registry
    }

    pub fn catalog(&self) -> &UnitCatalog {
        &self.0.catalog
    }

    /// Returns the instance cached under `key`, calling `instantiator` to create it if missing.
    ///
    /// The instantiator runs under the assembly lock, so concurrent callers for
    /// the same key observe exactly one construction. A failed instantiation
    /// leaves no entry behind and the next call retries it.
    pub fn acquire<F>(&self, key: &str, instantiator: F) -> Result<Instance, AssemblyError>
    where
        F: FnOnce() -> Result<Instance, AssemblyError>,
    {
        let guard = self.0.guard.lock();
        if let Some(instance) = guard.borrow().cache.get(key) {
            tracing::trace!("Cache hit for '{key}'");
            return Ok(instance.clone());
        }

        {
            let mut state = guard.borrow_mut();
            if state.constructing.iter().any(|entry| entry == key) {
                let mut chain = state.constructing.clone();
                chain.push(key.to_owned());
                return Err(AssemblyError::CircularConstruction { chain });
            }
            state.constructing.push(key.to_owned());
        }

        let frame = ConstructionFrame { state: &guard };
        let result = instantiator();
        drop(frame);

        let instance = result?;
        guard
            .borrow_mut()
            .cache
            .insert(key.to_owned(), instance.clone());
        Ok(instance)
    }

    /// Instantiates `U` under its declared identity
    pub fn instantiate<U: Unit>(&self) -> Result<Arc<U>, AssemblyError> {
        let instance = self.instantiate_descriptor(&UnitDescriptor::of::<U>())?;
        downcast(&instance)
    }

    /// Instantiates the unit registered in the [catalog](Assembly::catalog) as `identity`
    pub fn instantiate_named(&self, identity: &str) -> Result<Instance, AssemblyError> {
        let descriptor = self
            .0
            .catalog
            .get(identity)
            .ok_or_else(|| AssemblyError::UnknownUnit(identity.to_owned()))?;
        self.instantiate_descriptor(&descriptor)
    }

    pub fn instantiate_descriptor(&self, descriptor: &UnitDescriptor) -> Result<Instance, AssemblyError> {
        self.acquire_unit(descriptor, descriptor.identity(), &Map::new())
    }

    /// Stores an existing value under `identity`
    ///
    /// If something is already cached under `identity`, that instance wins and `value` is dropped.
    pub fn provide<T: Injectable>(&self, identity: &str, value: T) -> Result<Arc<T>, AssemblyError> {
        let instance = self.acquire(identity, move || Ok(Instance::from_value(identity, value)))?;
        downcast(&instance)
    }

    /// Adds `U` to the catalog and registers the schemas of its identity and dependency tokens
    pub fn register<U: Unit>(&self) -> &Self {
        let descriptor = self.0.catalog.register::<U>();
        self.declare_token(&descriptor, descriptor.identity(), &Map::new());
        for (_, dependency) in descriptor.dependencies() {
            let target = dependency.target();
            let token = dependency.identity_for(&target);
            self.declare_token(&target, &token, dependency.contributed());
        }
        self
    }

    /// Merges a configuration tree keyed by token into the assembly.
    ///
    /// Tokens with a registered schema are validated right away, all others
    /// are kept pending until a schema for them shows up.
    pub fn configure(&self, configuration: Map<String, Value>) -> Result<(), AssemblyError> {
        let guard = self.0.guard.lock();
        for (token, data) in configuration {
            match self.0.registry.get(&token) {
                Some(schema) => {
                    guard
                        .borrow_mut()
                        .resolve(token, schema.as_ref(), Some(data))?;
                }
                None => {
                    let mut state = guard.borrow_mut();
                    match state.pending.get_mut(&token) {
                        Some(pending) => merge_value(pending, data),
                        None => {
                            tracing::debug!("No schema for '{token}' yet, configuration is pending");
                            state.pending.insert(token, data);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the resolved configuration for `token`
    ///
    /// On a miss every pending token with a registered schema is resolved first.
    pub fn get_configuration(&self, token: &str) -> Result<Value, AssemblyError> {
        let guard = self.0.guard.lock();
        if let Some(configuration) = guard.borrow().configuration.get(token) {
            return Ok(configuration.clone());
        }

        let pending: Vec<String> = guard.borrow().pending.keys().cloned().collect();
        for pending_token in pending {
            if let Some(schema) = self.0.registry.get(&pending_token) {
                tracing::debug!("Resolving pending configuration for '{pending_token}'");
                guard
                    .borrow_mut()
                    .resolve(pending_token, schema.as_ref(), None)?;
            }
        }

        let state = guard.borrow();
        state
            .configuration
            .get(token)
            .cloned()
            .ok_or_else(|| AssemblyError::ConfigurationNotFound(token.to_owned()))
    }

    /// Resolved configuration entries whose token starts with `prefix:`
    pub fn filter_configuration(&self, prefix: &str) -> Map<String, Value> {
        let mut prefix = prefix.to_owned();
        if !prefix.ends_with(':') {
            prefix.push(':');
        }

        let guard = self.0.guard.lock();
        let state = guard.borrow();
        state
            .configuration
            .iter()
            .filter(|(token, _)| token.starts_with(&prefix))
            .map(|(token, data)| (token.clone(), data.clone()))
            .collect()
    }

    /// Checks if any resolved token is scoped below `identity/`
    pub fn should_isolate(&self, identity: &str) -> bool {
        let prefix = format!("{identity}/");
        let guard = self.0.guard.lock();
        let state = guard.borrow();
        state.configuration.keys().any(|token| token.starts_with(&prefix))
    }

    pub fn is_pending(&self, token: &str) -> bool {
        let guard = self.0.guard.lock();
        let pending = guard.borrow().pending.contains_key(token);
        pending
    }

    pub fn is_cached(&self, key: &str) -> bool {
        let guard = self.0.guard.lock();
        let cached = guard.borrow().cache.contains_key(key);
        cached
    }

    /// Snapshot of all cached instances, ordered by identity
    pub fn instances(&self) -> Vec<Instance> {
        let guard = self.0.guard.lock();
        let mut instances: Vec<Instance> = guard.borrow().cache.values().cloned().collect();
        instances.sort_by(|a, b| a.identity().cmp(b.identity()));
        instances
    }

    /// All units that can be viewed as `S`
    ///
    /// Looks at every cached unit and at every dependency declared by a cached
    /// unit whose target can be viewed as `S`. Deferred dependencies found this
    /// way are resolved against this assembly.
    pub fn collate<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>, AssemblyError> {
        Ok(self
            .collate_identified::<S>()?
            .into_iter()
            .map(|(_, unit)| unit)
            .collect())
    }

    /// The only unit that can be viewed as `S`, if any
    pub fn collate_single<S: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Option<Arc<S>>, AssemblyError> {
        let mut units = self.collate_identified::<S>()?;
        if units.len() > 1 {
            return Err(AssemblyError::AmbiguousSingleton {
                supertype: type_name::<S>(),
                identities: units.into_iter().map(|(identity, _)| identity).collect(),
            });
        }
        Ok(units.pop().map(|(_, unit)| unit))
    }

    fn collate_identified<S: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<(String, Arc<S>)>, AssemblyError> {
        let mut seen = HashSet::new();
        let mut units = Vec::new();
        let mut add = |instance: &Instance| {
            if let Some(unit) = instance.view::<S>() {
                if seen.insert(instance.address()) {
                    units.push((instance.identity().to_owned(), unit));
                }
            }
        };

        for instance in self.instances() {
            add(&instance);
            for slot in instance.dependencies() {
                if !slot.dependency().target().facets().contains::<S>() {
                    continue;
                }
                if let Some(dependency) = slot.resolve_with(self)? {
                    add(&dependency);
                }
            }
        }

        Ok(units)
    }

    /// Resolves `dependency` outside of any unit's construction
    ///
    /// Only optional dependencies resolve to `None`.
    pub fn resolve<T: Injectable>(
        &self,
        dependency: impl Into<Dependency>,
    ) -> Result<Option<Arc<T>>, AssemblyError> {
        let dependency = dependency.into();
        self.resolve_dependency(&dependency, ADHOC)?
            .map(|instance| downcast(&instance))
            .transpose()
    }

    pub(crate) fn resolve_dependency(
        &self,
        dependency: &Dependency,
        required_by: &str,
    ) -> Result<Option<Instance>, AssemblyError> {
        let target = dependency.target();
        let token = dependency.identity_for(&target);

        match self.acquire_unit(&target, &token, dependency.contributed()) {
            Ok(instance) => Ok(Some(instance)),
            Err(AssemblyError::Unconfigured { token: missing, source }) if missing == token => {
                if dependency.is_optional() {
                    tracing::debug!("Optional dependency '{token}' of '{required_by}' is not available");
                    Ok(None)
                } else {
                    Err(AssemblyError::MissingRequiredDependency {
                        token,
                        required_by: required_by.to_owned(),
                        reason: Some(source),
                    })
                }
            }
            Err(error) => Err(error),
        }
    }

    fn acquire_unit(
        &self,
        descriptor: &UnitDescriptor,
        token: &str,
        contributed: &Map<String, Value>,
    ) -> Result<Instance, AssemblyError> {
        self.declare_token(descriptor, token, contributed);
        self.acquire(token, || self.construct(descriptor, token, contributed))
    }

    fn declare_token(&self, descriptor: &UnitDescriptor, token: &str, contributed: &Map<String, Value>) {
        self.0
            .registry
            .ensure(token, || Arc::new(descriptor.scoped_schema(contributed)));
    }

    fn construct(
        &self,
        descriptor: &UnitDescriptor,
        token: &str,
        contributed: &Map<String, Value>,
    ) -> Result<Instance, AssemblyError> {
        tracing::debug!("Constructing '{token}' ({})", descriptor.info.type_name);

        let configured = match self.get_configuration(token) {
            Ok(configured) => Some(configured),
            Err(AssemblyError::ConfigurationNotFound(_)) => None,
            Err(error) => return Err(error),
        };
        let is_configured = configured.is_some();

        let mut data = Value::Object(contributed.clone());
        if let Some(configured) = configured {
            merge_value(&mut data, configured);
        }
        let values = match descriptor.scoped_schema(contributed).process(data, false) {
            Ok(Value::Object(values)) => values,
            Ok(_) => Map::new(),
            Err(source) if !is_configured => {
                return Err(AssemblyError::Unconfigured {
                    token: token.to_owned(),
                    source,
                })
            }
            Err(error) => return Err(error.into()),
        };

        let slots: Vec<Arc<DependencySlot>> = descriptor
            .dependencies()
            .iter()
            .map(|(name, dependency)| Arc::new(DependencySlot::new(name, dependency.clone(), token)))
            .collect();
        for slot in slots.iter().filter(|slot| !slot.dependency().is_deferred()) {
            slot.resolve_with(self)?;
        }

        let construction = Construction::new(self, token, UnitConfiguration::new(token, values), &slots);
        let unit = descriptor.construct(&construction).map_err(|error| {
            AssemblyError::construction_failed(token, descriptor.info.type_name, error)
        })?;

        tracing::debug!("Constructed '{token}'");
        Ok(Instance::new(
            descriptor.info,
            token,
            unit,
            descriptor.facets().clone(),
            slots,
        ))
    }
}
