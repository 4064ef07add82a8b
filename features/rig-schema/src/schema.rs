use std::{collections::HashMap, fmt::Debug, sync::Arc};

use parking_lot::RwLock;
use rig_assembly::{Construction, Declaration, DynError, Unit};

use crate::{migrations::Migrations, session::Session};

type Constructor = Arc<dyn Fn(&mut Session) -> Result<(), DynError> + Send + Sync>;

/// A logical database schema
///
/// Constructors run in declaration order every time the schema is deployed.
#[derive(Clone)]
pub struct Schema {
    name: String,
    constructors: Vec<Constructor>,
    migrations: Option<(String, Arc<dyn Migrations>)>,
}
impl Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("constructors", &self.constructors.len())
            .field("migrations", &self.migrations.as_ref().map(|(name, _)| name))
            .finish()
    }
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            constructors: Vec::new(),
            migrations: None,
        }
    }

    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&mut Session) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.constructors.push(Arc::new(constructor));
        self
    }

    /// Attaches migrations, used when an interface is configured with `migrations = name`
    pub fn migrations(mut self, name: impl Into<String>, migrations: impl Migrations + 'static) -> Self {
        self.migrations = Some((name.into(), Arc::new(migrations)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn construct(&self, session: &mut Session) -> Result<(), DynError> {
        for constructor in &self.constructors {
            constructor(session)?;
        }
        Ok(())
    }

    pub(crate) fn has_constructors(&self) -> bool {
        !self.constructors.is_empty()
    }

    pub(crate) fn get_migrations(&self, name: &str) -> Option<&Arc<dyn Migrations>> {
        match &self.migrations {
            Some((attached, migrations)) if attached == name => Some(migrations),
            _ => None,
        }
    }
}

/// All declared schemas of an assembly
#[derive(Default)]
pub struct SchemaCatalog {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}
impl Debug for SchemaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCatalog").field("schemas", &self.names()).finish()
    }
}

impl Unit for SchemaCatalog {
    fn declare() -> Declaration<Self> {
        Declaration::new().identity("rig:schemas")
    }

    fn construct(_: &Construction<'_>) -> Result<Self, DynError> {
        Ok(SchemaCatalog::default())
    }
}

impl SchemaCatalog {
    /// Declares `schema`, a schema is only declared once per name
    ///
    /// Returns the declared schema, which is the earlier one if the name is taken.
    pub fn declare(&self, schema: Schema) -> Arc<Schema> {
        let mut schemas = self.schemas.write();
        if let Some(existing) = schemas.get(schema.name()) {
            tracing::warn!("Schema '{}' is already declared", schema.name());
            return existing.clone();
        }

        tracing::debug!("Declared schema '{}'", schema.name());
        let schema = Arc::new(schema);
        schemas.insert(schema.name().to_owned(), schema.clone());
        schema
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }
}
