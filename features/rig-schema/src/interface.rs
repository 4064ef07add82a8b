use std::{collections::HashMap, fmt::Debug, sync::Arc};

use parking_lot::{Mutex, RwLock};
use rig_assembly::{Assembly, AssemblyError, Construction, Declaration, Dependency, DynError, Unit};
use rig_config::{Field, Structure};
use serde::Deserialize;

use crate::{
    engine::{Connector, Connectors, Engine},
    errors::SchemaError,
    migrations::Migrations,
    schema::{Schema, SchemaCatalog},
    session::{Session, SessionContext, SharedSession},
};

/// Substitutions for `{token}` placeholders in a database url
pub type Tokens<'a> = &'a [(&'a str, &'a str)];

#[derive(Debug, Deserialize)]
struct Settings {
    schema: String,
    url: String,
    admin_url: Option<String>,
    #[serde(default)]
    echo: bool,
    migrations: Option<String>,
}

/// Access to the database behind one [Schema]
///
/// One interface exists per schema name and assembly, configured under the
/// token `schema:<name>`. Engines are created on first use and cached per
/// expanded url.
pub struct SchemaInterface {
    settings: Settings,
    catalog: Arc<SchemaCatalog>,
    connectors: Arc<Connectors>,
    engines: RwLock<HashMap<String, Arc<dyn Engine>>>,
}
impl Debug for SchemaInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaInterface")
            .field("schema", &self.settings.schema)
            .field("url", &self.settings.url)
            .field("engines", &self.engines.read().len())
            .finish()
    }
}

impl Unit for SchemaInterface {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("schema")
            .configuration(
                Structure::new()
                    .field("admin_url", Field::text().nonnull())
                    .field("echo", Field::boolean().default(false))
                    .field("migrations", Field::text().nonnull())
                    .field("schema", Field::text().nonempty())
                    .field("url", Field::text().nonempty()),
            )
            .dependency("catalog", Dependency::on::<SchemaCatalog>())
            .dependency("connectors", Dependency::on::<Connectors>())
    }

    fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
        Ok(SchemaInterface {
            settings: construction.configuration().deserialize()?,
            catalog: construction.dependency("catalog")?,
            connectors: construction.dependency("connectors")?,
            engines: RwLock::new(HashMap::new()),
        })
    }
}

impl SchemaInterface {
    /// The configuration token of the interface for `schema`
    pub fn token(schema: &str) -> String {
        format!("schema:{schema}")
    }

    /// The interface for `schema` on the current assembly
    pub fn interface(schema: &str) -> Result<Arc<SchemaInterface>, AssemblyError> {
        SchemaDependency::new(schema).get()
    }

    /// Name of the schema
    pub fn schema(&self) -> &str {
        &self.settings.schema
    }

    /// The configured url, before token expansion
    pub fn url(&self) -> &str {
        &self.settings.url
    }

    pub fn admin_url(&self) -> Option<&str> {
        self.settings.admin_url.as_deref()
    }

    pub fn echo(&self) -> bool {
        self.settings.echo
    }

    /// The declared schema this interface serves
    pub fn declaration(&self) -> Result<Arc<Schema>, SchemaError> {
        self.catalog
            .get(self.schema())
            .ok_or_else(|| SchemaError::Undeclared(self.schema().to_owned()))
    }

    /// The url with `{token}` placeholders substituted
    pub fn expand_url(&self, tokens: Tokens<'_>) -> String {
        let mut url = self.settings.url.clone();
        for (token, value) in tokens {
            url = url.replace(&format!("{{{token}}}"), value);
        }
        url
    }

    pub fn get_engine(&self, tokens: Tokens<'_>) -> Result<Arc<dyn Engine>, SchemaError> {
        let url = self.expand_url(tokens);
        self.acquire_engine(&url)
    }

    /// The session of this schema in the current [SessionContext]
    ///
    /// Inside a context every call returns the same session, the first call
    /// decides its engine. Outside of a context each call opens a new one.
    pub fn get_session(&self, tokens: Tokens<'_>) -> Result<SharedSession, SchemaError> {
        let open = || self.get_independent_session(tokens);
        match SessionContext::session(self.schema(), open)? {
            Some(session) => Ok(session),
            None => Ok(Arc::new(Mutex::new(open()?))),
        }
    }

    /// The context session for the default tokens
    pub fn session(&self) -> Result<SharedSession, SchemaError> {
        self.get_session(&[])
    }

    /// A new session on the engine for `tokens`, never shared
    pub fn get_independent_session(&self, tokens: Tokens<'_>) -> Result<Session, SchemaError> {
        Ok(Session::new(self.get_engine(tokens)?))
    }

    /// Creates or migrates the database, then runs the schema's constructors
    pub fn deploy(&self, tokens: Tokens<'_>) -> Result<(), SchemaError> {
        let schema = self.declaration()?;
        let url = self.expand_url(tokens);
        let name = database_name(&url);
        let connector = self.connectors.for_url(&url)?;

        let present = connector
            .is_database_present(self.admin_url(), name)
            .map_err(SchemaError::database("inspect", &url))?;
        if present {
            if let Some(migrations) = self.migrations(&schema)?.filter(|m| m.has_revisions()) {
                let engine = self.acquire_engine(&url)?;
                tracing::info!("Upgrading schema '{}' at '{url}'", schema.name());
                migrations
                    .upgrade(engine.as_ref())
                    .map_err(SchemaError::database("upgrade", &url))?;
            }
        } else {
            self.create(&schema, connector.as_ref(), &url, name)?;
        }

        if !schema.has_constructors() {
            return Ok(());
        }

        let mut session = Session::new(self.acquire_engine(&url)?);
        let result = schema
            .construct(&mut session)
            .map_err(SchemaError::database("construct", &url));
        session.close();
        result
    }

    /// Drops the database, only possible with an `admin_url`
    pub fn drop_schema(&self, tokens: Tokens<'_>) -> Result<(), SchemaError> {
        let Some(admin_url) = self.admin_url() else {
            return Ok(());
        };

        let url = self.expand_url(tokens);
        let connector = self.connectors.for_url(&url)?;
        connector
            .drop_database(admin_url, database_name(&url))
            .map_err(SchemaError::database("drop", &url))
    }

    /// Disposes and forgets all cached engines
    pub fn purge(&self) {
        let mut engines = self.engines.write();
        for engine in engines.values() {
            engine.dispose();
        }
        tracing::debug!("Purged {} engines of schema '{}'", engines.len(), self.schema());
        engines.clear();
    }

    fn create(
        &self,
        schema: &Schema,
        connector: &dyn Connector,
        url: &str,
        name: &str,
    ) -> Result<(), SchemaError> {
        tracing::info!("Creating schema '{}' at '{url}'", schema.name());
        connector
            .create_database(self.admin_url(), name)
            .map_err(SchemaError::database("create", url))?;

        if let Some(migrations) = self.migrations(schema)? {
            if migrations.has_revisions() {
                let engine = self.acquire_engine(url)?;
                migrations
                    .stamp(engine.as_ref())
                    .map_err(SchemaError::database("stamp", url))?;
            }
        }
        Ok(())
    }

    fn migrations<'a>(
        &self,
        schema: &'a Schema,
    ) -> Result<Option<&'a Arc<dyn Migrations>>, SchemaError> {
        let Some(name) = &self.settings.migrations else {
            return Ok(None);
        };
        schema
            .get_migrations(name)
            .map(Some)
            .ok_or_else(|| SchemaError::MissingMigrations {
                schema: schema.name().to_owned(),
                migrations: name.clone(),
            })
    }

    fn acquire_engine(&self, url: &str) -> Result<Arc<dyn Engine>, SchemaError> {
        if let Some(engine) = self.engines.read().get(url) {
            return Ok(engine.clone());
        }

        let mut engines = self.engines.write();
        if let Some(engine) = engines.get(url) {
            return Ok(engine.clone());
        }

        let engine = self
            .connectors
            .for_url(url)?
            .connect(url, self.echo())
            .map_err(SchemaError::database("connect", url))?;
        tracing::debug!("Created engine for '{url}'");
        engines.insert(url.to_owned(), engine.clone());
        Ok(engine)
    }
}

fn database_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Dependency on the [SchemaInterface] of one schema
///
/// Resolves under the token `schema:<name>` and contributes the schema name
/// to the interface's configuration.
#[derive(Debug, Clone)]
pub struct SchemaDependency {
    schema: String,
    optional: bool,
    deferred: bool,
}

impl SchemaDependency {
    pub fn new(schema: impl Into<String>) -> Self {
        SchemaDependency {
            schema: schema.into(),
            optional: false,
            deferred: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Resolves the interface on the current assembly
    pub fn get(&self) -> Result<Arc<SchemaInterface>, AssemblyError> {
        let token = SchemaInterface::token(&self.schema);
        Assembly::current()
            .resolve::<SchemaInterface>(self.clone())?
            .ok_or(AssemblyError::MissingRequiredDependency {
                token,
                required_by: "(adhoc)".to_owned(),
                reason: None,
            })
    }
}

impl From<SchemaDependency> for Dependency {
    fn from(value: SchemaDependency) -> Self {
        let mut dependency = Dependency::on::<SchemaInterface>()
            .token(SchemaInterface::token(&value.schema))
            .contribute("schema", value.schema);
        if value.optional {
            dependency = dependency.optional();
        }
        if value.deferred {
            dependency = dependency.deferred();
        }
        dependency
    }
}
