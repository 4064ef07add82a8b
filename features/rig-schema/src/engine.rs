use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock};
use rig_assembly::{Construction, Declaration, DynError, Unit};

use crate::errors::SchemaError;

/// A connection pool to one database
pub trait Engine: Send + Sync + Debug {
    fn url(&self) -> &str;

    /// Runs `statements` in a single transaction
    fn transaction(&self, statements: &[String]) -> Result<(), DynError>;

    /// Closes all pooled connections
    fn dispose(&self);
}

/// Creates engines and manages databases for one url scheme
pub trait Connector: Send + Sync {
    fn connect(&self, url: &str, echo: bool) -> Result<Arc<dyn Engine>, DynError>;

    fn is_database_present(&self, admin_url: Option<&str>, name: &str) -> Result<bool, DynError>;

    fn create_database(&self, admin_url: Option<&str>, name: &str) -> Result<(), DynError>;

    fn drop_database(&self, admin_url: &str, name: &str) -> Result<(), DynError>;
}

/// The url scheme, without any driver suffix (`postgresql+psycopg2` is `postgresql`)
pub fn scheme_of(url: &str) -> Result<&str, SchemaError> {
    let (scheme, _) = url
        .split_once("://")
        .ok_or_else(|| SchemaError::InvalidUrl(url.to_owned()))?;
    let scheme = scheme.split('+').next().unwrap_or(scheme);
    if scheme.is_empty() {
        return Err(SchemaError::InvalidUrl(url.to_owned()));
    }
    Ok(scheme)
}

/// Connectors by url scheme
///
/// `memory` is always available.
pub struct Connectors {
    connectors: RwLock<HashMap<String, Arc<dyn Connector>>>,
}
impl Debug for Connectors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connectors = self.connectors.read();
        let mut schemes: Vec<&String> = connectors.keys().collect();
        schemes.sort();
        f.debug_struct("Connectors").field("schemes", &schemes).finish()
    }
}
impl Default for Connectors {
    fn default() -> Self {
        let connectors = Connectors {
            connectors: Default::default(),
        };
        connectors.register("memory", Arc::new(MemoryConnector::default()));
        connectors
    }
}

impl Unit for Connectors {
    fn declare() -> Declaration<Self> {
        Declaration::new().identity("rig:connectors")
    }

    fn construct(_: &Construction<'_>) -> Result<Self, DynError> {
        Ok(Connectors::default())
    }
}

impl Connectors {
    pub fn register(&self, scheme: impl Into<String>, connector: Arc<dyn Connector>) {
        self.connectors.write().insert(scheme.into(), connector);
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.read().get(scheme).cloned()
    }

    /// The connector responsible for `url`
    pub fn for_url(&self, url: &str) -> Result<Arc<dyn Connector>, SchemaError> {
        let scheme = scheme_of(url)?;
        self.get(scheme).ok_or_else(|| SchemaError::UnsupportedScheme {
            scheme: scheme.to_owned(),
            url: url.to_owned(),
        })
    }
}

/// Connector keeping everything in memory
///
/// Records committed statements per engine, for tests and dry runs.
#[derive(Default)]
pub struct MemoryConnector {
    databases: Mutex<HashSet<String>>,
    engines: Mutex<Vec<Arc<MemoryEngine>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every engine created so far, in creation order
    pub fn engines(&self) -> Vec<Arc<MemoryEngine>> {
        self.engines.lock().clone()
    }

    pub fn databases(&self) -> Vec<String> {
        let mut databases: Vec<String> = self.databases.lock().iter().cloned().collect();
        databases.sort();
        databases
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &str, echo: bool) -> Result<Arc<dyn Engine>, DynError> {
        let engine = Arc::new(MemoryEngine {
            url: url.to_owned(),
            echo,
            statements: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        });
        self.engines.lock().push(engine.clone());
        Ok(engine)
    }

    fn is_database_present(&self, _: Option<&str>, name: &str) -> Result<bool, DynError> {
        Ok(self.databases.lock().contains(name))
    }

    fn create_database(&self, _: Option<&str>, name: &str) -> Result<(), DynError> {
        self.databases.lock().insert(name.to_owned());
        Ok(())
    }

    fn drop_database(&self, _: &str, name: &str) -> Result<(), DynError> {
        self.databases.lock().remove(name);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryEngine {
    url: String,
    echo: bool,
    statements: Mutex<Vec<String>>,
    disposed: AtomicBool,
}

impl MemoryEngine {
    /// Statements committed through this engine
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Engine for MemoryEngine {
    fn url(&self) -> &str {
        &self.url
    }

    fn transaction(&self, statements: &[String]) -> Result<(), DynError> {
        if self.is_disposed() {
            return Err(format!("engine for '{}' has been disposed", self.url).into());
        }
        if self.echo {
            for statement in statements {
                tracing::debug!("{}: {statement}", self.url);
            }
        }
        self.statements.lock().extend_from_slice(statements);
        Ok(())
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_of() {
        assert_eq!(scheme_of("sqlite:///tmp/ex.db").unwrap(), "sqlite");
        assert_eq!(scheme_of("postgresql+psycopg2://localhost/db").unwrap(), "postgresql");
        assert!(matches!(scheme_of("/tmp/ex.db"), Err(SchemaError::InvalidUrl(_))));
        assert!(matches!(scheme_of("://host"), Err(SchemaError::InvalidUrl(_))));
    }

    #[test]
    fn test_connectors() {
        let connectors = Connectors::default();
        assert!(connectors.for_url("memory:///example").is_ok());

        let error = connectors.for_url("sqlite:///tmp/ex.db").err().unwrap();
        assert!(matches!(error, SchemaError::UnsupportedScheme { scheme, .. } if scheme == "sqlite"));

        connectors.register("sqlite", Arc::new(MemoryConnector::new()));
        assert!(connectors.for_url("sqlite:///tmp/ex.db").is_ok());
    }

    #[test]
    fn test_disposed_engine_rejects_statements() {
        let connector = MemoryConnector::new();
        let engine = connector.connect("memory:///example", false).unwrap();

        engine.transaction(&["create table a".to_string()]).unwrap();
        engine.dispose();
        assert!(engine.transaction(&["drop table a".to_string()]).is_err());

        assert_eq!(connector.engines()[0].statements(), vec!["create table a"]);
        assert!(connector.engines()[0].is_disposed());
    }
}
