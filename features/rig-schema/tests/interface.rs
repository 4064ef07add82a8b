use std::sync::{Arc, Mutex};

use rig_assembly::{Assembly, AssemblyError, Construction, Declaration, DynError, Unit};
use rig_config::SchemaRegistry;
use rig_schema::{
    Connector, Connectors, Engine, MemoryConnector, Migrations, Schema, SchemaCatalog, SchemaDependency,
    SchemaError, SchemaInterface, SessionContext,
};
use serde_json::{json, Map, Value};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

fn isolated() -> Assembly {
    Assembly::with_registry(Arc::new(SchemaRegistry::new()))
}

struct Accounts {
    schema: Arc<SchemaInterface>,
}
impl Unit for Accounts {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("test:accounts")
            .dependency("schema", SchemaDependency::new("example"))
    }

    fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
        Ok(Accounts {
            schema: construction.dependency("schema")?,
        })
    }
}

struct Billing {
    schema: Arc<SchemaInterface>,
}
impl Unit for Billing {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("test:billing")
            .dependency("schema", SchemaDependency::new("example"))
    }

    fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
        Ok(Billing {
            schema: construction.dependency("schema")?,
        })
    }
}

struct Reports {
    schema: Option<Arc<SchemaInterface>>,
}
impl Unit for Reports {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("test:reports")
            .dependency("schema", SchemaDependency::new("reports").optional())
    }

    fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
        Ok(Reports {
            schema: construction.dependency("schema")?,
        })
    }
}

#[test]
fn test_units_share_configured_interface() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {"url": "sqlite:///tmp/ex.db"}})))
        .unwrap();

    let accounts = assembly.instantiate::<Accounts>().unwrap();
    let billing = assembly.instantiate::<Billing>().unwrap();

    assert_eq!(accounts.schema.url(), "sqlite:///tmp/ex.db");
    assert_eq!(accounts.schema.schema(), "example");
    assert!(!accounts.schema.echo());
    assert_eq!(accounts.schema.admin_url(), None);
    assert!(Arc::ptr_eq(&accounts.schema, &billing.schema));
}

#[test]
fn test_unconfigured_interface() {
    let assembly = isolated();

    let reports = assembly.instantiate::<Reports>().unwrap();
    assert!(reports.schema.is_none());

    let error = assembly.instantiate::<Accounts>().err().unwrap();
    assert!(matches!(
        error,
        AssemblyError::MissingRequiredDependency { token, .. } if token == "schema:example"
    ));
}

#[test]
fn test_interface_on_current_assembly() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {"url": "memory:///example"}})))
        .unwrap();

    let _promotion = assembly.enter();
    let interface = SchemaInterface::interface("example").unwrap();
    let accounts = assembly.instantiate::<Accounts>().unwrap();

    assert!(Arc::ptr_eq(&interface, &accounts.schema));
}

#[test]
fn test_engines_are_cached_per_url() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {"url": "memory:///tenant_{tenant}", "echo": "true"}})))
        .unwrap();
    let interface = assembly.instantiate::<Accounts>().unwrap().schema.clone();
    assert!(interface.echo());

    let first = interface.get_engine(&[("tenant", "a")]).unwrap();
    let again = interface.get_engine(&[("tenant", "a")]).unwrap();
    let other = interface.get_engine(&[("tenant", "b")]).unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(first.url(), "memory:///tenant_a");
    assert_eq!(other.url(), "memory:///tenant_b");

    interface.purge();
    let fresh = interface.get_engine(&[("tenant", "a")]).unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert!(first.transaction(&["select 1".to_string()]).is_err());
}

#[test]
fn test_unsupported_scheme() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {"url": "sqlite:///tmp/ex.db"}})))
        .unwrap();
    let interface = assembly.instantiate::<Accounts>().unwrap().schema.clone();

    let error = interface.get_session(&[]).unwrap_err();
    assert!(matches!(error, SchemaError::UnsupportedScheme { scheme, .. } if scheme == "sqlite"));

    let connector = Arc::new(MemoryConnector::new());
    assembly
        .instantiate::<Connectors>()
        .unwrap()
        .register("sqlite", connector.clone());

    let mut session = interface.get_independent_session(&[]).unwrap();
    session.execute("create table accounts (id integer)").unwrap();
    session.commit().unwrap();
    assert_eq!(
        connector.engines()[0].statements(),
        vec!["create table accounts (id integer)"]
    );
}

#[test]
fn test_sessions_are_shared_within_a_context() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {"url": "memory:///example"}})))
        .unwrap();
    let connector = Arc::new(MemoryConnector::new());
    assembly
        .instantiate::<Connectors>()
        .unwrap()
        .register("memory", connector.clone());
    let accounts = assembly.instantiate::<Accounts>().unwrap();
    let billing = assembly.instantiate::<Billing>().unwrap();

    let outside = accounts.schema.session().unwrap();
    assert!(!Arc::ptr_eq(&outside, &accounts.schema.session().unwrap()));

    let context = SessionContext::enter();
    let shared = accounts.schema.session().unwrap();
    assert!(Arc::ptr_eq(&shared, &billing.schema.get_session(&[]).unwrap()));

    shared.lock().execute("insert into accounts values (1)").unwrap();
    billing.schema.session().unwrap().lock().commit().unwrap();

    drop(context);
    assert!(shared.lock().is_closed());
    assert!(!outside.lock().is_closed());
    assert_eq!(
        connector.engines()[0].statements(),
        vec!["insert into accounts values (1)"]
    );
}

#[test]
fn test_independent_sessions_are_never_shared() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {"url": "memory:///example"}})))
        .unwrap();
    let interface = assembly.instantiate::<Accounts>().unwrap().schema.clone();

    let _context = SessionContext::enter();
    let shared = interface.session().unwrap();
    let mut independent = interface.get_independent_session(&[]).unwrap();

    independent.execute("insert into accounts values (2)").unwrap();
    independent.close();

    assert!(independent.is_closed());
    assert!(!shared.lock().is_closed());
    shared.lock().execute("select 1").unwrap();
}

#[derive(Clone, Default)]
struct RecordedMigrations {
    calls: Arc<Mutex<Vec<&'static str>>>,
}
impl Migrations for RecordedMigrations {
    fn has_revisions(&self) -> bool {
        true
    }

    fn upgrade(&self, _: &dyn Engine) -> Result<(), DynError> {
        self.calls.lock().unwrap().push("upgrade");
        Ok(())
    }

    fn stamp(&self, _: &dyn Engine) -> Result<(), DynError> {
        self.calls.lock().unwrap().push("stamp");
        Ok(())
    }
}

#[test]
fn test_deploy() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {
            "url": "memory:///example",
            "migrations": "example.migrations",
        }})))
        .unwrap();
    let interface = assembly.instantiate::<Accounts>().unwrap().schema.clone();

    let error = interface.deploy(&[]).unwrap_err();
    assert!(matches!(error, SchemaError::Undeclared(name) if name == "example"));

    let migrations = RecordedMigrations::default();
    assembly.instantiate::<SchemaCatalog>().unwrap().declare(
        Schema::new("example")
            .migrations("example.migrations", migrations.clone())
            .constructor(|session| {
                session.execute("insert into accounts values (1)")?;
                session.commit()?;
                Ok(())
            }),
    );

    interface.deploy(&[]).unwrap();
    interface.deploy(&[]).unwrap();

    assert_eq!(*migrations.calls.lock().unwrap(), vec!["stamp", "upgrade"]);
    let engine = interface.get_engine(&[]).unwrap();
    let connectors = assembly.instantiate::<Connectors>().unwrap();
    let connector = connectors.get("memory").unwrap();
    assert!(connector.is_database_present(None, "example").unwrap());
    assert_eq!(engine.url(), "memory:///example");
}

#[test]
fn test_deploy_with_unknown_migrations() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {
            "url": "memory:///example",
            "migrations": "missing",
        }})))
        .unwrap();
    let interface = assembly.instantiate::<Accounts>().unwrap().schema.clone();
    assembly
        .instantiate::<SchemaCatalog>()
        .unwrap()
        .declare(Schema::new("example"));

    let error = interface.deploy(&[]).unwrap_err();
    assert!(matches!(error, SchemaError::MissingMigrations { migrations, .. } if migrations == "missing"));
}

#[test]
fn test_drop_schema_needs_admin_url() {
    let assembly = isolated();
    assembly
        .configure(object(json!({"schema:example": {
            "url": "memory:///example",
            "admin_url": "memory:///admin",
        }})))
        .unwrap();
    let interface = assembly.instantiate::<Accounts>().unwrap().schema.clone();
    assembly
        .instantiate::<SchemaCatalog>()
        .unwrap()
        .declare(Schema::new("example"));

    interface.deploy(&[]).unwrap();
    let connector = assembly.instantiate::<Connectors>().unwrap().get("memory").unwrap();
    assert!(connector.is_database_present(None, "example").unwrap());

    interface.drop_schema(&[]).unwrap();
    assert!(!connector.is_database_present(None, "example").unwrap());
}
