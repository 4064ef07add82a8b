use std::{
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use rig_assembly::{Assembly, AssemblyError, Construction, Declaration, DynError, Unit};
use rig_config::{ConfigurationSource, Field, SchemaRegistry, Structure};
use rig_daemon::{Daemon, Runtime, RuntimeError};
use rig_schema::{SchemaDependency, SchemaInterface};
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

/// Counts its runs, fails once `limit` is reached
struct Worker {
    schema: Arc<SchemaInterface>,
    limit: i64,
    runs: AtomicUsize,
}
impl Daemon for Worker {
    fn run(&self) -> Result<(), DynError> {
        let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if runs as i64 > self.limit {
            return Err(format!("exceeded {} runs", self.limit).into());
        }
        // the runtime's assembly is current while running
        let interface = SchemaInterface::interface("example")?;
        if !Arc::ptr_eq(&interface, &self.schema) {
            return Err("not running on the runtime's assembly".into());
        }
        Ok(())
    }
}
impl Unit for Worker {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("example:worker")
            .configuration(Structure::new().field("limit", Field::integer().default(1)))
            .dependency("schema", SchemaDependency::new("example"))
            .facet::<dyn Daemon>(|unit| unit)
    }

    fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
        Ok(Worker {
            schema: construction.dependency("schema")?,
            limit: construction.configuration().property("limit")?,
            runs: AtomicUsize::new(0),
        })
    }
}

/// A second daemon, deploying both is ambiguous
struct Idle;
impl Daemon for Idle {
    fn run(&self) -> Result<(), DynError> {
        Ok(())
    }
}
impl Unit for Idle {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("example:idle")
            .facet::<dyn Daemon>(|unit| unit)
    }

    fn construct(_: &Construction<'_>) -> Result<Self, DynError> {
        Ok(Idle)
    }
}

#[test]
fn test_runtime_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[rig]
units = ["example:worker"]

[rig."schema:example"]
url = "memory:///example"

[rig."example:worker"]
limit = "2"
"#
    )
    .unwrap();

    let assembly = isolated();
    let runtime = Runtime::builder()
        .assembly(assembly.clone())
        .unit::<Worker>()
        .source(ConfigurationSource::file(file.path()))
        .build()
        .unwrap();

    assert_eq!(runtime.units(), ["example:worker"]);
    assert!(!assembly.is_current());

    runtime.run().unwrap();
    runtime.run().unwrap();
    let error = runtime.run().unwrap_err();
    assert!(matches!(error, RuntimeError::Daemon(_)));

    let worker = assembly.instantiate::<Worker>().unwrap();
    assert_eq!(worker.runs.load(Ordering::SeqCst), 3);
    assert_eq!(worker.schema.url(), "memory:///example");
}

#[test]
fn test_explicit_configuration_overrides_sources() {
    let assembly = isolated();
    let runtime = Runtime::builder()
        .assembly(assembly.clone())
        .unit::<Worker>()
        .configuration(object(json!({
            "units": ["example:worker"],
            "schema:example": {"url": "memory:///first"},
        })))
        .configuration(object(json!({"schema:example": {"url": "memory:///second"}})))
        .build()
        .unwrap();

    runtime.run().unwrap();
    let worker = assembly.instantiate::<Worker>().unwrap();
    assert_eq!(worker.schema.url(), "memory:///second");
}

#[test]
fn test_runtime_without_daemon() {
    let error = Runtime::builder()
        .assembly(isolated())
        .build()
        .unwrap_err();
    assert!(matches!(error, RuntimeError::NoDaemon));
}

#[test]
fn test_runtime_with_two_daemons() {
    let error = Runtime::builder()
        .assembly(isolated())
        .unit::<Worker>()
        .unit::<Idle>()
        .configuration(object(json!({
            "units": ["example:worker", "example:idle"],
            "schema:example": {"url": "memory:///example"},
        })))
        .build()
        .unwrap_err();

    assert!(matches!(
        error,
        RuntimeError::Assembly(AssemblyError::AmbiguousSingleton { identities, .. }) if identities.len() == 2
    ));
}

#[test]
fn test_startup_errors_abort() {
    let error = Runtime::builder()
        .assembly(isolated())
        .configuration(object(json!({"units": ["example:unknown"]})))
        .build()
        .unwrap_err();
    assert!(matches!(error, RuntimeError::Assembly(AssemblyError::UnknownUnit(_))));

    let error = Runtime::builder()
        .assembly(isolated())
        .unit::<Worker>()
        .configuration(object(json!({"units": ["example:worker"]})))
        .build()
        .unwrap_err();
    assert!(matches!(
        error,
        RuntimeError::Assembly(AssemblyError::MissingRequiredDependency { .. })
    ));

    let error = Runtime::builder()
        .assembly(isolated())
        .source(ConfigurationSource::file("/nonexistent/rig.toml"))
        .build()
        .unwrap_err();
    assert!(matches!(error, RuntimeError::Source(_)));
}
