use std::sync::Arc;

use rig_assembly::{Assembly, AssemblyError, Construction, Declaration, Dependency, DynError, Unit};
use rig_config::SchemaRegistry;

trait Greeting: Send + Sync {
    fn greet(&self) -> String;
}

struct English;
impl Greeting for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}
impl Unit for English {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("greeting:english")
            .facet::<dyn Greeting>(|unit| unit)
    }

    fn construct(_: &Construction<'_>) -> Result<Self, DynError> {
        Ok(English)
    }
}

struct German;
impl Greeting for German {
    fn greet(&self) -> String {
        "hallo".to_string()
    }
}
impl Unit for German {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("greeting:german")
            .facet::<dyn Greeting>(|unit| unit)
    }

    fn construct(_: &Construction<'_>) -> Result<Self, DynError> {
        Ok(German)
    }
}

/// Holds a greeting without being one
struct Host {
    greeting: Arc<German>,
}
impl Unit for Host {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("test:host")
            .dependency("greeting", Dependency::on::<German>())
    }

    fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
        Ok(Host {
            greeting: construction.dependency("greeting")?,
        })
    }
}

/// Defers its greeting until collated
struct LazyHost;
impl Unit for LazyHost {
    fn declare() -> Declaration<Self> {
        Declaration::new()
            .identity("test:lazy-host")
            .dependency("greeting", Dependency::on::<English>().deferred())
    }

    fn construct(_: &Construction<'_>) -> Result<Self, DynError> {
        Ok(LazyHost)
    }
}

fn isolated() -> Assembly {
    Assembly::with_registry(Arc::new(SchemaRegistry::new()))
}

#[test]
fn test_collate_single_none() {
    let assembly = isolated();
    assert!(assembly.collate_single::<dyn Greeting>().unwrap().is_none());
    assert!(assembly.collate::<dyn Greeting>().unwrap().is_empty());
}

#[test]
fn test_collate_single_one() {
    let assembly = isolated();
    assembly.instantiate::<English>().unwrap();

    let greeting = assembly.collate_single::<dyn Greeting>().unwrap().unwrap();
    assert_eq!(greeting.greet(), "hello");
}

#[test]
fn test_collate_single_ambiguous() {
    let assembly = isolated();
    assembly.instantiate::<English>().unwrap();
    assembly.instantiate::<German>().unwrap();

    let error = assembly.collate_single::<dyn Greeting>().err().unwrap();
    match error {
        AssemblyError::AmbiguousSingleton { identities, .. } => {
            assert_eq!(identities, vec!["greeting:english", "greeting:german"])
        }
        other => panic!("unexpected error {other:?}"),
    }

    let mut greetings: Vec<String> = assembly
        .collate::<dyn Greeting>()
        .unwrap()
        .iter()
        .map(|greeting| greeting.greet())
        .collect();
    greetings.sort();
    assert_eq!(greetings, vec!["hallo", "hello"]);
}

#[test]
fn test_collate_concrete_type() {
    let assembly = isolated();
    assembly.instantiate::<Host>().unwrap();

    let hosts = assembly.collate::<Host>().unwrap();
    assert_eq!(hosts.len(), 1);
    assert!(assembly.collate::<English>().unwrap().is_empty());
}

#[test]
fn test_collate_counts_shared_dependency_once() {
    let assembly = isolated();
    let host = assembly.instantiate::<Host>().unwrap();

    let greeting = assembly.collate_single::<dyn Greeting>().unwrap().unwrap();
    assert_eq!(greeting.greet(), host.greeting.greet());
}

#[test]
fn test_collate_resolves_deferred_dependencies() {
    let assembly = isolated();
    assembly.instantiate::<LazyHost>().unwrap();
    assert!(!assembly.is_cached("greeting:english"));
    assert!(!assembly.is_current());

    let greeting = assembly.collate_single::<dyn Greeting>().unwrap().unwrap();
    assert_eq!(greeting.greet(), "hello");
    assert!(assembly.is_cached("greeting:english"));
    assert!(!Assembly::standard().is_cached("greeting:english"));
}
