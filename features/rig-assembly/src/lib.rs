//! Rig Assembly wires configured units together.
//!
//! Rig Assembly is split into the following parts:
//! 1. [Assembly] - container constructing every unit at most once and holding the configuration tree
//! 2. Current assembly - the assembly promoted on the calling thread, falling back to [Assembly::standard]
//! 3. [Unit] - a configurable component declaring its schema, dependencies and facets
//! 4. [Dependency] - a declared link to another unit, eager or [Deferred], required or optional
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rig_assembly::{Assembly, Construction, Declaration, Dependency, DynError, Unit};
//! use rig_config::{Field, Structure};
//! use serde_json::json;
//!
//! struct Store {
//!     path: String,
//! }
//! impl Unit for Store {
//!     fn declare() -> Declaration<Self> {
//!         Declaration::new()
//!             .identity("example:store")
//!             .configuration(Structure::new().field("path", Field::text().nonempty()))
//!     }
//!
//!     fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
//!         Ok(Store {
//!             path: construction.configuration().property("path")?,
//!         })
//!     }
//! }
//!
//! struct Service {
//!     store: Arc<Store>,
//! }
//! impl Unit for Service {
//!     fn declare() -> Declaration<Self> {
//!         Declaration::new()
//!             .identity("example:service")
//!             .dependency("store", Dependency::on::<Store>())
//!     }
//!
//!     fn construct(construction: &Construction<'_>) -> Result<Self, DynError> {
//!         Ok(Service {
//!             store: construction.dependency("store")?,
//!         })
//!     }
//! }
//!
//! let assembly = Assembly::with_registry(Default::default());
//! assembly.register::<Service>();
//! assembly
//!     .configure(json!({"example:store": {"path": "/tmp/store"}}).as_object().unwrap().clone())
//!     .unwrap();
//!
//! let service: Arc<Service> = assembly.instantiate().unwrap();
//! let store: Arc<Store> = assembly.instantiate().unwrap();
//! assert!(Arc::ptr_eq(&service.store, &store));
//! assert_eq!(store.path, "/tmp/store");
//! ```

pub mod assembly;
pub mod catalog;
pub mod construction;
pub mod current;
pub mod dependency;
pub mod errors;
pub mod resolver;
pub mod types;
pub mod unit;

pub use assembly::Assembly;
pub use catalog::UnitCatalog;
pub use construction::{Construction, UnitConfiguration};
pub use current::{adhoc_configure, get_unit, Promotion};
pub use dependency::{Dependency, DependencySlot};
pub use errors::AssemblyError;
pub use resolver::{
    deferred::{Deferred, DeferredOption},
    Resolver,
};
pub use types::{DependencyInfo, DynError, Facets, Injectable, Instance, TypeInfo};
pub use unit::{Declaration, Unit, UnitDescriptor};
