//! Rig Config holds the configuration side of an assembly.
//!
//! Rig Config is split into the following parts:
//! 1. Schema - validation rules ([Structure], [Field]) coercing raw data into typed values
//! 2. Registry - the [SchemaRegistry] mapping configuration tokens to schemas
//! 3. Merge - [recursive_merge], used whenever configuration trees are combined
//! 4. Source - [ConfigurationSource], loading a configuration tree from a file
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rig_config::{Field, Schema, SchemaRegistry, Structure};
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::new();
//! registry.register(
//!     "schema:example",
//!     Arc::new(
//!         Structure::new()
//!             .field("url", Field::text().nonempty())
//!             .field("echo", Field::boolean().default(false)),
//!     ),
//! );
//!
//! let schema = registry.get("schema:example").unwrap();
//! let data = schema.process(json!({"url": "sqlite:///tmp/ex.db"}), true).unwrap();
//! assert_eq!(data["echo"], json!(false));
//! ```

pub mod errors;
pub mod merge;
pub mod registry;
pub mod schema;
pub mod source;

pub use errors::{SourceError, ValidationError};
pub use merge::{merge_value, recursive_merge};
pub use registry::SchemaRegistry;
pub use schema::{Field, Kind, Schema, Structure};
pub use source::{ConfigurationSource, DEFAULT_ROOT};
