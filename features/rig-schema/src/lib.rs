//! Rig Schema manages database engines and sessions per logical schema.
//!
//! A [Schema] is declared once in the [SchemaCatalog]. Units reach its
//! database through a [SchemaDependency], which resolves to the
//! [SchemaInterface] configured under `schema:<name>`:
//!
//! ```toml
//! [rig."schema:example"]
//! url = "memory:///example"
//! echo = true
//! ```
//!
//! Work inside a [SessionContext] shares one session per schema:
//!
//! ```rust,ignore
//! let _context = SessionContext::enter();
//! let session = SchemaInterface::interface("example")?.session()?;
//! session.lock().execute("insert into accounts values (1)")?;
//! ```
//!
//! The database itself sits behind the [Connector] and [Engine] traits,
//! [MemoryConnector] keeps everything in memory.

pub mod engine;
pub mod errors;
pub mod interface;
pub mod migrations;
pub mod schema;
pub mod session;

pub use engine::{scheme_of, Connector, Connectors, Engine, MemoryConnector, MemoryEngine};
pub use errors::SchemaError;
pub use interface::{SchemaDependency, SchemaInterface, Tokens};
pub use migrations::Migrations;
pub use schema::{Schema, SchemaCatalog};
pub use session::{Session, SessionContext, SharedSession};
