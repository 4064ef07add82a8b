//! Rig Daemon runs an assembly as a long lived process.
//!
//! The runtime loads the configuration, deploys the units listed under
//! `units`, then runs the one unit carrying the [Daemon] facet.
//!
//! ```toml
//! [rig]
//! units = ["example:worker"]
//!
//! [rig."schema:example"]
//! url = "memory:///example"
//! ```
//!
//! ```rust,ignore
//! let runtime = Runtime::builder()
//!     .unit::<Worker>()
//!     .source(ConfigurationSource::file("rig.toml"))
//!     .logging("info")
//!     .build()?;
//! runtime.run()?;
//! ```
//!
//! Startup errors are returned from [RuntimeBuilder::build], nothing is run
//! in a partially deployed state.

pub mod daemon;
pub mod errors;
pub mod logging;
pub mod runtime;

pub use daemon::Daemon;
pub use errors::RuntimeError;
pub use logging::{init_logging, LOG_ENV};
pub use runtime::{Runtime, RuntimeBuilder, UNITS_KEY};
