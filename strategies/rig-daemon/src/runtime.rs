use std::{fmt::Debug, sync::Arc};

use rig_assembly::{Assembly, Unit};
use rig_config::{recursive_merge, ConfigurationSource, Field, Schema};
use serde_json::{Map, Value};

use crate::{daemon::Daemon, errors::RuntimeError, logging::init_logging};

/// Configuration key listing the units to deploy
pub const UNITS_KEY: &str = "units";

/// A deployed assembly with its single [Daemon]
pub struct Runtime {
    assembly: Assembly,
    units: Vec<String>,
    daemon: Arc<dyn Daemon>,
}
impl Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("assembly", &self.assembly)
            .field("units", &self.units)
            .finish()
    }
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    /// Identities of the deployed units, in deployment order
    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Runs the daemon with the runtime's assembly promoted on the calling thread
    pub fn run(&self) -> Result<(), RuntimeError> {
        let _promotion = self.assembly.enter();
        tracing::info!("Running daemon");
        self.daemon.run().map_err(RuntimeError::Daemon)?;
        tracing::info!("Daemon stopped");
        Ok(())
    }
}

type Registration = fn(&Assembly);

/// Collects units and configuration, then deploys them into a [Runtime]
#[derive(Default)]
pub struct RuntimeBuilder {
    assembly: Option<Assembly>,
    registrations: Vec<Registration>,
    sources: Vec<ConfigurationSource>,
    configuration: Map<String, Value>,
    logging: Option<String>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy into `assembly` instead of the current one
    pub fn assembly(mut self, assembly: Assembly) -> Self {
        self.assembly = Some(assembly);
        self
    }

    /// Makes `U` deployable by identity
    pub fn unit<U: Unit>(mut self) -> Self {
        self.registrations.push(|assembly| {
            assembly.register::<U>();
        });
        self
    }

    /// Loads configuration from a file, later sources override earlier ones
    pub fn source(mut self, source: ConfigurationSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Configuration applied on top of all sources
    pub fn configuration(mut self, configuration: Map<String, Value>) -> Self {
        recursive_merge(&mut self.configuration, configuration);
        self
    }

    /// Installs the log subscriber on build, see [init_logging]
    pub fn logging(mut self, default_directives: impl Into<String>) -> Self {
        self.logging = Some(default_directives.into());
        self
    }

    /// Configures the assembly, deploys the listed units and finds the daemon
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        if let Some(directives) = &self.logging {
            init_logging(directives)?;
        }

        let assembly = self.assembly.unwrap_or_else(Assembly::current);
        for registration in &self.registrations {
            registration(&assembly);
        }

        let mut configuration = Map::new();
        for source in &self.sources {
            tracing::debug!("Loading configuration from '{}'", source.path().display());
            recursive_merge(&mut configuration, source.load()?);
        }
        recursive_merge(&mut configuration, self.configuration);
        let units = take_units(&mut configuration)?;

        let promotion = assembly.enter();
        assembly.configure(configuration)?;
        for identity in &units {
            tracing::info!("Deploying '{identity}'");
            assembly.instantiate_named(identity)?;
        }

        let daemon = assembly
            .collate_single::<dyn Daemon>()?
            .ok_or(RuntimeError::NoDaemon)?;
        drop(promotion);

        Ok(Runtime {
            assembly,
            units,
            daemon,
        })
    }
}

fn take_units(configuration: &mut Map<String, Value>) -> Result<Vec<String>, RuntimeError> {
    let schema = Field::sequence(Field::text().nonempty()).unique();
    let units = configuration.remove(UNITS_KEY).unwrap_or(Value::Null);
    let units = if units.is_null() {
        Value::Array(Vec::new())
    } else {
        schema.process(units, true)?
    };

    Ok(match units {
        Value::Array(units) => units
            .into_iter()
            .filter_map(|unit| match unit {
                Value::String(unit) => Some(unit),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
