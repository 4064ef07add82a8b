use std::collections::HashMap;

use parking_lot::RwLock;

use crate::unit::{Unit, UnitDescriptor};

/// Units an assembly can construct by identity string.
///
/// Drivers register every unit they may be asked for by name at startup,
/// e.g. the units listed in a configuration file.
#[derive(Default)]
pub struct UnitCatalog {
    units: RwLock<HashMap<String, UnitDescriptor>>,
}
impl std::fmt::Debug for UnitCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitCatalog")
            .field("identities", &self.identities())
            .finish()
    }
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `U` under its identity
    pub fn register<U: Unit>(&self) -> UnitDescriptor {
        let descriptor = UnitDescriptor::of::<U>();
        self.insert(descriptor.identity(), descriptor.clone());
        descriptor
    }

    /// Registers a descriptor under an additional name
    pub fn alias(&self, name: impl Into<String>, descriptor: UnitDescriptor) {
        self.insert(&name.into(), descriptor);
    }

    pub fn get(&self, identity: &str) -> Option<UnitDescriptor> {
        self.units.read().get(identity).cloned()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.units.read().contains_key(identity)
    }

    pub fn identities(&self) -> Vec<String> {
        let mut identities: Vec<String> = self.units.read().keys().cloned().collect();
        identities.sort();
        identities
    }

    fn insert(&self, name: &str, descriptor: UnitDescriptor) {
        let mut units = self.units.write();
        if let Some(existing) = units.get(name) {
            if existing.info != descriptor.info {
                tracing::warn!(
                    "Replaced unit '{}' registered as '{name}' with '{}'",
                    existing.info.type_name,
                    descriptor.info.type_name
                );
            }
        }
        units.insert(name.to_owned(), descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{types::DynError, unit::Declaration, Assembly, Construction};

    struct Clock;
    impl Unit for Clock {
        fn declare() -> Declaration<Self> {
            Declaration::new().identity("test:clock")
        }

        fn construct(_: &Construction<'_>) -> Result<Self, DynError> {
            Ok(Clock)
        }
    }

    #[test]
    fn test_alias_shares_the_instance() {
        let assembly = Assembly::with_registry(Default::default());
        let descriptor = assembly.catalog().register::<Clock>();
        assembly.catalog().alias("clock", descriptor);

        assert_eq!(assembly.catalog().identities(), vec!["clock", "test:clock"]);
        assert!(assembly.catalog().contains("clock"));

        let aliased = assembly.instantiate_named("clock").unwrap();
        let direct = assembly.instantiate_named("test:clock").unwrap();
        assert_eq!(aliased.identity(), "test:clock");
        assert!(aliased.same(&direct));
    }
}
