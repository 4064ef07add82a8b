use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use parking_lot::RwLock;

use crate::schema::Schema;

/// A registry mapping configuration tokens to the schema validating them.
///
/// Tokens are the top-level keys of a configuration tree, e.g. `schema:example`.
/// A process usually shares [SchemaRegistry::standard], which is created once
/// and then read by every assembly built on it.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<dyn Schema>>>,
}

impl Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let schemas = self.schemas.read();
        let mut tokens: Vec<&String> = schemas.keys().collect();
        tokens.sort();
        f.debug_struct("SchemaRegistry").field("tokens", &tokens).finish()
    }
}

impl SchemaRegistry {
    /// Initializes an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn standard() -> Arc<SchemaRegistry> {
        static STANDARD: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();
        STANDARD.get_or_init(|| Arc::new(SchemaRegistry::new())).clone()
    }

    /// Registers `schema` under `token`, replacing any previous schema
    pub fn register(&self, token: impl Into<String>, schema: Arc<dyn Schema>) {
        let token = token.into();
        tracing::debug!("Registered schema for '{token}'");
        self.schemas.write().insert(token, schema);
    }

    /// Registers `schema` under `token` unless a schema is already known for it.
    ///
    /// Returns true if the schema was added.
    pub fn ensure(&self, token: &str, schema: impl FnOnce() -> Arc<dyn Schema>) -> bool {
        if self.schemas.read().contains_key(token) {
            return false;
        }

        let mut schemas = self.schemas.write();
        if schemas.contains_key(token) {
            return false;
        }
        tracing::debug!("Registered schema for '{token}'");
        schemas.insert(token.to_owned(), schema());
        true
    }

    /// Retrieve the schema for `token`, if any
    pub fn get(&self, token: &str) -> Option<Arc<dyn Schema>> {
        self.schemas.read().get(token).cloned()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.schemas.read().contains_key(token)
    }

    pub fn remove(&self, token: &str) -> Option<Arc<dyn Schema>> {
        self.schemas.write().remove(token)
    }

    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.schemas.read().keys().cloned().collect();
        tokens.sort();
        tokens
    }
}
