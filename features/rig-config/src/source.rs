use std::path::{Path, PathBuf};

use figment::{
    providers::{Format, Json, Toml},
    Figment,
};
use serde_json::{Map, Value};

use crate::errors::SourceError;

/// Section of a configuration file holding the assembly configuration
pub const DEFAULT_ROOT: &str = "rig";

/// Loads an assembly configuration tree from a TOML or JSON file.
///
/// The format is picked from the file extension. Only the `root` section of
/// the file is returned, so the same file may carry configuration for other tools.
#[derive(Debug, Clone)]
pub struct ConfigurationSource {
    path: PathBuf,
    root: Option<String>,
}

impl ConfigurationSource {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            root: Some(DEFAULT_ROOT.to_string()),
        }
    }

    /// Extract `root` instead of the default section
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Use the whole file as the configuration tree
    pub fn without_root(mut self) -> Self {
        self.root = None;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Map<String, Value>, SourceError> {
        if !self.path.exists() {
            return Err(SourceError::Missing(self.path.clone()));
        }

        let extension = self
            .path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        let figment = match extension.as_deref() {
            Some("toml") => Figment::new().merge(Toml::file(&self.path)),
            Some("json") => Figment::new().merge(Json::file(&self.path)),
            _ => return Err(SourceError::UnsupportedFormat(self.path.clone())),
        };

        let configuration = match &self.root {
            Some(root) => {
                if !figment.contains(root) {
                    return Err(SourceError::MissingRoot {
                        path: self.path.clone(),
                        root: root.clone(),
                    });
                }
                figment.extract_inner::<Map<String, Value>>(root)?
            }
            None => figment.extract::<Map<String, Value>>()?,
        };

        tracing::debug!(
            "Loaded {} configuration tokens from '{}'",
            configuration.len(),
            self.path.display()
        );
        Ok(configuration)
    }
}
