use std::path::PathBuf;

/// Errors raised while validating configuration data against a schema
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The value has the wrong shape
    #[error("{path}: expected {expected}, found {found}")]
    InvalidType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A required field is missing and has no default
    #[error("{path}: field is required")]
    Required { path: String },
    /// The field is declared nonnull but is null
    #[error("{path}: value cannot be null")]
    Null { path: String },
    /// The field is declared nonempty but is empty
    #[error("{path}: value cannot be empty")]
    Empty { path: String },
    /// A sequence declared unique contains a duplicate
    #[error("{path}: duplicate value {value}")]
    Duplicate { path: String, value: String },
    /// The structure does not recognize the field
    #[error("{path}: unknown field")]
    Unknown { path: String },
}

impl ValidationError {
    /// The dotted path of the offending value
    pub fn path(&self) -> &str {
        match self {
            ValidationError::InvalidType { path, .. }
            | ValidationError::Required { path }
            | ValidationError::Null { path }
            | ValidationError::Empty { path }
            | ValidationError::Duplicate { path, .. }
            | ValidationError::Unknown { path } => path,
        }
    }
}

/// Errors when loading configuration from a file
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// The file extension is not a supported format
    #[error("Unsupported configuration format: '{0}'")]
    UnsupportedFormat(PathBuf),
    /// The file does not exist
    #[error("Configuration file not found: '{0}'")]
    Missing(PathBuf),
    /// The root section is absent from the loaded file
    #[error("Configuration file '{path}' has no '{root}' section")]
    MissingRoot { path: PathBuf, root: String },
    /// The file could not be parsed or extracted
    #[error(transparent)]
    Extract(#[from] Box<figment::Error>),
}

impl From<figment::Error> for SourceError {
    fn from(error: figment::Error) -> Self {
        Self::Extract(Box::new(error))
    }
}
