use std::{collections::BTreeMap, fmt::Debug};

use serde_json::{Map, Number, Value};

use crate::errors::ValidationError;

/// A validation rule that coerces raw configuration data into its normalized form.
///
/// `serialized` signals that the data was read from a text format, where scalars
/// may arrive as strings (`"42"`, `"true"`) and should be coerced.
pub trait Schema: Send + Sync + Debug {
    fn process(&self, data: Value, serialized: bool) -> Result<Value, ValidationError>;
}

/// Value kinds a [Field] accepts
#[derive(Debug, Clone)]
pub enum Kind {
    Any,
    Text,
    Boolean,
    Integer,
    Float,
    Sequence(Box<Field>),
    Structure(Structure),
}

/// A single configuration option
#[derive(Debug, Clone)]
pub struct Field {
    kind: Kind,
    required: bool,
    nonnull: bool,
    nonempty: bool,
    unique: bool,
    default: Option<Value>,
}

impl Field {
    fn of(kind: Kind) -> Self {
        Field {
            kind,
            required: false,
            nonnull: false,
            nonempty: false,
            unique: false,
            default: None,
        }
    }

    pub fn any() -> Self {
        Self::of(Kind::Any)
    }

    pub fn text() -> Self {
        Self::of(Kind::Text)
    }

    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }

    pub fn float() -> Self {
        Self::of(Kind::Float)
    }

    pub fn sequence(item: Field) -> Self {
        Self::of(Kind::Sequence(Box::new(item)))
    }

    pub fn structure(structure: Structure) -> Self {
        Self::of(Kind::Structure(structure))
    }

    /// The field must be present, unless it has a default
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// The field may be absent, but never null
    pub fn nonnull(mut self) -> Self {
        self.nonnull = true;
        self
    }

    /// The field must be present, non null and not empty
    pub fn nonempty(mut self) -> Self {
        self.required = true;
        self.nonnull = true;
        self.nonempty = true;
        self
    }

    /// Sequence items must be distinct
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Value used when the field is absent
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn process_at(&self, path: &str, value: Value, serialized: bool) -> Result<Value, ValidationError> {
        if value.is_null() {
            if self.nonnull {
                return Err(ValidationError::Null { path: path.to_owned() });
            }
            return Ok(Value::Null);
        }

        let value = match &self.kind {
            Kind::Any => value,
            Kind::Text => match value {
                Value::String(_) => value,
                other => return Err(invalid(path, "text", &other)),
            },
            Kind::Boolean => match value {
                Value::Bool(_) => value,
                Value::String(text) if serialized => {
                    let parsed = match text.to_ascii_lowercase().as_str() {
                        "true" | "yes" | "on" => Some(true),
                        "false" | "no" | "off" => Some(false),
                        _ => None,
                    };
                    match parsed {
                        Some(flag) => Value::Bool(flag),
                        None => return Err(invalid(path, "boolean", &Value::String(text))),
                    }
                }
                other => return Err(invalid(path, "boolean", &other)),
            },
            Kind::Integer => match value {
                Value::Number(number) if number.is_i64() || number.is_u64() => Value::Number(number),
                Value::String(text) if serialized => {
                    let parsed = text.trim().parse::<i64>().ok();
                    match parsed {
                        Some(parsed) => Value::Number(parsed.into()),
                        None => return Err(invalid(path, "integer", &Value::String(text))),
                    }
                }
                other => return Err(invalid(path, "integer", &other)),
            },
            Kind::Float => match value {
                Value::Number(_) => value,
                Value::String(text) if serialized => {
                    let parsed = text.trim().parse::<f64>().ok().and_then(Number::from_f64);
                    match parsed {
                        Some(number) => Value::Number(number),
                        None => return Err(invalid(path, "float", &Value::String(text))),
                    }
                }
                other => return Err(invalid(path, "float", &other)),
            },
            Kind::Sequence(item) => match value {
                Value::Array(items) => {
                    let mut processed: Vec<Value> = Vec::with_capacity(items.len());
                    for (index, entry) in items.into_iter().enumerate() {
                        let entry_path = format!("{path}[{index}]");
                        let entry = item.process_at(&entry_path, entry, serialized)?;
                        if self.unique && processed.contains(&entry) {
                            return Err(ValidationError::Duplicate {
                                path: entry_path,
                                value: entry.to_string(),
                            });
                        }
                        processed.push(entry);
                    }
                    Value::Array(processed)
                }
                other => return Err(invalid(path, "sequence", &other)),
            },
            Kind::Structure(structure) => structure.process_at(path, value, serialized)?,
        };

        if self.nonempty && is_empty(&value) {
            return Err(ValidationError::Empty { path: path.to_owned() });
        }

        Ok(value)
    }
}

/// A mapping of recognized option names to their fields
///
/// Unknown keys are rejected unless the structure is [lenient](Structure::lenient).
#[derive(Debug, Clone, Default)]
pub struct Structure {
    fields: BTreeMap<String, Field>,
    lenient: bool,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Pass unrecognized keys through untouched
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    fn process_at(&self, path: &str, value: Value, serialized: bool) -> Result<Value, ValidationError> {
        let entries = match value {
            Value::Object(entries) => entries,
            other => return Err(invalid(path, "structure", &other)),
        };

        let mut processed = Map::new();
        for (key, entry) in entries {
            let entry_path = join(path, &key);
            match self.fields.get(&key) {
                Some(field) => {
                    let entry = field.process_at(&entry_path, entry, serialized)?;
                    processed.insert(key, entry);
                }
                None if self.lenient => {
                    processed.insert(key, entry);
                }
                None => return Err(ValidationError::Unknown { path: entry_path }),
            }
        }

        for (name, field) in &self.fields {
            if processed.contains_key(name) {
                continue;
            }
            if let Some(default) = &field.default {
                processed.insert(name.clone(), default.clone());
            } else if field.required {
                return Err(ValidationError::Required { path: join(path, name) });
            }
        }

        Ok(Value::Object(processed))
    }
}

impl Schema for Structure {
    fn process(&self, data: Value, serialized: bool) -> Result<Value, ValidationError> {
        self.process_at("", data, serialized)
    }
}

impl Schema for Field {
    fn process(&self, data: Value, serialized: bool) -> Result<Value, ValidationError> {
        self.process_at("", data, serialized)
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}

fn invalid(path: &str, expected: &'static str, found: &Value) -> ValidationError {
    ValidationError::InvalidType {
        path: if path.is_empty() { "(root)".to_owned() } else { path.to_owned() },
        expected,
        found: describe(found),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "sequence",
        Value::Object(_) => "structure",
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interface_schema() -> Structure {
        Structure::new()
            .field("url", Field::text().nonempty())
            .field("echo", Field::boolean().default(false))
            .field("timeout", Field::integer().default(180))
            .field("admin_url", Field::text().nonnull())
    }

    #[test]
    fn test_defaults_are_filled() {
        let processed = interface_schema()
            .process(json!({"url": "sqlite:///tmp/ex.db"}), false)
            .unwrap();

        assert_eq!(
            processed,
            json!({"url": "sqlite:///tmp/ex.db", "echo": false, "timeout": 180})
        );
    }

    #[test]
    fn test_required_field_missing() {
        let error = interface_schema().process(json!({"echo": true}), false).unwrap_err();
        assert_eq!(error, ValidationError::Required { path: "url".to_string() });
    }

    #[test]
    fn test_nonempty_and_nonnull() {
        let error = interface_schema().process(json!({"url": ""}), false).unwrap_err();
        assert!(matches!(error, ValidationError::Empty { .. }));

        let error = interface_schema()
            .process(json!({"url": "a", "admin_url": null}), false)
            .unwrap_err();
        assert_eq!(error, ValidationError::Null { path: "admin_url".to_string() });
    }

    #[test]
    fn test_serialized_scalars_are_coerced() {
        let data = json!({"url": "a", "echo": "true", "timeout": "30"});

        let processed = interface_schema().process(data.clone(), true).unwrap();
        assert_eq!(processed["echo"], json!(true));
        assert_eq!(processed["timeout"], json!(30));

        let error = interface_schema().process(data, false).unwrap_err();
        assert!(matches!(
            error,
            ValidationError::InvalidType { expected: "boolean", .. }
        ));
    }

    #[test]
    fn test_unknown_fields() {
        let error = interface_schema()
            .process(json!({"url": "a", "bogus": 1}), false)
            .unwrap_err();
        assert_eq!(error, ValidationError::Unknown { path: "bogus".to_string() });

        let processed = interface_schema()
            .lenient()
            .process(json!({"url": "a", "bogus": 1}), false)
            .unwrap();
        assert_eq!(processed["bogus"], json!(1));
    }

    #[test]
    fn test_nested_paths_in_errors() {
        let schema = Structure::new().field(
            "bundles",
            Field::sequence(Field::structure(
                Structure::new().field("name", Field::text().required()),
            ))
            .unique(),
        );

        let error = schema
            .process(json!({"bundles": [{"name": "a"}, {}]}), false)
            .unwrap_err();
        assert_eq!(error.path(), "bundles[1].name");

        let error = schema
            .process(json!({"bundles": [{"name": "a"}, {"name": "a"}]}), false)
            .unwrap_err();
        assert!(matches!(error, ValidationError::Duplicate { .. }));
    }

    #[test]
    fn test_root_must_be_structure() {
        let error = interface_schema().process(json!([1, 2]), false).unwrap_err();
        assert_eq!(
            error,
            ValidationError::InvalidType {
                path: "(root)".to_string(),
                expected: "structure",
                found: "sequence",
            }
        );
    }
}
