//! Structural schemas and validation of loosely typed values
//!
//! A [`Schema`] is an ordered list of named, typed fields. Validating a
//! `serde_json::Value` against it yields a [`Record`] with defaults applied,
//! or a [`SchemaValidationError`] carrying every violation found.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Declared type of a schema field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "of", rename_all = "lowercase")]
pub enum FieldType {
    /// Any JSON value, including null
    Any,
    Bool,
    Integer,
    /// Any JSON number (integers included)
    Float,
    String,
    /// Homogeneous list
    List(Box<FieldType>),
    /// String-keyed mapping with homogeneous values
    Map(Box<FieldType>),
    /// Nested structure with its own schema
    Object(Box<Schema>),
}

impl FieldType {
    pub fn list(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    pub fn map(values: FieldType) -> Self {
        FieldType::Map(Box::new(values))
    }

    pub fn object(schema: Schema) -> Self {
        FieldType::Object(Box::new(schema))
    }

    /// Check that values of this (producer) type can always be accepted by `consumer`
    fn check_assignable(&self, consumer: &FieldType, path: &str) -> Result<(), Incompatibility> {
        match (self, consumer) {
            (_, FieldType::Any) => Ok(()),
            (FieldType::Integer, FieldType::Float) => Ok(()),
            (FieldType::List(produced), FieldType::List(accepted))
            | (FieldType::Map(produced), FieldType::Map(accepted)) => {
                produced.check_assignable(accepted, &format!("{}[]", path))
            }
            (FieldType::Object(produced), FieldType::Object(accepted)) => {
                check_fields(produced, accepted, path)
            }
            (FieldType::Bool, FieldType::Bool)
            | (FieldType::Integer, FieldType::Integer)
            | (FieldType::Float, FieldType::Float)
            | (FieldType::String, FieldType::String) => Ok(()),
            _ => Err(Incompatibility::TypeMismatch {
                field: path.to_string(),
                expected: consumer.to_string(),
                found: self.to_string(),
            }),
        }
    }

    /// Check a value against this type, returning the normalized value
    fn check(
        &self,
        value: &Value,
        path: &str,
        unknown: Option<UnknownFields>,
        violations: &mut Vec<Violation>,
    ) -> Value {
        let matches = match self {
            FieldType::Any => true,
            FieldType::Bool => value.is_boolean(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::String => value.is_string(),
            FieldType::List(inner) => {
                if let Value::Array(items) = value {
                    return Value::Array(
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| {
                                inner.check(item, &format!("{}[{}]", path, i), unknown, violations)
                            })
                            .collect(),
                    );
                }
                false
            }
            FieldType::Map(inner) => {
                if let Value::Object(entries) = value {
                    return Value::Object(
                        entries
                            .iter()
                            .map(|(key, item)| {
                                let item = inner.check(item, &join(path, key), unknown, violations);
                                (key.clone(), item)
                            })
                            .collect(),
                    );
                }
                false
            }
            FieldType::Object(schema) => {
                if value.is_object() {
                    return Value::Object(schema.check_object(value, path, unknown, violations));
                }
                false
            }
        };

        if !matches {
            violations.push(Violation {
                path: path.to_string(),
                kind: ViolationKind::WrongType {
                    expected: self.to_string(),
                    found: kind_of(value).to_string(),
                },
            });
        }
        value.clone()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Any => write!(f, "any"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Float => write!(f, "float"),
            FieldType::String => write!(f, "string"),
            FieldType::List(inner) => write!(f, "list<{}>", inner),
            FieldType::Map(inner) => write!(f, "map<{}>", inner),
            FieldType::Object(schema) => write!(f, "object<{}>", schema.name),
        }
    }
}

/// What to do with fields a value carries but the schema does not declare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFields {
    /// Drop them from the validated record
    #[default]
    Ignore,
    /// Report each one as a violation
    Forbid,
    /// Keep them verbatim
    Allow,
}

/// A single named field of a schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Optional fields may be absent or null
    pub optional: bool,
    /// Value inserted when the field is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Field {
    /// A field is required when it is neither optional nor defaulted
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

/// Structural contract for a value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    unknown_fields: UnknownFields,
}

impl Schema {
    /// Create an empty schema; add fields with the builder methods
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            unknown_fields: UnknownFields::default(),
        }
    }

    /// Add a required field
    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.push(Field {
            name: name.into(),
            ty,
            optional: false,
            default: None,
        })
    }

    /// Add a field that may be absent or null
    pub fn optional(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.push(Field {
            name: name.into(),
            ty,
            optional: true,
            default: None,
        })
    }

    /// Add a field filled with `default` when absent
    pub fn with_default(self, name: impl Into<String>, ty: FieldType, default: impl Into<Value>) -> Self {
        self.push(Field {
            name: name.into(),
            ty,
            optional: false,
            default: Some(default.into()),
        })
    }

    /// Set the unknown-field policy
    pub fn unknown_fields(mut self, policy: UnknownFields) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Field names are unique within a schema; a duplicate is a definition bug.
    fn push(mut self, field: Field) -> Self {
        assert!(
            self.get(&field.name).is_none(),
            "schema '{}' declares field '{}' more than once",
            self.name,
            field.name
        );
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn unknown_field_policy(&self) -> UnknownFields {
        self.unknown_fields
    }

    /// Names of all required fields, in declaration order
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| f.is_required()).map(|f| f.name.as_str())
    }

    /// Validate `value`, applying defaults and this schema's unknown-field policy.
    ///
    /// Every violation is collected before returning, so the error describes
    /// all offending fields rather than only the first.
    pub fn validate(&self, value: &Value) -> Result<Record, SchemaValidationError> {
        self.validate_with(value, None)
    }

    /// Validate `value` as input handed over from another step.
    ///
    /// Same as [`Schema::validate`] except that undeclared fields are always
    /// dropped: a producer may carry more than the consumer asks for.
    pub fn conform(&self, value: &Value) -> Result<Record, SchemaValidationError> {
        self.validate_with(value, Some(UnknownFields::Ignore))
    }

    fn validate_with(
        &self,
        value: &Value,
        unknown: Option<UnknownFields>,
    ) -> Result<Record, SchemaValidationError> {
        let mut violations = Vec::new();
        let fields = self.check_object(value, "", unknown, &mut violations);

        if violations.is_empty() {
            Ok(Record(fields))
        } else {
            Err(SchemaValidationError {
                schema: self.name.clone(),
                violations,
            })
        }
    }

    fn check_object(
        &self,
        value: &Value,
        path: &str,
        unknown: Option<UnknownFields>,
        violations: &mut Vec<Violation>,
    ) -> Map<String, Value> {
        let Value::Object(given) = value else {
            violations.push(Violation {
                path: path.to_string(),
                kind: ViolationKind::NotAnObject {
                    found: kind_of(value).to_string(),
                },
            });
            return Map::new();
        };

        let mut out = Map::new();
        for field in &self.fields {
            let field_path = join(path, &field.name);
            match given.get(&field.name) {
                None => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.clone(), default.clone());
                    } else if !field.optional {
                        violations.push(Violation {
                            path: field_path,
                            kind: ViolationKind::Missing,
                        });
                    }
                }
                Some(Value::Null) if field.optional => {
                    out.insert(field.name.clone(), Value::Null);
                }
                Some(raw) => {
                    let checked = field.ty.check(raw, &field_path, unknown, violations);
                    out.insert(field.name.clone(), checked);
                }
            }
        }

        let policy = unknown.unwrap_or(self.unknown_fields);
        for (key, raw) in given {
            if self.get(key).is_some() {
                continue;
            }
            match policy {
                UnknownFields::Ignore => {}
                UnknownFields::Allow => {
                    out.insert(key.clone(), raw.clone());
                }
                UnknownFields::Forbid => violations.push(Violation {
                    path: join(path, key),
                    kind: ViolationKind::Unknown,
                }),
            }
        }

        out
    }
}

/// `true` when every value valid for `producer` is acceptable input for `consumer`
pub fn compatible(producer: &Schema, consumer: &Schema) -> bool {
    check_compatible(producer, consumer).is_ok()
}

/// Structural compatibility check, reporting the first mismatching field.
///
/// Every required consumer field must exist in the producer with an
/// assignable type. Extra producer fields are fine.
pub fn check_compatible(producer: &Schema, consumer: &Schema) -> Result<(), Incompatibility> {
    check_fields(producer, consumer, "")
}

fn check_fields(producer: &Schema, consumer: &Schema, prefix: &str) -> Result<(), Incompatibility> {
    for wanted in &consumer.fields {
        let path = join(prefix, &wanted.name);
        let Some(produced) = producer.get(&wanted.name) else {
            if wanted.is_required() {
                return Err(Incompatibility::MissingField { field: path });
            }
            // Undeclared producer fields pass through untyped under Allow
            if producer.unknown_field_policy() == UnknownFields::Allow && wanted.ty != FieldType::Any {
                return Err(Incompatibility::UndeclaredField { field: path });
            }
            continue;
        };

        // An optional producer field can be null, which only an optional consumer accepts.
        if produced.optional && !wanted.optional {
            return Err(Incompatibility::OptionalField { field: path });
        }
        produced.ty.check_assignable(&wanted.ty, &path)?;
    }
    Ok(())
}

/// Reason two schemas cannot be chained
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Incompatibility {
    #[error("field '{field}' is required but never produced")]
    MissingField { field: String },

    #[error("field '{field}' may be null or absent in the producer output but the consumer requires a value")]
    OptionalField { field: String },

    #[error("field '{field}' is produced as {found} but the consumer expects {expected}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field '{field}' is not declared by a producer that passes undeclared fields through, so its type is unknown")]
    UndeclaredField { field: String },
}

impl Incompatibility {
    pub fn field(&self) -> &str {
        match self {
            Incompatibility::MissingField { field }
            | Incompatibility::OptionalField { field }
            | Incompatibility::TypeMismatch { field, .. }
            | Incompatibility::UndeclaredField { field } => field,
        }
    }
}

/// A value that passed schema validation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.0.get(field).and_then(Value::as_bool)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Deserialize the record into a concrete Rust type
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&Value::Object(self.0.clone()))
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

/// One offending field found during validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted path to the field (`rows[2].name`); empty for the value itself
    pub path: String,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        write!(f, "{}: {}", path, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    WrongType { expected: String, found: String },
    Unknown,
    NotAnObject { found: String },
    /// Rejected while converting into a concrete Rust type
    Invalid { message: String },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => write!(f, "required field is missing"),
            ViolationKind::WrongType { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ViolationKind::Unknown => write!(f, "unknown field"),
            ViolationKind::NotAnObject { found } => write!(f, "expected an object, found {}", found),
            ViolationKind::Invalid { message } => write!(f, "{}", message),
        }
    }
}

/// A value did not match a schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value does not match schema '{schema}': {}", format_violations(.violations))]
pub struct SchemaValidationError {
    pub schema: String,
    pub violations: Vec<Violation>,
}

impl SchemaValidationError {
    /// Wrap a conversion failure that happened after structural validation passed
    pub fn invalid(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            violations: vec![Violation {
                path: String::new(),
                kind: ViolationKind::Invalid {
                    message: message.into(),
                },
            }],
        }
    }

    /// Paths of all offending fields
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }

    pub fn violation_at(&self, path: &str) -> Option<&ViolationKind> {
        self.violations.iter().find(|v| v.path == path).map(|v| &v.kind)
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
