//! Schema capability consumed by the guard.
//!
//! The guard never validates anything itself. It hands each value to a
//! [`Schema`] and reads back either the accepted value or a list of
//! [`FieldError`]s. Only the first error drives feedback and violation
//! content; the rest are kept for callers that inspect the schema directly.
//!
//! Built-in schemas cover the common cases:
//!
//! | Schema | Use Case |
//! |--------|----------|
//! | [`FnSchema`] | Wrap a closure |
//! | [`RequiredKeys`] | Object keys must be present and non-null |
//! | [`TypedSchema`] | Value must deserialize into a Rust type |
//! | `JsonSchemaValidator` | JSON Schema document (feature: `jsonschema`) |

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Validates a value against a contract.
///
/// Returns the accepted value (schemas may normalise it) or every field
/// error found, in report order.
pub trait Schema: Send + Sync {
    fn validate(&self, value: &Value) -> Result<Value, Vec<FieldError>>;
}

/// Shape of a single field failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// Value is shorter / smaller than allowed.
    TooSmall { minimum: String },
    /// Value is longer / larger than allowed.
    TooBig { maximum: String },
    /// Wrong JSON type.
    InvalidType { expected: String, received: String },
    /// Value is not one of the allowed options.
    InvalidEnum { options: Vec<String> },
    /// A required key is absent or null.
    MissingField,
    /// Anything else; the message carries the detail.
    Custom,
}

/// One field-level validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Path segments from the root value (`["user", "0", "email"]`).
    pub path: Vec<String>,
    /// Human-readable description.
    pub message: String,
    pub issue: Issue,
}

impl FieldError {
    pub fn new(message: impl Into<String>, issue: Issue) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
            issue,
        }
    }

    /// Set the path (builder style).
    pub fn at<S: AsRef<str>>(mut self, path: &[S]) -> Self {
        self.path = path.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Dotted field path, or `None` for the root value.
    pub fn field(&self) -> Option<String> {
        if self.path.is_empty() {
            None
        } else {
            Some(self.path.join("."))
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field() {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// JSON type name of a value, as used in diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Follow `path` into `value`. Array segments are parsed as indices.
pub fn value_at<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// A [`Schema`] backed by a closure.
///
/// # Example
///
/// ```
/// use llm_guard::schema::{FieldError, FnSchema, Issue, Schema};
/// use serde_json::json;
///
/// let positive = FnSchema(|v: &serde_json::Value| match v.as_f64() {
///     Some(n) if n > 0.0 => Ok(v.clone()),
///     _ => Err(vec![FieldError::new("must be positive", Issue::Custom)]),
/// });
/// assert!(positive.validate(&json!(3)).is_ok());
/// assert!(positive.validate(&json!(-1)).is_err());
/// ```
pub struct FnSchema<F>(pub F)
where
    F: Fn(&Value) -> Result<Value, Vec<FieldError>> + Send + Sync;

impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> Result<Value, Vec<FieldError>> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<Value, Vec<FieldError>> {
        (self.0)(value)
    }
}

/// Requires an object whose listed keys exist and are non-null.
#[derive(Debug, Clone)]
pub struct RequiredKeys {
    keys: Vec<String>,
}

impl RequiredKeys {
    pub fn new(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Schema for RequiredKeys {
    fn validate(&self, value: &Value) -> Result<Value, Vec<FieldError>> {
        let Some(map) = value.as_object() else {
            let received = type_name(value);
            return Err(vec![FieldError::new(
                format!("expected object, received {}", received),
                Issue::InvalidType {
                    expected: "object".to_string(),
                    received: received.to_string(),
                },
            )]);
        };

        let errors: Vec<FieldError> = self
            .keys
            .iter()
            .filter_map(|key| match map.get(key) {
                None => Some(
                    FieldError::new(format!("missing required key: '{}'", key), Issue::MissingField)
                        .at(&[key]),
                ),
                Some(Value::Null) => Some(
                    FieldError::new(format!("required key '{}' is null", key), Issue::MissingField)
                        .at(&[key]),
                ),
                Some(_) => None,
            })
            .collect();

        if errors.is_empty() {
            Ok(value.clone())
        } else {
            Err(errors)
        }
    }
}

/// Accepts values that deserialize into `T`, normalised through `T`'s
/// `Serialize` impl (unknown fields dropped, defaults filled in).
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize,
{
    fn validate(&self, value: &Value) -> Result<Value, Vec<FieldError>> {
        let typed: T = serde_json::from_value(value.clone())
            .map_err(|e| vec![FieldError::new(e.to_string(), Issue::Custom)])?;
        serde_json::to_value(typed).map_err(|e| vec![FieldError::new(e.to_string(), Issue::Custom)])
    }
}

#[cfg(feature = "jsonschema")]
pub use self::json_schema::JsonSchemaValidator;

#[cfg(feature = "jsonschema")]
mod json_schema {
    use super::{FieldError, Issue, Schema};
    use jsonschema::error::{TypeKind, ValidationError, ValidationErrorKind};
    use jsonschema::JSONSchema;
    use serde_json::Value;

    /// [`Schema`] backed by a compiled JSON Schema document.
    pub struct JsonSchemaValidator {
        compiled: JSONSchema,
    }

    impl JsonSchemaValidator {
        /// Compile a schema document. Returns the compile error message on failure.
        pub fn compile(schema: &Value) -> Result<Self, String> {
            let compiled = JSONSchema::compile(schema).map_err(|e| e.to_string())?;
            Ok(Self { compiled })
        }
    }

    impl Schema for JsonSchemaValidator {
        fn validate(&self, value: &Value) -> Result<Value, Vec<FieldError>> {
            match self.compiled.validate(value) {
                Ok(()) => Ok(value.clone()),
                Err(errors) => Err(errors.map(|e| to_field_error(&e)).collect()),
            }
        }
    }

    fn to_field_error(error: &ValidationError<'_>) -> FieldError {
        let issue = match &error.kind {
            ValidationErrorKind::MinLength { limit } | ValidationErrorKind::MinItems { limit } => {
                Issue::TooSmall {
                    minimum: limit.to_string(),
                }
            }
            ValidationErrorKind::Minimum { limit } => Issue::TooSmall {
                minimum: limit.to_string(),
            },
            ValidationErrorKind::MaxLength { limit } | ValidationErrorKind::MaxItems { limit } => {
                Issue::TooBig {
                    maximum: limit.to_string(),
                }
            }
            ValidationErrorKind::Maximum { limit } => Issue::TooBig {
                maximum: limit.to_string(),
            },
            ValidationErrorKind::Type { kind } => Issue::InvalidType {
                expected: match kind {
                    TypeKind::Single(t) => t.to_string(),
                    TypeKind::Multiple(types) => (*types)
                        .into_iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(" | "),
                },
                received: super::type_name(&error.instance).to_string(),
            },
            ValidationErrorKind::Enum { options } => Issue::InvalidEnum {
                options: options
                    .as_array()
                    .map(|opts| {
                        opts.iter()
                            .map(|o| o.as_str().map(str::to_string).unwrap_or_else(|| o.to_string()))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            ValidationErrorKind::Required { .. } => Issue::MissingField,
            _ => Issue::Custom,
        };

        let pointer = error.instance_path.to_string();
        let mut path: Vec<String> = pointer
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if let ValidationErrorKind::Required { property } = &error.kind {
            if let Some(name) = property.as_str() {
                path.push(name.to_string());
            }
        }

        FieldError {
            path,
            message: error.to_string(),
            issue,
        }
    }

}
