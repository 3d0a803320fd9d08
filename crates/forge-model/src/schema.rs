//! Compiled JSON Schema documents for model output.

use schemars::JsonSchema;
use serde_json::Value;
use std::fmt;

/// A schema document that failed to compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid schema '{name}': {message}")]
pub struct SchemaError {
    pub name: String,
    pub message: String,
}

/// One violation reported by [`OutputSchema::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// JSON pointer into the validated instance (empty for the root).
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A named JSON Schema document together with its compiled validator.
pub struct OutputSchema {
    name: String,
    document: Value,
    validator: jsonschema::Validator,
}

impl OutputSchema {
    /// Compile a literal schema document.
    pub fn new(name: impl Into<String>, document: Value) -> Result<Self, SchemaError> {
        let name = name.into();
        let validator = jsonschema::validator_for(&document).map_err(|e| SchemaError {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            document,
            validator,
        })
    }

    /// Derive the schema from a Rust type.
    pub fn for_type<T: JsonSchema>(name: impl Into<String>) -> Result<Self, SchemaError> {
        let name = name.into();
        let document = serde_json::to_value(schemars::schema_for!(T)).map_err(|e| SchemaError {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Self::new(name, document)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Validate `instance`, collecting every violation.
    pub fn validate(&self, instance: &Value) -> Result<(), Vec<FieldError>> {
        let errors: Vec<FieldError> = self
            .validator
            .iter_errors(instance)
            .map(|e| FieldError {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Debug for OutputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSchema")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
