//! Structured-output contracts attached to individual agents.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SchemaError;

const PROPERTY_TYPES: &[&str] = &["string", "number", "integer", "boolean", "array", "object"];

/// Named JSON-schema-like object an agent's response must conform to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTypeSchema {
    pub name: String,
    pub schema: ObjectSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(rename = "type", default = "object_type")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

fn object_type() -> String {
    "object".to_string()
}

impl PropertySchema {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            allowed: None,
        }
    }

    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

impl OutputTypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: ObjectSchema {
                kind: object_type(),
                properties: BTreeMap::new(),
                required: Vec::new(),
            },
        }
    }

    /// Adds a property, optionally marking it as required.
    pub fn property(mut self, name: impl Into<String>, property: PropertySchema, required: bool) -> Self {
        let name = name.into();
        if required && !self.schema.required.contains(&name) {
            self.schema.required.push(name.clone());
        }
        self.schema.properties.insert(name, property);
        self
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.schema.properties.contains_key(name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.schema.properties.keys().map(String::as_str)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if self.schema.kind != "object" {
            return Err(SchemaError::NotAnObject(self.schema.kind.clone()));
        }
        for (name, property) in &self.schema.properties {
            if !PROPERTY_TYPES.contains(&property.kind.as_str()) {
                return Err(SchemaError::UnknownPropertyType {
                    property: name.clone(),
                    kind: property.kind.clone(),
                });
            }
            if property.allowed.is_some() && property.kind != "string" {
                return Err(SchemaError::EnumOnNonString {
                    property: name.clone(),
                });
            }
        }
        if let Some(missing) = self
            .schema
            .required
            .iter()
            .find(|field| !self.schema.properties.contains_key(*field))
        {
            return Err(SchemaError::RequiredNotDeclared(missing.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn evaluation_schema() -> OutputTypeSchema {
        OutputTypeSchema::new("Evaluation")
            .property(
                "score",
                PropertySchema::new("string", "Verdict").with_enum(["pass", "needs_improvement"]),
                true,
            )
            .property("feedback", PropertySchema::new("string", "What to fix"), true)
    }

    #[test]
    fn accepts_well_formed_schema() {
        assert_eq!(evaluation_schema().validate(), Ok(()));
    }

    #[test]
    fn rejects_required_field_without_property() {
        let mut schema = evaluation_schema();
        schema.schema.required.push("confidence".to_string());
        assert_eq!(
            schema.validate(),
            Err(SchemaError::RequiredNotDeclared("confidence".to_string()))
        );
    }

    #[test]
    fn rejects_enum_on_numeric_property() {
        let schema = OutputTypeSchema::new("Rating").property(
            "rating",
            PropertySchema::new("integer", "1-5").with_enum(["1", "2"]),
            false,
        );
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::EnumOnNonString { property }) if property == "rating"
        ));
    }

    #[test]
    fn parses_wire_format_with_enum_keyword() {
        let raw = r#"{
            "name": "Evaluation",
            "schema": {
                "type": "object",
                "properties": {
                    "score": {"type": "string", "description": "", "enum": ["pass", "fail"]}
                },
                "required": ["score"]
            }
        }"#;
        let parsed: OutputTypeSchema = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.schema.properties["score"].allowed.as_deref(),
            Some(&["pass".to_string(), "fail".to_string()][..])
        );
    }
}
