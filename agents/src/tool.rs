//! Tool descriptors attached to agents.
//!
//! Stored configurations use three shapes for tools: bare strings (legacy
//! built-in names and `agent_<id>` references), `{"type": "built-in", ...}`
//! objects and API-call objects carrying an `api_config`. They are
//! normalized into [`ToolDescriptor`] once, at the serde boundary.
//!
//! Built-in names are trimmed and an empty `vector_store_id` is dropped, both
//! when parsing and in the constructors. A stored entry therefore round-trips
//! unchanged once it has been through one parse.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;
use serde_json::Value;
use url::Url;

use crate::error::ToolError;

pub const AGENT_TOOL_PREFIX: &str = "agent_";
pub const BUILT_IN_TYPE: &str = "built-in";
pub const FILE_SEARCH: &str = "file_search";
pub const KNOWN_BUILT_INS: &[&str] = &["web_search", FILE_SEARCH, "code_interpreter"];

#[derive(Debug, Clone, PartialEq)]
pub enum ToolDescriptor {
    BuiltIn(BuiltInTool),
    Agent { agent_id: String },
    ApiCall(ApiCallTool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltInTool {
    pub name: String,
    pub vector_store_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    pub api_config: ApiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_template: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

/// Which sub-form a newly added tool starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    BuiltIn,
    Agent,
    ApiCall,
}

impl FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "built-in" | "builtin" | "built_in" => Ok(Self::BuiltIn),
            "agent" => Ok(Self::Agent),
            "api-call" | "api_call" | "api" => Ok(Self::ApiCall),
            other => Err(ToolError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BuiltIn => BUILT_IN_TYPE,
            Self::Agent => "agent",
            Self::ApiCall => "api-call",
        })
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(method)
    }
}

impl FromStr for HttpMethod {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(ToolError::Unsupported(format!("HTTP method {other}"))),
        }
    }
}

impl ToolDescriptor {
    pub fn built_in(name: impl Into<String>) -> Self {
        Self::BuiltIn(BuiltInTool {
            name: name.into().trim().to_string(),
            vector_store_id: None,
        })
    }

    pub fn file_search(vector_store_id: impl Into<String>) -> Self {
        let vector_store_id: String = vector_store_id.into();
        Self::BuiltIn(BuiltInTool {
            name: FILE_SEARCH.to_string(),
            vector_store_id: Some(vector_store_id).filter(|id| !id.is_empty()),
        })
    }

    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self::Agent {
            agent_id: agent_id.into(),
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::BuiltIn(_) => ToolKind::BuiltIn,
            Self::Agent { .. } => ToolKind::Agent,
            Self::ApiCall(_) => ToolKind::ApiCall,
        }
    }

    /// Display name, also used for duplicate detection.
    pub fn name(&self) -> &str {
        match self {
            Self::BuiltIn(tool) => &tool.name,
            Self::Agent { agent_id } => agent_id,
            Self::ApiCall(tool) => &tool.name,
        }
    }

    pub fn referenced_agent(&self) -> Option<&str> {
        match self {
            Self::Agent { agent_id } => Some(agent_id),
            _ => None,
        }
    }

    /// Normalizes one stored tool entry.
    pub fn from_value(value: Value) -> Result<Self, ToolError> {
        if value.get("api_config").is_some() {
            return serde_json::from_value::<ApiCallTool>(value)
                .map(Self::ApiCall)
                .map_err(|err| ToolError::Unsupported(err.to_string()));
        }
        match value {
            Value::String(raw) => Self::from_reference(&raw),
            Value::Object(map) => {
                let kind = map.get("type").and_then(Value::as_str).unwrap_or(BUILT_IN_TYPE);
                if kind != BUILT_IN_TYPE {
                    return Err(ToolError::Unsupported(format!("tool type `{kind}`")));
                }
                let name = map
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or(ToolError::EmptyName)?;
                let vector_store_id = map
                    .get("vector_store_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string);
                Ok(Self::BuiltIn(BuiltInTool {
                    name: name.to_string(),
                    vector_store_id,
                }))
            }
            other => Err(ToolError::Unsupported(other.to_string())),
        }
    }

    fn from_reference(raw: &str) -> Result<Self, ToolError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ToolError::EmptyName);
        }
        match raw.strip_prefix(AGENT_TOOL_PREFIX) {
            Some("") => Err(ToolError::EmptyAgentReference),
            Some(agent_id) => Ok(Self::agent(agent_id)),
            None => Ok(Self::built_in(raw)),
        }
    }

    /// Checks the entry on its own; cross-agent references are checked by the editor.
    pub fn validate(&self) -> Result<(), ToolError> {
        match self {
            Self::BuiltIn(tool) if tool.name.trim().is_empty() => Err(ToolError::EmptyName),
            Self::BuiltIn(_) => Ok(()),
            Self::Agent { agent_id } if agent_id.trim().is_empty() => {
                Err(ToolError::EmptyAgentReference)
            }
            Self::Agent { .. } => Ok(()),
            Self::ApiCall(tool) => tool.validate(),
        }
    }
}

impl Serialize for ToolDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct BuiltInWire<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            name: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            vector_store_id: Option<&'a str>,
        }

        match self {
            Self::BuiltIn(tool) => BuiltInWire {
                kind: BUILT_IN_TYPE,
                name: &tool.name,
                vector_store_id: tool.vector_store_id.as_deref(),
            }
            .serialize(serializer),
            Self::Agent { agent_id } => {
                serializer.serialize_str(&format!("{AGENT_TOOL_PREFIX}{agent_id}"))
            }
            Self::ApiCall(tool) => tool.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ToolDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

impl ApiCallTool {
    pub fn new(name: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: None,
            api_config: ApiConfig {
                method,
                url: url.into(),
                headers: BTreeMap::new(),
                query_params: BTreeMap::new(),
                body_template: None,
                response_template: None,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ToolError> {
        if self.name.trim().is_empty() {
            return Err(ToolError::EmptyName);
        }

        let url = self.api_config.url.trim();
        if url.is_empty() {
            return Err(ToolError::MissingUrl {
                name: self.name.clone(),
            });
        }
        // Templated URLs such as `https://api.example.com/users/{id}` are allowed.
        let parsed = Url::parse(url).map_err(|_| ToolError::InvalidUrl {
            name: self.name.clone(),
            url: url.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::InvalidUrl {
                name: self.name.clone(),
                url: url.to_string(),
            });
        }

        if let Some(parameters) = &self.parameters {
            let is_object_schema = parameters
                .as_object()
                .map(|schema| {
                    schema.get("type").and_then(Value::as_str) == Some("object")
                        && schema.get("properties").is_none_or(Value::is_object)
                })
                .unwrap_or(false);
            if !is_object_schema {
                return Err(ToolError::InvalidParameters {
                    name: self.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Parses JSON typed into a template field. Blank input clears the template.
pub fn parse_template(field: &str, text: &str) -> Result<Option<Value>, ToolError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|err| ToolError::InvalidTemplate {
            field: field.to_string(),
            message: err.to_string(),
        })
}

/// Parses a JSON object of string values (headers, query parameters).
pub fn parse_string_map(field: &str, text: &str) -> Result<BTreeMap<String, String>, ToolError> {
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(text).map_err(|err| ToolError::InvalidTemplate {
        field: field.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn normalizes_legacy_and_prefixed_strings() {
        let tools: Vec<ToolDescriptor> =
            serde_json::from_value(json!(["file_search", "agent_billing", {"type": "built-in", "name": "web_search"}]))
                .unwrap();
        assert_eq!(
            tools,
            vec![
                ToolDescriptor::built_in("file_search"),
                ToolDescriptor::agent("billing"),
                ToolDescriptor::built_in("web_search"),
            ]
        );
    }

    #[test]
    fn agent_reference_serializes_with_prefix() {
        let value = serde_json::to_value(ToolDescriptor::agent("billing")).unwrap();
        assert_eq!(value, json!("agent_billing"));
    }

    #[test]
    fn empty_agent_reference_is_rejected() {
        assert_eq!(
            ToolDescriptor::from_value(json!("agent_")),
            Err(ToolError::EmptyAgentReference)
        );
    }

    #[test]
    fn api_call_objects_keep_their_config() {
        let raw = json!({
            "name": "lookup_order",
            "description": "Find an order",
            "parameters": {"type": "object", "properties": {"order_id": {"type": "string"}}},
            "api_config": {
                "method": "POST",
                "url": "https://shop.example.com/orders",
                "headers": {"Authorization": "Bearer token"},
                "body_template": {"id": "{order_id}"}
            }
        });
        let tool = ToolDescriptor::from_value(raw.clone()).unwrap();
        let ToolDescriptor::ApiCall(api) = &tool else {
            panic!("expected api call tool, got {tool:?}");
        };
        assert_eq!(api.api_config.method, HttpMethod::Post);
        assert_eq!(api.api_config.headers["Authorization"], "Bearer token");
        assert_eq!(serde_json::to_value(&tool).unwrap(), raw);
        assert_eq!(tool.validate(), Ok(()));
    }

    #[test]
    fn api_call_requires_http_url() {
        let tool = ApiCallTool::new("ftp_tool", HttpMethod::Get, "ftp://files.example.com");
        assert!(matches!(tool.validate(), Err(ToolError::InvalidUrl { .. })));

        let tool = ApiCallTool::new("blank", HttpMethod::Get, "  ");
        assert!(matches!(tool.validate(), Err(ToolError::MissingUrl { .. })));
    }

    #[test]
    fn api_call_parameters_must_be_object_schema() {
        let mut tool = ApiCallTool::new("weather", HttpMethod::Get, "https://weather.example.com");
        tool.parameters = Some(json!({"type": "array"}));
        assert_eq!(
            tool.validate(),
            Err(ToolError::InvalidParameters {
                name: "weather".to_string()
            })
        );
    }

    #[test]
    fn template_parse_errors_carry_parser_message() {
        let err = parse_template("body_template", "{\"id\": }").unwrap_err();
        let ToolError::InvalidTemplate { field, message } = err else {
            panic!("unexpected error");
        };
        assert_eq!(field, "body_template");
        assert!(!message.is_empty());
        assert_eq!(parse_template("body_template", "   ").unwrap(), None);
    }

    #[test]
    fn built_in_entries_are_normalized_once() {
        let raw = json!({"type": "built-in", "name": " web_search ", "vector_store_id": ""});
        let parsed = ToolDescriptor::from_value(raw).unwrap();
        assert_eq!(parsed, ToolDescriptor::built_in(" web_search "));

        let stored = serde_json::to_value(&parsed).unwrap();
        assert_eq!(stored, json!({"type": "built-in", "name": "web_search"}));
        assert_eq!(ToolDescriptor::from_value(stored).unwrap(), parsed);
        assert_eq!(ToolDescriptor::file_search(""), ToolDescriptor::built_in(FILE_SEARCH));
    }

    #[test]
    fn tool_kind_parses_cli_spellings() {
        assert_eq!("built-in".parse::<ToolKind>().unwrap(), ToolKind::BuiltIn);
        assert_eq!("api_call".parse::<ToolKind>().unwrap(), ToolKind::ApiCall);
        assert!("plugin".parse::<ToolKind>().is_err());
    }
}
