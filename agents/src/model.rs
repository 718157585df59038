use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use sha1::Digest;
use sha1::Sha1;

use crate::error::AgentConfigError;
use crate::judge_loop::JudgeLoopSettings;
use crate::output_type::OutputTypeSchema;
use crate::tool::ToolDescriptor;
use crate::validation::ConfigValidator;
use crate::validation::ValidationReport;

pub const DEFAULT_SYSTEM_NAME: &str = "AssistantSystem";
pub const DEFAULT_AGENT_ID: &str = "main_assistant";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_INSTRUCTIONS: &str =
    "You are a helpful assistant. Answer the user's questions clearly and concisely.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    #[default]
    #[serde(rename = "str")]
    Str,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "list")]
    List,
    #[serde(rename = "dict")]
    Dict,
    #[serde(rename = "List[str]")]
    StrList,
    #[serde(rename = "Dict[str,Any]")]
    AnyDict,
}

impl AttributeType {
    pub const ALL: [AttributeType; 8] = [
        AttributeType::Str,
        AttributeType::Int,
        AttributeType::Float,
        AttributeType::Bool,
        AttributeType::List,
        AttributeType::Dict,
        AttributeType::StrList,
        AttributeType::AnyDict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Str => "str",
            AttributeType::Int => "int",
            AttributeType::Float => "float",
            AttributeType::Bool => "bool",
            AttributeType::List => "list",
            AttributeType::Dict => "dict",
            AttributeType::StrList => "List[str]",
            AttributeType::AnyDict => "Dict[str,Any]",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = AgentConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == compact)
            .ok_or_else(|| AgentConfigError::Invalid(format!("unknown attribute type `{value}`")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: AttributeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextClass {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
}

/// One node of the multi-agent graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_description: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub handoffs: Vec<String>,
    /// Always written, as `null` when cleared: the document store cannot hold
    /// undefined values.
    #[serde(default)]
    pub output_type: Option<OutputTypeSchema>,
}

impl AgentDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            instructions: instructions.into(),
            model: None,
            handoff_description: None,
            tools: Vec::new(),
            handoffs: Vec::new(),
            output_type: None,
        }
    }

    pub fn model_or<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(default_model)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    #[default]
    SimpleRouter,
    JudgeLoop,
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowType::SimpleRouter => f.write_str("simple_router"),
            WorkflowType::JudgeLoop => f.write_str("judge_loop"),
        }
    }
}

impl FromStr for WorkflowType {
    type Err = AgentConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().replace('-', "_").as_str() {
            "simple_router" | "router" => Ok(WorkflowType::SimpleRouter),
            "judge_loop" | "judge" => Ok(WorkflowType::JudgeLoop),
            other => Err(AgentConfigError::Invalid(format!("unknown workflow type `{other}`"))),
        }
    }
}

/// Root of a chatbot's multi-agent system; the unit that is persisted and
/// registered with the execution API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub system_name: String,
    pub context_class: ContextClass,
    pub agents: Vec<AgentDefinition>,
    pub router_agent_id: String,
    pub default_model: String,
    #[serde(default)]
    pub workflow_type: WorkflowType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_loop_settings: Option<JudgeLoopSettings>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            context_class: ContextClass {
                name: "AssistantContext".to_string(),
                attributes: vec![AttributeSpec::new("user_id", AttributeType::Str)],
            },
            agents: vec![
                AgentDefinition::new(DEFAULT_AGENT_ID, "Main Assistant", DEFAULT_INSTRUCTIONS),
            ],
            router_agent_id: DEFAULT_AGENT_ID.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            workflow_type: WorkflowType::SimpleRouter,
            judge_loop_settings: None,
        }
    }
}

impl AgentConfig {
    pub fn agent(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn agent_mut(&mut self, id: &str) -> Option<&mut AgentDefinition> {
        self.agents.iter_mut().find(|agent| agent.id == id)
    }

    pub fn has_agent(&self, id: &str) -> bool {
        self.agent(id).is_some()
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|agent| agent.id.as_str())
    }

    pub fn validate(&self) -> ValidationReport {
        ConfigValidator::new().validate(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, AgentConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, AgentConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Hex SHA-1 of the canonical JSON encoding; identifies a revision in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha1::new();
        if let Ok(serialized) = serde_json::to_vec(self) {
            hasher.update(&serialized);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Builds an [`AgentDefinition`] with a checked id.
#[derive(Debug, Default)]
pub struct AgentBuilder {
    id: Option<String>,
    name: Option<String>,
    instructions: Option<String>,
    model: Option<String>,
    handoff_description: Option<String>,
    tools: Vec<ToolDescriptor>,
    handoffs: Vec<String>,
    output_type: Option<OutputTypeSchema>,
}

impl AgentBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn model(mut self, model: impl Into<Option<String>>) -> Self {
        self.model = model.into();
        self
    }

    pub fn handoff_description(mut self, description: impl Into<Option<String>>) -> Self {
        self.handoff_description = description.into();
        self
    }

    pub fn tool(mut self, tool: ToolDescriptor) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn handoffs<I, S>(mut self, handoffs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handoffs = handoffs.into_iter().map(Into::into).collect();
        self
    }

    pub fn output_type(mut self, output_type: impl Into<Option<OutputTypeSchema>>) -> Self {
        self.output_type = output_type.into();
        self
    }

    pub fn build(self) -> Result<AgentDefinition, AgentConfigError> {
        let id = self
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AgentConfigError::Invalid("agent id cannot be empty".to_string()))?;
        validate_agent_id(&id)?;

        let name = self.name.unwrap_or_else(|| id.clone());
        let mut handoffs: Vec<String> = Vec::new();
        for handoff in self.handoffs {
            let handoff = handoff.trim().to_string();
            if !handoff.is_empty() && handoff != id && !handoffs.contains(&handoff) {
                handoffs.push(handoff);
            }
        }

        Ok(AgentDefinition {
            id,
            name,
            instructions: self.instructions.unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            model: self.model.filter(|model| !model.trim().is_empty()),
            handoff_description: self.handoff_description,
            tools: self.tools,
            handoffs,
            output_type: self.output_type,
        })
    }
}

pub fn validate_agent_id(id: &str) -> Result<(), AgentConfigError> {
    if id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        Ok(())
    } else {
        Err(AgentConfigError::Invalid(format!(
            "agent id `{id}` must contain only alphanumeric characters, hyphens, and underscores"
        )))
    }
}
