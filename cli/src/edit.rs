//! `chatbot edit`: one editor operation per invocation.

use anyhow::Result;
use anyhow::anyhow;
use chatbot_agents::AgentPatch;
use chatbot_agents::AttributeSpec;
use chatbot_agents::AttributeType;
use chatbot_agents::ConfigEditor;
use chatbot_agents::HttpMethod;
use chatbot_agents::JudgeLoopSettings;
use chatbot_agents::OutputTypeSchema;
use chatbot_agents::PropertySchema;
use chatbot_agents::ToolDescriptor;
use chatbot_agents::ToolKind;
use chatbot_agents::WorkflowType;
use chatbot_agents::tool::parse_string_map;
use chatbot_agents::tool::parse_template;
use clap::Args;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum EditCommand {
    /// Rename the agent system
    SystemName { name: String },

    /// Set the model used by agents without their own
    DefaultModel { model: String },

    /// Rename the shared context class
    ContextName { name: String },

    /// Append a context attribute
    AddAttribute {
        name: String,
        #[arg(short = 't', long = "type", default_value = "str")]
        kind: AttributeType,
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Replace the context attribute at INDEX
    SetAttribute {
        index: usize,
        name: String,
        #[arg(short = 't', long = "type", default_value = "str")]
        kind: AttributeType,
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Remove the context attribute at INDEX
    RemoveAttribute { index: usize },

    /// Switch between simple_router and judge_loop
    Workflow { workflow: WorkflowType },

    /// Adjust judge loop settings
    JudgeLoop(JudgeLoopArgs),

    /// Add a new agent
    AddAgent(AgentArgs),

    /// Update an existing agent
    Agent {
        agent_id: String,
        #[command(flatten)]
        fields: AgentArgs,
    },

    /// Remove an agent (the last one cannot be removed)
    RemoveAgent { agent_id: String },

    /// Choose the agent that receives messages first
    Router { agent_id: String },

    /// Append a starter tool of KIND (built-in, agent, api-call) and optionally fill it in
    AddTool {
        agent_id: String,
        kind: ToolKind,
        #[command(flatten)]
        fields: ToolArgs,
    },

    /// Edit the tool at INDEX
    SetTool {
        agent_id: String,
        index: usize,
        #[command(flatten)]
        fields: ToolArgs,
    },

    /// Remove the tool at INDEX
    RemoveTool { agent_id: String, index: usize },

    /// Define or clear an agent's structured output type
    OutputType(OutputTypeArgs),
}

#[derive(Debug, Default, Args)]
pub struct JudgeLoopArgs {
    #[arg(long)]
    pub generator: Option<String>,
    #[arg(long)]
    pub evaluator: Option<String>,
    #[arg(long)]
    pub max_iterations: Option<u32>,
    #[arg(long)]
    pub pass_field: Option<String>,
    #[arg(long)]
    pub pass_value: Option<String>,
    #[arg(long)]
    pub feedback_field: Option<String>,
}

#[derive(Debug, Default, Args)]
pub struct AgentArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub instructions: Option<String>,
    /// Model override; an empty value falls back to the default model
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub handoff_description: Option<String>,
    /// Comma-separated agent ids; an empty value clears the list
    #[arg(long, value_delimiter = ',')]
    pub handoffs: Option<Vec<String>>,
}

impl AgentArgs {
    fn into_patch(self) -> AgentPatch {
        AgentPatch {
            name: self.name,
            instructions: self.instructions,
            model: self.model.map(|model| Some(model).filter(|m| !m.trim().is_empty())),
            handoff_description: self
                .handoff_description
                .map(|text| Some(text).filter(|t| !t.trim().is_empty())),
            tools: None,
            handoffs: self.handoffs.map(|ids| {
                ids.into_iter()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Default, Args)]
pub struct ToolArgs {
    /// Replace the whole entry with this JSON
    #[arg(long, conflicts_with_all = ["name", "target", "method", "url"])]
    pub json: Option<String>,
    /// Built-in or API call tool name
    #[arg(long)]
    pub name: Option<String>,
    /// Agent id for an agent tool
    #[arg(long)]
    pub target: Option<String>,
    #[arg(long)]
    pub vector_store_id: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub method: Option<HttpMethod>,
    #[arg(long)]
    pub url: Option<String>,
    /// JSON object of header names to values
    #[arg(long)]
    pub headers: Option<String>,
    /// JSON object of query parameter names to values
    #[arg(long)]
    pub query_params: Option<String>,
    /// JSON schema of the tool's parameters
    #[arg(long)]
    pub parameters: Option<String>,
    #[arg(long)]
    pub body_template: Option<String>,
    #[arg(long)]
    pub response_template: Option<String>,
}

impl ToolArgs {
    fn is_empty(&self) -> bool {
        self.json.is_none()
            && self.name.is_none()
            && self.target.is_none()
            && self.vector_store_id.is_none()
            && self.description.is_none()
            && self.method.is_none()
            && self.url.is_none()
            && self.headers.is_none()
            && self.query_params.is_none()
            && self.parameters.is_none()
            && self.body_template.is_none()
            && self.response_template.is_none()
    }

    /// Applies the flags to a draft copy of the entry.
    fn apply_to(self, draft: ToolDescriptor) -> Result<ToolDescriptor> {
        if let Some(json) = self.json {
            let value = serde_json::from_str(&json).map_err(|err| anyhow!("Invalid tool JSON: {err}"))?;
            return Ok(ToolDescriptor::from_value(value)?);
        }

        match draft {
            ToolDescriptor::BuiltIn(mut tool) => {
                if let Some(name) = self.name {
                    tool.name = name.trim().to_string();
                }
                if let Some(vector_store_id) = self.vector_store_id {
                    tool.vector_store_id = Some(vector_store_id).filter(|id| !id.is_empty());
                }
                Ok(ToolDescriptor::BuiltIn(tool))
            }
            ToolDescriptor::Agent { agent_id } => Ok(ToolDescriptor::agent(self.target.unwrap_or(agent_id))),
            ToolDescriptor::ApiCall(mut tool) => {
                if let Some(name) = self.name {
                    tool.name = name.trim().to_string();
                }
                if let Some(description) = self.description {
                    tool.description = Some(description).filter(|d| !d.trim().is_empty());
                }
                if let Some(method) = self.method {
                    tool.api_config.method = method;
                }
                if let Some(url) = self.url {
                    tool.api_config.url = url.trim().to_string();
                }
                if let Some(headers) = self.headers {
                    tool.api_config.headers = parse_string_map("headers", &headers)?;
                }
                if let Some(query_params) = self.query_params {
                    tool.api_config.query_params = parse_string_map("query_params", &query_params)?;
                }
                if let Some(parameters) = self.parameters {
                    tool.parameters = parse_template("parameters", &parameters)?;
                }
                if let Some(body) = self.body_template {
                    tool.api_config.body_template = parse_template("body_template", &body)?;
                }
                if let Some(response) = self.response_template {
                    tool.api_config.response_template = parse_template("response_template", &response)?;
                }
                Ok(ToolDescriptor::ApiCall(tool))
            }
        }
    }
}

#[derive(Debug, Default, Args)]
pub struct OutputTypeArgs {
    pub agent_id: String,
    /// Remove the output type
    #[arg(long, conflicts_with_all = ["schema", "name", "field"])]
    pub clear: bool,
    /// Full output type as JSON
    #[arg(long, conflicts_with_all = ["name", "field"])]
    pub schema: Option<String>,
    /// Output type name
    #[arg(long)]
    pub name: Option<String>,
    /// Property as NAME:TYPE, required unless listed in --optional
    #[arg(long = "field")]
    pub field: Vec<String>,
    #[arg(long)]
    pub optional: Vec<String>,
    /// Allowed values as NAME=a|b|c
    #[arg(long = "enum")]
    pub allowed: Vec<String>,
}

impl OutputTypeArgs {
    fn into_schema(self) -> Result<Option<OutputTypeSchema>> {
        if self.clear {
            return Ok(None);
        }
        if let Some(schema) = self.schema {
            let schema: OutputTypeSchema =
                serde_json::from_str(&schema).map_err(|err| anyhow!("Invalid output type JSON: {err}"))?;
            schema.validate()?;
            return Ok(Some(schema));
        }

        let name = self
            .name
            .ok_or_else(|| anyhow!("Provide --name with --field, --schema, or --clear"))?;
        let mut schema = OutputTypeSchema::new(name);
        for field in &self.field {
            let (property, kind) = field
                .split_once(':')
                .ok_or_else(|| anyhow!("Field `{field}` must look like NAME:TYPE"))?;
            let property = property.trim();
            let mut definition = PropertySchema::new(kind.trim(), "");
            if let Some(values) = self
                .allowed
                .iter()
                .filter_map(|entry| entry.split_once('='))
                .find(|(key, _)| key.trim() == property)
                .map(|(_, values)| values)
            {
                definition = definition.with_enum(values.split('|').map(str::trim).filter(|v| !v.is_empty()));
            }
            let required = !self.optional.iter().any(|name| name == property);
            schema = schema.property(property, definition, required);
        }
        schema.validate()?;
        Ok(Some(schema))
    }
}

/// Applies one operation to the editor and describes what changed.
pub fn apply_edit(editor: &mut ConfigEditor, command: EditCommand) -> Result<String> {
    let message = match command {
        EditCommand::SystemName { name } => {
            editor.update_system_name(name.trim());
            format!("System name set to {}", name.trim())
        }
        EditCommand::DefaultModel { model } => {
            editor.update_default_model(model.trim());
            format!("Default model set to {}", model.trim())
        }
        EditCommand::ContextName { name } => {
            editor.update_context_class_name(name.trim());
            format!("Context class renamed to {}", name.trim())
        }
        EditCommand::AddAttribute { name, kind, default } => {
            let index = editor.add_context_attribute();
            editor.update_context_attribute(index, attribute(&name, kind, default));
            format!("Added context attribute #{index} {name}: {kind}")
        }
        EditCommand::SetAttribute {
            index,
            name,
            kind,
            default,
        } => {
            if index >= editor.config().context_class.attributes.len() {
                return Err(anyhow!("No context attribute at index {index}"));
            }
            editor.update_context_attribute(index, attribute(&name, kind, default));
            format!("Updated context attribute #{index}")
        }
        EditCommand::RemoveAttribute { index } => {
            if index >= editor.config().context_class.attributes.len() {
                return Err(anyhow!("No context attribute at index {index}"));
            }
            editor.remove_context_attribute(index);
            format!("Removed context attribute #{index}")
        }
        EditCommand::Workflow { workflow } => {
            editor.update_workflow_type(workflow);
            let mut message = format!("Workflow set to {workflow}");
            if editor.evaluator_needs_output_type() {
                message.push_str("; the evaluator has no output type yet");
            }
            message
        }
        EditCommand::JudgeLoop(args) => {
            let config = editor.config();
            let mut settings = config
                .judge_loop_settings
                .clone()
                .unwrap_or_else(|| JudgeLoopSettings::initial_for(&config.agents));
            for id in [&args.generator, &args.evaluator].into_iter().flatten() {
                if !config.has_agent(id) {
                    return Err(anyhow!("Agent '{id}' does not exist"));
                }
            }
            if let Some(generator) = args.generator {
                settings.generator_agent_id = generator;
            }
            if let Some(evaluator) = args.evaluator {
                settings.evaluator_agent_id = evaluator;
            }
            if let Some(max_iterations) = args.max_iterations {
                settings.max_iterations = max_iterations;
            }
            if let Some(pass_field) = args.pass_field {
                settings.pass_field = pass_field;
            }
            if let Some(pass_value) = args.pass_value {
                settings.pass_value = pass_value;
            }
            if let Some(feedback_field) = args.feedback_field {
                settings.feedback_field = feedback_field;
            }
            editor.update_judge_loop_settings(settings);
            "Judge loop settings updated".to_string()
        }
        EditCommand::AddAgent(fields) => {
            let id = editor.add_agent();
            let patch = fields.into_patch();
            if !patch.is_empty() {
                editor.update_agent(&id, patch);
            }
            format!("Added agent {id}")
        }
        EditCommand::Agent { agent_id, fields } => {
            require_agent(editor, &agent_id)?;
            let patch = fields.into_patch();
            if patch.is_empty() {
                return Err(anyhow!("Nothing to update; pass at least one field"));
            }
            if let Some(unknown) = patch
                .handoffs
                .iter()
                .flatten()
                .find(|id| !editor.config().has_agent(id) || *id == &agent_id)
            {
                return Err(anyhow!("Agent '{agent_id}' cannot hand off to '{unknown}'"));
            }
            editor.select_agent(&agent_id);
            editor.update_agent(&agent_id, patch);
            format!("Updated agent {agent_id}")
        }
        EditCommand::RemoveAgent { agent_id } => {
            require_agent(editor, &agent_id)?;
            if !editor.remove_agent(&agent_id) {
                return Err(anyhow!("The last agent cannot be removed"));
            }
            format!(
                "Removed agent {agent_id}; router is {}",
                editor.config().router_agent_id
            )
        }
        EditCommand::Router { agent_id } => {
            require_agent(editor, &agent_id)?;
            editor.update_router_agent_id(&agent_id);
            format!("Router set to {agent_id}")
        }
        EditCommand::AddTool { agent_id, kind, fields } => {
            require_agent(editor, &agent_id)?;
            let index = editor
                .add_tool(&agent_id, kind)
                .ok_or_else(|| anyhow!("Agent '{agent_id}' has no other agent to use as a tool"))?;
            if !fields.is_empty() {
                edit_tool(editor, &agent_id, index, fields)?;
            }
            format!("Added {kind} tool #{index} to {agent_id}")
        }
        EditCommand::SetTool {
            agent_id,
            index,
            fields,
        } => {
            require_agent(editor, &agent_id)?;
            edit_tool(editor, &agent_id, index, fields)?;
            format!("Updated tool #{index} of {agent_id}")
        }
        EditCommand::RemoveTool { agent_id, index } => {
            require_agent(editor, &agent_id)?;
            if editor
                .config()
                .agent(&agent_id)
                .is_none_or(|agent| index >= agent.tools.len())
            {
                return Err(anyhow!("Agent '{agent_id}' has no tool at index {index}"));
            }
            editor.remove_tool(&agent_id, index);
            format!("Removed tool #{index} from {agent_id}")
        }
        EditCommand::OutputType(args) => {
            let agent_id = args.agent_id.clone();
            require_agent(editor, &agent_id)?;
            let schema = args.into_schema()?;
            let cleared = schema.is_none();
            editor.handle_output_type_update(&agent_id, schema);
            if cleared {
                format!("Cleared output type of {agent_id}")
            } else {
                format!("Set output type of {agent_id}")
            }
        }
    };
    Ok(message)
}

fn attribute(name: &str, kind: AttributeType, default: Option<String>) -> AttributeSpec {
    let mut attribute = AttributeSpec::new(name.trim(), kind);
    attribute.default = default.filter(|d| !d.is_empty());
    attribute
}

fn require_agent(editor: &ConfigEditor, agent_id: &str) -> Result<()> {
    if editor.config().has_agent(agent_id) {
        Ok(())
    } else {
        Err(anyhow!("Agent '{agent_id}' does not exist"))
    }
}

fn edit_tool(editor: &mut ConfigEditor, agent_id: &str, index: usize, fields: ToolArgs) -> Result<()> {
    let draft = editor
        .edit_tool(agent_id, index)
        .ok_or_else(|| anyhow!("Agent '{agent_id}' has no tool at index {index}"))?;
    let tool = fields.apply_to(draft)?;
    editor.update_tool(agent_id, index, tool)?;
    Ok(())
}
