//! The only sanctioned way to change an [`AgentConfig`].
//!
//! [`reduce`] is a pure `(config, action) -> config` transform that keeps the
//! structural invariants (at least one agent, router and judge-loop ids pointing
//! at existing agents, no dangling handoffs). [`ConfigEditor`] owns the
//! canonical copy for one editing session and adds the session state around it:
//! the active agent, the tool being edited, the unsaved/saved flags and the
//! preview callback.

use tracing::debug;
use uuid::Uuid;

use crate::error::ToolError;
use crate::judge_loop::JudgeLoopSettings;
use crate::model::AgentBuilder;
use crate::model::AgentConfig;
use crate::model::AgentDefinition;
use crate::model::AttributeSpec;
use crate::model::AttributeType;
use crate::model::WorkflowType;
use crate::output_type::OutputTypeSchema;
use crate::tool::ApiCallTool;
use crate::tool::HttpMethod;
use crate::tool::ToolDescriptor;
use crate::tool::ToolKind;

/// Partial update merged into one agent. `None` leaves a field unchanged;
/// for the optional fields `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub instructions: Option<String>,
    pub model: Option<Option<String>>,
    pub handoff_description: Option<Option<String>>,
    pub tools: Option<Vec<ToolDescriptor>>,
    pub handoffs: Option<Vec<String>>,
}

impl AgentPatch {
    pub fn is_empty(&self) -> bool {
        self == &AgentPatch::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    UpdateSystemName(String),
    UpdateDefaultModel(String),
    UpdateContextClassName(String),
    AddContextAttribute,
    UpdateContextAttribute { index: usize, attribute: AttributeSpec },
    RemoveContextAttribute { index: usize },
    UpdateWorkflowType(WorkflowType),
    UpdateJudgeLoopSettings(JudgeLoopSettings),
    AddAgent { id: String },
    UpdateAgent { id: String, patch: AgentPatch },
    RemoveAgent { id: String },
    UpdateRouterAgentId(String),
    AddTool { agent_id: String, tool: ToolDescriptor },
    UpdateTool { agent_id: String, index: usize, tool: ToolDescriptor },
    RemoveTool { agent_id: String, index: usize },
    UpdateOutputType { agent_id: String, output_type: Option<OutputTypeSchema> },
}

pub fn reduce(mut config: AgentConfig, action: EditorAction) -> AgentConfig {
    match action {
        EditorAction::UpdateSystemName(name) => config.system_name = name,
        EditorAction::UpdateDefaultModel(model) => config.default_model = model,
        EditorAction::UpdateContextClassName(name) => config.context_class.name = name,
        EditorAction::AddContextAttribute => {
            config
                .context_class
                .attributes
                .push(AttributeSpec::new("", AttributeType::Str));
        }
        EditorAction::UpdateContextAttribute { index, attribute } => {
            if let Some(slot) = config.context_class.attributes.get_mut(index) {
                *slot = attribute;
            }
        }
        EditorAction::RemoveContextAttribute { index } => {
            if index < config.context_class.attributes.len() {
                config.context_class.attributes.remove(index);
            }
        }
        EditorAction::UpdateWorkflowType(workflow) => {
            config.workflow_type = workflow;
            // Settings survive a switch back to the router so nothing is lost.
            if workflow == WorkflowType::JudgeLoop && config.judge_loop_settings.is_none() {
                config.judge_loop_settings = Some(JudgeLoopSettings::initial_for(&config.agents));
            }
        }
        EditorAction::UpdateJudgeLoopSettings(mut settings) => {
            if !config.has_agent(&settings.generator_agent_id)
                || !config.has_agent(&settings.evaluator_agent_id)
            {
                return config;
            }
            let evaluator_changed = config
                .judge_loop_settings
                .as_ref()
                .is_none_or(|current| current.evaluator_agent_id != settings.evaluator_agent_id);
            if evaluator_changed {
                if let Some(evaluator) = config.agent(&settings.evaluator_agent_id) {
                    settings.reconcile_with_evaluator(evaluator);
                }
            }
            settings.clamp_iterations();
            config.judge_loop_settings = Some(settings);
        }
        EditorAction::AddAgent { id } => {
            if !config.has_agent(&id) {
                let name = format!("New Agent {}", config.agents.len() + 1);
                if let Ok(agent) = AgentBuilder::new(id).name(name).build() {
                    config.agents.push(agent);
                }
            }
        }
        EditorAction::UpdateAgent { id, patch } => {
            if let Some(agent) = config.agent_mut(&id) {
                apply_patch(agent, patch);
            }
        }
        EditorAction::RemoveAgent { id } => remove_agent(&mut config, &id),
        EditorAction::UpdateRouterAgentId(id) => {
            if config.has_agent(&id) {
                config.router_agent_id = id;
            }
        }
        EditorAction::AddTool { agent_id, tool } => {
            if let Some(agent) = config.agent_mut(&agent_id) {
                agent.tools.push(tool);
            }
        }
        EditorAction::UpdateTool {
            agent_id,
            index,
            tool,
        } => {
            if let Some(slot) = config
                .agent_mut(&agent_id)
                .and_then(|agent| agent.tools.get_mut(index))
            {
                *slot = tool;
            }
        }
        EditorAction::RemoveTool { agent_id, index } => {
            if let Some(agent) = config.agent_mut(&agent_id) {
                if index < agent.tools.len() {
                    agent.tools.remove(index);
                }
            }
        }
        EditorAction::UpdateOutputType {
            agent_id,
            output_type,
        } => {
            if let Some(agent) = config.agent_mut(&agent_id) {
                agent.output_type = output_type;
            }
        }
    }
    config
}

fn apply_patch(agent: &mut AgentDefinition, patch: AgentPatch) {
    let AgentPatch {
        name,
        instructions,
        model,
        handoff_description,
        tools,
        handoffs,
    } = patch;
    if let Some(name) = name {
        agent.name = name;
    }
    if let Some(instructions) = instructions {
        agent.instructions = instructions;
    }
    if let Some(model) = model {
        agent.model = model.filter(|model| !model.trim().is_empty());
    }
    if let Some(handoff_description) = handoff_description {
        agent.handoff_description = handoff_description;
    }
    if let Some(tools) = tools {
        agent.tools = tools;
    }
    if let Some(handoffs) = handoffs {
        agent.handoffs = handoffs;
    }
}

fn remove_agent(config: &mut AgentConfig, id: &str) {
    if config.agents.len() <= 1 || !config.has_agent(id) {
        return;
    }

    config.agents.retain(|agent| agent.id != id);
    for agent in &mut config.agents {
        agent.handoffs.retain(|handoff| handoff != id);
        agent
            .tools
            .retain(|tool| tool.referenced_agent() != Some(id));
    }

    if config.router_agent_id == id {
        config.router_agent_id = config.agents[0].id.clone();
    }

    if let Some(settings) = config.judge_loop_settings.as_mut() {
        if settings.references(id) {
            let fallback = JudgeLoopSettings::initial_for(&config.agents);
            if settings.generator_agent_id == id {
                settings.generator_agent_id = fallback.generator_agent_id;
            }
            if settings.evaluator_agent_id == id {
                settings.evaluator_agent_id = fallback.evaluator_agent_id;
            }
        }
    }
}

/// Identifies one tool entry of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSlot {
    pub agent_id: String,
    pub index: usize,
}

type PreviewFn = Box<dyn FnMut(&AgentConfig) + Send>;

pub struct ConfigEditor {
    config: AgentConfig,
    active_agent_id: String,
    editing_tool: Option<ToolSlot>,
    has_unsaved_changes: bool,
    config_saved: bool,
    preview: Option<PreviewFn>,
}

impl std::fmt::Debug for ConfigEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigEditor")
            .field("config", &self.config)
            .field("active_agent_id", &self.active_agent_id)
            .field("editing_tool", &self.editing_tool)
            .field("has_unsaved_changes", &self.has_unsaved_changes)
            .field("config_saved", &self.config_saved)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigEditor {
    fn default() -> Self {
        Self::new(AgentConfig::default())
    }
}

impl ConfigEditor {
    pub fn new(config: AgentConfig) -> Self {
        let active_agent_id = config
            .agents
            .first()
            .map(|agent| agent.id.clone())
            .unwrap_or_default();
        Self {
            config,
            active_agent_id,
            editing_tool: None,
            has_unsaved_changes: false,
            config_saved: false,
            preview: None,
        }
    }

    /// Starts a session from a configuration that was already persisted.
    pub fn from_saved(config: AgentConfig) -> Self {
        let mut editor = Self::new(config);
        editor.config_saved = true;
        editor
    }

    pub fn with_preview(mut self, preview: impl FnMut(&AgentConfig) + Send + 'static) -> Self {
        self.set_preview(preview);
        self
    }

    /// Installs the hook called with the new configuration after every action.
    pub fn set_preview(&mut self, preview: impl FnMut(&AgentConfig) + Send + 'static) {
        self.preview = Some(Box::new(preview));
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn active_agent_id(&self) -> &str {
        &self.active_agent_id
    }

    pub fn select_agent(&mut self, id: &str) -> bool {
        if self.config.has_agent(id) {
            self.active_agent_id = id.to_string();
            true
        } else {
            false
        }
    }

    pub fn editing_tool(&self) -> Option<&ToolSlot> {
        self.editing_tool.as_ref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    pub fn config_saved(&self) -> bool {
        self.config_saved
    }

    pub fn mark_saved(&mut self) {
        self.config_saved = true;
        self.has_unsaved_changes = false;
    }

    /// Applies one action, flags the session as unsaved and refreshes the preview.
    pub fn dispatch(&mut self, action: EditorAction) {
        debug!(?action, "applying agent config action");
        let config = std::mem::take(&mut self.config);
        self.config = reduce(config, action);
        self.has_unsaved_changes = true;
        if !self.config.has_agent(&self.active_agent_id) {
            if let Some(first) = self.config.agents.first() {
                self.active_agent_id = first.id.clone();
            }
        }
        let slot_gone = self.editing_tool.as_ref().is_some_and(|slot| {
            self.config
                .agent(&slot.agent_id)
                .and_then(|agent| agent.tools.get(slot.index))
                .is_none()
        });
        if slot_gone {
            self.editing_tool = None;
        }
        if let Some(preview) = self.preview.as_mut() {
            preview(&self.config);
        }
    }

    pub fn update_system_name(&mut self, name: impl Into<String>) {
        self.dispatch(EditorAction::UpdateSystemName(name.into()));
    }

    pub fn update_default_model(&mut self, model: impl Into<String>) {
        self.dispatch(EditorAction::UpdateDefaultModel(model.into()));
    }

    pub fn update_context_class_name(&mut self, name: impl Into<String>) {
        self.dispatch(EditorAction::UpdateContextClassName(name.into()));
    }

    pub fn add_context_attribute(&mut self) -> usize {
        self.dispatch(EditorAction::AddContextAttribute);
        self.config.context_class.attributes.len() - 1
    }

    pub fn update_context_attribute(&mut self, index: usize, attribute: AttributeSpec) {
        self.dispatch(EditorAction::UpdateContextAttribute { index, attribute });
    }

    pub fn remove_context_attribute(&mut self, index: usize) {
        self.dispatch(EditorAction::RemoveContextAttribute { index });
    }

    pub fn update_workflow_type(&mut self, workflow: WorkflowType) {
        self.dispatch(EditorAction::UpdateWorkflowType(workflow));
    }

    pub fn update_judge_loop_settings(&mut self, settings: JudgeLoopSettings) {
        self.dispatch(EditorAction::UpdateJudgeLoopSettings(settings));
    }

    /// Whether the selected evaluator lacks the output type the judge loop reads.
    pub fn evaluator_needs_output_type(&self) -> bool {
        self.config
            .judge_loop_settings
            .as_ref()
            .and_then(|settings| self.config.agent(&settings.evaluator_agent_id))
            .is_some_and(|evaluator| evaluator.output_type.is_none())
    }

    /// Appends a new agent and selects it. Returns its id.
    pub fn add_agent(&mut self) -> String {
        let id = self.fresh_agent_id();
        self.dispatch(EditorAction::AddAgent { id: id.clone() });
        self.active_agent_id = id.clone();
        id
    }

    pub fn update_agent(&mut self, id: &str, patch: AgentPatch) {
        self.dispatch(EditorAction::UpdateAgent {
            id: id.to_string(),
            patch,
        });
    }

    /// Removes an agent unless it is the last one and selects the first
    /// remaining agent. Returns whether it was removed.
    pub fn remove_agent(&mut self, id: &str) -> bool {
        if self.config.agents.len() <= 1 || !self.config.has_agent(id) {
            debug!(agent_id = id, "refusing to remove agent");
            return false;
        }
        self.dispatch(EditorAction::RemoveAgent { id: id.to_string() });
        if let Some(first) = self.config.agents.first() {
            self.active_agent_id = first.id.clone();
        }
        true
    }

    pub fn update_router_agent_id(&mut self, id: &str) {
        self.dispatch(EditorAction::UpdateRouterAgentId(id.to_string()));
    }

    /// Appends a starter entry of the given kind and opens it for editing.
    /// Returns the new index, or `None` when the agent does not exist or an
    /// agent tool has no other agent to point at.
    pub fn add_tool(&mut self, agent_id: &str, kind: ToolKind) -> Option<usize> {
        let tool = self.starter_tool(agent_id, kind)?;
        self.dispatch(EditorAction::AddTool {
            agent_id: agent_id.to_string(),
            tool,
        });
        let index = self.config.agent(agent_id)?.tools.len() - 1;
        self.editing_tool = Some(ToolSlot {
            agent_id: agent_id.to_string(),
            index,
        });
        Some(index)
    }

    /// Opens an existing entry for editing and returns a draft copy of it.
    pub fn edit_tool(&mut self, agent_id: &str, index: usize) -> Option<ToolDescriptor> {
        let tool = self.config.agent(agent_id)?.tools.get(index)?.clone();
        self.editing_tool = Some(ToolSlot {
            agent_id: agent_id.to_string(),
            index,
        });
        Some(tool)
    }

    /// Commits an edited entry after validating it.
    pub fn update_tool(&mut self, agent_id: &str, index: usize, tool: ToolDescriptor) -> Result<(), ToolError> {
        let agent = self
            .config
            .agent(agent_id)
            .ok_or_else(|| ToolError::UnknownAgent(agent_id.to_string()))?;
        if index >= agent.tools.len() {
            return Err(ToolError::IndexOutOfRange {
                agent_id: agent_id.to_string(),
                index,
            });
        }
        self.check_tool(agent_id, &tool)?;

        self.dispatch(EditorAction::UpdateTool {
            agent_id: agent_id.to_string(),
            index,
            tool,
        });
        self.editing_tool = None;
        Ok(())
    }

    pub fn remove_tool(&mut self, agent_id: &str, index: usize) {
        self.dispatch(EditorAction::RemoveTool {
            agent_id: agent_id.to_string(),
            index,
        });
        if self
            .editing_tool
            .as_ref()
            .is_some_and(|slot| slot.agent_id == agent_id && slot.index == index)
        {
            self.editing_tool = None;
        }
    }

    pub fn handle_output_type_update(&mut self, agent_id: &str, output_type: Option<OutputTypeSchema>) {
        self.dispatch(EditorAction::UpdateOutputType {
            agent_id: agent_id.to_string(),
            output_type,
        });
    }

    /// Points the agent's file_search tool at an uploaded vector store,
    /// adding the tool when the agent does not have one yet.
    pub fn attach_vector_store(&mut self, agent_id: &str, vector_store_id: &str) -> bool {
        let Some(agent) = self.config.agent(agent_id) else {
            return false;
        };
        let tool = ToolDescriptor::file_search(vector_store_id);
        let existing = agent.tools.iter().position(|tool| {
            matches!(tool, ToolDescriptor::BuiltIn(built_in) if built_in.name == crate::tool::FILE_SEARCH)
        });
        let action = match existing {
            Some(index) => EditorAction::UpdateTool {
                agent_id: agent_id.to_string(),
                index,
                tool,
            },
            None => EditorAction::AddTool {
                agent_id: agent_id.to_string(),
                tool,
            },
        };
        self.dispatch(action);
        true
    }

    fn check_tool(&self, agent_id: &str, tool: &ToolDescriptor) -> Result<(), ToolError> {
        tool.validate()?;
        if let Some(target) = tool.referenced_agent() {
            if target == agent_id {
                return Err(ToolError::SelfReference(agent_id.to_string()));
            }
            if !self.config.has_agent(target) {
                return Err(ToolError::UnknownAgent(target.to_string()));
            }
        }
        Ok(())
    }

    fn starter_tool(&self, agent_id: &str, kind: ToolKind) -> Option<ToolDescriptor> {
        self.config.agent(agent_id)?;
        match kind {
            ToolKind::BuiltIn => Some(ToolDescriptor::built_in("web_search")),
            ToolKind::Agent => self
                .config
                .agent_ids()
                .find(|id| *id != agent_id)
                .map(ToolDescriptor::agent),
            ToolKind::ApiCall => Some(ToolDescriptor::ApiCall(ApiCallTool::new(
                "api_tool",
                HttpMethod::Get,
                "https://api.example.com",
            ))),
        }
    }

    fn fresh_agent_id(&self) -> String {
        loop {
            let candidate = format!("agent_{}", &Uuid::new_v4().simple().to_string()[..8]);
            if !self.config.has_agent(&candidate) {
                return candidate;
            }
        }
    }
}
