//! Integrity checks over a whole [`AgentConfig`].

use std::collections::HashSet;

use serde::Serialize;

use crate::judge_loop::MAX_ITERATIONS;
use crate::judge_loop::MIN_ITERATIONS;
use crate::model::AgentConfig;
use crate::model::AgentDefinition;
use crate::model::WorkflowType;
use crate::tool::FILE_SEARCH;
use crate::tool::KNOWN_BUILT_INS;
use crate::tool::ToolDescriptor;

/// Checks referential integrity and per-entry validity of a configuration.
///
/// Duplicate attribute and tool names are reported as warnings only; the
/// dashboard has always accepted them. Judge-loop fields that do not match the
/// evaluator's output type are warnings unless the validator is strict.
pub struct ConfigValidator {
    strict_mode: bool,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    pub fn strict() -> Self {
        Self { strict_mode: true }
    }

    pub fn validate(&self, config: &AgentConfig) -> ValidationReport {
        let mut report = ValidationReport::new();

        if config.system_name.trim().is_empty() {
            report.add_warning("System name is empty");
        }
        if config.default_model.trim().is_empty() {
            report.add_error("Default model cannot be empty");
        }

        self.validate_context(config, &mut report);
        self.validate_agents(config, &mut report);
        self.validate_workflow(config, &mut report);

        report
    }

    fn validate_context(&self, config: &AgentConfig, report: &mut ValidationReport) {
        let context = &config.context_class;
        if context.name.trim().is_empty() {
            report.add_warning("Context class name is empty");
        }

        let mut seen = HashSet::new();
        for (index, attribute) in context.attributes.iter().enumerate() {
            if attribute.name.trim().is_empty() {
                report.add_warning(&format!("Context attribute #{} has no name", index + 1));
            } else if !seen.insert(attribute.name.as_str()) {
                report.add_warning(&format!(
                    "Context attribute `{}` is defined more than once",
                    attribute.name
                ));
            }
        }
    }

    fn validate_agents(&self, config: &AgentConfig, report: &mut ValidationReport) {
        if config.agents.is_empty() {
            report.add_error("Configuration must contain at least one agent");
            return;
        }

        let mut ids = HashSet::new();
        for agent in &config.agents {
            if agent.id.trim().is_empty() {
                report.add_error("Agent id cannot be empty");
            } else if !ids.insert(agent.id.as_str()) {
                report.add_error(&format!("Duplicate agent id: {}", agent.id));
            }
        }

        if !config.has_agent(&config.router_agent_id) {
            report.add_error(&format!(
                "Router agent `{}` does not exist",
                config.router_agent_id
            ));
        }

        for agent in &config.agents {
            self.validate_agent(config, agent, report);
        }
    }

    fn validate_agent(&self, config: &AgentConfig, agent: &AgentDefinition, report: &mut ValidationReport) {
        if agent.name.trim().is_empty() {
            report.add_warning(&format!("Agent `{}` has no display name", agent.id));
        }
        if agent.instructions.trim().is_empty() {
            report.add_warning(&format!("Agent `{}` has empty instructions", agent.id));
        }

        for handoff in &agent.handoffs {
            if handoff == &agent.id {
                report.add_error(&format!("Agent `{}` lists itself as a handoff", agent.id));
            } else if !config.has_agent(handoff) {
                report.add_error(&format!(
                    "Agent `{}` hands off to unknown agent `{handoff}`",
                    agent.id
                ));
            }
        }

        let mut tool_names = HashSet::new();
        for tool in &agent.tools {
            if let Err(err) = tool.validate() {
                report.add_error(&format!("Agent `{}`: {err}", agent.id));
                continue;
            }
            if !tool_names.insert(tool.name()) {
                report.add_warning(&format!(
                    "Agent `{}` has more than one tool named `{}`",
                    agent.id,
                    tool.name()
                ));
            }
            match tool {
                ToolDescriptor::Agent { agent_id } if agent_id == &agent.id => {
                    report.add_error(&format!("Agent `{}` uses itself as a tool", agent.id));
                }
                ToolDescriptor::Agent { agent_id } if !config.has_agent(agent_id) => {
                    report.add_error(&format!(
                        "Agent `{}` uses unknown agent `{agent_id}` as a tool",
                        agent.id
                    ));
                }
                ToolDescriptor::BuiltIn(built_in) => {
                    if !KNOWN_BUILT_INS.contains(&built_in.name.as_str()) {
                        report.add_warning(&format!(
                            "Agent `{}` uses unrecognized built-in tool `{}`",
                            agent.id, built_in.name
                        ));
                    }
                    if built_in.name == FILE_SEARCH && built_in.vector_store_id.is_none() {
                        report.add_warning(&format!(
                            "Agent `{}` has file_search without an uploaded vector store",
                            agent.id
                        ));
                    }
                }
                _ => {}
            }
        }

        if let Some(output_type) = &agent.output_type {
            if let Err(err) = output_type.validate() {
                report.add_error(&format!("Agent `{}` output type: {err}", agent.id));
            }
        }
    }

    fn validate_workflow(&self, config: &AgentConfig, report: &mut ValidationReport) {
        if config.workflow_type != WorkflowType::JudgeLoop {
            if config.judge_loop_settings.is_some() {
                report.add_info("Judge loop settings are kept but unused by the simple router");
            }
            return;
        }

        let Some(settings) = &config.judge_loop_settings else {
            report.add_error("Judge loop workflow requires judge loop settings");
            return;
        };

        if !config.has_agent(&settings.generator_agent_id) {
            report.add_error(&format!(
                "Judge loop generator `{}` does not exist",
                settings.generator_agent_id
            ));
        }
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&settings.max_iterations) {
            report.add_error(&format!(
                "Judge loop max_iterations must be between {MIN_ITERATIONS} and {MAX_ITERATIONS}, got {}",
                settings.max_iterations
            ));
        }
        if settings.generator_agent_id == settings.evaluator_agent_id {
            report.add_warning("Judge loop generator and evaluator are the same agent");
        }

        let Some(evaluator) = config.agent(&settings.evaluator_agent_id) else {
            report.add_error(&format!(
                "Judge loop evaluator `{}` does not exist",
                settings.evaluator_agent_id
            ));
            return;
        };

        let Some(output_type) = &evaluator.output_type else {
            self.schema_issue(
                report,
                &format!(
                    "Judge loop evaluator `{}` has no output type; define one with `{}` and `{}` fields",
                    evaluator.id, settings.pass_field, settings.feedback_field
                ),
            );
            return;
        };

        for (label, field) in [("pass", &settings.pass_field), ("feedback", &settings.feedback_field)] {
            if !output_type.has_property(field) {
                self.schema_issue(
                    report,
                    &format!(
                        "Judge loop {label} field `{field}` is not a property of evaluator `{}` output type",
                        evaluator.id
                    ),
                );
            }
        }
    }

    fn schema_issue(&self, report: &mut ValidationReport, message: &str) {
        if self.strict_mode {
            report.add_error(message);
        } else {
            report.add_warning(message);
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn add_info(&mut self, message: &str) {
        self.info.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    pub fn summary(&self) -> String {
        if self.is_valid() {
            if self.warnings.is_empty() {
                "Validation passed".to_string()
            } else {
                format!("Validation passed with {} warnings", self.warnings.len())
            }
        } else {
            format!(
                "Validation failed: {} errors, {} warnings",
                self.errors.len(),
                self.warnings.len()
            )
        }
    }
}
