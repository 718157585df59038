//! Generator/evaluator refinement settings.

use serde::Deserialize;
use serde::Serialize;

use crate::model::AgentDefinition;
use crate::output_type::OutputTypeSchema;

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;
pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 10;

const PASS_FIELD_HINTS: &[&str] = &["score", "rating", "status", "result"];
const FEEDBACK_FIELD_HINTS: &[&str] = &["feedback", "comment", "explanation", "reason"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeLoopSettings {
    pub generator_agent_id: String,
    pub evaluator_agent_id: String,
    pub max_iterations: u32,
    pub pass_field: String,
    pub pass_value: String,
    pub feedback_field: String,
}

impl JudgeLoopSettings {
    /// Defaults used when a configuration first switches to the judge loop:
    /// the first agent generates, the second (or the first again) evaluates.
    pub fn initial_for(agents: &[AgentDefinition]) -> Self {
        let generator = agents.first().map(|agent| agent.id.clone()).unwrap_or_default();
        let evaluator = agents
            .get(1)
            .map(|agent| agent.id.clone())
            .unwrap_or_else(|| generator.clone());
        Self {
            generator_agent_id: generator,
            evaluator_agent_id: evaluator,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            pass_field: "score".to_string(),
            pass_value: "pass".to_string(),
            feedback_field: "feedback".to_string(),
        }
    }

    pub fn references(&self, agent_id: &str) -> bool {
        self.generator_agent_id == agent_id || self.evaluator_agent_id == agent_id
    }

    pub fn clamp_iterations(&mut self) {
        self.max_iterations = self.max_iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
    }

    /// Points `pass_field`, `feedback_field` and `pass_value` at the evaluator's
    /// output schema. Leaves the settings untouched when the evaluator has none.
    pub fn reconcile_with_evaluator(&mut self, evaluator: &AgentDefinition) {
        let Some(output_type) = evaluator.output_type.as_ref() else {
            return;
        };
        let properties: Vec<&str> = output_type.property_names().collect();
        if properties.is_empty() {
            return;
        }

        if !output_type.has_property(&self.pass_field) {
            let guess = find_by_hint(&properties, PASS_FIELD_HINTS).unwrap_or(properties[0]);
            self.pass_field = guess.to_string();
        }

        if !output_type.has_property(&self.feedback_field) {
            let guess = find_by_hint(&properties, FEEDBACK_FIELD_HINTS)
                .or_else(|| properties.get(1).copied())
                .unwrap_or(properties[0]);
            self.feedback_field = guess.to_string();
        }

        self.reconcile_pass_value(output_type);
    }

    fn reconcile_pass_value(&mut self, output_type: &OutputTypeSchema) {
        let allowed = output_type
            .schema
            .properties
            .get(&self.pass_field)
            .and_then(|property| property.allowed.as_ref());
        if let Some(values) = allowed {
            if !values.contains(&self.pass_value) {
                if let Some(first) = values.first() {
                    self.pass_value = first.clone();
                }
            }
        }
    }
}

fn find_by_hint<'a>(properties: &[&'a str], hints: &[&str]) -> Option<&'a str> {
    properties.iter().copied().find(|property| {
        let lowered = property.to_ascii_lowercase();
        hints.iter().any(|hint| lowered.contains(hint))
    })
}
