use chatbot_agents::AgentConfig;
use chatbot_agents::ConfigEditor;
use chatbot_agents::EditorAction;
use chatbot_agents::JudgeLoopSettings;
use chatbot_agents::OutputTypeSchema;
use chatbot_agents::PropertySchema;
use chatbot_agents::ToolDescriptor;
use chatbot_agents::ToolKind;
use chatbot_agents::WorkflowType;
use chatbot_agents::reduce;
use pretty_assertions::assert_eq;
use serde_json::Value;

fn three_agent_editor() -> ConfigEditor {
    let mut editor = ConfigEditor::default();
    editor.add_agent();
    editor.add_agent();
    editor
}

fn assert_router_exists(config: &AgentConfig) {
    assert!(
        config.has_agent(&config.router_agent_id),
        "router `{}` missing from {:?}",
        config.router_agent_id,
        config.agent_ids().collect::<Vec<_>>()
    );
}

#[test]
fn default_config_matches_documented_shape() {
    let config = AgentConfig::default();
    assert_eq!(config.system_name, "AssistantSystem");
    assert_eq!(config.agents.len(), 1);
    assert_eq!(config.agents[0].id, "main_assistant");
    assert_eq!(config.router_agent_id, "main_assistant");
    assert_eq!(config.workflow_type, WorkflowType::SimpleRouter);
    assert!(config.validate().is_valid());
}

#[test]
fn adding_two_agents_keeps_router() {
    let editor = three_agent_editor();
    let config = editor.config();
    assert_eq!(config.agents.len(), 3);
    assert_eq!(config.router_agent_id, "main_assistant");
    for agent in &config.agents[1..] {
        assert!(agent.tools.is_empty());
        assert!(agent.handoffs.is_empty());
        assert!(agent.id.starts_with("agent_"));
    }
    assert_ne!(config.agents[1].id, config.agents[2].id);
}

#[test]
fn judge_loop_defaults_to_first_two_agents() {
    let mut editor = three_agent_editor();
    editor.update_workflow_type(WorkflowType::JudgeLoop);

    let config = editor.config();
    let settings = config.judge_loop_settings.as_ref().unwrap();
    assert_eq!(settings.generator_agent_id, config.agents[0].id);
    assert_eq!(settings.evaluator_agent_id, config.agents[1].id);
    assert_eq!(settings.max_iterations, 5);
}

#[test]
fn judge_loop_on_single_agent_uses_it_twice() {
    let config = reduce(
        AgentConfig::default(),
        EditorAction::UpdateWorkflowType(WorkflowType::JudgeLoop),
    );
    let settings = config.judge_loop_settings.unwrap();
    assert_eq!(settings.generator_agent_id, "main_assistant");
    assert_eq!(settings.evaluator_agent_id, "main_assistant");
}

#[test]
fn removing_router_promotes_first_remaining_agent() {
    let mut editor = three_agent_editor();
    let second = editor.config().agents[1].id.clone();
    let third = editor.config().agents[2].id.clone();
    editor.update_agent(
        &second,
        chatbot_agents::AgentPatch {
            handoffs: Some(vec!["main_assistant".to_string(), third.clone()]),
            ..Default::default()
        },
    );

    assert!(editor.remove_agent("main_assistant"));

    let config = editor.config();
    assert_eq!(config.agents.len(), 2);
    assert_eq!(config.router_agent_id, config.agents[0].id);
    assert_eq!(config.router_agent_id, second);
    assert!(
        config
            .agents
            .iter()
            .all(|agent| !agent.handoffs.iter().any(|h| h == "main_assistant"))
    );
    assert_eq!(config.agents[0].handoffs, vec![third]);
}

#[test]
fn clearing_output_type_serializes_null() {
    let mut editor = ConfigEditor::default();
    editor.handle_output_type_update(
        "main_assistant",
        Some(OutputTypeSchema::new("Answer").property("text", PropertySchema::new("string", ""), true)),
    );
    editor.handle_output_type_update("main_assistant", None);

    let value = serde_json::to_value(editor.config()).unwrap();
    let agent = &value["agents"][0];
    assert_eq!(agent.get("output_type"), Some(&Value::Null));
}

#[test]
fn json_round_trip_preserves_everything() {
    let mut editor = three_agent_editor();
    let helper = editor.config().agents[1].id.clone();
    editor.add_tool("main_assistant", ToolKind::BuiltIn);
    editor.add_tool("main_assistant", ToolKind::Agent);
    editor.add_tool(&helper, ToolKind::ApiCall);
    editor.attach_vector_store(&helper, "vs_123");
    editor.update_workflow_type(WorkflowType::JudgeLoop);

    let raw = editor.config().to_json_pretty().unwrap();
    let parsed = AgentConfig::from_json(&raw).unwrap();
    assert_eq!(&parsed, editor.config());
    assert_eq!(parsed.fingerprint(), editor.config().fingerprint());
}

#[test]
fn add_then_remove_tool_restores_list() {
    let mut editor = ConfigEditor::default();
    editor.add_tool("main_assistant", ToolKind::BuiltIn);
    let before = editor.config().agents[0].tools.clone();

    let index = editor.add_tool("main_assistant", ToolKind::ApiCall).unwrap();
    assert_eq!(index, before.len());
    editor.remove_tool("main_assistant", index);

    assert_eq!(editor.config().agents[0].tools, before);
}

fn assert_judge_loop_ids_exist(config: &AgentConfig) {
    if let Some(settings) = &config.judge_loop_settings {
        for id in [&settings.generator_agent_id, &settings.evaluator_agent_id] {
            assert!(
                config.has_agent(id),
                "judge loop id `{id}` missing from {:?}",
                config.agent_ids().collect::<Vec<_>>()
            );
        }
    }
}

fn judge_loop_settings(config: &AgentConfig, generator: &str, evaluator: &str) -> JudgeLoopSettings {
    let mut settings = config
        .judge_loop_settings
        .clone()
        .unwrap_or_else(|| JudgeLoopSettings::initial_for(&config.agents));
    settings.generator_agent_id = generator.to_string();
    settings.evaluator_agent_id = evaluator.to_string();
    settings
}

fn apply_checked(config: AgentConfig, action: EditorAction) -> AgentConfig {
    let config = reduce(config, action);
    assert!(!config.agents.is_empty());
    assert_router_exists(&config);
    assert_judge_loop_ids_exist(&config);
    config
}

#[test]
fn mutation_sequences_keep_core_invariants() {
    let mut config = AgentConfig::default();
    config = apply_checked(config, EditorAction::AddAgent { id: "writer".to_string() });
    config = apply_checked(config, EditorAction::AddAgent { id: "critic".to_string() });
    config = apply_checked(config, EditorAction::UpdateWorkflowType(WorkflowType::JudgeLoop));
    for (generator, evaluator) in [("writer", "critic"), ("writer", "ghost"), ("phantom", "critic")] {
        let settings = judge_loop_settings(&config, generator, evaluator);
        config = apply_checked(config, EditorAction::UpdateJudgeLoopSettings(settings));
    }
    let settings = config.judge_loop_settings.clone().unwrap();
    assert_eq!(settings.generator_agent_id, "writer");
    assert_eq!(settings.evaluator_agent_id, "critic");

    config = apply_checked(config, EditorAction::UpdateRouterAgentId("critic".to_string()));
    config = apply_checked(
        config,
        EditorAction::AddTool {
            agent_id: "writer".to_string(),
            tool: ToolDescriptor::agent("critic"),
        },
    );
    for id in ["critic", "writer", "main_assistant"] {
        config = apply_checked(config, EditorAction::RemoveAgent { id: id.to_string() });
    }
    config = apply_checked(config, EditorAction::UpdateRouterAgentId("ghost".to_string()));

    assert_eq!(config.agents.len(), 1);
    assert_eq!(config.router_agent_id, "main_assistant");
    let settings = config.judge_loop_settings.unwrap();
    assert_eq!(settings.generator_agent_id, "main_assistant");
    assert_eq!(settings.evaluator_agent_id, "main_assistant");
}

#[test]
fn judge_loop_settings_with_unknown_agents_are_ignored() {
    let mut editor = three_agent_editor();
    editor.update_workflow_type(WorkflowType::JudgeLoop);
    let before = editor.config().clone();

    let config = reduce(
        before.clone(),
        EditorAction::UpdateJudgeLoopSettings(judge_loop_settings(&before, "phantom", "ghost")),
    );
    assert_eq!(config, before);

    editor.update_judge_loop_settings(judge_loop_settings(&before, "main_assistant", "ghost"));
    assert_eq!(editor.config().judge_loop_settings, before.judge_loop_settings);
}

#[test]
fn removing_evaluator_reassigns_judge_loop() {
    let mut editor = three_agent_editor();
    editor.update_workflow_type(WorkflowType::JudgeLoop);
    let evaluator = editor.config().agents[1].id.clone();
    let remaining = editor.config().agents[2].id.clone();
    assert!(editor.select_agent(&remaining));

    assert!(editor.remove_agent(&evaluator));

    let config = editor.config();
    assert_judge_loop_ids_exist(config);
    let settings = config.judge_loop_settings.as_ref().unwrap();
    assert_eq!(settings.generator_agent_id, "main_assistant");
    assert_eq!(settings.evaluator_agent_id, remaining);
    assert_eq!(editor.active_agent_id(), "main_assistant");
}
