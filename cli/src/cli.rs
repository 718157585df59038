use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use anyhow::anyhow;
use chatbot_agents::AgentConfig;
use chatbot_agents::AgentSession;
use chatbot_agents::ChatbotDocument;
use chatbot_agents::ChatbotStore;
use chatbot_agents::ConfigValidator;
use chatbot_agents::ExecutionClient;
use chatbot_agents::FileChatbotStore;
use chatbot_agents::PhaseOutcome;
use chatbot_agents::SaveReport;
use chatbot_agents::ToolDescriptor;
use chatbot_agents::ValidationReport;
use chatbot_agents::WorkflowType;
use chatbot_agents::widget::Sender;
use chatbot_agents::widget::WidgetConfigServer;
use chatbot_agents::widget::WidgetRuntime;
use colored::*;
use dialoguer::Input;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::edit::EditCommand;
use crate::edit::apply_edit;

fn open_store(config: &Config) -> Arc<dyn ChatbotStore> {
    Arc::new(FileChatbotStore::new(&config.chatbots_dir))
}

fn execution_client(config: &Config) -> Result<ExecutionClient> {
    Ok(ExecutionClient::with_timeout(&config.api.base_url, config.timeout())?)
}

/// Fetches a chatbot and checks that it belongs to the configured user.
async fn owned_chatbot(store: &dyn ChatbotStore, config: &Config, id: &str) -> Result<ChatbotDocument> {
    let document = store
        .get_chatbot(id)
        .await?
        .ok_or_else(|| anyhow!("Chatbot '{}' not found", id))?;
    if document.user_id != config.user.id {
        return Err(anyhow!("Chatbot '{}' belongs to another user", id));
    }
    Ok(document)
}

async fn open_session(config: &Config, id: &str) -> Result<AgentSession> {
    let store = open_store(config);
    owned_chatbot(store.as_ref(), config, id).await?;
    let mut session = AgentSession::load(store, execution_client(config)?, id).await?;
    session.editor_mut().set_preview(|config: &AgentConfig| {
        debug!(fingerprint = %config.fingerprint(), agents = config.agents.len(), "preview refreshed");
    });
    Ok(session)
}

/// Initialize configuration
pub async fn initialize_config(config_path: Option<&Path>, force: bool) -> Result<()> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::get_config_dir()?.join("config.yaml"),
    };

    if config_file.exists() {
        if !force {
            return Err(anyhow!("Configuration already exists. Use --force to overwrite."));
        }
        tokio::fs::remove_file(&config_file).await?;
    }

    println!("{}", "🔧 Initializing configuration...".blue());
    let config = Config::load(config_path).await?;

    println!(
        "{} {}",
        "✅ Configuration created:".green(),
        config.config_file.display().to_string().bright_black()
    );
    println!(
        "   Chatbots directory: {}",
        config.chatbots_dir.display().to_string().bright_black()
    );
    println!("   Execution API: {}", config.api.base_url.bright_black());
    println!();
    println!("{}", "🚀 Ready to use! Try:".blue());
    println!("   {}", "chatbot create \"Support Bot\"".cyan());
    println!("   {}", "chatbot list".cyan());

    Ok(())
}

/// Show configuration and chatbot counts
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", "📊 Chatbot Agents Status".blue().bold());
    println!();

    println!("{}", "⚙️ Configuration:".blue());
    println!("   Config file: {}", config.config_file.display().to_string().bright_black());
    println!("   Chatbots dir: {}", config.chatbots_dir.display().to_string().bright_black());
    println!("   Execution API: {}", config.api.base_url.bright_black());
    println!("   User: {}", config.user.id.bright_black());
    println!("   Widget endpoint: {}", config.widget.bind.bright_black());
    println!();

    let chatbots = open_store(config).get_user_chatbots(&config.user.id).await?;
    let configured = chatbots.iter().filter(|doc| doc.settings.agent.is_some()).count();
    println!("{}", "🤖 Chatbots:".blue());
    println!("   Total: {}", chatbots.len().to_string().bright_black());
    println!("   With agent configuration: {}", configured.to_string().bright_black());
    println!();

    let issues = config.validate();
    if issues.is_empty() {
        println!("{}", "✅ All checks passed".green());
    } else {
        println!("{}", "⚠️ Issues found:".yellow());
        for issue in issues {
            println!("   - {}", issue.yellow());
        }
    }

    Ok(())
}

pub async fn create_chatbot(config: &Config, name: &str, format: &str) -> Result<()> {
    let document = open_store(config).create_chatbot(&config.user.id, name).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    println!("{} {}", "✅ Chatbot created:".green(), document.name.cyan());
    println!("   Id: {}", document.id.bright_black());
    println!();
    println!("{}", "📝 Next steps:".blue());
    println!("   {}", format!("chatbot edit {} add-agent --name Helper", document.id).cyan());
    println!("   {}", format!("chatbot apply {}", document.id).cyan());
    Ok(())
}

/// List the configured user's chatbots, most recently updated first
pub async fn list_chatbots(config: &Config, format: &str) -> Result<()> {
    let chatbots = open_store(config).get_user_chatbots(&config.user.id).await?;

    match format {
        "json" => {
            let json_output = json!({
                "chatbots": chatbots.iter().map(|doc| {
                    let agent = doc.settings.agent.as_ref();
                    json!({
                        "id": doc.id,
                        "name": doc.name,
                        "updated_at": doc.updated_at,
                        "agents": agent.map(|config| config.agents.len()),
                        "workflow_type": agent.map(|config| config.workflow_type),
                    })
                }).collect::<Vec<_>>()
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
        _ => {
            if chatbots.is_empty() {
                println!("{}", "No chatbots found.".yellow());
                println!("{} {}", "ℹ Run".blue(), "chatbot create <name>".cyan());
                println!("   to create your first chatbot");
                return Ok(());
            }

            println!("{}\n", "📋 Chatbots:".blue().bold());
            for doc in &chatbots {
                println!("  🤖 {} {}", doc.name.green(), doc.id.bright_black());
                match &doc.settings.agent {
                    Some(agent) => println!(
                        "      {}: {} agents, {}",
                        "Agents".blue(),
                        agent.agents.len(),
                        agent.workflow_type
                    ),
                    None => println!("      {}", "not configured yet".bright_black()),
                }
                println!(
                    "      {}: {}",
                    "Updated".blue(),
                    doc.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
    }

    Ok(())
}

pub async fn delete_chatbot(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config);
    owned_chatbot(store.as_ref(), config, id).await?;
    store.delete_chatbot(id).await?;
    println!("{} {}", "🗑️ Deleted chatbot".green(), id.bright_black());
    Ok(())
}

pub async fn show_chatbot(config: &Config, id: &str, format: &str) -> Result<()> {
    let store = open_store(config);
    let document = owned_chatbot(store.as_ref(), config, id).await?;
    let agent_config = document.agent_config_or_default();

    if format == "json" {
        println!("{}", agent_config.to_json_pretty()?);
        return Ok(());
    }

    println!("{} {}", "🤖".blue(), document.name.bold());
    if document.settings.agent.is_none() {
        println!("   {}", "(no saved agent configuration; showing defaults)".bright_black());
    }
    print_config(&agent_config);
    Ok(())
}

fn print_config(config: &AgentConfig) {
    println!("   System: {}", config.system_name.cyan());
    println!("   Workflow: {}", config.workflow_type);
    println!("   Router: {}", config.router_agent_id);
    println!("   Default model: {}", config.default_model);
    println!("   Fingerprint: {}", config.fingerprint().bright_black());
    println!();

    println!("{} {}", "📦 Context:".blue(), config.context_class.name);
    for (index, attribute) in config.context_class.attributes.iter().enumerate() {
        match &attribute.default {
            Some(default) => println!("   #{index} {}: {} = {default}", attribute.name, attribute.kind),
            None => println!("   #{index} {}: {}", attribute.name, attribute.kind),
        }
    }
    println!();

    println!("{}", "👥 Agents:".blue());
    for agent in &config.agents {
        let marker = if agent.id == config.router_agent_id { "★" } else { " " };
        println!("  {marker} {} ({})", agent.name.green(), agent.id.bright_black());
        println!("      {}: {}", "Model".blue(), agent.model_or(&config.default_model));
        if !agent.handoffs.is_empty() {
            println!("      {}: {}", "Handoffs".blue(), agent.handoffs.join(", "));
        }
        for (index, tool) in agent.tools.iter().enumerate() {
            println!("      {} #{index}: {}", "Tool".blue(), describe_tool(tool));
        }
        if let Some(output_type) = &agent.output_type {
            let fields: Vec<&str> = output_type.property_names().collect();
            println!("      {}: {} {{{}}}", "Output".blue(), output_type.name, fields.join(", "));
        }
    }

    if config.workflow_type == WorkflowType::JudgeLoop {
        if let Some(settings) = &config.judge_loop_settings {
            println!();
            println!("{}", "⚖️ Judge loop:".blue());
            println!(
                "   {} → {} (max {} iterations)",
                settings.generator_agent_id, settings.evaluator_agent_id, settings.max_iterations
            );
            println!(
                "   pass when {} = {}, feedback in {}",
                settings.pass_field, settings.pass_value, settings.feedback_field
            );
        }
    }
}

fn describe_tool(tool: &ToolDescriptor) -> String {
    match tool {
        ToolDescriptor::BuiltIn(built_in) => match &built_in.vector_store_id {
            Some(vector_store_id) => format!("{} [{vector_store_id}]", built_in.name),
            None => built_in.name.clone(),
        },
        ToolDescriptor::Agent { agent_id } => format!("agent {agent_id}"),
        ToolDescriptor::ApiCall(api) => format!("{} {} {}", api.name, api.api_config.method, api.api_config.url),
    }
}

fn print_report(report: &ValidationReport) {
    for error in &report.errors {
        println!("   {} {}", "❌".red(), error);
    }
    for warning in &report.warnings {
        println!("   {} {}", "⚠️".yellow(), warning.yellow());
    }
    for info in &report.info {
        println!("   {} {}", "ℹ️".blue(), info.bright_black());
    }
    if report.is_valid() {
        println!("{}", report.summary().green());
    } else {
        println!("{}", report.summary().red());
    }
}

pub async fn validate_chatbot(config: &Config, id: &str, strict: bool) -> Result<()> {
    let store = open_store(config);
    let document = owned_chatbot(store.as_ref(), config, id).await?;
    let validator = if strict {
        ConfigValidator::strict()
    } else {
        ConfigValidator::new()
    };
    let report = validator.validate(&document.agent_config_or_default());

    println!("{} {}", "🔍 Validating".blue(), document.name.cyan());
    print_report(&report);
    if report.is_valid() {
        Ok(())
    } else {
        Err(anyhow!("Agent configuration of '{}' is invalid", id))
    }
}

fn print_save_report(report: &SaveReport) -> Result<()> {
    let phase = |outcome: &PhaseOutcome| match outcome {
        PhaseOutcome::Completed => "✅ completed".green(),
        PhaseOutcome::Failed(message) => format!("❌ failed: {message}").red(),
        PhaseOutcome::Skipped => "⏭️ skipped".bright_black(),
    };
    println!("   Stored: {}", phase(&report.stored));
    println!("   Registered: {}", phase(&report.registered));

    if report.is_complete() {
        println!("{}", "✅ Configuration saved and registered".green());
        Ok(())
    } else if report.is_partial() {
        println!(
            "{}",
            "⚠️ Configuration saved but not registered; run `chatbot apply` to retry".yellow()
        );
        Err(anyhow!("Registration with the execution API failed"))
    } else {
        Err(anyhow!("Saving the agent configuration failed"))
    }
}

pub async fn edit_chatbot(config: &Config, id: &str, dry_run: bool, command: EditCommand) -> Result<()> {
    let mut session = open_session(config, id).await?;
    let message = apply_edit(session.editor_mut(), command)?;
    println!("{} {}", "✏️".blue(), message);

    let report = session.editor().config().validate();
    if dry_run {
        println!("{}", session.editor().config().to_json_pretty()?);
        print_report(&report);
        println!("{}", "(dry run: nothing was saved)".bright_black());
        return Ok(());
    }

    if report.issue_count() > 0 {
        print_report(&report);
    }
    print_save_report(&session.save().await)
}

/// Re-run the two-phase save for the stored configuration
pub async fn apply_chatbot(config: &Config, id: &str) -> Result<()> {
    let mut session = open_session(config, id).await?;
    println!("{} {}", "🚀 Applying configuration of".blue(), id.cyan());
    print_save_report(&session.save().await)
}

pub async fn test_chatbot(config: &Config, id: &str, message: Option<String>) -> Result<()> {
    let session = open_session(config, id).await?;
    if !session.editor().config_saved() {
        return Err(anyhow!(
            "Chatbot '{}' has not been saved yet. Run `chatbot apply {}` first.",
            id,
            id
        ));
    }

    let message = match message {
        Some(message) => message,
        None => Input::new().with_prompt("Enter a test message").interact_text()?,
    };

    println!("{} {}", "📝 Message:".blue(), message.bright_black());
    let reply = session.test(&message).await?;
    println!("{}\n", "✅ Response:".green());
    println!("{}", reply.response);

    if !reply.iterations.is_empty() {
        let pass_value = session
            .editor()
            .config()
            .judge_loop_settings
            .as_ref()
            .map(|settings| settings.pass_value.clone())
            .unwrap_or_else(|| "pass".to_string());
        println!();
        println!("{}", "🔁 Iterations:".blue());
        for (index, iteration) in reply.iterations.iter().enumerate() {
            println!("  #{} {}", index + 1, iteration.content);
            if let Some(evaluation) = &iteration.evaluation {
                let score = evaluation
                    .score
                    .as_ref()
                    .map(|score| score.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let score = if iteration.passed(&pass_value) {
                    score.green()
                } else {
                    score.red()
                };
                println!("      {}: {}", "Score".blue(), score);
                if let Some(feedback) = &evaluation.feedback {
                    println!("      {}: {}", "Feedback".blue(), feedback.bright_black());
                }
            }
        }
    }
    Ok(())
}

pub async fn upload_file(config: &Config, id: &str, agent_id: &str, path: &Path) -> Result<()> {
    let mut session = open_session(config, id).await?;
    println!("{} {}", "📤 Uploading".blue(), path.display().to_string().cyan());
    let vector_store_id = session.upload_file(agent_id, path).await?;
    println!("{} {}", "✅ Vector store:".green(), vector_store_id.bright_black());
    print_save_report(&session.save().await)
}

pub async fn serve_widget_config(config: &Config, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.widget.bind.clone());
    let server = WidgetConfigServer::bind(&bind, config.widget_endpoint_settings())?;
    match server.local_addr() {
        Some(addr) => println!(
            "{} http://{addr}{}",
            "🌐 Widget config endpoint:".blue(),
            chatbot_agents::widget::WIDGET_CONFIG_PATH
        ),
        None => println!("{} {bind}", "🌐 Widget config endpoint:".blue()),
    }
    tokio::task::spawn_blocking(move || server.run()).await?;
    Ok(())
}

/// Talk to a chatbot the way the embedded widget does
pub async fn chat(config: &Config, id: &str, config_url: Option<String>, message: Option<String>) -> Result<()> {
    let config_url = config_url.unwrap_or_else(|| config.widget.config_url.clone());
    let mut runtime = WidgetRuntime::new(id, config_url);
    runtime.toggle();

    if let Some(message) = message {
        if let Some(entry) = runtime.send(&message).await? {
            println!("{}", entry.text);
        }
        return Ok(());
    }

    println!("{}", "💬 Chat started. Send an empty message to quit.".blue());
    loop {
        let message: String = Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()?;
        if message.trim().is_empty() {
            break;
        }
        if let Some(entry) = runtime.send(&message).await? {
            let label = match entry.sender {
                Sender::Bot => "bot".green(),
                Sender::User => "you".blue(),
            };
            println!("{label}: {}", entry.text);
        }
    }
    runtime.toggle();
    Ok(())
}
