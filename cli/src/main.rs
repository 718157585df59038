use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;

mod cli;
mod config;
mod edit;

use config::Config;
use edit::EditCommand;

#[derive(Parser)]
#[command(name = "chatbot")]
#[command(about = "Configure, register and test multi-agent chatbots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and setup
    Init {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and chatbot status
    Status,

    /// Create a new chatbot
    Create {
        name: String,

        /// Output format (text, json); defaults to `output.format`
        #[arg(short, long)]
        format: Option<String>,
    },

    /// List your chatbots
    List {
        /// Output format (text, json); defaults to `output.format`
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Delete a chatbot
    Delete { id: String },

    /// Show a chatbot's agent configuration
    Show {
        id: String,

        /// Output format (text, json); defaults to `output.format`
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Check a chatbot's agent configuration
    Validate {
        id: String,

        /// Treat judge loop schema mismatches as errors
        #[arg(long)]
        strict: bool,
    },

    /// Change a chatbot's agent configuration, then save and register it
    Edit {
        id: String,

        /// Print the resulting configuration without saving
        #[arg(long)]
        dry_run: bool,

        #[command(subcommand)]
        op: EditCommand,
    },

    /// Save and register the stored configuration again
    Apply { id: String },

    /// Send a test message to a registered chatbot
    Test {
        id: String,

        /// Message to send (prompted when omitted)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Upload a file for an agent's file_search tool
    Upload {
        id: String,
        agent: String,
        file: PathBuf,
    },

    /// Serve the widget config endpoint
    ServeWidgetConfig {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,
    },

    /// Chat with a chatbot through the widget runtime
    Chat {
        id: String,

        /// Widget config endpoint URL
        #[arg(long)]
        config_url: Option<String>,

        /// Send one message and exit
        #[arg(short, long)]
        message: Option<String>,
    },
}

fn output_format(config: &Config, format: Option<String>) -> String {
    format.unwrap_or_else(|| config.output.format.clone())
}

/// Logs go to stderr so `--format json` output stays parseable.
fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("chatbot_cli={log_level},chatbot_agents={log_level}"))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        init_logging(cli.verbose);
        return cli::initialize_config(cli.config.as_deref(), force).await;
    }

    // Load configuration
    let config = Config::load(cli.config.as_deref()).await?;
    init_logging(cli.verbose || config.output.verbose);

    match cli.command {
        Commands::Init { .. } => {}

        Commands::Status => {
            cli::show_status(&config).await?;
        }

        Commands::Create { name, format } => {
            cli::create_chatbot(&config, &name, &output_format(&config, format)).await?;
        }

        Commands::List { format } => {
            cli::list_chatbots(&config, &output_format(&config, format)).await?;
        }

        Commands::Delete { id } => {
            cli::delete_chatbot(&config, &id).await?;
        }

        Commands::Show { id, format } => {
            cli::show_chatbot(&config, &id, &output_format(&config, format)).await?;
        }

        Commands::Validate { id, strict } => {
            cli::validate_chatbot(&config, &id, strict).await?;
        }

        Commands::Edit { id, dry_run, op } => {
            cli::edit_chatbot(&config, &id, dry_run, op).await?;
        }

        Commands::Apply { id } => {
            cli::apply_chatbot(&config, &id).await?;
        }

        Commands::Test { id, message } => {
            cli::test_chatbot(&config, &id, message).await?;
        }

        Commands::Upload { id, agent, file } => {
            cli::upload_file(&config, &id, &agent, &file).await?;
        }

        Commands::ServeWidgetConfig { bind } => {
            cli::serve_widget_config(&config, bind).await?;
        }

        Commands::Chat {
            id,
            config_url,
            message,
        } => {
            cli::chat(&config, &id, config_url, message).await?;
        }
    }

    Ok(())
}
