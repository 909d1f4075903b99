use clap::{Parser, Subcommand};
use std::sync::Arc;

use rulebot::application::messaging::Bot;
use rulebot::domain::traits::{Memory, Transport};
use rulebot::infrastructure::adapters::{ConsoleTransport, SlackConnector};
use rulebot::infrastructure::config::{Config, MemoryBackend};
use rulebot::infrastructure::database::SqliteStore;
use rulebot::infrastructure::storage::InMemoryStore;
use rulebot::BotError;

#[derive(Parser)]
#[command(name = "rulebot")]
#[command(about = "A rule-driven chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Slack token (overrides config)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            if let Err(e) = run_bot(&cli.config, cli.token).await {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("rulebot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            if let Err(e) = init_config(&cli.config) {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(path: &str) -> Config {
    let mut config = if std::path::Path::new(path).exists() {
        Config::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        })
    } else {
        Config::default()
    };
    config.apply_env(|name| std::env::var(name).ok());
    config
}

fn open_memory(config: &Config) -> Result<Arc<dyn Memory>, BotError> {
    match (config.memory.backend, &config.memory.path) {
        (MemoryBackend::Sqlite, Some(path)) => {
            tracing::info!("Using sqlite memory at {}", path.display());
            Ok(Arc::new(SqliteStore::open(path)?))
        }
        _ => {
            tracing::info!("Using in-process memory");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

async fn open_transport(config: &Config) -> Box<dyn Transport> {
    match SlackConnector::from_config(&config.slack) {
        Some(connector) => {
            let transport = connector.connect().await;
            if let Some(e) = transport.last_error() {
                tracing::error!("Slack connection failed to start: {}", e);
            }
            Box::new(transport)
        }
        None => {
            tracing::info!(
                "Skipping Slack: set RULEBOT_SLACK_TOKEN to enable it. Falling back to console"
            );
            Box::new(ConsoleTransport::stdio())
        }
    }
}

async fn run_bot(config_path: &str, token_override: Option<String>) -> Result<(), BotError> {
    let mut config = load_config(config_path);
    if let Some(token) = token_override {
        config.slack.token = Some(token);
    }
    config.validate()?;

    tracing::info!("Starting rulebot: {}", config.bot.name);

    let memory = open_memory(&config)?;
    let rules = rulebot::rules::from_config(&config.rules)?;
    let transport = open_transport(&config).await;

    let bot = Bot::builder(config.bot.name.clone(), memory)
        .with_rules(rules)
        .with_transport(&*transport)?
        .build()?;

    bot.serve(&*transport).await
}

fn init_config(path: &str) -> Result<(), BotError> {
    if std::path::Path::new(path).exists() {
        tracing::warn!("{} already exists, leaving it alone", path);
        return Ok(());
    }
    let yaml = Config::default_yaml()?;
    std::fs::write(path, yaml).map_err(|e| BotError::Internal(e.to_string()))?;
    println!("Wrote default config to {}", path);
    Ok(())
}
