//! Agent Relay - a supervisor that plans and routes conversation across agents.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agent_relay::agents::{Agent, AgentError, Supervisor};
use agent_relay::ai::{AiClient, AiError, Model};
use agent_relay::config::{AppConfig, ConfigError, ConfigLoader};
use agent_relay::display::{print_error, print_provider, ConsoleObserver};

#[derive(Parser)]
#[command(
    name = "agent-relay",
    about = "Supervisor agent that delegates conversation to sub-agents",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print system and payload turns without truncation.
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the supervisor, one message per line.
    Chat,
    /// Send one message and print the supervisor's reply.
    Ask {
        /// The message to send.
        message: String,
    },
    /// Show config search paths and the resolved configuration.
    Config,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn loader(path: Option<PathBuf>) -> ConfigLoader {
    path.map_or_else(ConfigLoader::new, ConfigLoader::with_path)
}

fn build_supervisor(config: &AppConfig, raw: bool) -> Result<Supervisor, CliError> {
    let client = AiClient::from_config(config.ai.clone())?;
    let provider = format!("{:?}", client.provider_kind()).to_lowercase();
    print_provider(&provider, client.model());
    let lm = Model::new(Arc::new(client.into_provider()))
        .with_observer(Arc::new(ConsoleObserver::new(raw)));
    Ok(config.build_supervisor(&lm)?)
}

async fn chat(mut supervisor: Supervisor) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        // A failed exchange leaves the transcript usable; report and carry on.
        if let Err(e) = supervisor.add(line.into(), None).await {
            print_error(&e.to_string());
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let loader = loader(cli.config);
    match cli.command {
        Commands::Config => {
            for path in loader.search_paths() {
                let marker = if path.exists() { "*" } else { " " };
                println!("{marker} {}", path.display());
            }
            let config = loader.load()?;
            println!("\n{}", toml::to_string_pretty(&config)?);
        }
        Commands::Chat => {
            let config = loader.load()?;
            tracing::info!(
                supervisor = %config.supervisor.name,
                agents = config.agents.len(),
                "Starting chat"
            );
            chat(build_supervisor(&config, cli.raw)?).await?;
        }
        Commands::Ask { message } => {
            let mut config = loader.load()?;
            config.supervisor.echo = false;
            let mut supervisor = build_supervisor(&config, cli.raw)?;
            supervisor.add(message.into(), None).await?;
            println!("{}", supervisor.final_response());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}
