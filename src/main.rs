use agentmap::cmd::{self, RunContext};
use agentmap::config::{self, Credentials, Settings};
use agentmap::error::{self, AgentMapError};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "agentmap",
    about = "Inventory Entra agent identities and map Copilot Studio bots to their knowledge sources",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output and debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List Entra agent identities
    Agents(cmd::agents::AgentsArgs),

    /// Map Copilot Studio bots to their knowledge sources
    #[command(name = "knowledge-map")]
    KnowledgeMap(cmd::knowledge::KnowledgeMapArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let AgentMapError::MissingEnv(missing) = &e {
            cmd::print_setup_help(missing);
        }
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "agentmap=debug"
    } else {
        "agentmap=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    config::load_dotenv(cli.env_file.as_deref())?;
    let ctx = RunContext {
        settings: Settings::load(cli.config.as_deref())?,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Agents(args) => {
            let credentials = Credentials::from_env()?;
            cmd::agents::list(&args, &ctx, credentials).await?;
        }
        Commands::KnowledgeMap(args) => {
            let credentials = Credentials::from_env();
            let dataverse_url = match &args.dataverse_url {
                Some(url) => Ok(config::normalize_dataverse_url(url)),
                None => config::dataverse_url_from_env(),
            };

            // report every missing variable at once
            let (credentials, dataverse_url) = match (credentials, dataverse_url) {
                (Ok(c), Ok(u)) => (c, u),
                (Err(AgentMapError::MissingEnv(mut a)), Err(AgentMapError::MissingEnv(b))) => {
                    a.extend(b);
                    return Err(AgentMapError::MissingEnv(a));
                }
                (Err(e), _) | (_, Err(e)) => return Err(e),
            };

            cmd::knowledge::run(&args, &ctx, credentials, &dataverse_url).await?;
        }
    }

    Ok(())
}
