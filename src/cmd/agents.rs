//! Entra agent identity listing
//!
//! Lists service principals that are agent identities (or Copilot Studio
//! agents), prints them and exports the raw response body.

use crate::api::auth::{EntraAuth, GRAPH_SCOPE};
use crate::api::directory::{AgentIdentity, AgentListing, AgentQuery, DirectoryClient};
use crate::api::ApiClient;
use crate::cmd::progress;
use crate::cmd::{banner, RunContext};
use crate::config::Credentials;
use crate::error::{AgentMapError, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_AGENTS_OUTPUT: &str = "entra_agents.json";

#[derive(Args, Debug, Clone)]
pub struct AgentsArgs {
    /// Extra OData filter, combined with the agent identity filter using AND
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Properties to return (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Maximum number of results
    #[arg(long)]
    pub top: Option<u32>,

    /// Search expression, e.g. "displayName:Sales"
    #[arg(long)]
    pub search: Option<String>,

    /// Sort order, e.g. "displayName desc"
    #[arg(long)]
    pub orderby: Option<String>,

    /// Output format: table, json
    #[arg(long, default_value = "table")]
    pub format: String,

    /// File the raw API response is exported to
    #[arg(short, long, default_value = DEFAULT_AGENTS_OUTPUT)]
    pub output: PathBuf,

    /// Do not write the export file
    #[arg(long)]
    pub no_export: bool,
}

impl AgentsArgs {
    pub fn query(&self) -> AgentQuery {
        AgentQuery {
            filter: self.filter.clone(),
            select: self.select.clone(),
            orderby: self.orderby.clone(),
            top: self.top,
            search: self.search.clone(),
        }
    }
}

pub async fn list(
    args: &AgentsArgs,
    ctx: &RunContext,
    credentials: Credentials,
) -> Result<AgentListing> {
    if args.format != "table" && args.format != "json" {
        return Err(AgentMapError::ConfigError(format!(
            "Unknown output format '{}' (expected table or json)",
            args.format
        )));
    }

    let auth = EntraAuth::new(credentials, &ctx.settings.authority);

    let spinner = progress::create_spinner("Acquiring access token...");
    let token = match auth.acquire_token(GRAPH_SCOPE).await {
        Ok(token) => {
            progress::finish_spinner_success(&spinner, "Authenticated");
            token
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Authentication failed");
            return Err(e);
        }
    };
    info!("Graph token valid until {}", token.expires_at);

    let client = ApiClient::new(&ctx.settings.graph_endpoint, token.secret, &ctx.settings)?;
    let directory = DirectoryClient::new(&client);

    let spinner = progress::create_spinner("Listing agent identities...");
    let listing = match directory.list_agents(&args.query()).await {
        Ok(listing) => {
            progress::clear_spinner(&spinner);
            listing
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Listing failed");
            return Err(e);
        }
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&listing.body)?);
    } else {
        print_agents(&listing.agents()?);
    }

    if !args.no_export {
        export_listing(&listing, &args.output)?;
        eprintln!(
            "{} Exported agents to {}",
            "✓".green(),
            args.output.display()
        );
    }

    Ok(listing)
}

/// Write the inner response body as pretty JSON
pub fn export_listing(listing: &AgentListing, path: &Path) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(&listing.body)?)?;
    Ok(())
}

fn print_agents(agents: &[AgentIdentity]) {
    if agents.is_empty() {
        println!("No agent identities found.");
        return;
    }

    println!(
        "\n{} Found {} agent identities:\n",
        "Entra".blue().bold(),
        agents.len()
    );
    println!("{}", banner(80));

    for (idx, agent) in agents.iter().enumerate() {
        println!("\n{}", format!("Agent #{}", idx + 1).bold());
        println!("{}", "-".repeat(80));
        println!("  ID:                     {}", or_na(&agent.id));
        println!("  Display Name:           {}", or_na(&agent.display_name));
        println!("  Created DateTime:       {}", or_na(&agent.created_date_time));
        println!("  Created By App ID:      {}", or_na(&agent.created_by_app_id));
        println!(
            "  Blueprint ID:           {}",
            or_na(&agent.agent_identity_blueprint_id)
        );
        println!(
            "  Account Enabled:        {}",
            match agent.account_enabled {
                Some(true) => "Yes".green(),
                Some(false) => "No".red(),
                None => "N/A".normal(),
            }
        );
        println!(
            "  Service Principal Type: {}",
            or_na(&agent.service_principal_type)
        );
        println!(
            "  Disabled by Microsoft:  {}",
            or_na(&agent.disabled_by_microsoft_status)
        );
        if agent.tags.is_empty() {
            println!("  Tags:                   None");
        } else {
            println!("  Tags:                   {}", agent.tags.join(", "));
        }
    }

    println!("\n{}", banner(80));
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("N/A")
}
