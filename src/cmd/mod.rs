pub mod agents;
pub mod knowledge;
pub mod progress;

use crate::config::{Settings, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_DATAVERSE_URL, ENV_TENANT_ID};
use colored::Colorize;

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct RunContext {
    pub settings: Settings,
    pub verbose: bool,
}

pub(crate) fn banner(width: usize) -> String {
    "=".repeat(width)
}

/// Explain how to provide credentials after a `MissingEnv` failure
pub fn print_setup_help(missing: &[String]) {
    eprintln!("{}", banner(80));
    eprintln!("{} Missing required environment variables", "ERROR:".red().bold());
    eprintln!("{}", banner(80));
    for var in missing {
        eprintln!("  {}", var.yellow());
    }

    eprintln!("\nSet them in the environment or in a .env file:");
    eprintln!("  {}=12345678-1234-1234-1234-123456789abc", ENV_CLIENT_ID);
    eprintln!("  {}=your-secret-here", ENV_CLIENT_SECRET);
    eprintln!("  {}=87654321-4321-4321-4321-cba987654321", ENV_TENANT_ID);
    eprintln!(
        "  {}=https://yourorg.crm.dynamics.com   (knowledge-map only)",
        ENV_DATAVERSE_URL
    );

    eprintln!("\nApp registration setup:");
    eprintln!("  1. Register an application in the Entra admin center");
    eprintln!("  2. Create a client secret under 'Certificates & secrets'");
    eprintln!("  3. agents: add Microsoft Graph > Application permissions > Application.Read.All");
    eprintln!("     and grant admin consent");
    eprintln!("  4. knowledge-map: add the app as an application user in the Dataverse");
    eprintln!("     environment with read access to bots, botcomponents and dvtablesearchs");
}
