//! Bot → knowledge source mapping report
//!
//! Walks every Copilot Studio bot in a Dataverse environment, finds the
//! knowledge sources its components reference and reports which OneDrive,
//! SharePoint or Dataverse locations each bot can reach.

use crate::api::auth::{dataverse_scope, EntraAuth};
use crate::api::dataverse::{dataverse_api_client, DataverseClient, KnowledgeSource};
use crate::cmd::progress;
use crate::cmd::{banner, RunContext};
use crate::config::Credentials;
use crate::error::Result;
use crate::mapping::extract::{has_drive_items, parse_knowledge_config, KnowledgeConfig};
use crate::mapping::results::{BotOutcome, BotReport, ComponentReference};
use crate::mapping::{ExtractedSource, KnowledgeIndex, MappingResults};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

pub const DEFAULT_MAPPING_OUTPUT: &str = "knowledge_mapping_results.json";

const WIDTH: usize = 120;

#[derive(Args, Debug, Clone)]
pub struct KnowledgeMapArgs {
    /// File the mapping results are exported to
    #[arg(short, long, default_value = DEFAULT_MAPPING_OUTPUT)]
    pub output: PathBuf,

    /// Dataverse environment URL (defaults to DATAVERSE_URL)
    #[arg(long)]
    pub dataverse_url: Option<String>,

    /// Do not write the export file
    #[arg(long)]
    pub no_export: bool,
}

pub async fn run(
    args: &KnowledgeMapArgs,
    ctx: &RunContext,
    credentials: Credentials,
    dataverse_url: &str,
) -> Result<MappingResults> {
    println!("{}", banner(WIDTH));
    println!("{}", "BOT-TO-KNOWLEDGE-SOURCE MAPPER".bold());
    println!("{}", banner(WIDTH));
    println!(
        "\nMode: {}",
        if ctx.verbose { "VERBOSE" } else { "NORMAL" }
    );
    println!("Dataverse URL: {}", dataverse_url);
    println!("Output File: {}\n", args.output.display());

    let auth = EntraAuth::new(credentials, &ctx.settings.authority);
    let spinner = progress::create_spinner("Authenticating with Dataverse...");
    let token = match auth.acquire_token(&dataverse_scope(dataverse_url)).await {
        Ok(token) => {
            progress::finish_spinner_success(&spinner, "Authentication successful");
            token
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Authentication failed");
            return Err(e);
        }
    };
    info!("Dataverse token valid until {}", token.expires_at);

    let client = dataverse_api_client(dataverse_url, token.secret, &ctx.settings)?;
    let dataverse = DataverseClient::new(&client, ctx.settings.max_pages);

    let results = map_bots(&dataverse, ctx.verbose).await?;
    print_summary(&results);

    if !args.no_export {
        println!("\n{}", banner(WIDTH));
        println!("{}", "EXPORTING RESULTS".bold());
        println!("{}", banner(WIDTH));
        println!("Writing to '{}'...", args.output.display());
        results.export(&args.output)?;
        println!("{} Export complete", "✓".green());
    }

    println!("\n{}", banner(WIDTH));
    println!("{}", "COMPLETE!".green().bold());
    println!("{}", banner(WIDTH));
    if !args.no_export {
        println!("\nOutput file: {}", args.output.display());
        println!("This file contains the complete relationship mappings in JSON format.");
    }

    Ok(results)
}

/// Fetch bots and knowledge sources, then map every bot.
///
/// A failing component fetch is recorded against that bot and the run
/// continues; failures listing bots or knowledge sources abort.
pub async fn map_bots(dataverse: &DataverseClient<'_>, verbose: bool) -> Result<MappingResults> {
    let mut results = MappingResults::new();

    step_header("STEP 1: RETRIEVING ALL BOTS");
    println!("API: GET {}", dataverse.url("bots"));
    let spinner = progress::create_spinner("Fetching bots...");
    let bots = match dataverse.list_bots().await {
        Ok(bots) => {
            progress::clear_spinner(&spinner);
            bots
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Fetching bots failed");
            return Err(e);
        }
    };

    println!("{} Found {} bot(s)", "✓".green(), bots.len());
    for (i, bot) in bots.iter().enumerate() {
        println!(
            "  {}. {} (ID: {})",
            i + 1,
            bot.name.as_deref().unwrap_or("Unnamed"),
            bot.botid.as_deref().unwrap_or("N/A")
        );
    }

    if bots.is_empty() {
        println!("No bots found!");
        return Ok(results);
    }

    step_header("STEP 2: RETRIEVING ALL KNOWLEDGE SOURCES");
    println!("API: GET {}", dataverse.url("dvtablesearchs"));
    let spinner = progress::create_spinner("Fetching knowledge sources...");
    let sources = match dataverse.list_knowledge_sources().await {
        Ok(sources) => {
            progress::clear_spinner(&spinner);
            sources
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Fetching knowledge sources failed");
            return Err(e);
        }
    };

    let drive_count = sources.iter().filter(|ks| has_drive_items(ks)).count();
    println!("{} Found {} knowledge source(s)", "✓".green(), sources.len());
    println!("  - OneDrive/SharePoint sources: {}", drive_count);
    println!("  - Other sources: {}", sources.len() - drive_count);

    if verbose {
        for ks in &sources {
            print_drive_items(ks);
        }
    }

    let index = KnowledgeIndex::build(sources);
    println!("  - Unique knowledge source names: {}", index.unique_names());

    step_header("STEP 3: MAPPING BOTS TO KNOWLEDGE SOURCES");
    let total = bots.len();
    for (i, bot) in bots.iter().enumerate() {
        println!("\n{}", "-".repeat(WIDTH));
        println!(
            "{}",
            format!(
                "BOT {}/{}: {}",
                i + 1,
                total,
                bot.name.as_deref().unwrap_or("Unnamed Bot")
            )
            .bold()
        );
        println!("Bot ID: {}", bot.botid.as_deref().unwrap_or("N/A"));
        println!("{}", "-".repeat(WIDTH));

        let Some(bot_id) = bot.botid.as_deref() else {
            let report = results.record_failure(bot, "Bot has no botid");
            print_report(&report, verbose);
            continue;
        };

        println!(
            "API: GET {}",
            dataverse.url(&format!(
                "botcomponents?$filter=_parentbotid_value eq {}",
                bot_id
            ))
        );

        let report = match dataverse.list_bot_components(bot_id).await {
            Ok(components) => {
                println!(
                    "{} Retrieved {} component(s)",
                    "✓".green(),
                    components.len()
                );
                results.record_bot(bot, &components, &index)
            }
            Err(e) => {
                debug!("Component fetch for bot {} failed: {}", bot_id, e);
                results.record_failure(bot, &e.to_string())
            }
        };
        print_report(&report, verbose);
    }

    Ok(results)
}

fn step_header(title: &str) {
    println!("\n{}", banner(WIDTH));
    println!("{}", title.bold());
    println!("{}", banner(WIDTH));
}

fn print_drive_items(ks: &KnowledgeSource) {
    let Some(raw) = ks.knowledgeconfig.as_ref() else {
        return;
    };
    let Ok(KnowledgeConfig::GraphSearch { drive_items }) = parse_knowledge_config(raw) else {
        return;
    };
    if drive_items.is_empty() {
        return;
    }

    println!("\n  Knowledge Source: {}", ks.name.as_deref().unwrap_or("N/A"));
    println!("    GUID: {}", ks.dvtablesearchid.as_deref().unwrap_or("N/A"));
    println!("    URLs:");
    for item in drive_items {
        println!(
            "      - {}: {}",
            item.display_name.as_deref().unwrap_or("N/A"),
            item.web_url.as_deref().unwrap_or("")
        );
    }
}

fn print_report(report: &BotReport, verbose: bool) {
    match &report.outcome {
        BotOutcome::Failed(error) => {
            println!("\n{} {}", "✗ ERROR:".red().bold(), error);
            return;
        }
        BotOutcome::NoComponents => {
            println!("  └─ No components found");
            return;
        }
        _ => {}
    }

    println!("\nSearching for knowledge source references (GUIDs and NAMEs)...");
    if verbose {
        for (i, component) in report.component_matches.iter().enumerate() {
            println!(
                "\n  Component #{}: {} (Type: {})",
                i + 1,
                component.component_name,
                display_value(component.component_type.as_ref())
            );
            for (match_type, value) in &component.matches {
                println!("    {} Found {}: {}", "✓".green(), match_type, value);
            }
        }
    }

    if report.outcome == BotOutcome::NoReferences {
        println!("  └─ No knowledge source references found");
        return;
    }

    println!(
        "\n{} Found {} unique knowledge source reference(s)",
        "✓".green(),
        report.sources.len()
    );
    println!("\nExtracting URLs...");

    for source in &report.sources {
        println!("\n  Knowledge Source: {}", source.knowledge_source_name);
        println!("    GUID: {}", source.knowledge_source_id);
        println!("    Referenced by {} component(s):", source.references.len());
        for reference in &source.references {
            println!(
                "      - {} (Type: {}) via {}: {}",
                reference.component_name,
                display_value(reference.component_type.as_ref()),
                reference.match_type,
                reference.match_value
            );
        }

        for extracted in &source.extracted {
            match extracted {
                ExtractedSource::OneDrive(d) => {
                    println!("      └─ {} {}", "[OneDrive]".cyan(), d.name);
                    println!("         URL: {}", d.url);
                }
                ExtractedSource::SharePoint(d) => {
                    println!("      └─ {} {}", "[SharePoint]".blue(), d.name);
                    println!("         URL: {}", d.url);
                }
                ExtractedSource::Dataverse(t) => {
                    println!("      └─ {} {}/{}", "[Dataverse]".magenta(), t.server, t.database);
                }
                ExtractedSource::Unknown(d) => {
                    debug!("Unclassified location {} ({})", d.name, d.url);
                }
            }
        }
    }

    if let BotOutcome::Categorized {
        onedrive,
        sharepoint,
        other,
    } = report.outcome
    {
        if onedrive > 0 {
            println!("\n{} RESULT: {} OneDrive source(s)", "✓".green(), onedrive);
        }
        if sharepoint > 0 {
            println!("{} RESULT: {} SharePoint source(s)", "✓".green(), sharepoint);
        }
        if other > 0 {
            println!("{} RESULT: {} other source(s)", "✓".green(), other);
        }
        if onedrive + sharepoint + other == 0 {
            println!("{} RESULT: No OneDrive/SharePoint sources", "✗".red());
        }
    }
}

pub fn print_summary(results: &MappingResults) {
    step_header("STEP 4: SUMMARY REPORT");

    println!("\nTotal Bots Analyzed: {}", results.total_bots());
    println!(
        "  {} Bots with OneDrive access: {}",
        "✓".green(),
        results.agents_with_onedrive.len()
    );
    println!(
        "  {} Bots with SharePoint access: {}",
        "✓".green(),
        results.agents_with_sharepoint.len()
    );
    println!(
        "  {} Bots with other sources: {}",
        "✓".green(),
        results.agents_with_other_sources.len()
    );
    println!(
        "  {} Bots without sources: {}",
        "✗".red(),
        results.agents_without_sources.len()
    );

    if !results.detailed_mappings.is_empty() {
        step_header("COMPLETE RELATIONSHIP CHAINS");

        let mut current_bot: Option<&str> = None;
        for mapping in &results.detailed_mappings {
            if current_bot != Some(mapping.bot_name.as_str()) {
                current_bot = Some(mapping.bot_name.as_str());
                println!("\n┌─ BOT: {}", mapping.bot_name.bold());
                println!("│  Bot ID: {}", mapping.bot_id.as_deref().unwrap_or("N/A"));
            }

            println!("│");
            for reference in &mapping.component_references {
                print_chain_component(reference);
            }

            println!("│");
            println!(
                "├───── KNOWLEDGE SOURCE: {}",
                mapping.source.knowledge_source_name()
            );
            println!(
                "│      GUID: {}",
                mapping.source.knowledge_source_id().unwrap_or("N/A")
            );
            println!("│");

            match &mapping.source {
                ExtractedSource::Dataverse(t) => {
                    println!("└─────── [Dataverse] {}/{}", t.server, t.database);
                }
                other => {
                    if let Some(d) = other.drive() {
                        println!("└─────── [{}] {}", other.kind(), d.name);
                        println!("         URL: {}", d.url);
                    }
                }
            }
            println!();
        }
    }

    print_access_section(
        "BOTS WITH ONEDRIVE ACCESS",
        "OneDrive Sources",
        results
            .agents_with_onedrive
            .iter()
            .map(|a| (a, a.onedrive_sources.as_deref().unwrap_or_default())),
    );
    print_access_section(
        "BOTS WITH SHAREPOINT ACCESS",
        "SharePoint Sources",
        results
            .agents_with_sharepoint
            .iter()
            .map(|a| (a, a.sharepoint_sources.as_deref().unwrap_or_default())),
    );
}

fn print_chain_component(reference: &ComponentReference) {
    println!(
        "├─── COMPONENT: {} (Type: {})",
        reference.component_name,
        display_value(reference.component_type.as_ref())
    );
    println!(
        "│    Match: {}: {}",
        reference.match_type, reference.match_value
    );
}

fn print_access_section<'a, I>(title: &str, label: &str, agents: I)
where
    I: Iterator<Item = (&'a crate::mapping::AgentEntry, &'a [ExtractedSource])>,
{
    let mut agents = agents.peekable();
    if agents.peek().is_none() {
        return;
    }

    step_header(title);
    for (agent, sources) in agents {
        println!("\n{}", agent.name.bold());
        println!("  Bot ID: {}", agent.id.as_deref().unwrap_or("N/A"));
        println!("  {}:", label);
        for source in sources {
            if let Some(d) = source.drive() {
                println!("    • {}", d.name);
                println!("      URL: {}", d.url);
                println!("      Knowledge Source: {}", d.knowledge_source_name);
            }
        }
    }
}

/// Component type as printed: strings bare, other JSON values verbatim
fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
