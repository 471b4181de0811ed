//! Per-bot aggregation into the exported results document

use crate::api::dataverse::{Bot, BotComponent};
use crate::error::Result;
use crate::mapping::extract::{extract_sources, ExtractedSource, SourceKind};
use crate::mapping::index::{source_key, KnowledgeIndex, MatchType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub const REASON_NO_COMPONENTS: &str = "No components found";
pub const REASON_NO_REFERENCES: &str = "No knowledge source references found";

const UNNAMED_BOT: &str = "Unnamed Bot";
const NOT_AVAILABLE: &str = "N/A";

/// A component that referenced a knowledge source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReference {
    pub component_id: Option<String>,
    pub component_type: Option<Value>,
    pub component_name: String,
    pub match_type: MatchType,
    pub match_value: String,
}

/// Bot → components → knowledge source → location chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedMapping {
    pub bot_name: String,
    pub bot_id: Option<String>,
    pub component_references: Vec<ComponentReference>,
    #[serde(flatten)]
    pub source: ExtractedSource,
}

/// Bot entry in one of the categorized lists
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onedrive_sources: Option<Vec<ExtractedSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharepoint_sources: Option<Vec<ExtractedSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_sources: Option<Vec<ExtractedSource>>,
}

impl AgentEntry {
    fn brief(bot: &Bot) -> Self {
        Self {
            name: bot_name(bot),
            id: bot.botid.clone(),
            ..Default::default()
        }
    }

    fn full(bot: &Bot) -> Self {
        Self {
            created: Some(bot.createdon.clone().unwrap_or_else(|| NOT_AVAILABLE.into())),
            modified: Some(bot.modifiedon.clone().unwrap_or_else(|| NOT_AVAILABLE.into())),
            ..Self::brief(bot)
        }
    }
}

/// Knowledge source referenced by a bot, with what it resolved to
#[derive(Debug, Clone)]
pub struct ReferencedSource {
    pub knowledge_source_id: String,
    pub knowledge_source_name: String,
    pub references: Vec<ComponentReference>,
    pub extracted: Vec<ExtractedSource>,
}

/// Matches of a single component, for verbose output
#[derive(Debug, Clone)]
pub struct ComponentMatches {
    pub component_name: String,
    pub component_type: Option<Value>,
    pub matches: Vec<(MatchType, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BotOutcome {
    NoComponents,
    NoReferences,
    Categorized {
        onedrive: usize,
        sharepoint: usize,
        other: usize,
    },
    Failed(String),
}

/// What happened while mapping one bot
#[derive(Debug, Clone)]
pub struct BotReport {
    pub bot_name: String,
    pub bot_id: Option<String>,
    pub component_count: usize,
    pub component_matches: Vec<ComponentMatches>,
    pub sources: Vec<ReferencedSource>,
    pub outcome: BotOutcome,
}

/// Results of a mapping run.
///
/// Built bot by bot with [`MappingResults::record_bot`] and
/// [`MappingResults::record_failure`], then exported as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingResults {
    #[serde(default)]
    pub detailed_mappings: Vec<DetailedMapping>,
    #[serde(default)]
    pub agents_with_onedrive: Vec<AgentEntry>,
    #[serde(default)]
    pub agents_with_sharepoint: Vec<AgentEntry>,
    #[serde(default)]
    pub agents_with_other_sources: Vec<AgentEntry>,
    #[serde(default)]
    pub agents_without_sources: Vec<AgentEntry>,
}

impl MappingResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all bucket sizes; a bot in several buckets counts several times
    pub fn total_bots(&self) -> usize {
        self.agents_with_onedrive.len()
            + self.agents_with_sharepoint.len()
            + self.agents_with_other_sources.len()
            + self.agents_without_sources.len()
    }

    /// Record a bot whose components could not be fetched
    pub fn record_failure(&mut self, bot: &Bot, error: &str) -> BotReport {
        self.agents_without_sources.push(AgentEntry {
            error: Some(error.to_string()),
            ..AgentEntry::brief(bot)
        });

        BotReport {
            bot_name: bot_name(bot),
            bot_id: bot.botid.clone(),
            component_count: 0,
            component_matches: Vec::new(),
            sources: Vec::new(),
            outcome: BotOutcome::Failed(error.to_string()),
        }
    }

    /// Match a bot's components against the index, extract the referenced
    /// locations and file the bot into its buckets
    pub fn record_bot(
        &mut self,
        bot: &Bot,
        components: &[BotComponent],
        index: &KnowledgeIndex,
    ) -> BotReport {
        let name = bot_name(bot);
        let mut report = BotReport {
            bot_name: name.clone(),
            bot_id: bot.botid.clone(),
            component_count: components.len(),
            component_matches: Vec::new(),
            sources: Vec::new(),
            outcome: BotOutcome::NoComponents,
        };

        if components.is_empty() {
            self.agents_without_sources.push(AgentEntry {
                reason: Some(REASON_NO_COMPONENTS.to_string()),
                ..AgentEntry::brief(bot)
            });
            return report;
        }

        // knowledge source id -> components referencing it, first-seen order
        let mut found: Vec<(String, Vec<ComponentReference>)> = Vec::new();

        for component in components {
            let matches = index.find_references(component);
            if matches.is_empty() {
                continue;
            }

            let component_name = component
                .name
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());

            report.component_matches.push(ComponentMatches {
                component_name: component_name.clone(),
                component_type: component.componenttype.clone(),
                matches: matches
                    .iter()
                    .map(|m| (m.match_type, m.match_value.clone()))
                    .collect(),
            });

            for m in matches {
                let reference = ComponentReference {
                    component_id: component.botcomponentid.clone(),
                    component_type: component.componenttype.clone(),
                    component_name: component_name.clone(),
                    match_type: m.match_type,
                    match_value: m.match_value,
                };
                let key = source_key(m.source);
                match found.iter_mut().find(|(id, _)| *id == key) {
                    Some((_, refs)) => refs.push(reference),
                    None => found.push((key, vec![reference])),
                }
            }
        }

        if found.is_empty() {
            self.agents_without_sources.push(AgentEntry {
                reason: Some(REASON_NO_REFERENCES.to_string()),
                ..AgentEntry::brief(bot)
            });
            report.outcome = BotOutcome::NoReferences;
            return report;
        }

        let mut onedrive = Vec::new();
        let mut sharepoint = Vec::new();
        let mut other = Vec::new();

        for (ks_id, references) in found {
            let Some(ks) = index.get_by_id(&ks_id) else {
                continue;
            };

            let extracted = extract_sources(ks);
            for source in &extracted {
                match source.kind() {
                    SourceKind::OneDrive => onedrive.push(source.clone()),
                    SourceKind::SharePoint => sharepoint.push(source.clone()),
                    SourceKind::Dataverse => other.push(source.clone()),
                    SourceKind::Unknown => {}
                }

                self.detailed_mappings.push(DetailedMapping {
                    bot_name: name.clone(),
                    bot_id: bot.botid.clone(),
                    component_references: references.clone(),
                    source: source.clone(),
                });
            }

            report.sources.push(ReferencedSource {
                knowledge_source_name: ks
                    .name
                    .clone()
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                knowledge_source_id: ks_id,
                references,
                extracted,
            });
        }

        let mut entry = AgentEntry::full(bot);
        let mut counts = (0, 0, 0);

        if !onedrive.is_empty() {
            let unique = dedupe_by_url(onedrive);
            counts.0 = unique.len();
            entry.onedrive_sources = Some(unique);
            self.agents_with_onedrive.push(entry.clone());
        }

        if !sharepoint.is_empty() {
            let unique = dedupe_by_url(sharepoint);
            counts.1 = unique.len();
            entry.sharepoint_sources = Some(unique);
            self.agents_with_sharepoint.push(entry.clone());
        }

        if !other.is_empty() {
            counts.2 = other.len();
            entry.other_sources = Some(other);
            self.agents_with_other_sources.push(entry.clone());
        }

        if counts == (0, 0, 0) {
            self.agents_without_sources.push(entry);
        }

        report.outcome = BotOutcome::Categorized {
            onedrive: counts.0,
            sharepoint: counts.1,
            other: counts.2,
        };
        report
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

fn bot_name(bot: &Bot) -> String {
    bot.name.clone().unwrap_or_else(|| UNNAMED_BOT.to_string())
}

/// One entry per URL: first position, last occurrence wins
fn dedupe_by_url(sources: Vec<ExtractedSource>) -> Vec<ExtractedSource> {
    let mut unique: Vec<ExtractedSource> = Vec::with_capacity(sources.len());
    for source in sources {
        match unique.iter().position(|s| s.url() == source.url()) {
            Some(pos) => unique[pos] = source,
            None => unique.push(source),
        }
    }
    unique
}
