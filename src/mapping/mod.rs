//! Bot → knowledge source mapping
//!
//! Pipeline: [`index::KnowledgeIndex`] finds which knowledge sources each
//! component mentions, [`extract::extract_sources`] turns a knowledge source
//! into OneDrive/SharePoint/Dataverse locations, and
//! [`results::MappingResults`] files every bot into its buckets.

pub mod extract;
pub mod index;
pub mod results;

pub use extract::{classify_url, extract_sources, ExtractedSource, SourceKind};
pub use index::{KnowledgeIndex, MatchType};
pub use results::{AgentEntry, BotOutcome, BotReport, DetailedMapping, MappingResults};
