//! Knowledge configuration parsing and source classification

use crate::api::dataverse::KnowledgeSource;
use crate::error::{AgentMapError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

pub const KIND_GRAPH_SEARCH: &str = "IngestionBasedGraphSearchConfiguration";
pub const KIND_SQL_FEDERATED: &str = "SqlFederatedTableSearchConfiguration";

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    OneDrive,
    SharePoint,
    Dataverse,
    Unknown,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceKind::OneDrive => "OneDrive",
            SourceKind::SharePoint => "SharePoint",
            SourceKind::Dataverse => "Dataverse",
            SourceKind::Unknown => "Unknown",
        };
        write!(f, "{}", label)
    }
}

/// Classify a drive item URL. Personal sites win over plain SharePoint.
pub fn classify_url(web_url: &str) -> SourceKind {
    let url = web_url.to_lowercase();
    if url.contains("-my.sharepoint.com") || url.contains("/personal/") {
        SourceKind::OneDrive
    } else if url.contains("sharepoint.com") {
        SourceKind::SharePoint
    } else {
        SourceKind::Unknown
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Parsed `knowledgeconfig`, discriminated by `$kind`
#[derive(Debug, Clone)]
pub enum KnowledgeConfig {
    GraphSearch {
        drive_items: Vec<DriveItem>,
    },
    SqlFederated {
        server: Option<String>,
        database: Option<String>,
    },
    /// Any other kind, or none at all
    Other,
}

/// Parse a `knowledgeconfig` value delivered either as a JSON string or as
/// an already-decoded object
pub fn parse_knowledge_config(raw: &Value) -> Result<KnowledgeConfig> {
    let decoded;
    let config = match raw {
        Value::String(text) => {
            decoded = serde_json::from_str::<Value>(text)?;
            &decoded
        }
        other => other,
    };

    let object = config.as_object().ok_or_else(|| {
        AgentMapError::InvalidKnowledgeConfig(format!("expected a JSON object, got {}", config))
    })?;

    let kind = object.get("$kind").and_then(|k| k.as_str());

    match kind {
        Some(KIND_GRAPH_SEARCH) => {
            let drive_items = match object.get("driveItems") {
                None | Some(Value::Null) => Vec::new(),
                Some(items) => serde_json::from_value(items.clone())?,
            };
            Ok(KnowledgeConfig::GraphSearch { drive_items })
        }
        Some(KIND_SQL_FEDERATED) => Ok(KnowledgeConfig::SqlFederated {
            server: string_field(object.get("sqlServerName")),
            database: string_field(object.get("sqlDbName")),
        }),
        _ => Ok(KnowledgeConfig::Other),
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// OneDrive/SharePoint/Unknown drive item of a knowledge source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveSource {
    pub name: String,
    pub url: String,
    pub knowledge_source_id: Option<String>,
    pub knowledge_source_name: String,
}

/// Dataverse table search knowledge source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub server: String,
    pub database: String,
    pub knowledge_source_id: Option<String>,
    pub knowledge_source_name: String,
}

/// One location a knowledge source points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractedSource {
    OneDrive(DriveSource),
    SharePoint(DriveSource),
    Unknown(DriveSource),
    Dataverse(TableSource),
}

impl ExtractedSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ExtractedSource::OneDrive(_) => SourceKind::OneDrive,
            ExtractedSource::SharePoint(_) => SourceKind::SharePoint,
            ExtractedSource::Unknown(_) => SourceKind::Unknown,
            ExtractedSource::Dataverse(_) => SourceKind::Dataverse,
        }
    }

    pub fn drive(&self) -> Option<&DriveSource> {
        match self {
            ExtractedSource::OneDrive(d)
            | ExtractedSource::SharePoint(d)
            | ExtractedSource::Unknown(d) => Some(d),
            ExtractedSource::Dataverse(_) => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.drive().map(|d| d.url.as_str())
    }

    pub fn knowledge_source_id(&self) -> Option<&str> {
        match self {
            ExtractedSource::Dataverse(t) => t.knowledge_source_id.as_deref(),
            other => other.drive().and_then(|d| d.knowledge_source_id.as_deref()),
        }
    }

    pub fn knowledge_source_name(&self) -> &str {
        match self {
            ExtractedSource::Dataverse(t) => &t.knowledge_source_name,
            other => other
                .drive()
                .map(|d| d.knowledge_source_name.as_str())
                .unwrap_or(NOT_AVAILABLE),
        }
    }
}

/// Locations referenced by a knowledge source.
///
/// A malformed configuration is logged and yields nothing.
pub fn extract_sources(source: &KnowledgeSource) -> Vec<ExtractedSource> {
    let Some(raw) = source.knowledgeconfig.as_ref() else {
        return Vec::new();
    };
    if matches!(raw, Value::Null) || matches!(raw, Value::String(s) if s.is_empty()) {
        return Vec::new();
    }

    let ks_name = source
        .name
        .clone()
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let config = match parse_knowledge_config(raw) {
        Ok(config) => config,
        Err(e) => {
            warn!(
                "Could not parse knowledge config of '{}' ({}): {}",
                ks_name,
                source.dvtablesearchid.as_deref().unwrap_or("no id"),
                e
            );
            return Vec::new();
        }
    };

    match config {
        KnowledgeConfig::GraphSearch { drive_items } => drive_items
            .into_iter()
            .map(|item| {
                let url = item.web_url.unwrap_or_default();
                let drive = DriveSource {
                    name: item
                        .display_name
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    knowledge_source_id: source.dvtablesearchid.clone(),
                    knowledge_source_name: ks_name.clone(),
                    url,
                };
                match classify_url(&drive.url) {
                    SourceKind::OneDrive => ExtractedSource::OneDrive(drive),
                    SourceKind::SharePoint => ExtractedSource::SharePoint(drive),
                    _ => ExtractedSource::Unknown(drive),
                }
            })
            .collect(),
        KnowledgeConfig::SqlFederated { server, database } => {
            vec![ExtractedSource::Dataverse(TableSource {
                server: server.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                database: database.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                knowledge_source_id: source.dvtablesearchid.clone(),
                knowledge_source_name: ks_name,
            })]
        }
        KnowledgeConfig::Other => Vec::new(),
    }
}

/// Whether a source is a OneDrive/SharePoint ingestion source with drive items.
/// Unparseable configurations count as "no".
pub fn has_drive_items(source: &KnowledgeSource) -> bool {
    source
        .knowledgeconfig
        .as_ref()
        .and_then(|raw| parse_knowledge_config(raw).ok())
        .map(|config| {
            matches!(config, KnowledgeConfig::GraphSearch { ref drive_items } if !drive_items.is_empty())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source_with(config: Value) -> KnowledgeSource {
        KnowledgeSource {
            dvtablesearchid: Some("ks-1".into()),
            name: Some("Policies".into()),
            knowledgeconfig: Some(config),
        }
    }

    #[test]
    fn test_classify_url() {
        assert_eq!(
            classify_url("https://contoso-my.sharepoint.com/personal/alice/doc"),
            SourceKind::OneDrive
        );
        assert_eq!(
            classify_url("https://example.com/personal/bob/notes"),
            SourceKind::OneDrive
        );
        assert_eq!(
            classify_url("https://contoso.sharepoint.com/sites/HR/Shared%20Documents"),
            SourceKind::SharePoint
        );
        assert_eq!(
            classify_url("HTTPS://CONTOSO.SHAREPOINT.COM/sites/IT"),
            SourceKind::SharePoint
        );
        assert_eq!(classify_url("https://example.org/files"), SourceKind::Unknown);
        assert_eq!(classify_url(""), SourceKind::Unknown);
    }

    #[test]
    fn test_extract_graph_search_from_string() {
        let config = json!({
            "$kind": KIND_GRAPH_SEARCH,
            "driveItems": [
                {"displayName": "alice doc", "webUrl": "https://contoso-my.sharepoint.com/personal/alice/doc"},
                {"displayName": "HR site", "webUrl": "https://contoso.sharepoint.com/sites/HR"},
                {"webUrl": "https://files.example.org/x"}
            ]
        });
        let sources = extract_sources(&source_with(Value::String(config.to_string())));

        let kinds: Vec<SourceKind> = sources.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![SourceKind::OneDrive, SourceKind::SharePoint, SourceKind::Unknown]
        );
        assert_eq!(sources[0].drive().unwrap().name, "alice doc");
        assert_eq!(sources[2].drive().unwrap().name, "N/A");
        assert_eq!(sources[1].knowledge_source_name(), "Policies");
        assert_eq!(sources[1].knowledge_source_id(), Some("ks-1"));
    }

    #[test]
    fn test_extract_from_decoded_object() {
        let config = json!({
            "$kind": KIND_SQL_FEDERATED,
            "sqlServerName": "org.crm.dynamics.com",
            "sqlDbName": "org_db"
        });
        let sources = extract_sources(&source_with(config));

        assert_eq!(sources.len(), 1);
        match &sources[0] {
            ExtractedSource::Dataverse(t) => {
                assert_eq!(t.server, "org.crm.dynamics.com");
                assert_eq!(t.database, "org_db");
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_sql_missing_names_default() {
        let sources = extract_sources(&source_with(json!({"$kind": KIND_SQL_FEDERATED})));
        assert_eq!(
            sources[0],
            ExtractedSource::Dataverse(TableSource {
                server: "N/A".into(),
                database: "N/A".into(),
                knowledge_source_id: Some("ks-1".into()),
                knowledge_source_name: "Policies".into(),
            })
        );
    }

    #[test]
    fn test_unknown_or_absent_kind_is_dropped() {
        assert!(extract_sources(&source_with(json!({"$kind": "WebSearchConfiguration"}))).is_empty());
        assert!(extract_sources(&source_with(json!({"driveItems": []}))).is_empty());
    }

    #[test]
    fn test_malformed_config_yields_nothing() {
        let source = source_with(Value::String("{not json".into()));
        assert!(parse_knowledge_config(source.knowledgeconfig.as_ref().unwrap()).is_err());
        assert!(extract_sources(&source).is_empty());
        assert!(!has_drive_items(&source));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_malformed_config_logs_warning() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let source = source_with(Value::String("{not".into()));
        let extracted = tracing::subscriber::with_default(subscriber, || extract_sources(&source));

        assert!(extracted.is_empty());
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "no warning logged: {output}");
        assert!(output.contains("'Policies'"), "source name missing: {output}");
        assert!(output.contains("ks-1"), "source id missing: {output}");
    }

    #[test]
    fn test_has_drive_items() {
        let with_items = source_with(json!({
            "$kind": KIND_GRAPH_SEARCH,
            "driveItems": [{"webUrl": "https://contoso.sharepoint.com/sites/a"}]
        }));
        let empty = source_with(json!({"$kind": KIND_GRAPH_SEARCH, "driveItems": []}));
        assert!(has_drive_items(&with_items));
        assert!(!has_drive_items(&empty));
    }

    #[test]
    fn test_serialized_shape_is_flat_with_type_tag() {
        let source = ExtractedSource::OneDrive(DriveSource {
            name: "doc".into(),
            url: "https://contoso-my.sharepoint.com/personal/alice/doc".into(),
            knowledge_source_id: Some("ks-1".into()),
            knowledge_source_name: "Policies".into(),
        });
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value["type"], "OneDrive");
        assert_eq!(value["url"], "https://contoso-my.sharepoint.com/personal/alice/doc");
        assert_eq!(value["knowledge_source_name"], "Policies");
    }
}
