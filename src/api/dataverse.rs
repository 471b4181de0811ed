//! Dataverse Web API access for Copilot Studio tables
//!
//! Reads `bots`, `dvtablesearchs` (knowledge sources) and `botcomponents`.

use crate::api::query::ODataQuery;
use crate::api::ApiClient;
use crate::config::Settings;
use crate::error::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KNOWLEDGE_SOURCE_COLUMNS: &[&str] =
    &["dvtablesearchid", "knowledgeconfig", "name", "appmoduleid"];

/// Copilot Studio bot (`bots` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    #[serde(default)]
    pub botid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub createdon: Option<String>,
    #[serde(default)]
    pub modifiedon: Option<String>,
}

/// Knowledge source configuration (`dvtablesearchs` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    #[serde(default)]
    pub dvtablesearchid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// JSON document, usually delivered as a string
    #[serde(default)]
    pub knowledgeconfig: Option<Value>,
}

/// Bot component (`botcomponents` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotComponent {
    #[serde(default)]
    pub botcomponentid: Option<String>,
    #[serde(default)]
    pub componenttype: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub content: Option<Value>,
}

/// `{environment}/api/data/{version}`
pub fn api_base(dataverse_url: &str, api_version: &str) -> String {
    format!(
        "{}/api/data/{}",
        dataverse_url.trim_end_matches('/'),
        api_version
    )
}

/// API client carrying the OData headers Dataverse expects
pub fn dataverse_api_client(
    dataverse_url: &str,
    access_token: String,
    settings: &Settings,
) -> Result<ApiClient> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("odata-maxversion"),
        HeaderValue::from_static("4.0"),
    );
    headers.insert(
        HeaderName::from_static("odata-version"),
        HeaderValue::from_static("4.0"),
    );

    ApiClient::with_headers(
        &api_base(dataverse_url, &settings.dataverse_api_version),
        access_token,
        settings,
        headers,
    )
}

/// Collection retrievers for the mapping pipeline
pub struct DataverseClient<'a> {
    client: &'a ApiClient,
    max_pages: usize,
}

impl<'a> DataverseClient<'a> {
    pub fn new(client: &'a ApiClient, max_pages: usize) -> Self {
        Self { client, max_pages }
    }

    pub fn url(&self, endpoint: &str) -> String {
        self.client.url(endpoint)
    }

    pub async fn list_bots(&self) -> Result<Vec<Bot>> {
        self.client.get_all_pages("bots", self.max_pages).await
    }

    pub async fn list_knowledge_sources(&self) -> Result<Vec<KnowledgeSource>> {
        let endpoint = ODataQuery::new()
            .select(KNOWLEDGE_SOURCE_COLUMNS)
            .apply("dvtablesearchs");
        self.client.get_all_pages(&endpoint, self.max_pages).await
    }

    pub async fn list_bot_components(&self, bot_id: &str) -> Result<Vec<BotComponent>> {
        self.client
            .get_all_pages(&bot_components_endpoint(bot_id), self.max_pages)
            .await
    }
}

pub fn bot_components_endpoint(bot_id: &str) -> String {
    ODataQuery::new()
        .filter(format!("_parentbotid_value eq {}", bot_id))
        .apply("botcomponents")
}
