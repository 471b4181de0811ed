//! Entra agent identity listing through the Graph `$batch` endpoint
//!
//! The `servicePrincipals` query needs `ConsistencyLevel: eventual` for
//! `$count`/`$search`, which is carried on the inner batch request.

use crate::api::query::ODataQuery;
use crate::api::ApiClient;
use crate::error::{enhance_api_error, AgentMapError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Service principals that are agent identities or Copilot Studio agents
pub const AGENT_IDENTITY_FILTER: &str = "(isof('microsoft.graph.agentIdentity') OR (tags/any(p:startswith(p, 'power-virtual-agents-')) OR tags/any(p:p eq 'AgenticInstance')))";

/// Agent identity (service principal) record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub created_by_app_id: Option<String>,
    #[serde(default)]
    pub agent_identity_blueprint_id: Option<String>,
    #[serde(default)]
    pub account_enabled: Option<bool>,
    #[serde(default)]
    pub service_principal_type: Option<String>,
    #[serde(default)]
    pub disabled_by_microsoft_status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Optional clauses for the agent listing
#[derive(Debug, Clone, Default)]
pub struct AgentQuery {
    pub filter: Option<String>,
    pub select: Vec<String>,
    pub orderby: Option<String>,
    pub top: Option<u32>,
    pub search: Option<String>,
}

impl AgentQuery {
    /// Base agent filter, AND-ed with the caller's filter when present
    pub fn combined_filter(&self) -> String {
        match self.filter.as_deref().map(str::trim) {
            Some(user) if !user.is_empty() => {
                format!("({}) and ({})", AGENT_IDENTITY_FILTER, user)
            }
            _ => AGENT_IDENTITY_FILTER.to_string(),
        }
    }

    /// Relative URL of the inner batch request
    pub fn relative_url(&self) -> String {
        let mut query = ODataQuery::new()
            .count(true)
            .filter(self.combined_filter())
            .select(&self.select);

        if let Some(orderby) = &self.orderby {
            query = query.orderby(orderby.clone());
        }
        if let Some(top) = self.top {
            query = query.top(top);
        }
        if let Some(search) = &self.search {
            query = query.search(search.clone());
        }

        query.apply("/servicePrincipals")
    }
}

#[derive(Debug, Serialize)]
struct BatchRequest {
    requests: Vec<BatchRequestItem>,
}

#[derive(Debug, Serialize)]
struct BatchRequestItem {
    id: String,
    method: String,
    url: String,
    headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    responses: Option<Vec<BatchResponseItem>>,
}

#[derive(Debug, Deserialize)]
struct BatchResponseItem {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    body: Value,
}

/// Inner response body of the listing, kept verbatim for export
#[derive(Debug, Clone)]
pub struct AgentListing {
    pub body: Value,
}

impl AgentListing {
    pub fn agents(&self) -> Result<Vec<AgentIdentity>> {
        match self.body.get("value") {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(Vec::new()),
        }
    }

    pub fn next_link(&self) -> Option<&str> {
        self.body.get("@odata.nextLink").and_then(|v| v.as_str())
    }

    pub fn count(&self) -> Option<i64> {
        self.body.get("@odata.count").and_then(|v| v.as_i64())
    }
}

/// Directory operations against the Graph beta endpoint
pub struct DirectoryClient<'a> {
    client: &'a ApiClient,
}

impl<'a> DirectoryClient<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// List agent identities through a single-request `$batch` call
    pub async fn list_agents(&self, query: &AgentQuery) -> Result<AgentListing> {
        let url = query.relative_url();
        debug!("Batched GET {}", url);

        let request = BatchRequest {
            requests: vec![BatchRequestItem {
                id: "1".to_string(),
                method: "GET".to_string(),
                url,
                headers: BTreeMap::from([(
                    "ConsistencyLevel".to_string(),
                    "eventual".to_string(),
                )]),
            }],
        };

        let response: BatchResponse = self.client.post("$batch", &request).await?;
        let listing = unwrap_batch(response)?;

        if let Some(next) = listing.next_link() {
            warn!(
                "Agent listing has more pages ({}); only the first page is reported",
                next
            );
        }

        Ok(listing)
    }
}

fn unwrap_batch(response: BatchResponse) -> Result<AgentListing> {
    let inner = response
        .responses
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AgentMapError::BatchError("Invalid batch response structure".into()))?;

    if inner.status != 200 {
        return Err(AgentMapError::BatchError(format!(
            "inner request returned status {}: {}",
            inner.status,
            enhance_api_error(&inner.body.to_string())
        )));
    }

    Ok(AgentListing { body: inner.body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_combined_filter() {
        let query = AgentQuery {
            filter: Some("accountEnabled eq true".into()),
            ..Default::default()
        };
        assert_eq!(
            query.combined_filter(),
            format!("({}) and (accountEnabled eq true)", AGENT_IDENTITY_FILTER)
        );
        assert_eq!(AgentQuery::default().combined_filter(), AGENT_IDENTITY_FILTER);
    }

    #[test]
    fn test_relative_url_encodes_filter() {
        let query = AgentQuery {
            select: vec!["id".into(), "displayName".into()],
            top: Some(5),
            ..Default::default()
        };
        let url = query.relative_url();
        assert!(url.starts_with("/servicePrincipals?$count=true&$filter=%28isof%28"));
        assert!(url.ends_with("&$select=id%2CdisplayName&$top=5"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_unwrap_batch_missing_responses() {
        let response: BatchResponse = serde_json::from_value(json!({})).unwrap();
        let err = unwrap_batch(response).unwrap_err();
        assert!(err.to_string().contains("Invalid batch response structure"));

        let response: BatchResponse = serde_json::from_value(json!({"responses": []})).unwrap();
        assert!(unwrap_batch(response).is_err());
    }

    #[test]
    fn test_unwrap_batch_inner_failure() {
        let response: BatchResponse = serde_json::from_value(json!({
            "responses": [{
                "id": "1",
                "status": 403,
                "body": {"error": {"code": "Authorization_RequestDenied", "message": "Insufficient privileges"}}
            }]
        }))
        .unwrap();
        let err = unwrap_batch(response).unwrap_err().to_string();
        assert!(err.contains("status 403"));
        assert!(err.contains("Authorization_RequestDenied: Insufficient privileges"));
    }

    #[test]
    fn test_listing_agents() {
        let listing = AgentListing {
            body: json!({
                "@odata.count": 1,
                "value": [{
                    "id": "sp-1",
                    "displayName": "HR Helper",
                    "accountEnabled": true,
                    "tags": ["power-virtual-agents-1234"]
                }]
            }),
        };
        let agents = listing.agents().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].display_name.as_deref(), Some("HR Helper"));
        assert_eq!(agents[0].account_enabled, Some(true));
        assert!(agents[0].created_by_app_id.is_none());
        assert_eq!(listing.count(), Some(1));
        assert!(listing.next_link().is_none());
    }
}
