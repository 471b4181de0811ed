use crate::config::Credentials;
use crate::error::{AgentMapError, Result};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use std::time::Duration;
use tracing::debug;

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// `.default` scope for a Dataverse environment URL
pub fn dataverse_scope(dataverse_url: &str) -> String {
    format!("{}/.default", dataverse_url.trim_end_matches('/'))
}

/// Bearer token held for the duration of one run
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Entra ID client credentials flow
pub struct EntraAuth {
    credentials: Credentials,
    authority: String,
}

impl EntraAuth {
    pub fn new(credentials: Credentials, authority: &str) -> Self {
        Self {
            credentials,
            authority: authority.trim_end_matches('/').to_string(),
        }
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority, self.credentials.tenant_id
        )
    }

    /// Exchange the app credentials for an access token.
    ///
    /// Not retried. When the provider refuses, its `error_description` (or
    /// `error` code) is surfaced in the returned `AuthError`.
    pub async fn acquire_token(&self, scope: &str) -> Result<AccessToken> {
        let tenant_id = &self.credentials.tenant_id;

        let auth_url = AuthUrl::new(format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.authority, tenant_id
        ))
        .map_err(|e| AgentMapError::AuthError(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(self.token_url())
            .map_err(|e| AgentMapError::AuthError(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(self.credentials.client_id.clone()),
            Some(ClientSecret::new(self.credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        debug!("Requesting token for scope {}", scope);

        let token = client
            .exchange_client_credentials()
            .add_scope(Scope::new(scope.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => {
                    let message = resp
                        .error_description()
                        .cloned()
                        .unwrap_or_else(|| resp.error().to_string());
                    AgentMapError::AuthError(format!("Failed to acquire token: {}", message))
                }
                RequestTokenError::Parse(_, body) => AgentMapError::AuthError(format!(
                    "Failed to acquire token: no access_token in response: {}",
                    String::from_utf8_lossy(&body)
                )),
                other => AgentMapError::AuthError(format!("Token request failed: {}", other)),
            })?;

        let lifetime = token.expires_in().unwrap_or(Duration::from_secs(3600));
        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::hours(1));

        debug!("Token acquired, expires at {}", expires_at.to_rfc3339());

        Ok(AccessToken {
            secret: token.access_token().secret().clone(),
            expires_at,
        })
    }
}
