use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentMapError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Batch request failed: {0}")]
    BatchError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid knowledge configuration: {0}")]
    InvalidKnowledgeConfig(String),
}

pub type Result<T> = std::result::Result<T, AgentMapError>;

/// Parse a Graph or Dataverse error body and add context for common failures.
///
/// Both services wrap failures as `{"error": {"code": ..., "message": ...}}`.
/// Anything else is returned verbatim.
pub fn enhance_api_error(error_response: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" | "0x80072560" => {
                    "\nHint: The access token was rejected. Check the tenant ID and that the token audience matches the API."
                }
                "Forbidden" | "Authorization_RequestDenied" | "InsufficientPrivileges" => {
                    "\nHint: Grant the app registration Application.Read.All (Graph) or an application user with a Dataverse security role, then grant admin consent."
                }
                "0x80040220" => {
                    "\nHint: The application user has no privilege on this Dataverse table."
                }
                "BadRequest" | "0x0" if message.contains("Could not find a property") => {
                    "\nHint: An OData $filter or $select references an unknown column."
                }
                "NotFound" | "ResourceNotFound" => {
                    "\nHint: The requested collection doesn't exist in this environment."
                }
                "TooManyRequests" | "0x80072322" => {
                    "\nHint: API rate limit exceeded. Wait a moment and try again."
                }
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    error_response.to_string()
}
