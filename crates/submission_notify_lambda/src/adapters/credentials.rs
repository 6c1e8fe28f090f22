use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google service-account key, as found in the JSON key file.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

pub trait CredentialSource {
    fn load(&self) -> Result<ServiceAccountKey, String>;
}

/// Reads the base64-encoded key file from an environment variable on every
/// load, so a rotated secret is picked up without a cold start.
#[derive(Debug, Clone)]
pub struct EnvCredentialSource {
    variable: String,
}

impl EnvCredentialSource {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl CredentialSource for EnvCredentialSource {
    fn load(&self) -> Result<ServiceAccountKey, String> {
        let blob = std::env::var(&self.variable)
            .map_err(|_| format!("{} must be configured", self.variable))?;
        decode_service_account_key(&blob)
    }
}

pub fn decode_service_account_key(blob: &str) -> Result<ServiceAccountKey, String> {
    let decoded = STANDARD
        .decode(blob.trim())
        .map_err(|error| format!("failed to decode storage credentials: {error}"))?;
    let key: ServiceAccountKey = serde_json::from_slice(&decoded)
        .map_err(|error| format!("failed to parse storage credentials: {error}"))?;

    if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
        return Err("storage credentials must include client_email and private_key".to_string());
    }

    Ok(key)
}
