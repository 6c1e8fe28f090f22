use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use submission_notify_core::contract::ObjectDetails;

use super::block_on;
use super::credentials::ServiceAccountKey;

pub const GCS_API_BASE: &str = "https://storage.googleapis.com";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3_600;
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

pub trait SubmissionStore {
    fn upload_file(
        &self,
        credentials: &ServiceAccountKey,
        object_name: &str,
        source: &Path,
        content_type: Option<&str>,
    ) -> Result<(), String>;

    fn object_details(
        &self,
        credentials: &ServiceAccountKey,
        object_name: &str,
    ) -> Result<Option<ObjectDetails>, String>;
}

/// Write-once precondition for an upload: a new object must not appear
/// concurrently, an existing one must not change generation underneath us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    DoesNotExist,
    GenerationMatch(i64),
}

impl WritePrecondition {
    pub fn for_existing(existing: Option<&ObjectDetails>) -> Self {
        match existing {
            Some(details) => Self::GenerationMatch(details.generation),
            None => Self::DoesNotExist,
        }
    }

    pub fn if_generation_match(self) -> i64 {
        match self {
            Self::DoesNotExist => 0,
            Self::GenerationMatch(generation) => generation,
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    client_email: String,
    access_token: String,
    expires_at: i64,
}

/// Google Cloud Storage over the JSON API.
pub struct GcsSubmissionStore {
    http: reqwest::Client,
    bucket: String,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

// The JSON API encodes 64-bit numbers as strings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsObjectResource {
    name: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    generation: Option<String>,
}

impl GcsObjectResource {
    fn into_details(self) -> Result<ObjectDetails, String> {
        let size = parse_numeric(self.size.as_deref(), "size")?;
        let generation = parse_numeric(self.generation.as_deref(), "generation")?;
        Ok(ObjectDetails {
            name: self.name,
            content_type: self.content_type,
            size: u64::try_from(size).map_err(|_| "object size is negative".to_string())?,
            generation,
        })
    }
}

fn parse_numeric(value: Option<&str>, field: &str) -> Result<i64, String> {
    match value {
        None => Ok(0),
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|error| format!("object {field} '{raw}' is not numeric: {error}")),
    }
}

impl GcsSubmissionStore {
    pub fn new(http: reqwest::Client, bucket: impl Into<String>) -> Self {
        Self::with_api_base(http, bucket, GCS_API_BASE)
    }

    pub fn with_api_base(
        http: reqwest::Client,
        bucket: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            bucket: bucket.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        }
    }

    fn object_url(&self, object_name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_base,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(object_name)
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.api_base,
            urlencoding::encode(&self.bucket)
        )
    }

    fn cached_token(&self, client_email: &str, now: i64) -> Option<String> {
        let guard = self.token.lock().ok()?;
        guard
            .as_ref()
            .filter(|token| {
                token.client_email == client_email
                    && token.expires_at - TOKEN_REFRESH_MARGIN_SECS > now
            })
            .map(|token| token.access_token.clone())
    }

    async fn access_token(&self, credentials: &ServiceAccountKey) -> Result<String, String> {
        let now = Utc::now().timestamp();
        self.access_token_at(credentials, now).await
    }

    async fn access_token_at(
        &self,
        credentials: &ServiceAccountKey,
        now: i64,
    ) -> Result<String, String> {
        if let Some(token) = self.cached_token(&credentials.client_email, now) {
            return Ok(token);
        }

        let assertion = sign_token_assertion(credentials, now)?;
        let response = self
            .http
            .post(&credentials.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| format!("failed to request storage access token: {error}"))?
            .error_for_status()
            .map_err(|error| format!("storage access token was refused: {error}"))?
            .json::<TokenResponse>()
            .await
            .map_err(|error| format!("failed to parse storage access token: {error}"))?;

        let expires_at = now + response.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(CachedToken {
                client_email: credentials.client_email.clone(),
                access_token: response.access_token.clone(),
                expires_at,
            });
        }

        Ok(response.access_token)
    }

    async fn fetch_object(
        &self,
        credentials: &ServiceAccountKey,
        object_name: &str,
    ) -> Result<Option<ObjectDetails>, String> {
        let token = self.access_token(credentials).await?;
        let response = self
            .http
            .get(self.object_url(object_name))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| format!("failed to query object metadata: {error}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resource = response
            .error_for_status()
            .map_err(|error| format!("object metadata query was rejected: {error}"))?
            .json::<GcsObjectResource>()
            .await
            .map_err(|error| format!("failed to parse object metadata: {error}"))?;

        resource.into_details().map(Some)
    }

    #[cfg(test)]
    fn seed_access_token(&self, client_email: &str, access_token: &str) {
        let mut guard = self.token.lock().expect("poisoned mutex");
        *guard = Some(CachedToken {
            client_email: client_email.to_string(),
            access_token: access_token.to_string(),
            expires_at: Utc::now().timestamp() + TOKEN_LIFETIME_SECS,
        });
    }
}

impl SubmissionStore for GcsSubmissionStore {
    fn upload_file(
        &self,
        credentials: &ServiceAccountKey,
        object_name: &str,
        source: &Path,
        content_type: Option<&str>,
    ) -> Result<(), String> {
        block_on(async {
            let existing = self.fetch_object(credentials, object_name).await?;
            let precondition = WritePrecondition::for_existing(existing.as_ref());

            let body = tokio::fs::read(source)
                .await
                .map_err(|error| format!("failed to read local submission file: {error}"))?;
            let token = self.access_token(credentials).await?;
            let generation = precondition.if_generation_match().to_string();

            let response = self
                .http
                .post(self.upload_url())
                .bearer_auth(token)
                .query(&[
                    ("uploadType", "media"),
                    ("name", object_name),
                    ("ifGenerationMatch", generation.as_str()),
                ])
                .header(
                    reqwest::header::CONTENT_TYPE,
                    content_type.unwrap_or("application/octet-stream"),
                )
                .body(body)
                .send()
                .await
                .map_err(|error| format!("failed to upload object to storage: {error}"))?;

            if response.status() == StatusCode::PRECONDITION_FAILED {
                return Err(format!(
                    "object '{object_name}' changed during upload (precondition {precondition:?} failed)"
                ));
            }

            response
                .error_for_status()
                .map(|_| ())
                .map_err(|error| format!("object upload was rejected: {error}"))
        })
    }

    fn object_details(
        &self,
        credentials: &ServiceAccountKey,
        object_name: &str,
    ) -> Result<Option<ObjectDetails>, String> {
        block_on(self.fetch_object(credentials, object_name))
    }
}

fn sign_token_assertion(credentials: &ServiceAccountKey, now: i64) -> Result<String, String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = credentials.private_key_id.clone();

    let claims = JwtClaims {
        iss: &credentials.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &credentials.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
        .map_err(|error| format!("storage private key is not a valid RSA PEM: {error}"))?;
    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|error| format!("failed to sign storage token assertion: {error}"))
}
