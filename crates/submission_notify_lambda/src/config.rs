use std::path::PathBuf;

pub const DEFAULT_SMTP_HOST: &str = "smtp.mandrillapp.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_TRACKING_TABLE: &str = "emailTrackingTable";
pub const DEFAULT_DOWNLOAD_ROOT: &str = "/tmp";
pub const CREDENTIALS_SECRET_VAR: &str = "GCP_CREDENTIALS_SECRET";

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub api_key: String,
    pub from: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    pub bucket: String,
    pub tracking_table: String,
    pub download_root: PathBuf,
    pub credentials_variable: String,
    pub smtp: SmtpSettings,
}

impl NotifierConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            optional(name).ok_or_else(|| format!("{name} must be configured"))
        };

        let port = match optional("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|error| format!("SMTP_PORT '{raw}' is not a valid port: {error}"))?,
            None => DEFAULT_SMTP_PORT,
        };

        // Checked here so a missing secret fails the cold start instead of
        // every notification; the value itself is read per invocation.
        required(CREDENTIALS_SECRET_VAR)?;

        Ok(Self {
            bucket: required("SUBMISSION_BUCKET")?,
            tracking_table: optional("TRACKING_TABLE")
                .unwrap_or_else(|| DEFAULT_TRACKING_TABLE.to_string()),
            download_root: optional("DOWNLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_ROOT)),
            credentials_variable: CREDENTIALS_SECRET_VAR.to_string(),
            smtp: SmtpSettings {
                host: optional("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port,
                username: required("SMTP_USERNAME")?,
                api_key: required("SMTP_API_KEY")?,
                from: required("MAIL_FROM")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    fn required_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GCP_CREDENTIALS_SECRET", "e30="),
            ("SUBMISSION_BUCKET", "submission-bucket"),
            ("SMTP_USERNAME", "relay-user"),
            ("SMTP_API_KEY", "relay-key"),
            ("MAIL_FROM", "noreply@example.com"),
        ]
    }

    #[test]
    fn applies_defaults_for_optional_settings() {
        let config = NotifierConfig::from_lookup(lookup_from(&required_pairs()))
            .expect("config should load");

        assert_eq!(config.bucket, "submission-bucket");
        assert_eq!(config.tracking_table, DEFAULT_TRACKING_TABLE);
        assert_eq!(config.download_root, PathBuf::from("/tmp"));
        assert_eq!(config.smtp.host, DEFAULT_SMTP_HOST);
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.credentials_variable, "GCP_CREDENTIALS_SECRET");
    }

    #[test]
    fn overrides_optional_settings() {
        let mut pairs = required_pairs();
        pairs.extend([
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("TRACKING_TABLE", "submissionTracking"),
            ("DOWNLOAD_ROOT", "/var/tmp/submissions"),
        ]);

        let config = NotifierConfig::from_lookup(lookup_from(&pairs)).expect("config should load");

        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.tracking_table, "submissionTracking");
        assert_eq!(config.download_root, PathBuf::from("/var/tmp/submissions"));
    }

    #[test]
    fn reports_missing_required_variable_by_name() {
        let pairs: Vec<_> = required_pairs()
            .into_iter()
            .filter(|(name, _)| *name != "SMTP_API_KEY")
            .collect();

        let error = NotifierConfig::from_lookup(lookup_from(&pairs)).expect_err("should fail");
        assert_eq!(error, "SMTP_API_KEY must be configured");
    }

    #[test]
    fn blank_required_variable_counts_as_missing() {
        let pairs: Vec<_> = required_pairs()
            .into_iter()
            .map(|(name, value)| {
                if name == "SUBMISSION_BUCKET" {
                    (name, "  ")
                } else {
                    (name, value)
                }
            })
            .collect();

        let error = NotifierConfig::from_lookup(lookup_from(&pairs)).expect_err("should fail");
        assert_eq!(error, "SUBMISSION_BUCKET must be configured");
    }

    #[test]
    fn rejects_invalid_port() {
        let mut pairs = required_pairs();
        pairs.push(("SMTP_PORT", "smtp"));

        let error = NotifierConfig::from_lookup(lookup_from(&pairs)).expect_err("should fail");
        assert!(error.starts_with("SMTP_PORT 'smtp' is not a valid port"));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = NotifierConfig::from_lookup(lookup_from(&required_pairs()))
            .expect("config should load");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("relay-key"));
    }
}
