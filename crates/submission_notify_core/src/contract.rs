use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

pub const TRACKING_RECORD_SCHEMA_VERSION: &str = "v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub submission_url: String,
    pub user_email: String,
}

impl NotificationPayload {
    /// The recipient is the only field a notification cannot do without:
    /// an empty URL still produces a failure email, an empty address
    /// produces nothing at all.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let user_email = self.user_email.trim().to_string();
        if user_email.is_empty() {
            return Err(ValidationError::new("userEmail cannot be empty"));
        }

        Ok(Self {
            submission_url: self.submission_url.trim().to_string(),
            user_email,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    Success,
    Failed,
}

impl TrackingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub email_id: String,
    pub email: String,
    pub status: TrackingStatus,
    pub time_stamp: String,
    pub submission_fingerprint: String,
    pub record_schema: String,
}

impl TrackingRecord {
    pub fn new(
        email_id: impl Into<String>,
        payload: &NotificationPayload,
        status: TrackingStatus,
        time_stamp: impl Into<String>,
    ) -> Self {
        Self {
            email_id: email_id.into(),
            email: payload.user_email.clone(),
            status,
            time_stamp: time_stamp.into(),
            submission_fingerprint: payload_fingerprint(payload),
            record_schema: TRACKING_RECORD_SCHEMA_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDetails {
    pub name: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub generation: i64,
}

/// Which of the two emails a pipeline run ends with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    Stored(ObjectDetails),
    Failed { reason: String },
}

impl DeliveryReport {
    /// The failure branch always records `failed`; the success branch records
    /// whatever the email send produced.
    pub fn tracking_status(&self, email_sent: bool) -> TrackingStatus {
        match self {
            Self::Stored(_) if email_sent => TrackingStatus::Success,
            _ => TrackingStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn payload_fingerprint(payload: &NotificationPayload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_payload_json(payload));
    format!("{:x}", hasher.finalize())
}

pub fn stable_payload_json(payload: &NotificationPayload) -> String {
    json!({
        "submissionUrl": payload.submission_url,
        "userEmail": payload.user_email,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> NotificationPayload {
        NotificationPayload {
            submission_url: "https://example.com/files/report.pdf".to_string(),
            user_email: "student@example.com".to_string(),
        }
    }

    #[test]
    fn payload_uses_camel_case_field_names() {
        let payload: NotificationPayload = serde_json::from_str(
            r#"{"submissionUrl":"https://example.com/a.zip","userEmail":"a@example.com"}"#,
        )
        .expect("payload should parse");

        assert_eq!(payload.submission_url, "https://example.com/a.zip");
        assert_eq!(payload.user_email, "a@example.com");
    }

    #[test]
    fn validate_rejects_blank_email() {
        let payload = NotificationPayload {
            user_email: "   ".to_string(),
            ..sample_payload()
        };

        let error = payload.validate().expect_err("blank email should fail");
        assert_eq!(error.message(), "userEmail cannot be empty");
    }

    #[test]
    fn validate_keeps_empty_url_for_failure_path() {
        let payload = NotificationPayload {
            submission_url: String::new(),
            user_email: " student@example.com ".to_string(),
        };

        let validated = payload
            .validate()
            .expect("empty url is still a notification");
        assert_eq!(validated.submission_url, "");
        assert_eq!(validated.user_email, "student@example.com");
    }

    #[test]
    fn fingerprint_is_stable_for_identical_payloads() {
        let first = payload_fingerprint(&sample_payload());
        let second = payload_fingerprint(&sample_payload());
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let other = payload_fingerprint(&NotificationPayload {
            user_email: "other@example.com".to_string(),
            ..sample_payload()
        });
        assert_ne!(first, other);
    }

    #[test]
    fn tracking_record_serializes_with_table_attribute_names() {
        let record = TrackingRecord::new(
            "id-1",
            &sample_payload(),
            TrackingStatus::Failed,
            "2026-10-17T12:00:00Z",
        );
        let value = serde_json::to_value(&record).expect("record should serialize");

        assert_eq!(value["emailId"], "id-1");
        assert_eq!(value["email"], "student@example.com");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["timeStamp"], "2026-10-17T12:00:00Z");
        assert_eq!(value["recordSchema"], TRACKING_RECORD_SCHEMA_VERSION);
    }

    #[test]
    fn failure_report_never_tracks_success() {
        let report = DeliveryReport::Failed {
            reason: "404 Not Found".to_string(),
        };
        assert_eq!(report.tracking_status(true), TrackingStatus::Failed);
        assert_eq!(report.tracking_status(false), TrackingStatus::Failed);
    }

    #[test]
    fn stored_report_tracks_email_result() {
        let report = DeliveryReport::Stored(ObjectDetails {
            name: "report.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            size: 42,
            generation: 1,
        });
        assert_eq!(report.tracking_status(true), TrackingStatus::Success);
        assert_eq!(report.tracking_status(false), TrackingStatus::Failed);
    }
}
