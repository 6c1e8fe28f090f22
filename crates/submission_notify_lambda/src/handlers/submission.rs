use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use submission_notify_core::contract::{
    DeliveryReport, NotificationPayload, ObjectDetails, TrackingRecord, TrackingStatus,
};
use submission_notify_core::email::{failure_email, success_email};
use submission_notify_core::envelope::decode_notifications;
use submission_notify_core::file_name::extract_file_name;

use crate::adapters::credentials::CredentialSource;
use crate::adapters::download::SubmissionDownloader;
use crate::adapters::mailer::StatusMailer;
use crate::adapters::object_store::SubmissionStore;
use crate::adapters::tracking::TrackingStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandlerConfig {
    pub download_root: PathBuf,
}

pub struct SubmissionDependencies<'a> {
    pub downloader: &'a dyn SubmissionDownloader,
    pub credentials: &'a dyn CredentialSource,
    pub store: &'a dyn SubmissionStore,
    pub mailer: &'a dyn StatusMailer,
    pub tracking: &'a dyn TrackingStore,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionResponse {
    pub status: String,
    pub email: String,
    pub file_name: String,
    pub outcome: TrackingStatus,
    pub tracking_id: String,
    /// False when the tracking record could not be written.
    pub tracked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedNotification {
    pub record_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventSummary {
    pub processed: Vec<SubmissionResponse>,
    pub rejected: Vec<RejectedNotification>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

/// Decodes the inbound event and runs the pipeline once per valid
/// notification. Records that fail to decode are logged and skipped; only an
/// unreadable envelope is an error.
pub fn handle_event(
    event: Value,
    config: &SubmissionHandlerConfig,
    deps: &SubmissionDependencies<'_>,
) -> Result<EventSummary, HandlerError> {
    let records = decode_notifications(event).map_err(|error| {
        log_submission_error("event_rejected", json!({ "error": error.message() }));
        HandlerError::new(format!("invalid notification event: {error}"))
    })?;

    let mut summary = EventSummary::default();
    for (record_index, record) in records.into_iter().enumerate() {
        match record {
            Ok(payload) => {
                let response = handle_notification(&payload, config, deps);
                summary.processed.push(response);
            }
            Err(error) => {
                log_submission_error(
                    "notification_rejected",
                    json!({ "record_index": record_index, "error": error.message() }),
                );
                summary.rejected.push(RejectedNotification {
                    record_index,
                    reason: error.message().to_string(),
                });
            }
        }
    }

    Ok(summary)
}

/// Runs download → upload → email → tracking for one notification.
///
/// Every failure before the email is folded into the failure email. A
/// tracking record that cannot be written is logged and reported through
/// `tracked`; it never fails the invocation.
pub fn handle_notification(
    payload: &NotificationPayload,
    config: &SubmissionHandlerConfig,
    deps: &SubmissionDependencies<'_>,
) -> SubmissionResponse {
    let started_at = Instant::now();
    let file_name = extract_file_name(&payload.submission_url);
    log_submission_info(
        "submission_received",
        json!({
            "submission_url": payload.submission_url.clone(),
            "user_email": payload.user_email.clone(),
            "file_name": file_name.clone(),
        }),
    );

    let report = match deliver_submission(payload, &file_name, config, deps) {
        Ok(details) => {
            log_submission_info(
                "submission_stored",
                json!({
                    "object_name": details.name.clone(),
                    "content_type": details.content_type.clone(),
                    "size": details.size,
                    "generation": details.generation,
                }),
            );
            DeliveryReport::Stored(details)
        }
        Err(reason) => {
            log_submission_error(
                "submission_failed",
                json!({
                    "file_name": file_name.clone(),
                    "error": reason.clone(),
                }),
            );
            DeliveryReport::Failed { reason }
        }
    };

    let email = match &report {
        DeliveryReport::Stored(details) => success_email(&payload.user_email, details),
        DeliveryReport::Failed { reason } => failure_email(&payload.user_email, reason),
    };
    let email_sent = match deps.mailer.send(&email) {
        Ok(()) => true,
        Err(error) => {
            log_submission_error(
                "status_email_failed",
                json!({ "user_email": payload.user_email.clone(), "error": error }),
            );
            false
        }
    };

    let outcome = report.tracking_status(email_sent);
    let record = TrackingRecord::new(
        uuid::Uuid::new_v4().to_string(),
        payload,
        outcome,
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    let tracked = match deps.tracking.put_record(&record) {
        Ok(()) => {
            log_submission_info(
                "submission_tracked",
                json!({
                    "email_id": record.email_id.clone(),
                    "status": outcome,
                    "email_sent": email_sent,
                    "duration_ms": started_at.elapsed().as_millis(),
                }),
            );
            true
        }
        Err(error) => {
            log_submission_error(
                "tracking_failed",
                json!({
                    "email_id": record.email_id.clone(),
                    "status": outcome,
                    "email_sent": email_sent,
                    "error": error,
                }),
            );
            false
        }
    };

    SubmissionResponse {
        status: "handled".to_string(),
        email: payload.user_email.clone(),
        file_name,
        outcome,
        tracking_id: record.email_id,
        tracked,
    }
}

fn deliver_submission(
    payload: &NotificationPayload,
    file_name: &str,
    config: &SubmissionHandlerConfig,
    deps: &SubmissionDependencies<'_>,
) -> Result<ObjectDetails, String> {
    if file_name.is_empty() {
        return Err("submission URL does not name a file".to_string());
    }

    fs::create_dir_all(&config.download_root)
        .map_err(|error| format!("failed to prepare download directory: {error}"))?;
    // Dropped (and deleted) on return; warm containers keep /tmp around.
    let workspace = tempfile::Builder::new()
        .prefix("submission-")
        .tempdir_in(&config.download_root)
        .map_err(|error| format!("failed to create download workspace: {error}"))?;
    let local_path = workspace.path().join(file_name);

    let downloaded = deps
        .downloader
        .download(&payload.submission_url, &local_path)?;
    log_submission_info(
        "submission_downloaded",
        json!({
            "file_name": file_name,
            "bytes": downloaded.bytes_written,
        }),
    );

    let credentials = deps.credentials.load()?;
    deps.store.upload_file(
        &credentials,
        file_name,
        &local_path,
        downloaded.content_type.as_deref(),
    )?;

    deps.store
        .object_details(&credentials, file_name)?
        .ok_or_else(|| format!("uploaded object '{file_name}' was not found in the bucket"))
}

fn log_submission_info(event: &str, details: Value) {
    tracing::info!(component = "submission_handler", event, %details);
}

fn log_submission_error(event: &str, details: Value) {
    tracing::error!(component = "submission_handler", event, %details);
}
