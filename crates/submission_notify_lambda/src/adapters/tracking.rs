use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, TableStatus,
};
use submission_notify_core::contract::TrackingRecord;

use super::block_on;

pub const TRACKING_HASH_KEY: &str = "emailId";
const TABLE_ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const TABLE_ACTIVE_MAX_POLLS: usize = 30;

pub trait TrackingStore {
    fn put_record(&self, record: &TrackingRecord) -> Result<(), String>;
}

pub fn tracking_item(record: &TrackingRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            TRACKING_HASH_KEY.to_string(),
            AttributeValue::S(record.email_id.clone()),
        ),
        ("email".to_string(), AttributeValue::S(record.email.clone())),
        (
            "status".to_string(),
            AttributeValue::S(record.status.as_str().to_string()),
        ),
        (
            "timeStamp".to_string(),
            AttributeValue::S(record.time_stamp.clone()),
        ),
        (
            "submissionFingerprint".to_string(),
            AttributeValue::S(record.submission_fingerprint.clone()),
        ),
        (
            "recordSchema".to_string(),
            AttributeValue::S(record.record_schema.clone()),
        ),
    ])
}

/// What `DescribeTable` reported about the tracking table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableState {
    Active,
    Pending,
    Missing,
}

impl TableState {
    fn from_status(status: Option<&TableStatus>) -> Self {
        match status {
            Some(TableStatus::Active) => Self::Active,
            _ => Self::Pending,
        }
    }
}

/// `ResourceInUse` means another invocation created the table first; the
/// caller then waits for it like for its own.
fn tolerate_concurrent_create(error: String, resource_in_use: bool) -> Result<(), String> {
    if resource_in_use {
        Ok(())
    } else {
        Err(error)
    }
}

async fn poll_until_active<F, Fut>(
    table_name: &str,
    interval: Duration,
    max_polls: usize,
    mut describe: F,
) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TableState, String>>,
{
    for _ in 0..max_polls {
        if describe().await? == TableState::Active {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }

    Err(format!("tracking table '{table_name}' did not become active in time"))
}

/// Append-only tracking table in DynamoDB. The table is created on first
/// use when it does not exist yet.
pub struct DynamoTrackingStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
    table_ready: AtomicBool,
}

impl DynamoTrackingStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            table_ready: AtomicBool::new(false),
        }
    }

    async fn describe_state(&self) -> Result<TableState, String> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(output) => {
                let status = output.table().and_then(|table| table.table_status());
                Ok(TableState::from_status(status))
            }
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service_error| service_error.is_resource_not_found_exception()) =>
            {
                Ok(TableState::Missing)
            }
            Err(error) => Err(format!(
                "failed to describe tracking table: {}",
                DisplayErrorContext(&error)
            )),
        }
    }

    async fn ensure_table(&self) -> Result<(), String> {
        match self.describe_state().await? {
            TableState::Active => return Ok(()),
            TableState::Pending => {}
            TableState::Missing => self.create_table().await?,
        }

        poll_until_active(
            &self.table_name,
            TABLE_ACTIVE_POLL_INTERVAL,
            TABLE_ACTIVE_MAX_POLLS,
            || self.describe_state(),
        )
        .await
    }

    async fn create_table(&self) -> Result<(), String> {
        let key_schema = KeySchemaElement::builder()
            .attribute_name(TRACKING_HASH_KEY)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|error| format!("invalid tracking key schema: {error}"))?;
        let attribute = AttributeDefinition::builder()
            .attribute_name(TRACKING_HASH_KEY)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|error| format!("invalid tracking attribute definition: {error}"))?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(1)
            .write_capacity_units(1)
            .build()
            .map_err(|error| format!("invalid tracking throughput: {error}"))?;

        let result = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .key_schema(key_schema)
            .attribute_definitions(attribute)
            .provisioned_throughput(throughput)
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(table = %self.table_name, "created tracking table");
                Ok(())
            }
            Err(error) => {
                let resource_in_use = error
                    .as_service_error()
                    .is_some_and(|service_error| service_error.is_resource_in_use_exception());
                tolerate_concurrent_create(
                    format!(
                        "failed to create tracking table: {}",
                        DisplayErrorContext(&error)
                    ),
                    resource_in_use,
                )
            }
        }
    }
}

impl TrackingStore for DynamoTrackingStore {
    fn put_record(&self, record: &TrackingRecord) -> Result<(), String> {
        block_on(async {
            if !self.table_ready.load(Ordering::Acquire) {
                self.ensure_table().await?;
                self.table_ready.store(true, Ordering::Release);
            }

            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(tracking_item(record)))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| {
                    format!(
                        "failed to write tracking record: {}",
                        DisplayErrorContext(&error)
                    )
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use submission_notify_core::contract::{NotificationPayload, TrackingStatus};

    use super::*;

    #[test]
    fn only_active_status_counts_as_ready() {
        assert_eq!(
            TableState::from_status(Some(&TableStatus::Active)),
            TableState::Active
        );
        assert_eq!(
            TableState::from_status(Some(&TableStatus::Creating)),
            TableState::Pending
        );
        assert_eq!(
            TableState::from_status(Some(&TableStatus::Updating)),
            TableState::Pending
        );
        assert_eq!(TableState::from_status(None), TableState::Pending);
    }

    #[test]
    fn concurrent_create_is_tolerated() {
        assert_eq!(
            tolerate_concurrent_create("table in use".to_string(), true),
            Ok(())
        );
        assert_eq!(
            tolerate_concurrent_create("access denied".to_string(), false),
            Err("access denied".to_string())
        );
    }

    #[tokio::test]
    async fn polls_until_table_becomes_active() {
        let calls = AtomicUsize::new(0);
        let states = [TableState::Missing, TableState::Pending, TableState::Active];

        poll_until_active("emailTrackingTable", Duration::ZERO, 5, || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(states[call]) }
        })
        .await
        .expect("table should become active");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_when_table_stays_pending() {
        let calls = AtomicUsize::new(0);

        let error = poll_until_active("emailTrackingTable", Duration::ZERO, 4, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(TableState::Pending) }
        })
        .await
        .expect_err("pending table should time out");

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            error,
            "tracking table 'emailTrackingTable' did not become active in time"
        );
    }

    #[tokio::test]
    async fn describe_failure_stops_polling() {
        let calls = AtomicUsize::new(0);

        let error = poll_until_active("emailTrackingTable", Duration::ZERO, 4, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("failed to describe tracking table: throttled".to_string()) }
        })
        .await
        .expect_err("describe failure should surface");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(error.contains("throttled"));
    }

    #[test]
    fn item_carries_every_tracking_attribute() {
        let payload = NotificationPayload {
            submission_url: "https://example.com/report.pdf".to_string(),
            user_email: "student@example.com".to_string(),
        };
        let record = TrackingRecord::new(
            "0b7c6f1e-2f7a-4e7b-9d0f-6a1c2b3d4e5f",
            &payload,
            TrackingStatus::Success,
            "2026-10-17T12:00:00.000Z",
        );

        let item = tracking_item(&record);

        assert_eq!(item.len(), 6);
        assert_eq!(
            item.get("emailId"),
            Some(&AttributeValue::S(
                "0b7c6f1e-2f7a-4e7b-9d0f-6a1c2b3d4e5f".to_string()
            ))
        );
        assert_eq!(
            item.get("email"),
            Some(&AttributeValue::S("student@example.com".to_string()))
        );
        assert_eq!(
            item.get("status"),
            Some(&AttributeValue::S("success".to_string()))
        );
        assert_eq!(
            item.get("timeStamp"),
            Some(&AttributeValue::S("2026-10-17T12:00:00.000Z".to_string()))
        );
        assert_eq!(
            item.get("submissionFingerprint"),
            Some(&AttributeValue::S(record.submission_fingerprint.clone()))
        );
    }
}
