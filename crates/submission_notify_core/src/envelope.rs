//! Decoding of the inbound Lambda event into notification payloads.
//!
//! SNS delivers the notification as a JSON string inside
//! `Records[].Sns.Message`. Direct invocations (console tests, replays) may
//! pass the payload object itself.

use serde_json::Value;

use crate::contract::{NotificationPayload, ValidationError};

pub const SNS_EVENT_SOURCE: &str = "aws:sns";

pub fn is_sns_event(event: &Value) -> bool {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(|records| {
            !records.is_empty()
                && records.iter().all(|record| {
                    record
                        .get("EventSource")
                        .and_then(Value::as_str)
                        .map(|source| source == SNS_EVENT_SOURCE)
                        .unwrap_or_else(|| record.get("Sns").is_some_and(Value::is_object))
                })
        })
        .unwrap_or(false)
}

/// One decoded `Records[]` entry: either a notification to process or the
/// reason it was rejected.
pub type DecodedRecord = Result<NotificationPayload, ValidationError>;

/// Decodes the event into one result per notification.
///
/// Only a malformed envelope fails as a whole. A record whose message is
/// broken is returned as an `Err` next to its valid siblings.
pub fn decode_notifications(event: Value) -> Result<Vec<DecodedRecord>, ValidationError> {
    let Some(object) = event.as_object() else {
        return Err(ValidationError::new("Event payload must be a JSON object"));
    };

    if !object.contains_key("Records") {
        return Ok(vec![decode_payload(event)]);
    }

    if !is_sns_event(&event) {
        return Err(ValidationError::new(
            "Records must be a non-empty array of SNS records",
        ));
    }

    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::new("SNS event must include Records array"))?;

    Ok(records.iter().map(decode_record).collect())
}

fn decode_record(record: &Value) -> DecodedRecord {
    let message = record
        .get("Sns")
        .and_then(|sns| sns.get("Message"))
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::new("SNS record Message must be a string"))?;
    let body: Value = serde_json::from_str(message).map_err(|error| {
        ValidationError::new(format!("Malformed notification message: {error}"))
    })?;
    decode_payload(body)
}

fn decode_payload(body: Value) -> Result<NotificationPayload, ValidationError> {
    let payload: NotificationPayload = serde_json::from_value(body)
        .map_err(|error| ValidationError::new(format!("Malformed notification: {error}")))?;
    payload.validate()
}
