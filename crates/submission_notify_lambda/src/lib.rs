//! AWS Lambda integration for submission notifications.
//!
//! This crate owns the runtime details (adapters for the download, Google
//! Cloud Storage, SMTP and DynamoDB, configuration, logging, and the Lambda
//! handler) on top of the domain primitives in `submission_notify_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
