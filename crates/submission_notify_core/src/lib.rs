//! Shared submission-notification domain primitives.
//!
//! This crate owns the notification contract, envelope decoding, file naming,
//! email composition and tracking records. It intentionally excludes AWS, GCP
//! and SMTP client concerns.

pub mod contract;
pub mod email;
pub mod envelope;
pub mod file_name;
