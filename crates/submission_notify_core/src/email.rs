use crate::contract::ObjectDetails;

pub const STATUS_EMAIL_SUBJECT: &str = "The status of your submission download";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

pub fn success_email(recipient: &str, details: &ObjectDetails) -> StatusEmail {
    StatusEmail {
        recipient: recipient.to_string(),
        subject: STATUS_EMAIL_SUBJECT.to_string(),
        body: format!(
            "Your submission has been downloaded\nobjectName: {}\ncontentType: {}\nsize: {}",
            details.name,
            details.content_type.as_deref().unwrap_or("unknown"),
            details.size,
        ),
    }
}

pub fn failure_email(recipient: &str, reason: &str) -> StatusEmail {
    StatusEmail {
        recipient: recipient.to_string(),
        subject: STATUS_EMAIL_SUBJECT.to_string(),
        body: format!("Your submission download failed.\nReason: {reason}"),
    }
}
