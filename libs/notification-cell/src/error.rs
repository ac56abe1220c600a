use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("WhatsApp delivery is not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP error talking to Twilio: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twilio rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid recipient '{0}'")]
    InvalidRecipient(String),
}
