// libs/notification-cell/src/lib.rs
//! Outbound patient messages. The scheduling engine only sees the `Notifier`
//! trait; delivery goes out over WhatsApp through Twilio, or to the log when
//! running dry or without credentials. Every attempt is kept in a
//! `DeliveryLog` for audit.

pub mod error;
pub mod messages;
pub mod models;
pub mod services;

pub use error::NotificationError;
pub use models::{DeliveryOutcome, DeliveryReceipt, DeliveryRecord, NotificationKind, NotificationPayload};
pub use services::{
    notifier_from_config, DeliveryLog, InMemoryDeliveryLog, LoggingNotifier, Notifier, RecordingNotifier,
    TwilioWhatsAppNotifier,
};
