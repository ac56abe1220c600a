use async_trait::async_trait;
use tracing::info;

use shared_models::PatientId;

use crate::error::NotificationError;
use crate::messages::{flatten, render};
use crate::models::{DeliveryReceipt, NotificationKind, NotificationPayload};
use crate::services::notifier::Notifier;
use crate::services::twilio::whatsapp_address;

/// Writes messages to the log instead of sending them.
#[derive(Debug, Clone, Copy)]
pub struct LoggingNotifier {
    dry_run: bool,
}

impl LoggingNotifier {
    /// Explicit `DRY_RUN`.
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    /// No credentials configured.
    pub fn mock() -> Self {
        Self { dry_run: false }
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(
        &self,
        patient: &PatientId,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let to = whatsapp_address(patient.as_str());
        let body = flatten(&render(kind, payload));

        if self.dry_run {
            info!("[DRY_RUN WHATSAPP] kind={} to={} body={}", kind, to, body);
            Ok(DeliveryReceipt::DryRun { to })
        } else {
            info!("[WA MOCK] kind={} to={} body={}", kind, to, body);
            Ok(DeliveryReceipt::Mock { to })
        }
    }
}
