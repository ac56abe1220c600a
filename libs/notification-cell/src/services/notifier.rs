use async_trait::async_trait;

use shared_models::PatientId;

use crate::error::NotificationError;
use crate::models::{DeliveryReceipt, NotificationKind, NotificationPayload};

/// Outbound channel to a patient. Callers treat delivery as best effort and
/// only log failures.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(
        &self,
        patient: &PatientId,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError>;
}
