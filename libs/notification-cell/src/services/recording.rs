use std::sync::Mutex;

use async_trait::async_trait;

use shared_models::PatientId;

use crate::error::NotificationError;
use crate::models::{DeliveryReceipt, NotificationKind, NotificationPayload};
use crate::services::notifier::Notifier;

/// Keeps every message in memory. Used by test suites to assert on what the
/// engine sent; can be told to fail to exercise best-effort delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(PatientId, NotificationKind, NotificationPayload)>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    pub fn sent(&self) -> Vec<(PatientId, NotificationKind, NotificationPayload)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_of_kind(&self, kind: NotificationKind) -> Vec<(PatientId, NotificationPayload)> {
        self.sent()
            .into_iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(p, _, payload)| (p, payload))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        patient: &PatientId,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(NotificationError::Rejected {
                status: 500,
                body: "recording notifier set to fail".to_string(),
            });
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push((patient.clone(), kind, payload.clone()));
        }
        Ok(DeliveryReceipt::Mock {
            to: patient.to_string(),
        })
    }
}
