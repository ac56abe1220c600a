use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use shared_models::PatientId;

use crate::models::DeliveryRecord;

pub const DEFAULT_DELIVERY_LOG_CAPACITY: usize = 1_000;

/// Audit trail of outbound message attempts, successful or not.
#[async_trait]
pub trait DeliveryLog: Send + Sync + 'static {
    async fn record(&self, record: DeliveryRecord);

    /// Newest first, at most `limit` records.
    async fn recent(&self, limit: usize) -> Vec<DeliveryRecord>;

    /// Every retained record for the patient, oldest first.
    async fn for_patient(&self, patient_id: &PatientId) -> Vec<DeliveryRecord>;
}

/// Ring buffer of the most recent attempts. The oldest record is evicted once
/// `capacity` is reached.
pub struct InMemoryDeliveryLog {
    records: RwLock<VecDeque<DeliveryRecord>>,
    capacity: usize,
}

impl InMemoryDeliveryLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_DELIVERY_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }
}

impl Default for InMemoryDeliveryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn record(&self, record: DeliveryRecord) {
        let mut records = self.records.write().await;
        if records.len() == self.capacity {
            records.pop_front();
        }
        debug!("Logged {} for {}: {:?}", record.kind, record.patient_id, record.outcome);
        records.push_back(record);
    }

    async fn recent(&self, limit: usize) -> Vec<DeliveryRecord> {
        let records = self.records.read().await;
        records.iter().rev().take(limit).cloned().collect()
    }

    async fn for_patient(&self, patient_id: &PatientId) -> Vec<DeliveryRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| &r.patient_id == patient_id)
            .cloned()
            .collect()
    }
}
