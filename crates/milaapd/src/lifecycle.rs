//! Case lifecycle manager: serialized status transitions per record.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use milaap_core::{PersonRecord, PersonStatus};
use milaap_store::DescriptorStore;

use crate::service::ServiceError;

/// Applies status transitions with at-most-one commit per record at a time.
///
/// Two guards: a per-id async mutex serializes transitions from this
/// process, and the store's conditional status update catches any writer
/// outside the lock (a second daemon on the same database). Unrelated
/// records transition fully in parallel.
pub struct LifecycleManager {
    store: Arc<dyn DescriptorStore>,
    // Grows with distinct transitioned ids; bounded by the reported
    // population, which is small for this workload.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn DescriptorStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut table = self.locks.lock().await;
        table
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Validate and commit a single status transition.
    ///
    /// Reads the record under the per-id lock, checks the edge against the
    /// state machine, then commits through the store's conditional update.
    /// Any failure leaves the record in its pre-transition state.
    pub async fn transition(
        &self,
        id: Uuid,
        target: PersonStatus,
        location: Option<String>,
    ) -> Result<PersonRecord, ServiceError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let record = self.store.get_record(id).await?;
        record.status.ensure_transition(target)?;

        let updated = self
            .store
            .update_status(id, record.status, target, location)
            .await?;
        tracing::info!(
            id = %id,
            from = %record.status,
            to = %target,
            "status transition committed"
        );
        Ok(updated)
    }
}
