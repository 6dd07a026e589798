//! In-memory descriptor store for tests and embedded/ephemeral use.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use milaap_core::{FaceDescriptor, PersonRecord, PersonStatus};

use crate::{DescriptorStore, StoreError};

/// Insertion-ordered vector of records behind an async RwLock. Upserts keep
/// a record's original position, so listings stay in first-registered order.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<PersonRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DescriptorStore for MemoryStore {
    async fn list_descriptors(
        &self,
        status: Option<PersonStatus>,
    ) -> Result<Vec<(Uuid, FaceDescriptor)>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .map(|r| (r.id, r.face_descriptor.clone()))
            .collect())
    }

    async fn list_records(
        &self,
        status: Option<PersonStatus>,
    ) -> Result<Vec<PersonRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn get_record(&self, id: Uuid) -> Result<PersonRecord, StoreError> {
        let records = self.records.read().await;
        records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn upsert_record(&self, record: PersonRecord) -> Result<PersonRecord, StoreError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(record)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: PersonStatus,
        target: PersonStatus,
        location: Option<String>,
    ) -> Result<PersonRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if record.status != expected {
            return Err(StoreError::Conflict {
                id,
                actual: record.status,
            });
        }
        record.status = target;
        if location.is_some() {
            record.current_location = location;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use milaap_core::{Gender, DESCRIPTOR_LEN};

    fn sample_record(status: PersonStatus) -> PersonRecord {
        let now = Utc::now();
        PersonRecord {
            id: Uuid::new_v4(),
            name: None,
            age: None,
            gender: Gender::default(),
            photo_url: "https://photos.example/p.jpg".into(),
            face_descriptor: FaceDescriptor::new(vec![0.0; DESCRIPTOR_LEN]).unwrap(),
            status,
            contact_info: None,
            last_seen_location: None,
            current_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_keeps_original_position() {
        let store = MemoryStore::new();
        let first = sample_record(PersonStatus::Missing);
        let second = sample_record(PersonStatus::Missing);
        store.upsert_record(first.clone()).await.unwrap();
        store.upsert_record(second.clone()).await.unwrap();

        // Re-upsert the first record; it must not move to the back.
        let mut renamed = first.clone();
        renamed.name = Some("Meera".into());
        store.upsert_record(renamed).await.unwrap();

        let listed = store.list_records(None).await.unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[0].name.as_deref(), Some("Meera"));
        assert_eq!(listed[1].id, second.id);
    }

    #[tokio::test]
    async fn conditional_update_enforces_expected_status() {
        let store = MemoryStore::new();
        let record = sample_record(PersonStatus::Missing);
        store.upsert_record(record.clone()).await.unwrap();

        store
            .update_status(record.id, PersonStatus::Missing, PersonStatus::Found, None)
            .await
            .unwrap();

        let err = store
            .update_status(
                record.id,
                PersonStatus::Missing,
                PersonStatus::Reunited,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                actual: PersonStatus::Found,
                ..
            }
        ));
    }
}
