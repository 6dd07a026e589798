//! Match API: the operations consumed by the HTTP boundary.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use milaap_core::{
    similarity, ContactInfo, DescriptorError, FaceDescriptor, Gender, InvalidTransition,
    LinearScanMatcher, MatchOptions, Matcher, PersonRecord, PersonStatus,
};
use milaap_store::{DescriptorStore, StoreError};

use crate::lifecycle::LifecycleManager;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidDescriptor(#[from] DescriptorError),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("record {0} not found")]
    NotFound(Uuid),
    #[error("concurrent modification of record {0}")]
    ConcurrentModification(Uuid),
    #[error("store unavailable: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            StoreError::Conflict { id, .. } => ServiceError::ConcurrentModification(id),
            other => ServiceError::Store(other),
        }
    }
}

/// Caller-supplied metadata for a new missing-person sighting.
#[derive(Debug, Clone, Deserialize)]
pub struct SightingReport {
    pub photo_url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub contact_info: Option<ContactInfo>,
    #[serde(default)]
    pub last_seen_location: Option<String>,
}

/// A ranked match with its presentation similarity attached.
#[derive(Debug, Clone, Serialize)]
pub struct MatchHit {
    pub person: PersonRecord,
    pub distance: f32,
    pub similarity: f32,
}

pub struct MatchService {
    store: Arc<dyn DescriptorStore>,
    lifecycle: LifecycleManager,
    max_distance: f32,
    similarity_bound: f32,
    default_limit: usize,
}

impl MatchService {
    pub fn new(
        store: Arc<dyn DescriptorStore>,
        max_distance: f32,
        similarity_bound: f32,
        default_limit: usize,
    ) -> Self {
        Self {
            lifecycle: LifecycleManager::new(store.clone()),
            store,
            max_distance,
            similarity_bound,
            default_limit,
        }
    }

    /// Persist a new missing-person record from a kiosk sighting.
    pub async fn report_sighting(
        &self,
        descriptor: FaceDescriptor,
        report: SightingReport,
    ) -> Result<PersonRecord, ServiceError> {
        let now = Utc::now();
        let record = PersonRecord {
            id: Uuid::new_v4(),
            name: report.name,
            age: report.age,
            gender: report.gender.unwrap_or_default(),
            photo_url: report.photo_url,
            face_descriptor: descriptor,
            status: PersonStatus::Missing,
            contact_info: report.contact_info,
            last_seen_location: report.last_seen_location,
            current_location: None,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.upsert_record(record).await?;
        tracing::info!(id = %stored.id, name = stored.display_name(), "sighting reported");
        Ok(stored)
    }

    /// Rank stored records against a query descriptor.
    ///
    /// One bounded store fetch, then a pure scan. An empty result means the
    /// threshold excluded everyone; store failures surface as errors and are
    /// never flattened into "no match".
    pub async fn match_face(
        &self,
        descriptor: FaceDescriptor,
        status_filter: Option<PersonStatus>,
        max_distance: Option<f32>,
        limit: Option<usize>,
    ) -> Result<Vec<MatchHit>, ServiceError> {
        let candidates = self.store.list_records(status_filter).await?;
        let opts = MatchOptions {
            max_distance: max_distance.unwrap_or(self.max_distance),
            limit: Some(limit.unwrap_or(self.default_limit)),
            status_filter,
        };
        let hits = LinearScanMatcher.find_matches(&descriptor, &candidates, &opts);
        tracing::debug!(
            candidates = candidates.len(),
            hits = hits.len(),
            max_distance = opts.max_distance,
            "match scan complete"
        );
        Ok(hits
            .into_iter()
            .map(|m| MatchHit {
                similarity: similarity(m.distance, self.similarity_bound),
                distance: m.distance,
                person: m.record,
            })
            .collect())
    }

    pub async fn list_by_status(
        &self,
        status: Option<PersonStatus>,
    ) -> Result<Vec<PersonRecord>, ServiceError> {
        Ok(self.store.list_records(status).await?)
    }

    pub async fn transition_status(
        &self,
        id: Uuid,
        target: PersonStatus,
        location: Option<String>,
    ) -> Result<PersonRecord, ServiceError> {
        self.lifecycle.transition(id, target, location).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use milaap_core::DESCRIPTOR_LEN;
    use milaap_store::MemoryStore;

    fn descriptor_at(head: f32) -> FaceDescriptor {
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[0] = head;
        FaceDescriptor::new(values).unwrap()
    }

    fn report(name: &str) -> SightingReport {
        SightingReport {
            photo_url: format!("https://photos.example/{name}.jpg"),
            name: Some(name.to_string()),
            age: None,
            gender: None,
            contact_info: None,
            last_seen_location: Some("Sector 12".into()),
        }
    }

    fn service() -> Arc<MatchService> {
        Arc::new(MatchService::new(Arc::new(MemoryStore::new()), 0.6, 1.2, 20))
    }

    #[tokio::test]
    async fn report_then_match_finds_the_record() {
        let service = service();
        let stored = service
            .report_sighting(descriptor_at(0.0), report("asha"))
            .await
            .unwrap();
        assert_eq!(stored.status, PersonStatus::Missing);

        let hits = service
            .match_face(descriptor_at(0.0), None, None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].person.id, stored.id);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[0].similarity, 1.0);
    }

    #[tokio::test]
    async fn match_against_empty_store_is_empty() {
        let hits = service()
            .match_face(descriptor_at(0.0), None, None, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn matches_rank_ascending_with_similarity_attached() {
        let service = service();
        let far = service
            .report_sighting(descriptor_at(0.55), report("far"))
            .await
            .unwrap();
        let near = service
            .report_sighting(descriptor_at(0.40), report("near"))
            .await
            .unwrap();

        let hits = service
            .match_face(descriptor_at(0.0), None, None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].person.id, near.id);
        assert_eq!(hits[1].person.id, far.id);
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn lifecycle_sequence_missing_found_reunited() {
        let service = service();
        let stored = service
            .report_sighting(descriptor_at(0.0), report("asha"))
            .await
            .unwrap();

        let found = service
            .transition_status(stored.id, PersonStatus::Found, Some("Help desk".into()))
            .await
            .unwrap();
        assert_eq!(found.status, PersonStatus::Found);
        assert_eq!(found.current_location.as_deref(), Some("Help desk"));

        let reunited = service
            .transition_status(stored.id, PersonStatus::Reunited, None)
            .await
            .unwrap();
        assert_eq!(reunited.status, PersonStatus::Reunited);
    }

    #[tokio::test]
    async fn direct_missing_to_reunited_is_legal() {
        let service = service();
        let stored = service
            .report_sighting(descriptor_at(0.0), report("asha"))
            .await
            .unwrap();
        let reunited = service
            .transition_status(stored.id, PersonStatus::Reunited, None)
            .await
            .unwrap();
        assert_eq!(reunited.status, PersonStatus::Reunited);
    }

    #[tokio::test]
    async fn reunited_is_terminal_at_the_service_layer() {
        let service = service();
        let stored = service
            .report_sighting(descriptor_at(0.0), report("asha"))
            .await
            .unwrap();
        service
            .transition_status(stored.id, PersonStatus::Reunited, None)
            .await
            .unwrap();

        let err = service
            .transition_status(stored.id, PersonStatus::Found, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn transition_of_unknown_id_is_not_found() {
        let err = service()
            .transition_status(Uuid::new_v4(), PersonStatus::Found, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn found_record_leaves_missing_filtered_matches() {
        let service = service();
        let stored = service
            .report_sighting(descriptor_at(0.0), report("asha"))
            .await
            .unwrap();

        let hits = service
            .match_face(descriptor_at(0.0), Some(PersonStatus::Missing), None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        service
            .transition_status(stored.id, PersonStatus::Found, None)
            .await
            .unwrap();

        let hits = service
            .match_face(descriptor_at(0.0), Some(PersonStatus::Missing), None, None)
            .await
            .unwrap();
        assert!(hits.is_empty());

        let listed = service
            .list_by_status(Some(PersonStatus::Missing))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn concurrent_transitions_commit_exactly_once() {
        let service = service();
        let stored = service
            .report_sighting(descriptor_at(0.0), report("asha"))
            .await
            .unwrap();

        let a = {
            let service = service.clone();
            let id = stored.id;
            tokio::spawn(async move {
                service
                    .transition_status(id, PersonStatus::Reunited, None)
                    .await
            })
        };
        let b = {
            let service = service.clone();
            let id = stored.id;
            tokio::spawn(async move {
                service
                    .transition_status(id, PersonStatus::Reunited, None)
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);

        // The loser re-validated against the committed terminal state.
        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser,
            Err(ServiceError::InvalidTransition(_))
                | Err(ServiceError::ConcurrentModification(_))
        ));

        let current = service
            .list_by_status(Some(PersonStatus::Reunited))
            .await
            .unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, stored.id);
    }

    #[tokio::test]
    async fn store_conflict_maps_to_concurrent_modification() {
        let id = Uuid::new_v4();
        let err: ServiceError = StoreError::Conflict {
            id,
            actual: PersonStatus::Found,
        }
        .into();
        assert!(matches!(err, ServiceError::ConcurrentModification(got) if got == id));
    }
}
