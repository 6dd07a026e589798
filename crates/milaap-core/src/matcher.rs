//! Linear-scan matching of a query descriptor against stored records.

use crate::descriptor::{FaceDescriptor, DEFAULT_MAX_DISTANCE};
use crate::types::{PersonRecord, PersonStatus};

/// Options for a single match run.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Maximum Euclidean distance for a candidate to count as a match.
    pub max_distance: f32,
    /// Truncate the ranked result to this many entries.
    pub limit: Option<usize>,
    /// Only consider candidates with this stored status.
    pub status_filter: Option<PersonStatus>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            limit: None,
            status_filter: None,
        }
    }
}

/// A candidate that scored at or below the distance threshold.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub record: PersonRecord,
    pub distance: f32,
}

/// Strategy for ranking stored records against a query descriptor.
///
/// The linear scan is the reference implementation; an indexed
/// nearest-neighbor structure may be substituted behind this trait as long
/// as it preserves the exact threshold and ordering semantics.
pub trait Matcher {
    fn find_matches(
        &self,
        query: &FaceDescriptor,
        candidates: &[PersonRecord],
        opts: &MatchOptions,
    ) -> Vec<ScoredMatch>;
}

/// Full scan: every candidate is compared, no index, no early exit.
///
/// Ranking is ascending by distance; equal distances keep candidate input
/// order, so with insertion-ordered candidates the first-registered record
/// wins ties. An empty result means nothing scored below the threshold,
/// never an internal failure.
pub struct LinearScanMatcher;

impl Matcher for LinearScanMatcher {
    fn find_matches(
        &self,
        query: &FaceDescriptor,
        candidates: &[PersonRecord],
        opts: &MatchOptions,
    ) -> Vec<ScoredMatch> {
        let mut hits: Vec<ScoredMatch> = candidates
            .iter()
            .filter(|record| {
                opts.status_filter
                    .map_or(true, |status| record.status == status)
            })
            .filter_map(|record| {
                let distance = query.distance(&record.face_descriptor);
                (distance <= opts.max_distance).then(|| ScoredMatch {
                    record: record.clone(),
                    distance,
                })
            })
            .collect();

        // Stable sort: ties keep input order. Distances are finite because
        // descriptors only ever hold finite components.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(limit) = opts.limit {
            hits.truncate(limit);
        }
        hits
    }
}
