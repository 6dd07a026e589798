//! milaap-core — Face descriptor matching engine.
//!
//! Pure matching logic for the lost-and-found reunification service:
//! Euclidean distance over 128-dimensional face descriptors, a linear-scan
//! matcher over stored person records, and the case status state machine.
//! No I/O lives here; candidate retrieval and persistence belong to the
//! store and daemon crates.

pub mod descriptor;
pub mod matcher;
pub mod types;

pub use descriptor::{
    similarity, DescriptorError, FaceDescriptor, DEFAULT_MAX_DISTANCE, DEFAULT_SIMILARITY_BOUND,
    DESCRIPTOR_LEN,
};
pub use matcher::{LinearScanMatcher, MatchOptions, Matcher, ScoredMatch};
pub use types::{ContactInfo, Gender, InvalidTransition, PersonRecord, PersonStatus};
