//! Face descriptor vector and distance computation.
//!
//! Descriptors are opaque 128-dimensional embeddings produced by the upstream
//! face model. Lower Euclidean distance = more similar. The presentation
//! similarity score is derived from distance and never feeds back into
//! ranking or thresholding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dimensionality of every face descriptor.
pub const DESCRIPTOR_LEN: usize = 128;

/// Maximum Euclidean distance at which two descriptors count as a match.
/// Operating point recommended by the embedding model; callers may override
/// per request.
pub const DEFAULT_MAX_DISTANCE: f32 = 0.6;

/// Normalization constant for the presentation similarity score, chosen so
/// the default threshold maps to a similarity of 0.5.
pub const DEFAULT_SIMILARITY_BOUND: f32 = 1.2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("descriptor must have exactly {DESCRIPTOR_LEN} components, got {0}")]
    WrongLength(usize),
    #[error("descriptor component {0} is not a finite number")]
    NonFinite(usize),
}

/// Validated 128-dimensional face embedding.
///
/// Construction is the only validation point: every `FaceDescriptor` in the
/// system has exactly [`DESCRIPTOR_LEN`] finite components. Deserialization
/// routes through the same check, so malformed input is rejected at the
/// boundary before any scan runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FaceDescriptor(Vec<f32>);

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Result<Self, DescriptorError> {
        if values.len() != DESCRIPTOR_LEN {
            return Err(DescriptorError::WrongLength(values.len()));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(DescriptorError::NonFinite(i));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Compute Euclidean distance to another descriptor.
    pub fn distance(&self, other: &FaceDescriptor) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

impl TryFrom<Vec<f32>> for FaceDescriptor {
    type Error = DescriptorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FaceDescriptor> for Vec<f32> {
    fn from(d: FaceDescriptor) -> Self {
        d.0
    }
}

/// Map a distance to a bounded user-facing similarity score in [0, 1].
///
/// `max(0, 1 - distance / bound)`. Presentation only; match decisions use
/// raw distance against the threshold.
pub fn similarity(distance: f32, bound: f32) -> f32 {
    (1.0 - distance / bound).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(fill: f32) -> FaceDescriptor {
        FaceDescriptor::new(vec![fill; DESCRIPTOR_LEN]).unwrap()
    }

    /// Descriptor equal to `base` everywhere except the first component.
    fn desc_with_head(head: f32, base: f32) -> FaceDescriptor {
        let mut values = vec![base; DESCRIPTOR_LEN];
        values[0] = head;
        FaceDescriptor::new(values).unwrap()
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = desc(0.25);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = desc_with_head(0.9, 0.1);
        let b = desc_with_head(-0.3, 0.2);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn distance_matches_hand_computation() {
        // Differs in two components, by 3.0 and 4.0: a 3-4-5 triangle.
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[10] = 3.0;
        values[20] = 4.0;
        let a = FaceDescriptor::new(values).unwrap();
        let b = desc(0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn wrong_length_rejected() {
        assert_eq!(
            FaceDescriptor::new(vec![0.0; 127]),
            Err(DescriptorError::WrongLength(127))
        );
        assert_eq!(
            FaceDescriptor::new(vec![0.0; 129]),
            Err(DescriptorError::WrongLength(129))
        );
    }

    #[test]
    fn non_finite_component_rejected() {
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[7] = f32::NAN;
        assert_eq!(
            FaceDescriptor::new(values.clone()),
            Err(DescriptorError::NonFinite(7))
        );
        values[7] = f32::INFINITY;
        assert_eq!(
            FaceDescriptor::new(values),
            Err(DescriptorError::NonFinite(7))
        );
    }

    #[test]
    fn deserialization_validates() {
        let json = serde_json::to_string(&vec![0.5f32; 64]).unwrap();
        let result: Result<FaceDescriptor, _> = serde_json::from_str(&json);
        assert!(result.is_err());

        let json = serde_json::to_string(&vec![0.5f32; DESCRIPTOR_LEN]).unwrap();
        let d: FaceDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(d.as_slice().len(), DESCRIPTOR_LEN);
    }

    #[test]
    fn similarity_at_zero_distance_is_one() {
        assert_eq!(similarity(0.0, DEFAULT_SIMILARITY_BOUND), 1.0);
    }

    #[test]
    fn similarity_at_default_threshold_is_midpoint() {
        let s = similarity(DEFAULT_MAX_DISTANCE, DEFAULT_SIMILARITY_BOUND);
        assert!((s - 0.5).abs() < 1e-6);
    }

    #[test]
    fn similarity_clamps_to_zero_beyond_bound() {
        assert_eq!(similarity(2.0, DEFAULT_SIMILARITY_BOUND), 0.0);
        assert_eq!(similarity(DEFAULT_SIMILARITY_BOUND, DEFAULT_SIMILARITY_BOUND), 0.0);
    }
}
