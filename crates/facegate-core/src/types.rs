use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Descriptor length produced by the 128-dim face recognition network.
pub const DEFAULT_EMBEDDING_DIM: usize = 128;

/// Maximum Euclidean distance accepted as the same person for 128-dim descriptors.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Distances closer than this are treated as equal when choosing between identities.
pub const TIE_EPSILON: f32 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("expected {expected}-dim embedding, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding component {index} is not a finite number")]
    NonFinite { index: usize },
}

/// Face embedding vector. Serialized as a bare JSON number array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Check the embedding against the configured descriptor length.
    pub fn validate(&self, dim: usize) -> Result<(), EmbeddingError> {
        if self.values.len() != dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                actual: self.values.len(),
            });
        }
        if let Some(index) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite { index });
        }
        Ok(())
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Accumulates in f64 and rounds once, so an offset of exactly `t` along
    /// a single axis yields a distance of exactly `t`. Embeddings of different
    /// length are infinitely far apart.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(&a, &b)| {
                let d = f64::from(a) - f64::from(b);
                d * d
            })
            .sum::<f64>()
            .sqrt() as f32
    }
}

/// A stored enrollment: one name, one embedding sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    pub name: String,
    pub embedding: Embedding,
    pub created_at: String,
}

/// Outcome of matching a probe embedding against the enrolled gallery.
///
/// A miss is `allowed: false`, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    /// Name of the accepted identity. Always `None` when access is denied.
    pub name: Option<String>,
    /// Distance to the closest enrolled sample; `f32::INFINITY` for an empty gallery.
    pub distance: f32,
}

impl Decision {
    pub fn denied(distance: f32) -> Self {
        Self {
            allowed: false,
            name: None,
            distance,
        }
    }
}

/// Strategy for comparing a probe embedding against a gallery of enrolled faces.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[IdentityRecord], threshold: f32) -> Decision;
}

/// Nearest-neighbour matcher over Euclidean distance.
///
/// Ties within [`TIE_EPSILON`] of the minimum go to the lexicographically
/// smallest name, independent of gallery order.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[IdentityRecord], threshold: f32) -> Decision {
        // Constant-time: always compute every distance, no early exit.
        let distances: Vec<f32> = gallery
            .iter()
            .map(|record| probe.euclidean_distance(&record.embedding))
            .collect();
        let best_dist = distances.iter().copied().fold(f32::INFINITY, f32::min);

        // Among samples tied with the true minimum, the smallest name wins.
        let best_idx = distances
            .iter()
            .enumerate()
            .filter(|&(_, &dist)| dist - best_dist <= TIE_EPSILON)
            .map(|(i, _)| i)
            .min_by(|&a, &b| gallery[a].name.cmp(&gallery[b].name));

        match best_idx {
            Some(idx) if best_dist <= threshold => Decision {
                allowed: true,
                name: Some(gallery[idx].name.clone()),
                distance: best_dist,
            },
            _ => Decision::denied(best_dist),
        }
    }
}
