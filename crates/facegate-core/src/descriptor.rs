//! Descriptor Source boundary.
//!
//! Face detection, landmarking and descriptor extraction run in an external
//! vision component. This module only sees what it produces: zero or more
//! scored face descriptors for the most recent frame.

use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("descriptor source failed: {0}")]
    Source(String),
}

/// One face found in a frame by the external detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Detector confidence for this face.
    pub score: f32,
    pub descriptor: Embedding,
}

/// Anything that can sample the latest frame and return the faces in it.
pub trait DescriptorSource {
    fn detect(&mut self) -> Result<Vec<Detection>, CaptureError>;
}

/// Sample the source once and return a single descriptor.
///
/// Frames with several faces are not rejected: the highest-scoring face is
/// used and the others are dropped (first one wins on equal scores).
pub fn capture_descriptor<S: DescriptorSource + ?Sized>(
    source: &mut S,
) -> Result<Embedding, CaptureError> {
    let faces = source.detect()?;
    let count = faces.len();

    let mut best: Option<Detection> = None;
    for face in faces {
        let is_better = match &best {
            None => true,
            Some(prev) => face.score > prev.score,
        };
        if is_better {
            best = Some(face);
        }
    }

    let face = best.ok_or(CaptureError::NoFaceDetected)?;
    if count > 1 {
        tracing::info!(faces = count, score = face.score, "multiple faces in frame; using best");
    } else {
        tracing::debug!(score = face.score, "face captured");
    }

    Ok(face.descriptor)
}
