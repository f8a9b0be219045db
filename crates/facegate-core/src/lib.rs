//! facegate-core: face identity matching.
//!
//! Descriptor extraction happens in an external vision component; this crate
//! covers what happens after a descriptor exists: Euclidean nearest-neighbour
//! matching against enrolled identities and the enroll/verify wire protocol.

pub mod descriptor;
pub mod protocol;
pub mod types;

pub use descriptor::{capture_descriptor, CaptureError, DescriptorSource, Detection};
pub use types::{
    Decision, Embedding, EmbeddingError, EuclideanMatcher, IdentityRecord, Matcher,
    DEFAULT_EMBEDDING_DIM, DEFAULT_MATCH_THRESHOLD,
};
