//! JSON messages exchanged between the client and the identity daemon.
//!
//! Stateless: one request, one response.

use crate::types::{Decision, Embedding};
use serde::{Deserialize, Serialize};

pub const REGISTER_PATH: &str = "/register";
pub const RECOGNIZE_PATH: &str = "/recognize";
pub const IDENTITIES_PATH: &str = "/identities";
pub const STATUS_PATH: &str = "/status";

/// `POST /register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub name: String,
    pub embedding: Embedding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollResponse {
    pub id: String,
    pub name: String,
    /// Number of samples now enrolled under this name.
    pub samples: usize,
}

/// `POST /recognize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub embedding: Embedding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Omitted when nothing is enrolled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl From<Decision> for VerifyResponse {
    fn from(d: Decision) -> Self {
        Self {
            allowed: d.allowed,
            name: d.name,
            distance: d.distance.is_finite().then_some(d.distance),
        }
    }
}

impl From<VerifyResponse> for Decision {
    fn from(r: VerifyResponse) -> Self {
        Self {
            allowed: r.allowed,
            name: if r.allowed { r.name } else { None },
            distance: r.distance.unwrap_or(f32::INFINITY),
        }
    }
}

/// One entry of `GET /identities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub name: String,
    pub samples: usize,
    /// RFC 3339 timestamp of the first enrollment.
    pub enrolled_at: String,
}

/// `DELETE /identities/{name}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub name: String,
    pub removed: usize,
}

/// `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub embedding_dim: usize,
    pub threshold: f32,
    pub identities: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyName,
    InvalidEmbedding,
    /// Body missing, not JSON, or not the expected shape.
    InvalidRequest,
    StoreUnavailable,
    NotFound,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
}
