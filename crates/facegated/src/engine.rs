use crate::store::{EnrollmentStore, StoreError};
use facegate_core::protocol::{IdentitySummary, StatusResponse};
use facegate_core::{Decision, Embedding, EmbeddingError, IdentityRecord, Matcher};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(#[from] EmbeddingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no identity named {0:?}")]
    NotFound(String),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result of an enrollment operation.
#[derive(Debug, Clone)]
pub struct EnrollReceipt {
    pub id: String,
    pub name: String,
    /// Samples now held for this name, including the new one.
    pub samples: usize,
}

/// Matching parameters fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct MatchSettings {
    pub threshold: f32,
    pub embedding_dim: usize,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Enroll {
        name: String,
        embedding: Embedding,
        reply: oneshot::Sender<Result<EnrollReceipt, EngineError>>,
    },
    Verify {
        probe: Embedding,
        reply: oneshot::Sender<Result<Decision, EngineError>>,
    },
    Identities {
        reply: oneshot::Sender<Result<Vec<IdentitySummary>, EngineError>>,
    },
    Remove {
        name: String,
        reply: oneshot::Sender<Result<usize, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<Result<StatusResponse, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Append a new sample for `name`.
    pub async fn enroll(&self, name: String, embedding: Embedding) -> Result<EnrollReceipt, EngineError> {
        self.call(|reply| EngineRequest::Enroll {
            name,
            embedding,
            reply,
        })
        .await
    }

    /// Compare a probe against every enrolled sample.
    pub async fn verify(&self, probe: Embedding) -> Result<Decision, EngineError> {
        self.call(|reply| EngineRequest::Verify { probe, reply }).await
    }

    pub async fn identities(&self) -> Result<Vec<IdentitySummary>, EngineError> {
        self.call(|reply| EngineRequest::Identities { reply }).await
    }

    /// Delete every sample for `name`.
    pub async fn remove(&self, name: String) -> Result<usize, EngineError> {
        self.call(|reply| EngineRequest::Remove { name, reply }).await
    }

    pub async fn status(&self) -> Result<StatusResponse, EngineError> {
        self.call(|reply| EngineRequest::Status { reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the store and handles one request at a time, so a
/// verify never observes a half-applied enrollment and each enrollment
/// is visible to every verify queued after it.
pub fn spawn_engine<S, M>(
    store: S,
    matcher: M,
    settings: MatchSettings,
    queue_depth: usize,
) -> Result<EngineHandle, EngineError>
where
    S: EnrollmentStore + 'static,
    M: Matcher + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!(
                threshold = settings.threshold,
                dim = settings.embedding_dim,
                "engine thread started"
            );
            let mut engine = Engine {
                store,
                matcher,
                settings,
            };
            while let Some(req) = rx.blocking_recv() {
                engine.handle(req);
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

struct Engine<S, M> {
    store: S,
    matcher: M,
    settings: MatchSettings,
}

impl<S: EnrollmentStore, M: Matcher> Engine<S, M> {
    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Enroll {
                name,
                embedding,
                reply,
            } => {
                let _ = reply.send(self.run_enroll(&name, embedding));
            }
            EngineRequest::Verify { probe, reply } => {
                let _ = reply.send(self.run_verify(&probe));
            }
            EngineRequest::Identities { reply } => {
                let _ = reply.send(self.store.summaries().map_err(EngineError::from));
            }
            EngineRequest::Remove { name, reply } => {
                let _ = reply.send(self.run_remove(&name));
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.run_status());
            }
        }
    }

    fn run_enroll(&mut self, name: &str, embedding: Embedding) -> Result<EnrollReceipt, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyName);
        }
        embedding.validate(self.settings.embedding_dim)?;

        let record = IdentityRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            embedding,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let samples = self.store.insert(&record)?;

        tracing::info!(name, id = %record.id, samples, "enroll: sample stored");

        Ok(EnrollReceipt {
            id: record.id,
            name: record.name,
            samples,
        })
    }

    fn run_verify(&self, probe: &Embedding) -> Result<Decision, EngineError> {
        probe.validate(self.settings.embedding_dim)?;

        let gallery = self.store.snapshot()?;
        // A stored sample of another length would be compared on a prefix only.
        for record in &gallery {
            record
                .embedding
                .validate(self.settings.embedding_dim)
                .map_err(|source| StoreError::InvalidRecord {
                    id: record.id.clone(),
                    source,
                })?;
        }
        let decision = self
            .matcher
            .compare(probe, &gallery, self.settings.threshold);

        tracing::info!(
            allowed = decision.allowed,
            name = decision.name.as_deref().unwrap_or("-"),
            distance = decision.distance,
            gallery = gallery.len(),
            "verify: decision"
        );

        Ok(decision)
    }

    fn run_remove(&mut self, name: &str) -> Result<usize, EngineError> {
        let removed = self.store.remove(name)?;
        if removed == 0 {
            return Err(EngineError::NotFound(name.to_string()));
        }
        tracing::info!(name, removed, "remove: identity deleted");
        Ok(removed)
    }

    fn run_status(&self) -> Result<StatusResponse, EngineError> {
        let summaries = self.store.summaries()?;
        Ok(StatusResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            embedding_dim: self.settings.embedding_dim,
            threshold: self.settings.threshold,
            identities: summaries.len(),
            records: summaries.iter().map(|s| s.samples).sum(),
        })
    }
}
