//! Client side of enroll/verify: capture a descriptor, make one protocol
//! call, hand back the outcome. One user action at a time.

use crate::backend::{Backend, BackendError};
use facegate_core::protocol::{EnrollRequest, EnrollResponse, VerifyRequest};
use facegate_core::{capture_descriptor, CaptureError, Decision, DescriptorSource, Embedding};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("enrollment store unavailable: {0}")]
    StoreUnavailable(String),
    #[error(transparent)]
    Backend(BackendError),
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("enrollment store unavailable: {0}")]
    StoreUnavailable(String),
    #[error(transparent)]
    Backend(BackendError),
}

/// Failure of a whole user action.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("another action is still in progress")]
    Busy,
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Enroll(#[from] EnrollError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

pub struct Orchestrator<S, B> {
    source: Mutex<S>,
    backend: B,
    in_flight: tokio::sync::Mutex<()>,
}

impl<S: DescriptorSource, B: Backend> Orchestrator<S, B> {
    pub fn new(source: S, backend: B) -> Self {
        Self {
            source: Mutex::new(source),
            backend,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Sample the descriptor source once.
    pub fn capture_descriptor(&self) -> Result<Embedding, CaptureError> {
        let mut source = self
            .source
            .lock()
            .map_err(|_| CaptureError::Source("descriptor source poisoned".into()))?;
        capture_descriptor(&mut *source)
    }

    /// Send an enrollment. Duplicate names are left to the backend.
    pub async fn enroll(&self, name: &str, embedding: Embedding) -> Result<EnrollResponse, EnrollError> {
        if name.trim().is_empty() {
            return Err(EnrollError::EmptyName);
        }
        let req = EnrollRequest {
            name: name.to_string(),
            embedding,
        };
        self.backend.enroll(&req).await.map_err(|e| match e {
            BackendError::StoreUnavailable(msg) => EnrollError::StoreUnavailable(msg),
            other => EnrollError::Backend(other),
        })
    }

    /// Ask the backend for a decision. "Not recognized" is `Ok` with `allowed: false`.
    pub async fn verify(&self, embedding: Embedding) -> Result<Decision, VerifyError> {
        let req = VerifyRequest { embedding };
        match self.backend.verify(&req).await {
            Ok(resp) => Ok(resp.into()),
            Err(BackendError::StoreUnavailable(msg)) => Err(VerifyError::StoreUnavailable(msg)),
            Err(other) => Err(VerifyError::Backend(other)),
        }
    }

    /// User action: capture a face and enroll it under `name`.
    pub async fn register(&self, name: &str) -> Result<EnrollResponse, ActionError> {
        let _guard = self.in_flight.try_lock().map_err(|_| ActionError::Busy)?;
        if name.trim().is_empty() {
            return Err(EnrollError::EmptyName.into());
        }
        let embedding = self.capture_descriptor()?;
        let receipt = self.enroll(name, embedding).await?;
        tracing::info!(name = %receipt.name, samples = receipt.samples, "registered");
        Ok(receipt)
    }

    /// User action: capture a face and ask whether it is enrolled.
    pub async fn recognize(&self) -> Result<Decision, ActionError> {
        let _guard = self.in_flight.try_lock().map_err(|_| ActionError::Busy)?;
        let embedding = self.capture_descriptor()?;
        let decision = self.verify(embedding).await?;
        tracing::info!(allowed = decision.allowed, "recognize finished");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::protocol::VerifyResponse;
    use facegate_core::Detection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct Frames(Vec<Detection>);

    impl DescriptorSource for Frames {
        fn detect(&mut self) -> Result<Vec<Detection>, CaptureError> {
            Ok(self.0.clone())
        }
    }

    fn one_face() -> Frames {
        Frames(vec![Detection {
            score: 0.9,
            descriptor: Embedding::new(vec![0.5; 4]),
        }])
    }

    enum Reply {
        Allow(&'static str),
        Deny,
        StoreDown,
    }

    struct FakeBackend {
        reply: Reply,
        calls: AtomicUsize,
        enrolled: Mutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                enrolled: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        async fn hit(&self) -> Result<(), BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.reply {
                Reply::StoreDown => Err(BackendError::StoreUnavailable("db offline".into())),
                _ => Ok(()),
            }
        }
    }

    impl Backend for FakeBackend {
        async fn enroll(&self, req: &EnrollRequest) -> Result<EnrollResponse, BackendError> {
            self.hit().await?;
            let mut enrolled = self.enrolled.lock().unwrap();
            enrolled.push(req.name.clone());
            Ok(EnrollResponse {
                id: format!("id-{}", enrolled.len()),
                name: req.name.clone(),
                samples: enrolled.iter().filter(|n| **n == req.name).count(),
            })
        }

        async fn verify(&self, _req: &VerifyRequest) -> Result<VerifyResponse, BackendError> {
            self.hit().await?;
            Ok(match self.reply {
                Reply::Allow(name) => VerifyResponse {
                    allowed: true,
                    name: Some(name.into()),
                    distance: Some(0.3),
                },
                _ => VerifyResponse {
                    allowed: false,
                    name: None,
                    distance: None,
                },
            })
        }
    }

    #[tokio::test]
    async fn test_recognize_allowed() {
        let orch = Orchestrator::new(one_face(), FakeBackend::new(Reply::Allow("Alice")));
        let decision = orch.recognize().await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.name.as_deref(), Some("Alice"));
        assert_eq!(orch.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recognize_miss_is_not_an_error() {
        let orch = Orchestrator::new(one_face(), FakeBackend::new(Reply::Deny));
        let decision = orch.recognize().await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.name, None);
    }

    #[tokio::test]
    async fn test_store_outage_is_distinct_from_miss() {
        let orch = Orchestrator::new(one_face(), FakeBackend::new(Reply::StoreDown));
        assert!(matches!(
            orch.recognize().await,
            Err(ActionError::Verify(VerifyError::StoreUnavailable(_)))
        ));
        assert!(matches!(
            orch.register("alice").await,
            Err(ActionError::Enroll(EnrollError::StoreUnavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_no_face_skips_network() {
        let orch = Orchestrator::new(Frames(vec![]), FakeBackend::new(Reply::Deny));
        assert!(matches!(
            orch.recognize().await,
            Err(ActionError::Capture(CaptureError::NoFaceDetected))
        ));
        assert_eq!(orch.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_name_rejected_before_capture() {
        let orch = Orchestrator::new(Frames(vec![]), FakeBackend::new(Reply::Deny));
        // An empty frame would fail capture; the name check must come first.
        assert!(matches!(
            orch.register("  ").await,
            Err(ActionError::Enroll(EnrollError::EmptyName))
        ));
        assert!(matches!(
            orch.enroll("", Embedding::new(vec![0.0; 4])).await,
            Err(EnrollError::EmptyName)
        ));
        assert_eq!(orch.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_names_forwarded() {
        let orch = Orchestrator::new(one_face(), FakeBackend::new(Reply::Deny));
        orch.register("alice").await.unwrap();
        let second = orch.register("alice").await.unwrap();
        assert_eq!(second.samples, 2);
        assert_eq!(orch.backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_overlapping_action_is_rejected() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::new(Reply::Allow("Alice"));
        backend.gate = Some(gate.clone());
        let orch = Orchestrator::new(one_face(), backend);

        let (first, second, ()) = tokio::join!(orch.recognize(), orch.recognize(), async {
            gate.notify_one();
        });

        assert!(first.unwrap().allowed);
        assert!(matches!(second, Err(ActionError::Busy)));
        assert_eq!(orch.backend.calls.load(Ordering::SeqCst), 1);

        // Slot is free again once the first action finished.
        gate.notify_one();
        assert!(orch.recognize().await.is_ok());
    }
}
