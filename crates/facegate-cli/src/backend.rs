//! HTTP client for the facegated API.

use facegate_core::protocol::{
    EnrollRequest, EnrollResponse, ErrorBody, IdentitySummary, RemoveResponse, StatusResponse,
    VerifyRequest, VerifyResponse, IDENTITIES_PATH, RECOGNIZE_PATH, REGISTER_PATH, STATUS_PATH,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("enrollment store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("unexpected status {status}: {text}")]
    UnexpectedStatus { status: StatusCode, text: String },
}

/// The two protocol calls the orchestrator needs.
pub trait Backend {
    async fn enroll(&self, req: &EnrollRequest) -> Result<EnrollResponse, BackendError>;
    async fn verify(&self, req: &VerifyRequest) -> Result<VerifyResponse, BackendError>;
}

pub struct HttpBackend {
    http_client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        Ok(Self {
            http_client: Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .timeout(Duration::from_secs(30))
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn identities(&self) -> Result<Vec<IdentitySummary>, BackendError> {
        send(self.http_client.get(self.url(IDENTITIES_PATH))).await
    }

    pub async fn remove(&self, name: &str) -> Result<RemoveResponse, BackendError> {
        let mut url = reqwest::Url::parse(&self.url(IDENTITIES_PATH))
            .map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?
            .push(name);
        send(self.http_client.delete(url)).await
    }

    pub async fn status(&self) -> Result<StatusResponse, BackendError> {
        send(self.http_client.get(self.url(STATUS_PATH))).await
    }
}

impl Backend for HttpBackend {
    async fn enroll(&self, req: &EnrollRequest) -> Result<EnrollResponse, BackendError> {
        send(self.http_client.post(self.url(REGISTER_PATH)).json(req)).await
    }

    async fn verify(&self, req: &VerifyRequest) -> Result<VerifyResponse, BackendError> {
        send(self.http_client.post(self.url(RECOGNIZE_PATH)).json(req)).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
    let response = request.send().await?;

    match response.status() {
        StatusCode::OK => Ok(response.json().await?),
        status => {
            let text = response.text().await?;
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.message)
                .unwrap_or_else(|_| text.clone());
            Err(match status {
                StatusCode::SERVICE_UNAVAILABLE => BackendError::StoreUnavailable(message),
                StatusCode::BAD_REQUEST => BackendError::Rejected(message),
                StatusCode::NOT_FOUND => BackendError::NotFound(message),
                _ => BackendError::UnexpectedStatus { status, text },
            })
        }
    }
}
