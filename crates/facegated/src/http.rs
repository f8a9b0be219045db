use crate::engine::{EngineError, EngineHandle};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use facegate_core::protocol::{
    EnrollRequest, EnrollResponse, ErrorBody, ErrorKind, IdentitySummary, RemoveResponse,
    StatusResponse, VerifyRequest, VerifyResponse, IDENTITIES_PATH, RECOGNIZE_PATH, REGISTER_PATH,
    STATUS_PATH,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// HTTP API for the identity daemon.
///
/// `POST /register` and `POST /recognize` form the client protocol;
/// the remaining routes are administrative.
pub fn router(engine: EngineHandle, cors: CorsLayer) -> Router {
    Router::new()
        .route(REGISTER_PATH, post(register))
        .route(RECOGNIZE_PATH, post(recognize))
        .route(IDENTITIES_PATH, get(list_identities))
        .route(&format!("{IDENTITIES_PATH}/{{name}}"), delete(remove_identity))
        .route(STATUS_PATH, get(status))
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Enroll a new face sample under the given name.
async fn register(
    State(engine): State<EngineHandle>,
    payload: Result<Json<EnrollRequest>, JsonRejection>,
) -> Result<Json<EnrollResponse>, ApiError> {
    let Json(req) = payload?;
    tracing::info!(name = %req.name, dim = req.embedding.dim(), "register requested");
    let receipt = engine.enroll(req.name, req.embedding).await?;
    Ok(Json(EnrollResponse {
        id: receipt.id,
        name: receipt.name,
        samples: receipt.samples,
    }))
}

/// Match a probe against all enrolled samples. A miss is a 200 with `allowed: false`.
async fn recognize(
    State(engine): State<EngineHandle>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(req) = payload?;
    tracing::info!(dim = req.embedding.dim(), "recognize requested");
    let decision = engine.verify(req.embedding).await?;
    Ok(Json(decision.into()))
}

async fn list_identities(
    State(engine): State<EngineHandle>,
) -> Result<Json<Vec<IdentitySummary>>, ApiError> {
    Ok(Json(engine.identities().await?))
}

async fn remove_identity(
    State(engine): State<EngineHandle>,
    Path(name): Path<String>,
) -> Result<Json<RemoveResponse>, ApiError> {
    tracing::info!(name = %name, "remove requested");
    let removed = engine.remove(name.clone()).await?;
    Ok(Json(RemoveResponse { name, removed }))
}

async fn status(State(engine): State<EngineHandle>) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(engine.status().await?))
}

/// Request failure rendered as an HTTP error with an [`ErrorBody`].
pub enum ApiError {
    Engine(EngineError),
    Body(JsonRejection),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl ApiError {
    fn kind(&self) -> (StatusCode, ErrorKind) {
        match self {
            Self::Engine(EngineError::EmptyName) => (StatusCode::BAD_REQUEST, ErrorKind::EmptyName),
            Self::Engine(EngineError::InvalidEmbedding(_)) => {
                (StatusCode::BAD_REQUEST, ErrorKind::InvalidEmbedding)
            }
            Self::Engine(EngineError::NotFound(_)) => (StatusCode::NOT_FOUND, ErrorKind::NotFound),
            Self::Engine(EngineError::Store(_) | EngineError::ChannelClosed | EngineError::Spawn(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::StoreUnavailable)
            }
            // The data error text carries the serde path, e.g. `embedding[1]: invalid type`.
            Self::Body(JsonRejection::JsonDataError(e)) if e.body_text().contains("embedding") => {
                (StatusCode::BAD_REQUEST, ErrorKind::InvalidEmbedding)
            }
            Self::Body(_) => (StatusCode::BAD_REQUEST, ErrorKind::InvalidRequest),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Engine(err) => err.to_string(),
            Self::Body(rejection) => rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.kind();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        } else {
            tracing::warn!(error = %message, "request rejected");
        }
        (status, Json(ErrorBody { error, message })).into_response()
    }
}
