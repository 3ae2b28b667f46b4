//! Wire types and the user-visible error taxonomy.
//!
//! Every handler failure funnels through [`ApiError`]; internal detail is
//! logged at the conversion point and never reaches the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::engine::EngineError;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
pub struct FaceRegisterRequest {
    pub image_base64: String,
    pub display_name: String,
    pub secret: String,
    pub collaborator_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct FaceLoginRequest {
    pub image_base64: String,
}

#[derive(Debug, Serialize)]
pub struct FaceRegisterResponse {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct FaceLoginResponse {
    pub collaborator_id: i32,
    pub display_name: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct SavedBatchResponse {
    pub batch_id: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ObservationsUpdate {
    pub observations: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    pub search_term: Option<String>,
    #[serde(default = "default_items_limit")]
    pub limit: i64,
}

fn default_items_limit() -> i64 {
    20
}

/// Everything a handler can fail with, already shaped for the caller.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("error processing image")]
    ImageProcessing,
    #[error("face not recognized")]
    FaceNotRecognized,
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Server(&'static str),
}

impl ApiError {
    /// Translate a store failure: raw error to the log, generic
    /// operation-appropriate message to the caller.
    pub fn from_store(err: StoreError, public_message: &'static str) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Database(e) => {
                tracing::error!(error = %e, "store operation failed");
                ApiError::Server(public_message)
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        if err.is_client_error() {
            // Retakeable photo problem: same classification for enrollment
            // and login.
            tracing::warn!(error = %err, "rejected photo payload");
            ApiError::ImageProcessing
        } else {
            tracing::error!(error = %err, "face engine failure");
            ApiError::Server("error processing face request")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::ImageProcessing => StatusCode::BAD_REQUEST,
            ApiError::FaceNotRecognized | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
