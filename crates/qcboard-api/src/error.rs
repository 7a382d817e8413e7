//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use qcboard_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A write was rejected; nothing was stored.
  #[error("validation error: {0}")]
  Validation(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain error behind it.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    match e.as_core() {
      Some(qcboard_core::Error::NotFound(id)) => {
        ApiError::NotFound(format!("machine {id} not found"))
      }
      Some(qcboard_core::Error::Validation(m)) => ApiError::Validation(m.clone()),
      Some(core @ qcboard_core::Error::InvalidDate(_)) => {
        ApiError::BadRequest(core.to_string())
      }
      _ => ApiError::Store(Box::new(e)),
    }
  }
}

impl From<qcboard_core::Error> for ApiError {
  fn from(e: qcboard_core::Error) -> Self {
    match e {
      qcboard_core::Error::NotFound(id) => {
        ApiError::NotFound(format!("machine {id} not found"))
      }
      qcboard_core::Error::Validation(m) => ApiError::Validation(m),
      other @ qcboard_core::Error::InvalidDate(_) => ApiError::BadRequest(other.to_string()),
      other => ApiError::Store(Box::new(other)),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::Validation(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Validation(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
