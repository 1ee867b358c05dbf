//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Well-formed input the ticket rules reject.
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<desk_core::Error> for ApiError {
  fn from(e: desk_core::Error) -> Self {
    use desk_core::Error as E;
    match e {
      E::NotFound(_) | E::SettingNotFound(_) => Self::NotFound(e.to_string()),
      E::InvalidReference(_) | E::InvalidStateTransition(_) | E::UnknownState(_) => {
        Self::Unprocessable(e.to_string())
      }
      E::OutOfOrderEvent { .. } | E::SettingExists(_) => Self::Conflict(e.to_string()),
      E::Store(inner) => Self::Store(inner),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
