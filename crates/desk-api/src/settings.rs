//! Handlers for `/settings` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/settings` | Resolved snapshot, placeholders expanded |
//! | `POST` | `/settings` | Body: `{"name":"...","value":...}`; returns 201 |
//! | `GET`  | `/settings/:name` | 404 if not found |
//! | `PUT`  | `/settings/:name` | Body: `{"value":...}` |
//! | `POST` | `/settings/:name/reset` | Back to the value it was created with |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use desk_core::settings::{Setting, SettingsSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ApiState, DeskStore, error::ApiError};

#[derive(Debug, Serialize, Deserialize)]
pub struct NamedValue {
  pub name:  String,
  pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct ValueBody {
  pub value: Value,
}

/// `GET /settings`
pub async fn list<S: DeskStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<SettingsSnapshot>, ApiError> {
  let snapshot = state.settings.load().await?;
  Ok(Json(snapshot.as_ref().clone()))
}

/// `POST /settings`
pub async fn create<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NamedValue>,
) -> Result<impl IntoResponse, ApiError> {
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("setting name must not be empty".into()));
  }
  let setting: Setting = state.settings.create(&body.name, body.value).await?;
  Ok((StatusCode::CREATED, Json(setting)))
}

/// `GET /settings/:name`
pub async fn get_one<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(name): Path<String>,
) -> Result<Json<NamedValue>, ApiError> {
  let value = state
    .settings
    .get(&name)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("setting {name:?} not found")))?;
  Ok(Json(NamedValue { name, value }))
}

/// `PUT /settings/:name`, body: `{"value": ...}`
pub async fn update<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(name): Path<String>,
  Json(body): Json<ValueBody>,
) -> Result<Json<NamedValue>, ApiError> {
  state.settings.set(&name, body.value).await?;
  resolved(&state, name).await
}

/// `POST /settings/:name/reset`
pub async fn reset<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(name): Path<String>,
) -> Result<Json<NamedValue>, ApiError> {
  state.settings.reset(&name).await?;
  resolved(&state, name).await
}

async fn resolved<S: DeskStore>(
  state: &ApiState<S>,
  name: String,
) -> Result<Json<NamedValue>, ApiError> {
  let value = state.settings.get(&name).await?.unwrap_or(Value::Null);
  Ok(Json(NamedValue { name, value }))
}
