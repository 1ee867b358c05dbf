//! HTTP server wiring for Desk.
//!
//! Turns a [`ServerConfig`] and an opened store into a ready-to-serve axum
//! [`Router`]: the JSON API under `/api`, request tracing on top.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use axum::Router;
use desk_api::{ApiState, DeskStore, api_router};
use desk_core::ticket::{StateCatalog, TicketState};
use serde::Deserialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `DESK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:          String,
  #[serde(default = "default_port")]
  pub port:          u16,
  #[serde(default = "default_store_path")]
  pub store_path:    PathBuf,
  /// Replaces the built-in state catalog when present.
  #[serde(default)]
  pub states:        Option<Vec<TicketState>>,
  /// Starting state for new tickets; only read alongside `states`.
  #[serde(default)]
  pub initial_state: Option<String>,
  /// Settings created on startup if the store does not have them yet.
  #[serde(default)]
  pub settings:      BTreeMap<String, Value>,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 3000 }

fn default_store_path() -> PathBuf { PathBuf::from("desk.db") }

impl ServerConfig {
  /// The state catalog this deployment runs with.
  pub fn catalog(&self) -> desk_core::Result<StateCatalog> {
    match &self.states {
      None => Ok(StateCatalog::default()),
      Some(states) => {
        let initial = self
          .initial_state
          .clone()
          .or_else(|| states.first().map(|s| s.name.clone()))
          .unwrap_or_default();
        StateCatalog::new(states.clone(), initial)
      }
    }
  }
}

// ─── State ────────────────────────────────────────────────────────────────────

/// Build the handler state and create any configured settings the store is
/// missing. Existing settings keep their stored values.
pub async fn build_state<S: DeskStore>(
  store: Arc<S>,
  config: &ServerConfig,
) -> desk_core::Result<ApiState<S>> {
  let state = ApiState::with_catalog(store, config.catalog()?);

  let existing = state.settings.load().await?;
  for (name, value) in &config.settings {
    if existing.contains_key(name) {
      continue;
    }
    state.settings.create(name, value.clone()).await?;
    tracing::info!(setting = %name, "seeded setting");
  }

  Ok(state)
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application router: the JSON API nested under `/api`.
pub fn router<S: DeskStore>(state: ApiState<S>) -> Router {
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}
