//! Async HTTP client wrapping the desk JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use desk_core::{
  article::Article,
  ticket::{Ticket, TicketState},
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

/// Async HTTP client for the desk JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
  }

  /// Turn a non-2xx response into an error carrying the server's message.
  async fn decode<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
      let body: Value = resp.json().await.unwrap_or(Value::Null);
      let message = body["error"].as_str().unwrap_or("no details");
      return Err(anyhow!("{what} → {status}: {message}"));
    }
    resp.json().await.with_context(|| format!("deserialising {what}"))
  }

  // ── Tickets ───────────────────────────────────────────────────────────────

  /// `GET /api/tickets`
  pub async fn list_tickets(&self) -> Result<Vec<Ticket>> {
    let resp = self
      .client
      .get(self.url("/tickets"))
      .send()
      .await
      .context("GET /tickets failed")?;
    Self::decode("tickets", resp).await
  }

  /// `POST /api/tickets`
  pub async fn create_ticket(&self, title: &str, state: Option<&str>) -> Result<Ticket> {
    let resp = self
      .client
      .post(self.url("/tickets"))
      .json(&json!({ "title": title, "state": state }))
      .send()
      .await
      .context("POST /tickets failed")?;
    Self::decode("created ticket", resp).await
  }

  /// `GET /api/tickets/:id`
  pub async fn get_ticket(&self, id: Uuid) -> Result<Ticket> {
    let resp = self
      .client
      .get(self.url(&format!("/tickets/{id}")))
      .send()
      .await
      .context("GET /tickets/:id failed")?;
    Self::decode("ticket", resp).await
  }

  /// `PATCH /api/tickets/:id`
  pub async fn update_title(&self, id: Uuid, title: &str) -> Result<Ticket> {
    let resp = self
      .client
      .patch(self.url(&format!("/tickets/{id}")))
      .json(&json!({ "title": title }))
      .send()
      .await
      .context("PATCH /tickets/:id failed")?;
    Self::decode("ticket", resp).await
  }

  /// `DELETE /api/tickets/:id`
  pub async fn delete_ticket(&self, id: Uuid) -> Result<()> {
    let resp = self
      .client
      .delete(self.url(&format!("/tickets/{id}")))
      .send()
      .await
      .context("DELETE /tickets/:id failed")?;
    if !resp.status().is_success() {
      return Err(anyhow!("DELETE /tickets/{id} → {}", resp.status()));
    }
    Ok(())
  }

  /// `POST /api/tickets/:id/touch`
  pub async fn touch(&self, id: Uuid) -> Result<Ticket> {
    let resp = self
      .client
      .post(self.url(&format!("/tickets/{id}/touch")))
      .send()
      .await
      .context("POST /tickets/:id/touch failed")?;
    Self::decode("ticket", resp).await
  }

  /// `PUT /api/tickets/:id/state`
  pub async fn change_state(
    &self,
    id: Uuid,
    state: &str,
    pending_time: Option<DateTime<Utc>>,
  ) -> Result<Ticket> {
    let resp = self
      .client
      .put(self.url(&format!("/tickets/{id}/state")))
      .json(&json!({ "state": state, "pending_time": pending_time }))
      .send()
      .await
      .context("PUT /tickets/:id/state failed")?;
    Self::decode("ticket", resp).await
  }

  /// `POST /api/tickets/:id/rebuild`
  pub async fn rebuild(&self, id: Uuid) -> Result<Ticket> {
    let resp = self
      .client
      .post(self.url(&format!("/tickets/{id}/rebuild")))
      .send()
      .await
      .context("POST /tickets/:id/rebuild failed")?;
    Self::decode("ticket", resp).await
  }

  /// `GET /api/latest-change`
  pub async fn latest_change(&self) -> Result<Option<DateTime<Utc>>> {
    let resp = self
      .client
      .get(self.url("/latest-change"))
      .send()
      .await
      .context("GET /latest-change failed")?;
    let body: Value = Self::decode("latest change", resp).await?;
    serde_json::from_value(body["latest_change"].clone()).context("parsing latest_change")
  }

  /// `GET /api/states`
  pub async fn states(&self) -> Result<Vec<TicketState>> {
    let resp = self
      .client
      .get(self.url("/states"))
      .send()
      .await
      .context("GET /states failed")?;
    Self::decode("states", resp).await
  }

  // ── Articles ──────────────────────────────────────────────────────────────

  /// `GET /api/tickets/:id/articles`
  pub async fn list_articles(&self, id: Uuid) -> Result<Vec<Article>> {
    let resp = self
      .client
      .get(self.url(&format!("/tickets/{id}/articles")))
      .send()
      .await
      .context("GET /tickets/:id/articles failed")?;
    Self::decode("articles", resp).await
  }

  /// `POST /api/tickets/:id/articles` with a pre-built JSON body.
  pub async fn append_article(&self, id: Uuid, body: &Value) -> Result<Article> {
    let resp = self
      .client
      .post(self.url(&format!("/tickets/{id}/articles")))
      .json(body)
      .send()
      .await
      .context("POST /tickets/:id/articles failed")?;
    Self::decode("article", resp).await
  }

  // ── Settings ──────────────────────────────────────────────────────────────

  /// `GET /api/settings`
  pub async fn settings(&self) -> Result<Value> {
    let resp = self
      .client
      .get(self.url("/settings"))
      .send()
      .await
      .context("GET /settings failed")?;
    Self::decode("settings", resp).await
  }

  /// `GET /api/settings/:name`: `{"name": ..., "value": ...}`, or an error
  /// carrying the server's 404 message.
  pub async fn get_setting(&self, name: &str) -> Result<Value> {
    let resp = self
      .client
      .get(self.url(&format!("/settings/{name}")))
      .send()
      .await
      .context("GET /settings/:name failed")?;
    Self::decode("setting", resp).await
  }

  /// `PUT /api/settings/:name`
  pub async fn set_setting(&self, name: &str, value: Value) -> Result<Value> {
    let resp = self
      .client
      .put(self.url(&format!("/settings/{name}")))
      .json(&json!({ "value": value }))
      .send()
      .await
      .context("PUT /settings/:name failed")?;
    Self::decode("setting", resp).await
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::Router;
  use desk_api::{ApiState, api_router};
  use desk_store_sqlite::SqliteStore;
  use tokio::net::TcpListener;

  use super::*;

  /// Serve a fresh API on an ephemeral port with `fqdn` already set.
  async fn serve() -> ApiClient {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let state = ApiState::new(Arc::new(store));
    state.settings.create("fqdn", json!("desk.local")).await.unwrap();

    let app = Router::new().nest("/api", api_router(state));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    ApiClient::new(format!("http://{addr}")).unwrap()
  }

  #[tokio::test]
  async fn get_setting_returns_named_value() {
    let client = serve().await;
    let setting = client.get_setting("fqdn").await.unwrap();
    assert_eq!(setting, json!({ "name": "fqdn", "value": "desk.local" }));
  }

  #[tokio::test]
  async fn get_setting_surfaces_not_found() {
    let client = serve().await;
    let err = client.get_setting("nope").await.unwrap_err().to_string();
    assert!(err.contains("404"), "error: {err}");
    assert!(err.contains("not found"), "error: {err}");
  }
}
