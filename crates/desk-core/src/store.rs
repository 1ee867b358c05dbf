//! The persistence traits the service depends on.
//!
//! Implemented by storage backends (e.g. `desk-store-sqlite`). The service
//! reads a ticket, derives its new fields, and commits the result through
//! these traits; backends never derive anything themselves.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  article::{Article, NewArticle},
  settings::Setting,
  ticket::Ticket,
};

// ─── Tickets ─────────────────────────────────────────────────────────────────

/// Abstraction over a ticket store backend.
///
/// Every write is atomic per ticket: either all fields of the passed
/// [`Ticket`] commit, or none do.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait TicketStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a newly created ticket.
  fn insert_ticket<'a>(
    &'a self,
    ticket: &'a Ticket,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Retrieve a ticket by UUID. Returns `None` if not found.
  fn get_ticket(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Ticket>, Self::Error>> + Send + '_;

  /// List all tickets, oldest first.
  fn list_tickets(
    &self,
  ) -> impl Future<Output = Result<Vec<Ticket>, Self::Error>> + Send + '_;

  /// Overwrite every mutable field of an existing ticket.
  ///
  /// Returns `false` if no ticket with that id exists.
  fn update_ticket<'a>(
    &'a self,
    ticket: &'a Ticket,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Insert an article and write the already-derived `ticket` in one
  /// transaction. The store assigns the article id.
  fn append_article<'a>(
    &'a self,
    input: NewArticle,
    created_at: DateTime<Utc>,
    ticket: &'a Ticket,
  ) -> impl Future<Output = Result<Article, Self::Error>> + Send + 'a;

  /// All articles of a ticket in `(created_at, article_id)` order.
  fn list_articles(
    &self,
    ticket_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Article>, Self::Error>> + Send + '_;

  /// Delete a ticket and all of its articles.
  ///
  /// Returns `false` if no ticket with that id exists.
  fn delete_ticket(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The greatest `updated_at` over all stored tickets.
  fn latest_change(
    &self,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// Storage for named configuration values.
pub trait SettingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All settings in insertion order.
  fn list_settings(
    &self,
  ) -> impl Future<Output = Result<Vec<Setting>, Self::Error>> + Send + '_;

  fn get_setting<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Setting>, Self::Error>> + Send + 'a;

  /// Create a setting; `initial_value` is recorded alongside `value`.
  ///
  /// Returns `None` without writing anything if `name` is already taken.
  fn insert_setting<'a>(
    &'a self,
    name: &'a str,
    value: serde_json::Value,
  ) -> impl Future<Output = Result<Option<Setting>, Self::Error>> + Send + 'a;

  /// Replace the current value. Returns `false` if the setting is missing.
  fn update_setting<'a>(
    &'a self,
    name: &'a str,
    value: serde_json::Value,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
