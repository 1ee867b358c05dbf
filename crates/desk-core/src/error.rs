//! Error types for `desk-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// An article was addressed to a ticket that does not exist.
  #[error("article references unknown ticket: {0}")]
  InvalidReference(Uuid),

  /// A pending time was supplied for a non-pending state, or omitted for a
  /// pending one.
  #[error("invalid state transition: {0}")]
  InvalidStateTransition(String),

  #[error(
    "article created at {article_at} precedes last contact at {last_contact}"
  )]
  OutOfOrderEvent {
    article_at:   DateTime<Utc>,
    last_contact: DateTime<Utc>,
  },

  #[error("ticket not found: {0}")]
  NotFound(Uuid),

  #[error("unknown ticket state: {0:?}")]
  UnknownState(String),

  #[error("setting not found: {0:?}")]
  SettingNotFound(String),

  #[error("setting already exists: {0:?}")]
  SettingExists(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a storage backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
