//! Articles: the append-only message and note events attached to a ticket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::ticket::normalize_line;

/// Who authored an article.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SenderRole {
  Customer,
  Agent,
  System,
}

/// Direction relative to the customer.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
  /// Sent by the customer, or by a channel on the customer's behalf.
  Inbound,
  /// Sent by an agent toward the customer.
  Outbound,
}

/// A stored article. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
  /// Store-assigned; strictly increasing in insertion order.
  pub article_id:  i64,
  pub ticket_id:   Uuid,
  pub sender_role: SenderRole,
  pub direction:   Direction,
  /// Notes invisible to the customer.
  pub internal:    bool,
  pub from:        Option<String>,
  pub to:          Option<String>,
  pub subject:     Option<String>,
  pub body:        Option<String>,
  pub created_at:  DateTime<Utc>,
}

impl Article {
  /// The subset of this article that timestamp derivation looks at.
  pub fn event(&self) -> ArticleEvent {
    ArticleEvent {
      ticket_id:  self.ticket_id,
      direction:  self.direction,
      internal:   self.internal,
      created_at: self.created_at,
    }
  }
}

/// What [`crate::derive`] needs to know about an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleEvent {
  pub ticket_id:  Uuid,
  pub direction:  Direction,
  pub internal:   bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::service::TicketService::append_article`].
///
/// `created_at` may be supplied for imported messages; otherwise the service
/// stamps the article from its clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
  pub ticket_id:   Uuid,
  pub sender_role: SenderRole,
  pub direction:   Direction,
  #[serde(default)]
  pub internal:    bool,
  #[serde(default)]
  pub from:        Option<String>,
  #[serde(default)]
  pub to:          Option<String>,
  #[serde(default)]
  pub subject:     Option<String>,
  #[serde(default)]
  pub body:        Option<String>,
  #[serde(default)]
  pub created_at:  Option<DateTime<Utc>>,
}

impl NewArticle {
  /// Convenience constructor with content fields empty.
  pub fn new(ticket_id: Uuid, sender_role: SenderRole, direction: Direction) -> Self {
    Self {
      ticket_id,
      sender_role,
      direction,
      internal: false,
      from: None,
      to: None,
      subject: None,
      body: None,
      created_at: None,
    }
  }

  /// A customer message.
  pub fn inbound(ticket_id: Uuid) -> Self {
    Self::new(ticket_id, SenderRole::Customer, Direction::Inbound)
  }

  /// An agent reply to the customer.
  pub fn outbound(ticket_id: Uuid) -> Self {
    Self::new(ticket_id, SenderRole::Agent, Direction::Outbound)
  }

  /// An internal agent note.
  pub fn note(ticket_id: Uuid) -> Self {
    Self {
      internal: true,
      ..Self::new(ticket_id, SenderRole::Agent, Direction::Outbound)
    }
  }

  pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
    self.created_at = Some(created_at);
    self
  }

  pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
    self.subject = Some(subject.into());
    self
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = Some(body.into());
    self
  }

  /// Build the stored form once the store has assigned an id.
  pub fn into_article(self, article_id: i64, created_at: DateTime<Utc>) -> Article {
    Article {
      article_id,
      ticket_id: self.ticket_id,
      sender_role: self.sender_role,
      direction: self.direction,
      internal: self.internal,
      from: self.from,
      to: self.to,
      subject: self.subject.as_deref().map(normalize_line),
      body: self.body,
      created_at,
    }
  }

  pub fn event(&self, created_at: DateTime<Utc>) -> ArticleEvent {
    ArticleEvent {
      ticket_id: self.ticket_id,
      direction: self.direction,
      internal: self.internal,
      created_at,
    }
  }
}
