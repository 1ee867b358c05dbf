//! Ticket: the aggregate root whose derived contact fields this crate
//! maintains.
//!
//! A ticket never stores its articles inline. Everything in [`Ticket`] beyond
//! identity, title and state is derived from the article history and the
//! state history by [`crate::derive`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── States ──────────────────────────────────────────────────────────────────

/// The class a named workflow state belongs to. Only the class matters to
/// timestamp derivation.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StateKind {
  Open,
  Pending,
  Closed,
}

/// A named workflow state, e.g. `"pending reminder"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketState {
  pub name: String,
  pub kind: StateKind,
}

impl TicketState {
  pub fn new(name: impl Into<String>, kind: StateKind) -> Self {
    Self { name: name.into(), kind }
  }

  pub fn is_pending(&self) -> bool { self.kind == StateKind::Pending }

  pub fn is_closed(&self) -> bool { self.kind == StateKind::Closed }
}

/// The set of states a ticket may be moved into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateCatalog {
  states:  Vec<TicketState>,
  /// Name of the state new tickets start in.
  initial: String,
}

impl Default for StateCatalog {
  fn default() -> Self {
    Self {
      states:  vec![
        TicketState::new("new", StateKind::Open),
        TicketState::new("open", StateKind::Open),
        TicketState::new("pending reminder", StateKind::Pending),
        TicketState::new("pending close", StateKind::Pending),
        TicketState::new("closed", StateKind::Closed),
        TicketState::new("merged", StateKind::Closed),
      ],
      initial: "new".to_owned(),
    }
  }
}

impl StateCatalog {
  /// Build a catalog from an explicit list. `initial` must name an open-class
  /// state in `states`.
  pub fn new(states: Vec<TicketState>, initial: impl Into<String>) -> Result<Self> {
    let catalog = Self { states, initial: initial.into() };
    let initial = catalog.get(&catalog.initial)?;
    if initial.kind != StateKind::Open {
      return Err(Error::InvalidStateTransition(format!(
        "initial state {:?} is not open-class",
        initial.name
      )));
    }
    Ok(catalog)
  }

  /// Look up a state by name.
  pub fn get(&self, name: &str) -> Result<&TicketState> {
    self
      .states
      .iter()
      .find(|s| s.name == name)
      .ok_or_else(|| Error::UnknownState(name.to_owned()))
  }

  pub fn initial(&self) -> Result<&TicketState> { self.get(&self.initial) }

  pub fn states(&self) -> &[TicketState] { &self.states }
}

// ─── Ticket ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
  pub ticket_id:             Uuid,
  pub title:                 String,
  pub state:                 TicketState,
  /// All articles ever attached, internal ones included.
  pub article_count:         u64,
  /// Most recent non-internal article of either direction.
  pub last_contact:          Option<DateTime<Utc>>,
  pub last_contact_customer: Option<DateTime<Utc>>,
  pub last_contact_agent:    Option<DateTime<Utc>>,
  /// Write-once; see [`crate::derive::on_article_appended`].
  pub first_response:        Option<DateTime<Utc>>,
  /// Time of the most recent transition into a closed-class state.
  pub close_time:            Option<DateTime<Utc>>,
  /// Only ever set while `state` is pending-class.
  pub pending_time:          Option<DateTime<Utc>>,
  pub created_at:            DateTime<Utc>,
  /// Bumped by every mutation, including a bare touch.
  pub updated_at:            DateTime<Utc>,
}

impl Ticket {
  /// A fresh ticket with no articles and no derived timestamps.
  pub fn new(
    ticket_id: Uuid,
    title: &str,
    state: TicketState,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      ticket_id,
      title: normalize_line(title),
      state,
      article_count: 0,
      last_contact: None,
      last_contact_customer: None,
      last_contact_agent: None,
      first_response: None,
      close_time: None,
      pending_time: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }
}

/// Input to [`crate::service::TicketService::create_ticket`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTicket {
  pub title: String,
  /// Starting state; defaults to the catalog's initial state.
  #[serde(default)]
  pub state: Option<String>,
}

impl NewTicket {
  pub fn new(title: impl Into<String>) -> Self {
    Self { title: title.into(), state: None }
  }
}

/// Collapse a value onto a single line: every CR and LF becomes a space.
/// Titles and article subjects are stored this way.
pub fn normalize_line(s: &str) -> String { s.replace(['\r', '\n'], " ") }

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn title_newlines_become_spaces() {
    assert_eq!(normalize_line("some title\n äöüß"), "some title  äöüß");
    assert_eq!(normalize_line("some\nnote"), "some note");
    assert_eq!(normalize_line("a\r\nb"), "a  b");
  }

  #[test]
  fn default_catalog_classes() {
    let catalog = StateCatalog::default();
    assert_eq!(catalog.initial().unwrap().name, "new");
    assert!(catalog.get("pending reminder").unwrap().is_pending());
    assert!(catalog.get("closed").unwrap().is_closed());
    assert!(matches!(
      catalog.get("archived"),
      Err(Error::UnknownState(name)) if name == "archived"
    ));
  }

  #[test]
  fn catalog_rejects_non_open_initial_state() {
    let result = StateCatalog::new(
      vec![TicketState::new("closed", StateKind::Closed)],
      "closed",
    );
    assert!(matches!(result, Err(Error::InvalidStateTransition(_))));
  }

  #[test]
  fn state_kind_string_forms() {
    assert_eq!(StateKind::Pending.as_ref(), "pending");
    assert_eq!(StateKind::from_str("closed").unwrap(), StateKind::Closed);
    assert!(StateKind::from_str("archived").is_err());
  }
}
