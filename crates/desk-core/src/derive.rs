//! Derivation of a ticket's contact and response timestamps.
//!
//! Every function here is pure: it reads and writes a [`Ticket`] value and
//! never touches storage or a clock. Each mutating function validates its
//! input completely before changing any field, so a returned error always
//! means the ticket is untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  article::{Article, ArticleEvent, Direction},
  ticket::{Ticket, TicketState},
};

/// Snapshot of the derived fields of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactTimes {
  pub article_count:         u64,
  pub last_contact:          Option<DateTime<Utc>>,
  pub last_contact_customer: Option<DateTime<Utc>>,
  pub last_contact_agent:    Option<DateTime<Utc>>,
  pub first_response:        Option<DateTime<Utc>>,
  pub close_time:            Option<DateTime<Utc>>,
  pub pending_time:          Option<DateTime<Utc>>,
}

/// Fold one appended article into the ticket's derived fields.
///
/// `article_count` always increments. Internal articles stop there. Anything
/// else moves `last_contact` and the per-direction contact time; an outbound
/// article additionally sets `first_response` if it is still unset and the
/// customer has already been heard from.
pub fn on_article_appended(ticket: &mut Ticket, article: &ArticleEvent) -> Result<()> {
  if article.ticket_id != ticket.ticket_id {
    return Err(Error::InvalidReference(article.ticket_id));
  }
  if let Some(last_contact) = ticket.last_contact
    && article.created_at < last_contact
  {
    return Err(Error::OutOfOrderEvent {
      article_at: article.created_at,
      last_contact,
    });
  }

  ticket.article_count += 1;
  if article.internal {
    return Ok(());
  }

  ticket.last_contact = Some(article.created_at);
  match article.direction {
    Direction::Inbound => {
      ticket.last_contact_customer = Some(article.created_at);
    }
    Direction::Outbound => {
      ticket.last_contact_agent = Some(article.created_at);
      if ticket.first_response.is_none() && ticket.last_contact_customer.is_some() {
        ticket.first_response = Some(article.created_at);
      }
    }
  }
  Ok(())
}

/// Move the ticket into `new_state` at `now`.
///
/// A pending-class target requires `pending_time`; any other target rejects
/// it. Entering a closed-class state stamps `close_time`, replacing any
/// earlier close. Leaving pending-class always clears `pending_time`.
pub fn on_state_changed(
  ticket: &mut Ticket,
  new_state: &TicketState,
  pending_time: Option<DateTime<Utc>>,
  now: DateTime<Utc>,
) -> Result<()> {
  match (new_state.is_pending(), pending_time) {
    (true, None) => {
      return Err(Error::InvalidStateTransition(format!(
        "state {:?} requires a pending time",
        new_state.name
      )));
    }
    (false, Some(_)) => {
      return Err(Error::InvalidStateTransition(format!(
        "state {:?} does not take a pending time",
        new_state.name
      )));
    }
    _ => {}
  }

  ticket.state = new_state.clone();
  if new_state.is_closed() {
    ticket.close_time = Some(now);
  }
  ticket.pending_time = if new_state.is_pending() { pending_time } else { None };
  Ok(())
}

/// Read the derived fields.
pub fn query(ticket: &Ticket) -> ContactTimes {
  ContactTimes {
    article_count:         ticket.article_count,
    last_contact:          ticket.last_contact,
    last_contact_customer: ticket.last_contact_customer,
    last_contact_agent:    ticket.last_contact_agent,
    first_response:        ticket.first_response,
    close_time:            ticket.close_time,
    pending_time:          ticket.pending_time,
  }
}

/// The most recent `updated_at` across `tickets`, if any.
pub fn latest_change<'a>(
  tickets: impl IntoIterator<Item = &'a Ticket>,
) -> Option<DateTime<Utc>> {
  tickets.into_iter().map(|t| t.updated_at).max()
}

/// Recompute the article-derived fields of `ticket` from its full history.
///
/// Articles are applied in `(created_at, article_id)` order regardless of the
/// order given. State, `close_time` and `pending_time` are carried over from
/// `ticket` unchanged since they do not depend on articles.
pub fn replay(ticket: &Ticket, articles: &[Article]) -> Result<Ticket> {
  let mut ordered: Vec<&Article> = articles.iter().collect();
  ordered.sort_by_key(|a| (a.created_at, a.article_id));

  let mut rebuilt = Ticket {
    article_count: 0,
    last_contact: None,
    last_contact_customer: None,
    last_contact_agent: None,
    first_response: None,
    ..ticket.clone()
  };
  for article in ordered {
    on_article_appended(&mut rebuilt, &article.event())?;
  }
  Ok(rebuilt)
}
