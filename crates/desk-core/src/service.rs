//! [`TicketService`]: the caller-facing ticket operations.
//!
//! Each operation that mutates a ticket runs under that ticket's lock, reads
//! the current record, derives the new fields with [`crate::derive`] and
//! commits the result in one store write. Operations on different tickets
//! never wait on each other.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
  Error, Result,
  article::{Article, NewArticle},
  clock::{Clock, SystemClock},
  derive,
  store::TicketStore,
  ticket::{NewTicket, StateCatalog, StateKind, Ticket, normalize_line},
};

// ─── Lock table ──────────────────────────────────────────────────────────────

/// One async mutex per ticket id, created on first use and dropped again once
/// nobody holds or waits on it.
#[derive(Default)]
struct TicketLocks {
  inner: std::sync::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Holds a ticket's lock; removes the table entry on drop if it was the last
/// user.
struct TicketGuard<'a> {
  locks: &'a TicketLocks,
  id:    Uuid,
  guard: Option<OwnedMutexGuard<()>>,
}

impl TicketLocks {
  async fn acquire(&self, id: Uuid) -> TicketGuard<'_> {
    let lock = {
      let mut table = self.table();
      Arc::clone(table.entry(id).or_default())
    };
    TicketGuard { locks: self, id, guard: Some(lock.lock_owned().await) }
  }

  fn table(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<Mutex<()>>>> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  #[cfg(test)]
  fn len(&self) -> usize { self.table().len() }
}

impl Drop for TicketGuard<'_> {
  fn drop(&mut self) {
    // Release the mutex first so its Arc no longer counts as a user.
    drop(self.guard.take());
    let mut table = self.locks.table();
    if table.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
      table.remove(&self.id);
    }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct TicketService<S> {
  store:   Arc<S>,
  clock:   Arc<dyn Clock>,
  catalog: StateCatalog,
  locks:   TicketLocks,
}

impl<S: TicketStore> TicketService<S> {
  /// A service using the system clock and the default state catalog.
  pub fn new(store: Arc<S>) -> Self {
    Self::with_parts(store, Arc::new(SystemClock::new()), StateCatalog::default())
  }

  pub fn with_parts(store: Arc<S>, clock: Arc<dyn Clock>, catalog: StateCatalog) -> Self {
    Self { store, clock, catalog, locks: TicketLocks::default() }
  }

  pub fn catalog(&self) -> &StateCatalog { &self.catalog }

  pub fn store(&self) -> &Arc<S> { &self.store }

  async fn load(&self, id: Uuid) -> Result<Ticket> {
    self
      .store
      .get_ticket(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound(id))
  }

  async fn commit(&self, ticket: &Ticket) -> Result<()> {
    let found = self.store.update_ticket(ticket).await.map_err(Error::store)?;
    if !found {
      return Err(Error::NotFound(ticket.ticket_id));
    }
    Ok(())
  }

  // ── Tickets ───────────────────────────────────────────────────────────────

  /// Create a ticket with no articles.
  pub async fn create_ticket(&self, input: NewTicket) -> Result<Ticket> {
    let state = match &input.state {
      Some(name) => self.catalog.get(name)?,
      None => self.catalog.initial()?,
    };
    if state.kind != StateKind::Open {
      return Err(Error::InvalidStateTransition(format!(
        "tickets cannot be created in {} state {:?}",
        state.kind, state.name
      )));
    }

    let ticket = Ticket::new(Uuid::new_v4(), &input.title, state.clone(), self.clock.now());
    self.store.insert_ticket(&ticket).await.map_err(Error::store)?;
    tracing::info!(ticket_id = %ticket.ticket_id, state = %ticket.state.name, "ticket created");
    Ok(ticket)
  }

  pub async fn get_ticket(&self, id: Uuid) -> Result<Ticket> { self.load(id).await }

  pub async fn list_tickets(&self) -> Result<Vec<Ticket>> {
    self.store.list_tickets().await.map_err(Error::store)
  }

  /// Replace the title. Counts as a change for [`Self::latest_change`].
  pub async fn update_title(&self, id: Uuid, title: &str) -> Result<Ticket> {
    let _guard = self.locks.acquire(id).await;
    let mut ticket = self.load(id).await?;
    ticket.title = normalize_line(title);
    ticket.touch(self.clock.now());
    self.commit(&ticket).await?;
    Ok(ticket)
  }

  /// Bump `updated_at` without changing anything else.
  pub async fn touch(&self, id: Uuid) -> Result<Ticket> {
    let _guard = self.locks.acquire(id).await;
    let mut ticket = self.load(id).await?;
    ticket.touch(self.clock.now());
    self.commit(&ticket).await?;
    Ok(ticket)
  }

  /// Delete a ticket together with its articles.
  pub async fn destroy_ticket(&self, id: Uuid) -> Result<()> {
    let _guard = self.locks.acquire(id).await;
    let found = self.store.delete_ticket(id).await.map_err(Error::store)?;
    if !found {
      return Err(Error::NotFound(id));
    }
    tracing::info!(ticket_id = %id, "ticket destroyed");
    Ok(())
  }

  // ── Articles ──────────────────────────────────────────────────────────────

  /// Append an article and fold it into the ticket's contact fields.
  ///
  /// The article is stamped with the clock unless `input.created_at` is set.
  pub async fn append_article(&self, input: NewArticle) -> Result<Article> {
    let ticket_id = input.ticket_id;
    let _guard = self.locks.acquire(ticket_id).await;
    let mut ticket = self
      .store
      .get_ticket(ticket_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::InvalidReference(ticket_id))?;

    let now = self.clock.now();
    let created_at = input.created_at.unwrap_or(now);
    derive::on_article_appended(&mut ticket, &input.event(created_at))?;
    ticket.touch(now);

    let article = self
      .store
      .append_article(input, created_at, &ticket)
      .await
      .map_err(Error::store)?;
    tracing::debug!(
      %ticket_id,
      article_id = article.article_id,
      direction = %article.direction,
      internal = article.internal,
      article_count = ticket.article_count,
      "article appended"
    );
    Ok(article)
  }

  pub async fn list_articles(&self, ticket_id: Uuid) -> Result<Vec<Article>> {
    self.load(ticket_id).await?;
    self.store.list_articles(ticket_id).await.map_err(Error::store)
  }

  // ── State ─────────────────────────────────────────────────────────────────

  /// Move a ticket into the named state.
  pub async fn change_state(
    &self,
    id: Uuid,
    state: &str,
    pending_time: Option<DateTime<Utc>>,
  ) -> Result<Ticket> {
    let new_state = self.catalog.get(state)?;
    let _guard = self.locks.acquire(id).await;
    let mut ticket = self.load(id).await?;

    let now = self.clock.now();
    let from = ticket.state.name.clone();
    derive::on_state_changed(&mut ticket, new_state, pending_time, now)?;
    ticket.touch(now);
    self.commit(&ticket).await?;

    tracing::info!(ticket_id = %id, %from, to = %ticket.state.name, "ticket state changed");
    Ok(ticket)
  }

  // ── Aggregates and maintenance ────────────────────────────────────────────

  /// The most recent change to any live ticket.
  pub async fn latest_change(&self) -> Result<Option<DateTime<Utc>>> {
    self.store.latest_change().await.map_err(Error::store)
  }

  /// Recompute the article-derived fields from the stored history.
  ///
  /// `updated_at` only moves if the rebuild actually changed something.
  pub async fn rebuild_contact_times(&self, id: Uuid) -> Result<Ticket> {
    let _guard = self.locks.acquire(id).await;
    let ticket = self.load(id).await?;
    let articles = self.store.list_articles(id).await.map_err(Error::store)?;

    let mut rebuilt = derive::replay(&ticket, &articles)?;
    if derive::query(&rebuilt) == derive::query(&ticket) {
      return Ok(ticket);
    }
    rebuilt.touch(self.clock.now());
    self.commit(&rebuilt).await?;
    tracing::warn!(ticket_id = %id, "contact times rebuilt from article history");
    Ok(rebuilt)
  }
}
