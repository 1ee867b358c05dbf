//! [`SqliteStore`]: the SQLite implementation of [`TicketStore`] and
//! [`SettingStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use desk_core::{
  article::{Article, NewArticle},
  settings::Setting,
  store::{SettingStore, TicketStore},
  ticket::Ticket,
};

use crate::{
  Result,
  encode::{
    ARTICLE_COLUMNS, RawArticle, RawSetting, RawTicket, SETTING_COLUMNS, TICKET_COLUMNS,
    decode_dt, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Desk store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── TicketStore impl ────────────────────────────────────────────────────────

impl TicketStore for SqliteStore {
  type Error = crate::Error;

  async fn insert_ticket(&self, ticket: &Ticket) -> Result<()> {
    let raw = RawTicket::from_ticket(ticket);
    self
      .conn
      .call(move |conn| {
        raw.insert(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTicket> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_id = ?1"),
              rusqlite::params![id_str],
              RawTicket::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTicket::into_ticket).transpose()
  }

  async fn list_tickets(&self) -> Result<Vec<Ticket>> {
    let raws: Vec<RawTicket> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TICKET_COLUMNS} FROM tickets ORDER BY created_at, ticket_id"
        ))?;
        let rows = stmt
          .query_map([], RawTicket::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTicket::into_ticket).collect()
  }

  async fn update_ticket(&self, ticket: &Ticket) -> Result<bool> {
    let raw = RawTicket::from_ticket(ticket);
    let changed = self
      .conn
      .call(move |conn| Ok(raw.update(conn)?))
      .await?;
    Ok(changed > 0)
  }

  async fn append_article(
    &self,
    input: NewArticle,
    created_at: DateTime<Utc>,
    ticket: &Ticket,
  ) -> Result<Article> {
    // Build the stored form up front so normalisation matches what is read
    // back; the id is filled in once SQLite assigns it.
    let draft = input.into_article(0, created_at);
    let raw_ticket = RawTicket::from_ticket(ticket);
    let ticket_id_str = encode_uuid(draft.ticket_id);
    let sender_str = draft.sender_role.as_ref().to_owned();
    let direction_str = draft.direction.as_ref().to_owned();
    let internal = draft.internal;
    let from = draft.from.clone();
    let to = draft.to.clone();
    let subject = draft.subject.clone();
    let body = draft.body.clone();
    let at_str = encode_dt(created_at);

    let article_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO articles (
             ticket_id, sender_role, direction, internal,
             from_addr, to_addr, subject, body, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            ticket_id_str,
            sender_str,
            direction_str,
            internal,
            from,
            to,
            subject,
            body,
            at_str,
          ],
        )?;
        let article_id = tx.last_insert_rowid();
        if raw_ticket.update(&tx)? == 0 {
          // Dropping `tx` rolls the article back.
          return Err(rusqlite::Error::QueryReturnedNoRows.into());
        }
        tx.commit()?;
        Ok(article_id)
      })
      .await?;

    Ok(Article { article_id, ..draft })
  }

  async fn list_articles(&self, ticket_id: Uuid) -> Result<Vec<Article>> {
    let id_str = encode_uuid(ticket_id);

    let raws: Vec<RawArticle> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ARTICLE_COLUMNS} FROM articles
           WHERE ticket_id = ?1
           ORDER BY created_at, article_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawArticle::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawArticle::into_article).collect()
  }

  async fn delete_ticket(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM tickets WHERE ticket_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn latest_change(&self) -> Result<Option<DateTime<Utc>>> {
    let max: Option<String> = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT MAX(updated_at) FROM tickets", [], |r| r.get(0))?)
      })
      .await?;

    max.as_deref().map(decode_dt).transpose()
  }
}

// ─── SettingStore impl ───────────────────────────────────────────────────────

impl SettingStore for SqliteStore {
  type Error = crate::Error;

  async fn list_settings(&self) -> Result<Vec<Setting>> {
    let raws: Vec<RawSetting> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SETTING_COLUMNS} FROM settings ORDER BY setting_id"
        ))?;
        let rows = stmt
          .query_map([], RawSetting::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSetting::into_setting).collect()
  }

  async fn get_setting(&self, name: &str) -> Result<Option<Setting>> {
    let name = name.to_owned();
    let raw: Option<RawSetting> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SETTING_COLUMNS} FROM settings WHERE name = ?1"),
              rusqlite::params![name],
              RawSetting::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSetting::into_setting).transpose()
  }

  async fn insert_setting(
    &self,
    name: &str,
    value: serde_json::Value,
  ) -> Result<Option<Setting>> {
    let name_owned = name.to_owned();
    let value_str = value.to_string();

    let setting_id = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO settings (name, value_json, initial_json) VALUES (?1, ?2, ?2)
           ON CONFLICT(name) DO NOTHING",
          rusqlite::params![name_owned, value_str],
        )?;
        Ok((inserted > 0).then(|| conn.last_insert_rowid()))
      })
      .await?;

    Ok(setting_id.map(|setting_id| Setting {
      setting_id,
      name: name.to_owned(),
      initial_value: value.clone(),
      value,
    }))
  }

  async fn update_setting(&self, name: &str, value: serde_json::Value) -> Result<bool> {
    let name = name.to_owned();
    let value_str = value.to_string();
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE settings SET value_json = ?2 WHERE name = ?1",
          rusqlite::params![name, value_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }
}
