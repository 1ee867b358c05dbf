//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so that text order equals time order and `MAX()` /
//! `ORDER BY` work directly on the column. Enums use their lowercase names.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use desk_core::{
  article::{Article, Direction, SenderRole},
  settings::Setting,
  ticket::{StateKind, Ticket, TicketState},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Nanos, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Enums ────────────────────────────────────────────────────────────────────

fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::Decode { column, value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of a `tickets` row, in both directions.
pub struct RawTicket {
  pub ticket_id:             String,
  pub title:                 String,
  pub state_name:            String,
  pub state_kind:            String,
  pub article_count:         i64,
  pub last_contact:          Option<String>,
  pub last_contact_customer: Option<String>,
  pub last_contact_agent:    Option<String>,
  pub first_response:        Option<String>,
  pub close_time:            Option<String>,
  pub pending_time:          Option<String>,
  pub created_at:            String,
  pub updated_at:            String,
}

/// Column list matching the field order of [`RawTicket`].
pub const TICKET_COLUMNS: &str = "ticket_id, title, state_name, state_kind, article_count,
  last_contact, last_contact_customer, last_contact_agent, first_response,
  close_time, pending_time, created_at, updated_at";

impl RawTicket {
  pub fn from_ticket(t: &Ticket) -> Self {
    Self {
      ticket_id:             encode_uuid(t.ticket_id),
      title:                 t.title.clone(),
      state_name:            t.state.name.clone(),
      state_kind:            t.state.kind.as_ref().to_owned(),
      article_count:         t.article_count as i64,
      last_contact:          encode_opt_dt(t.last_contact),
      last_contact_customer: encode_opt_dt(t.last_contact_customer),
      last_contact_agent:    encode_opt_dt(t.last_contact_agent),
      first_response:        encode_opt_dt(t.first_response),
      close_time:            encode_opt_dt(t.close_time),
      pending_time:          encode_opt_dt(t.pending_time),
      created_at:            encode_dt(t.created_at),
      updated_at:            encode_dt(t.updated_at),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ticket_id:             row.get(0)?,
      title:                 row.get(1)?,
      state_name:            row.get(2)?,
      state_kind:            row.get(3)?,
      article_count:         row.get(4)?,
      last_contact:          row.get(5)?,
      last_contact_customer: row.get(6)?,
      last_contact_agent:    row.get(7)?,
      first_response:        row.get(8)?,
      close_time:            row.get(9)?,
      pending_time:          row.get(10)?,
      created_at:            row.get(11)?,
      updated_at:            row.get(12)?,
    })
  }

  pub fn into_ticket(self) -> Result<Ticket> {
    let article_count = u64::try_from(self.article_count).map_err(|_| Error::Decode {
      column: "article_count",
      value:  self.article_count.to_string(),
    })?;

    Ok(Ticket {
      ticket_id: decode_uuid(&self.ticket_id)?,
      title: self.title,
      state: TicketState {
        name: self.state_name,
        kind: decode_enum::<StateKind>("state_kind", &self.state_kind)?,
      },
      article_count,
      last_contact: decode_opt_dt(self.last_contact.as_deref())?,
      last_contact_customer: decode_opt_dt(self.last_contact_customer.as_deref())?,
      last_contact_agent: decode_opt_dt(self.last_contact_agent.as_deref())?,
      first_response: decode_opt_dt(self.first_response.as_deref())?,
      close_time: decode_opt_dt(self.close_time.as_deref())?,
      pending_time: decode_opt_dt(self.pending_time.as_deref())?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }

  /// Write every mutable column. Returns the number of rows changed.
  pub fn update(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "UPDATE tickets SET
         title = ?2, state_name = ?3, state_kind = ?4, article_count = ?5,
         last_contact = ?6, last_contact_customer = ?7, last_contact_agent = ?8,
         first_response = ?9, close_time = ?10, pending_time = ?11,
         updated_at = ?12
       WHERE ticket_id = ?1",
      rusqlite::params![
        self.ticket_id,
        self.title,
        self.state_name,
        self.state_kind,
        self.article_count,
        self.last_contact,
        self.last_contact_customer,
        self.last_contact_agent,
        self.first_response,
        self.close_time,
        self.pending_time,
        self.updated_at,
      ],
    )
  }

  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      &format!(
        "INSERT INTO tickets ({TICKET_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
      ),
      rusqlite::params![
        self.ticket_id,
        self.title,
        self.state_name,
        self.state_kind,
        self.article_count,
        self.last_contact,
        self.last_contact_customer,
        self.last_contact_agent,
        self.first_response,
        self.close_time,
        self.pending_time,
        self.created_at,
        self.updated_at,
      ],
    )
  }
}

/// Raw strings read directly from an `articles` row.
pub struct RawArticle {
  pub article_id:  i64,
  pub ticket_id:   String,
  pub sender_role: String,
  pub direction:   String,
  pub internal:    bool,
  pub from:        Option<String>,
  pub to:          Option<String>,
  pub subject:     Option<String>,
  pub body:        Option<String>,
  pub created_at:  String,
}

pub const ARTICLE_COLUMNS: &str = "article_id, ticket_id, sender_role, direction, internal,
  from_addr, to_addr, subject, body, created_at";

impl RawArticle {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      article_id:  row.get(0)?,
      ticket_id:   row.get(1)?,
      sender_role: row.get(2)?,
      direction:   row.get(3)?,
      internal:    row.get(4)?,
      from:        row.get(5)?,
      to:          row.get(6)?,
      subject:     row.get(7)?,
      body:        row.get(8)?,
      created_at:  row.get(9)?,
    })
  }

  pub fn into_article(self) -> Result<Article> {
    Ok(Article {
      article_id:  self.article_id,
      ticket_id:   decode_uuid(&self.ticket_id)?,
      sender_role: decode_enum::<SenderRole>("sender_role", &self.sender_role)?,
      direction:   decode_enum::<Direction>("direction", &self.direction)?,
      internal:    self.internal,
      from:        self.from,
      to:          self.to,
      subject:     self.subject,
      body:        self.body,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `settings` row.
pub struct RawSetting {
  pub setting_id:   i64,
  pub name:         String,
  pub value_json:   String,
  pub initial_json: String,
}

pub const SETTING_COLUMNS: &str = "setting_id, name, value_json, initial_json";

impl RawSetting {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      setting_id:   row.get(0)?,
      name:         row.get(1)?,
      value_json:   row.get(2)?,
      initial_json: row.get(3)?,
    })
  }

  pub fn into_setting(self) -> Result<Setting> {
    Ok(Setting {
      setting_id:    self.setting_id,
      name:          self.name,
      value:         serde_json::from_str(&self.value_json)?,
      initial_value: serde_json::from_str(&self.initial_json)?,
    })
  }
}
