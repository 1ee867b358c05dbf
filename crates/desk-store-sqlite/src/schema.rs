//! SQL schema for the Desk SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Derived columns are written only by the service, always all together.
CREATE TABLE IF NOT EXISTS tickets (
    ticket_id             TEXT PRIMARY KEY,
    title                 TEXT NOT NULL,
    state_name            TEXT NOT NULL,
    state_kind            TEXT NOT NULL,   -- 'open' | 'pending' | 'closed'
    article_count         INTEGER NOT NULL DEFAULT 0,
    last_contact          TEXT,
    last_contact_customer TEXT,
    last_contact_agent    TEXT,
    first_response        TEXT,
    close_time            TEXT,
    pending_time          TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

-- Articles are append-only; rows leave only through the ticket cascade.
CREATE TABLE IF NOT EXISTS articles (
    article_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id   TEXT NOT NULL REFERENCES tickets(ticket_id) ON DELETE CASCADE,
    sender_role TEXT NOT NULL,   -- 'customer' | 'agent' | 'system'
    direction   TEXT NOT NULL,   -- 'inbound' | 'outbound'
    internal    INTEGER NOT NULL,
    from_addr   TEXT,
    to_addr     TEXT,
    subject     TEXT,
    body        TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    setting_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL UNIQUE,
    value_json    TEXT NOT NULL,
    initial_json  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS articles_ticket_idx  ON articles(ticket_id, created_at, article_id);
CREATE INDEX IF NOT EXISTS tickets_updated_idx  ON tickets(updated_at);

PRAGMA user_version = 1;
";
