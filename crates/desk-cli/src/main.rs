//! `desk`: command-line client for the desk ticket server.
//!
//! # Usage
//!
//! ```text
//! desk --url http://localhost:3000 create "Printer on fire"
//! desk append <id> --from-customer --subject "still burning"
//! desk state <id> "pending reminder" --until 2025-01-01T09:00:00Z
//! desk --config ~/.config/desk/config.toml latest
//! ```
//!
//! Every command prints the server's JSON response.

mod client;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client::ApiClient;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "desk", about = "Command-line client for the desk ticket server")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the desk server (default: http://localhost:3000).
  #[arg(long, env = "DESK_URL")]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List all tickets.
  List,
  /// Open a new ticket.
  Create {
    title: String,
    /// Starting state; must be open-class.
    #[arg(long)]
    state: Option<String>,
  },
  /// Show a ticket, optionally with its articles.
  Show {
    id: Uuid,
    #[arg(long)]
    articles: bool,
  },
  /// Append an article. Defaults to an outbound agent reply.
  Append {
    id: Uuid,
    /// Inbound message from the customer.
    #[arg(long, conflicts_with = "internal")]
    from_customer: bool,
    /// Internal agent note; never counts as contact.
    #[arg(long)]
    internal: bool,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    body: Option<String>,
    /// Original send time, for imported messages.
    #[arg(long)]
    at: Option<DateTime<Utc>>,
  },
  /// Move a ticket to another state.
  State {
    id: Uuid,
    state: String,
    /// Reminder or auto-close time; required for pending states.
    #[arg(long)]
    until: Option<DateTime<Utc>>,
  },
  /// Bump a ticket's update time without changing anything else.
  Touch { id: Uuid },
  /// Rename a ticket.
  Title { id: Uuid, title: String },
  /// Delete a ticket and its articles.
  Delete { id: Uuid },
  /// Print the most recent update time across all tickets.
  Latest,
  /// Recompute a ticket's contact times from its article history.
  Rebuild { id: Uuid },
  /// Print the state catalog.
  States,
  /// Print all settings, or update one.
  Settings {
    name:  Option<String>,
    /// New value, parsed as JSON when possible.
    value: Option<String>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:3000".to_string());
  tracing::debug!(%base_url, "using server");

  let client = ApiClient::new(base_url)?;
  run(&client, args.command).await
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::List => print(&client.list_tickets().await?),
    Command::Create { title, state } => print(&client.create_ticket(&title, state.as_deref()).await?),
    Command::Show { id, articles } => {
      let ticket = client.get_ticket(id).await?;
      if articles {
        let articles = client.list_articles(id).await?;
        print(&json!({ "ticket": ticket, "articles": articles }))
      } else {
        print(&ticket)
      }
    }
    Command::Append { id, from_customer, internal, subject, body, at } => {
      let (sender_role, direction) = if from_customer {
        ("customer", "inbound")
      } else {
        ("agent", "outbound")
      };
      let article = json!({
        "sender_role": sender_role,
        "direction":   direction,
        "internal":    internal,
        "subject":     subject,
        "body":        body,
        "created_at":  at,
      });
      print(&client.append_article(id, &article).await?)
    }
    Command::State { id, state, until } => print(&client.change_state(id, &state, until).await?),
    Command::Touch { id } => print(&client.touch(id).await?),
    Command::Title { id, title } => print(&client.update_title(id, &title).await?),
    Command::Delete { id } => {
      client.delete_ticket(id).await?;
      tracing::info!(ticket = %id, "deleted");
      Ok(())
    }
    Command::Latest => print(&json!({ "latest_change": client.latest_change().await? })),
    Command::Rebuild { id } => print(&client.rebuild(id).await?),
    Command::States => print(&client.states().await?),
    Command::Settings { name: None, .. } => print(&client.settings().await?),
    Command::Settings { name: Some(name), value: None } => print(&client.get_setting(&name).await?),
    Command::Settings { name: Some(name), value: Some(raw) } => {
      print(&client.set_setting(&name, parse_value(&raw)).await?)
    }
  }
}

/// JSON if it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> Value {
  serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print<T: Serialize>(value: &T) -> Result<()> {
  let out = serde_json::to_string_pretty(value).context("serialising output")?;
  println!("{out}");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn values_parse_as_json_when_possible() {
    assert_eq!(parse_value("42"), json!(42));
    assert_eq!(parse_value("true"), json!(true));
    assert_eq!(parse_value("\"quoted\""), json!("quoted"));
    assert_eq!(parse_value("desk.example.com"), json!("desk.example.com"));
  }

  #[test]
  fn pending_state_takes_until() {
    let args = Args::try_parse_from([
      "desk",
      "state",
      "00000000-0000-0000-0000-000000000000",
      "pending reminder",
      "--until",
      "2025-01-01T09:00:00Z",
    ])
    .unwrap();
    match args.command {
      Command::State { state, until, .. } => {
        assert_eq!(state, "pending reminder");
        assert!(until.is_some());
      }
      other => panic!("unexpected command: {other:?}"),
    }
  }

  #[test]
  fn customer_and_internal_conflict() {
    let id = Uuid::nil().to_string();
    let result = Args::try_parse_from(["desk", "append", &id, "--from-customer", "--internal"]);
    assert!(result.is_err());
  }
}
