//! ETag computation for ticket resources.
//!
//! `updated_at` moves on every ticket mutation, so it plus the identity is
//! enough to tell two versions apart.

use desk_core::ticket::Ticket;
use sha2::{Digest, Sha256};

/// Compute a quoted strong ETag for `ticket`.
pub fn compute_etag(ticket: &Ticket) -> String {
  let mut hasher = Sha256::new();
  hasher.update(ticket.ticket_id.as_bytes());
  hasher.update(ticket.updated_at.timestamp().to_le_bytes());
  hasher.update(ticket.updated_at.timestamp_subsec_nanos().to_le_bytes());
  hasher.update(ticket.article_count.to_le_bytes());
  let hash = hasher.finalize();
  format!("\"{}\"", hex::encode(hash))
}

/// Compare two ETag header values, ignoring quotes and a weak prefix.
pub fn etags_match(a: &str, b: &str) -> bool {
  fn bare(s: &str) -> &str { s.trim().trim_start_matches("W/").trim_matches('"') }
  bare(a) == bare(b)
}

/// Whether an `If-None-Match` value matches the current `etag`: a bare `*`
/// matches any existing resource, otherwise any listed tag may match.
pub fn if_none_match(header: &str, etag: &str) -> bool {
  header.trim() == "*" || header.split(',').any(|candidate| etags_match(candidate, etag))
}
