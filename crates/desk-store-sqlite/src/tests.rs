//! Integration tests for `SqliteStore` against an in-memory database, on its
//! own and driven through `TicketService`.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use desk_core::{
  Error as CoreError,
  article::{Direction, NewArticle, SenderRole},
  clock::{Clock as _, ManualClock},
  service::TicketService,
  settings::SettingsCache,
  store::{SettingStore, TicketStore},
  ticket::{NewTicket, StateCatalog, Ticket},
};
use serde_json::json;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() }

async fn service() -> (TicketService<SqliteStore>, Arc<ManualClock>) {
  let clock = Arc::new(ManualClock::new(t0()));
  let svc = TicketService::with_parts(
    Arc::new(store().await),
    clock.clone(),
    StateCatalog::default(),
  );
  (svc, clock)
}

fn sample_ticket(title: &str) -> Ticket {
  let state = StateCatalog::default().initial().unwrap().clone();
  Ticket::new(Uuid::new_v4(), title, state, t0())
}

// ─── Tickets ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_ticket() {
  let s = store().await;
  let ticket = sample_ticket("printer on fire");
  s.insert_ticket(&ticket).await.unwrap();

  let fetched = s.get_ticket(ticket.ticket_id).await.unwrap();
  assert_eq!(fetched, Some(ticket));
}

#[tokio::test]
async fn get_ticket_missing_returns_none() {
  let s = store().await;
  let result = s.get_ticket(Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn update_ticket_roundtrips_every_derived_field() {
  let s = store().await;
  let mut ticket = sample_ticket("roundtrip");
  s.insert_ticket(&ticket).await.unwrap();

  ticket.article_count = 4;
  ticket.last_contact = Some(t0() + Duration::seconds(1));
  ticket.last_contact_customer = Some(t0() + Duration::nanoseconds(1_500));
  ticket.last_contact_agent = Some(t0() + Duration::seconds(1));
  ticket.first_response = Some(t0() + Duration::seconds(1));
  ticket.close_time = Some(t0() + Duration::minutes(2));
  ticket.state = StateCatalog::default().get("closed").unwrap().clone();
  ticket.updated_at = t0() + Duration::minutes(2);
  assert!(s.update_ticket(&ticket).await.unwrap());

  let fetched = s.get_ticket(ticket.ticket_id).await.unwrap().unwrap();
  assert_eq!(fetched, ticket);
}

#[tokio::test]
async fn update_missing_ticket_reports_false() {
  let s = store().await;
  assert!(!s.update_ticket(&sample_ticket("ghost")).await.unwrap());
}

#[tokio::test]
async fn delete_cascades_to_articles() {
  let s = store().await;
  let mut ticket = sample_ticket("doomed");
  s.insert_ticket(&ticket).await.unwrap();
  ticket.article_count = 1;
  s.append_article(NewArticle::inbound(ticket.ticket_id), t0(), &ticket)
    .await
    .unwrap();

  assert!(s.delete_ticket(ticket.ticket_id).await.unwrap());
  assert!(s.get_ticket(ticket.ticket_id).await.unwrap().is_none());
  assert!(s.list_articles(ticket.ticket_id).await.unwrap().is_empty());
  assert!(!s.delete_ticket(ticket.ticket_id).await.unwrap());
}

#[tokio::test]
async fn append_article_rolls_back_when_ticket_is_missing() {
  let s = store().await;
  let ghost = sample_ticket("ghost");
  let result = s
    .append_article(NewArticle::inbound(ghost.ticket_id), t0(), &ghost)
    .await;
  assert!(result.is_err());
  assert!(s.list_articles(ghost.ticket_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn articles_come_back_in_creation_order() {
  let s = store().await;
  let ticket = sample_ticket("ordering");
  s.insert_ticket(&ticket).await.unwrap();

  let later = t0() + Duration::seconds(5);
  let a = s
    .append_article(NewArticle::inbound(ticket.ticket_id), later, &ticket)
    .await
    .unwrap();
  let b = s
    .append_article(NewArticle::outbound(ticket.ticket_id), t0(), &ticket)
    .await
    .unwrap();
  let c = s
    .append_article(NewArticle::note(ticket.ticket_id), later, &ticket)
    .await
    .unwrap();
  assert!(a.article_id < b.article_id && b.article_id < c.article_id);

  let ids: Vec<i64> = s
    .list_articles(ticket.ticket_id)
    .await
    .unwrap()
    .into_iter()
    .map(|a| a.article_id)
    .collect();
  assert_eq!(ids, vec![b.article_id, a.article_id, c.article_id]);
}

#[tokio::test]
async fn latest_change_empty_store_is_none() {
  let s = store().await;
  assert_eq!(s.latest_change().await.unwrap(), None);
}

// ─── Service ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ticket_lifecycle_derives_contact_times() {
  let (svc, clock) = service().await;

  let ticket = svc
    .create_ticket(NewTicket::new("some title\n äöüß"))
    .await
    .unwrap();
  assert_eq!(ticket.title, "some title  äöüß");
  assert_eq!(ticket.state.name, "new");

  // inbound
  clock.advance(Duration::seconds(1));
  let inbound = svc
    .append_article(
      NewArticle::inbound(ticket.ticket_id)
        .with_subject("some subject")
        .with_body("some message article_inbound 😍😍😍"),
    )
    .await
    .unwrap();
  assert_eq!(inbound.body.as_deref(), Some("some message article_inbound 😍😍😍"));

  let tk = svc.get_ticket(ticket.ticket_id).await.unwrap();
  assert_eq!(tk.article_count, 1);
  assert_eq!(tk.last_contact, Some(inbound.created_at));
  assert_eq!(tk.last_contact_customer, Some(inbound.created_at));
  assert_eq!(tk.last_contact_agent, None);
  assert_eq!(tk.first_response, None);
  assert_eq!(tk.close_time, None);

  // note
  let note = svc
    .append_article(
      NewArticle::note(ticket.ticket_id)
        .with_subject("some\nnote")
        .with_body("some\n message"),
    )
    .await
    .unwrap();
  assert_eq!(note.subject.as_deref(), Some("some note"));
  assert_eq!(note.body.as_deref(), Some("some\n message"));

  let tk = svc.get_ticket(ticket.ticket_id).await.unwrap();
  assert_eq!(tk.article_count, 2);
  assert_eq!(tk.last_contact, Some(inbound.created_at));
  assert_eq!(tk.last_contact_agent, None);
  assert_eq!(tk.first_response, None);

  // outbound
  clock.advance(Duration::seconds(10));
  let outbound = svc
    .append_article(NewArticle::outbound(ticket.ticket_id))
    .await
    .unwrap();

  let tk = svc.get_ticket(ticket.ticket_id).await.unwrap();
  assert_eq!(tk.article_count, 3);
  assert_eq!(tk.last_contact, Some(outbound.created_at));
  assert_eq!(tk.last_contact_customer, Some(inbound.created_at));
  assert_eq!(tk.last_contact_agent, Some(outbound.created_at));
  assert_eq!(tk.first_response, Some(outbound.created_at));
  assert_eq!(tk.close_time, None);

  // close
  clock.advance(Duration::seconds(10));
  let closed_at = clock.now();
  let tk = svc
    .change_state(ticket.ticket_id, "closed", None)
    .await
    .unwrap();
  assert_eq!(tk.article_count, 3);
  assert_eq!(tk.close_time, Some(closed_at));
  assert_eq!(tk.first_response, Some(outbound.created_at));

  // pending
  let remind_at = Utc.with_ymd_and_hms(1977, 10, 27, 22, 0, 0).unwrap();
  clock.advance(Duration::seconds(10));
  svc
    .change_state(ticket.ticket_id, "pending reminder", Some(remind_at))
    .await
    .unwrap();
  let tk = svc.get_ticket(ticket.ticket_id).await.unwrap();
  assert_eq!(tk.state.name, "pending reminder");
  assert_eq!(tk.pending_time, Some(remind_at));

  // close again
  clock.advance(Duration::seconds(10));
  let reclosed_at = clock.now();
  svc
    .change_state(ticket.ticket_id, "closed", None)
    .await
    .unwrap();
  let tk = svc.get_ticket(ticket.ticket_id).await.unwrap();
  assert_eq!(tk.state.name, "closed");
  assert_eq!(tk.pending_time, None);
  assert_eq!(tk.close_time, Some(reclosed_at));

  svc.destroy_ticket(ticket.ticket_id).await.unwrap();
  assert!(matches!(
    svc.get_ticket(ticket.ticket_id).await,
    Err(CoreError::NotFound(id)) if id == ticket.ticket_id
  ));
}

#[tokio::test]
async fn latest_change_follows_updates_and_destruction() {
  let (svc, clock) = service().await;

  let first = svc.create_ticket(NewTicket::new("latest change 1")).await.unwrap();
  assert_eq!(svc.latest_change().await.unwrap(), Some(first.updated_at));

  clock.advance(Duration::seconds(1));
  let second = svc.create_ticket(NewTicket::new("latest change 2")).await.unwrap();
  assert_eq!(svc.latest_change().await.unwrap(), Some(second.updated_at));

  clock.advance(Duration::seconds(1));
  let retitled = svc
    .update_title(first.ticket_id, "latest change 1 - 1")
    .await
    .unwrap();
  assert_eq!(svc.latest_change().await.unwrap(), Some(retitled.updated_at));

  clock.advance(Duration::seconds(1));
  let touched = svc.touch(first.ticket_id).await.unwrap();
  assert!(touched.updated_at > retitled.updated_at);
  assert_eq!(svc.latest_change().await.unwrap(), Some(touched.updated_at));

  svc.destroy_ticket(first.ticket_id).await.unwrap();
  assert_eq!(svc.latest_change().await.unwrap(), Some(second.updated_at));

  svc.destroy_ticket(second.ticket_id).await.unwrap();
  assert_eq!(svc.latest_change().await.unwrap(), None);
}

#[tokio::test]
async fn article_for_missing_ticket_is_invalid_reference() {
  let (svc, _clock) = service().await;
  let id = Uuid::new_v4();
  let err = svc.append_article(NewArticle::inbound(id)).await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidReference(got) if got == id));
}

#[tokio::test]
async fn rejected_operations_leave_ticket_unchanged() {
  let (svc, clock) = service().await;
  let ticket = svc.create_ticket(NewTicket::new("strict")).await.unwrap();

  clock.advance(Duration::minutes(5));
  svc
    .append_article(NewArticle::inbound(ticket.ticket_id))
    .await
    .unwrap();
  let before = svc.get_ticket(ticket.ticket_id).await.unwrap();

  clock.advance(Duration::minutes(5));
  let stale = NewArticle::outbound(ticket.ticket_id).at(t0());
  assert!(matches!(
    svc.append_article(stale).await,
    Err(CoreError::OutOfOrderEvent { .. })
  ));
  assert!(matches!(
    svc.change_state(ticket.ticket_id, "pending close", None).await,
    Err(CoreError::InvalidStateTransition(_))
  ));
  assert!(matches!(
    svc.change_state(ticket.ticket_id, "open", Some(t0())).await,
    Err(CoreError::InvalidStateTransition(_))
  ));
  assert!(matches!(
    svc.change_state(ticket.ticket_id, "archived", None).await,
    Err(CoreError::UnknownState(_))
  ));

  assert_eq!(svc.get_ticket(ticket.ticket_id).await.unwrap(), before);
  assert_eq!(svc.list_articles(ticket.ticket_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn tickets_cannot_start_pending_or_closed() {
  let (svc, _clock) = service().await;
  let input = NewTicket {
    title: "born closed".into(),
    state: Some("closed".into()),
  };
  assert!(matches!(
    svc.create_ticket(input).await,
    Err(CoreError::InvalidStateTransition(_))
  ));
  assert!(svc.list_tickets().await.unwrap().is_empty());
}

#[tokio::test]
async fn operations_on_destroyed_ticket_are_not_found() {
  let (svc, _clock) = service().await;
  let ticket = svc.create_ticket(NewTicket::new("gone")).await.unwrap();
  svc.destroy_ticket(ticket.ticket_id).await.unwrap();

  let id = ticket.ticket_id;
  assert!(matches!(svc.touch(id).await, Err(CoreError::NotFound(_))));
  assert!(matches!(
    svc.change_state(id, "open", None).await,
    Err(CoreError::NotFound(_))
  ));
  assert!(matches!(svc.destroy_ticket(id).await, Err(CoreError::NotFound(_))));
  assert!(matches!(svc.list_articles(id).await, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn concurrent_replies_set_first_response_once() {
  let (svc, clock) = service().await;
  let svc = Arc::new(svc);
  let ticket = svc.create_ticket(NewTicket::new("busy")).await.unwrap();
  svc
    .append_article(NewArticle::inbound(ticket.ticket_id))
    .await
    .unwrap();
  clock.advance(Duration::seconds(1));

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let svc = Arc::clone(&svc);
      let id = ticket.ticket_id;
      tokio::spawn(async move { svc.append_article(NewArticle::outbound(id)).await })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let tk = svc.get_ticket(ticket.ticket_id).await.unwrap();
  assert_eq!(tk.article_count, 9);
  assert_eq!(tk.first_response, Some(t0() + Duration::seconds(1)));
  assert_eq!(svc.list_articles(ticket.ticket_id).await.unwrap().len(), 9);
}

#[tokio::test]
async fn rebuild_restores_drifted_contact_times() {
  let (svc, clock) = service().await;
  let ticket = svc.create_ticket(NewTicket::new("drift")).await.unwrap();

  clock.advance(Duration::seconds(1));
  let inbound = svc
    .append_article(NewArticle::inbound(ticket.ticket_id))
    .await
    .unwrap();
  clock.advance(Duration::seconds(1));
  let reply = svc
    .append_article(NewArticle::new(
      ticket.ticket_id,
      SenderRole::Agent,
      Direction::Outbound,
    ))
    .await
    .unwrap();

  let untouched = svc.rebuild_contact_times(ticket.ticket_id).await.unwrap();
  let current = svc.get_ticket(ticket.ticket_id).await.unwrap();
  assert_eq!(untouched, current);

  let mut drifted = current.clone();
  drifted.article_count = 40;
  drifted.first_response = None;
  assert!(svc.store().update_ticket(&drifted).await.unwrap());

  clock.advance(Duration::seconds(1));
  let rebuilt = svc.rebuild_contact_times(ticket.ticket_id).await.unwrap();
  assert_eq!(rebuilt.article_count, 2);
  assert_eq!(rebuilt.last_contact_customer, Some(inbound.created_at));
  assert_eq!(rebuilt.first_response, Some(reply.created_at));
  assert_eq!(svc.get_ticket(ticket.ticket_id).await.unwrap(), rebuilt);
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn settings_roundtrip_with_initial_value() {
  let s = store().await;
  let created = s.insert_setting("product_name", json!("Desk")).await.unwrap().unwrap();
  assert_eq!(created.initial_value, json!("Desk"));

  assert!(s.update_setting("product_name", json!("Help Desk")).await.unwrap());
  assert!(!s.update_setting("nope", json!(1)).await.unwrap());

  let fetched = s.get_setting("product_name").await.unwrap().unwrap();
  assert_eq!(fetched.value, json!("Help Desk"));
  assert_eq!(fetched.initial_value, json!("Desk"));
  assert_eq!(fetched.setting_id, created.setting_id);
}

#[tokio::test]
async fn duplicate_setting_insert_is_refused() {
  let s = store().await;
  s.insert_setting("fqdn", json!("desk.local")).await.unwrap().unwrap();
  assert_eq!(s.insert_setting("fqdn", json!("other.local")).await.unwrap(), None);

  let kept = s.get_setting("fqdn").await.unwrap().unwrap();
  assert_eq!(kept.value, json!("desk.local"));
  assert_eq!(kept.initial_value, json!("desk.local"));
  assert_eq!(s.list_settings().await.unwrap().len(), 1);

  let cache = SettingsCache::new(Arc::new(s));
  assert!(matches!(
    cache.create("fqdn", json!("third.local")).await,
    Err(CoreError::SettingExists(name)) if name == "fqdn"
  ));
}

#[tokio::test]
async fn settings_cache_reads_through_and_invalidates_on_write() {
  let s = Arc::new(store().await);
  s.insert_setting("fqdn", json!("desk.example.com")).await.unwrap().unwrap();
  s.insert_setting("http_type", json!("http")).await.unwrap().unwrap();
  s.insert_setting("url", json!("#{config.http_type}://#{config.fqdn}"))
    .await
    .unwrap()
    .unwrap();

  let cache = SettingsCache::new(Arc::clone(&s));
  assert_eq!(
    cache.get("url").await.unwrap(),
    Some(json!("http://desk.example.com"))
  );

  // A write behind the cache's back is not seen until invalidation.
  s.update_setting("fqdn", json!("other.example.com")).await.unwrap();
  assert_eq!(
    cache.get("url").await.unwrap(),
    Some(json!("http://desk.example.com"))
  );
  cache.invalidate().await;
  assert_eq!(
    cache.get("url").await.unwrap(),
    Some(json!("http://other.example.com"))
  );

  // Writes through the cache are visible immediately.
  cache.set("http_type", json!("https")).await.unwrap();
  assert_eq!(
    cache.get("url").await.unwrap(),
    Some(json!("https://other.example.com"))
  );

  cache.reset("http_type").await.unwrap();
  assert_eq!(cache.get("http_type").await.unwrap(), Some(json!("http")));

  assert!(matches!(
    cache.set("missing", json!(1)).await,
    Err(CoreError::SettingNotFound(name)) if name == "missing"
  ));
  assert_eq!(cache.get("missing").await.unwrap(), None);

  cache.create("locale", json!("de-de")).await.unwrap();
  assert_eq!(cache.get("locale").await.unwrap(), Some(json!("de-de")));
}
