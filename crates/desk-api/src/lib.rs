//! JSON REST API for Desk.
//!
//! Exposes an axum [`Router`] backed by a [`TicketService`] and a
//! [`SettingsCache`] over any store implementing both
//! [`desk_core::store::TicketStore`] and [`desk_core::store::SettingStore`].
//! TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", desk_api::api_router(state))
//! ```

pub mod articles;
pub mod error;
pub mod etag;
pub mod settings;
pub mod tickets;


use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use desk_core::{
  clock::{Clock, SystemClock},
  service::TicketService,
  settings::SettingsCache,
  store::{SettingStore, TicketStore},
  ticket::StateCatalog,
};

pub use error::ApiError;

/// Bound shared by every handler: one backend serving tickets and settings.
pub trait DeskStore: TicketStore + SettingStore + Send + Sync + 'static {}

impl<S> DeskStore for S where S: TicketStore + SettingStore + Send + Sync + 'static {}

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub tickets:  Arc<TicketService<S>>,
  pub settings: Arc<SettingsCache<S>>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      tickets:  Arc::clone(&self.tickets),
      settings: Arc::clone(&self.settings),
    }
  }
}

impl<S: DeskStore> ApiState<S> {
  /// Build the service and the settings cache over one shared store.
  pub fn new(store: Arc<S>) -> Self {
    Self {
      tickets:  Arc::new(TicketService::new(Arc::clone(&store))),
      settings: Arc::new(SettingsCache::new(store)),
    }
  }

  /// Like [`ApiState::new`] but with a deployment-specific state catalog.
  pub fn with_catalog(store: Arc<S>, catalog: StateCatalog) -> Self {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let service = TicketService::with_parts(Arc::clone(&store), clock, catalog);
    Self {
      tickets:  Arc::new(service),
      settings: Arc::new(SettingsCache::new(store)),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: DeskStore>(state: ApiState<S>) -> Router<()> {
  Router::new()
    // Tickets
    .route("/tickets", get(tickets::list::<S>).post(tickets::create::<S>))
    .route(
      "/tickets/{id}",
      get(tickets::get_one::<S>)
        .patch(tickets::update::<S>)
        .delete(tickets::destroy::<S>),
    )
    .route("/tickets/{id}/touch", post(tickets::touch::<S>))
    .route("/tickets/{id}/state", put(tickets::change_state::<S>))
    .route("/tickets/{id}/rebuild", post(tickets::rebuild::<S>))
    .route("/latest-change", get(tickets::latest_change::<S>))
    .route("/states", get(tickets::states::<S>))
    // Articles
    .route(
      "/tickets/{id}/articles",
      get(articles::list::<S>).post(articles::create::<S>),
    )
    // Settings
    .route("/settings", get(settings::list::<S>).post(settings::create::<S>))
    .route(
      "/settings/{name}",
      get(settings::get_one::<S>).put(settings::update::<S>),
    )
    .route("/settings/{name}/reset", post(settings::reset::<S>))
    .with_state(state)
}
