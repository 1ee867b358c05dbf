//! Handlers for `/tickets` endpoints and the ticket aggregates.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/tickets` | All tickets, oldest first |
//! | `POST`   | `/tickets` | Body: `{"title":"...","state":"new"}`; returns 201 |
//! | `GET`    | `/tickets/:id` | Sets `ETag`; honours `If-None-Match` |
//! | `PATCH`  | `/tickets/:id` | Body: `{"title":"..."}` |
//! | `DELETE` | `/tickets/:id` | 204; articles go with it |
//! | `POST`   | `/tickets/:id/touch` | Bumps `updated_at` only |
//! | `PUT`    | `/tickets/:id/state` | Body: `{"state":"...","pending_time":"..."}` |
//! | `POST`   | `/tickets/:id/rebuild` | Recompute contact times from articles |
//! | `GET`    | `/latest-change` | `{"latest_change": <ts or null>}` |
//! | `GET`    | `/states` | The state catalog |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use desk_core::ticket::{NewTicket, Ticket, TicketState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ApiState, DeskStore,
  error::ApiError,
  etag::{compute_etag, if_none_match},
};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /tickets`
pub async fn list<S: DeskStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
  Ok(Json(state.tickets.list_tickets().await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /tickets`: returns 201 + the stored [`Ticket`].
pub async fn create<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewTicket>,
) -> Result<impl IntoResponse, ApiError> {
  if body.title.trim().is_empty() {
    return Err(ApiError::BadRequest("title must not be empty".into()));
  }
  let ticket = state.tickets.create_ticket(body).await?;
  Ok((StatusCode::CREATED, Json(ticket)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /tickets/:id`
pub async fn get_one<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  let ticket = state.tickets.get_ticket(id).await?;
  let etag = compute_etag(&ticket);

  let unchanged = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| if_none_match(v, &etag));
  if unchanged {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  Ok(([(header::ETAG, etag)], Json(ticket)).into_response())
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub title: String,
}

/// `PATCH /tickets/:id`, body: `{"title":"..."}`
pub async fn update<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Ticket>, ApiError> {
  if body.title.trim().is_empty() {
    return Err(ApiError::BadRequest("title must not be empty".into()));
  }
  Ok(Json(state.tickets.update_title(id, &body.title).await?))
}

// ─── Destroy ──────────────────────────────────────────────────────────────────

/// `DELETE /tickets/:id`
pub async fn destroy<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  state.tickets.destroy_ticket(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Touch ────────────────────────────────────────────────────────────────────

/// `POST /tickets/:id/touch`
pub async fn touch<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, ApiError> {
  Ok(Json(state.tickets.touch(id).await?))
}

// ─── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StateBody {
  pub state:        String,
  /// Required for pending-class states, rejected otherwise.
  #[serde(default)]
  pub pending_time: Option<DateTime<Utc>>,
}

/// `PUT /tickets/:id/state`
pub async fn change_state<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<StateBody>,
) -> Result<Json<Ticket>, ApiError> {
  let ticket = state
    .tickets
    .change_state(id, &body.state, body.pending_time)
    .await?;
  Ok(Json(ticket))
}

// ─── Rebuild ──────────────────────────────────────────────────────────────────

/// `POST /tickets/:id/rebuild`
pub async fn rebuild<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, ApiError> {
  Ok(Json(state.tickets.rebuild_contact_times(id).await?))
}

// ─── Aggregates ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct LatestChange {
  pub latest_change: Option<DateTime<Utc>>,
}

/// `GET /latest-change`
pub async fn latest_change<S: DeskStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<LatestChange>, ApiError> {
  Ok(Json(LatestChange {
    latest_change: state.tickets.latest_change().await?,
  }))
}

/// `GET /states`
pub async fn states<S: DeskStore>(State(state): State<ApiState<S>>) -> Json<Vec<TicketState>> {
  Json(state.tickets.catalog().states().to_vec())
}
