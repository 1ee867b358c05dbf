//! Handlers for `/tickets/:id/articles`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tickets/:id/articles` | Ordered by creation time |
//! | `POST` | `/tickets/:id/articles` | Body: [`ArticleBody`]; returns 201 + stored article |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use desk_core::article::{Article, Direction, NewArticle, SenderRole};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, DeskStore, error::ApiError};

/// `GET /tickets/:id/articles`
pub async fn list<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<Article>>, ApiError> {
  Ok(Json(state.tickets.list_articles(ticket_id).await?))
}

/// JSON body accepted by `POST /tickets/:id/articles`. The ticket comes from
/// the path.
#[derive(Debug, Deserialize)]
pub struct ArticleBody {
  pub sender_role: SenderRole,
  pub direction:   Direction,
  #[serde(default)]
  pub internal:    bool,
  pub from:        Option<String>,
  pub to:          Option<String>,
  pub subject:     Option<String>,
  pub body:        Option<String>,
  /// Original send time for imported messages; defaults to now.
  pub created_at:  Option<DateTime<Utc>>,
}

impl ArticleBody {
  fn into_new_article(self, ticket_id: Uuid) -> NewArticle {
    NewArticle {
      ticket_id,
      sender_role: self.sender_role,
      direction: self.direction,
      internal: self.internal,
      from: self.from,
      to: self.to,
      subject: self.subject,
      body: self.body,
      created_at: self.created_at,
    }
  }
}

/// `POST /tickets/:id/articles`: returns 201 + the stored [`Article`].
pub async fn create<S: DeskStore>(
  State(state): State<ApiState<S>>,
  Path(ticket_id): Path<Uuid>,
  Json(body): Json<ArticleBody>,
) -> Result<impl IntoResponse, ApiError> {
  let article = state
    .tickets
    .append_article(body.into_new_article(ticket_id))
    .await?;
  Ok((StatusCode::CREATED, Json(article)))
}
