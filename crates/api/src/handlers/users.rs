//! Per-user paper listings

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::papers::summary_from;
use crate::AppState;
use papershelf_common::{api::PaperSummary, db::Repository, errors::Result};

/// List every paper a user has submitted, newest first
///
/// The listing is public; it powers profile pages and does not require
/// a token.
pub async fn user_papers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<PaperSummary>>> {
    let repo = Repository::new(state.db.clone());

    let rows = repo.papers_by_user(user_id).await?;

    Ok(Json(rows.into_iter().map(summary_from).collect()))
}
