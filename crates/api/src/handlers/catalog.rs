//! Catalog listings, statistics, and reporting handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::AppState;
use papershelf_common::{
    api::{AuthorHeavyPaper, AuthorRow, CatalogStatistics, CountResponse, NameRef, YearBucket},
    db::Repository,
    errors::{AppError, Result},
};

/// List all tags, alphabetically
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<NameRef>>> {
    let repo = Repository::new(state.db.clone());

    let tags = repo.list_tags().await?;

    Ok(Json(
        tags.into_iter()
            .map(|t| NameRef {
                id: t.id,
                name: t.name,
            })
            .collect(),
    ))
}

/// List all authors, alphabetically
pub async fn list_authors(State(state): State<AppState>) -> Result<Json<Vec<AuthorRow>>> {
    let repo = Repository::new(state.db.clone());

    let authors = repo.list_authors().await?;

    Ok(Json(
        authors
            .into_iter()
            .map(|a| AuthorRow {
                id: a.id,
                name: a.name,
                qualification: a.qualification,
                institute: a.institute,
            })
            .collect(),
    ))
}

/// Catalog-wide totals
pub async fn statistics(State(state): State<AppState>) -> Result<Json<CatalogStatistics>> {
    let repo = Repository::new(state.db.clone());

    let counts = repo.catalog_counts().await?;

    Ok(Json(CatalogStatistics {
        total_papers: counts.total_papers,
        total_authors: counts.total_authors,
        total_tags: counts.total_tags,
        total_users: counts.total_users,
    }))
}

/// Count papers submitted by one user
pub async fn count_user_papers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CountResponse>> {
    let repo = Repository::new(state.db.clone());

    let count = repo.count_user_papers(user_id).await?;

    Ok(Json(CountResponse { count }))
}

/// Count papers carrying an exactly-named tag
pub async fn count_papers_by_tag(
    State(state): State<AppState>,
    Path(tag_name): Path<String>,
) -> Result<Json<CountResponse>> {
    let repo = Repository::new(state.db.clone());

    let count = repo.count_papers_by_tag(&tag_name).await?;

    Ok(Json(CountResponse { count }))
}

/// Count papers added within the last N days
pub async fn recent_papers(
    State(state): State<AppState>,
    Path(days): Path<u32>,
) -> Result<Json<CountResponse>> {
    let days = i32::try_from(days).map_err(|_| AppError::Validation {
        message: "Days out of range".to_string(),
        field: Some("days".to_string()),
    })?;

    let repo = Repository::new(state.db.clone());

    let count = repo.count_recent_papers(days).await?;

    Ok(Json(CountResponse { count }))
}

/// Per-year publication report, newest years first
pub async fn papers_by_year(State(state): State<AppState>) -> Result<Json<Vec<YearBucket>>> {
    let repo = Repository::new(state.db.clone());

    let rows = repo.papers_by_year().await?;

    Ok(Json(
        rows.into_iter()
            .map(|r| YearBucket {
                year: r.year,
                paper_count: r.paper_count,
                unique_authors: r.unique_authors,
                unique_tags: r.unique_tags,
                contributors: r.contributors,
            })
            .collect(),
    ))
}

/// Papers whose author count is above the catalog average
pub async fn papers_with_many_authors(
    State(state): State<AppState>,
) -> Result<Json<Vec<AuthorHeavyPaper>>> {
    let repo = Repository::new(state.db.clone());

    let rows = repo.papers_with_many_authors().await?;

    Ok(Json(
        rows.into_iter()
            .map(|r| AuthorHeavyPaper {
                id: r.id,
                title: r.title,
                year: r.year,
                author_count: r.author_count,
                authors: r.authors,
            })
            .collect(),
    ))
}
