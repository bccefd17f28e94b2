//! Paper catalog handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use papershelf_common::{
    api::{
        Json, MutationResponse, NameList, NameRef, PaperCreated, PaperDetail, PaperDraft,
        PaperSummary, PaperUpdate,
    },
    auth::AuthUser,
    db::{NewPaper, PaperListRow, Repository},
    errors::{AppError, Result},
    metrics,
};

/// Map a listing row into the wire shape
pub(crate) fn summary_from(row: PaperListRow) -> PaperSummary {
    PaperSummary {
        id: row.id,
        title: row.title,
        abstract_text: row.abstract_text,
        year: row.year,
        url: row.url,
        pdf_key: row.pdf_key,
        added_by: row.added_by,
        added_at: row.added_at.to_rfc3339(),
        updated_at: row.updated_at.to_rfc3339(),
        authors: row.authors,
        tags: row.tags,
    }
}

/// List the whole catalog, newest first
pub async fn list_papers(State(state): State<AppState>) -> Result<Json<Vec<PaperSummary>>> {
    let repo = Repository::new(state.db.clone());

    let rows = repo.list_papers().await?;

    Ok(Json(rows.into_iter().map(summary_from).collect()))
}

/// Full detail view for one paper, with its authors, tags, and references
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<Uuid>,
) -> Result<Json<PaperDetail>> {
    let repo = Repository::new(state.db.clone());

    let paper = repo
        .find_paper_by_id(paper_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            id: paper_id.to_string(),
        })?;

    let authors = repo.authors_for_paper(&paper).await?;
    let tags = repo.tags_for_paper(&paper).await?;
    let references = repo.references_for_paper(paper_id).await?;

    Ok(Json(PaperDetail {
        id: paper.id,
        title: paper.title,
        abstract_text: paper.abstract_text,
        year: paper.year,
        url: paper.url,
        pdf_key: paper.pdf_key,
        added_by: paper.added_by,
        added_at: paper.added_at.to_rfc3339(),
        updated_at: paper.updated_at.to_rfc3339(),
        authors: authors
            .into_iter()
            .map(|a| NameRef {
                id: a.id,
                name: a.name,
            })
            .collect(),
        tags: tags
            .into_iter()
            .map(|t| NameRef {
                id: t.id,
                name: t.name,
            })
            .collect(),
        references,
    }))
}

/// Submit a new paper with its authors, tags, and cited references
pub async fn create_paper(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<PaperDraft>,
) -> Result<(StatusCode, Json<PaperCreated>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let new_paper = NewPaper {
        title: request.title,
        abstract_text: request.abstract_text,
        year: request.year,
        url: request.url,
        pdf_key: request.pdf_key,
        authors: request.authors.map(NameList::into_names).unwrap_or_default(),
        tags: request.tags.map(NameList::into_names).unwrap_or_default(),
        references: request
            .references
            .map(NameList::into_names)
            .unwrap_or_default(),
    };

    let paper_id = repo.create_paper(auth.user_id, new_paper).await?;

    metrics::record_paper_write("create");

    tracing::info!(
        paper_id = %paper_id,
        user_id = %auth.user_id,
        "Paper created"
    );

    Ok((StatusCode::CREATED, Json(PaperCreated { id: paper_id })))
}

/// Update a paper's own fields; only the submitter may edit
pub async fn update_paper(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(paper_id): Path<Uuid>,
    Json(request): Json<PaperUpdate>,
) -> Result<Json<MutationResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let paper = repo
        .find_paper_by_id(paper_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            id: paper_id.to_string(),
        })?;

    if paper.added_by != auth.user_id {
        return Err(AppError::Forbidden {
            message: "Not authorized".to_string(),
        });
    }

    repo.update_paper(paper_id, &request).await?;

    metrics::record_paper_write("update");

    tracing::info!(
        paper_id = %paper_id,
        user_id = %auth.user_id,
        "Paper updated"
    );

    Ok(Json(MutationResponse {
        success: true,
        message: "Paper updated successfully".to_string(),
    }))
}

/// Delete a paper; only the submitter may delete
pub async fn delete_paper(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(paper_id): Path<Uuid>,
) -> Result<Json<MutationResponse>> {
    let repo = Repository::new(state.db.clone());

    let paper = repo
        .find_paper_by_id(paper_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            id: paper_id.to_string(),
        })?;

    if paper.added_by != auth.user_id {
        return Err(AppError::Forbidden {
            message: "Not authorized".to_string(),
        });
    }

    repo.delete_paper(paper_id).await?;

    metrics::record_paper_write("delete");

    tracing::info!(
        paper_id = %paper_id,
        user_id = %auth.user_id,
        "Paper deleted"
    );

    Ok(Json(MutationResponse {
        success: true,
        message: "Paper deleted successfully".to_string(),
    }))
}

/// Case-insensitive keyword search over titles, abstracts, and author names
pub async fn search_papers(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> Result<Json<Vec<PaperSummary>>> {
    let start = Instant::now();

    let repo = Repository::new(state.db.clone());

    let rows = repo.search_papers(&keyword).await?;

    metrics::record_search(start.elapsed().as_secs_f64(), rows.len());

    tracing::debug!(keyword = %keyword, results = rows.len(), "Search completed");

    Ok(Json(rows.into_iter().map(summary_from).collect()))
}

/// List papers carrying an exactly-named tag
pub async fn papers_by_tag(
    State(state): State<AppState>,
    Path(tag_name): Path<String>,
) -> Result<Json<Vec<PaperSummary>>> {
    let repo = Repository::new(state.db.clone());

    let rows = repo.papers_by_tag(&tag_name).await?;

    Ok(Json(rows.into_iter().map(summary_from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> PaperListRow {
        let added = chrono::Utc::now();
        PaperListRow {
            id: Uuid::new_v4(),
            title: "Attention Is All You Need".to_string(),
            abstract_text: Some("The dominant sequence transduction models...".to_string()),
            year: Some(2017),
            url: None,
            pdf_key: None,
            added_by: Uuid::new_v4(),
            added_at: added.into(),
            updated_at: added.into(),
            authors: Some("Ashish Vaswani, Noam Shazeer".to_string()),
            tags: Some("deep-learning, nlp".to_string()),
        }
    }

    #[test]
    fn summary_keeps_aggregated_names() {
        let row = sample_row();
        let summary = summary_from(row.clone());

        assert_eq!(summary.id, row.id);
        assert_eq!(summary.authors.as_deref(), Some("Ashish Vaswani, Noam Shazeer"));
        assert_eq!(summary.tags.as_deref(), Some("deep-learning, nlp"));
    }

    #[test]
    fn summary_serializes_abstract_under_original_key() {
        let summary = summary_from(sample_row());
        let json = serde_json::to_value(&summary).unwrap();

        assert!(json.get("abstract").is_some());
        assert!(json.get("abstract_text").is_none());
    }

    #[test]
    fn summary_timestamps_are_rfc3339() {
        let summary = summary_from(sample_row());

        assert!(chrono::DateTime::parse_from_rfc3339(&summary.added_at).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&summary.updated_at).is_ok());
    }
}
