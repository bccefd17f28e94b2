//! Admin management handlers
//!
//! Every handler takes the `AdminUser` extractor, which re-reads the
//! caller's account row on each request so a revoked admin flag takes
//! effect immediately.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use papershelf_common::{
    api::{
        AdminCreateUserRequest, AdminPaperRow, AdminUpdateUserRequest, AdminUserRow, Json,
        MutationResponse, PaperUpdate, UserProfile,
    },
    auth::{hash_password, AdminUser},
    db::Repository,
    errors::{AppError, Result},
    metrics,
};

/// Admin edit forms send an empty password to mean "keep the current one"
fn requested_password(raw: Option<&str>) -> Result<Option<&str>> {
    match raw {
        None => Ok(None),
        Some(p) if p.is_empty() => Ok(None),
        Some(p) if p.len() < 6 => Err(AppError::Validation {
            message: "Password min length 6".to_string(),
            field: Some("password".to_string()),
        }),
        Some(p) => Ok(Some(p)),
    }
}

/// List all accounts with their paper counts
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<AdminUserRow>>> {
    let repo = Repository::new(state.db.clone());

    let rows = repo.admin_list_users().await?;

    Ok(Json(
        rows.into_iter()
            .map(|u| AdminUserRow {
                id: u.id,
                name: u.name,
                email: u.email,
                is_admin: u.is_admin,
                paper_count: u.paper_count,
                created_at: u.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}

/// Create an account, optionally with admin rights
pub async fn create_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(request): Json<AdminCreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let password_hash = hash_password(&request.password)?;

    let user = repo
        .create_user(
            request.name.trim().to_string(),
            request.email.trim().to_string(),
            password_hash,
            request.is_admin.unwrap_or(false),
        )
        .await?;

    metrics::record_admin_action("user_create");

    tracing::info!(
        admin_id = %admin.user.id,
        user_id = %user.id,
        is_admin = user.is_admin,
        "Admin created user"
    );

    Ok((
        StatusCode::CREATED,
        Json(UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            is_admin: user.is_admin,
        }),
    ))
}

/// Apply a partial update to an account
pub async fn update_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AdminUpdateUserRequest>,
) -> Result<Json<UserProfile>> {
    request.validate()?;

    let password_hash = match requested_password(request.password.as_deref())? {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let repo = Repository::new(state.db.clone());

    let user = repo
        .admin_update_user(
            user_id,
            request.name,
            request.email,
            password_hash,
            request.is_admin,
        )
        .await?;

    metrics::record_admin_action("user_update");

    tracing::info!(
        admin_id = %admin.user.id,
        user_id = %user.id,
        "Admin updated user"
    );

    Ok(Json(UserProfile {
        id: user.id,
        name: user.name,
        email: user.email,
        is_admin: user.is_admin,
    }))
}

/// Delete an account and every paper it submitted
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MutationResponse>> {
    let repo = Repository::new(state.db.clone());

    let user = repo
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            id: user_id.to_string(),
        })?;

    if user.id == admin.user.id {
        return Err(AppError::Forbidden {
            message: "Admins cannot delete their own account".to_string(),
        });
    }

    repo.admin_delete_user(user_id).await?;

    metrics::record_admin_action("user_delete");

    tracing::info!(
        admin_id = %admin.user.id,
        user_id = %user_id,
        "Admin deleted user"
    );

    Ok(Json(MutationResponse {
        success: true,
        message: "User deleted successfully".to_string(),
    }))
}

/// List the whole catalog with submitter names
pub async fn list_papers(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<AdminPaperRow>>> {
    let repo = Repository::new(state.db.clone());

    let rows = repo.admin_list_papers().await?;

    Ok(Json(
        rows.into_iter()
            .map(|p| AdminPaperRow {
                id: p.id,
                title: p.title,
                abstract_text: p.abstract_text,
                year: p.year,
                url: p.url,
                pdf_key: p.pdf_key,
                added_by: p.added_by,
                added_by_name: p.added_by_name,
                added_at: p.added_at.to_rfc3339(),
                updated_at: p.updated_at.to_rfc3339(),
                authors: p.authors,
                tags: p.tags,
            })
            .collect(),
    ))
}

/// Update any paper, regardless of who submitted it
pub async fn update_paper(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(paper_id): Path<Uuid>,
    Json(request): Json<PaperUpdate>,
) -> Result<Json<MutationResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    repo.update_paper(paper_id, &request).await?;

    metrics::record_admin_action("paper_update");

    tracing::info!(
        admin_id = %admin.user.id,
        paper_id = %paper_id,
        "Admin updated paper"
    );

    Ok(Json(MutationResponse {
        success: true,
        message: "Paper updated successfully".to_string(),
    }))
}

/// Delete any paper, regardless of who submitted it
pub async fn delete_paper(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(paper_id): Path<Uuid>,
) -> Result<Json<MutationResponse>> {
    let repo = Repository::new(state.db.clone());

    repo.find_paper_by_id(paper_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            id: paper_id.to_string(),
        })?;

    repo.delete_paper(paper_id).await?;

    metrics::record_admin_action("paper_delete");

    tracing::info!(
        admin_id = %admin.user.id,
        paper_id = %paper_id,
        "Admin deleted paper"
    );

    Ok(Json(MutationResponse {
        success: true,
        message: "Paper deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_password_keeps_current() {
        assert!(matches!(requested_password(None), Ok(None)));
    }

    #[test]
    fn empty_password_keeps_current() {
        assert!(matches!(requested_password(Some("")), Ok(None)));
    }

    #[test]
    fn short_password_is_rejected() {
        let err = requested_password(Some("abc")).unwrap_err();

        match err {
            AppError::Validation { message, field } => {
                assert_eq!(message, "Password min length 6");
                assert_eq!(field.as_deref(), Some("password"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn valid_password_is_passed_through() {
        assert!(matches!(
            requested_password(Some("secret1")),
            Ok(Some("secret1"))
        ));
    }
}
