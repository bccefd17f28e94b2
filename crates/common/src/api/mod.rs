//! Shared wire types for the REST API
//!
//! Request and response bodies used by both the server handlers and the
//! Rust client. Requests carry their validation rules; responses mirror
//! the JSON shapes the HTTP surface commits to. Timestamps serialize as
//! RFC 3339 strings.

use crate::errors::AppError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ---------------------------------------------------------------------------
// Body extraction
// ---------------------------------------------------------------------------

/// JSON body extractor that keeps the error envelope uniform
///
/// Axum's own `Json` answers a malformed body with a plain-text
/// rejection; wrapping it maps that rejection into the same 400 JSON
/// shape every other validation failure uses.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(AppError::Validation {
                message: rejection.body_text(),
                field: None,
            }),
        }
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Request to register a new account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password min length 6"))]
    pub password: String,
}

/// Request to log in with an existing account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Public view of a user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

/// Response after a successful register or login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

// ---------------------------------------------------------------------------
// Papers
// ---------------------------------------------------------------------------

/// One row in a paper listing
///
/// `authors` and `tags` are comma-joined display strings aggregated by the
/// listing queries, not the full linked records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub url: Option<String>,
    pub pdf_key: Option<String>,
    pub added_by: Uuid,
    pub added_at: String,
    pub updated_at: String,
    pub authors: Option<String>,
    pub tags: Option<String>,
}

/// A linked author or tag reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRef {
    pub id: Uuid,
    pub name: String,
}

/// Full view of a single paper with its linked records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperDetail {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub url: Option<String>,
    pub pdf_key: Option<String>,
    pub added_by: Uuid,
    pub added_at: String,
    pub updated_at: String,
    pub authors: Vec<NameRef>,
    pub tags: Vec<NameRef>,
    pub references: Vec<String>,
}

/// A list of names, accepted either as a JSON array or as a single
/// comma-separated string
///
/// The string form is split on commas; the array form is taken verbatim,
/// so array entries may themselves contain commas ("Smith, J.").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    Many(Vec<String>),
    One(String),
}

impl NameList {
    /// Normalize into trimmed, non-empty names
    pub fn into_names(self) -> Vec<String> {
        match self {
            NameList::Many(items) => items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            NameList::One(s) => s
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
        }
    }
}

/// Request to create a paper
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaperDraft {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    pub year: Option<i32>,

    pub url: Option<String>,

    pub pdf_key: Option<String>,

    pub authors: Option<NameList>,

    pub tags: Option<NameList>,

    pub references: Option<NameList>,
}

/// Request to update a paper's own fields
///
/// Linked authors and tags are not touched by updates.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaperUpdate {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    pub year: Option<i32>,

    pub url: Option<String>,

    pub pdf_key: Option<String>,
}

/// Response after creating a paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperCreated {
    pub id: Uuid,
}

/// Response after a successful update or delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One row in the author listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRow {
    pub id: Uuid,
    pub name: String,
    pub qualification: Option<String>,
    pub institute: Option<String>,
}

/// Catalog-wide totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub total_papers: i64,
    pub total_authors: i64,
    pub total_tags: i64,
    pub total_users: i64,
}

/// A single scalar count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

/// Per-year aggregate over the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearBucket {
    pub year: Option<i32>,
    pub paper_count: i64,
    pub unique_authors: i64,
    pub unique_tags: i64,
    pub contributors: Option<String>,
}

/// A paper whose author count is above the catalog average
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorHeavyPaper {
    pub id: Uuid,
    pub title: String,
    pub year: Option<i32>,
    pub author_count: i64,
    pub authors: Option<String>,
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// One row in the admin user listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub paper_count: i64,
    pub created_at: String,
}

/// Admin request to create a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 2, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password min length 6"))]
    pub password: String,

    pub is_admin: Option<bool>,
}

/// One row in the admin paper listing
///
/// Same shape as [`PaperSummary`] plus the submitter's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminPaperRow {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub url: Option<String>,
    pub pdf_key: Option<String>,
    pub added_by: Uuid,
    pub added_by_name: Option<String>,
    pub added_at: String,
    pub updated_at: String,
    pub authors: Option<String>,
    pub tags: Option<String>,
}

/// Admin request to update a user
///
/// Only the provided fields change; a `None` leaves the column as is.
/// An empty password string also means "keep the current password", so
/// its minimum length is enforced in the handler rather than here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 2, message = "Name is required"))]
    pub name: Option<String>,

    #[validate(email(message = "Valid email is required"))]
    pub email: Option<String>,

    pub password: Option<String>,

    pub is_admin: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};

    fn json_request(body: &str) -> Request {
        HttpRequest::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_json_extractor_accepts_valid_body() {
        let request = json_request(r#"{"email":"ada@example.com","password":"secret123"}"#);

        let Json(login) = Json::<LoginRequest>::from_request(request, &())
            .await
            .unwrap();

        assert_eq!(login.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_json_extractor_maps_malformed_body_to_validation_error() {
        let request = json_request(r#"{"email": "#);

        let err = Json::<LoginRequest>::from_request(request, &())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        match err {
            AppError::Validation { field, .. } => assert!(field.is_none()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_json_extractor_rejection_uses_error_envelope() {
        let request = json_request("not json at all");

        let err = Json::<LoginRequest>::from_request(request, &())
            .await
            .unwrap_err();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn test_name_list_from_string() {
        let list: NameList = serde_json::from_value(serde_json::json!("Alice, Bob ,  Carol"))
            .unwrap();
        assert_eq!(list.into_names(), vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_name_list_from_array() {
        let list: NameList =
            serde_json::from_value(serde_json::json!([" Alice ", "", "Bob"])).unwrap();
        assert_eq!(list.into_names(), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_name_list_array_keeps_embedded_commas() {
        let list: NameList = serde_json::from_value(serde_json::json!(["Smith, J."])).unwrap();
        assert_eq!(list.into_names(), vec!["Smith, J."]);
    }

    #[test]
    fn test_name_list_empty_string() {
        let list: NameList = serde_json::from_value(serde_json::json!("")).unwrap();
        assert!(list.into_names().is_empty());
    }

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "secret123".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short_password = RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "short".to_string(),
        };
        let errors = short_password.validate().unwrap_err();
        assert!(errors.to_string().contains("Password min length 6"));

        let bad_email = RegisterRequest {
            name: "Alice".to_string(),
            email: "not-an-email".to_string(),
            password: "secret123".to_string(),
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_login_request_requires_password() {
        let empty = LoginRequest {
            email: "alice@example.com".to_string(),
            password: String::new(),
        };
        let errors = empty.validate().unwrap_err();
        assert!(errors.to_string().contains("Password is required"));
    }

    #[test]
    fn test_paper_draft_accepts_both_name_forms() {
        let from_strings: PaperDraft = serde_json::from_value(serde_json::json!({
            "title": "Attention Is All You Need",
            "authors": "Vaswani, Shazeer",
            "tags": ["nlp", "transformers"],
        }))
        .unwrap();

        assert_eq!(
            from_strings.authors.unwrap().into_names(),
            vec!["Vaswani", "Shazeer"]
        );
        assert_eq!(
            from_strings.tags.unwrap().into_names(),
            vec!["nlp", "transformers"]
        );
        assert!(from_strings.references.is_none());
    }

    #[test]
    fn test_paper_draft_abstract_field_name() {
        let draft: PaperDraft = serde_json::from_value(serde_json::json!({
            "title": "T",
            "abstract": "Some abstract",
        }))
        .unwrap();
        assert_eq!(draft.abstract_text.as_deref(), Some("Some abstract"));

        let out = serde_json::to_value(&draft).unwrap();
        assert_eq!(out["abstract"], "Some abstract");
        assert!(out.get("abstract_text").is_none());
    }
}
