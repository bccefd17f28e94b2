//! HTTP client for the Papershelf API
//!
//! Wraps every route the service exposes behind typed methods. Calls that
//! require authentication take an explicit [`Session`]; there is no ambient
//! login state, and dropping the session is logout.

use papershelf_common::api::{
    AdminCreateUserRequest, AdminPaperRow, AdminUpdateUserRequest, AdminUserRow, AuthResponse,
    AuthorHeavyPaper, AuthorRow, CatalogStatistics, CountResponse, LoginRequest, MutationResponse,
    NameRef, PaperCreated, PaperDetail, PaperDraft, PaperSummary, PaperUpdate, RegisterRequest,
    UserProfile, YearBucket,
};
use papershelf_common::errors::{ErrorCode, ErrorResponse};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Errors surfaced by the client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response (connection, TLS, timeout)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with an error status
    ///
    /// `code` is present when the body carried the service's error
    /// envelope; a `None` code means the body was not decodable (for
    /// example a bare timeout response).
    #[error("api error {status}: {message}")]
    Api {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },
}

/// An authenticated session: the bearer token plus the signed-in user
///
/// Obtained from [`ApiClient::register`] or [`ApiClient::login`] and passed
/// explicitly to every call that mutates the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

impl Session {
    /// Whether this session's user submitted the given paper
    ///
    /// Mirrors the server's ownership check so UIs can hide edit and
    /// delete controls the server would reject anyway.
    pub fn owns_paper(&self, added_by: Uuid) -> bool {
        self.user.id == added_by
    }

    /// Whether the user held admin rights when the session was created
    ///
    /// Advisory only; admin routes re-check the flag server-side on
    /// every request.
    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }
}

/// Typed client for the Papershelf REST API
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Encode a caller-supplied value for use as one path segment
    ///
    /// Keywords and tag names may contain `?`, `#`, `/`, or spaces; those
    /// must travel percent-encoded or the URL splits at the wrong place.
    fn segment(raw: &str) -> String {
        const SEGMENT: &AsciiSet = &CONTROLS
            .add(b' ')
            .add(b'"')
            .add(b'#')
            .add(b'%')
            .add(b'/')
            .add(b'<')
            .add(b'>')
            .add(b'?')
            .add(b'`')
            .add(b'{')
            .add(b'}');

        utf8_percent_encode(raw, SEGMENT).to_string()
    }

    /// Unauthenticated GET
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.http.get(self.url(path)).send().await?;
        decode(response).await
    }

    /// Authenticated request without a body
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        session: &Session,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .request(method, self.url(path))
            .header("Authorization", format!("Bearer {}", session.token))
            .send()
            .await?;
        decode(response).await
    }

    /// Authenticated request carrying a JSON body
    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        session: &Session,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .request(method, self.url(path))
            .header("Authorization", format!("Bearer {}", session.token))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Create an account and sign in
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        let request = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&request)
            .send()
            .await?;

        let auth: AuthResponse = decode(response).await?;
        Ok(Session {
            token: auth.token,
            user: auth.user,
        })
    }

    /// Sign in with an existing account
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&request)
            .send()
            .await?;

        let auth: AuthResponse = decode(response).await?;
        Ok(Session {
            token: auth.token,
            user: auth.user,
        })
    }

    // ========================================================================
    // Papers
    // ========================================================================

    /// All papers, newest first
    pub async fn list_papers(&self) -> Result<Vec<PaperSummary>, ClientError> {
        self.get("/api/papers").await
    }

    /// One paper with its authors, tags, and references
    pub async fn get_paper(&self, id: Uuid) -> Result<PaperDetail, ClientError> {
        self.get(&format!("/api/papers/{}", id)).await
    }

    /// Keyword search over titles, abstracts, and author names
    pub async fn search_papers(&self, keyword: &str) -> Result<Vec<PaperSummary>, ClientError> {
        self.get(&format!("/api/papers/search/{}", Self::segment(keyword)))
            .await
    }

    /// Papers carrying the exactly-named tag
    pub async fn papers_by_tag(&self, tag_name: &str) -> Result<Vec<PaperSummary>, ClientError> {
        self.get(&format!("/api/papers/tag/{}", Self::segment(tag_name)))
            .await
    }

    /// Papers submitted by one user
    pub async fn user_papers(&self, user_id: Uuid) -> Result<Vec<PaperSummary>, ClientError> {
        self.get(&format!("/api/users/{}/papers", user_id)).await
    }

    /// Submit a new paper
    pub async fn create_paper(
        &self,
        session: &Session,
        draft: &PaperDraft,
    ) -> Result<PaperCreated, ClientError> {
        self.send_json(Method::POST, "/api/papers", session, draft)
            .await
    }

    /// Update a paper the session user submitted
    pub async fn update_paper(
        &self,
        session: &Session,
        id: Uuid,
        update: &PaperUpdate,
    ) -> Result<MutationResponse, ClientError> {
        self.send_json(Method::PUT, &format!("/api/papers/{}", id), session, update)
            .await
    }

    /// Delete a paper the session user submitted
    pub async fn delete_paper(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<MutationResponse, ClientError> {
        self.send(Method::DELETE, &format!("/api/papers/{}", id), session)
            .await
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// All tags, alphabetically
    pub async fn list_tags(&self) -> Result<Vec<NameRef>, ClientError> {
        self.get("/api/tags").await
    }

    /// All authors, alphabetically
    pub async fn list_authors(&self) -> Result<Vec<AuthorRow>, ClientError> {
        self.get("/api/authors").await
    }

    /// Catalog-wide totals
    pub async fn statistics(&self) -> Result<CatalogStatistics, ClientError> {
        self.get("/api/statistics").await
    }

    /// Number of papers submitted by one user
    pub async fn count_user_papers(&self, user_id: Uuid) -> Result<i64, ClientError> {
        let response: CountResponse = self
            .get(&format!("/api/functions/count-user-papers/{}", user_id))
            .await?;
        Ok(response.count)
    }

    /// Number of papers under one tag
    pub async fn count_papers_by_tag(&self, tag_name: &str) -> Result<i64, ClientError> {
        let response: CountResponse = self
            .get(&format!(
                "/api/functions/count-papers-by-tag/{}",
                Self::segment(tag_name)
            ))
            .await?;
        Ok(response.count)
    }

    /// Number of papers added in the last `days` days
    pub async fn count_recent_papers(&self, days: u32) -> Result<i64, ClientError> {
        let response: CountResponse = self
            .get(&format!("/api/functions/recent-papers/{}", days))
            .await?;
        Ok(response.count)
    }

    /// Per-year publication report
    pub async fn papers_by_year(&self) -> Result<Vec<YearBucket>, ClientError> {
        self.get("/api/queries/papers-by-year").await
    }

    /// Papers with an above-average author count
    pub async fn papers_with_many_authors(&self) -> Result<Vec<AuthorHeavyPaper>, ClientError> {
        self.get("/api/queries/papers-with-many-authors").await
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// All accounts with their paper counts
    pub async fn admin_list_users(
        &self,
        session: &Session,
    ) -> Result<Vec<AdminUserRow>, ClientError> {
        self.send(Method::GET, "/api/admin/users", session).await
    }

    /// Create an account, optionally with admin rights
    pub async fn admin_create_user(
        &self,
        session: &Session,
        request: &AdminCreateUserRequest,
    ) -> Result<UserProfile, ClientError> {
        self.send_json(Method::POST, "/api/admin/users", session, request)
            .await
    }

    /// Partially update an account
    pub async fn admin_update_user(
        &self,
        session: &Session,
        id: Uuid,
        request: &AdminUpdateUserRequest,
    ) -> Result<UserProfile, ClientError> {
        self.send_json(
            Method::PUT,
            &format!("/api/admin/users/{}", id),
            session,
            request,
        )
        .await
    }

    /// Delete an account and everything it submitted
    pub async fn admin_delete_user(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<MutationResponse, ClientError> {
        self.send(Method::DELETE, &format!("/api/admin/users/{}", id), session)
            .await
    }

    /// All papers with submitter names
    pub async fn admin_list_papers(
        &self,
        session: &Session,
    ) -> Result<Vec<AdminPaperRow>, ClientError> {
        self.send(Method::GET, "/api/admin/papers", session).await
    }

    /// Update any paper
    pub async fn admin_update_paper(
        &self,
        session: &Session,
        id: Uuid,
        update: &PaperUpdate,
    ) -> Result<MutationResponse, ClientError> {
        self.send_json(
            Method::PUT,
            &format!("/api/admin/papers/{}", id),
            session,
            update,
        )
        .await
    }

    /// Delete any paper
    pub async fn admin_delete_paper(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<MutationResponse, ClientError> {
        self.send(Method::DELETE, &format!("/api/admin/papers/{}", id), session)
            .await
    }
}

/// Turn a response into the decoded body or a [`ClientError::Api`]
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(envelope) => Err(ClientError::Api {
            status: status.as_u16(),
            code: Some(envelope.error.code),
            message: envelope.error.message,
        }),
        Err(_) => Err(ClientError::Api {
            status: status.as_u16(),
            code: None,
            message: body,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use papershelf_common::errors::ErrorDetails;

    /// Serve the router on an ephemeral loopback port
    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn test_session() -> Session {
        Session {
            token: "token-123".to_string(),
            user: UserProfile {
                id: Uuid::new_v4(),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                is_admin: true,
            },
        }
    }

    #[test]
    fn owns_paper_compares_user_id() {
        let session = test_session();

        assert!(session.owns_paper(session.user.id));
        assert!(!session.owns_paper(Uuid::new_v4()));
    }

    #[test]
    fn segment_encoding_escapes_reserved_characters() {
        assert_eq!(ApiClient::segment("c? advanced"), "c%3F%20advanced");
        assert_eq!(ApiClient::segment("tcp/ip"), "tcp%2Fip");
        assert_eq!(ApiClient::segment("100%"), "100%25");
        assert_eq!(ApiClient::segment("nlp"), "nlp");
    }

    #[tokio::test]
    async fn tag_name_with_metacharacters_reaches_the_server_intact() {
        let router = Router::new().route(
            "/api/papers/tag/{tag_name}",
            get(
                |axum::extract::Path(tag): axum::extract::Path<String>| async move {
                    assert_eq!(tag, "c? advanced");
                    Json(Vec::<PaperSummary>::new())
                },
            ),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let papers = client.papers_by_tag("c? advanced").await.unwrap();

        assert!(papers.is_empty());
    }

    #[tokio::test]
    async fn search_keyword_with_slash_stays_in_one_segment() {
        let router = Router::new().route(
            "/api/papers/search/{keyword}",
            get(
                |axum::extract::Path(keyword): axum::extract::Path<String>| async move {
                    assert_eq!(keyword, "tcp/ip");
                    Json(Vec::<PaperSummary>::new())
                },
            ),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        client.search_papers("tcp/ip").await.unwrap();
    }

    #[tokio::test]
    async fn tag_count_encodes_the_tag_segment() {
        let router = Router::new().route(
            "/api/functions/count-papers-by-tag/{tag_name}",
            get(
                |axum::extract::Path(tag): axum::extract::Path<String>| async move {
                    assert_eq!(tag, "c? advanced");
                    Json(CountResponse { count: 2 })
                },
            ),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let count = client.count_papers_by_tag("c? advanced").await.unwrap();

        assert_eq!(count, 2);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:4000/").unwrap();
        assert_eq!(client.url("/api/papers"), "http://localhost:4000/api/papers");
    }

    #[tokio::test]
    async fn login_builds_session() {
        let user_id = Uuid::new_v4();
        let router = Router::new().route(
            "/api/auth/login",
            post(move |Json(body): Json<LoginRequest>| async move {
                assert_eq!(body.email, "ada@example.com");
                assert_eq!(body.password, "secret123");
                Json(AuthResponse {
                    token: "signed-token".to_string(),
                    user: UserProfile {
                        id: user_id,
                        name: "Ada".to_string(),
                        email: "ada@example.com".to_string(),
                        is_admin: false,
                    },
                })
            }),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let session = client.login("ada@example.com", "secret123").await.unwrap();

        assert_eq!(session.token, "signed-token");
        assert_eq!(session.user.id, user_id);
        assert!(!session.is_admin());
    }

    #[tokio::test]
    async fn bearer_header_is_attached() {
        let router = Router::new().route(
            "/api/admin/users",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                assert_eq!(auth, "Bearer token-123");
                Json(Vec::<AdminUserRow>::new())
            }),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let users = client.admin_list_users(&test_session()).await.unwrap();

        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn error_envelope_is_decoded() {
        let router = Router::new().route(
            "/api/papers/{id}",
            get(|| async {
                let body = ErrorResponse {
                    error: ErrorDetails {
                        code: ErrorCode::PaperNotFound,
                        message: "Paper not found: x".to_string(),
                        details: None,
                        request_id: None,
                    },
                };
                (StatusCode::NOT_FOUND, Json(body))
            }),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let err = client.get_paper(Uuid::new_v4()).await.unwrap_err();

        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, Some(ErrorCode::PaperNotFound));
                assert_eq!(message, "Paper not found: x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_error_body_falls_back() {
        let router = Router::new().route(
            "/api/statistics",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let err = client.statistics().await.unwrap_err();

        match err {
            ClientError::Api { status, code, .. } => {
                assert_eq!(status, 500);
                assert_eq!(code, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_paper_sends_draft_fields() {
        let router = Router::new().route(
            "/api/papers",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["title"], "A Paper");
                assert_eq!(body["abstract"], "Short abstract");
                assert_eq!(body["authors"], "Alice, Bob");
                (
                    StatusCode::CREATED,
                    Json(PaperCreated { id: Uuid::new_v4() }),
                )
            }),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let draft = PaperDraft {
            title: "A Paper".to_string(),
            abstract_text: Some("Short abstract".to_string()),
            year: Some(2024),
            url: None,
            pdf_key: None,
            authors: Some(papershelf_common::api::NameList::One(
                "Alice, Bob".to_string(),
            )),
            tags: None,
            references: None,
        };

        client
            .create_paper(&test_session(), &draft)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn count_endpoints_unwrap_count() {
        let router = Router::new().route(
            "/api/functions/recent-papers/{days}",
            get(|axum::extract::Path(days): axum::extract::Path<u32>| async move {
                assert_eq!(days, 30);
                Json(CountResponse { count: 7 })
            }),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let count = client.count_recent_papers(30).await.unwrap();

        assert_eq!(count, 7);
    }

    #[tokio::test]
    async fn admin_update_sends_partial_body() {
        let router = Router::new().route(
            "/api/admin/users/{id}",
            put(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["is_admin"], true);
                assert!(body["password"].is_null());
                Json(UserProfile {
                    id: Uuid::new_v4(),
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    is_admin: true,
                })
            }),
        );
        let base = spawn_server(router).await;

        let client = ApiClient::new(base).unwrap();
        let request = AdminUpdateUserRequest {
            name: None,
            email: None,
            password: None,
            is_admin: Some(true),
        };

        let updated = client
            .admin_update_user(&test_session(), Uuid::new_v4(), &request)
            .await
            .unwrap();

        assert!(updated.is_admin);
    }
}
