//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT bearer token generation and validation
//! - Salted password hashing (argon2id)
//! - Request extractors for authenticated and admin callers

use crate::db::DbPool;
use crate::db::models::{User, UserEntity};
use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Email of the subject
    pub email: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new bearer token for a user
    pub fn issue_token(&self, user_id: Uuid, email: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            }
        })
    }

    /// Validate and decode a bearer token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Hash a password with a fresh random salt (argon2id)
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Verify a password against a stored argon2 hash
///
/// The comparison runs inside the argon2 library and is constant-time with
/// respect to the password bytes.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AppError::Internal {
        message: format!("Stored password hash is malformed: {}", e),
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Authenticated caller, extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// ID of the user the token was issued to
    pub user_id: Uuid,

    /// Email recorded in the token
    pub email: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing auth token".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Invalid auth format".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
        })
    }
}

/// Caller verified as an administrator
///
/// The `is_admin` flag is read from the database on every request, never
/// from the token, so a revoked admin loses access as soon as the row
/// changes.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: User,
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
    DbPool: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        let db = DbPool::from_ref(state);
        let user = UserEntity::find_by_id(auth.user_id)
            .one(db.read())
            .await?
            .ok_or_else(|| AppError::Unauthorized {
                message: "Unknown user".to_string(),
            })?;

        if !user.is_admin {
            return Err(AppError::AdminRequired);
        }

        Ok(AdminUser { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[derive(Clone)]
    struct TestState {
        jwt: Arc<JwtManager>,
    }

    impl FromRef<TestState> for Arc<JwtManager> {
        fn from_ref(state: &TestState) -> Self {
            state.jwt.clone()
        }
    }

    fn test_state() -> TestState {
        TestState {
            jwt: Arc::new(JwtManager::new("test_secret", 3600)),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let user_id = Uuid::new_v4();
        let token = manager.issue_token(user_id, "alice@example.com").unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "alice@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_wrong_secret_rejected() {
        let issuer = JwtManager::new("secret_a", 3600);
        let verifier = JwtManager::new("secret_b", 3600);

        let token = issuer.issue_token(Uuid::new_v4(), "a@b.com").unwrap();
        match verifier.validate_token(&token) {
            Err(AppError::InvalidToken) => {}
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = JwtManager::new("test_secret", 3600);

        // Encode claims that expired well past the default leeway
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            email: "a@b.com".to_string(),
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        match manager.validate_token(&token) {
            Err(AppError::ExpiredToken) => {}
            other => panic!("expected ExpiredToken, got {other:?}"),
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("secret123").unwrap();

        // Hash must never equal the clear text and must carry the argon2 prefix
        assert_ne!(hash, "secret123");
        assert!(hash.starts_with("$argon2"));

        assert!(verify_password("secret123", &hash).unwrap());
        assert!(!verify_password("SECRET123", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let a = hash_password("secret123").unwrap();
        let b = hash_password("secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_arbitrary_password() {
        use rand::{distributions::Alphanumeric, Rng};

        let password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();

        let hash = hash_password(&password).unwrap();
        assert!(verify_password(&password, &hash).unwrap());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer("abc.def.ghi"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[tokio::test]
    async fn test_auth_user_extractor() {
        let state = test_state();
        let user_id = Uuid::new_v4();
        let token = state.jwt.issue_token(user_id, "alice@example.com").unwrap();

        let request = Request::builder()
            .header("authorization", format!("Bearer {}", token))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let auth = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_auth_user_missing_header() {
        let state = test_state();
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        match AuthUser::from_request_parts(&mut parts, &state).await {
            Err(AppError::Unauthorized { message }) => {
                assert_eq!(message, "Missing auth token");
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_user_malformed_header() {
        let state = test_state();
        let request = Request::builder()
            .header("authorization", "Token abc")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        match AuthUser::from_request_parts(&mut parts, &state).await {
            Err(AppError::Unauthorized { message }) => {
                assert_eq!(message, "Invalid auth format");
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }
}
