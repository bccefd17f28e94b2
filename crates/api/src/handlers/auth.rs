//! Registration and login handlers

use axum::extract::State;
use validator::Validate;

use crate::AppState;
use papershelf_common::{
    api::{AuthResponse, Json, LoginRequest, RegisterRequest, UserProfile},
    auth::{hash_password, verify_password},
    db::{models::User, Repository},
    errors::{AppError, Result},
    metrics,
};

/// Public view of a user account, paired with every issued token
fn profile(user: &User) -> UserProfile {
    UserProfile {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
    }
}

/// Register a new account and sign them in
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let password_hash = hash_password(&request.password)?;

    let user = match repo
        .create_user(
            request.name.trim().to_string(),
            request.email.trim().to_string(),
            password_hash,
            false,
        )
        .await
    {
        Ok(user) => user,
        Err(err) => {
            metrics::record_auth("register", false);
            return Err(err);
        }
    };

    metrics::record_auth("register", true);

    let token = state.jwt.issue_token(user.id, &user.email)?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(Json(AuthResponse {
        token,
        user: profile(&user),
    }))
}

/// Exchange email and password for a bearer token
///
/// Unknown email and wrong password produce the same error so the
/// response does not reveal which accounts exist.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let Some(user) = repo.find_user_by_email(request.email.trim()).await? else {
        metrics::record_auth("login", false);
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&request.password, &user.password_hash)? {
        metrics::record_auth("login", false);
        return Err(AppError::InvalidCredentials);
    }

    metrics::record_auth("login", true);

    let token = state.jwt.issue_token(user.id, &user.email)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        token,
        user: profile(&user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = chrono::Utc::now();
        User {
            id: uuid::Uuid::new_v4(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            is_admin: true,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn profile_carries_admin_flag() {
        let user = sample_user();
        let profile = profile(&user);

        assert_eq!(profile.id, user.id);
        assert_eq!(profile.email, "ada@example.com");
        assert!(profile.is_admin);
    }

    #[test]
    fn profile_never_exposes_password_hash() {
        let profile = profile(&sample_user());
        let json = serde_json::to_value(&profile).unwrap();

        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
    }
}
