use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;
use uuid::Uuid;

use hearth_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use hearth_workflow::{Credentials, Workflows};

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::storage::Storage;

const TOKEN_TTL_DAYS: i64 = 30;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub workflows: Workflows,
    pub jwt_secret: String,
    pub storage: Storage,
    /// Base URL artifact links are built from, without a trailing slash.
    pub public_url: String,
    pub max_artifact_bytes: usize,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim().to_string();
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::bad_request("username must be 3-32 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ApiError::bad_request("username may only contain letters, digits, '_', '-' and '.'"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }
    let display_name = req
        .display_name
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| username.clone());

    // Argon2id on a blocking thread.
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
    })
    .await?
    .map_err(|e| ApiError::internal("password hashing failed", e))?;

    let user = blocking(&state, move |wf| {
        wf.register_user(&username, &display_name, &password_hash)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.username, &user.display_name)
        .map_err(|e| ApiError::internal("token encoding failed", e))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let username = req.username.trim().to_string();
    let Credentials {
        user,
        password_hash,
    } = blocking(&state, move |wf| wf.credentials(&username))
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || -> Result<bool, ApiError> {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|e| ApiError::internal("stored password hash is malformed", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await??;
    if !verified {
        return Err(ApiError::unauthorized());
    }

    let token = create_token(&state.jwt_secret, user.id, &user.username, &user.display_name)
        .map_err(|e| ApiError::internal("token encoding failed", e))?;
    info!("{} logged in", user.username);

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        display_name: user.display_name,
        token,
    }))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    display_name: &str,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        display_name: display_name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validates signature and expiry.
pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
