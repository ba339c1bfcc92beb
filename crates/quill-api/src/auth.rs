use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;
use uuid::Uuid;

use quill_db::Database;
use quill_db::models::UserRow;
use quill_gateway::dispatcher::Dispatcher;
use quill_types::api::{AuthResponse, Claims, LoginRequest, SignupRequest};
use quill_types::models::User;

use crate::error::{ApiError, ApiResult};
use crate::parse_timestamp;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Name, email, and password are required".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::InvalidInput(
            "Password must be at least 8 characters".into(),
        ));
    }

    if state.db.get_user_by_email(&req.email)?.is_some() {
        return Err(ApiError::Conflict(
            "User with this email already exists".into(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    state
        .db
        .create_user(&user_id.to_string(), &req.name, &req.email, &password_hash)?;

    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| anyhow::anyhow!("user vanished after insert"))?;

    let token = create_token(&state.jwt_secret, &user)?;

    record_activity(&state.db, user_id, "signup", &req.email);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user_model(user),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or_else(|| ApiError::Forbidden("Invalid email or password".into()))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Forbidden("Invalid email or password".into()))?;

    let token = create_token(&state.jwt_secret, &user)?;

    let user_id: Uuid = user.id.parse().map_err(anyhow::Error::from)?;
    record_activity(&state.db, user_id, "login", &user.email);

    Ok(Json(AuthResponse {
        user: user_model(user),
        token,
    }))
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(user_model(user)))
}

fn create_token(secret: &str, user: &UserRow) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id.parse()?,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn user_model(row: UserRow) -> User {
    User {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt user id '{}': {}", row.id, e);
            Uuid::default()
        }),
        name: row.name,
        email: row.email,
        role: row.role,
        created_at: parse_timestamp(&row.created_at, "user"),
    }
}

/// Auth events carry no note reference, only the actor trail.
fn record_activity(db: &Database, user_id: Uuid, action: &str, email: &str) {
    let details = serde_json::json!({ "email": email });
    if let Err(e) = db.insert_activity(
        &Uuid::new_v4().to_string(),
        &user_id.to_string(),
        None,
        action,
        &details.to_string(),
    ) {
        warn!("failed to record {} activity: {}", action, e);
    }
}
