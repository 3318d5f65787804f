use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::{NewUser, Role, User, UserPublic};
use crate::schema::users;
use crate::store::postgres::db_conn;

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn register(
    State(_state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if body.name.trim().is_empty() || body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::validation("name, email and password are required"));
    }

    let conn = &mut db_conn()?;
    let already_taken = users::table
        .filter(users::email.eq(&body.email))
        .select(users::id)
        .first::<i32>(conn)
        .optional()?
        .is_some();
    if already_taken {
        warn!("registration attempt with existing email");
        return Err(AppError::validation("email already registered"));
    }

    let new_user = NewUser {
        name: body.name,
        email: body.email,
        password_hash: hash_password(&body.password)?,
        role: body.role,
    };
    let user_id: i32 = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(users::id)
        .get_result(conn)?;

    info!("user {user_id} registered with role {:?}", new_user.role);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "user registered",
            "user_id": user_id
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }

    let conn = &mut db_conn()?;
    // inactive accounts cannot log in; missing and inactive are
    // indistinguishable to the caller
    let user = users::table
        .filter(users::email.eq(&body.email))
        .filter(users::is_active.eq(true))
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&body.password, &user.password_hash) {
        warn!("failed login attempt for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    let token = state.auth.issue_token(user.id, user.role)?;
    info!("user {} logged in", user.id);

    let public = UserPublic {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        is_active: user.is_active,
        created_at: user.created_at,
        updated_at: user.updated_at,
    };
    Ok(Json(json!({
        "token": token,
        "user": public
    })))
}
