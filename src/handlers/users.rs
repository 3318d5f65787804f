use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::{hash_password, AuthUser};
use crate::error::AppError;
use crate::models::{NewUser, Role, UserPublic};
use crate::schema::users;
use crate::store::postgres::db_conn;

use super::AppState;

/// User administration, admin only.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
struct UserChanges {
    name: Option<String>,
    email: Option<String>,
    password_hash: Option<String>,
    role: Option<Role>,
    is_active: Option<bool>,
    updated_at: DateTime<Utc>,
}

async fn list_users(
    user: AuthUser,
    State(_state): State<AppState>,
) -> Result<Json<Vec<UserPublic>>, AppError> {
    user.require_role(&[Role::Admin])?;
    let conn = &mut db_conn()?;
    let listed = users::table
        .select(UserPublic::as_select())
        .order(users::created_at.desc())
        .load(conn)?;
    Ok(Json(listed))
}

async fn create_user(
    user: AuthUser,
    State(_state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    user.require_role(&[Role::Admin])?;
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

    info!("user {user_id} created by admin {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "user created",
            "user_id": user_id
        })),
    ))
}

async fn update_user(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let conn = &mut db_conn()?;
    if let Some(email) = &body.email {
        let taken_by_other = users::table
            .filter(users::email.eq(email))
            .filter(users::id.ne(id))
            .select(users::id)
            .first::<i32>(conn)
            .optional()?
            .is_some();
        if taken_by_other {
            return Err(AppError::validation("email already registered"));
        }
    }

    let password_hash = body.password.as_deref().map(hash_password).transpose()?;
    let changes = UserChanges {
        name: body.name,
        email: body.email,
        password_hash,
        role: body.role,
        is_active: body.is_active,
        updated_at: Utc::now(),
    };
    let affected = diesel::update(users::table.find(id))
        .set(&changes)
        .execute(conn)?;
    if affected == 0 {
        return Err(AppError::not_found("user not found"));
    }

    info!("user {id} updated by admin {}", user.id);
    Ok(Json(json!({ "message": "user updated" })))
}

async fn delete_user(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let conn = &mut db_conn()?;
    let affected = diesel::delete(users::table.find(id)).execute(conn)?;
    if affected == 0 {
        return Err(AppError::not_found("user not found"));
    }

    info!("user {id} deleted by admin {}", user.id);
    Ok(Json(json!({ "message": "user deleted" })))
}
