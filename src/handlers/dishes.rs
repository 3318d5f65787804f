use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{Dish, NewDish, Role};
use crate::schema::dishes;
use crate::store::postgres::db_conn;

use super::AppState;

/// Dish catalog. Reads for any authenticated user, mutations admin only.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dishes", get(list_dishes).post(create_dish))
        .route(
            "/api/dishes/{id}",
            get(get_dish).put(update_dish).delete(delete_dish),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateDishRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: BigDecimal,
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDishRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub available: Option<bool>,
}

#[derive(AsChangeset)]
#[diesel(table_name = dishes)]
struct DishChanges {
    name: Option<String>,
    description: Option<String>,
    price: Option<BigDecimal>,
    available: Option<bool>,
    updated_at: DateTime<Utc>,
}

async fn list_dishes(
    _user: AuthUser,
    State(_state): State<AppState>,
) -> Result<Json<Vec<Dish>>, AppError> {
    let conn = &mut db_conn()?;
    let listed = dishes::table
        .select(Dish::as_select())
        .order(dishes::created_at.desc())
        .load(conn)?;
    Ok(Json(listed))
}

async fn get_dish(
    _user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Dish>, AppError> {
    let conn = &mut db_conn()?;
    let dish = dishes::table
        .find(id)
        .select(Dish::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("dish not found"))?;
    Ok(Json(dish))
}

async fn create_dish(
    user: AuthUser,
    State(_state): State<AppState>,
    Json(body): Json<CreateDishRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    user.require_role(&[Role::Admin])?;
    if body.name.trim().is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if body.price <= BigDecimal::zero() {
        return Err(AppError::validation("price must be positive"));
    }

    let conn = &mut db_conn()?;
    let new_dish = NewDish {
        name: body.name,
        description: body.description,
        price: body.price,
        available: body.available.unwrap_or(true),
    };
    let dish_id: i32 = diesel::insert_into(dishes::table)
        .values(&new_dish)
        .returning(dishes::id)
        .get_result(conn)?;

    info!("dish {dish_id} created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "dish created",
            "dish_id": dish_id
        })),
    ))
}

async fn update_dish(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateDishRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Admin])?;
    if let Some(price) = &body.price {
        if *price <= BigDecimal::zero() {
            return Err(AppError::validation("price must be positive"));
        }
    }

    let conn = &mut db_conn()?;
    let changes = DishChanges {
        name: body.name,
        description: body.description,
        price: body.price,
        available: body.available,
        updated_at: Utc::now(),
    };
    let affected = diesel::update(dishes::table.find(id))
        .set(&changes)
        .execute(conn)?;
    if affected == 0 {
        return Err(AppError::not_found("dish not found"));
    }

    info!("dish {id} updated");
    Ok(Json(json!({ "message": "dish updated" })))
}

async fn delete_dish(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let conn = &mut db_conn()?;
    let affected = diesel::delete(dishes::table.find(id)).execute(conn)?;
    if affected == 0 {
        return Err(AppError::not_found("dish not found"));
    }

    info!("dish {id} deleted");
    Ok(Json(json!({ "message": "dish deleted" })))
}
