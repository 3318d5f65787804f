use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{DiningTable, NewDiningTable, Role, TableStatus};
use crate::schema::tables;
use crate::store::postgres::db_conn;

use super::AppState;

/// Table administration. Order logic never goes through these endpoints;
/// occupancy changes there happen only as order-transition side effects.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tables", get(list_tables).post(create_table))
        .route(
            "/api/tables/{id}",
            get(get_table).put(update_table).delete(delete_table),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    pub number: i32,
    pub capacity: i32,
    pub status: Option<TableStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTableRequest {
    pub number: Option<i32>,
    pub capacity: Option<i32>,
    pub status: Option<TableStatus>,
}

#[derive(AsChangeset)]
#[diesel(table_name = tables)]
struct TableChanges {
    number: Option<i32>,
    capacity: Option<i32>,
    status: Option<TableStatus>,
    updated_at: DateTime<Utc>,
}

async fn list_tables(
    _user: AuthUser,
    State(_state): State<AppState>,
) -> Result<Json<Vec<DiningTable>>, AppError> {
    let conn = &mut db_conn()?;
    let listed = tables::table
        .select(DiningTable::as_select())
        .order(tables::number.asc())
        .load(conn)?;
    Ok(Json(listed))
}

async fn get_table(
    _user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DiningTable>, AppError> {
    let conn = &mut db_conn()?;
    let table = tables::table
        .find(id)
        .select(DiningTable::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("table not found"))?;
    Ok(Json(table))
}

async fn create_table(
    user: AuthUser,
    State(_state): State<AppState>,
    Json(body): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    user.require_role(&[Role::Admin])?;
    if body.number < 1 || body.capacity < 1 {
        return Err(AppError::validation("number and capacity must be positive"));
    }

    let conn = &mut db_conn()?;
    let number_taken = tables::table
        .filter(tables::number.eq(body.number))
        .select(tables::id)
        .first::<i32>(conn)
        .optional()?
        .is_some();
    if number_taken {
        return Err(AppError::validation("table number already exists"));
    }

    let new_table = NewDiningTable {
        number: body.number,
        capacity: body.capacity,
        status: body.status.unwrap_or(TableStatus::Available),
    };
    let table_id: i32 = diesel::insert_into(tables::table)
        .values(&new_table)
        .returning(tables::id)
        .get_result(conn)?;

    info!("table {table_id} (number {}) created", new_table.number);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "table created",
            "table_id": table_id
        })),
    ))
}

async fn update_table(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateTableRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let conn = &mut db_conn()?;
    if let Some(number) = body.number {
        let taken_by_other = tables::table
            .filter(tables::number.eq(number))
            .filter(tables::id.ne(id))
            .select(tables::id)
            .first::<i32>(conn)
            .optional()?
            .is_some();
        if taken_by_other {
            return Err(AppError::validation("table number already exists"));
        }
    }

    let changes = TableChanges {
        number: body.number,
        capacity: body.capacity,
        status: body.status,
        updated_at: Utc::now(),
    };
    let affected = diesel::update(tables::table.find(id))
        .set(&changes)
        .execute(conn)?;
    if affected == 0 {
        return Err(AppError::not_found("table not found"));
    }

    info!("table {id} updated");
    Ok(Json(json!({ "message": "table updated" })))
}

async fn delete_table(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let conn = &mut db_conn()?;
    let affected = diesel::delete(tables::table.find(id)).execute(conn)?;
    if affected == 0 {
        return Err(AppError::not_found("table not found"));
    }

    info!("table {id} deleted");
    Ok(Json(json!({ "message": "table deleted" })))
}
