use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{OrderStatus, Role};
use crate::presenter::{OrderDetail, OrderSummary};
use crate::service::orders as order_service;
use crate::service::orders::OrderLine;
use crate::store::PgStore;

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders).post(create_order))
        .route(
            "/api/orders/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/api/orders/{id}/status", put(update_order_status))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub table_id: i32,
    pub items: Vec<OrderLine>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

async fn list_orders(
    user: AuthUser,
    State(_state): State<AppState>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    let mut store = PgStore::connect()?;
    let listed = order_service::list_orders(&mut store, &user)?;
    Ok(Json(listed))
}

async fn get_order(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>, AppError> {
    let mut store = PgStore::connect()?;
    let detail = order_service::get_order(&mut store, id, &user)?;
    Ok(Json(detail))
}

async fn create_order(
    user: AuthUser,
    State(_state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    user.require_role(&[Role::Waiter, Role::Admin])?;

    let mut store = PgStore::connect()?;
    let status = body.status.unwrap_or(OrderStatus::Pending);
    let created =
        order_service::create_order(&mut store, body.table_id, &body.items, user.id, status)?;

    info!(
        "order {} created by user {} with total {}",
        created.order_id, user.id, created.total
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "order created",
            "order_id": created.order_id,
            "total": created.total
        })),
    ))
}

async fn update_order(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateOrderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Waiter, Role::Admin])?;

    let mut store = PgStore::connect()?;
    let total = order_service::update_order(&mut store, id, &body.items, &user)?;

    info!("order {id} updated by user {} with total {total}", user.id);
    Ok(Json(json!({
        "message": "order updated",
        "total": total
    })))
}

async fn update_order_status(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateOrderStatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Waiter, Role::Admin, Role::Cook])?;

    let mut store = PgStore::connect()?;
    order_service::update_order_status(&mut store, id, body.status, &user)?;

    info!("order {id} moved to {} by user {}", body.status, user.id);
    Ok(Json(json!({ "message": "order status updated" })))
}

async fn delete_order(
    user: AuthUser,
    State(_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let mut store = PgStore::connect()?;
    order_service::delete_order(&mut store, id, &user)?;

    info!("order {id} deleted by admin {}", user.id);
    Ok(Json(json!({ "message": "order deleted" })))
}
