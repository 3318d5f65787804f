use std::fmt;
use std::io::Write;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
};
use serde::{Deserialize, Serialize};

use crate::schema::{dishes, order_items, orders, tables, users};

/// Caller role. Closed set; authorization matches on it exhaustively.
#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::UserRole)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cook,
    Waiter,
}

impl ToSql<crate::schema::sql_types::UserRole, Pg> for Role {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            Role::Admin => out.write_all(b"ADMIN")?,
            Role::Cook => out.write_all(b"COOK")?,
            Role::Waiter => out.write_all(b"WAITER")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::UserRole, Pg> for Role {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"ADMIN" => Ok(Role::Admin),
            b"COOK" => Ok(Role::Cook),
            b"WAITER" => Ok(Role::Waiter),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::TableStatus)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    Occupied,
    Cleaning,
}

impl ToSql<crate::schema::sql_types::TableStatus, Pg> for TableStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            TableStatus::Available => out.write_all(b"AVAILABLE")?,
            TableStatus::Occupied => out.write_all(b"OCCUPIED")?,
            TableStatus::Cleaning => out.write_all(b"CLEANING")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::TableStatus, Pg> for TableStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"AVAILABLE" => Ok(TableStatus::Available),
            b"OCCUPIED" => Ok(TableStatus::Occupied),
            b"CLEANING" => Ok(TableStatus::Cleaning),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

/// Order lifecycle state.
///
/// A draft does not occupy its table and is the only editable state. The
/// table is occupied while its order is pending or in preparation and is
/// released when the order is served or deleted.
#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::OrderStatus)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Pending,
    InPreparation,
    Served,
}

impl OrderStatus {
    /// Strict transition graph: forward only, no re-opening a served order,
    /// no demoting back to draft.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Draft, Pending) | (Pending, InPreparation) | (Pending, Served) | (InPreparation, Served)
        )
    }

    /// Whether an order in this state keeps its table occupied.
    pub fn occupies_table(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::InPreparation)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Pending => "pending",
            OrderStatus::InPreparation => "in_preparation",
            OrderStatus::Served => "served",
        };
        f.write_str(s)
    }
}

impl ToSql<crate::schema::sql_types::OrderStatus, Pg> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            OrderStatus::Draft => out.write_all(b"DRAFT")?,
            OrderStatus::Pending => out.write_all(b"PENDING")?,
            OrderStatus::InPreparation => out.write_all(b"IN_PREPARATION")?,
            OrderStatus::Served => out.write_all(b"SERVED")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::OrderStatus, Pg> for OrderStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"DRAFT" => Ok(OrderStatus::Draft),
            b"PENDING" => Ok(OrderStatus::Pending),
            b"IN_PREPARATION" => Ok(OrderStatus::InPreparation),
            b"SERVED" => Ok(OrderStatus::Served),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User row without the password hash; the only user shape ever serialized.
#[derive(Queryable, Selectable, Serialize, Clone, Debug, PartialEq)]
#[diesel(table_name = users)]
pub struct UserPublic {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug, PartialEq)]
#[diesel(table_name = dishes)]
pub struct Dish {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = dishes)]
pub struct NewDish {
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub available: bool,
}

/// `Table` would collide with `diesel::Table` under the prelude.
#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug, PartialEq)]
#[diesel(table_name = tables)]
pub struct DiningTable {
    pub id: i32,
    pub number: i32,
    pub capacity: i32,
    pub status: TableStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = tables)]
pub struct NewDiningTable {
    pub number: i32,
    pub capacity: i32,
    pub status: TableStatus,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug, PartialEq)]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: i32,
    pub table_id: i32,
    pub waiter_id: i32,
    pub status: OrderStatus,
    pub total: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = orders)]
pub struct NewOrder {
    pub table_id: i32,
    pub waiter_id: i32,
    pub status: OrderStatus,
    pub total: BigDecimal,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Order))]
#[diesel(table_name = order_items)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub dish_id: i32,
    pub quantity: i32,
    /// Dish price captured when the item was written; immune to later
    /// catalog price changes.
    pub unit_price: BigDecimal,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = order_items)]
pub struct NewOrderItem {
    pub order_id: i32,
    pub dish_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}
