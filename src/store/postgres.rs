use anyhow::anyhow;
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;

use crate::error::AppError;
use crate::models::{
    DiningTable, Dish, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, TableStatus,
};
use crate::schema::{dishes, order_items, orders, tables, users};
use crate::store::{OrderRecord, OrderScope, Store};

/// Opens one connection per request, the way the sibling services do.
pub fn db_conn() -> Result<PgConnection, AppError> {
    crate::establish_connection()
        .map_err(|err| AppError::Internal(anyhow!("failed to connect to database: {err}")))
}

/// Diesel/Postgres implementation of [`Store`].
pub struct PgStore {
    conn: PgConnection,
}

impl PgStore {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    pub fn connect() -> Result<Self, AppError> {
        Ok(Self { conn: db_conn()? })
    }
}

impl Store for PgStore {
    fn transaction<T, F>(&mut self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Self) -> Result<T, AppError>,
    {
        AnsiTransactionManager::begin_transaction(&mut self.conn)?;
        match f(self) {
            Ok(value) => {
                AnsiTransactionManager::commit_transaction(&mut self.conn)?;
                Ok(value)
            }
            Err(err) => {
                AnsiTransactionManager::rollback_transaction(&mut self.conn)?;
                Err(err)
            }
        }
    }

    fn table_for_update(&mut self, table_id: i32) -> Result<Option<DiningTable>, AppError> {
        let table = tables::table
            .select(DiningTable::as_select())
            .find(table_id)
            .for_update()
            .first(&mut self.conn)
            .optional()?;
        Ok(table)
    }

    fn set_table_status(&mut self, table_id: i32, status: TableStatus) -> Result<(), AppError> {
        diesel::update(tables::table.find(table_id))
            .set((tables::status.eq(status), tables::updated_at.eq(Utc::now())))
            .execute(&mut self.conn)?;
        Ok(())
    }

    fn available_dish(&mut self, dish_id: i32) -> Result<Option<Dish>, AppError> {
        let dish = dishes::table
            .filter(dishes::id.eq(dish_id))
            .filter(dishes::available.eq(true))
            .select(Dish::as_select())
            .first(&mut self.conn)
            .optional()?;
        Ok(dish)
    }

    fn insert_order(&mut self, order: NewOrder) -> Result<i32, AppError> {
        let order_id = diesel::insert_into(orders::table)
            .values(&order)
            .returning(orders::id)
            .get_result(&mut self.conn)?;
        Ok(order_id)
    }

    fn insert_order_items(&mut self, items: &[NewOrderItem]) -> Result<(), AppError> {
        diesel::insert_into(order_items::table)
            .values(items)
            .execute(&mut self.conn)?;
        Ok(())
    }

    fn delete_order_items(&mut self, order_id: i32) -> Result<(), AppError> {
        diesel::delete(order_items::table.filter(order_items::order_id.eq(order_id)))
            .execute(&mut self.conn)?;
        Ok(())
    }

    fn find_order(&mut self, scope: &OrderScope) -> Result<Option<Order>, AppError> {
        let mut query = orders::table
            .select(Order::as_select())
            .filter(orders::id.eq(scope.order_id))
            .into_boxed();
        if let Some(waiter_id) = scope.waiter_id {
            query = query.filter(orders::waiter_id.eq(waiter_id));
        }
        if let Some(status) = scope.status {
            query = query.filter(orders::status.eq(status));
        }
        Ok(query.first(&mut self.conn).optional()?)
    }

    fn set_order_total(&mut self, order_id: i32, total: &BigDecimal) -> Result<(), AppError> {
        diesel::update(orders::table.find(order_id))
            .set((orders::total.eq(total), orders::updated_at.eq(Utc::now())))
            .execute(&mut self.conn)?;
        Ok(())
    }

    fn set_order_status(&mut self, order_id: i32, status: OrderStatus) -> Result<(), AppError> {
        diesel::update(orders::table.find(order_id))
            .set((orders::status.eq(status), orders::updated_at.eq(Utc::now())))
            .execute(&mut self.conn)?;
        Ok(())
    }

    fn delete_order(&mut self, order_id: i32) -> Result<(), AppError> {
        diesel::delete(orders::table.find(order_id)).execute(&mut self.conn)?;
        Ok(())
    }

    fn list_orders(&mut self, waiter_id: Option<i32>) -> Result<Vec<OrderRecord>, AppError> {
        let mut query = orders::table
            .inner_join(tables::table)
            .inner_join(users::table)
            .select((Order::as_select(), tables::number, users::name))
            .order(orders::created_at.desc())
            .into_boxed();
        if let Some(waiter_id) = waiter_id {
            query = query.filter(orders::waiter_id.eq(waiter_id));
        }
        let rows: Vec<(Order, i32, String)> = query.load(&mut self.conn)?;
        Ok(rows
            .into_iter()
            .map(|(order, table_number, waiter_name)| OrderRecord {
                order,
                table_number,
                waiter_name,
            })
            .collect())
    }

    fn find_order_record(&mut self, scope: &OrderScope) -> Result<Option<OrderRecord>, AppError> {
        let mut query = orders::table
            .inner_join(tables::table)
            .inner_join(users::table)
            .select((Order::as_select(), tables::number, users::name))
            .filter(orders::id.eq(scope.order_id))
            .into_boxed();
        if let Some(waiter_id) = scope.waiter_id {
            query = query.filter(orders::waiter_id.eq(waiter_id));
        }
        if let Some(status) = scope.status {
            query = query.filter(orders::status.eq(status));
        }
        let row: Option<(Order, i32, String)> = query.first(&mut self.conn).optional()?;
        Ok(row.map(|(order, table_number, waiter_name)| OrderRecord {
            order,
            table_number,
            waiter_name,
        }))
    }

    fn order_items_with_dishes(
        &mut self,
        order_id: i32,
    ) -> Result<Vec<(OrderItem, Dish)>, AppError> {
        let rows = order_items::table
            .inner_join(dishes::table)
            .filter(order_items::order_id.eq(order_id))
            .select((OrderItem::as_select(), Dish::as_select()))
            .order(order_items::id.asc())
            .load(&mut self.conn)?;
        Ok(rows)
    }
}
