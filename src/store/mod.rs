pub mod memory;
pub mod postgres;

use bigdecimal::BigDecimal;

use crate::error::AppError;
use crate::models::{
    DiningTable, Dish, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, TableStatus,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Query scope for a single order. The caller's authorization is encoded in
/// the lookup itself, so "not found" and "not yours" collapse into one
/// outcome and nothing is leaked about an order's existence.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderScope {
    pub order_id: i32,
    pub waiter_id: Option<i32>,
    pub status: Option<OrderStatus>,
}

impl OrderScope {
    pub fn new(order_id: i32) -> Self {
        Self {
            order_id,
            waiter_id: None,
            status: None,
        }
    }

    pub fn owned_by(mut self, waiter_id: i32) -> Self {
        self.waiter_id = Some(waiter_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// An order joined with its table number and waiter name, the read-side
/// shape the presenter flattens.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderRecord {
    pub order: Order,
    pub table_number: i32,
    pub waiter_name: String,
}

/// Row operations the order lifecycle service needs, behind a trait so the
/// service can be driven by either Postgres or the in-memory fake.
///
/// `transaction` delegates atomicity to the backing store: every operation
/// inside the closure commits together or not at all, and an `Err` return
/// rolls back before propagating unchanged.
pub trait Store {
    fn transaction<T, F>(&mut self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Self) -> Result<T, AppError>;

    /// Loads a table and, on the Postgres side, locks its row for the rest
    /// of the transaction so two concurrent creates cannot both observe
    /// "available".
    fn table_for_update(&mut self, table_id: i32) -> Result<Option<DiningTable>, AppError>;

    fn set_table_status(&mut self, table_id: i32, status: TableStatus) -> Result<(), AppError>;

    /// Looks a dish up only if it is currently marked available.
    fn available_dish(&mut self, dish_id: i32) -> Result<Option<Dish>, AppError>;

    fn insert_order(&mut self, order: NewOrder) -> Result<i32, AppError>;

    fn insert_order_items(&mut self, items: &[NewOrderItem]) -> Result<(), AppError>;

    fn delete_order_items(&mut self, order_id: i32) -> Result<(), AppError>;

    fn find_order(&mut self, scope: &OrderScope) -> Result<Option<Order>, AppError>;

    fn set_order_total(&mut self, order_id: i32, total: &BigDecimal) -> Result<(), AppError>;

    fn set_order_status(&mut self, order_id: i32, status: OrderStatus) -> Result<(), AppError>;

    fn delete_order(&mut self, order_id: i32) -> Result<(), AppError>;

    /// Orders joined with table number and waiter name, newest first,
    /// optionally restricted to one waiter.
    fn list_orders(&mut self, waiter_id: Option<i32>) -> Result<Vec<OrderRecord>, AppError>;

    fn find_order_record(&mut self, scope: &OrderScope) -> Result<Option<OrderRecord>, AppError>;

    /// Line items of an order joined with their dish rows.
    fn order_items_with_dishes(
        &mut self,
        order_id: i32,
    ) -> Result<Vec<(OrderItem, Dish)>, AppError>;
}
