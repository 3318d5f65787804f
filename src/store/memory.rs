use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::Utc;

use crate::error::AppError;
use crate::models::{
    DiningTable, Dish, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Role, TableStatus,
    User,
};
use crate::store::{OrderRecord, OrderScope, Store};

#[derive(Clone, Default)]
struct State {
    users: BTreeMap<i32, User>,
    dishes: BTreeMap<i32, Dish>,
    tables: BTreeMap<i32, DiningTable>,
    orders: BTreeMap<i32, Order>,
    order_items: BTreeMap<i32, OrderItem>,
    next_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`Store`] with the same transaction contract as the Postgres
/// one: a failed closure leaves no partial writes behind. Used by the order
/// service tests.
#[derive(Default)]
pub struct MemoryStore {
    state: State,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&mut self, name: &str, role: Role) -> i32 {
        let id = self.state.next_id();
        let now = Utc::now();
        self.state.users.insert(
            id,
            User {
                id,
                name: name.to_string(),
                email: format!("user{id}@example.test"),
                password_hash: String::new(),
                role,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn seed_table(&mut self, number: i32, capacity: i32, status: TableStatus) -> i32 {
        let id = self.state.next_id();
        let now = Utc::now();
        self.state.tables.insert(
            id,
            DiningTable {
                id,
                number,
                capacity,
                status,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn seed_dish(&mut self, name: &str, price: BigDecimal, available: bool) -> i32 {
        let id = self.state.next_id();
        let now = Utc::now();
        self.state.dishes.insert(
            id,
            Dish {
                id,
                name: name.to_string(),
                description: String::new(),
                price,
                available,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn set_dish_price(&mut self, dish_id: i32, price: BigDecimal) {
        if let Some(dish) = self.state.dishes.get_mut(&dish_id) {
            dish.price = price;
            dish.updated_at = Utc::now();
        }
    }

    pub fn table(&self, table_id: i32) -> Option<&DiningTable> {
        self.state.tables.get(&table_id)
    }

    pub fn order(&self, order_id: i32) -> Option<&Order> {
        self.state.orders.get(&order_id)
    }

    pub fn items_of(&self, order_id: i32) -> Vec<OrderItem> {
        self.state
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    fn matches(order: &Order, scope: &OrderScope) -> bool {
        order.id == scope.order_id
            && scope.waiter_id.is_none_or(|w| order.waiter_id == w)
            && scope.status.is_none_or(|s| order.status == s)
    }

    fn record(&self, order: &Order) -> OrderRecord {
        OrderRecord {
            order: order.clone(),
            table_number: self
                .state
                .tables
                .get(&order.table_id)
                .map(|t| t.number)
                .unwrap_or_default(),
            waiter_name: self
                .state
                .users
                .get(&order.waiter_id)
                .map(|u| u.name.clone())
                .unwrap_or_default(),
        }
    }
}

impl Store for MemoryStore {
    fn transaction<T, F>(&mut self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Self) -> Result<T, AppError>,
    {
        let snapshot = self.state.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state = snapshot;
                Err(err)
            }
        }
    }

    fn table_for_update(&mut self, table_id: i32) -> Result<Option<DiningTable>, AppError> {
        Ok(self.state.tables.get(&table_id).cloned())
    }

    fn set_table_status(&mut self, table_id: i32, status: TableStatus) -> Result<(), AppError> {
        if let Some(table) = self.state.tables.get_mut(&table_id) {
            table.status = status;
            table.updated_at = Utc::now();
        }
        Ok(())
    }

    fn available_dish(&mut self, dish_id: i32) -> Result<Option<Dish>, AppError> {
        Ok(self
            .state
            .dishes
            .get(&dish_id)
            .filter(|dish| dish.available)
            .cloned())
    }

    fn insert_order(&mut self, order: NewOrder) -> Result<i32, AppError> {
        let id = self.state.next_id();
        let now = Utc::now();
        self.state.orders.insert(
            id,
            Order {
                id,
                table_id: order.table_id,
                waiter_id: order.waiter_id,
                status: order.status,
                total: order.total,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    fn insert_order_items(&mut self, items: &[NewOrderItem]) -> Result<(), AppError> {
        for item in items {
            let id = self.state.next_id();
            self.state.order_items.insert(
                id,
                OrderItem {
                    id,
                    order_id: item.order_id,
                    dish_id: item.dish_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price.clone(),
                },
            );
        }
        Ok(())
    }

    fn delete_order_items(&mut self, order_id: i32) -> Result<(), AppError> {
        self.state
            .order_items
            .retain(|_, item| item.order_id != order_id);
        Ok(())
    }

    fn find_order(&mut self, scope: &OrderScope) -> Result<Option<Order>, AppError> {
        Ok(self
            .state
            .orders
            .values()
            .find(|order| Self::matches(order, scope))
            .cloned())
    }

    fn set_order_total(&mut self, order_id: i32, total: &BigDecimal) -> Result<(), AppError> {
        if let Some(order) = self.state.orders.get_mut(&order_id) {
            order.total = total.clone();
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    fn set_order_status(&mut self, order_id: i32, status: OrderStatus) -> Result<(), AppError> {
        if let Some(order) = self.state.orders.get_mut(&order_id) {
            order.status = status;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    fn delete_order(&mut self, order_id: i32) -> Result<(), AppError> {
        self.state.orders.remove(&order_id);
        Ok(())
    }

    fn list_orders(&mut self, waiter_id: Option<i32>) -> Result<Vec<OrderRecord>, AppError> {
        let mut orders: Vec<&Order> = self
            .state
            .orders
            .values()
            .filter(|order| waiter_id.is_none_or(|w| order.waiter_id == w))
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders.into_iter().map(|order| self.record(order)).collect())
    }

    fn find_order_record(&mut self, scope: &OrderScope) -> Result<Option<OrderRecord>, AppError> {
        Ok(self
            .state
            .orders
            .values()
            .find(|order| Self::matches(order, scope))
            .map(|order| self.record(order)))
    }

    fn order_items_with_dishes(
        &mut self,
        order_id: i32,
    ) -> Result<Vec<(OrderItem, Dish)>, AppError> {
        Ok(self
            .state
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .filter_map(|item| {
                self.state
                    .dishes
                    .get(&item.dish_id)
                    .map(|dish| (item.clone(), dish.clone()))
            })
            .collect())
    }
}
