//! Read-side shaping of order aggregates into the flattened API
//! representation. No invariants of its own.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Dish, OrderItem, OrderStatus};
use crate::store::OrderRecord;

#[derive(Debug, Serialize, PartialEq)]
pub struct OrderSummary {
    pub id: i32,
    pub table_id: i32,
    pub waiter_id: i32,
    pub status: OrderStatus,
    pub total: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub table_number: i32,
    pub waiter_name: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OrderItemDetail {
    pub id: i32,
    pub dish_id: i32,
    pub quantity: i32,
    /// Price snapshot stored on the line item.
    pub unit_price: BigDecimal,
    pub dish_name: String,
    /// Live catalog price, for display only.
    pub current_dish_price: BigDecimal,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub items: Vec<OrderItemDetail>,
}

pub fn order_summary(record: OrderRecord) -> OrderSummary {
    let OrderRecord {
        order,
        table_number,
        waiter_name,
    } = record;
    OrderSummary {
        id: order.id,
        table_id: order.table_id,
        waiter_id: order.waiter_id,
        status: order.status,
        total: order.total,
        created_at: order.created_at,
        updated_at: order.updated_at,
        table_number,
        waiter_name,
    }
}

pub fn order_detail(record: OrderRecord, items: Vec<(OrderItem, Dish)>) -> OrderDetail {
    OrderDetail {
        summary: order_summary(record),
        items: items
            .into_iter()
            .map(|(item, dish)| OrderItemDetail {
                id: item.id,
                dish_id: item.dish_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                dish_name: dish.name,
                current_dish_price: dish.price,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Order;

    fn sample_record() -> OrderRecord {
        let now = Utc::now();
        OrderRecord {
            order: Order {
                id: 1,
                table_id: 2,
                waiter_id: 3,
                status: OrderStatus::Pending,
                total: BigDecimal::from(25),
                created_at: now,
                updated_at: now,
            },
            table_number: 7,
            waiter_name: "Ana".to_string(),
        }
    }

    #[test]
    fn summary_flattens_table_and_waiter() {
        let summary = order_summary(sample_record());
        assert_eq!(summary.table_number, 7);
        assert_eq!(summary.waiter_name, "Ana");
        assert_eq!(summary.status, OrderStatus::Pending);
    }

    #[test]
    fn detail_exposes_snapshot_and_live_price() {
        let now = Utc::now();
        let item = OrderItem {
            id: 10,
            order_id: 1,
            dish_id: 4,
            quantity: 2,
            unit_price: BigDecimal::from(10),
        };
        let dish = Dish {
            id: 4,
            name: "Paella".to_string(),
            description: String::new(),
            // catalog price has moved since the snapshot was taken
            price: BigDecimal::from(12),
            available: true,
            created_at: now,
            updated_at: now,
        };
        let detail = order_detail(sample_record(), vec![(item, dish)]);
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].unit_price, BigDecimal::from(10));
        assert_eq!(detail.items[0].current_dish_price, BigDecimal::from(12));
        assert_eq!(detail.items[0].dish_name, "Paella");
    }
}
