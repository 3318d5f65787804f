//! Order lifecycle service: role-scoped reads, price snapshotting, and the
//! status/table-occupancy coupling. Every multi-step mutation runs inside a
//! single store transaction; any error rolls the whole operation back.

use bigdecimal::{BigDecimal, Zero};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{NewOrder, NewOrderItem, OrderStatus, Role, TableStatus};
use crate::presenter::{self, OrderDetail, OrderSummary};
use crate::store::{OrderScope, Store};

/// One requested line of an order: a dish and how many of it.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct OrderLine {
    pub dish_id: i32,
    pub quantity: i32,
}

#[derive(Debug, PartialEq)]
pub struct CreatedOrder {
    pub order_id: i32,
    pub total: BigDecimal,
}

struct PricedLine {
    dish_id: i32,
    quantity: i32,
    unit_price: BigDecimal,
}

/// Encodes the caller's visibility in the lookup itself: waiters only ever
/// match their own orders, admins and cooks are unrestricted.
fn scope_for(order_id: i32, caller: &AuthUser) -> OrderScope {
    let scope = OrderScope::new(order_id);
    match caller.role {
        Role::Waiter => scope.owned_by(caller.id),
        Role::Admin | Role::Cook => scope,
    }
}

/// Validates each requested line against the live catalog and snapshots the
/// current dish price. Fails on the first missing or unavailable dish,
/// naming it.
fn price_lines<S: Store>(
    store: &mut S,
    lines: &[OrderLine],
) -> Result<(BigDecimal, Vec<PricedLine>), AppError> {
    let mut total = BigDecimal::zero();
    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::validation(format!(
                "invalid quantity for dish {}",
                line.dish_id
            )));
        }
        let dish = store.available_dish(line.dish_id)?.ok_or_else(|| {
            AppError::validation(format!("dish {} not found or unavailable", line.dish_id))
        })?;
        total += &dish.price * BigDecimal::from(line.quantity);
        priced.push(PricedLine {
            dish_id: line.dish_id,
            quantity: line.quantity,
            unit_price: dish.price,
        });
    }
    Ok((total, priced))
}

/// Orders visible to the caller, newest first, joined with table number and
/// waiter name.
pub fn list_orders<S: Store>(
    store: &mut S,
    caller: &AuthUser,
) -> Result<Vec<OrderSummary>, AppError> {
    let waiter_id = (caller.role == Role::Waiter).then_some(caller.id);
    let records = store.list_orders(waiter_id)?;
    Ok(records.into_iter().map(presenter::order_summary).collect())
}

pub fn get_order<S: Store>(
    store: &mut S,
    order_id: i32,
    caller: &AuthUser,
) -> Result<OrderDetail, AppError> {
    let scope = scope_for(order_id, caller);
    let record = store
        .find_order_record(&scope)?
        .ok_or_else(|| AppError::not_found("order not found"))?;
    let items = store.order_items_with_dishes(record.order.id)?;
    Ok(presenter::order_detail(record, items))
}

/// Creates an order for a table. A non-draft order requires the table to be
/// available and occupies it; a draft leaves the table untouched.
pub fn create_order<S: Store>(
    store: &mut S,
    table_id: i32,
    lines: &[OrderLine],
    waiter_id: i32,
    status: OrderStatus,
) -> Result<CreatedOrder, AppError> {
    if lines.is_empty() {
        return Err(AppError::validation("order must contain at least one item"));
    }
    if !matches!(status, OrderStatus::Draft | OrderStatus::Pending) {
        return Err(AppError::validation(
            "initial status must be draft or pending",
        ));
    }

    store.transaction(|tx| {
        let table = tx
            .table_for_update(table_id)?
            .ok_or_else(|| AppError::not_found("table not found"))?;
        if status != OrderStatus::Draft && table.status != TableStatus::Available {
            return Err(AppError::validation("table not available"));
        }

        let (total, priced) = price_lines(tx, lines)?;

        let order_id = tx.insert_order(NewOrder {
            table_id,
            waiter_id,
            status,
            total: total.clone(),
        })?;
        let items: Vec<NewOrderItem> = priced
            .into_iter()
            .map(|line| NewOrderItem {
                order_id,
                dish_id: line.dish_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        tx.insert_order_items(&items)?;

        if status != OrderStatus::Draft {
            tx.set_table_status(table.id, TableStatus::Occupied)?;
        }

        Ok(CreatedOrder { order_id, total })
    })
}

/// Replaces the line items of a draft order and recomputes its total.
/// Destroy-then-recreate on purpose: the same input always converges to the
/// same set of items. Only drafts match the lookup, so a non-draft order
/// surfaces as not found rather than a separate authorization error.
pub fn update_order<S: Store>(
    store: &mut S,
    order_id: i32,
    lines: &[OrderLine],
    caller: &AuthUser,
) -> Result<BigDecimal, AppError> {
    if lines.is_empty() {
        return Err(AppError::validation("order must contain at least one item"));
    }

    store.transaction(|tx| {
        let scope = scope_for(order_id, caller).with_status(OrderStatus::Draft);
        let order = tx
            .find_order(&scope)?
            .ok_or_else(|| AppError::not_found("order not found or not editable"))?;

        let (total, priced) = price_lines(tx, lines)?;

        tx.delete_order_items(order.id)?;
        let items: Vec<NewOrderItem> = priced
            .into_iter()
            .map(|line| NewOrderItem {
                order_id: order.id,
                dish_id: line.dish_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        tx.insert_order_items(&items)?;
        tx.set_order_total(order.id, &total)?;

        Ok(total)
    })
}

/// Moves an order along the transition graph, keeping its table's occupancy
/// in lockstep: entering `pending` from a draft claims the table, entering
/// `served` releases it.
pub fn update_order_status<S: Store>(
    store: &mut S,
    order_id: i32,
    new_status: OrderStatus,
    caller: &AuthUser,
) -> Result<(), AppError> {
    store.transaction(|tx| {
        let scope = scope_for(order_id, caller);
        let order = tx
            .find_order(&scope)?
            .ok_or_else(|| AppError::not_found("order not found"))?;

        if !order.status.can_transition_to(new_status) {
            return Err(AppError::validation(format!(
                "cannot change order status from {} to {}",
                order.status, new_status
            )));
        }

        if order.status == OrderStatus::Draft && new_status == OrderStatus::Pending {
            let table = tx
                .table_for_update(order.table_id)?
                .ok_or_else(|| AppError::not_found("table not found"))?;
            if table.status != TableStatus::Available {
                return Err(AppError::validation("table not available"));
            }
            tx.set_table_status(order.table_id, TableStatus::Occupied)?;
        }

        tx.set_order_status(order.id, new_status)?;

        if new_status == OrderStatus::Served {
            tx.set_table_status(order.table_id, TableStatus::Available)?;
        }

        Ok(())
    })
}

/// Deletes an order with its line items and releases its table.
pub fn delete_order<S: Store>(
    store: &mut S,
    order_id: i32,
    caller: &AuthUser,
) -> Result<(), AppError> {
    store.transaction(|tx| {
        let scope = scope_for(order_id, caller);
        let order = tx
            .find_order(&scope)?
            .ok_or_else(|| AppError::not_found("order not found"))?;

        tx.delete_order_items(order.id)?;
        tx.set_table_status(order.table_id, TableStatus::Available)?;
        tx.delete_order(order.id)?;

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderStatus::*, Role, TableStatus};
    use crate::store::MemoryStore;

    fn waiter(id: i32) -> AuthUser {
        AuthUser {
            id,
            role: Role::Waiter,
        }
    }

    fn admin(id: i32) -> AuthUser {
        AuthUser {
            id,
            role: Role::Admin,
        }
    }

    fn cook(id: i32) -> AuthUser {
        AuthUser {
            id,
            role: Role::Cook,
        }
    }

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn line(dish_id: i32, quantity: i32) -> OrderLine {
        OrderLine { dish_id, quantity }
    }

    /// Store with one waiter, one available table and a couple of dishes.
    fn setup() -> (MemoryStore, i32, i32, i32, i32) {
        let mut store = MemoryStore::new();
        let waiter_id = store.seed_user("Ana", Role::Waiter);
        let table_id = store.seed_table(1, 4, TableStatus::Available);
        let paella = store.seed_dish("Paella", dec("10.00"), true);
        let gazpacho = store.seed_dish("Gazpacho", dec("4.50"), true);
        (store, waiter_id, table_id, paella, gazpacho)
    }

    #[test]
    fn create_pending_order_computes_total_and_occupies_table() {
        let (mut store, waiter_id, table_id, paella, _) = setup();

        let created =
            create_order(&mut store, table_id, &[line(paella, 2)], waiter_id, Pending).unwrap();

        assert_eq!(created.total, dec("20.00"));
        assert_eq!(store.table(table_id).unwrap().status, TableStatus::Occupied);
        let order = store.order(created.order_id).unwrap();
        assert_eq!(order.status, Pending);
        assert_eq!(order.total, dec("20.00"));
    }

    #[test]
    fn create_draft_order_leaves_table_available() {
        let (mut store, waiter_id, table_id, paella, _) = setup();

        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Draft).unwrap();

        assert_eq!(store.order(created.order_id).unwrap().status, Draft);
        assert_eq!(
            store.table(table_id).unwrap().status,
            TableStatus::Available
        );
    }

    #[test]
    fn create_on_occupied_table_fails_and_writes_nothing() {
        let (mut store, waiter_id, _, paella, _) = setup();
        let occupied = store.seed_table(2, 2, TableStatus::Occupied);

        let err = create_order(&mut store, occupied, &[line(paella, 1)], waiter_id, Pending)
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(msg) if msg == "table not available"));
        assert!(list_orders(&mut store, &admin(99)).unwrap().is_empty());
    }

    #[test]
    fn create_with_unavailable_dish_rolls_back_entirely() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let off_menu = store.seed_dish("Fabada", dec("8.00"), false);

        let err = create_order(
            &mut store,
            table_id,
            &[line(paella, 1), line(off_menu, 1)],
            waiter_id,
            Pending,
        )
        .unwrap_err();

        assert!(
            matches!(err, AppError::Validation(ref msg) if msg.contains(&off_menu.to_string()))
        );
        // no order, no partial line items, table untouched
        assert!(list_orders(&mut store, &admin(99)).unwrap().is_empty());
        assert_eq!(
            store.table(table_id).unwrap().status,
            TableStatus::Available
        );
    }

    #[test]
    fn create_rejects_empty_item_list() {
        let (mut store, waiter_id, table_id, _, _) = setup();
        let err = create_order(&mut store, table_id, &[], waiter_id, Pending).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn create_rejects_missing_table() {
        let (mut store, waiter_id, _, paella, _) = setup();
        let err = create_order(&mut store, 9999, &[line(paella, 1)], waiter_id, Pending)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn create_rejects_non_initial_status() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let err =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Served).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn create_rejects_non_positive_quantity() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let err =
            create_order(&mut store, table_id, &[line(paella, 0)], waiter_id, Pending).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn total_equals_sum_of_item_snapshots() {
        let (mut store, waiter_id, table_id, paella, gazpacho) = setup();

        let created = create_order(
            &mut store,
            table_id,
            &[line(paella, 2), line(gazpacho, 3)],
            waiter_id,
            Pending,
        )
        .unwrap();

        let items = store.items_of(created.order_id);
        let sum: BigDecimal = items
            .iter()
            .map(|item| &item.unit_price * BigDecimal::from(item.quantity))
            .sum();
        assert_eq!(sum, created.total);
        assert_eq!(created.total, dec("33.50"));
    }

    #[test]
    fn snapshot_price_survives_catalog_price_change() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let created =
            create_order(&mut store, table_id, &[line(paella, 2)], waiter_id, Pending).unwrap();

        store.set_dish_price(paella, dec("15.00"));

        let detail = get_order(&mut store, created.order_id, &waiter(waiter_id)).unwrap();
        assert_eq!(detail.summary.total, dec("20.00"));
        assert_eq!(detail.items[0].unit_price, dec("10.00"));
        assert_eq!(detail.items[0].current_dish_price, dec("15.00"));
    }

    #[test]
    fn update_draft_replaces_items_and_recomputes_total() {
        let (mut store, waiter_id, table_id, paella, gazpacho) = setup();
        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Draft).unwrap();

        let total = update_order(
            &mut store,
            created.order_id,
            &[line(gazpacho, 2)],
            &waiter(waiter_id),
        )
        .unwrap();

        assert_eq!(total, dec("9.00"));
        let items = store.items_of(created.order_id);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].dish_id, gazpacho);
        assert_eq!(store.order(created.order_id).unwrap().total, dec("9.00"));
    }

    #[test]
    fn update_draft_is_idempotent_for_identical_input() {
        let (mut store, waiter_id, table_id, paella, gazpacho) = setup();
        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Draft).unwrap();
        let lines = [line(paella, 2), line(gazpacho, 1)];

        let first = update_order(&mut store, created.order_id, &lines, &waiter(waiter_id)).unwrap();
        let items_first: Vec<_> = store
            .items_of(created.order_id)
            .into_iter()
            .map(|i| (i.dish_id, i.quantity, i.unit_price))
            .collect();

        let second =
            update_order(&mut store, created.order_id, &lines, &waiter(waiter_id)).unwrap();
        let items_second: Vec<_> = store
            .items_of(created.order_id)
            .into_iter()
            .map(|i| (i.dish_id, i.quantity, i.unit_price))
            .collect();

        assert_eq!(first, second);
        assert_eq!(items_first, items_second);
    }

    #[test]
    fn update_of_non_draft_order_is_not_found() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Pending).unwrap();

        let err = update_order(
            &mut store,
            created.order_id,
            &[line(paella, 2)],
            &waiter(waiter_id),
        )
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(msg) if msg == "order not found or not editable"));
    }

    #[test]
    fn update_by_other_waiter_is_not_found() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let other = store.seed_user("Luis", Role::Waiter);
        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Draft).unwrap();

        let err = update_order(
            &mut store,
            created.order_id,
            &[line(paella, 2)],
            &waiter(other),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // an admin may edit any draft
        let total = update_order(&mut store, created.order_id, &[line(paella, 3)], &admin(other))
            .unwrap();
        assert_eq!(total, dec("30.00"));
    }

    #[test]
    fn failed_update_keeps_previous_items_and_total() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let off_menu = store.seed_dish("Fabada", dec("8.00"), false);
        let created =
            create_order(&mut store, table_id, &[line(paella, 2)], waiter_id, Draft).unwrap();

        let err = update_order(
            &mut store,
            created.order_id,
            &[line(off_menu, 1)],
            &waiter(waiter_id),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let items = store.items_of(created.order_id);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].dish_id, paella);
        assert_eq!(store.order(created.order_id).unwrap().total, dec("20.00"));
    }

    #[test]
    fn draft_to_pending_occupies_available_table() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Draft).unwrap();

        update_order_status(&mut store, created.order_id, Pending, &waiter(waiter_id)).unwrap();

        assert_eq!(store.order(created.order_id).unwrap().status, Pending);
        assert_eq!(store.table(table_id).unwrap().status, TableStatus::Occupied);
    }

    #[test]
    fn draft_to_pending_fails_when_table_taken() {
        let (mut store, waiter_id, table_id, paella, gazpacho) = setup();
        let draft =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Draft).unwrap();
        // someone else claims the table in the meantime
        create_order(&mut store, table_id, &[line(gazpacho, 1)], waiter_id, Pending).unwrap();

        let err = update_order_status(&mut store, draft.order_id, Pending, &waiter(waiter_id))
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(msg) if msg == "table not available"));
        assert_eq!(store.order(draft.order_id).unwrap().status, Draft);
    }

    #[test]
    fn serving_an_order_releases_its_table() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Pending).unwrap();

        update_order_status(&mut store, created.order_id, InPreparation, &cook(50)).unwrap();
        assert_eq!(store.table(table_id).unwrap().status, TableStatus::Occupied);

        update_order_status(&mut store, created.order_id, Served, &cook(50)).unwrap();
        assert_eq!(store.order(created.order_id).unwrap().status, Served);
        assert_eq!(
            store.table(table_id).unwrap().status,
            TableStatus::Available
        );
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Pending).unwrap();

        let err = update_order_status(&mut store, created.order_id, Draft, &admin(1)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        update_order_status(&mut store, created.order_id, Served, &admin(1)).unwrap();
        let err =
            update_order_status(&mut store, created.order_id, Pending, &admin(1)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.order(created.order_id).unwrap().status, Served);
    }

    #[test]
    fn waiter_cannot_fetch_someone_elses_order() {
        let mut store = MemoryStore::new();
        let owner = store.seed_user("Ana", Role::Waiter);
        let other = store.seed_user("Luis", Role::Waiter);
        let table_id = store.seed_table(1, 4, TableStatus::Available);
        let paella = store.seed_dish("Paella", dec("10.00"), true);
        let created = create_order(&mut store, table_id, &[line(paella, 1)], owner, Pending)
            .unwrap();

        let err = get_order(&mut store, created.order_id, &waiter(other)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // the same id resolves fine for an admin
        let detail = get_order(&mut store, created.order_id, &admin(99)).unwrap();
        assert_eq!(detail.summary.id, created.order_id);
        assert_eq!(detail.summary.waiter_name, "Ana");
        assert_eq!(detail.summary.table_number, 1);
    }

    #[test]
    fn list_is_scoped_for_waiters_and_unfiltered_otherwise() {
        let mut store = MemoryStore::new();
        let ana = store.seed_user("Ana", Role::Waiter);
        let luis = store.seed_user("Luis", Role::Waiter);
        let t1 = store.seed_table(1, 4, TableStatus::Available);
        let t2 = store.seed_table(2, 4, TableStatus::Available);
        let paella = store.seed_dish("Paella", dec("10.00"), true);
        create_order(&mut store, t1, &[line(paella, 1)], ana, Pending).unwrap();
        create_order(&mut store, t2, &[line(paella, 1)], luis, Pending).unwrap();

        assert_eq!(list_orders(&mut store, &waiter(ana)).unwrap().len(), 1);
        assert_eq!(list_orders(&mut store, &admin(99)).unwrap().len(), 2);
        assert_eq!(list_orders(&mut store, &cook(98)).unwrap().len(), 2);
    }

    #[test]
    fn list_is_newest_first() {
        let mut store = MemoryStore::new();
        let ana = store.seed_user("Ana", Role::Waiter);
        let t1 = store.seed_table(1, 4, TableStatus::Available);
        let t2 = store.seed_table(2, 4, TableStatus::Available);
        let paella = store.seed_dish("Paella", dec("10.00"), true);
        let first = create_order(&mut store, t1, &[line(paella, 1)], ana, Pending).unwrap();
        let second = create_order(&mut store, t2, &[line(paella, 1)], ana, Pending).unwrap();

        let listed = list_orders(&mut store, &admin(99)).unwrap();
        assert_eq!(listed[0].id, second.order_id);
        assert_eq!(listed[1].id, first.order_id);
    }

    #[test]
    fn delete_removes_items_releases_table_and_hides_order() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let created =
            create_order(&mut store, table_id, &[line(paella, 2)], waiter_id, Pending).unwrap();

        delete_order(&mut store, created.order_id, &admin(1)).unwrap();

        assert!(store.items_of(created.order_id).is_empty());
        assert_eq!(
            store.table(table_id).unwrap().status,
            TableStatus::Available
        );
        let err = get_order(&mut store, created.order_id, &admin(1)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn delete_is_scoped_for_waiters() {
        let (mut store, waiter_id, table_id, paella, _) = setup();
        let other = store.seed_user("Luis", Role::Waiter);
        let created =
            create_order(&mut store, table_id, &[line(paella, 1)], waiter_id, Pending).unwrap();

        let err = delete_order(&mut store, created.order_id, &waiter(other)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.order(created.order_id).is_some());
    }
}
