//! Order application service.
//!
//! `store_order` is the saga trigger: creating an open order commits the
//! aggregate and its facts, then starts one `CreateOrderSaga` run with
//! workflow id `order-saga-<orderId>` — the id dedups retried requests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use emporium_core::clock::Clock;
use emporium_core::error::DomainError;
use emporium_core::event::{dispatch_event, EventDispatcher};
use emporium_core::uow::UnitOfWork;
use emporium_workflow::WorkflowClient;

use crate::domain::{Order, OrderItemsChanged, OrderRepository, OrderStatus, AGGREGATE_TYPE};
use crate::infrastructure::saga::{OrderSagaItem, OrderSagaParams, CREATE_ORDER_SAGA};
use crate::TASK_QUEUE;

const BASE_LOCK: &str = "order_";

fn order_lock(order_id: Uuid) -> String {
    format!("{BASE_LOCK}{order_id}")
}

/// One requested line of `StoreOrder`.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    /// Product being bought.
    pub product_id: Uuid,
    /// Units.
    pub count: i32,
    /// Total price of the line.
    pub total_price: Decimal,
}

/// Input of `StoreOrder`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Existing order to mutate, or `None` to create one.
    pub order_id: Option<Uuid>,
    /// Customer placing the order.
    pub customer_id: Uuid,
    /// Requested status.
    pub status: OrderStatus,
    /// Lines to append.
    pub items: Vec<NewOrderItem>,
}

/// One line of the read model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemData {
    /// Product.
    pub product_id: Uuid,
    /// Units.
    pub count: i32,
    /// Total price of the line.
    pub total_price: Decimal,
}

/// Read model returned by `FindOrder`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderData {
    /// Order id.
    pub order_id: Uuid,
    /// Customer.
    pub customer_id: Uuid,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Lines.
    pub items: Vec<OrderItemData>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete instant, if deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderData {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            customer_id: order.customer_id,
            status: order.status,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemData {
                    product_id: item.product_id,
                    count: item.count,
                    total_price: item.total_price,
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
            deleted_at: order.deleted_at,
        }
    }
}

/// Application service for the order aggregate.
pub struct OrderAppService<U> {
    uow: U,
    clock: Arc<dyn Clock>,
    workflows: Arc<WorkflowClient>,
}

impl<U> OrderAppService<U>
where
    U: UnitOfWork + 'static,
    U::Provider: OrderRepository + EventDispatcher,
{
    /// Service over a unit of work and the workflow client that starts
    /// sagas.
    pub fn new(uow: U, clock: Arc<dyn Clock>, workflows: Arc<WorkflowClient>) -> Self {
        Self {
            uow,
            clock,
            workflows,
        }
    }

    /// Store an order: create it when no id is given, append the requested
    /// items and move to the requested status. Creation of an open order
    /// starts the order saga after commit.
    ///
    /// # Errors
    ///
    /// Domain validation errors from the aggregate, or
    /// [`DomainError::Internal`] when the saga cannot be started.
    pub async fn store_order(&self, new_order: NewOrder) -> Result<Uuid, DomainError> {
        let now = self.clock.now();
        let creating = new_order.order_id.is_none();
        // The lock name must exist before the transaction opens, so fresh
        // orders get their time-ordered id here.
        let order_id = new_order.order_id.unwrap_or_else(Uuid::now_v7);

        let saga_params = self
            .uow
            .execute_locked(vec![order_lock(order_id)], move |provider| {
                Box::pin(async move {
                    let mut order = if creating {
                        let (order, event) = Order::create(order_id, new_order.customer_id, now);
                        provider.store(&order).await?;
                        dispatch_event(provider, AGGREGATE_TYPE, &event).await?;
                        order
                    } else {
                        provider.find(order_id).await?
                    };

                    let mut added = Vec::new();
                    for item in new_order.items {
                        order.add_item(item.product_id, item.count, item.total_price, now)?;
                        added.push(item.product_id);
                    }

                    let status_event = order.set_status(new_order.status, now)?;

                    provider.store(&order).await?;
                    if !added.is_empty() {
                        let event = OrderItemsChanged {
                            order_id,
                            added_items: added,
                            removed_items: Vec::new(),
                        };
                        dispatch_event(provider, AGGREGATE_TYPE, &event).await?;
                    }
                    if let Some(event) = status_event {
                        dispatch_event(provider, AGGREGATE_TYPE, &event).await?;
                    }

                    let saga_params = (creating && order.status == OrderStatus::Open).then(|| {
                        OrderSagaParams {
                            order_id,
                            user_id: order.customer_id,
                            items: order
                                .items
                                .iter()
                                .map(|item| OrderSagaItem {
                                    product_id: item.product_id,
                                    quantity: item.count,
                                })
                                .collect(),
                            total_price: order.total_price(),
                        }
                    });
                    Ok(saga_params)
                })
            })
            .await?;

        if let Some(params) = saga_params {
            self.workflows
                .start_workflow(
                    TASK_QUEUE,
                    CREATE_ORDER_SAGA,
                    &format!("order-saga-{order_id}"),
                    &params,
                )
                .await
                .map_err(DomainError::internal)?;
        }
        Ok(order_id)
    }

    /// Drive the order state machine.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown orders,
    /// [`DomainError::InvalidStateTransition`] for rejected moves.
    pub async fn set_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![order_lock(order_id)], move |provider| {
                Box::pin(async move {
                    let mut order = provider.find(order_id).await?;
                    let Some(event) = order.set_status(status, now)? else {
                        return Ok(());
                    };
                    provider.store(&order).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Remove every line for a product from an open order.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown orders,
    /// [`DomainError::InvalidStateTransition`] when the order is not open.
    pub async fn remove_item(&self, order_id: Uuid, product_id: Uuid) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![order_lock(order_id)], move |provider| {
                Box::pin(async move {
                    let mut order = provider.find(order_id).await?;
                    let Some(event) = order.remove_item(product_id, now)? else {
                        return Ok(());
                    };
                    provider.store(&order).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Soft-delete an order. Idempotent.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn remove_order(&self, order_id: Uuid) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![order_lock(order_id)], move |provider| {
                Box::pin(async move {
                    let mut order = match provider.find(order_id).await {
                        Ok(order) => order,
                        Err(err) if err.is_not_found() => return Ok(()),
                        Err(err) => return Err(err),
                    };
                    let Some(event) = order.mark_deleted(now) else {
                        return Ok(());
                    };
                    provider.store(&order).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Load an order with its items.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown orders.
    pub async fn find_order(&self, order_id: Uuid) -> Result<OrderData, DomainError> {
        self.uow
            .execute_locked(vec![order_lock(order_id)], move |provider| {
                Box::pin(async move { provider.find(order_id).await.map(OrderData::from) })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::memory_service;

    fn open_order(items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder {
            order_id: None,
            customer_id: Uuid::now_v7(),
            status: OrderStatus::Open,
            items,
        }
    }

    fn item(total_price: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: Uuid::now_v7(),
            count: 1,
            total_price: Decimal::from(total_price),
        }
    }

    #[tokio::test]
    async fn store_then_find_returns_the_created_order() {
        let (service, _uow) = memory_service();
        let order_id = service
            .store_order(open_order(vec![item(100), item(50)]))
            .await
            .expect("store");

        let order = service.find_order(order_id).await.expect("find");
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.items.len(), 2);
    }

    #[tokio::test]
    async fn store_publishes_created_and_items_facts() {
        let (service, uow) = memory_service();
        service
            .store_order(open_order(vec![item(100)]))
            .await
            .expect("store");

        let types = uow
            .read(|p| p.outbox.iter().map(|e| e.event_type.clone()).collect::<Vec<_>>())
            .await;
        assert_eq!(
            types,
            vec!["OrderCreated".to_string(), "OrderItemsChanged".to_string()]
        );
    }

    #[tokio::test]
    async fn open_to_paid_is_rejected_through_the_service() {
        let (service, _uow) = memory_service();
        let order_id = service
            .store_order(open_order(vec![item(100)]))
            .await
            .expect("store");

        let err = service
            .set_order_status(order_id, OrderStatus::Paid)
            .await
            .expect_err("must go through Pending");
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn status_walk_publishes_both_changes() {
        let (service, uow) = memory_service();
        let order_id = service
            .store_order(open_order(vec![item(100)]))
            .await
            .expect("store");

        service
            .set_order_status(order_id, OrderStatus::Pending)
            .await
            .expect("pending");
        service
            .set_order_status(order_id, OrderStatus::Paid)
            .await
            .expect("paid");
        // Repeating the terminal status is a silent no-op.
        service
            .set_order_status(order_id, OrderStatus::Paid)
            .await
            .expect("noop");

        let changes = uow
            .read(|p| {
                p.outbox
                    .iter()
                    .filter(|e| e.event_type == "OrderStatusChanged")
                    .count()
            })
            .await;
        assert_eq!(changes, 2);
    }

    #[tokio::test]
    async fn items_are_immutable_once_pending() {
        let (service, _uow) = memory_service();
        let order_id = service
            .store_order(open_order(vec![item(100)]))
            .await
            .expect("store");
        service
            .set_order_status(order_id, OrderStatus::Pending)
            .await
            .expect("pending");

        let err = service
            .store_order(NewOrder {
                order_id: Some(order_id),
                customer_id: Uuid::now_v7(),
                status: OrderStatus::Pending,
                items: vec![item(10)],
            })
            .await
            .expect_err("items frozen");
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn remove_twice_publishes_once() {
        let (service, uow) = memory_service();
        let order_id = service
            .store_order(open_order(vec![]))
            .await
            .expect("store");

        service.remove_order(order_id).await.expect("first");
        service.remove_order(order_id).await.expect("second");

        let removed = uow
            .read(|p| {
                p.outbox
                    .iter()
                    .filter(|e| e.event_type == "OrderRemoved")
                    .count()
            })
            .await;
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn creating_an_open_order_records_one_saga_run() {
        let (service, _uow, runs) = crate::testkit::memory_service_with_runs();
        let order_id = service
            .store_order(open_order(vec![item(100)]))
            .await
            .expect("store");

        use emporium_workflow::WorkflowRunStore as _;
        let run = runs
            .get(&format!("order-saga-{order_id}"))
            .await
            .expect("store")
            .expect("run recorded");
        assert_eq!(run.workflow, CREATE_ORDER_SAGA);

        // Replaying the same store for an existing order starts nothing new.
        service
            .store_order(NewOrder {
                order_id: Some(order_id),
                customer_id: Uuid::now_v7(),
                status: OrderStatus::Open,
                items: vec![],
            })
            .await
            .expect("idempotent store");
    }
}
