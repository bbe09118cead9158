//! In-memory provider and wiring for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_testing::{test_clock, InMemoryUnitOfWork};
use emporium_workflow::{
    InMemoryRunStore, InProcessTransport, TaskQueueTransport, Worker, WorkflowClient,
    WorkflowRunStore,
};

use crate::app::OrderAppService;
use crate::domain::{Order, OrderRepository, AGGREGATE_TYPE};
use crate::infrastructure::saga::CREATE_ORDER_SAGA;
use crate::TASK_QUEUE;

/// In-memory order repository plus recorded outbox.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderProvider {
    /// Stored orders by id.
    pub orders: HashMap<Uuid, Order>,
    /// Envelopes dispatched by committed bodies.
    pub outbox: Vec<EventEnvelope>,
}

#[async_trait]
impl OrderRepository for MemoryOrderProvider {
    async fn store(&mut self, order: &Order) -> Result<(), DomainError> {
        self.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn find(&mut self, order_id: Uuid) -> Result<Order, DomainError> {
        self.orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(AGGREGATE_TYPE, order_id))
    }
}

#[async_trait]
impl EventDispatcher for MemoryOrderProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        self.outbox.push(envelope);
        Ok(())
    }
}

/// Unit of work over the in-memory provider.
pub type MemoryOrderUow = InMemoryUnitOfWork<MemoryOrderProvider>;

/// App service over fresh in-memory state, using the given workflow
/// client for saga starts.
#[must_use]
pub fn memory_service_with(
    workflows: Arc<WorkflowClient>,
) -> (OrderAppService<MemoryOrderUow>, MemoryOrderUow) {
    let uow = MemoryOrderUow::default();
    let service = OrderAppService::new(uow.clone(), Arc::new(test_clock()), workflows);
    (service, uow)
}

/// App service whose saga starts land on a stub worker; returns the run
/// store so tests can assert recorded runs.
#[must_use]
pub fn memory_service_with_runs() -> (
    OrderAppService<MemoryOrderUow>,
    MemoryOrderUow,
    Arc<InMemoryRunStore>,
) {
    let transport = InProcessTransport::new();
    let runs = Arc::new(InMemoryRunStore::new());

    let mut stub = Worker::new(
        TASK_QUEUE,
        Arc::clone(&transport) as Arc<dyn TaskQueueTransport>,
        Arc::clone(&runs) as Arc<dyn WorkflowRunStore>,
    );
    stub.register_workflow(CREATE_ORDER_SAGA, |_ctx, _params: Value| async move { Ok(()) });
    transport.register(Arc::new(stub));

    let client = Arc::new(WorkflowClient::new(
        transport as Arc<dyn TaskQueueTransport>,
        Arc::clone(&runs) as Arc<dyn WorkflowRunStore>,
    ));
    let (service, uow) = memory_service_with(client);
    (service, uow, runs)
}

/// App service over fresh in-memory state with a stubbed saga.
#[must_use]
pub fn memory_service() -> (OrderAppService<MemoryOrderUow>, MemoryOrderUow) {
    let (service, uow, _runs) = memory_service_with_runs();
    (service, uow)
}
