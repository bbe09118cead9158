//! Domain model: the order aggregate and its events.

pub mod events;
pub mod order;

pub use events::{OrderCreated, OrderItemsChanged, OrderRemoved, OrderStatusChanged};
pub use order::{Order, OrderItem, OrderRepository, OrderStatus, AGGREGATE_TYPE};
