//! Application layer: order operations over the unit of work.

pub mod service;

pub use service::{NewOrder, NewOrderItem, OrderAppService, OrderData, OrderItemData};
