//! Application layer: product operations over the unit of work.

pub mod service;

pub use service::{NewProduct, ProductAppService, ProductData};
