//! Application layer: payment and wallet operations over the unit of work.

pub mod payment;
pub mod wallet;

pub use payment::PaymentAppService;
pub use wallet::{WalletAppService, WalletData};
