//! Domain model: payment and wallet aggregates and their events.

pub mod events;
pub mod payment;
pub mod wallet;

pub use events::{
    PaymentCreated, PaymentRemoved, PaymentStatusChanged, WalletBalanceChanged, WalletCreated,
    WalletRemoved,
};
pub use payment::{Payment, PaymentRepository, PaymentStatus, PAYMENT_AGGREGATE};
pub use wallet::{Wallet, WalletRepository, WALLET_AGGREGATE};
