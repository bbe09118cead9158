//! Payment and wallet facts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::event::DomainEvent;

use super::payment::PaymentStatus;

/// `PaymentCreated` — a payment entered the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCreated {
    /// New payment's id.
    pub payment_id: Uuid,
    /// Order being paid for.
    pub order_id: Uuid,
    /// Amount.
    pub amount: Decimal,
}

impl DomainEvent for PaymentCreated {
    fn event_type(&self) -> &'static str {
        "PaymentCreated"
    }
    fn aggregate_id(&self) -> Uuid {
        self.payment_id
    }
}

/// `PaymentStatusChanged` — the state machine moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusChanged {
    /// Payment id.
    pub payment_id: Uuid,
    /// Previous status.
    pub from: PaymentStatus,
    /// New status.
    pub to: PaymentStatus,
}

impl DomainEvent for PaymentStatusChanged {
    fn event_type(&self) -> &'static str {
        "PaymentStatusChanged"
    }
    fn aggregate_id(&self) -> Uuid {
        self.payment_id
    }
}

/// `PaymentRemoved` — soft delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRemoved {
    /// Removed payment's id.
    pub payment_id: Uuid,
}

impl DomainEvent for PaymentRemoved {
    fn event_type(&self) -> &'static str {
        "PaymentRemoved"
    }
    fn aggregate_id(&self) -> Uuid {
        self.payment_id
    }
}

/// `WalletCreated` — a user got their wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletCreated {
    /// New wallet's id.
    pub wallet_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Seed balance.
    pub balance: Decimal,
}

impl DomainEvent for WalletCreated {
    fn event_type(&self) -> &'static str {
        "WalletCreated"
    }
    fn aggregate_id(&self) -> Uuid {
        self.wallet_id
    }
}

/// `WalletBalanceChanged` — charge, refund or manual adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalanceChanged {
    /// Wallet id.
    pub wallet_id: Uuid,
    /// Balance before.
    pub old_balance: Decimal,
    /// Balance after.
    pub new_balance: Decimal,
}

impl DomainEvent for WalletBalanceChanged {
    fn event_type(&self) -> &'static str {
        "WalletBalanceChanged"
    }
    fn aggregate_id(&self) -> Uuid {
        self.wallet_id
    }
}

/// `WalletRemoved` — soft delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRemoved {
    /// Removed wallet's id.
    pub wallet_id: Uuid,
}

impl DomainEvent for WalletRemoved {
    fn event_type(&self) -> &'static str {
        "WalletRemoved"
    }
    fn aggregate_id(&self) -> Uuid {
        self.wallet_id
    }
}
