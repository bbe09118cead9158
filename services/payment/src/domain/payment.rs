//! The payment aggregate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::error::DomainError;

use super::events::{PaymentCreated, PaymentRemoved, PaymentStatusChanged};

/// Aggregate kind for envelopes and error messages.
pub const PAYMENT_AGGREGATE: &str = "payment";

/// Payment lifecycle status.
///
/// Transitions: Pending → {Processing, Cancelled}, Processing →
/// {Succeeded, Failed}. Succeeded, Failed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Created, not yet picked up.
    Pending,
    /// Being settled.
    Processing,
    /// Settled successfully.
    Succeeded,
    /// Settlement failed.
    Failed,
    /// Abandoned before processing.
    Cancelled,
}

impl PaymentStatus {
    /// Wire code of the status (stable integer enum).
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Succeeded => 2,
            Self::Failed => 3,
            Self::Cancelled => 4,
        }
    }

    /// Parse a wire code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Processing),
            2 => Some(Self::Succeeded),
            3 => Some(Self::Failed),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }

    const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Succeeded | Self::Failed)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown payment status code {code}")))
    }
}

/// The payment aggregate root.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    /// Unique identity.
    pub payment_id: Uuid,
    /// Wallet being charged.
    pub wallet_id: Uuid,
    /// Order being paid for.
    pub order_id: Uuid,
    /// Non-negative amount.
    pub amount: Decimal,
    /// Lifecycle status.
    pub status: PaymentStatus,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete instant.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Create a pending payment.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for a negative amount.
    pub fn create(
        payment_id: Uuid,
        wallet_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(Self, PaymentCreated), DomainError> {
        if amount < Decimal::ZERO {
            return Err(DomainError::InvalidArgument(
                "payment amount must not be negative".to_string(),
            ));
        }
        let payment = Self {
            payment_id,
            wallet_id,
            order_id,
            amount,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let event = PaymentCreated {
            payment_id,
            order_id,
            amount,
        };
        Ok((payment, event))
    }

    /// Drive the status machine.
    ///
    /// `from == to` is a success no-op publishing nothing.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidStateTransition`] for any move the machine
    /// does not allow.
    pub fn set_status(
        &mut self,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatusChanged>, DomainError> {
        if self.status == to {
            return Ok(None);
        }
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                entity: PAYMENT_AGGREGATE,
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        let from = self.status;
        self.status = to;
        self.updated_at = now;
        Ok(Some(PaymentStatusChanged {
            payment_id: self.payment_id,
            from,
            to,
        }))
    }

    /// Soft-delete the payment. Idempotent.
    #[must_use]
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> Option<PaymentRemoved> {
        if self.deleted_at.is_some() {
            return None;
        }
        self.deleted_at = Some(now);
        self.updated_at = now;
        Some(PaymentRemoved {
            payment_id: self.payment_id,
        })
    }
}

/// Repository contract for payments.
#[async_trait]
pub trait PaymentRepository: Send {
    /// Time-ordered identity for a new payment.
    fn next_payment_id(&mut self) -> Uuid {
        Uuid::now_v7()
    }

    /// Upsert the aggregate.
    async fn store_payment(&mut self, payment: &Payment) -> Result<(), DomainError>;

    /// Load by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such payment exists.
    async fn find_payment(&mut self, payment_id: Uuid) -> Result<Payment, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid")
    }

    fn payment(status: PaymentStatus) -> Payment {
        let (mut payment, _) = Payment::create(
            Uuid::now_v7(),
            Uuid::now_v7(),
            Uuid::now_v7(),
            Decimal::from(100),
            now(),
        )
        .expect("create");
        payment.status = status;
        payment
    }

    #[test]
    fn pending_to_succeeded_must_go_via_processing() {
        let mut p = payment(PaymentStatus::Pending);
        let err = p
            .set_status(PaymentStatus::Succeeded, now())
            .expect_err("skipping Processing");
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn full_happy_path() {
        let mut p = payment(PaymentStatus::Pending);
        let first = p
            .set_status(PaymentStatus::Processing, now())
            .expect("valid")
            .expect("event");
        assert_eq!(first.from, PaymentStatus::Pending);
        let second = p
            .set_status(PaymentStatus::Succeeded, now())
            .expect("valid")
            .expect("event");
        assert_eq!(second.to, PaymentStatus::Succeeded);
    }

    #[test]
    fn same_status_is_a_silent_noop() {
        let mut p = payment(PaymentStatus::Processing);
        assert!(p
            .set_status(PaymentStatus::Processing, now())
            .expect("noop")
            .is_none());
    }

    #[test]
    fn negative_amount_is_rejected() {
        let err = Payment::create(
            Uuid::now_v7(),
            Uuid::now_v7(),
            Uuid::now_v7(),
            Decimal::from(-1),
            now(),
        )
        .expect_err("negative");
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    proptest! {
        // The transition table is a pure function of (from, to): replaying
        // any rejected move keeps being rejected, terminals accept nothing.
        #[test]
        fn transition_table_is_deterministic(from_code in 0i32..5, to_code in 0i32..5) {
            let from = PaymentStatus::from_code(from_code).expect("valid");
            let to = PaymentStatus::from_code(to_code).expect("valid");

            let outcomes: Vec<bool> = (0..3)
                .map(|_| payment(from).set_status(to, now()).is_ok())
                .collect();
            prop_assert!(outcomes.windows(2).all(|w| w[0] == w[1]));

            if matches!(from, PaymentStatus::Succeeded | PaymentStatus::Failed | PaymentStatus::Cancelled) && from != to {
                prop_assert!(!outcomes[0]);
            }
        }
    }
}
