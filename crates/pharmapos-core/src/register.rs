//! # Cash Register Math
//!
//! Pure state transitions for a [`CashSession`].
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   (no open session) ──first need──► OPEN ──close(declared)──► CLOSED    │
//! │                                      │                                  │
//! │                                      ├── record_sale(amount, bucket)    │
//! │                                      └── record_withdrawal(amount)      │
//! │                                                                         │
//! │   CLOSED is terminal. The next sale lazily opens a fresh session.       │
//! │                                                                         │
//! │   expected   = opening fund + cash sales - withdrawals                  │
//! │   difference = declared - expected                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CashSession, SessionStatus};
use crate::{DEFAULT_OPENING_FUND_CENTS, DEFAULT_REGISTER_NUMBER};

// =============================================================================
// Payment Buckets
// =============================================================================

/// Which session total a payment lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentBucket {
    Cash,
    Card,
    Transfer,
}

impl PaymentBucket {
    /// Classifies a till payment method, case-insensitively.
    ///
    /// Returns `None` for anything outside the known names.
    pub fn classify(method: &str) -> Option<Self> {
        match method.trim().to_uppercase().as_str() {
            "EFECTIVO" | "CASH" => Some(PaymentBucket::Cash),
            "TARJETA" | "TARJETA_CREDITO" | "TARJETA_DEBITO" | "CARD" => Some(PaymentBucket::Card),
            "TRANSFERENCIA" | "TRANSFER" => Some(PaymentBucket::Transfer),
            _ => None,
        }
    }

    /// Classifies a method, applying the register's policy to unknown names.
    pub fn resolve(method: &str, policy: UnknownPaymentPolicy) -> CoreResult<Self> {
        match (Self::classify(method), policy) {
            (Some(bucket), _) => Ok(bucket),
            (None, UnknownPaymentPolicy::TreatAsCash) => Ok(PaymentBucket::Cash),
            (None, UnknownPaymentPolicy::Reject) => {
                Err(CoreError::InvalidPaymentMethod(method.to_string()))
            }
        }
    }
}

impl fmt::Display for PaymentBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentBucket::Cash => write!(f, "cash"),
            PaymentBucket::Card => write!(f, "card"),
            PaymentBucket::Transfer => write!(f, "transfer"),
        }
    }
}

/// What the register does with a payment method it does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPaymentPolicy {
    /// Count it as cash (vouchers, mixed tender and typos end up in the drawer total).
    #[default]
    #[serde(alias = "cash")]
    TreatAsCash,
    /// Fail with `InvalidPaymentMethod`.
    Reject,
}

impl std::str::FromStr for UnknownPaymentPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" | "treat_as_cash" => Ok(UnknownPaymentPolicy::TreatAsCash),
            "reject" => Ok(UnknownPaymentPolicy::Reject),
            other => Err(CoreError::InvalidPaymentMethod(other.to_string())),
        }
    }
}

// =============================================================================
// Register Settings
// =============================================================================

/// Per-register settings used when a session is lazily opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterSettings {
    pub register_number: i64,
    pub opening_fund_cents: i64,
    pub unknown_payment: UnknownPaymentPolicy,
}

impl Default for RegisterSettings {
    fn default() -> Self {
        RegisterSettings {
            register_number: DEFAULT_REGISTER_NUMBER,
            opening_fund_cents: DEFAULT_OPENING_FUND_CENTS,
            unknown_payment: UnknownPaymentPolicy::default(),
        }
    }
}

// =============================================================================
// Session Transitions
// =============================================================================

impl CashSession {
    /// A freshly opened session: every total zeroed, float from settings.
    pub fn open(id: String, settings: &RegisterSettings, now: DateTime<Utc>) -> Self {
        CashSession {
            id,
            register_number: settings.register_number,
            cashier_id: None,
            cashier_name: None,
            supervisor_id: None,
            supervisor_name: None,
            opened_at: now,
            closed_at: None,
            opening_fund_cents: settings.opening_fund_cents,
            cash_sales_cents: 0,
            card_sales_cents: 0,
            transfer_sales_cents: 0,
            total_sales_cents: 0,
            total_refunds_cents: 0,
            withdrawals_cents: 0,
            declared_cash_cents: 0,
            expected_cash_cents: 0,
            difference_cents: 0,
            sale_count: 0,
            cancellation_count: 0,
            status: SessionStatus::Open,
            notes: None,
            created_at: now,
            sync_version: 0,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    fn ensure_open(&self, operation: &str) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::invalid_state(
                "CashSession",
                &self.id,
                self.status.to_string(),
                operation,
            ))
        }
    }

    /// Adds one sale to the running totals.
    pub fn record_sale(&mut self, amount: Money, bucket: PaymentBucket) -> CoreResult<()> {
        self.ensure_open("record a sale")?;

        self.total_sales_cents += amount.cents();
        self.sale_count += 1;
        match bucket {
            PaymentBucket::Cash => self.cash_sales_cents += amount.cents(),
            PaymentBucket::Card => self.card_sales_cents += amount.cents(),
            PaymentBucket::Transfer => self.transfer_sales_cents += amount.cents(),
        }
        Ok(())
    }

    /// Adds a withdrawal. Not checked against the drawer; that is a report concern.
    pub fn record_withdrawal(&mut self, amount: Money) -> CoreResult<()> {
        self.ensure_open("record a withdrawal")?;
        self.withdrawals_cents += amount.cents();
        Ok(())
    }

    /// Cash the drawer should hold right now.
    pub fn expected_cash(&self) -> Money {
        Money::from_cents(self.opening_fund_cents + self.cash_sales_cents - self.withdrawals_cents)
    }

    /// OPEN → CLOSED, stamping the close time and the reconciliation.
    pub fn close(&mut self, declared_cash: Money, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_open("close")?;

        let expected = self.expected_cash();
        self.status = SessionStatus::Closed;
        self.closed_at = Some(now);
        self.declared_cash_cents = declared_cash.cents();
        self.expected_cash_cents = expected.cents();
        self.difference_cents = (declared_cash - expected).cents();
        Ok(())
    }

    /// Classification of the close difference.
    pub fn difference_status(&self) -> DifferenceStatus {
        DifferenceStatus::from_difference(Money::from_cents(self.difference_cents))
    }
}

/// Outcome of the blind count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifferenceStatus {
    Balanced,
    Over,
    Short,
}

impl DifferenceStatus {
    pub fn from_difference(difference: Money) -> Self {
        if difference.is_zero() {
            DifferenceStatus::Balanced
        } else if difference.is_positive() {
            DifferenceStatus::Over
        } else {
            DifferenceStatus::Short
        }
    }
}

// =============================================================================
// Blind Count
// =============================================================================

/// Peso bills and coins, in cents.
pub const MXN_DENOMINATIONS_CENTS: [i64; 12] = [
    100_000, 50_000, 20_000, 10_000, 5_000, 2_000, // bills
    2_000, 1_000, 500, 200, 100, 50, // coins
];

/// Count of each denomination found in the drawer at close.
///
/// The $20 bill and $20 coin share a value, so counts are keyed by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenominationCount {
    counts: BTreeMap<i64, i64>,
}

impl DenominationCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `pieces` of a denomination (value in cents).
    pub fn add(mut self, denomination_cents: i64, pieces: i64) -> Self {
        *self.counts.entry(denomination_cents).or_insert(0) += pieces;
        self
    }

    /// Declared cash for the close.
    pub fn total(&self) -> Money {
        self.counts
            .iter()
            .map(|(value, pieces)| Money::from_cents(value * pieces))
            .sum()
    }
}
