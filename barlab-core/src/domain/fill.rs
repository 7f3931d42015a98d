//! Fills, rejections, and the append-only trade ledger rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{InstrumentId, OrderSide};

/// How a fill came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillKind {
    Normal,
    /// Forced close of a perpetual position below maintenance margin.
    Liquidation,
}

/// Executed order. Fee and tax are separate ledger lines so reports can
/// break costs down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: u64,
    pub instrument: InstrumentId,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub tax: Decimal,
    /// Equals the fill bar's `t_open`.
    pub t_fill: DateTime<Utc>,
    /// Global tick index of the fill bar.
    pub bar_index: usize,
    pub kind: FillKind,
    pub reason: String,
}

impl Fill {
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }
}

/// Why the rule gate (or order lifecycle) refused an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Quantity rounded down to the lot step became zero.
    LotStepZero,
    /// A-share: next open at or above the up-limit price blocks buys.
    UpLimit,
    /// A-share: next open at or below the down-limit price blocks sells.
    DownLimit,
    /// A-share: selling quantity bought on the same Shanghai calendar date.
    TPlusOne,
    InsufficientCash,
    InsufficientMargin,
    /// Crypto spot: sell exceeds long holdings.
    NoShort,
    /// Conflicting signals for one instrument on one bar.
    DuplicateSignal,
    /// Limit price not reached at the next bar open.
    LimitExpired,
    /// Order still pending when the feed ended.
    EndOfData,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::LotStepZero => "lot_step_zero",
            RejectReason::UpLimit => "up_limit",
            RejectReason::DownLimit => "down_limit",
            RejectReason::TPlusOne => "t_plus_one",
            RejectReason::InsufficientCash => "insufficient_cash",
            RejectReason::InsufficientMargin => "insufficient_margin",
            RejectReason::NoShort => "no_short",
            RejectReason::DuplicateSignal => "duplicate_signal",
            RejectReason::LimitExpired => "limit_expired",
            RejectReason::EndOfData => "end_of_data",
        };
        write!(f, "{s}")
    }
}

/// Structured rejection event, persisted for post-hoc audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub order_id: u64,
    pub instrument: InstrumentId,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub reason: RejectReason,
    pub bar_index: usize,
    pub t: DateTime<Utc>,
}

/// One row of the trade ledger, in event order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Fill(Fill),
    Rejection(Rejection),
}

impl LedgerEvent {
    pub fn as_fill(&self) -> Option<&Fill> {
        match self {
            LedgerEvent::Fill(f) => Some(f),
            LedgerEvent::Rejection(_) => None,
        }
    }

    pub fn as_rejection(&self) -> Option<&Rejection> {
        match self {
            LedgerEvent::Fill(_) => None,
            LedgerEvent::Rejection(r) => Some(r),
        }
    }
}
