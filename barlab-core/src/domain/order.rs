//! Strategy signals and the orders they translate into.
//!
//! A strategy emits either a declarative `TargetPosition` (desired holdings
//! after this decision) or an imperative `OrderIntent`. The translator diffs
//! targets against the ledger and produces `Order`s, which live only until
//! the next bar open of their stream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{InstrumentId, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn sign(self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Order pricing. The limit price exists exactly when the order is a limit
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit { limit_price: Decimal },
}

/// Strategy output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    /// Desired signed holdings after this decision. Zero closes the position.
    TargetPosition {
        instrument: InstrumentId,
        quantity: Decimal,
        reason: String,
    },
    /// Direct order request; quantity must be positive.
    OrderIntent {
        instrument: InstrumentId,
        side: OrderSide,
        kind: OrderKind,
        quantity: Decimal,
        reason: String,
    },
}

impl Signal {
    pub fn instrument(&self) -> &InstrumentId {
        match self {
            Signal::TargetPosition { instrument, .. } => instrument,
            Signal::OrderIntent { instrument, .. } => instrument,
        }
    }

    pub fn target(instrument: InstrumentId, quantity: Decimal, reason: impl Into<String>) -> Self {
        Signal::TargetPosition {
            instrument,
            quantity,
            reason: reason.into(),
        }
    }

    pub fn target_flat(instrument: InstrumentId, reason: impl Into<String>) -> Self {
        Self::target(instrument, Decimal::ZERO, reason)
    }
}

/// Concrete pending order, post-translation and pre-execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub instrument: InstrumentId,
    /// Stream the order fills against: the next bar of this
    /// (instrument, timeframe) pair.
    pub timeframe: Timeframe,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: Decimal,
    /// Global tick index of the bar whose close produced the order.
    pub submit_bar: usize,
    /// Global submission sequence; execution order within a bar open.
    pub submit_seq: u64,
    pub reason: String,
}

impl Order {
    /// Whether an open price satisfies the limit. Market orders always do.
    pub fn limit_satisfied_by(&self, open: Decimal) -> bool {
        match self.kind {
            OrderKind::Market => true,
            OrderKind::Limit { limit_price } => match self.side {
                OrderSide::Buy => open <= limit_price,
                OrderSide::Sell => open >= limit_price,
            },
        }
    }
}
