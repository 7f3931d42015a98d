//! Trade — a closing fill paired with its opening average basis.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::InstrumentId;

/// Direction of the holding a trade closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Long,
    Short,
}

/// One (partially) closing fill with realized economics.
///
/// `fees` carries the exit fill's fee plus the pro-rata share of entry fees;
/// `taxes` likewise. `net_pnl = gross_pnl - fees - taxes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub instrument: InstrumentId,
    pub direction: TradeDirection,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub gross_pnl: Decimal,
    pub fees: Decimal,
    pub taxes: Decimal,
    pub net_pnl: Decimal,
    pub exit_bar: usize,
    pub t_exit: DateTime<Utc>,
    pub reason: String,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > Decimal::ZERO
    }

    /// Entry plus exit notional, for turnover computation.
    pub fn traded_notional(&self) -> Decimal {
        self.quantity * (self.entry_price + self.exit_price)
    }
}
