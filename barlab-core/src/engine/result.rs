//! Run result — everything a single backtest produces.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Fill, InstrumentId, LedgerEvent, Position, Rejection, TradeRecord};
use crate::engine::ledger::EquityPoint;
use crate::feed::GapEvent;

/// A tolerated strategy fault: the bar's output was treated as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEvent {
    pub bar_index: usize,
    pub t: DateTime<Utc>,
    pub instrument: InstrumentId,
    pub message: String,
}

/// Output of `run_backtest`: the continuous equity series, the ordered
/// trade ledger (fills and rejections), round-trip trades, and diagnostics.
/// Byte-identical across runs with identical inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub final_cash: Decimal,
    pub realized_pnl: Decimal,
    pub total_fees: Decimal,
    pub total_taxes: Decimal,
    pub equity_series: Vec<EquityPoint>,
    pub ledger: Vec<LedgerEvent>,
    pub trades: Vec<TradeRecord>,
    /// Positions at end of run, flat records included.
    pub final_positions: Vec<Position>,
    pub gaps: Vec<GapEvent>,
    pub faults: Vec<FaultEvent>,
    pub bar_count: usize,
    pub warmup_bars: usize,
}

impl RunResult {
    pub fn fills(&self) -> impl Iterator<Item = &Fill> {
        self.ledger.iter().filter_map(LedgerEvent::as_fill)
    }

    pub fn rejections(&self) -> impl Iterator<Item = &Rejection> {
        self.ledger.iter().filter_map(LedgerEvent::as_rejection)
    }

    pub fn fill_count(&self) -> usize {
        self.fills().count()
    }

    pub fn rejection_count(&self) -> usize {
        self.rejections().count()
    }

    /// Total filled notional across the run, for turnover computation.
    pub fn traded_notional(&self) -> Decimal {
        self.fills().map(Fill::notional).sum()
    }
}
