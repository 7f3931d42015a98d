//! Strategy framework — the sole place where alpha lives.
//!
//! A strategy is a per-bar function over a `BarFrame`: the current closed
//! bar, a bounded window of previous closed bars, and an immutable ledger
//! view for position queries. It emits zero or more `Signal`s; the engine
//! translates, gates, and fills them at the next bar open, then notifies
//! `on_fill`. Strategies never call back into the engine.

pub mod bollinger;
pub mod donchian;
pub mod dual_ma;
pub mod indicators;
pub mod params;
pub mod rsi;
pub mod zscore;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{Bar, Fill, InstrumentId, Signal, Timeframe};
use crate::engine::ledger::LedgerView;

pub use bollinger::Bollinger;
pub use donchian::DonchianBreakout;
pub use dual_ma::DualMa;
pub use params::{ParamError, ParamKind, ParamReader, ParamSpec, ParamValue, Params};
pub use rsi::RsiReversion;
pub use zscore::ZScore;

/// The strategy's per-bar view.
///
/// `history` holds previous closed bars of the same stream, oldest first,
/// capped by the engine and never including the current or any future bar.
pub struct BarFrame<'a> {
    pub bar: &'a Bar,
    pub history: &'a [Bar],
    pub ledger: LedgerView<'a>,
}

impl<'a> BarFrame<'a> {
    pub fn instrument(&self) -> &InstrumentId {
        &self.bar.instrument
    }

    /// Current signed holdings for an instrument.
    pub fn position_qty(&self, instrument: &InstrumentId) -> Decimal {
        self.ledger.position_qty(instrument)
    }

    pub fn history_closes(&self) -> Vec<f64> {
        self.history
            .iter()
            .map(|b| b.close.to_f64().unwrap_or(f64::NAN))
            .collect()
    }

    pub fn history_highs(&self) -> Vec<f64> {
        self.history
            .iter()
            .map(|b| b.high.to_f64().unwrap_or(f64::NAN))
            .collect()
    }

    pub fn history_lows(&self) -> Vec<f64> {
        self.history
            .iter()
            .map(|b| b.low.to_f64().unwrap_or(f64::NAN))
            .collect()
    }

    pub fn close_f64(&self) -> f64 {
        self.bar.close.to_f64().unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error("strategy fault: {0}")]
    Fault(String),
}

/// The capability set every strategy implements.
pub trait Strategy: Send {
    fn name(&self) -> &'static str;

    /// Declared parameter schema: name, type, default, bounds.
    fn param_schema(&self) -> Vec<ParamSpec>;

    /// Called once before the run; validates and applies parameters.
    fn configure(&mut self, params: &Params) -> Result<(), StrategyError>;

    /// Closed bars required before `on_bar` is first invoked.
    fn min_history(&self) -> usize;

    /// Instruments the strategy operates on; `None` means every instrument
    /// in the feed. The engine never hands it frames outside this set.
    fn instruments(&self) -> Option<Vec<InstrumentId>> {
        None
    }

    /// Timeframes the strategy expects frames for; `None` means any.
    fn timeframes(&self) -> Option<Vec<Timeframe>> {
        None
    }

    fn allows_short(&self) -> bool {
        false
    }

    /// Pure per-bar decision. An empty vector means "hold".
    fn on_bar(&mut self, frame: &BarFrame<'_>) -> Result<Vec<Signal>, StrategyError>;

    /// Notification after the engine applied a fill. Must not issue orders.
    fn on_fill(&mut self, _fill: &Fill) {}
}
