//! Portfolio ledger — exclusive owner of cash, positions, and the equity
//! series.
//!
//! Strategies read through an immutable `LedgerView`; only the engine
//! mutates. Equity is `cash + Σ quantity × mark`, exact in decimal, per bar
//! close.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{
    Fill, InstrumentId, OrderSide, Position, TradeDirection, TradeRecord,
};

/// One row of the equity series, appended at every bar close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub t_close: DateTime<Utc>,
    pub equity: Decimal,
    pub cash: Decimal,
    pub gross_exposure: Decimal,
    pub net_exposure: Decimal,
    /// Absolute shortfall from the running high-water mark; never negative.
    pub drawdown: Decimal,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    initial_capital: Decimal,
    cash: Decimal,
    positions: BTreeMap<InstrumentId, Position>,
    marks: BTreeMap<InstrumentId, Decimal>,
    high_water: Decimal,
    equity_series: Vec<EquityPoint>,
    trades: Vec<TradeRecord>,
    total_fees: Decimal,
    total_taxes: Decimal,
}

impl Ledger {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
            high_water: initial_capital,
            equity_series: Vec::new(),
            trades: Vec::new(),
            total_fees: Decimal::ZERO,
            total_taxes: Decimal::ZERO,
        }
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    pub fn total_taxes(&self) -> Decimal {
        self.total_taxes
    }

    pub fn position(&self, instrument: &InstrumentId) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn position_qty(&self, instrument: &InstrumentId) -> Decimal {
        self.positions
            .get(instrument)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn mark_price(&self, instrument: &InstrumentId) -> Option<Decimal> {
        self.marks.get(instrument).copied()
    }

    /// Update the mark price used for equity and exposure.
    pub fn mark(&mut self, instrument: &InstrumentId, price: Decimal) {
        self.marks.insert(instrument.clone(), price);
    }

    fn mark_or_basis(&self, position: &Position) -> Decimal {
        self.marks
            .get(&position.instrument)
            .copied()
            .unwrap_or(position.avg_entry_price)
    }

    /// `cash + Σ quantity × mark`, exact in decimal.
    pub fn equity(&self) -> Decimal {
        let position_value: Decimal = self
            .positions
            .values()
            .map(|p| p.market_value(self.mark_or_basis(p)))
            .sum();
        self.cash + position_value
    }

    pub fn gross_exposure(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| p.market_value(self.mark_or_basis(p)).abs())
            .sum()
    }

    pub fn net_exposure(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| p.market_value(self.mark_or_basis(p)))
            .sum()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| p.unrealized_pnl(self.mark_or_basis(p)))
            .sum()
    }

    /// Initial margin engaged across leveraged positions.
    pub fn margin_in_use(&self) -> Decimal {
        self.positions.values().map(|p| p.margin_engaged()).sum()
    }

    /// Apply a fill: position, basis, cash, realized PnL, cost totals.
    /// Returns a `TradeRecord` when the fill (partially) closed a holding.
    ///
    /// `leverage` is the leverage in effect for perpetual fills; `None`
    /// leaves the position unlevered.
    pub fn apply_fill(&mut self, fill: &Fill, leverage: Option<Decimal>) -> Option<TradeRecord> {
        let position = self
            .positions
            .entry(fill.instrument.clone())
            .or_insert_with(|| Position::flat(fill.instrument.clone()));

        let prior_direction = if position.is_short() {
            TradeDirection::Short
        } else {
            TradeDirection::Long
        };

        let costs = fill.fee + fill.tax;
        let delta = position.apply(fill.side, fill.quantity, fill.price, costs);

        if position.is_flat() {
            position.leverage = None;
        } else if leverage.is_some() {
            position.leverage = leverage;
        }

        match fill.side {
            OrderSide::Buy => self.cash -= fill.notional() + fill.fee + fill.tax,
            OrderSide::Sell => self.cash += fill.notional() - fill.fee - fill.tax,
        }
        self.total_fees += fill.fee;
        self.total_taxes += fill.tax;

        if delta.closed_qty > Decimal::ZERO {
            let closing_fraction = delta.closed_qty / fill.quantity;
            let exit_fee = fill.fee * closing_fraction;
            let exit_tax = fill.tax * closing_fraction;
            let fees = delta.released_costs + exit_fee;
            let trade = TradeRecord {
                instrument: fill.instrument.clone(),
                direction: prior_direction,
                quantity: delta.closed_qty,
                entry_price: delta.entry_basis,
                exit_price: fill.price,
                gross_pnl: delta.realized,
                fees,
                taxes: exit_tax,
                net_pnl: delta.realized - fees - exit_tax,
                exit_bar: fill.bar_index,
                t_exit: fill.t_fill,
                reason: fill.reason.clone(),
            };
            self.trades.push(trade.clone());
            Some(trade)
        } else {
            None
        }
    }

    /// Append an equity point at a bar close.
    pub fn record_equity(&mut self, t_close: DateTime<Utc>) {
        let equity = self.equity();
        if equity > self.high_water {
            self.high_water = equity;
        }
        let drawdown = (self.high_water - equity).max(Decimal::ZERO);
        self.equity_series.push(EquityPoint {
            t_close,
            equity,
            cash: self.cash,
            gross_exposure: self.gross_exposure(),
            net_exposure: self.net_exposure(),
            drawdown,
        });
    }

    pub fn equity_series(&self) -> &[EquityPoint] {
        &self.equity_series
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn high_water(&self) -> Decimal {
        self.high_water
    }

    /// Immutable snapshot handed to strategies.
    pub fn view(&self) -> LedgerView<'_> {
        LedgerView { ledger: self }
    }

    pub fn into_parts(self) -> (Vec<EquityPoint>, Vec<TradeRecord>, Vec<Position>) {
        (
            self.equity_series,
            self.trades,
            self.positions.into_values().collect(),
        )
    }
}

/// Read-only window into the ledger for position queries.
#[derive(Clone, Copy)]
pub struct LedgerView<'a> {
    ledger: &'a Ledger,
}

impl<'a> LedgerView<'a> {
    pub fn cash(&self) -> Decimal {
        self.ledger.cash()
    }

    pub fn equity(&self) -> Decimal {
        self.ledger.equity()
    }

    pub fn position_qty(&self, instrument: &InstrumentId) -> Decimal {
        self.ledger.position_qty(instrument)
    }

    pub fn position(&self, instrument: &InstrumentId) -> Option<&'a Position> {
        self.ledger.position(instrument)
    }

    pub fn gross_exposure(&self) -> Decimal {
        self.ledger.gross_exposure()
    }

    pub fn net_exposure(&self) -> Decimal {
        self.ledger.net_exposure()
    }
}
