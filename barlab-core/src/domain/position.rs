//! Position — signed holdings in one instrument, owned by the ledger.
//!
//! Average entry basis is weighted on adds and released at average on
//! reductions. A position reduced to zero keeps its realized PnL so the
//! record survives for reporting continuity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{InstrumentId, OrderSide};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: InstrumentId,
    /// Signed quantity: positive long, negative short.
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub realized_pnl: Decimal,
    /// Fees and taxes paid opening the current holding, not yet apportioned
    /// to closing trades.
    pub open_costs: Decimal,
    /// Perpetual only: leverage in effect for the current holding.
    pub leverage: Option<Decimal>,
}

/// What a fill did to the position, as seen by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionDelta {
    /// Realized PnL from the reduced part, before costs.
    pub realized: Decimal,
    /// Quantity closed against the prior holding.
    pub closed_qty: Decimal,
    /// Average basis the closed quantity was carried at.
    pub entry_basis: Decimal,
    /// Opening-side costs apportioned to the closed quantity.
    pub released_costs: Decimal,
    /// Quantity opened (or added) in the fill's direction.
    pub opened_qty: Decimal,
}

impl Position {
    pub fn flat(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            quantity: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            open_costs: Decimal::ZERO,
            leverage: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == Decimal::ZERO
    }

    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.quantity < Decimal::ZERO
    }

    /// Signed market value at `price`.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.avg_entry_price) * self.quantity
    }

    /// Margin engaged for a leveraged holding; zero when unlevered.
    pub fn margin_engaged(&self) -> Decimal {
        match self.leverage {
            Some(lev) if lev > Decimal::ZERO => {
                self.quantity.abs() * self.avg_entry_price / lev
            }
            _ => Decimal::ZERO,
        }
    }

    /// Apply a fill of `quantity` at `price`. `fill_costs` is the fee + tax
    /// of the whole fill; the share attributable to newly opened quantity is
    /// absorbed into `open_costs`, the rest belongs to the closing trade.
    ///
    /// Handles open, add, partial/full reduce, and reverse. Realized PnL is
    /// accumulated on the position and reported in the returned delta.
    pub fn apply(
        &mut self,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        fill_costs: Decimal,
    ) -> PositionDelta {
        let signed = quantity * side.sign();
        let mut delta = PositionDelta {
            realized: Decimal::ZERO,
            closed_qty: Decimal::ZERO,
            entry_basis: self.avg_entry_price,
            released_costs: Decimal::ZERO,
            opened_qty: Decimal::ZERO,
        };

        if self.is_flat() {
            self.quantity = signed;
            self.avg_entry_price = price;
            self.open_costs = fill_costs;
            delta.opened_qty = quantity;
            return delta;
        }

        let same_direction = (self.is_long() && side == OrderSide::Buy)
            || (self.is_short() && side == OrderSide::Sell);

        if same_direction {
            let total_value = self.quantity * self.avg_entry_price + signed * price;
            self.quantity += signed;
            self.avg_entry_price = (total_value / self.quantity).abs();
            self.open_costs += fill_costs;
            delta.opened_qty = quantity;
            return delta;
        }

        let held = self.quantity.abs();
        if quantity <= held {
            // Partial or full close.
            let direction = if self.is_long() {
                Decimal::ONE
            } else {
                Decimal::NEGATIVE_ONE
            };
            let realized = quantity * (price - self.avg_entry_price) * direction;
            let released = if held > Decimal::ZERO {
                self.open_costs * quantity / held
            } else {
                Decimal::ZERO
            };
            self.open_costs -= released;
            self.quantity += signed;
            self.realized_pnl += realized;
            if self.is_flat() {
                self.avg_entry_price = Decimal::ZERO;
                self.open_costs = Decimal::ZERO;
            }
            delta.realized = realized;
            delta.closed_qty = quantity;
            delta.released_costs = released;
            return delta;
        }

        // Reverse: close the full holding, open the remainder the other way.
        let direction = if self.is_long() {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };
        let realized = held * (price - self.avg_entry_price) * direction;
        let released = self.open_costs;
        let remain = quantity - held;
        // Entry costs split pro rata between the closing and opening legs.
        let opening_costs = if quantity > Decimal::ZERO {
            fill_costs * remain / quantity
        } else {
            Decimal::ZERO
        };

        self.realized_pnl += realized;
        self.quantity = remain * side.sign();
        self.avg_entry_price = price;
        self.open_costs = opening_costs;

        delta.realized = realized;
        delta.closed_qty = held;
        delta.released_costs = released;
        delta.opened_qty = remain;
        delta
    }
}
