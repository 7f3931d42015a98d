//! Slippage and fee model.
//!
//! Slippage is directional in basis points: buyers pay up, sellers receive
//! less. Fees are proportional to filled notional; the A-share module layers
//! its own minimum commission and stamp duty on top.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub slippage_bps: u32,
    pub commission_rate: Decimal,
}

impl CostModel {
    pub fn new(slippage_bps: u32, commission_rate: Decimal) -> Self {
        Self {
            slippage_bps,
            commission_rate,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0, Decimal::ZERO)
    }

    /// Fill price after directional slippage:
    /// `open × (1 ± slippage_bps / 10_000)`.
    pub fn slipped_price(&self, raw: Decimal, side: OrderSide) -> Decimal {
        if self.slippage_bps == 0 {
            return raw;
        }
        let slip = Decimal::from(self.slippage_bps) / Decimal::from(10_000u32);
        match side {
            OrderSide::Buy => raw * (Decimal::ONE + slip),
            OrderSide::Sell => raw * (Decimal::ONE - slip),
        }
    }

    /// Proportional commission on filled notional.
    pub fn commission(&self, fill_price: Decimal, quantity: Decimal) -> Decimal {
        fill_price * quantity * self.commission_rate
    }
}
