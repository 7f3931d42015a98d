//! Rule gates — market-specific admissibility of pending orders.
//!
//! Gate decisions are values, not errors: an order is accepted (possibly
//! with a rewritten quantity) or rejected with a structured reason that
//! lands in the trade ledger. Check order is always lot rounding →
//! price-limit admissibility → sellable / cash / margin sufficiency.

pub mod a_share;
pub mod crypto_perp;
pub mod crypto_spot;

use rust_decimal::Decimal;

use crate::domain::{AssetKind, InstrumentSpec, Order, RejectReason};
use crate::engine::config::EngineConfig;
use crate::engine::ledger::Ledger;

pub use a_share::AShareRules;

/// Everything a gate may consult when reviewing one order at the next bar
/// open. Positions are already marked at `open_price`.
pub struct GateContext<'a> {
    pub order: &'a Order,
    pub spec: &'a InstrumentSpec,
    /// Raw next-bar open, pre-slippage. Price-limit checks use this.
    pub open_price: Decimal,
    /// Slipped execution price. Cash and margin checks use this.
    pub fill_price: Decimal,
    pub ledger: &'a Ledger,
    pub config: &'a EngineConfig,
}

/// Gate verdict on one order.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Proceed with (possibly lot-rounded) quantity.
    Accept { quantity: Decimal },
    Reject { reason: RejectReason },
}

/// Snap a quantity down to a multiple of `step`.
pub(crate) fn snap_down(quantity: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return quantity;
    }
    (quantity / step).floor() * step
}

/// Dispatches orders to the module selected by the instrument's asset kind.
/// Holds the A-share module's per-day state (T+1 locks, reference closes).
#[derive(Debug, Clone)]
pub struct RuleBook {
    a_share: AShareRules,
}

impl RuleBook {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            a_share: AShareRules::new(config.commission_for(AssetKind::StockAShare)),
        }
    }

    pub fn review(&self, ctx: &GateContext<'_>) -> GateDecision {
        match ctx.spec.kind {
            AssetKind::CryptoSpot => crypto_spot::review(ctx),
            AssetKind::CryptoPerp => crypto_perp::review(ctx),
            AssetKind::StockAShare => self.a_share.review(ctx),
        }
    }

    pub fn a_share(&self) -> &AShareRules {
        &self.a_share
    }

    pub fn a_share_mut(&mut self) -> &mut AShareRules {
        &mut self.a_share
    }
}
