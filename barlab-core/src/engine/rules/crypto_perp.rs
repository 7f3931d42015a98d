//! Crypto perpetual gate: lot step, leverage cap, initial margin.
//!
//! Initial margin for added notional is `notional / leverage`; an order is
//! rejected when it would drive free cash (equity minus margin in use)
//! negative. Reducing orders release margin and always pass the margin
//! check. The liquidation check runs at bar close, after marking.

use rust_decimal::Decimal;

use crate::domain::{InstrumentSpec, OrderSide, Position, RejectReason};
use crate::engine::config::EngineConfig;

use super::{snap_down, GateContext, GateDecision};

/// Leverage applied to new perp positions: the instrument's bound when
/// present, capped by the engine-wide limit.
pub fn effective_leverage(spec: &InstrumentSpec, config: &EngineConfig) -> Decimal {
    spec.max_leverage
        .map(|lev| lev.min(config.max_leverage))
        .unwrap_or(config.max_leverage)
}

pub fn review(ctx: &GateContext<'_>) -> GateDecision {
    let quantity = snap_down(ctx.order.quantity, ctx.spec.lot_step);
    if quantity <= Decimal::ZERO {
        return GateDecision::Reject {
            reason: RejectReason::LotStepZero,
        };
    }

    let held = ctx.ledger.position_qty(&ctx.order.instrument);
    let signed = quantity * ctx.order.side.sign();
    let after = held + signed;

    // Quantity added in the order's direction; a pure reduction adds none.
    let added = after.abs() - held.abs();
    if added > Decimal::ZERO {
        let leverage = effective_leverage(ctx.spec, ctx.config);
        let margin_new = ctx.fill_price * added / leverage;
        let free = ctx.ledger.equity() - ctx.ledger.margin_in_use();
        if free - margin_new < Decimal::ZERO {
            return GateDecision::Reject {
                reason: RejectReason::InsufficientMargin,
            };
        }
    }

    GateDecision::Accept { quantity }
}

/// Whether a marked position breaches maintenance margin:
/// `equity < maintenance_margin_rate × |quantity| × mark`.
pub fn maintenance_breached(
    position: &Position,
    mark: Decimal,
    equity: Decimal,
    maintenance_margin_rate: Decimal,
) -> bool {
    if position.is_flat() || position.leverage.is_none() {
        return false;
    }
    let maintenance = position.quantity.abs() * mark * maintenance_margin_rate;
    equity < maintenance
}
