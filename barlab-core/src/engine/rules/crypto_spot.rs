//! Crypto spot gate: lot step, no shorts, cash sufficiency.

use rust_decimal::Decimal;

use crate::domain::{OrderSide, RejectReason};

use super::{snap_down, GateContext, GateDecision};

pub fn review(ctx: &GateContext<'_>) -> GateDecision {
    let quantity = snap_down(ctx.order.quantity, ctx.spec.lot_step);
    if quantity <= Decimal::ZERO {
        return GateDecision::Reject {
            reason: RejectReason::LotStepZero,
        };
    }

    match ctx.order.side {
        OrderSide::Sell => {
            let held = ctx.ledger.position_qty(&ctx.order.instrument);
            if quantity > held {
                return GateDecision::Reject {
                    reason: RejectReason::NoShort,
                };
            }
        }
        OrderSide::Buy => {
            let rate = ctx.config.commission_for(ctx.spec.kind);
            let notional = ctx.fill_price * quantity;
            let required = notional + notional * rate;
            if required > ctx.ledger.cash() {
                return GateDecision::Reject {
                    reason: RejectReason::InsufficientCash,
                };
            }
        }
    }

    GateDecision::Accept { quantity }
}
