//! A-share gate: T+1, daily price limits, 100-share lots, commission with
//! a minimum, sell-side stamp duty.
//!
//! Calendar dates use the fixed UTC+8 offset (China has not observed DST
//! since 1991). The reference close for price limits is the prior trading
//! day's last close; both roll at the first bar open of a new date.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{AShareBoard, InstrumentId, InstrumentSpec, OrderSide, RejectReason};

use super::{snap_down, GateContext, GateDecision};

pub const MIN_COMMISSION: Decimal = dec!(5);
pub const STAMP_TAX_RATE: Decimal = dec!(0.0005);
const ST_LIMIT_PCT: Decimal = dec!(0.05);

/// Shanghai calendar date of a UTC instant.
pub fn shanghai_date(t: DateTime<Utc>) -> NaiveDate {
    let offset = FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset");
    t.with_timezone(&offset).date_naive()
}

/// Daily limit band for a spec: ST ±5%, main ±10%, ChiNext/STAR ±20%.
fn limit_pct(spec: &InstrumentSpec) -> Decimal {
    if spec.is_st {
        return ST_LIMIT_PCT;
    }
    match spec.board {
        Some(AShareBoard::Main) | None => dec!(0.10),
        Some(AShareBoard::ChiNext) | Some(AShareBoard::Star) => dec!(0.20),
    }
}

/// Limit prices from the reference close, rounded down to the cent.
pub fn price_limits(spec: &InstrumentSpec, p_ref: Decimal) -> (Decimal, Decimal) {
    let pct = limit_pct(spec);
    let down = (p_ref * (Decimal::ONE - pct))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let up = (p_ref * (Decimal::ONE + pct))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
    (down, up)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SymbolState {
    current_date: Option<NaiveDate>,
    /// Quantity bought today; not sellable until the next date's open.
    locked_today: Decimal,
    /// Prior trading day's last close — the price-limit reference.
    prev_close: Option<Decimal>,
    /// Running last close of the current date.
    today_close: Option<Decimal>,
}

/// Stateful A-share rule module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AShareRules {
    commission_rate: Decimal,
    state: BTreeMap<InstrumentId, SymbolState>,
}

impl AShareRules {
    pub fn new(commission_rate: Decimal) -> Self {
        Self {
            commission_rate,
            state: BTreeMap::new(),
        }
    }

    /// Day-roll bookkeeping at a bar open: a new Shanghai date promotes
    /// yesterday's running close to the limit reference and unlocks T+1
    /// quantity.
    pub fn on_bar_open(&mut self, instrument: &InstrumentId, t_open: DateTime<Utc>) {
        let date = shanghai_date(t_open);
        let entry = self.state.entry(instrument.clone()).or_default();
        match entry.current_date {
            Some(current) if current >= date => {}
            _ => {
                entry.prev_close = entry.today_close.take().or(entry.prev_close);
                entry.locked_today = Decimal::ZERO;
                entry.current_date = Some(date);
            }
        }
    }

    /// Track the running close of the current date.
    pub fn on_bar_close(&mut self, instrument: &InstrumentId, close: Decimal) {
        let entry = self.state.entry(instrument.clone()).or_default();
        entry.today_close = Some(close);
    }

    /// Buys lock their quantity for the rest of the date.
    pub fn on_buy_fill(&mut self, instrument: &InstrumentId, quantity: Decimal) {
        let entry = self.state.entry(instrument.clone()).or_default();
        entry.locked_today += quantity;
    }

    fn locked_today(&self, instrument: &InstrumentId) -> Decimal {
        self.state
            .get(instrument)
            .map(|s| s.locked_today)
            .unwrap_or(Decimal::ZERO)
    }

    fn prev_close(&self, instrument: &InstrumentId) -> Option<Decimal> {
        self.state.get(instrument).and_then(|s| s.prev_close)
    }

    /// Commission (with minimum) and stamp duty for a fill.
    pub fn costs(&self, price: Decimal, quantity: Decimal, side: OrderSide) -> (Decimal, Decimal) {
        let notional = price * quantity;
        let commission = (notional * self.commission_rate).max(MIN_COMMISSION);
        let stamp = match side {
            OrderSide::Sell => notional * STAMP_TAX_RATE,
            OrderSide::Buy => Decimal::ZERO,
        };
        (commission, stamp)
    }

    pub fn review(&self, ctx: &GateContext<'_>) -> GateDecision {
        // 1. Lot rounding to 100-share multiples.
        let quantity = snap_down(ctx.order.quantity, ctx.spec.lot_step);
        if quantity <= Decimal::ZERO {
            return GateDecision::Reject {
                reason: RejectReason::LotStepZero,
            };
        }

        // 2. Price-limit admissibility against the raw open.
        if let Some(p_ref) = self.prev_close(&ctx.order.instrument) {
            if p_ref > Decimal::ZERO {
                let (down, up) = price_limits(ctx.spec, p_ref);
                match ctx.order.side {
                    OrderSide::Buy if ctx.open_price >= up => {
                        return GateDecision::Reject {
                            reason: RejectReason::UpLimit,
                        };
                    }
                    OrderSide::Sell if ctx.open_price <= down => {
                        return GateDecision::Reject {
                            reason: RejectReason::DownLimit,
                        };
                    }
                    _ => {}
                }
            }
        }

        // 3. Sellable quantity / cash sufficiency.
        match ctx.order.side {
            OrderSide::Sell => {
                let held = ctx.ledger.position_qty(&ctx.order.instrument);
                let sellable = (held - self.locked_today(&ctx.order.instrument))
                    .max(Decimal::ZERO);
                if quantity > sellable {
                    return GateDecision::Reject {
                        reason: RejectReason::TPlusOne,
                    };
                }
            }
            OrderSide::Buy => {
                let (commission, _) = self.costs(ctx.fill_price, quantity, OrderSide::Buy);
                let required = ctx.fill_price * quantity + commission;
                if required > ctx.ledger.cash() {
                    return GateDecision::Reject {
                        reason: RejectReason::InsufficientCash,
                    };
                }
            }
        }

        GateDecision::Accept { quantity }
    }
}
