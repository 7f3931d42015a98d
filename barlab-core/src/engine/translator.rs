//! Signal translator — strategy output to concrete pending orders.
//!
//! Target positions are differenced against current holdings; intents pass
//! through after validation. Signals for one instrument on one bar collapse:
//! a target overrides earlier intents, a second conflicting intent is
//! dropped and recorded as a `duplicate_signal` rejection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{
    InstrumentId, Order, OrderKind, OrderSide, RejectReason, Rejection, Signal, Timeframe,
};
use crate::engine::ledger::Ledger;

/// Deterministic id source for orders and submission sequencing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdGen {
    next_order: u64,
    next_seq: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_id(&mut self) -> u64 {
        self.next_order += 1;
        self.next_order
    }

    pub fn submit_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Outcome of translating one bar's signals.
#[derive(Debug, Default)]
pub struct Translation {
    pub orders: Vec<Order>,
    pub duplicates: Vec<Rejection>,
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("order intent for {instrument} has non-positive quantity {quantity}")]
    NonPositiveQuantity {
        instrument: InstrumentId,
        quantity: Decimal,
    },
}

/// Per-instrument collapse slot.
enum Slot {
    Target(Signal),
    Intent(Signal),
}

/// Translate `signals` (in emission order) into pending orders against the
/// current ledger. `timeframe` is the stream the orders will fill on.
pub fn translate(
    signals: Vec<Signal>,
    ledger: &Ledger,
    timeframe: Timeframe,
    submit_bar: usize,
    t_close: DateTime<Utc>,
    ids: &mut IdGen,
) -> Result<Translation, TranslateError> {
    let mut translation = Translation::default();
    // Emission order preserved per instrument; map keyed for collapse only.
    let mut slots: BTreeMap<InstrumentId, Slot> = BTreeMap::new();
    let mut order_of_arrival: Vec<InstrumentId> = Vec::new();

    for signal in signals {
        if let Signal::OrderIntent { instrument, quantity, .. } = &signal {
            if *quantity <= Decimal::ZERO {
                return Err(TranslateError::NonPositiveQuantity {
                    instrument: instrument.clone(),
                    quantity: *quantity,
                });
            }
        }

        let instrument = signal.instrument().clone();
        if !slots.contains_key(&instrument) {
            order_of_arrival.push(instrument.clone());
            let slot = match &signal {
                Signal::TargetPosition { .. } => Slot::Target(signal),
                Signal::OrderIntent { .. } => Slot::Intent(signal),
            };
            slots.insert(instrument, slot);
            continue;
        }
        match signal {
            // A target overrides whatever came before it.
            Signal::TargetPosition { .. } => {
                slots.insert(instrument, Slot::Target(signal));
            }
            // A second intent conflicts; drop and record.
            Signal::OrderIntent {
                instrument,
                side,
                quantity,
                ..
            } => {
                translation.duplicates.push(Rejection {
                    order_id: ids.order_id(),
                    instrument,
                    side,
                    quantity,
                    reason: RejectReason::DuplicateSignal,
                    bar_index: submit_bar,
                    t: t_close,
                });
            }
        }
    }

    for instrument in order_of_arrival {
        let slot = match slots.remove(&instrument) {
            Some(s) => s,
            None => continue,
        };
        match slot {
            Slot::Target(Signal::TargetPosition {
                instrument,
                quantity: target,
                reason,
            }) => {
                let current = ledger.position_qty(&instrument);
                let delta = target - current;
                if delta == Decimal::ZERO {
                    continue;
                }
                let side = if delta > Decimal::ZERO {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                };
                translation.orders.push(Order {
                    id: ids.order_id(),
                    instrument,
                    timeframe,
                    side,
                    kind: OrderKind::Market,
                    quantity: delta.abs(),
                    submit_bar,
                    submit_seq: ids.submit_seq(),
                    reason,
                });
            }
            Slot::Intent(Signal::OrderIntent {
                instrument,
                side,
                kind,
                quantity,
                reason,
            }) => {
                translation.orders.push(Order {
                    id: ids.order_id(),
                    instrument,
                    timeframe,
                    side,
                    kind,
                    quantity,
                    submit_bar,
                    submit_seq: ids.submit_seq(),
                    reason,
                });
            }
            _ => unreachable!("slot variants always wrap their matching signal"),
        }
    }

    Ok(translation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn btc() -> InstrumentId {
        InstrumentId::new("OKX:BTC/USDT")
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn run(signals: Vec<Signal>, ledger: &Ledger) -> Translation {
        let mut ids = IdGen::new();
        translate(signals, ledger, Timeframe::H1, 5, t0(), &mut ids).unwrap()
    }

    #[test]
    fn target_above_current_buys_delta() {
        let ledger = Ledger::new(dec!(10000));
        let translation = run(vec![Signal::target(btc(), dec!(2), "enter")], &ledger);
        assert_eq!(translation.orders.len(), 1);
        let order = &translation.orders[0];
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.quantity, dec!(2));
        assert_eq!(order.kind, OrderKind::Market);
    }

    #[test]
    fn target_zero_with_no_position_is_noop() {
        let ledger = Ledger::new(dec!(10000));
        let translation = run(vec![Signal::target_flat(btc(), "exit")], &ledger);
        assert!(translation.orders.is_empty());
        assert!(translation.duplicates.is_empty());
    }

    #[test]
    fn target_below_current_sells_delta() {
        let mut ledger = Ledger::new(dec!(10000));
        ledger.mark(&btc(), dec!(100));
        let fill = crate::domain::Fill {
            order_id: 1,
            instrument: btc(),
            side: OrderSide::Buy,
            quantity: dec!(3),
            price: dec!(100),
            fee: Decimal::ZERO,
            tax: Decimal::ZERO,
            t_fill: t0(),
            bar_index: 0,
            kind: crate::domain::FillKind::Normal,
            reason: "seed".into(),
        };
        ledger.apply_fill(&fill, None);

        let translation = run(vec![Signal::target(btc(), dec!(1), "trim")], &ledger);
        assert_eq!(translation.orders.len(), 1);
        assert_eq!(translation.orders[0].side, OrderSide::Sell);
        assert_eq!(translation.orders[0].quantity, dec!(2));
    }

    #[test]
    fn intent_passes_through() {
        let ledger = Ledger::new(dec!(10000));
        let translation = run(
            vec![Signal::OrderIntent {
                instrument: btc(),
                side: OrderSide::Buy,
                kind: OrderKind::Limit {
                    limit_price: dec!(99),
                },
                quantity: dec!(1),
                reason: "dip".into(),
            }],
            &ledger,
        );
        assert_eq!(translation.orders.len(), 1);
        assert_eq!(
            translation.orders[0].kind,
            OrderKind::Limit {
                limit_price: dec!(99)
            }
        );
    }

    #[test]
    fn non_positive_intent_is_error() {
        let ledger = Ledger::new(dec!(10000));
        let mut ids = IdGen::new();
        let err = translate(
            vec![Signal::OrderIntent {
                instrument: btc(),
                side: OrderSide::Buy,
                kind: OrderKind::Market,
                quantity: dec!(0),
                reason: "bad".into(),
            }],
            &ledger,
            Timeframe::H1,
            0,
            t0(),
            &mut ids,
        )
        .unwrap_err();
        assert!(matches!(err, TranslateError::NonPositiveQuantity { .. }));
    }

    #[test]
    fn target_overrides_earlier_intent() {
        let ledger = Ledger::new(dec!(10000));
        let translation = run(
            vec![
                Signal::OrderIntent {
                    instrument: btc(),
                    side: OrderSide::Buy,
                    kind: OrderKind::Market,
                    quantity: dec!(5),
                    reason: "intent".into(),
                },
                Signal::target(btc(), dec!(1), "target wins"),
            ],
            &ledger,
        );
        assert_eq!(translation.orders.len(), 1);
        assert_eq!(translation.orders[0].quantity, dec!(1));
        assert!(translation.duplicates.is_empty());
    }

    #[test]
    fn second_intent_is_duplicate() {
        let ledger = Ledger::new(dec!(10000));
        let translation = run(
            vec![
                Signal::OrderIntent {
                    instrument: btc(),
                    side: OrderSide::Buy,
                    kind: OrderKind::Market,
                    quantity: dec!(1),
                    reason: "first".into(),
                },
                Signal::OrderIntent {
                    instrument: btc(),
                    side: OrderSide::Sell,
                    kind: OrderKind::Market,
                    quantity: dec!(1),
                    reason: "second".into(),
                },
            ],
            &ledger,
        );
        assert_eq!(translation.orders.len(), 1);
        assert_eq!(translation.orders[0].reason, "first");
        assert_eq!(translation.duplicates.len(), 1);
        assert_eq!(
            translation.duplicates[0].reason,
            RejectReason::DuplicateSignal
        );
    }

    #[test]
    fn emission_order_preserved_across_instruments() {
        let eth = InstrumentId::new("OKX:ETH/USDT");
        let ledger = Ledger::new(dec!(10000));
        let translation = run(
            vec![
                Signal::target(eth.clone(), dec!(1), "eth first"),
                Signal::target(btc(), dec!(1), "btc second"),
            ],
            &ledger,
        );
        assert_eq!(translation.orders[0].instrument, eth);
        assert_eq!(translation.orders[1].instrument, btc());
        assert!(translation.orders[0].submit_seq < translation.orders[1].submit_seq);
    }
}
