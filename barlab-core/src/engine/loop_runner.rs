//! The bar-by-bar event loop.
//!
//! Strictly single-threaded and deterministic: strategies decide at bar
//! close, orders fill at the next bar open of their stream. Per tick:
//!
//! 1. Bar open — A-share day roll, mark at open, gate and fill pending
//!    orders in submission order.
//! 2. Bar close — mark, perp liquidation check, strategy decision (after
//!    warm-up), queue new orders, extend the history window, record the
//!    equity point.

use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::domain::{
    AssetKind, Bar, Fill, FillKind, InstrumentSpec, LedgerEvent, Order, OrderSide, RejectReason,
    Rejection, SpecRegistry,
};
use crate::engine::config::{EngineConfig, GapPolicy};
use crate::engine::cost::CostModel;
use crate::engine::ledger::Ledger;
use crate::engine::result::{FaultEvent, RunResult};
use crate::engine::rules::{crypto_perp, GateContext, GateDecision, RuleBook};
use crate::engine::translator::{translate, IdGen};
use crate::error::EngineError;
use crate::feed::{HistorySet, StreamKey};
use crate::strategy::{BarFrame, Strategy};

/// Run a single backtest. Pure with respect to its inputs: identical
/// config, history, and strategy parameters yield a byte-identical result.
pub fn run_backtest(
    config: &EngineConfig,
    history: &HistorySet,
    registry: &SpecRegistry,
    strategy: &mut dyn Strategy,
) -> Result<RunResult, EngineError> {
    config.validate()?;
    if history.is_empty() {
        return Err(EngineError::NoData);
    }
    if config.gap_policy == GapPolicy::Abort {
        if let Some(first) = history.gaps().first() {
            return Err(EngineError::DataGap {
                count: history.gaps().len(),
                instrument: first.instrument.clone(),
                timeframe: first.timeframe,
                expected_ms: first.expected_ms,
            });
        }
    }
    for key in history.keys() {
        registry.get(&key.instrument)?;
    }

    let warmup_bars = config.warmup_bars.max(strategy.min_history());
    let window_cap = config.history_window.max(strategy.min_history());

    let stream_count = history.stream_count();
    let mut ledger = Ledger::new(config.initial_capital);
    let mut rules = RuleBook::new(config);
    let mut ids = IdGen::new();
    let mut events: Vec<LedgerEvent> = Vec::new();
    let mut faults: Vec<FaultEvent> = Vec::new();
    let mut pending: Vec<Vec<Order>> = vec![Vec::new(); stream_count];
    let mut windows: Vec<VecDeque<Bar>> = vec![VecDeque::new(); stream_count];

    let schedule = history.schedule();
    info!(
        bars = schedule.len(),
        streams = stream_count,
        warmup = warmup_bars,
        "backtest start"
    );

    for (tick_index, tick) in schedule.iter().enumerate() {
        let key = history.stream_key(tick.stream);
        let bar = &history.bars(tick.stream)[tick.bar];
        let spec = registry.get(&key.instrument)?;

        // ─── Bar open ───
        if spec.kind == AssetKind::StockAShare {
            rules.a_share_mut().on_bar_open(&key.instrument, bar.t_open);
        }
        ledger.mark(&key.instrument, bar.open);

        let due = std::mem::take(&mut pending[tick.stream]);
        for order in due {
            execute_order(
                order, bar, tick_index, spec, config, &mut rules, &mut ledger, &mut events,
                strategy,
            );
        }

        // ─── Bar close ───
        ledger.mark(&key.instrument, bar.close);
        if spec.kind == AssetKind::StockAShare {
            rules.a_share_mut().on_bar_close(&key.instrument, bar.close);
        }
        if spec.kind == AssetKind::CryptoPerp {
            liquidate_if_breached(
                bar, tick_index, config, &mut ledger, &mut ids, &mut events, strategy,
            );
        }

        if windows[tick.stream].len() >= warmup_bars && strategy_accepts(strategy, key) {
            let decision = {
                let window: &[Bar] = windows[tick.stream].make_contiguous();
                let frame = BarFrame {
                    bar,
                    history: window,
                    ledger: ledger.view(),
                };
                strategy.on_bar(&frame)
            };
            match decision {
                Ok(signals) => {
                    for signal in &signals {
                        registry.get(signal.instrument())?;
                    }
                    let translation = translate(
                        signals,
                        &ledger,
                        key.timeframe,
                        tick_index,
                        bar.t_close(),
                        &mut ids,
                    )?;
                    for duplicate in translation.duplicates {
                        warn!(
                            instrument = %duplicate.instrument,
                            bar = tick_index,
                            "duplicate signal dropped"
                        );
                        events.push(LedgerEvent::Rejection(duplicate));
                    }
                    for order in translation.orders {
                        let target = StreamKey {
                            instrument: order.instrument.clone(),
                            timeframe: order.timeframe,
                        };
                        let stream = history.stream_index(&target).ok_or_else(|| {
                            EngineError::MissingStream {
                                instrument: target.instrument.clone(),
                                timeframe: target.timeframe,
                            }
                        })?;
                        pending[stream].push(order);
                    }
                }
                Err(err) if config.tolerant => {
                    warn!(instrument = %key.instrument, bar = tick_index, error = %err,
                        "strategy fault tolerated");
                    faults.push(FaultEvent {
                        bar_index: tick_index,
                        t: bar.t_close(),
                        instrument: key.instrument.clone(),
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        windows[tick.stream].push_back(bar.clone());
        if windows[tick.stream].len() > window_cap {
            windows[tick.stream].pop_front();
        }

        ledger.record_equity(bar.t_close());
    }

    // Orders still pending when the feed ends are cancelled, auditable.
    let mut leftovers: Vec<Order> = pending.into_iter().flatten().collect();
    leftovers.sort_by_key(|o| o.submit_seq);
    let end_index = schedule.len().saturating_sub(1);
    let end_t = ledger
        .equity_series()
        .last()
        .map(|p| p.t_close)
        .expect("non-empty history always yields equity points");
    for order in leftovers {
        events.push(LedgerEvent::Rejection(Rejection {
            order_id: order.id,
            instrument: order.instrument,
            side: order.side,
            quantity: order.quantity,
            reason: RejectReason::EndOfData,
            bar_index: end_index,
            t: end_t,
        }));
    }

    let final_equity = ledger.equity();
    let final_cash = ledger.cash();
    let realized_pnl = ledger.realized_pnl();
    let total_fees = ledger.total_fees();
    let total_taxes = ledger.total_taxes();
    let (equity_series, trades, final_positions) = ledger.into_parts();
    info!(
        final_equity = %final_equity,
        fills = events.iter().filter(|e| e.as_fill().is_some()).count(),
        trades = trades.len(),
        "backtest complete"
    );

    Ok(RunResult {
        initial_capital: config.initial_capital,
        final_equity,
        final_cash,
        realized_pnl,
        total_fees,
        total_taxes,
        equity_series,
        ledger: events,
        trades,
        final_positions,
        gaps: history.gaps().to_vec(),
        faults,
        bar_count: schedule.len(),
        warmup_bars,
    })
}

/// Whether a stream falls inside the strategy's declared instrument and
/// timeframe sets.
fn strategy_accepts(strategy: &dyn Strategy, key: &StreamKey) -> bool {
    if let Some(instruments) = strategy.instruments() {
        if !instruments.contains(&key.instrument) {
            return false;
        }
    }
    if let Some(timeframes) = strategy.timeframes() {
        if !timeframes.contains(&key.timeframe) {
            return false;
        }
    }
    true
}

/// Gate and (maybe) fill one pending order at a bar open.
#[allow(clippy::too_many_arguments)]
fn execute_order(
    order: Order,
    bar: &Bar,
    tick_index: usize,
    spec: &InstrumentSpec,
    config: &EngineConfig,
    rules: &mut RuleBook,
    ledger: &mut Ledger,
    events: &mut Vec<LedgerEvent>,
    strategy: &mut dyn Strategy,
) {
    if !order.limit_satisfied_by(bar.open) {
        events.push(LedgerEvent::Rejection(Rejection {
            order_id: order.id,
            instrument: order.instrument,
            side: order.side,
            quantity: order.quantity,
            reason: RejectReason::LimitExpired,
            bar_index: tick_index,
            t: bar.t_open,
        }));
        return;
    }

    let cost = CostModel::new(config.slippage_bps, config.commission_for(spec.kind));
    let fill_price = cost.slipped_price(bar.open, order.side);

    let decision = rules.review(&GateContext {
        order: &order,
        spec,
        open_price: bar.open,
        fill_price,
        ledger,
        config,
    });

    match decision {
        GateDecision::Reject { reason } => {
            warn!(
                instrument = %order.instrument,
                order = order.id,
                %reason,
                bar = tick_index,
                "order rejected"
            );
            events.push(LedgerEvent::Rejection(Rejection {
                order_id: order.id,
                instrument: order.instrument,
                side: order.side,
                quantity: order.quantity,
                reason,
                bar_index: tick_index,
                t: bar.t_open,
            }));
        }
        GateDecision::Accept { quantity } => {
            let (fee, tax) = match spec.kind {
                AssetKind::StockAShare => {
                    rules.a_share().costs(fill_price, quantity, order.side)
                }
                AssetKind::CryptoSpot | AssetKind::CryptoPerp => {
                    (cost.commission(fill_price, quantity), Decimal::ZERO)
                }
            };
            let fill = Fill {
                order_id: order.id,
                instrument: order.instrument.clone(),
                side: order.side,
                quantity,
                price: fill_price,
                fee,
                tax,
                t_fill: bar.t_open,
                bar_index: tick_index,
                kind: FillKind::Normal,
                reason: order.reason,
            };
            let leverage = match spec.kind {
                AssetKind::CryptoPerp => Some(crypto_perp::effective_leverage(spec, config)),
                _ => None,
            };
            ledger.apply_fill(&fill, leverage);
            if spec.kind == AssetKind::StockAShare && order.side == OrderSide::Buy {
                rules.a_share_mut().on_buy_fill(&fill.instrument, quantity);
            }
            debug!(
                instrument = %fill.instrument,
                side = ?fill.side,
                quantity = %fill.quantity,
                price = %fill.price,
                bar = tick_index,
                "fill"
            );
            strategy.on_fill(&fill);
            events.push(LedgerEvent::Fill(fill));
        }
    }
}

/// Force-close a perp position whose equity fell below maintenance margin
/// at this bar's close.
fn liquidate_if_breached(
    bar: &Bar,
    tick_index: usize,
    config: &EngineConfig,
    ledger: &mut Ledger,
    ids: &mut IdGen,
    events: &mut Vec<LedgerEvent>,
    strategy: &mut dyn Strategy,
) {
    let breach = ledger.position(&bar.instrument).and_then(|position| {
        if crypto_perp::maintenance_breached(
            position,
            bar.close,
            ledger.equity(),
            config.maintenance_margin_rate,
        ) {
            let side = if position.is_long() {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            Some((side, position.quantity.abs()))
        } else {
            None
        }
    });

    if let Some((side, quantity)) = breach {
        let notional = quantity * bar.close;
        let penalty =
            notional * Decimal::from(config.liquidation_penalty_bps) / Decimal::from(10_000u32);
        let fill = Fill {
            order_id: ids.order_id(),
            instrument: bar.instrument.clone(),
            side,
            quantity,
            price: bar.close,
            fee: penalty,
            tax: Decimal::ZERO,
            t_fill: bar.t_close(),
            bar_index: tick_index,
            kind: FillKind::Liquidation,
            reason: "liquidation".into(),
        };
        warn!(
            instrument = %fill.instrument,
            quantity = %quantity,
            price = %bar.close,
            penalty = %penalty,
            bar = tick_index,
            "maintenance margin breached, forced close"
        );
        ledger.apply_fill(&fill, None);
        strategy.on_fill(&fill);
        events.push(LedgerEvent::Fill(fill));
    }
}
