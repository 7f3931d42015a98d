//! End-to-end engine scenarios: flat market, single round trip, A-share
//! T+1 and price limits, perpetual liquidation, gap policy.

mod common;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use barlab_core::domain::{
    AShareBoard, FillKind, InstrumentSpec, RejectReason, Signal, SpecRegistry, Timeframe,
};
use barlab_core::engine::{run_backtest, EngineConfig, GapPolicy};
use barlab_core::error::EngineError;
use barlab_core::feed::HistorySet;
use barlab_core::strategy::params::ParamValue;
use barlab_core::strategy::{DualMa, Params, Strategy};

use common::{dec as d, flat_bar, ohlc_bar, Scripted, HOUR_MS};

const BTC: &str = "OKX:BTC/USDT";
const MOUTAI: &str = "SSE:600519/CNY";

fn crypto_registry() -> SpecRegistry {
    [InstrumentSpec::crypto_spot("OKX", "BTC", "USDT", dec!(0.0001))]
        .into_iter()
        .collect()
}

fn dual_ma(fast: i64, slow: i64, size: f64) -> DualMa {
    let mut strat = DualMa::new();
    let mut params = Params::new();
    params.insert("fast".into(), ParamValue::Int(fast));
    params.insert("slow".into(), ParamValue::Int(slow));
    params.insert("position_size".into(), ParamValue::Float(size));
    strat.configure(&params).unwrap();
    strat
}

#[test]
fn flat_market_dual_ma_never_trades() {
    let bars = (0..500).map(|i| flat_bar(BTC, Timeframe::H1, i * HOUR_MS, dec!(100)));
    let history = HistorySet::from_bars(bars).unwrap();
    let config = EngineConfig::frictionless(dec!(10000));
    let mut strat = dual_ma(5, 20, 1.0);

    let result = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap();

    assert_eq!(result.fill_count(), 0);
    assert_eq!(result.trades.len(), 0);
    assert_eq!(result.final_equity, dec!(10000));
    for point in &result.equity_series {
        assert_eq!(point.equity, dec!(10000));
        assert_eq!(point.drawdown, dec!(0));
    }
}

#[test]
fn single_round_trip_crypto_spot_exact_to_the_cent() {
    // 30 bars at 100, then 30 at 110: one golden cross, never a cross down.
    let bars = (0..60).map(|i| {
        let px = if i < 30 { dec!(100) } else { dec!(110) };
        flat_bar(BTC, Timeframe::H1, i * HOUR_MS, px)
    });
    let history = HistorySet::from_bars(bars).unwrap();
    // Defaults: 10 bps crypto commission, 5 bps slippage.
    let config = EngineConfig::new(dec!(10000));
    let mut strat = dual_ma(3, 10, 1.0);

    let result = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap();

    let fills: Vec<_> = result.fills().collect();
    assert_eq!(fills.len(), 1, "exactly one entry fill, no exit");
    let fill = fills[0];
    // 110 × (1 + 0.0005) = 110.055; fee = 110.055 × 0.001.
    assert_eq!(fill.price, dec!(110.055));
    assert_eq!(fill.fee, dec!(0.110055));
    assert_eq!(fill.tax, dec!(0));

    // cash = 10000 − 110.055 − 0.110055; equity = cash + 1 × 110.
    assert_eq!(result.final_cash, dec!(9889.834945));
    assert_eq!(result.final_equity, dec!(9999.834945));
    assert_eq!(
        result.equity_series.last().unwrap().equity,
        dec!(9999.834945)
    );
    assert_eq!(result.total_fees, dec!(0.110055));
    assert_eq!(result.total_taxes, dec!(0));
}

fn a_share_registry(board: AShareBoard, is_st: bool) -> SpecRegistry {
    [InstrumentSpec::a_share("SSE", "600519", board, is_st)]
        .into_iter()
        .collect()
}

#[test]
fn a_share_t_plus_one_blocks_same_day_sell() {
    let t = |day: u32, hour: u32| {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0)
            .unwrap()
            .timestamp_millis()
    };
    let bars = vec![
        flat_bar(MOUTAI, Timeframe::H1, t(1, 2), dec!(10.00)),
        flat_bar(MOUTAI, Timeframe::H1, t(2, 2), dec!(10.00)),
        flat_bar(MOUTAI, Timeframe::H1, t(2, 3), dec!(10.00)),
        flat_bar(MOUTAI, Timeframe::H1, t(2, 4), dec!(10.00)),
        flat_bar(MOUTAI, Timeframe::H1, t(3, 2), dec!(10.00)),
    ];
    let history = HistorySet::from_bars(bars).unwrap();

    let mut config = EngineConfig::new(dec!(100000));
    config.slippage_bps = 0;

    let moutai = barlab_core::domain::InstrumentId::new(MOUTAI);
    let mut strat = Scripted::empty()
        .at(t(2, 2), Signal::target(moutai.clone(), dec!(100), "open"))
        .at(t(2, 3), Signal::target_flat(moutai.clone(), "same-day exit"))
        .at(t(2, 4), Signal::target_flat(moutai.clone(), "next-day exit"));

    let result = run_backtest(
        &config,
        &history,
        &a_share_registry(AShareBoard::Main, false),
        &mut strat,
    )
    .unwrap();

    // One buy, one sell, one T+1 rejection in between.
    let fills: Vec<_> = result.fills().collect();
    assert_eq!(fills.len(), 2);
    let rejections: Vec<_> = result.rejections().collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].reason, RejectReason::TPlusOne);

    let buy = fills[0];
    assert_eq!(buy.price, dec!(10.00));
    assert_eq!(buy.quantity, dec!(100));
    // max(5, 10.00 × 100 × 0.0003) = 5.00, no stamp duty on buys.
    assert_eq!(buy.fee, dec!(5.00));
    assert_eq!(buy.tax, dec!(0));

    let sell = fills[1];
    assert_eq!(sell.fee, dec!(5.00));
    // Stamp duty 10.00 × 100 × 0.0005.
    assert_eq!(sell.tax, dec!(0.50));

    // The sell landed on the next Shanghai date.
    assert!(sell.t_fill.timestamp_millis() >= t(3, 2));
    assert_eq!(result.final_cash, dec!(99989.50));
    assert_eq!(result.final_equity, dec!(99989.50));
    // Both fills were echoed back through on_fill.
    assert_eq!(strat.fills_seen.len(), 2);
}

#[test]
fn a_share_buy_rejected_at_up_limit() {
    let t = |day: u32| {
        Utc.with_ymd_and_hms(2024, 1, day, 2, 0, 0)
            .unwrap()
            .timestamp_millis()
    };
    // Previous close 10.00 → up-limit 11.00; next day opens exactly there.
    let bars = vec![
        flat_bar(MOUTAI, Timeframe::H1, t(1), dec!(10.00)),
        flat_bar(MOUTAI, Timeframe::H1, t(2), dec!(11.00)),
    ];
    let history = HistorySet::from_bars(bars).unwrap();

    let mut config = EngineConfig::new(dec!(100000));
    config.slippage_bps = 0;

    let moutai = barlab_core::domain::InstrumentId::new(MOUTAI);
    let mut strat =
        Scripted::empty().at(t(1), Signal::target(moutai.clone(), dec!(100), "chase"));

    let result = run_backtest(
        &config,
        &history,
        &a_share_registry(AShareBoard::Main, false),
        &mut strat,
    )
    .unwrap();

    assert_eq!(result.fill_count(), 0);
    let rejections: Vec<_> = result.rejections().collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].reason, RejectReason::UpLimit);
    assert_eq!(result.final_equity, dec!(100000));
}

#[test]
fn perp_liquidation_forces_close_below_maintenance() {
    let bars = vec![
        flat_bar(BTC, Timeframe::H1, 0, dec!(100)),
        flat_bar(BTC, Timeframe::H1, HOUR_MS, dec!(100)),
        ohlc_bar(
            BTC,
            Timeframe::H1,
            2 * HOUR_MS,
            dec!(100),
            dec!(100),
            dec!(89),
            dec!(89),
        ),
    ];
    let history = HistorySet::from_bars(bars).unwrap();

    let registry: SpecRegistry =
        [InstrumentSpec::crypto_perp("OKX", "BTC", "USDT", dec!(0.001), dec!(10))]
            .into_iter()
            .collect();

    let mut config = EngineConfig::frictionless(dec!(1000));
    config.maintenance_margin_rate = dec!(0.05);
    config.liquidation_penalty_bps = 50;

    let btc = barlab_core::domain::InstrumentId::new(BTC);
    let mut strat = Scripted::empty().at(0, Signal::target(btc.clone(), dec!(100), "max long"));

    let result = run_backtest(&config, &history, &registry, &mut strat).unwrap();

    let fills: Vec<_> = result.fills().collect();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].kind, FillKind::Normal);
    assert_eq!(fills[0].price, dec!(100));

    let liquidation = fills[1];
    assert_eq!(liquidation.kind, FillKind::Liquidation);
    assert_eq!(liquidation.reason, "liquidation");
    assert_eq!(liquidation.price, dec!(89));
    assert_eq!(liquidation.quantity, dec!(100));
    // Penalty: 50 bps of 8900 notional.
    assert_eq!(liquidation.fee, dec!(44.50));

    assert_eq!(result.realized_pnl, dec!(-1100));
    assert_eq!(result.final_equity, dec!(-144.50));
    assert_eq!(
        result.equity_series.last().unwrap().equity,
        dec!(-144.50)
    );

    let trade = &result.trades[0];
    assert_eq!(trade.gross_pnl, dec!(-1100));
    assert_eq!(trade.fees, dec!(44.50));
    assert_eq!(trade.net_pnl, dec!(-1144.50));
}

#[test]
fn gap_policy_abort_fails_gappy_feed() {
    let bars = vec![
        flat_bar(BTC, Timeframe::H1, 0, dec!(100)),
        flat_bar(BTC, Timeframe::H1, 3 * HOUR_MS, dec!(100)),
    ];
    let history = HistorySet::from_bars(bars).unwrap();

    let mut config = EngineConfig::frictionless(dec!(10000));
    config.gap_policy = GapPolicy::Abort;
    let mut strat = Scripted::empty();

    let err = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap_err();
    assert!(matches!(err, EngineError::DataGap { count: 1, .. }));

    // Skip runs through and reports the gap instead.
    config.gap_policy = GapPolicy::Skip;
    let mut strat = Scripted::empty();
    let result = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap();
    assert_eq!(result.gaps.len(), 1);
}

#[test]
fn unknown_instrument_signal_is_fatal() {
    let bars = (0..3).map(|i| flat_bar(BTC, Timeframe::H1, i * HOUR_MS, dec!(100)));
    let history = HistorySet::from_bars(bars).unwrap();
    let config = EngineConfig::frictionless(dec!(10000));

    let ghost = barlab_core::domain::InstrumentId::new("OKX:GHOST/USDT");
    let mut strat = Scripted::empty().at(0, Signal::target(ghost, dec!(1), "ghost"));

    let err = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap_err();
    assert!(matches!(err, EngineError::UnknownInstrument(_)));
}

#[test]
fn insufficient_cash_buy_is_recorded_not_fatal() {
    let bars = (0..4).map(|i| flat_bar(BTC, Timeframe::H1, i * HOUR_MS, dec!(100)));
    let history = HistorySet::from_bars(bars).unwrap();
    let config = EngineConfig::frictionless(dec!(1000));

    let btc = barlab_core::domain::InstrumentId::new(BTC);
    let mut strat = Scripted::empty().at(0, Signal::target(btc, dec!(100), "too big"));

    let result = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap();
    assert_eq!(result.fill_count(), 0);
    let rejections: Vec<_> = result.rejections().collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].reason, RejectReason::InsufficientCash);
}

#[test]
fn pending_order_at_end_of_data_is_cancelled() {
    let bars = (0..3).map(|i| flat_bar(BTC, Timeframe::H1, i * HOUR_MS, dec!(100)));
    let history = HistorySet::from_bars(bars).unwrap();
    let config = EngineConfig::frictionless(dec!(10000));

    let btc = barlab_core::domain::InstrumentId::new(BTC);
    // Signal on the last bar: there is no next open to fill at.
    let mut strat =
        Scripted::empty().at(2 * HOUR_MS, Signal::target(btc, dec!(1), "too late"));

    let result = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap();
    assert_eq!(result.fill_count(), 0);
    let rejections: Vec<_> = result.rejections().collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].reason, RejectReason::EndOfData);
}

#[test]
fn limit_order_expires_when_open_does_not_reach() {
    use barlab_core::domain::{OrderKind, OrderSide};

    let bars = (0..3).map(|i| flat_bar(BTC, Timeframe::H1, i * HOUR_MS, dec!(100)));
    let history = HistorySet::from_bars(bars).unwrap();
    let config = EngineConfig::frictionless(dec!(10000));

    let btc = barlab_core::domain::InstrumentId::new(BTC);
    let mut strat = Scripted::empty().at(
        0,
        Signal::OrderIntent {
            instrument: btc,
            side: OrderSide::Buy,
            kind: OrderKind::Limit {
                limit_price: dec!(95),
            },
            quantity: dec!(1),
            reason: "buy the dip".into(),
        },
    );

    let result = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap();
    assert_eq!(result.fill_count(), 0);
    let rejections: Vec<_> = result.rejections().collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].reason, RejectReason::LimitExpired);
}

#[test]
fn warmup_suppresses_early_decisions() {
    // DualMa(3, 10) first decides once 10 prior bars exist; prices rise from
    // the start, so without warm-up it would buy much earlier.
    let bars = (0..20).map(|i| flat_bar(BTC, Timeframe::H1, i * HOUR_MS, d(100.0 + i as f64)));
    let history = HistorySet::from_bars(bars).unwrap();
    let config = EngineConfig::frictionless(dec!(100000));
    let mut strat = dual_ma(3, 10, 1.0);

    let result = run_backtest(&config, &history, &crypto_registry(), &mut strat).unwrap();
    assert_eq!(result.warmup_bars, 10);
    let first_fill = result.fills().next().expect("rising market must fill");
    // Decision at tick 10 at the earliest → fill at tick 11 or later.
    assert!(first_fill.bar_index >= 11);
}
