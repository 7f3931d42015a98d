//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use barlab_core::domain::{Bar, Fill, InstrumentId, Signal, Timeframe};
use barlab_core::strategy::{BarFrame, ParamSpec, Params, Strategy, StrategyError};

/// Emits a scripted list of signals keyed by the deciding bar's `t_open`
/// (epoch milliseconds). Used to drive exact order sequences through the
/// engine without indicator noise.
pub struct Scripted {
    script: BTreeMap<i64, Vec<Signal>>,
    only_instruments: Option<Vec<InstrumentId>>,
    pub fills_seen: Vec<Fill>,
    /// Instruments of every frame the engine handed over.
    pub frames_seen: Vec<InstrumentId>,
}

impl Scripted {
    pub fn new(script: BTreeMap<i64, Vec<Signal>>) -> Self {
        Self {
            script,
            only_instruments: None,
            fills_seen: Vec::new(),
            frames_seen: Vec::new(),
        }
    }

    pub fn at(mut self, t_open_ms: i64, signal: Signal) -> Self {
        self.script.entry(t_open_ms).or_default().push(signal);
        self
    }

    /// Declare the instrument set this strategy operates on.
    pub fn restrict_to(mut self, instruments: Vec<InstrumentId>) -> Self {
        self.only_instruments = Some(instruments);
        self
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn param_schema(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn configure(&mut self, _params: &Params) -> Result<(), StrategyError> {
        Ok(())
    }

    fn min_history(&self) -> usize {
        0
    }

    fn instruments(&self) -> Option<Vec<InstrumentId>> {
        self.only_instruments.clone()
    }

    fn allows_short(&self) -> bool {
        true
    }

    fn on_bar(&mut self, frame: &BarFrame<'_>) -> Result<Vec<Signal>, StrategyError> {
        self.frames_seen.push(frame.bar.instrument.clone());
        Ok(self
            .script
            .remove(&frame.bar.t_open.timestamp_millis())
            .unwrap_or_default())
    }

    fn on_fill(&mut self, fill: &Fill) {
        self.fills_seen.push(fill.clone());
    }
}

pub fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).expect("finite test value")
}

/// Flat-bodied bar: o = h = l = c.
pub fn flat_bar(instrument: &str, timeframe: Timeframe, t_open_ms: i64, px: Decimal) -> Bar {
    Bar {
        instrument: InstrumentId::new(instrument),
        timeframe,
        t_open: Utc.timestamp_millis_opt(t_open_ms).unwrap(),
        open: px,
        high: px,
        low: px,
        close: px,
        volume: Decimal::from(1000u32),
    }
}

/// Bar with explicit OHLC.
pub fn ohlc_bar(
    instrument: &str,
    timeframe: Timeframe,
    t_open_ms: i64,
    o: Decimal,
    h: Decimal,
    l: Decimal,
    c: Decimal,
) -> Bar {
    Bar {
        instrument: InstrumentId::new(instrument),
        timeframe,
        t_open: Utc.timestamp_millis_opt(t_open_ms).unwrap(),
        open: o,
        high: h,
        low: l,
        close: c,
        volume: Decimal::from(1000u32),
    }
}

pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 86_400_000;
