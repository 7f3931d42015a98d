//! Donchian channel breakout (turtle-style).
//!
//! Enters long when the close breaks above the prior `entry_period` high,
//! exits when it breaks below the prior `exit_period` low. Channel bounds
//! come from the history window, which excludes the current bar.

use rust_decimal::Decimal;

use crate::domain::Signal;
use crate::strategy::indicators::donchian;
use crate::strategy::params::{validate, ParamReader, ParamSpec, Params};
use crate::strategy::{BarFrame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct DonchianBreakout {
    entry_period: usize,
    exit_period: usize,
    position_size: Decimal,
    allow_short: bool,
}

impl DonchianBreakout {
    pub fn new() -> Self {
        Self {
            entry_period: 20,
            exit_period: 10,
            position_size: Decimal::ONE,
            allow_short: false,
        }
    }
}

impl Default for DonchianBreakout {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for DonchianBreakout {
    fn name(&self) -> &'static str {
        "donchian_breakout"
    }

    fn param_schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("entry_period", 20, 1, 1000),
            ParamSpec::int("exit_period", 10, 1, 1000),
            ParamSpec::float("position_size", 1.0, 0.0, 1e12),
            ParamSpec::flag("allow_short", false),
        ]
    }

    fn configure(&mut self, params: &Params) -> Result<(), StrategyError> {
        validate(params, &self.param_schema())?;
        let reader = ParamReader::new(params);
        self.entry_period = reader.usize("entry_period", 20);
        self.exit_period = reader.usize("exit_period", 10);
        self.position_size = reader.decimal("position_size", Decimal::ONE);
        self.allow_short = reader.flag("allow_short", false);
        Ok(())
    }

    fn min_history(&self) -> usize {
        self.entry_period.max(self.exit_period)
    }

    fn allows_short(&self) -> bool {
        self.allow_short
    }

    fn on_bar(&mut self, frame: &BarFrame<'_>) -> Result<Vec<Signal>, StrategyError> {
        let highs = frame.history_highs();
        let lows = frame.history_lows();

        let (entry_upper, entry_lower) = match donchian(&highs, &lows, self.entry_period) {
            Some(c) => c,
            None => return Ok(vec![]),
        };
        let (exit_upper, exit_lower) = match donchian(&highs, &lows, self.exit_period) {
            Some(c) => c,
            None => return Ok(vec![]),
        };

        let instrument = frame.instrument().clone();
        let qty = frame.position_qty(&instrument);
        let price = frame.close_f64();

        if price > entry_upper && qty <= Decimal::ZERO {
            return Ok(vec![Signal::target(
                instrument,
                self.position_size,
                format!("breakout_long: close={price:.2} > upper={entry_upper:.2}"),
            )]);
        }
        if price < entry_lower && self.allow_short && qty >= Decimal::ZERO {
            return Ok(vec![Signal::target(
                instrument,
                -self.position_size,
                format!("breakout_short: close={price:.2} < lower={entry_lower:.2}"),
            )]);
        }

        if qty > Decimal::ZERO && price < exit_lower {
            return Ok(vec![Signal::target_flat(
                instrument,
                format!("exit_long: close={price:.2} < exit_lower={exit_lower:.2}"),
            )]);
        }
        if qty < Decimal::ZERO && price > exit_upper {
            return Ok(vec![Signal::target_flat(
                instrument,
                format!("exit_short: close={price:.2} > exit_upper={exit_upper:.2}"),
            )]);
        }

        Ok(vec![])
    }
}
