//! Bollinger band mean reversion.
//!
//! Long on a touch of the lower band, exit on reversion to the middle (or
//! a touch of the upper band); optional short side on the upper band.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Signal;
use crate::strategy::indicators::{sma, std_dev};
use crate::strategy::params::{validate, ParamReader, ParamSpec, Params};
use crate::strategy::{BarFrame, Strategy, StrategyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum EntrySide {
    Long,
    Short,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    std_mult: f64,
    position_size: Decimal,
    allow_short: bool,
    exit_at_middle: bool,
    entry_side: Option<EntrySide>,
}

impl Bollinger {
    pub fn new() -> Self {
        Self {
            period: 20,
            std_mult: 2.0,
            position_size: Decimal::ONE,
            allow_short: false,
            exit_at_middle: true,
            entry_side: None,
        }
    }

    fn bands(&self, closes: &[f64]) -> Option<(f64, f64, f64)> {
        let middle = sma(closes, self.period)?;
        let std = std_dev(closes, self.period)?;
        Some((
            middle,
            middle + self.std_mult * std,
            middle - self.std_mult * std,
        ))
    }
}

impl Default for Bollinger {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for Bollinger {
    fn name(&self) -> &'static str {
        "bollinger"
    }

    fn param_schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("period", 20, 2, 1000),
            ParamSpec::float("std_dev", 2.0, 0.1, 10.0),
            ParamSpec::float("position_size", 1.0, 0.0, 1e12),
            ParamSpec::flag("allow_short", false),
            ParamSpec::flag("exit_at_middle", true),
        ]
    }

    fn configure(&mut self, params: &Params) -> Result<(), StrategyError> {
        validate(params, &self.param_schema())?;
        let reader = ParamReader::new(params);
        self.period = reader.usize("period", 20);
        self.std_mult = reader.float("std_dev", 2.0);
        self.position_size = reader.decimal("position_size", Decimal::ONE);
        self.allow_short = reader.flag("allow_short", false);
        self.exit_at_middle = reader.flag("exit_at_middle", true);
        self.entry_side = None;
        Ok(())
    }

    fn min_history(&self) -> usize {
        self.period
    }

    fn allows_short(&self) -> bool {
        self.allow_short
    }

    fn on_bar(&mut self, frame: &BarFrame<'_>) -> Result<Vec<Signal>, StrategyError> {
        let closes = frame.history_closes();
        let (middle, upper, lower) = match self.bands(&closes) {
            Some(b) => b,
            None => return Ok(vec![]),
        };

        let instrument = frame.instrument().clone();
        let qty = frame.position_qty(&instrument);
        let price = frame.close_f64();

        // Middle-band exit for whichever side we entered on.
        if self.exit_at_middle && qty != Decimal::ZERO {
            match self.entry_side {
                Some(EntrySide::Long) if price >= middle => {
                    self.entry_side = None;
                    return Ok(vec![Signal::target_flat(
                        instrument,
                        format!("exit_at_middle: close={price:.2} >= middle={middle:.2}"),
                    )]);
                }
                Some(EntrySide::Short) if price <= middle => {
                    self.entry_side = None;
                    return Ok(vec![Signal::target_flat(
                        instrument,
                        format!("exit_at_middle: close={price:.2} <= middle={middle:.2}"),
                    )]);
                }
                _ => {}
            }
        }

        if price <= lower {
            if qty <= Decimal::ZERO {
                self.entry_side = Some(EntrySide::Long);
                return Ok(vec![Signal::target(
                    instrument,
                    self.position_size,
                    format!("touch_lower: close={price:.2} <= lower={lower:.2}"),
                )]);
            }
        } else if price >= upper {
            if qty > Decimal::ZERO {
                self.entry_side = None;
                return Ok(vec![Signal::target_flat(
                    instrument,
                    format!("touch_upper: close={price:.2} >= upper={upper:.2}"),
                )]);
            }
            if self.allow_short && qty == Decimal::ZERO {
                self.entry_side = Some(EntrySide::Short);
                return Ok(vec![Signal::target(
                    instrument,
                    -self.position_size,
                    format!("touch_upper_short: close={price:.2} >= upper={upper:.2}"),
                )]);
            }
        }

        Ok(vec![])
    }
}
