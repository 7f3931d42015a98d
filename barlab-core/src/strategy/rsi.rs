//! RSI mean reversion.
//!
//! Long below the oversold threshold, exit when RSI recovers through the
//! exit level (or the overbought threshold); optional short side.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Signal;
use crate::strategy::indicators::rsi;
use crate::strategy::params::{validate, ParamReader, ParamSpec, Params};
use crate::strategy::{BarFrame, Strategy, StrategyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum EntrySide {
    Long,
    Short,
}

#[derive(Debug, Clone)]
pub struct RsiReversion {
    period: usize,
    oversold: f64,
    overbought: f64,
    exit_level: f64,
    position_size: Decimal,
    allow_short: bool,
    entry_side: Option<EntrySide>,
}

impl RsiReversion {
    pub fn new() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
            exit_level: 50.0,
            position_size: Decimal::ONE,
            allow_short: false,
            entry_side: None,
        }
    }
}

impl Default for RsiReversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for RsiReversion {
    fn name(&self) -> &'static str {
        "rsi_reversion"
    }

    fn param_schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("period", 14, 2, 500),
            ParamSpec::float("oversold", 30.0, 0.0, 100.0),
            ParamSpec::float("overbought", 70.0, 0.0, 100.0),
            ParamSpec::float("exit_level", 50.0, 0.0, 100.0),
            ParamSpec::float("position_size", 1.0, 0.0, 1e12),
            ParamSpec::flag("allow_short", false),
        ]
    }

    fn configure(&mut self, params: &Params) -> Result<(), StrategyError> {
        validate(params, &self.param_schema())?;
        let reader = ParamReader::new(params);
        self.period = reader.usize("period", 14);
        self.oversold = reader.float("oversold", 30.0);
        self.overbought = reader.float("overbought", 70.0);
        self.exit_level = reader.float("exit_level", 50.0);
        self.position_size = reader.decimal("position_size", Decimal::ONE);
        self.allow_short = reader.flag("allow_short", false);
        self.entry_side = None;
        if self.oversold >= self.overbought {
            return Err(StrategyError::Fault(format!(
                "oversold ({}) must be below overbought ({})",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }

    fn min_history(&self) -> usize {
        self.period + 1
    }

    fn allows_short(&self) -> bool {
        self.allow_short
    }

    fn on_bar(&mut self, frame: &BarFrame<'_>) -> Result<Vec<Signal>, StrategyError> {
        let closes = frame.history_closes();
        let value = match rsi(&closes, self.period) {
            Some(v) => v,
            None => return Ok(vec![]),
        };

        let instrument = frame.instrument().clone();
        let qty = frame.position_qty(&instrument);

        if qty != Decimal::ZERO {
            match self.entry_side {
                Some(EntrySide::Long) if value >= self.exit_level => {
                    self.entry_side = None;
                    return Ok(vec![Signal::target_flat(
                        instrument,
                        format!("rsi_neutral: rsi={value:.1} >= exit={}", self.exit_level),
                    )]);
                }
                Some(EntrySide::Short) if value <= self.exit_level => {
                    self.entry_side = None;
                    return Ok(vec![Signal::target_flat(
                        instrument,
                        format!("rsi_neutral: rsi={value:.1} <= exit={}", self.exit_level),
                    )]);
                }
                _ => {}
            }
        }

        if value < self.oversold {
            if qty <= Decimal::ZERO {
                self.entry_side = Some(EntrySide::Long);
                return Ok(vec![Signal::target(
                    instrument,
                    self.position_size,
                    format!("rsi_oversold: rsi={value:.1} < {}", self.oversold),
                )]);
            }
        } else if value > self.overbought {
            if qty > Decimal::ZERO {
                self.entry_side = None;
                return Ok(vec![Signal::target_flat(
                    instrument,
                    format!("rsi_overbought: rsi={value:.1} > {}", self.overbought),
                )]);
            }
            if self.allow_short && qty == Decimal::ZERO {
                self.entry_side = Some(EntrySide::Short);
                return Ok(vec![Signal::target(
                    instrument,
                    -self.position_size,
                    format!("rsi_overbought_short: rsi={value:.1} > {}", self.overbought),
                )]);
            }
        }

        Ok(vec![])
    }
}
