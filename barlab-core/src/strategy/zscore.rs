//! Z-score mean reversion.
//!
//! Long when the normalized deviation of the latest close from its rolling
//! mean drops below `-entry_z`, short above `+entry_z`, exit when the score
//! reverts through the exit threshold.

use rust_decimal::Decimal;

use crate::domain::Signal;
use crate::strategy::indicators::zscore;
use crate::strategy::params::{validate, ParamReader, ParamSpec, Params};
use crate::strategy::{BarFrame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct ZScore {
    period: usize,
    entry_z: f64,
    exit_z: f64,
    position_size: Decimal,
}

impl ZScore {
    pub fn new() -> Self {
        Self {
            period: 20,
            entry_z: 2.0,
            exit_z: 0.5,
            position_size: Decimal::ONE,
        }
    }
}

impl Default for ZScore {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for ZScore {
    fn name(&self) -> &'static str {
        "zscore"
    }

    fn param_schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("period", 20, 2, 1000),
            ParamSpec::float("entry_z", 2.0, 0.1, 10.0),
            ParamSpec::float("exit_z", 0.5, 0.0, 10.0),
            ParamSpec::float("position_size", 1.0, 0.0, 1e12),
        ]
    }

    fn configure(&mut self, params: &Params) -> Result<(), StrategyError> {
        validate(params, &self.param_schema())?;
        let reader = ParamReader::new(params);
        self.period = reader.usize("period", 20);
        self.entry_z = reader.float("entry_z", 2.0);
        self.exit_z = reader.float("exit_z", 0.5);
        self.position_size = reader.decimal("position_size", Decimal::ONE);
        if self.exit_z >= self.entry_z {
            return Err(StrategyError::Fault(format!(
                "exit_z ({}) must be below entry_z ({})",
                self.exit_z, self.entry_z
            )));
        }
        Ok(())
    }

    fn min_history(&self) -> usize {
        self.period
    }

    fn allows_short(&self) -> bool {
        true
    }

    fn on_bar(&mut self, frame: &BarFrame<'_>) -> Result<Vec<Signal>, StrategyError> {
        let closes = frame.history_closes();
        let z = match zscore(&closes, self.period) {
            Some(z) => z,
            None => return Ok(vec![]),
        };

        let instrument = frame.instrument().clone();
        let qty = frame.position_qty(&instrument);

        if qty > Decimal::ZERO && z >= -self.exit_z {
            return Ok(vec![Signal::target_flat(
                instrument,
                format!("zscore_exit_long: z={z:.2} >= -{}", self.exit_z),
            )]);
        }
        if qty < Decimal::ZERO && z <= self.exit_z {
            return Ok(vec![Signal::target_flat(
                instrument,
                format!("zscore_exit_short: z={z:.2} <= {}", self.exit_z),
            )]);
        }

        if z < -self.entry_z && qty <= Decimal::ZERO {
            return Ok(vec![Signal::target(
                instrument,
                self.position_size,
                format!("zscore_long: z={z:.2} < -{}", self.entry_z),
            )]);
        }
        if z > self.entry_z && qty >= Decimal::ZERO {
            return Ok(vec![Signal::target(
                instrument,
                -self.position_size,
                format!("zscore_short: z={z:.2} > {}", self.entry_z),
            )]);
        }

        Ok(vec![])
    }
}
