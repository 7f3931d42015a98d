//! Dual moving average crossover.
//!
//! Long while the fast SMA is above the slow SMA; flat (or short when
//! allowed) on the opposite relation. Averages are computed over the
//! history window, so decisions never read the current bar's close into
//! the indicator itself.

use rust_decimal::Decimal;

use crate::domain::Signal;
use crate::strategy::indicators::sma;
use crate::strategy::params::{validate, ParamReader, ParamSpec, Params};
use crate::strategy::{BarFrame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct DualMa {
    fast: usize,
    slow: usize,
    position_size: Decimal,
    allow_short: bool,
}

impl DualMa {
    pub fn new() -> Self {
        Self {
            fast: 10,
            slow: 30,
            position_size: Decimal::ONE,
            allow_short: false,
        }
    }
}

impl Default for DualMa {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for DualMa {
    fn name(&self) -> &'static str {
        "dual_ma"
    }

    fn param_schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("fast", 10, 1, 500),
            ParamSpec::int("slow", 30, 2, 1000),
            ParamSpec::float("position_size", 1.0, 0.0, 1e12),
            ParamSpec::flag("allow_short", false),
        ]
    }

    fn configure(&mut self, params: &Params) -> Result<(), StrategyError> {
        validate(params, &self.param_schema())?;
        let reader = ParamReader::new(params);
        self.fast = reader.usize("fast", 10);
        self.slow = reader.usize("slow", 30);
        self.position_size = reader.decimal("position_size", Decimal::ONE);
        self.allow_short = reader.flag("allow_short", false);
        if self.fast >= self.slow {
            return Err(StrategyError::Fault(format!(
                "fast ({}) must be below slow ({})",
                self.fast, self.slow
            )));
        }
        Ok(())
    }

    fn min_history(&self) -> usize {
        self.slow
    }

    fn allows_short(&self) -> bool {
        self.allow_short
    }

    fn on_bar(&mut self, frame: &BarFrame<'_>) -> Result<Vec<Signal>, StrategyError> {
        let closes = frame.history_closes();
        let (fast_ma, slow_ma) = match (sma(&closes, self.fast), sma(&closes, self.slow)) {
            (Some(f), Some(s)) => (f, s),
            _ => return Ok(vec![]),
        };

        let instrument = frame.instrument().clone();
        let qty = frame.position_qty(&instrument);

        if fast_ma > slow_ma {
            if qty <= Decimal::ZERO {
                return Ok(vec![Signal::target(
                    instrument,
                    self.position_size,
                    format!("golden_cross: fast={fast_ma:.2} > slow={slow_ma:.2}"),
                )]);
            }
        } else if fast_ma < slow_ma {
            if qty > Decimal::ZERO {
                return Ok(vec![Signal::target_flat(
                    instrument,
                    format!("death_cross: fast={fast_ma:.2} < slow={slow_ma:.2}"),
                )]);
            }
            if self.allow_short && qty == Decimal::ZERO {
                return Ok(vec![Signal::target(
                    instrument,
                    -self.position_size,
                    format!("death_cross_short: fast={fast_ma:.2} < slow={slow_ma:.2}"),
                )]);
            }
        }

        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::params::ParamValue;
    use crate::test_util::{frame_fixture, FrameFixture};
    use rust_decimal_macros::dec;

    fn configured(fast: i64, slow: i64, allow_short: bool) -> DualMa {
        let mut strat = DualMa::new();
        let mut params = Params::new();
        params.insert("fast".into(), ParamValue::Int(fast));
        params.insert("slow".into(), ParamValue::Int(slow));
        params.insert("allow_short".into(), ParamValue::Bool(allow_short));
        strat.configure(&params).unwrap();
        strat
    }

    #[test]
    fn rejects_fast_at_or_above_slow() {
        let mut strat = DualMa::new();
        let mut params = Params::new();
        params.insert("fast".into(), ParamValue::Int(30));
        params.insert("slow".into(), ParamValue::Int(30));
        assert!(strat.configure(&params).is_err());
    }

    #[test]
    fn goes_long_when_fast_above_slow() {
        let mut strat = configured(2, 4, false);
        // Rising closes: fast mean above slow mean.
        let FrameFixture { bars, ledger } = frame_fixture(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let frame = BarFrame {
            bar: bars.last().unwrap(),
            history: &bars[..bars.len() - 1],
            ledger: ledger.view(),
        };
        let signals = strat.on_bar(&frame).unwrap();
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            Signal::TargetPosition { quantity, .. } => assert_eq!(*quantity, dec!(1)),
            other => panic!("expected target, got {other:?}"),
        }
    }

    #[test]
    fn holds_in_flat_market() {
        let mut strat = configured(2, 4, false);
        let FrameFixture { bars, ledger } = frame_fixture(&[100.0; 6]);
        let frame = BarFrame {
            bar: bars.last().unwrap(),
            history: &bars[..bars.len() - 1],
            ledger: ledger.view(),
        };
        assert!(strat.on_bar(&frame).unwrap().is_empty());
    }

    #[test]
    fn shorts_only_when_allowed() {
        // Falling closes: fast below slow.
        let closes = [104.0, 103.0, 102.0, 101.0, 100.0];

        let mut no_short = configured(2, 4, false);
        let FrameFixture { bars, ledger } = frame_fixture(&closes);
        let frame = BarFrame {
            bar: bars.last().unwrap(),
            history: &bars[..bars.len() - 1],
            ledger: ledger.view(),
        };
        assert!(no_short.on_bar(&frame).unwrap().is_empty());

        let mut with_short = configured(2, 4, true);
        let signals = with_short.on_bar(&frame).unwrap();
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            Signal::TargetPosition { quantity, .. } => assert_eq!(*quantity, dec!(-1)),
            other => panic!("expected short target, got {other:?}"),
        }
    }

    #[test]
    fn insufficient_history_holds() {
        let mut strat = configured(2, 4, false);
        let FrameFixture { bars, ledger } = frame_fixture(&[100.0, 101.0, 102.0]);
        let frame = BarFrame {
            bar: bars.last().unwrap(),
            history: &bars[..bars.len() - 1],
            ledger: ledger.view(),
        };
        assert!(strat.on_bar(&frame).unwrap().is_empty());
    }
}
