//! Single-run wrapper: engine run plus metrics, as one report.

use rust_decimal::prelude::ToPrimitive;

use barlab_core::domain::SpecRegistry;
use barlab_core::engine::{run_backtest, EngineConfig};
use barlab_core::error::EngineError;
use barlab_core::feed::HistorySet;
use barlab_core::strategy::Strategy;

use crate::metrics::PerformanceMetrics;
use crate::report::BacktestReport;

/// Borrowed inputs shared by every trial of a sweep.
#[derive(Clone, Copy)]
pub struct RunSpec<'a> {
    pub config: &'a EngineConfig,
    pub history: &'a HistorySet,
    pub registry: &'a SpecRegistry,
}

/// Bars per year for the reference stream:
/// `basis_days × 86_400 / timeframe_seconds`. The day-count basis comes
/// from the reference instrument's asset kind unless overridden.
pub fn bars_per_year(spec: &RunSpec<'_>) -> f64 {
    let reference = match spec.history.reference_stream() {
        Some(idx) => idx,
        None => return 0.0,
    };
    let key = spec.history.stream_key(reference);
    let basis = match spec.registry.get(&key.instrument) {
        Ok(instrument) => spec.config.basis_for(instrument.kind),
        Err(_) => 365,
    };
    f64::from(basis) * 86_400.0 / f64::from(key.timeframe.seconds())
}

/// Run one backtest and compute its metrics.
pub fn run(spec: &RunSpec<'_>, strategy: &mut dyn Strategy) -> Result<BacktestReport, EngineError> {
    let result = run_backtest(spec.config, spec.history, spec.registry, strategy)?;
    let metrics = PerformanceMetrics::compute(&result, bars_per_year(spec));
    tracing::debug!(
        final_equity = result.final_equity.to_f64().unwrap_or(0.0),
        sharpe = metrics.sharpe,
        trades = metrics.trade_count,
        "run complete"
    );
    Ok(BacktestReport { metrics, result })
}
