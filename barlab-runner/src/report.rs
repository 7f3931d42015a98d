//! Structured backtest report: summary metrics plus the engine's raw
//! output. External serializers (columnar tables, HTML) live outside.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use barlab_core::engine::RunResult;

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub metrics: PerformanceMetrics,
    pub result: RunResult,
}

impl BacktestReport {
    /// Enumerated metric name → value mapping for the summary surface.
    pub fn summary_map(&self) -> BTreeMap<&'static str, f64> {
        let m = &self.metrics;
        BTreeMap::from([
            ("total_return", m.total_return),
            ("annualized_return", m.annualized_return),
            ("volatility", m.volatility),
            ("sharpe", m.sharpe),
            ("sortino", m.sortino),
            ("calmar", m.calmar),
            ("max_drawdown", m.max_drawdown),
            ("win_rate", m.win_rate),
            ("profit_factor", m.profit_factor),
            ("avg_trade_pnl", m.avg_trade_pnl),
            ("trade_count", m.trade_count as f64),
            ("turnover", m.turnover),
            ("total_fees", m.total_fees),
            ("total_taxes", m.total_taxes),
        ])
    }
}
