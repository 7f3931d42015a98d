//! Performance metrics — pure functions over the equity series and trade
//! ledger.
//!
//! All statistics are `f64`; the exact-decimal bookkeeping stays in the
//! engine. `bars_per_year` carries the annualization basis:
//! `basis_days × 86_400 / timeframe_seconds`.

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use barlab_core::domain::TradeRecord;
use barlab_core::engine::RunResult;

/// Aggregate statistics for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    /// Annualized volatility of bar returns.
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Largest fractional decline from the running high-water mark.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    /// Mean net PnL per trade (expectancy).
    pub avg_trade_pnl: f64,
    pub trade_count: usize,
    /// Annualized traded notional over average equity.
    pub turnover: f64,
    pub total_fees: f64,
    pub total_taxes: f64,
}

impl PerformanceMetrics {
    /// Compute everything from a run result.
    pub fn compute(result: &RunResult, bars_per_year: f64) -> Self {
        let equity: Vec<f64> = result
            .equity_series
            .iter()
            .map(|p| p.equity.to_f64().unwrap_or(0.0))
            .collect();
        let returns = bar_returns(&equity);
        let years = if bars_per_year > 0.0 {
            equity.len() as f64 / bars_per_year
        } else {
            0.0
        };

        let total = total_return(&equity);
        let annualized = annualized_return(total, years);
        let dd = max_drawdown(&equity);

        let avg_equity = if equity.is_empty() {
            0.0
        } else {
            equity.iter().sum::<f64>() / equity.len() as f64
        };
        let notional = result.traded_notional().to_f64().unwrap_or(0.0);
        let turnover = if avg_equity > 0.0 && years > 0.0 {
            notional / avg_equity / years
        } else {
            0.0
        };

        Self {
            total_return: total,
            annualized_return: annualized,
            volatility: volatility(&returns, bars_per_year),
            sharpe: sharpe_ratio(&returns, bars_per_year),
            sortino: sortino_ratio(&returns, bars_per_year),
            calmar: calmar_ratio(annualized, dd),
            max_drawdown: dd,
            win_rate: win_rate(&result.trades),
            profit_factor: profit_factor(&result.trades),
            avg_trade_pnl: avg_trade_pnl(&result.trades),
            trade_count: result.trades.len(),
            turnover,
            total_fees: result.total_fees.to_f64().unwrap_or(0.0),
            total_taxes: result.total_taxes.to_f64().unwrap_or(0.0),
        }
    }

    /// Metrics from a bare return series (stitched walk-forward folds).
    /// Trade statistics are zeroed; callers keep per-fold trade stats.
    pub fn from_returns(returns: &[f64], bars_per_year: f64) -> Self {
        let mut equity = Vec::with_capacity(returns.len() + 1);
        equity.push(1.0);
        for r in returns {
            let last = *equity.last().unwrap();
            equity.push(last * (1.0 + r));
        }
        let years = if bars_per_year > 0.0 {
            equity.len() as f64 / bars_per_year
        } else {
            0.0
        };
        let total = total_return(&equity);
        let annualized = annualized_return(total, years);
        let dd = max_drawdown(&equity);

        Self {
            total_return: total,
            annualized_return: annualized,
            volatility: volatility(returns, bars_per_year),
            sharpe: sharpe_ratio(returns, bars_per_year),
            sortino: sortino_ratio(returns, bars_per_year),
            calmar: calmar_ratio(annualized, dd),
            max_drawdown: dd,
            win_rate: 0.0,
            profit_factor: 0.0,
            avg_trade_pnl: 0.0,
            trade_count: 0,
            turnover: 0.0,
            total_fees: 0.0,
            total_taxes: 0.0,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Simple per-bar returns from an equity curve.
pub fn bar_returns(equity: &[f64]) -> Vec<f64> {
    if equity.len() < 2 {
        return Vec::new();
    }
    equity
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub fn total_return(equity: &[f64]) -> f64 {
    if equity.len() < 2 || equity[0] == 0.0 {
        return 0.0;
    }
    (equity[equity.len() - 1] - equity[0]) / equity[0]
}

/// `(1 + total)^(1/years) − 1`.
pub fn annualized_return(total_return: f64, years: f64) -> f64 {
    if years <= 0.0 || 1.0 + total_return <= 0.0 {
        return 0.0;
    }
    (1.0 + total_return).powf(1.0 / years) - 1.0
}

/// Sample standard deviation of returns, scaled by `√bars_per_year`.
pub fn volatility(returns: &[f64], bars_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    std_dev(returns) * bars_per_year.sqrt()
}

/// Annualized mean excess return (over zero) divided by annualized
/// volatility.
pub fn sharpe_ratio(returns: &[f64], bars_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let vol = volatility(returns, bars_per_year);
    if vol == 0.0 {
        return 0.0;
    }
    mean(returns) * bars_per_year / vol
}

/// Sharpe with a downside-deviation denominator.
pub fn sortino_ratio(returns: &[f64], bars_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.len() < 2 {
        return 0.0;
    }
    let down_vol = std_dev(&downside) * bars_per_year.sqrt();
    if down_vol == 0.0 {
        return 0.0;
    }
    mean(returns) * bars_per_year / down_vol
}

/// Annualized return over absolute max drawdown; zero when flat.
pub fn calmar_ratio(annualized_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown == 0.0 {
        return 0.0;
    }
    annualized_return / max_drawdown.abs()
}

/// Largest fractional decline from a running peak (0.15 = 15%).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > worst {
                worst = dd;
            }
        }
    }
    worst
}

pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Gross profit over gross loss, capped at 100.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let mut profit = 0.0;
    let mut loss = 0.0;
    for trade in trades {
        let pnl = trade.net_pnl.to_f64().unwrap_or(0.0);
        if pnl > 0.0 {
            profit += pnl;
        } else {
            loss += -pnl;
        }
    }
    if loss < 1e-12 {
        return if profit > 0.0 { 100.0 } else { 0.0 };
    }
    (profit / loss).min(100.0)
}

pub fn avg_trade_pnl(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades
        .iter()
        .map(|t| t.net_pnl.to_f64().unwrap_or(0.0))
        .sum::<f64>()
        / trades.len() as f64
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
