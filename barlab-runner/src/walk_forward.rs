//! Walk-forward evaluation: tune on a rolling train window, test on the
//! slice immediately after it, report the concatenated out-of-sample
//! series.
//!
//! Fold boundaries are bar counts on the reference stream (the stream with
//! the most bars); every stream is sliced by the corresponding time range.

use anyhow::{bail, Context, Result};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::info;

use barlab_core::strategy::{Params, Strategy, StrategyError};

use crate::metrics::{bar_returns, PerformanceMetrics};
use crate::param_space::ParamSpace;
use crate::runner::{bars_per_year, run, RunSpec};
use crate::sweep::{run_sweep, SweepConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Train window length, in reference-stream bars.
    pub train_bars: usize,
    /// Test window length and fold step, in reference-stream bars.
    pub test_bars: usize,
    /// How each fold's train window is searched.
    pub sweep: SweepConfig,
}

/// One fold's boundaries in epoch milliseconds, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSpan {
    pub start_ms: i64,
    pub end_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldOutcome {
    pub fold_index: usize,
    pub train: FoldSpan,
    pub test: FoldSpan,
    pub best_params: Params,
    pub seed: u64,
    pub train_score: f64,
    pub test_score: f64,
    pub test_metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub folds: Vec<FoldOutcome>,
    /// Per-bar returns of the concatenated test slices.
    pub oos_returns: Vec<f64>,
    /// Aggregate metrics over the stitched out-of-sample series. Trade
    /// statistics live on the per-fold metrics.
    pub oos_metrics: PerformanceMetrics,
    pub mean_train_score: f64,
    pub mean_test_score: f64,
    /// `(train − test) / |train|`; large positive values flag overfitting.
    pub score_decay: f64,
}

/// Run walk-forward evaluation over `spec.history`.
pub fn run_walk_forward<F>(
    wf: &WalkForwardConfig,
    space: &ParamSpace,
    spec: &RunSpec<'_>,
    factory: F,
) -> Result<WalkForwardResult>
where
    F: Fn(&Params) -> Result<Box<dyn Strategy>, StrategyError> + Sync,
{
    if wf.train_bars == 0 || wf.test_bars == 0 {
        bail!("walk-forward windows must be non-empty");
    }
    let reference = spec
        .history
        .reference_stream()
        .context("history has no bars")?;
    let times: Vec<i64> = spec
        .history
        .bars(reference)
        .iter()
        .map(|b| b.t_open.timestamp_millis())
        .collect();

    // Boundary at index n; one past the last bar is "after everything".
    let boundary = |idx: usize| -> i64 {
        if idx < times.len() {
            times[idx]
        } else {
            times[times.len() - 1] + 1
        }
    };

    let mut folds = Vec::new();
    let mut oos_returns: Vec<f64> = Vec::new();
    let mut fold_index = 0usize;

    loop {
        let train_start = fold_index * wf.test_bars;
        let train_end = train_start + wf.train_bars;
        let test_end = train_end + wf.test_bars;
        if test_end > times.len() {
            break;
        }

        let train = FoldSpan {
            start_ms: boundary(train_start),
            end_ms: boundary(train_end),
        };
        let test = FoldSpan {
            start_ms: boundary(train_end),
            end_ms: boundary(test_end),
        };

        let train_history = spec.history.slice_time(train.start_ms, train.end_ms);
        let test_history = spec.history.slice_time(test.start_ms, test.end_ms);

        let train_spec = RunSpec {
            config: spec.config,
            history: &train_history,
            registry: spec.registry,
        };
        let results = run_sweep(space, &wf.sweep, &train_spec, &factory)
            .with_context(|| format!("tuning fold {fold_index}"))?;
        let best = results
            .best()
            .with_context(|| format!("fold {fold_index} produced no trials"))?;

        let test_spec = RunSpec {
            config: spec.config,
            history: &test_history,
            registry: spec.registry,
        };
        let mut strategy = factory(&best.params)
            .with_context(|| format!("building test strategy for fold {fold_index}"))?;
        let report = run(&test_spec, strategy.as_mut())
            .with_context(|| format!("testing fold {fold_index}"))?;

        let fold_equity: Vec<f64> = report
            .result
            .equity_series
            .iter()
            .map(|p| p.equity.to_f64().unwrap_or(0.0))
            .collect();
        oos_returns.extend(bar_returns(&fold_equity));

        info!(
            fold = fold_index,
            train_score = best.score,
            test_score = wf.sweep.score.value(&report.metrics),
            "fold complete"
        );

        folds.push(FoldOutcome {
            fold_index,
            train,
            test,
            best_params: best.params.clone(),
            seed: best.seed,
            train_score: best.score,
            test_score: wf.sweep.score.value(&report.metrics),
            test_metrics: report.metrics,
        });
        fold_index += 1;
    }

    if folds.is_empty() {
        bail!(
            "not enough data for walk-forward: {} bars < train {} + test {}",
            times.len(),
            wf.train_bars,
            wf.test_bars
        );
    }

    let n = folds.len() as f64;
    let mean_train_score = folds.iter().map(|f| f.train_score).sum::<f64>() / n;
    let mean_test_score = folds.iter().map(|f| f.test_score).sum::<f64>() / n;
    let score_decay = if mean_train_score != 0.0 {
        (mean_train_score - mean_test_score) / mean_train_score.abs()
    } else {
        0.0
    };

    let oos_metrics = PerformanceMetrics::from_returns(&oos_returns, bars_per_year(spec));

    Ok(WalkForwardResult {
        folds,
        oos_returns,
        oos_metrics,
        mean_train_score,
        mean_test_score,
        score_decay,
    })
}
