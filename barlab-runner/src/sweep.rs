//! Parameter sweep: independent backtests over a sampled space, ranked by
//! a configurable score.
//!
//! Trials run on a rayon worker pool; each backtest owns its state, so the
//! only shared inputs are read-only. Ordering of the result table is
//! deterministic: score, then trial id.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use barlab_core::strategy::{Params, Strategy, StrategyError};

use crate::metrics::PerformanceMetrics;
use crate::param_space::{draw_samples, ParamSpace, Sampler};
use crate::runner::{run, RunSpec};

/// Which summary metric ranks the trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreField {
    Sharpe,
    TotalReturn,
    Calmar,
    ProfitFactor,
    WinRate,
    /// Minimized rather than maximized.
    MaxDrawdown,
}

impl ScoreField {
    pub fn value(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            ScoreField::Sharpe => metrics.sharpe,
            ScoreField::TotalReturn => metrics.total_return,
            ScoreField::Calmar => metrics.calmar,
            ScoreField::ProfitFactor => metrics.profit_factor,
            ScoreField::WinRate => metrics.win_rate,
            ScoreField::MaxDrawdown => metrics.max_drawdown,
        }
    }

    pub fn minimize(&self) -> bool {
        matches!(self, ScoreField::MaxDrawdown)
    }
}

impl Default for ScoreField {
    fn default() -> Self {
        ScoreField::Sharpe
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub sampler: Sampler,
    pub score: ScoreField,
}

/// One completed trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub trial_id: usize,
    pub seed: u64,
    pub params: Params,
    pub metrics: PerformanceMetrics,
    pub score: f64,
}

/// Ranked trial table, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResults {
    trials: Vec<Trial>,
}

impl SweepResults {
    fn ranked(mut trials: Vec<Trial>, score: ScoreField) -> Self {
        trials.sort_by(|a, b| {
            let ordering = a
                .score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal);
            let by_score = if score.minimize() {
                ordering
            } else {
                ordering.reverse()
            };
            by_score.then(a.trial_id.cmp(&b.trial_id))
        });
        Self { trials }
    }

    pub fn all(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn best(&self) -> Option<&Trial> {
        self.trials.first()
    }

    pub fn top_n(&self, n: usize) -> &[Trial] {
        &self.trials[..n.min(self.trials.len())]
    }
}

/// Run every sampled parameter set as an independent backtest.
///
/// `factory` builds a configured strategy from one parameter set; it is
/// called once per trial on the worker that runs it.
pub fn run_sweep<F>(
    space: &ParamSpace,
    sweep: &SweepConfig,
    spec: &RunSpec<'_>,
    factory: F,
) -> Result<SweepResults>
where
    F: Fn(&Params) -> Result<Box<dyn Strategy>, StrategyError> + Sync,
{
    let samples = draw_samples(space, &sweep.sampler);
    info!(trials = samples.len(), score = ?sweep.score, "sweep start");

    let trials: Vec<Trial> = samples
        .par_iter()
        .map(|sample| -> Result<Trial> {
            let mut strategy = factory(&sample.params)
                .with_context(|| format!("building strategy for trial {}", sample.trial_id))?;
            let report = run(spec, strategy.as_mut())
                .with_context(|| format!("running trial {}", sample.trial_id))?;
            let score = sweep.score.value(&report.metrics);
            Ok(Trial {
                trial_id: sample.trial_id,
                seed: sample.seed,
                params: sample.params.clone(),
                metrics: report.metrics,
                score,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SweepResults::ranked(trials, sweep.score))
}
