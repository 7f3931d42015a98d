//! barlab-runner — orchestration around the single-run engine.
//!
//! Performance metrics, parameter-space sampling (grid / random / Latin
//! hypercube), parallel sweeps, and walk-forward evaluation. The engine
//! itself is single-threaded; parallelism lives here, one worker per
//! independent backtest.

pub mod metrics;
pub mod param_space;
pub mod report;
pub mod runner;
pub mod sweep;
pub mod walk_forward;

pub use metrics::PerformanceMetrics;
pub use param_space::{draw_samples, ParamRange, ParamSpace, Sample, Sampler};
pub use report::BacktestReport;
pub use runner::{bars_per_year, run, RunSpec};
pub use sweep::{run_sweep, ScoreField, SweepConfig, SweepResults, Trial};
pub use walk_forward::{run_walk_forward, FoldOutcome, WalkForwardConfig, WalkForwardResult};
