//! The single-run backtest engine: configuration, signal translation, rule
//! gates, matching, ledger, and the bar loop.

pub mod config;
pub mod cost;
pub mod ledger;
pub mod loop_runner;
pub mod result;
pub mod rules;
pub mod translator;

pub use config::{EngineConfig, GapPolicy};
pub use cost::CostModel;
pub use ledger::{EquityPoint, Ledger, LedgerView};
pub use loop_runner::run_backtest;
pub use result::{FaultEvent, RunResult};
pub use rules::{GateContext, GateDecision, RuleBook};
pub use translator::{translate, IdGen, Translation};
