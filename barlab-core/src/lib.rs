//! barlab-core — deterministic bar-driven backtest engine.
//!
//! Replays history bar by bar: strategies decide at bar close, orders fill
//! at the next bar open through market-specific rule gates (crypto spot,
//! crypto perpetual, A-share), and a decimal-exact ledger produces the
//! equity series and trade ledger. Single-threaded and byte-for-byte
//! reproducible; parallelism belongs to the orchestrator around it.

pub mod domain;
pub mod engine;
pub mod error;
pub mod feed;
pub mod strategy;

pub use engine::{run_backtest, EngineConfig, GapPolicy, RunResult};
pub use error::EngineError;
