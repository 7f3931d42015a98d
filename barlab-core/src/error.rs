//! Fatal error kinds surfaced by the engine.
//!
//! Non-fatal events (rule rejections, liquidations, duplicate signals,
//! tolerated strategy faults) are values recorded in the run result, not
//! errors.

use thiserror::Error;

use crate::domain::{InstrumentError, InstrumentId, Timeframe};
use crate::engine::translator::TranslateError;
use crate::feed::FeedError;
use crate::strategy::StrategyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("data gap: {count} missing span(s), first in {instrument} {timeframe:?} at {expected_ms}ms")]
    DataGap {
        count: usize,
        instrument: InstrumentId,
        timeframe: Timeframe,
        expected_ms: i64,
    },

    #[error(transparent)]
    UnknownInstrument(#[from] InstrumentError),

    #[error("no bar stream for {instrument} at {timeframe:?}")]
    MissingStream {
        instrument: InstrumentId,
        timeframe: Timeframe,
    },

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("history contains no bars")]
    NoData,
}
