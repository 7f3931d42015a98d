//! History feed and scheduler.
//!
//! Merges per-(instrument, timeframe) bar streams into one globally
//! chronological tick sequence. Ties on `t_open` break by timeframe seconds
//! ascending, then instrument id — a total order, so the schedule is a pure
//! function of the inputs.
//!
//! Gaps inside a stream's expected grid are never silently filled: they are
//! detected at construction and surfaced to the engine, whose gap policy
//! decides whether to skip or abort.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, BarError, InstrumentId, Timeframe};

/// Raw history input row. The core does not parse storage formats; callers
/// hand in rows grouped by stream and ascending in `t_open` within each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRow {
    pub instrument_id: String,
    pub timeframe_secs: u32,
    pub t_open_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// One bar stream's identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub instrument: InstrumentId,
    pub timeframe: Timeframe,
}

/// A missing bar inside a stream's expected grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapEvent {
    pub instrument: InstrumentId,
    pub timeframe: Timeframe,
    pub expected_ms: i64,
    pub found_ms: i64,
}

/// One scheduler tick: bar `bar` of stream `stream` is now closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub stream: usize,
    pub bar: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Stream {
    key: StreamKey,
    bars: Vec<Bar>,
}

/// Validated, gap-annotated set of bar streams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySet {
    streams: Vec<Stream>,
    gaps: Vec<GapEvent>,
}

impl HistorySet {
    /// Build from raw rows. Validates timeframes, grid alignment, ordering,
    /// and OHLC invariants; records gaps.
    pub fn from_rows(rows: impl IntoIterator<Item = BarRow>) -> Result<Self, FeedError> {
        let mut set = HistorySet::default();
        for row in rows {
            let timeframe = Timeframe::from_seconds(row.timeframe_secs).ok_or(
                FeedError::UnknownTimeframe {
                    secs: row.timeframe_secs,
                },
            )?;
            let instrument = InstrumentId::new(row.instrument_id.clone());
            if timeframe.floor_ms(row.t_open_ms) != row.t_open_ms {
                return Err(FeedError::Misaligned {
                    instrument,
                    timeframe,
                    t_open_ms: row.t_open_ms,
                });
            }
            let t_open = epoch_ms(row.t_open_ms);
            let bar = Bar {
                instrument: instrument.clone(),
                timeframe,
                t_open,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            };
            bar.validate().map_err(|source| FeedError::MalformedBar {
                instrument: instrument.clone(),
                t_open_ms: row.t_open_ms,
                source,
            })?;
            set.push_bar(bar)?;
        }
        set.detect_gaps();
        set.streams.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(set)
    }

    /// Build from already-typed bars (used heavily in tests).
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Result<Self, FeedError> {
        let mut set = HistorySet::default();
        for bar in bars {
            bar.validate().map_err(|source| FeedError::MalformedBar {
                instrument: bar.instrument.clone(),
                t_open_ms: bar.t_open.timestamp_millis(),
                source,
            })?;
            set.push_bar(bar)?;
        }
        set.detect_gaps();
        set.streams.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(set)
    }

    fn push_bar(&mut self, bar: Bar) -> Result<(), FeedError> {
        let key = StreamKey {
            instrument: bar.instrument.clone(),
            timeframe: bar.timeframe,
        };
        let stream = match self.streams.iter_mut().find(|s| s.key == key) {
            Some(s) => s,
            None => {
                self.streams.push(Stream {
                    key,
                    bars: Vec::new(),
                });
                self.streams.last_mut().unwrap()
            }
        };
        if let Some(last) = stream.bars.last() {
            let prev_ms = last.t_open.timestamp_millis();
            let next_ms = bar.t_open.timestamp_millis();
            if next_ms == prev_ms {
                return Err(FeedError::Duplicate {
                    instrument: stream.key.instrument.clone(),
                    timeframe: stream.key.timeframe,
                    t_open_ms: next_ms,
                });
            }
            if next_ms < prev_ms {
                return Err(FeedError::OutOfOrder {
                    instrument: stream.key.instrument.clone(),
                    timeframe: stream.key.timeframe,
                    prev_ms,
                    next_ms,
                });
            }
        }
        stream.bars.push(bar);
        Ok(())
    }

    fn detect_gaps(&mut self) {
        self.gaps.clear();
        for stream in &self.streams {
            let width = i64::from(stream.key.timeframe.seconds()) * 1_000;
            for pair in stream.bars.windows(2) {
                let prev_ms = pair[0].t_open.timestamp_millis();
                let next_ms = pair[1].t_open.timestamp_millis();
                if next_ms - prev_ms > width {
                    self.gaps.push(GapEvent {
                        instrument: stream.key.instrument.clone(),
                        timeframe: stream.key.timeframe,
                        expected_ms: prev_ms + width,
                        found_ms: next_ms,
                    });
                }
            }
        }
    }

    pub fn gaps(&self) -> &[GapEvent] {
        &self.gaps
    }

    pub fn is_empty(&self) -> bool {
        self.streams.iter().all(|s| s.bars.is_empty())
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn stream_key(&self, index: usize) -> &StreamKey {
        &self.streams[index].key
    }

    pub fn bars(&self, index: usize) -> &[Bar] {
        &self.streams[index].bars
    }

    pub fn stream_index(&self, key: &StreamKey) -> Option<usize> {
        self.streams.iter().position(|s| &s.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &StreamKey> {
        self.streams.iter().map(|s| &s.key)
    }

    /// Stream with the most bars; walk-forward folds and annualization use
    /// it as the reference timeline.
    pub fn reference_stream(&self) -> Option<usize> {
        (0..self.streams.len()).max_by_key(|&i| self.streams[i].bars.len())
    }

    /// Total bar count across streams.
    pub fn total_bars(&self) -> usize {
        self.streams.iter().map(|s| s.bars.len()).sum()
    }

    /// The merged, globally chronological tick schedule.
    pub fn schedule(&self) -> Vec<Tick> {
        let mut ticks: Vec<Tick> = Vec::with_capacity(self.total_bars());
        for (si, stream) in self.streams.iter().enumerate() {
            for bi in 0..stream.bars.len() {
                ticks.push(Tick {
                    stream: si,
                    bar: bi,
                });
            }
        }
        ticks.sort_by(|a, b| {
            let (sa, ba) = (&self.streams[a.stream], a.bar);
            let (sb, bb) = (&self.streams[b.stream], b.bar);
            let ta = sa.bars[ba].t_open;
            let tb = sb.bars[bb].t_open;
            ta.cmp(&tb)
                .then(sa.key.timeframe.seconds().cmp(&sb.key.timeframe.seconds()))
                .then(sa.key.instrument.cmp(&sb.key.instrument))
        });
        ticks
    }

    /// Restrict every stream to bars with `t_open` in `[start_ms, end_ms)`.
    pub fn slice_time(&self, start_ms: i64, end_ms: i64) -> HistorySet {
        let streams = self
            .streams
            .iter()
            .map(|s| Stream {
                key: s.key.clone(),
                bars: s
                    .bars
                    .iter()
                    .filter(|b| {
                        let t = b.t_open.timestamp_millis();
                        t >= start_ms && t < end_ms
                    })
                    .cloned()
                    .collect(),
            })
            .filter(|s| !s.bars.is_empty())
            .collect();
        let mut sliced = HistorySet {
            streams,
            gaps: Vec::new(),
        };
        sliced.detect_gaps();
        sliced
    }
}

fn epoch_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown timeframe: {secs} seconds")]
    UnknownTimeframe { secs: u32 },

    #[error("bar not aligned to {timeframe:?} grid for {instrument}: t_open={t_open_ms}ms")]
    Misaligned {
        instrument: InstrumentId,
        timeframe: Timeframe,
        t_open_ms: i64,
    },

    #[error("malformed bar for {instrument} at {t_open_ms}ms: {source}")]
    MalformedBar {
        instrument: InstrumentId,
        t_open_ms: i64,
        #[source]
        source: BarError,
    },

    #[error("bars out of order for {instrument} {timeframe:?}: {prev_ms}ms then {next_ms}ms")]
    OutOfOrder {
        instrument: InstrumentId,
        timeframe: Timeframe,
        prev_ms: i64,
        next_ms: i64,
    },

    #[error("duplicate bar for {instrument} {timeframe:?} at {t_open_ms}ms")]
    Duplicate {
        instrument: InstrumentId,
        timeframe: Timeframe,
        t_open_ms: i64,
    },
}
