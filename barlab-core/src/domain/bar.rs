//! Bar — a fixed-width OHLCV aggregate for one instrument and timeframe.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::InstrumentId;

/// Fixed-width bar bucket, aligned to integer multiples of its width from
/// the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub fn seconds(self) -> u32 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 604_800,
        }
    }

    pub fn from_seconds(secs: u32) -> Option<Self> {
        match secs {
            60 => Some(Timeframe::M1),
            300 => Some(Timeframe::M5),
            900 => Some(Timeframe::M15),
            1_800 => Some(Timeframe::M30),
            3_600 => Some(Timeframe::H1),
            14_400 => Some(Timeframe::H4),
            86_400 => Some(Timeframe::D1),
            604_800 => Some(Timeframe::W1),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Floor an epoch-millisecond timestamp to this timeframe's grid.
    pub fn floor_ms(self, t_ms: i64) -> i64 {
        let width = i64::from(self.seconds()) * 1_000;
        (t_ms.div_euclid(width)) * width
    }
}

/// Single OHLCV bar. Prices and volume are exact decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub instrument: InstrumentId,
    pub timeframe: Timeframe,
    pub t_open: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    pub fn t_close(&self) -> DateTime<Utc> {
        self.t_open + Duration::seconds(i64::from(self.timeframe.seconds()))
    }

    /// Validate bar invariants.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.high < self.low {
            return Err(BarError::InvertedRange {
                high: self.high,
                low: self.low,
            });
        }
        if self.open < Decimal::ZERO
            || self.high < Decimal::ZERO
            || self.low < Decimal::ZERO
            || self.close < Decimal::ZERO
        {
            return Err(BarError::NegativePrice);
        }
        if self.volume < Decimal::ZERO {
            return Err(BarError::NegativeVolume);
        }
        if self.low > self.open.min(self.close) {
            return Err(BarError::LowAboveBody);
        }
        if self.high < self.open.max(self.close) {
            return Err(BarError::HighBelowBody);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BarError {
    #[error("inverted bar range: high={high}, low={low}")]
    InvertedRange { high: Decimal, low: Decimal },

    #[error("negative price not allowed")]
    NegativePrice,

    #[error("negative volume not allowed")]
    NegativeVolume,

    #[error("low above min(open, close)")]
    LowAboveBody,

    #[error("high below max(open, close)")]
    HighBelowBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn make_bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            instrument: InstrumentId::new("OKX:BTC/USDT"),
            timeframe: Timeframe::H1,
            t_open: Utc.timestamp_opt(1_700_000_400, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: dec!(1000),
        }
    }

    #[test]
    fn valid_bar_passes() {
        let bar = make_bar(dec!(100), dec!(105), dec!(95), dec!(102));
        assert!(bar.validate().is_ok());
    }

    #[test]
    fn inverted_range_rejected() {
        let bar = make_bar(dec!(100), dec!(95), dec!(105), dec!(100));
        assert!(matches!(
            bar.validate(),
            Err(BarError::InvertedRange { .. })
        ));
    }

    #[test]
    fn low_above_body_rejected() {
        let mut bar = make_bar(dec!(100), dec!(105), dec!(95), dec!(102));
        bar.low = dec!(101);
        assert!(matches!(bar.validate(), Err(BarError::LowAboveBody)));
    }

    #[test]
    fn high_below_body_rejected() {
        let mut bar = make_bar(dec!(100), dec!(105), dec!(95), dec!(102));
        bar.high = dec!(101);
        assert!(matches!(bar.validate(), Err(BarError::HighBelowBody)));
    }

    #[test]
    fn negative_volume_rejected() {
        let mut bar = make_bar(dec!(100), dec!(105), dec!(95), dec!(102));
        bar.volume = dec!(-1);
        assert!(matches!(bar.validate(), Err(BarError::NegativeVolume)));
    }

    #[test]
    fn t_close_is_open_plus_width() {
        let bar = make_bar(dec!(100), dec!(105), dec!(95), dec!(102));
        assert_eq!(bar.t_close() - bar.t_open, Duration::seconds(3600));
    }

    #[test]
    fn timeframe_seconds_roundtrip() {
        for tf in [
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
            Timeframe::W1,
        ] {
            assert_eq!(Timeframe::from_seconds(tf.seconds()), Some(tf));
        }
        assert_eq!(Timeframe::from_seconds(42), None);
    }

    #[test]
    fn floor_ms_aligns_to_grid() {
        assert_eq!(Timeframe::H1.floor_ms(3_600_000 + 17), 3_600_000);
        assert_eq!(Timeframe::M1.floor_ms(59_999), 0);
    }
}
