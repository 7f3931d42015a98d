//! Instrument identity and contract specification.
//!
//! Identity uses the canonical internal format `VENUE:BASE/QUOTE`
//! (e.g. `OKX:BTC/USDT`, `SSE:600519/CNY`). Board and ST classification for
//! A-shares are supplied with the spec, never derived from symbol codes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Stable instrument identity, `VENUE:BASE/QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    CryptoSpot,
    CryptoPerp,
    StockAShare,
}

/// A-share board classification. Drives the daily price-limit band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AShareBoard {
    /// Main board, ±10%.
    Main,
    /// ChiNext (Growth Enterprise Market), ±20%.
    ChiNext,
    /// STAR board, ±20%.
    Star,
}

/// Contract specification for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub id: InstrumentId,
    pub venue: String,
    pub base: String,
    pub quote: String,
    pub kind: AssetKind,
    /// Minimum price increment.
    pub price_tick: Decimal,
    /// Minimum order quantity.
    pub lot_min: Decimal,
    /// Quantity step; quantities are snapped down to a multiple of this.
    pub lot_step: Decimal,
    /// Settlement currency of cash and fees.
    pub settlement: String,
    /// A-share only.
    pub board: Option<AShareBoard>,
    /// A-share only: ST flag narrows the price-limit band to ±5%.
    pub is_st: bool,
    /// Perpetual only: maximum leverage the venue allows.
    pub max_leverage: Option<Decimal>,
}

impl InstrumentSpec {
    pub fn crypto_spot(venue: &str, base: &str, quote: &str, lot_step: Decimal) -> Self {
        Self {
            id: InstrumentId::new(format!("{venue}:{base}/{quote}")),
            venue: venue.to_string(),
            base: base.to_string(),
            quote: quote.to_string(),
            kind: AssetKind::CryptoSpot,
            price_tick: Decimal::new(1, 2),
            lot_min: lot_step,
            lot_step,
            settlement: quote.to_string(),
            board: None,
            is_st: false,
            max_leverage: None,
        }
    }

    pub fn crypto_perp(
        venue: &str,
        base: &str,
        quote: &str,
        lot_step: Decimal,
        max_leverage: Decimal,
    ) -> Self {
        Self {
            id: InstrumentId::new(format!("{venue}:{base}/{quote}")),
            venue: venue.to_string(),
            base: base.to_string(),
            quote: quote.to_string(),
            kind: AssetKind::CryptoPerp,
            price_tick: Decimal::new(1, 2),
            lot_min: lot_step,
            lot_step,
            settlement: quote.to_string(),
            board: None,
            is_st: false,
            max_leverage: Some(max_leverage),
        }
    }

    pub fn a_share(venue: &str, code: &str, board: AShareBoard, is_st: bool) -> Self {
        Self {
            id: InstrumentId::new(format!("{venue}:{code}/CNY")),
            venue: venue.to_string(),
            base: code.to_string(),
            quote: "CNY".to_string(),
            kind: AssetKind::StockAShare,
            price_tick: Decimal::new(1, 2),
            lot_min: Decimal::from(100),
            lot_step: Decimal::from(100),
            settlement: "CNY".to_string(),
            board: Some(board),
            is_st,
            max_leverage: None,
        }
    }
}

/// Ordered registry of instrument specs. Unknown lookups are fatal at the
/// engine boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecRegistry {
    specs: BTreeMap<InstrumentId, InstrumentSpec>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: InstrumentSpec) {
        self.specs.insert(spec.id.clone(), spec);
    }

    pub fn get(&self, id: &InstrumentId) -> Result<&InstrumentSpec, InstrumentError> {
        self.specs
            .get(id)
            .ok_or_else(|| InstrumentError::Unknown { id: id.clone() })
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.specs.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentSpec> {
        self.specs.values()
    }
}

impl FromIterator<InstrumentSpec> for SpecRegistry {
    fn from_iter<T: IntoIterator<Item = InstrumentSpec>>(iter: T) -> Self {
        let mut reg = Self::new();
        for spec in iter {
            reg.insert(spec);
        }
        reg
    }
}

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("unknown instrument: {id}")]
    Unknown { id: InstrumentId },
}
