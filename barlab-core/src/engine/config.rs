//! Engine configuration and validation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::AssetKind;
use crate::error::EngineError;

/// What to do about missing bars inside an expected grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Carry on; gaps are surfaced in the run result.
    Skip,
    /// Fail the run. Used by conformance tests.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: Decimal,
    /// Commission rate per side; `None` takes the asset-kind default
    /// (10 bps crypto, 3 bps A-share).
    pub commission_rate: Option<Decimal>,
    pub slippage_bps: u32,
    pub gap_policy: GapPolicy,
    /// 365 for crypto, 252 for A-share; `None` defaults from asset kind.
    pub annualization_basis: Option<u32>,
    /// Perpetuals: leverage applied to new positions when the instrument
    /// spec carries no tighter bound.
    pub max_leverage: Decimal,
    /// Perpetuals: equity below `rate × notional` forces a close.
    pub maintenance_margin_rate: Decimal,
    /// Perpetuals: extra fee charged on a forced close.
    pub liquidation_penalty_bps: u32,
    /// Overrides the strategy's declared history requirement when larger.
    pub warmup_bars: usize,
    /// Cap on the history window handed to strategies.
    pub history_window: usize,
    /// Treat strategy faults as empty output instead of aborting.
    pub tolerant: bool,
}

impl EngineConfig {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            commission_rate: None,
            slippage_bps: 5,
            gap_policy: GapPolicy::Skip,
            annualization_basis: None,
            max_leverage: dec!(10),
            maintenance_margin_rate: dec!(0.05),
            liquidation_penalty_bps: 10,
            warmup_bars: 0,
            history_window: 100,
            tolerant: false,
        }
    }

    /// Frictionless variant for conformance tests.
    pub fn frictionless(initial_capital: Decimal) -> Self {
        Self {
            commission_rate: Some(Decimal::ZERO),
            slippage_bps: 0,
            ..Self::new(initial_capital)
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig {
                what: format!("initial_capital must be positive, got {}", self.initial_capital),
            });
        }
        if let Some(rate) = self.commission_rate {
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(EngineError::InvalidConfig {
                    what: format!("commission_rate out of range: {rate}"),
                });
            }
        }
        if let Some(basis) = self.annualization_basis {
            if basis != 365 && basis != 252 {
                return Err(EngineError::InvalidConfig {
                    what: format!("annualization_basis must be 365 or 252, got {basis}"),
                });
            }
        }
        if self.max_leverage <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig {
                what: format!("max_leverage must be positive, got {}", self.max_leverage),
            });
        }
        if self.maintenance_margin_rate < Decimal::ZERO
            || self.maintenance_margin_rate >= Decimal::ONE
        {
            return Err(EngineError::InvalidConfig {
                what: format!(
                    "maintenance_margin_rate out of range: {}",
                    self.maintenance_margin_rate
                ),
            });
        }
        if self.history_window == 0 {
            return Err(EngineError::InvalidConfig {
                what: "history_window must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Per-side commission rate for an asset kind.
    pub fn commission_for(&self, kind: AssetKind) -> Decimal {
        self.commission_rate.unwrap_or(match kind {
            AssetKind::CryptoSpot | AssetKind::CryptoPerp => dec!(0.001),
            AssetKind::StockAShare => dec!(0.0003),
        })
    }

    /// Day-count basis for annualization.
    pub fn basis_for(&self, kind: AssetKind) -> u32 {
        self.annualization_basis.unwrap_or(match kind {
            AssetKind::CryptoSpot | AssetKind::CryptoPerp => 365,
            AssetKind::StockAShare => 252,
        })
    }
}
