/// Trading constraints: the configuration bundle the Constraint Pipeline
/// enforces, plus the named presets a caller can pick without hand-tuning
/// every field.
///
/// Mirrors the grounding codebase's `OptimizationConstraints` and the named
/// "strategic model" preset pattern in `allocation::AllocationStrategist`,
/// adapted from an asset-allocation-target bundle to a trade-shaping one.
use crate::money::{MoneyValue, DEFAULT_TRANSACTION_COST_BPS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConstraints {
    pub min_trade_value: MoneyValue,
    pub rebalance_threshold: f64,
    pub max_turnover: Option<f64>,
    pub min_liquidity: f64,
    pub allow_fractional_shares: bool,
    pub max_position_size: Option<f64>,
    pub transaction_cost_bps: Decimal,
}

impl Default for TradingConstraints {
    fn default() -> Self {
        Self {
            min_trade_value: MoneyValue::new(dec!(10)).unwrap(),
            rebalance_threshold: 0.02,
            max_turnover: None,
            min_liquidity: 0.0,
            allow_fractional_shares: true,
            max_position_size: None,
            transaction_cost_bps: DEFAULT_TRANSACTION_COST_BPS,
        }
    }
}

impl TradingConstraints {
    /// Low-threshold, high-liquidity preset for risk-averse goals.
    pub fn conservative() -> Self {
        Self {
            min_liquidity: 0.50,
            rebalance_threshold: 0.01,
            ..Self::default()
        }
    }

    /// The default profile, named explicitly so callers can select it
    /// alongside `conservative()`/`risky()` without relying on `Default`.
    pub fn moderate() -> Self {
        Self {
            min_liquidity: 0.10,
            rebalance_threshold: 0.02,
            ..Self::default()
        }
    }

    /// Low-liquidity, high-threshold preset for goals that tolerate drift.
    pub fn risky() -> Self {
        Self {
            min_liquidity: 0.05,
            rebalance_threshold: 0.05,
            ..Self::default()
        }
    }
}
