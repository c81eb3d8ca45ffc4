/// Portfolio data model: assets, positions, portfolios, goals, and the
/// engine's trade/result output types.
///
/// Assets and Portfolios are handed to this crate fully formed by an
/// external repository; structural invariants (unique tickers, nonnegative
/// shares/cash) are therefore enforced at construction with `assert!`, not
/// returned as `Result` — a caller that violates them has a bug, not a bad
/// input. `Σ target_allocation ≤ 1` is checked dynamically by `rebalance()`
/// instead, since it's a property of a rebalance *call*, not of a
/// Portfolio's construction.
use crate::money::MoneyValue;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Stock,
    Bond,
    Etf,
    Cash,
}

/// Immutable descriptor for a tradeable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub ticker: String,
    pub name: String,
    pub asset_type: AssetType,
    pub current_price: MoneyValue,
    pub currency: String,
}

impl Asset {
    pub fn new(
        ticker: impl Into<String>,
        name: impl Into<String>,
        asset_type: AssetType,
        current_price: MoneyValue,
        currency: impl Into<String>,
    ) -> Self {
        let ticker = ticker.into();
        assert!(!ticker.is_empty(), "Asset ticker must not be empty");
        assert!(
            current_price.amount() > Decimal::ZERO,
            "Asset current_price must be positive"
        );
        Self {
            ticker,
            name: name.into(),
            asset_type,
            current_price,
            currency: currency.into(),
        }
    }
}

/// A holding in a Portfolio: one Asset plus position-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub asset: Asset,
    pub shares: MoneyValue,
    pub target_allocation: f64,
    pub deposited: MoneyValue,
}

impl Position {
    pub fn new(asset: Asset, shares: MoneyValue, target_allocation: f64, deposited: MoneyValue) -> Self {
        assert!(
            !shares.is_negative(),
            "Position shares must be nonnegative"
        );
        assert!(
            (0.0..=1.0).contains(&target_allocation),
            "Position target_allocation must be in [0, 1]"
        );
        assert!(
            !deposited.is_negative(),
            "Position deposited must be nonnegative"
        );
        Self {
            asset,
            shares,
            target_allocation,
            deposited,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.asset.ticker
    }

    /// `shares * current_price`.
    pub fn market_value(&self) -> MoneyValue {
        self.shares
            .checked_mul_decimal(self.asset.current_price.amount())
            .unwrap_or_else(|_| MoneyValue::zero())
    }
}

/// A snapshot of holdings plus uninvested cash. Read-only for the duration
/// of a `rebalance()` call: the engine proposes trades, it never mutates
/// the Portfolio itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub cash: MoneyValue,
    pub positions: Vec<Position>,
}

impl Portfolio {
    /// Builds a Portfolio, asserting structural invariants (P1: unique
    /// tickers, P3: nonnegative cash). P2 (Σ target_allocation ≤ 1) is
    /// deliberately not checked here; `rebalance()` validates it dynamically.
    pub fn new(id: Uuid, cash: MoneyValue, positions: Vec<Position>) -> Self {
        assert!(!cash.is_negative(), "Portfolio cash must be nonnegative");
        let mut seen = HashSet::with_capacity(positions.len());
        for p in &positions {
            assert!(
                seen.insert(p.ticker().to_string()),
                "Portfolio position tickers must be unique, duplicate: {}",
                p.ticker()
            );
        }
        Self { id, cash, positions }
    }

    /// `cash + Σ market_value`.
    pub fn total_value(&self) -> MoneyValue {
        let invested: MoneyValue = self.positions.iter().map(|p| p.market_value()).sum();
        self.cash + invested
    }

    /// Sum of market value across positions, excluding cash.
    pub fn invested_value(&self) -> MoneyValue {
        self.positions.iter().map(|p| p.market_value()).sum()
    }

    /// Tickers in insertion order — the fixed axis every weight/return
    /// vector in a rebalance call is built against.
    pub fn tickers(&self) -> Vec<&str> {
        self.positions.iter().map(|p| p.ticker()).collect()
    }

    /// Current weights, normalized by invested value (cash excluded), in
    /// insertion order. The zero vector if nothing is invested.
    pub fn current_weights(&self) -> Vec<f64> {
        let invested = self.invested_value().to_f64();
        if invested <= 0.0 {
            return vec![0.0; self.positions.len()];
        }
        self.positions
            .iter()
            .map(|p| p.market_value().to_f64() / invested)
            .collect()
    }

    /// Target weights in insertion order.
    pub fn target_weights(&self) -> Vec<f64> {
        self.positions.iter().map(|p| p.target_allocation).collect()
    }

    /// Σ target_allocation — used by `rebalance()` to validate invariant P2.
    pub fn target_allocation_sum(&self) -> Decimal {
        self.positions
            .iter()
            .map(|p| Decimal::from_f64_retain(p.target_allocation).unwrap_or(Decimal::ZERO))
            .sum()
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.ticker() == ticker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Retirement,
    Education,
    House,
    Vacation,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Risky,
}

/// User-facing wrapper owning exactly one Portfolio, with Fintual-style
/// derived metrics (balance / depositado neto / ganado).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub name: String,
    pub goal_type: GoalType,
    pub risk_profile: RiskProfile,
    pub target_amount: Option<MoneyValue>,
    pub portfolio: Portfolio,
}

impl Goal {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        goal_type: GoalType,
        risk_profile: RiskProfile,
        target_amount: Option<MoneyValue>,
        portfolio: Portfolio,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            goal_type,
            risk_profile,
            target_amount,
            portfolio,
        }
    }

    pub fn balance(&self) -> MoneyValue {
        self.portfolio.total_value()
    }

    /// cash + Σ deposited across positions.
    pub fn depositado_neto(&self) -> MoneyValue {
        let deposited: MoneyValue = self.portfolio.positions.iter().map(|p| p.deposited).sum();
        self.portfolio.cash + deposited
    }

    pub fn ganado(&self) -> MoneyValue {
        self.balance() - self.depositado_neto()
    }

    /// `None` when no `target_amount` was set.
    pub fn progress_percentage(&self) -> Option<f64> {
        self.target_amount.map(|target| {
            if target.is_zero() {
                0.0
            } else {
                100.0 * self.balance().to_f64() / target.to_f64()
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// One proposed order: ticker, direction, quantity, and the reasoning that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    pub action: TradeAction,
    pub shares: MoneyValue,
    pub current_price: MoneyValue,
    pub value: MoneyValue,
    pub reason: String,
}

impl Trade {
    pub fn new(
        ticker: impl Into<String>,
        action: TradeAction,
        shares: MoneyValue,
        current_price: MoneyValue,
        reason: impl Into<String>,
    ) -> Self {
        let value = shares
            .checked_mul_decimal(current_price.amount())
            .unwrap_or_else(|_| MoneyValue::zero());
        Self {
            ticker: ticker.into(),
            action,
            shares,
            current_price,
            value,
            reason: reason.into(),
        }
    }
}

/// An allocation weight, serialized as a decimal string with at least three
/// fractional digits (§6), not a bare JSON number. `f64` on the inside;
/// the wrapper only exists at the serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Weight(f64);

impl Weight {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Weight {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Serialize for Weight {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{:.3}", self.0))
    }
}

impl<'de> Deserialize<'de> for Weight {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<f64>().map(Weight).map_err(serde::de::Error::custom)
    }
}

/// Diagnostic metrics attached to a `RebalanceResult`. Kept as explicit
/// fields for the always-present keys (§6) plus a map for CVaR-only extras,
/// instead of one untyped `HashMap<String, f64>` for everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebalanceMetrics {
    pub turnover_pct: f64,
    pub max_drift_before: f64,
    pub max_drift_after: f64,
    /// Present only for `CVaRRebalanceStrategy`.
    pub cvar: Option<f64>,
    pub optimal_weights: Option<std::collections::BTreeMap<String, Weight>>,
    pub iterations: Option<u64>,
    /// Rendered `Warning` entries (`OptimizerNonConvergent`, `InfeasibleConstraints`).
    pub warnings: Vec<String>,
}

/// Output of a `rebalance()` call: the accepted trades, their totals, the
/// resulting allocation, and diagnostics. Never mutates the input Portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceResult {
    pub trades: Vec<Trade>,
    pub total_buy_value: MoneyValue,
    pub total_sell_value: MoneyValue,
    pub estimated_cost: MoneyValue,
    pub final_allocations: std::collections::BTreeMap<String, Weight>,
    pub metrics: RebalanceMetrics,
}
