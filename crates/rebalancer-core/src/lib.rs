/// CVaR-aware portfolio rebalancing engine.
///
/// A purely synchronous, in-memory core: given a Portfolio snapshot, a
/// strategy choice, and a set of trading constraints, `rebalance()` returns
/// the trades a caller should place to move the portfolio toward its
/// targets while respecting liquidity, turnover, and trade-size limits.
/// Market data, persistence, HTTP/CLI surfaces and tax-lot accounting are
/// all external concerns this crate never touches.
pub mod constraints;
pub mod cvar;
pub mod error;
pub mod estimator;
pub mod metrics;
pub mod money;
pub mod pipeline;
pub mod simulation;
pub mod strategy;
pub mod types;

pub use constraints::TradingConstraints;
pub use error::{RebalanceError, Result, Warning};
pub use estimator::ParameterEstimator;
pub use money::MoneyValue;
pub use strategy::{CVaRRebalanceStrategy, CvarStrategyConfig, RebalanceStrategy, SimpleRebalanceStrategy, StrategyConfig};
pub use types::{
    Asset, AssetType, Goal, GoalType, Portfolio, Position, RebalanceMetrics, RebalanceResult,
    RiskProfile, Trade, TradeAction,
};

use std::sync::Arc;
use tracing::info;

/// Single entry point: rebalance `portfolio` under `strategy_config` subject
/// to `constraints`. `constraints.max_position_size`, when set, is always
/// passed through to the CVaR optimizer's penalty term. Uses the default
/// `SyntheticEstimator`; call `rebalance_with_estimator` to inject another.
pub fn rebalance(
    portfolio: &Portfolio,
    strategy_config: &StrategyConfig,
    constraints: &TradingConstraints,
) -> Result<RebalanceResult> {
    rebalance_with_estimator(portfolio, strategy_config, constraints, None)
}

/// Same entry point as `rebalance`, but lets the caller inject a
/// `ParameterEstimator` for the CVaR strategy (§4.6) instead of silently
/// falling back to `SyntheticEstimator`. Has no effect on `StrategyConfig::Simple`.
pub fn rebalance_with_estimator(
    portfolio: &Portfolio,
    strategy_config: &StrategyConfig,
    constraints: &TradingConstraints,
    estimator: Option<Arc<dyn ParameterEstimator + Send + Sync>>,
) -> Result<RebalanceResult> {
    info!(positions = portfolio.positions.len(), "rebalance called");
    match strategy_config {
        StrategyConfig::Simple => SimpleRebalanceStrategy.rebalance(portfolio, constraints),
        StrategyConfig::CVaR(cfg) => {
            let mut strategy = CVaRRebalanceStrategy::new(cfg.clone());
            if let Some(cap) = constraints.max_position_size {
                strategy = strategy.with_max_position_size(cap);
            }
            if let Some(est) = estimator {
                strategy = strategy.with_estimator(est);
            }
            strategy.rebalance(portfolio, constraints)
        }
    }
}


/// Property-based tests of the §8 universal invariants: ones that only hold
/// once the whole constraint pipeline has run, so a hand-picked example
/// portfolio per invariant wouldn't give the same confidence a generated
/// spread of portfolios does.
#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::types::{AssetType, Position};
    use quickcheck::{Arbitrary, Gen, TestResult};
    use quickcheck_macros::quickcheck;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    /// Shrunk-down portfolio shape a quickcheck `Gen` can produce directly:
    /// 1-4 positions with a price, a share count, and a target allocation
    /// percentage, built so Σ target_allocation never exceeds 100.
    #[derive(Debug, Clone)]
    struct ArbPortfolio {
        cash_cents: u32,
        positions: Vec<(u32, u8, u8)>,
    }

    impl Arbitrary for ArbPortfolio {
        fn arbitrary(g: &mut Gen) -> Self {
            let n = (u8::arbitrary(g) % 4) + 1;
            let mut positions = Vec::new();
            let mut remaining_pct: u32 = 100;
            for _ in 0..n {
                let price_cents = (u32::arbitrary(g) % 50_000) + 1;
                let shares = u8::arbitrary(g) % 100;
                let cap = remaining_pct.min(40);
                let alloc_pct = if cap == 0 { 0 } else { (u32::arbitrary(g) % (cap + 1)) as u8 };
                remaining_pct = remaining_pct.saturating_sub(alloc_pct as u32);
                positions.push((price_cents, shares, alloc_pct));
            }
            let cash_cents = u32::arbitrary(g) % 10_000_00;
            ArbPortfolio { cash_cents, positions }
        }
    }

    impl ArbPortfolio {
        fn build(&self) -> Portfolio {
            let positions = self
                .positions
                .iter()
                .enumerate()
                .map(|(i, (price_cents, shares, alloc_pct))| {
                    let ticker = format!("T{i}");
                    let price = MoneyValue::new(Decimal::new(*price_cents as i64, 2)).unwrap();
                    let asset = Asset::new(ticker.clone(), ticker, AssetType::Stock, price, "USD");
                    let shares = MoneyValue::new(Decimal::from(*shares as i64)).unwrap();
                    let target = *alloc_pct as f64 / 100.0;
                    Position::new(asset, shares, target, MoneyValue::zero())
                })
                .collect();
            let cash = MoneyValue::new(Decimal::new(self.cash_cents as i64, 2)).unwrap();
            Portfolio::new(Uuid::nil(), cash, positions)
        }
    }

    /// §8 #2: ending cash never falls below the liquidity floor, unless the
    /// pipeline itself reported it couldn't reach it (`LiquidityUnreachable`).
    #[quickcheck]
    fn final_cash_respects_liquidity_floor(arb: ArbPortfolio) -> TestResult {
        let portfolio = arb.build();
        let mut constraints = TradingConstraints::default();
        constraints.min_liquidity = 0.10;
        let result = match rebalance(&portfolio, &StrategyConfig::Simple, &constraints) {
            Ok(r) => r,
            Err(_) => return TestResult::discard(),
        };
        if result.metrics.warnings.iter().any(|w| w.contains("liquidity")) {
            return TestResult::discard();
        }

        let total_value = portfolio.total_value().to_f64();
        let floor = constraints.min_liquidity * total_value;
        let cash_after =
            portfolio.cash.to_f64() + result.total_sell_value.to_f64() - result.total_buy_value.to_f64()
                - result.estimated_cost.to_f64();
        TestResult::from_bool(cash_after >= floor - 1e-6)
    }

    /// §8 #5: net buying power is bounded by cash available above the floor.
    #[quickcheck]
    fn net_buy_value_bounded_by_available_cash(arb: ArbPortfolio) -> TestResult {
        let portfolio = arb.build();
        let mut constraints = TradingConstraints::default();
        constraints.min_liquidity = 0.10;
        let result = match rebalance(&portfolio, &StrategyConfig::Simple, &constraints) {
            Ok(r) => r,
            Err(_) => return TestResult::discard(),
        };
        if result.metrics.warnings.iter().any(|w| w.contains("liquidity")) {
            return TestResult::discard();
        }

        let total_value = portfolio.total_value().to_f64();
        let floor = constraints.min_liquidity * total_value;
        let net_buy = result.total_buy_value.to_f64() - result.total_sell_value.to_f64();
        TestResult::from_bool(net_buy <= portfolio.cash.to_f64() - floor + 1e-6)
    }

    /// §8 #6: accepted trade values sum exactly (no float drift) to
    /// total_buy_value + total_sell_value — checked via `Decimal`, not `f64`.
    #[quickcheck]
    fn trade_values_sum_exactly_to_totals(arb: ArbPortfolio) -> TestResult {
        let portfolio = arb.build();
        let constraints = TradingConstraints::default();
        let result = match rebalance(&portfolio, &StrategyConfig::Simple, &constraints) {
            Ok(r) => r,
            Err(_) => return TestResult::discard(),
        };

        let summed: Decimal = result.trades.iter().map(|t| t.value.amount()).sum();
        let totals = result.total_buy_value.amount() + result.total_sell_value.amount();
        TestResult::from_bool(summed == totals)
    }
}
