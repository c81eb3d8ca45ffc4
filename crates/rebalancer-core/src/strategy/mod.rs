/// The `RebalanceStrategy` contract and the closed `StrategyConfig` that
/// selects between the two implementors.
///
/// Grounded on `financial-core/src/portfolio/optimization.rs`'s
/// `PortfolioOptimizer` (expected-return/volatility helpers shared across
/// its optimization entry points) and `allocation.rs`'s
/// `AllocationStrategist` (threshold-gated trade generation). Shared
/// helpers live as default trait methods so both strategies use one
/// definition (§9: "centralize to avoid drift").
pub mod cvar;
pub mod simple;

use crate::constraints::TradingConstraints;
use crate::error::{RebalanceError, Result};
use crate::money::MoneyValue;
use crate::pipeline;
use crate::types::{Portfolio, RebalanceMetrics, RebalanceResult, Trade, TradeAction, Weight};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

pub use cvar::{CVaRRebalanceStrategy, CvarStrategyConfig};
pub use simple::SimpleRebalanceStrategy;

/// Dispatches to exactly one of the two closed strategy implementors
/// (§9: "abstract strategy dispatch" — a sum type, not open trait-object
/// polymorphism, at the public API boundary).
#[derive(Debug, Clone)]
pub enum StrategyConfig {
    Simple,
    CVaR(CvarStrategyConfig),
}

/// Abstract contract both strategies implement. Default methods centralize
/// logic the grounding codebase had duplicated across its optimization and
/// allocation modules.
pub trait RebalanceStrategy {
    /// Computes the raw trade list (before the constraint pipeline) and the
    /// ticker -> |optimal - current| drift map the pipeline's threshold
    /// step consumes.
    fn propose_trades(
        &self,
        portfolio: &Portfolio,
    ) -> Result<(Vec<Trade>, HashMap<String, f64>, RebalanceMetrics)>;

    /// ticker -> (target - current) signed weight drift, in portfolio
    /// ticker order.
    fn drift(&self, portfolio: &Portfolio) -> HashMap<String, f64> {
        let current = portfolio.current_weights();
        let target = portfolio.target_weights();
        portfolio
            .tickers()
            .into_iter()
            .enumerate()
            .map(|(i, ticker)| (ticker.to_string(), target[i] - current[i]))
            .collect()
    }

    /// `total_trade_value * transaction_cost_bps`.
    fn transaction_cost(&self, total_trade_value: MoneyValue, constraints: &TradingConstraints) -> MoneyValue {
        total_trade_value
            .checked_mul_decimal(constraints.transaction_cost_bps)
            .unwrap_or_else(|_| MoneyValue::zero())
    }

    /// Final per-ticker weight after `trades` are applied to `portfolio`,
    /// normalized by the post-trade invested value.
    fn estimate_final_allocations(
        &self,
        portfolio: &Portfolio,
        trades: &[Trade],
    ) -> BTreeMap<String, Weight> {
        let mut post_trade_value: HashMap<String, Decimal> = portfolio
            .positions
            .iter()
            .map(|p| (p.ticker().to_string(), p.market_value().amount()))
            .collect();

        for t in trades {
            let entry = post_trade_value.entry(t.ticker.clone()).or_insert(Decimal::ZERO);
            match t.action {
                TradeAction::Buy => *entry += t.value.amount(),
                TradeAction::Sell => *entry -= t.value.amount(),
            }
        }

        let total: Decimal = post_trade_value.values().copied().sum();
        if total <= Decimal::ZERO {
            return portfolio
                .tickers()
                .into_iter()
                .map(|t| (t.to_string(), Weight::new(0.0)))
                .collect();
        }

        portfolio
            .tickers()
            .into_iter()
            .map(|ticker| {
                let value = post_trade_value.get(ticker).copied().unwrap_or(Decimal::ZERO);
                let weight = (value / total).to_string().parse::<f64>().unwrap_or(0.0);
                (ticker.to_string(), Weight::new(weight))
            })
            .collect()
    }

    /// Runs the shared pre-flight checks (`EmptyPortfolio`, `InvalidTargets`),
    /// builds trades via `propose_trades`, passes them through the
    /// constraint pipeline, and assembles the `RebalanceResult`.
    fn rebalance(&self, portfolio: &Portfolio, constraints: &TradingConstraints) -> Result<RebalanceResult> {
        if portfolio.positions.is_empty() {
            return Err(RebalanceError::EmptyPortfolio);
        }
        let target_sum = portfolio.target_allocation_sum();
        if target_sum > Decimal::ONE + Decimal::new(1, 9) {
            return Err(RebalanceError::invalid_targets(target_sum));
        }

        let (trades, drift, mut metrics) = self.propose_trades(portfolio)?;

        let outcome = pipeline::apply(trades, portfolio, constraints, &drift);
        metrics
            .warnings
            .extend(outcome.warnings.iter().map(|w| w.to_string()));

        let total_buy_value: MoneyValue = outcome
            .trades
            .iter()
            .filter(|t| t.action == TradeAction::Buy)
            .map(|t| t.value)
            .sum();
        let total_sell_value: MoneyValue = outcome
            .trades
            .iter()
            .filter(|t| t.action == TradeAction::Sell)
            .map(|t| t.value)
            .sum();
        let gross = total_buy_value
            .checked_add(&total_sell_value)
            .unwrap_or_else(|_| MoneyValue::zero());
        let estimated_cost = self.transaction_cost(gross, constraints);

        let final_allocations = self.estimate_final_allocations(portfolio, &outcome.trades);

        let total_value = portfolio.total_value().to_f64();
        metrics.turnover_pct = if total_value > 0.0 {
            gross.to_f64() / total_value
        } else {
            0.0
        };
        // Post-trade weights already reflect any liquidity/turnover/
        // max-position-size scale-down the pipeline applied, so comparing
        // them against target catches residual drift a shrunk trade left
        // behind — unlike "did this ticker get any trade at all".
        metrics.max_drift_after = portfolio
            .positions
            .iter()
            .map(|p| {
                let actual = final_allocations
                    .get(p.ticker())
                    .map(Weight::value)
                    .unwrap_or(0.0);
                (actual - p.target_allocation).abs()
            })
            .fold(0.0, f64::max);

        Ok(RebalanceResult {
            trades: outcome.trades,
            total_buy_value,
            total_sell_value,
            estimated_cost,
            final_allocations,
            metrics,
        })
    }
}
