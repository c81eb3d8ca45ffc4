/// Drift-only baseline strategy: for each position, trade straight toward
/// its target weight once drift exceeds threshold. No simulation, no
/// optimizer.
///
/// Grounded on `financial-core/src/portfolio/allocation.rs`'s
/// `AllocationStrategist::generate_rebalancing_trades` (threshold-gated
/// trade emission from current vs. target allocation).
use super::RebalanceStrategy;
use crate::error::Result;
use crate::money::MoneyValue;
use crate::types::{Portfolio, RebalanceMetrics, Trade, TradeAction};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SimpleRebalanceStrategy;

impl RebalanceStrategy for SimpleRebalanceStrategy {
    fn propose_trades(
        &self,
        portfolio: &Portfolio,
    ) -> Result<(Vec<Trade>, HashMap<String, f64>, RebalanceMetrics)> {
        let drift = self.drift(portfolio);
        let total_value = portfolio.total_value();

        let max_drift_before = drift.values().cloned().fold(0.0, |acc, d| acc.max(d.abs()));

        let mut trades = Vec::new();
        for position in &portfolio.positions {
            let ticker = position.ticker();
            let d = drift.get(ticker).copied().unwrap_or(0.0);
            if d == 0.0 {
                continue;
            }
            let value = total_value
                .checked_mul_f64(d.abs())
                .unwrap_or_else(|_| MoneyValue::zero());
            let price = position.asset.current_price;
            if price.is_zero() {
                continue;
            }
            let shares = value
                .checked_div_decimal(price.amount())
                .unwrap_or_else(|_| MoneyValue::zero());
            let action = if d > 0.0 { TradeAction::Buy } else { TradeAction::Sell };
            let reason = format!(
                "drift {:+.2}% toward target allocation",
                d * 100.0
            );
            trades.push(Trade::new(ticker, action, shares, price, reason));
        }

        let metrics = RebalanceMetrics {
            max_drift_before,
            ..Default::default()
        };

        Ok((trades, drift, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::TradingConstraints;
    use crate::types::{Asset, AssetType, Position};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn scenario_a_portfolio() -> Portfolio {
        let aapl = Asset::new("AAPL", "Apple", AssetType::Stock, MoneyValue::new(dec!(180.50)).unwrap(), "USD");
        let meta = Asset::new("META", "Meta", AssetType::Stock, MoneyValue::new(dec!(400.00)).unwrap(), "USD");
        let aapl_pos = Position::new(aapl, MoneyValue::new(dec!(10)).unwrap(), 0.60, MoneyValue::zero());
        let meta_pos = Position::new(meta, MoneyValue::new(dec!(5)).unwrap(), 0.40, MoneyValue::zero());
        Portfolio::new(Uuid::nil(), MoneyValue::new(dec!(500)).unwrap(), vec![aapl_pos, meta_pos])
    }

    #[test]
    fn scenario_a_buys_aapl_sells_meta() {
        let portfolio = scenario_a_portfolio();
        let strategy = SimpleRebalanceStrategy;
        let result = strategy.rebalance(&portfolio, &TradingConstraints::default()).unwrap();

        let aapl_trade = result.trades.iter().find(|t| t.ticker == "AAPL");
        let meta_trade = result.trades.iter().find(|t| t.ticker == "META");

        assert!(matches!(aapl_trade.map(|t| t.action), Some(TradeAction::Buy)));
        assert!(matches!(meta_trade.map(|t| t.action), Some(TradeAction::Sell)));

        for (_, weight) in result.final_allocations.iter() {
            // not asserting exact values, just that the ticker's allocation exists
            assert!(weight.value() >= 0.0);
        }
    }

    #[test]
    fn scenario_b_high_threshold_emits_no_trades() {
        let portfolio = scenario_a_portfolio();
        let mut constraints = TradingConstraints::default();
        constraints.rebalance_threshold = 0.20;
        let strategy = SimpleRebalanceStrategy;
        let result = strategy.rebalance(&portfolio, &constraints).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.total_buy_value.is_zero());
        assert!(result.total_sell_value.is_zero());
    }

    #[test]
    fn idempotent_after_reaching_target() {
        let aapl = Asset::new("AAPL", "Apple", AssetType::Stock, MoneyValue::new(dec!(100)).unwrap(), "USD");
        // Position already at target weight.
        let position = Position::new(aapl, MoneyValue::new(dec!(10)).unwrap(), 1.0, MoneyValue::zero());
        let portfolio = Portfolio::new(Uuid::nil(), MoneyValue::zero(), vec![position]);
        let strategy = SimpleRebalanceStrategy;
        let result = strategy.rebalance(&portfolio, &TradingConstraints::default()).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn empty_portfolio_is_rejected() {
        let portfolio = Portfolio::new(Uuid::nil(), MoneyValue::zero(), vec![]);
        let strategy = SimpleRebalanceStrategy;
        assert!(strategy.rebalance(&portfolio, &TradingConstraints::default()).is_err());
    }

    #[test]
    fn integer_shares_only_truncates() {
        let aapl = Asset::new("AAPL", "Apple", AssetType::Stock, MoneyValue::new(dec!(100)).unwrap(), "USD");
        let position = Position::new(aapl, MoneyValue::zero(), 1.0, MoneyValue::zero());
        let portfolio = Portfolio::new(Uuid::nil(), MoneyValue::new(dec!(370)).unwrap(), vec![position]);
        let mut constraints = TradingConstraints::default();
        constraints.allow_fractional_shares = false;
        constraints.rebalance_threshold = 0.0;
        let strategy = SimpleRebalanceStrategy;
        let result = strategy.rebalance(&portfolio, &constraints).unwrap();
        if let Some(trade) = result.trades.first() {
            assert_eq!(trade.shares.amount().fract(), dec!(0));
        }
    }
}
