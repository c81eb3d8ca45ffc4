/// The constraint pipeline: six ordered filters that turn a strategy's raw
/// trade list into the trades a caller may actually act on.
///
/// Order is contract (§4.11): step 5 (liquidity) and step 6 (turnover) both
/// scale trade values uniformly, and any uniform scale can push a trade
/// below `min_trade_value` — the min-trade-value filter (step 3) must be
/// re-applied after either. The grounding codebase's
/// `optimize_allocation`/`calculate_transaction_costs` generate trades but
/// never re-filter after cost adjustment; this is the bug this pipeline is
/// built to not repeat.
use crate::constraints::TradingConstraints;
use crate::error::Warning;
use crate::types::{Portfolio, Trade, TradeAction};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub struct PipelineOutcome {
    pub trades: Vec<Trade>,
    pub warnings: Vec<Warning>,
}

/// Runs the six-step pipeline against `trades` (as generated by a
/// strategy, in ticker order) for `portfolio` under `constraints`.
/// `drift` maps ticker -> |optimal - current| weight delta, used by step 1.
pub fn apply(
    trades: Vec<Trade>,
    portfolio: &Portfolio,
    constraints: &TradingConstraints,
    drift: &HashMap<String, f64>,
) -> PipelineOutcome {
    let mut warnings = Vec::new();
    let total_value = portfolio.total_value().to_f64();

    let mut trades = step1_rebalance_threshold(trades, constraints, drift);
    trades = step2_fractional_shares(trades, constraints);
    trades = step3_min_trade_value(trades, constraints);
    trades = step4_max_position_size(trades, portfolio, constraints, total_value);

    let (scaled, liquidity_warning) = step5_liquidity_floor(trades, portfolio, constraints, total_value);
    trades = scaled;
    if liquidity_warning {
        warnings.push(Warning::LiquidityUnreachable);
    }
    trades = step3_min_trade_value(trades, constraints);

    trades = step6_max_turnover(trades, constraints, total_value);
    trades = step3_min_trade_value(trades, constraints);

    PipelineOutcome { trades, warnings }
}

/// Step 1: drop trades whose implied weight delta is below threshold.
fn step1_rebalance_threshold(
    trades: Vec<Trade>,
    constraints: &TradingConstraints,
    drift: &HashMap<String, f64>,
) -> Vec<Trade> {
    trades
        .into_iter()
        .filter(|t| {
            drift
                .get(&t.ticker)
                .map(|d| d.abs() >= constraints.rebalance_threshold)
                .unwrap_or(true)
        })
        .collect()
}

/// Step 2: if fractional shares are disallowed, truncate to whole shares
/// and recompute value; drop trades that truncate to zero.
fn step2_fractional_shares(trades: Vec<Trade>, constraints: &TradingConstraints) -> Vec<Trade> {
    if constraints.allow_fractional_shares {
        return trades;
    }
    trades
        .into_iter()
        .filter_map(|mut t| {
            let truncated = t.shares.amount().trunc();
            if truncated.is_zero() {
                return None;
            }
            t.shares = crate::money::MoneyValue::new_unchecked(truncated);
            t.value = t
                .shares
                .checked_mul_decimal(t.current_price.amount())
                .unwrap_or_else(|_| crate::money::MoneyValue::zero());
            Some(t)
        })
        .collect()
}

/// Step 3: drop trades below `min_trade_value`. Re-entrant: called again
/// after steps 5 and 6.
fn step3_min_trade_value(trades: Vec<Trade>, constraints: &TradingConstraints) -> Vec<Trade> {
    trades
        .into_iter()
        .filter(|t| t.value.amount() >= constraints.min_trade_value.amount())
        .collect()
}

/// Step 4: any BUY that would push a position above `max_position_size` is
/// reduced; the over-amount is redistributed proportionally to other
/// underweight BUYs, or dropped if none remain.
fn step4_max_position_size(
    trades: Vec<Trade>,
    portfolio: &Portfolio,
    constraints: &TradingConstraints,
    total_value: f64,
) -> Vec<Trade> {
    let Some(cap) = constraints.max_position_size else {
        return trades;
    };
    if total_value <= 0.0 {
        return trades;
    }

    let mut trades = trades;
    let mut excess_pool = 0.0f64;

    for t in trades.iter_mut() {
        if t.action != TradeAction::Buy {
            continue;
        }
        let current_value = portfolio
            .position(&t.ticker)
            .map(|p| p.market_value().to_f64())
            .unwrap_or(0.0);
        let post_trade_weight = (current_value + t.value.to_f64()) / total_value;
        if post_trade_weight > cap {
            let allowed_value = (cap * total_value - current_value).max(0.0);
            let excess = t.value.to_f64() - allowed_value;
            if excess > 0.0 {
                excess_pool += excess;
                let price = t.current_price.amount();
                let new_shares = if price.is_zero() {
                    Decimal::ZERO
                } else {
                    Decimal::from_f64_retain(allowed_value).unwrap_or_default() / price
                };
                t.shares = crate::money::MoneyValue::new_unchecked(new_shares.max(Decimal::ZERO));
                t.value = t
                    .shares
                    .checked_mul_decimal(price)
                    .unwrap_or_else(|_| crate::money::MoneyValue::zero());
            }
        }
    }

    if excess_pool <= 0.0 {
        return trades;
    }

    let underweight_total: f64 = trades
        .iter()
        .filter(|t| t.action == TradeAction::Buy)
        .map(|t| t.value.to_f64())
        .sum();

    if underweight_total <= 0.0 {
        return trades;
    }

    for t in trades.iter_mut() {
        if t.action != TradeAction::Buy {
            continue;
        }
        let share_of_pool = t.value.to_f64() / underweight_total;
        let addition = excess_pool * share_of_pool;
        let price = t.current_price.amount();
        if price.is_zero() {
            continue;
        }
        let added_shares = Decimal::from_f64_retain(addition).unwrap_or_default() / price;
        let new_shares = t.shares.amount() + added_shares;
        t.shares = crate::money::MoneyValue::new_unchecked(new_shares);
        t.value = t
            .shares
            .checked_mul_decimal(price)
            .unwrap_or_else(|_| crate::money::MoneyValue::zero());
    }

    trades
}

/// Step 5: if post-trade cash would fall below the liquidity floor, scale
/// every BUY down uniformly to restore it. If even dropping all BUYs can't
/// reach the floor, accept the SELL-only outcome and report it.
fn step5_liquidity_floor(
    trades: Vec<Trade>,
    portfolio: &Portfolio,
    constraints: &TradingConstraints,
    total_value: f64,
) -> (Vec<Trade>, bool) {
    if constraints.min_liquidity <= 0.0 || total_value <= 0.0 {
        return (trades, false);
    }

    let cash = portfolio.cash.to_f64();
    let cost_bps = constraints.transaction_cost_bps.to_f64().unwrap_or(0.0f64);
    let floor = constraints.min_liquidity * total_value;

    let total_buy: f64 = trades
        .iter()
        .filter(|t| t.action == TradeAction::Buy)
        .map(|t| t.value.to_f64())
        .sum();
    let total_sell: f64 = trades
        .iter()
        .filter(|t| t.action == TradeAction::Sell)
        .map(|t| t.value.to_f64())
        .sum();
    let cost = (total_buy + total_sell) * cost_bps;

    let post_trade_cash = cash + total_sell - total_buy - cost;
    if post_trade_cash >= floor - 1e-9 {
        return (trades, false);
    }

    if total_buy <= 0.0 {
        // No BUYs to scale down; SELL proceeds alone are insufficient.
        return (trades, true);
    }

    // Solve for scale factor s in: cash + total_sell - s*total_buy - (total_sell + s*total_buy)*cost_bps = floor
    let denom = total_buy * (1.0 + cost_bps);
    let scale = if denom > 0.0 {
        ((cash + total_sell - total_sell * cost_bps) - floor) / denom
    } else {
        0.0
    };
    let scale = scale.clamp(0.0, 1.0);

    let scaled_down_fully = scale <= 1e-12;

    let mut trades = trades;
    for t in trades.iter_mut() {
        if t.action != TradeAction::Buy {
            continue;
        }
        let price = t.current_price.amount();
        if price.is_zero() {
            continue;
        }
        let new_value = t.value.to_f64() * scale;
        let new_shares = Decimal::from_f64_retain(new_value).unwrap_or_default() / price;
        t.shares = crate::money::MoneyValue::new_unchecked(new_shares.max(Decimal::ZERO));
        t.value = t
            .shares
            .checked_mul_decimal(price)
            .unwrap_or_else(|_| crate::money::MoneyValue::zero());
    }
    trades.retain(|t| t.action != TradeAction::Buy || !t.value.is_zero());

    // Re-check feasibility after scaling to zero: if scale collapsed to ~0
    // and we still can't clear the floor with sells alone, flag it.
    let new_total_buy: f64 = trades
        .iter()
        .filter(|t| t.action == TradeAction::Buy)
        .map(|t| t.value.to_f64())
        .sum();
    let new_cost = (new_total_buy + total_sell) * cost_bps;
    let new_post_trade_cash = cash + total_sell - new_total_buy - new_cost;
    let unreachable = scaled_down_fully && new_post_trade_cash < floor - 1e-9;

    (trades, unreachable)
}

/// Step 6: if aggregate turnover exceeds the cap, scale all trades down
/// uniformly by the ratio.
fn step6_max_turnover(
    trades: Vec<Trade>,
    constraints: &TradingConstraints,
    total_value: f64,
) -> Vec<Trade> {
    let Some(cap) = constraints.max_turnover else {
        return trades;
    };
    if total_value <= 0.0 {
        return trades;
    }

    let gross: f64 = trades.iter().map(|t| t.value.to_f64()).sum();
    let limit = cap * total_value;
    if gross <= limit || gross <= 0.0 {
        return trades;
    }

    let scale = limit / gross;
    let mut trades = trades;
    for t in trades.iter_mut() {
        let price = t.current_price.amount();
        if price.is_zero() {
            continue;
        }
        let new_value = t.value.to_f64() * scale;
        let new_shares = Decimal::from_f64_retain(new_value).unwrap_or_default() / price;
        t.shares = crate::money::MoneyValue::new_unchecked(new_shares.max(Decimal::ZERO));
        t.value = t
            .shares
            .checked_mul_decimal(price)
            .unwrap_or_else(|_| crate::money::MoneyValue::zero());
    }
    trades
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::MoneyValue;
    use crate::types::{Asset, AssetType, Position};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn test_portfolio(cash: Decimal) -> Portfolio {
        let asset = Asset::new(
            "AAPL",
            "Apple",
            AssetType::Stock,
            MoneyValue::new(dec!(100)).unwrap(),
            "USD",
        );
        let position = Position::new(asset, MoneyValue::new(dec!(10)).unwrap(), 0.5, MoneyValue::zero());
        Portfolio::new(Uuid::nil(), MoneyValue::new(cash).unwrap(), vec![position])
    }

    fn buy_trade(ticker: &str, shares: Decimal, price: Decimal) -> Trade {
        Trade::new(
            ticker,
            TradeAction::Buy,
            MoneyValue::new(shares).unwrap(),
            MoneyValue::new(price).unwrap(),
            "test",
        )
    }

    #[test]
    fn min_trade_value_drops_small_trades() {
        let constraints = TradingConstraints::default();
        let trades = vec![buy_trade("AAPL", dec!(0.05), dec!(100))];
        let out = step3_min_trade_value(trades, &constraints);
        assert!(out.is_empty());
    }

    #[test]
    fn fractional_share_truncation_drops_zero_result() {
        let mut constraints = TradingConstraints::default();
        constraints.allow_fractional_shares = false;
        let trades = vec![buy_trade("AAPL", dec!(0.7), dec!(100))];
        let out = step2_fractional_shares(trades, &constraints);
        assert!(out.is_empty());
    }

    #[test]
    fn fractional_share_truncation_recomputes_value() {
        let mut constraints = TradingConstraints::default();
        constraints.allow_fractional_shares = false;
        let trades = vec![buy_trade("AAPL", dec!(3.7), dec!(100))];
        let out = step2_fractional_shares(trades, &constraints);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].shares.amount(), dec!(3));
        assert_eq!(out[0].value.amount(), dec!(300));
    }

    #[test]
    fn liquidity_floor_scales_down_buys() {
        let portfolio = test_portfolio(dec!(100));
        let mut constraints = TradingConstraints::default();
        constraints.min_liquidity = 0.5; // needs cash >= 0.5 * total_value
        let trades = vec![buy_trade("AAPL", dec!(0.9), dec!(100))]; // value 90, would drain cash to 10
        let total_value = portfolio.total_value().to_f64();
        let (out, unreachable) = step5_liquidity_floor(trades, &portfolio, &constraints, total_value);
        assert!(!unreachable);
        assert!(out[0].value.to_f64() < 90.0);
    }

    #[test]
    fn turnover_cap_scales_all_trades() {
        let mut constraints = TradingConstraints::default();
        constraints.max_turnover = Some(0.05);
        let trades = vec![buy_trade("AAPL", dec!(5), dec!(100))]; // value 500
        let total_value = 2000.0; // cap = 100
        let out = step6_max_turnover(trades, &constraints, total_value);
        assert!(out[0].value.to_f64() <= 100.0 + 1e-6);
    }
}
