/// Portfolio return statistics used for diagnostics: volatility, Sharpe,
/// Sortino, max drawdown. Not on the rebalance hot path (§4.7).
///
/// Grounded on `financial-core/src/portfolio/risk.rs`'s
/// `calculate_volatility`/`calculate_downside_deviation`/
/// `calculate_sortino_ratio`/`calculate_maximum_drawdown`. Operates on
/// `&[f64]`, not `MoneyValue`, since these are statistical, not monetary,
/// quantities.

/// Annualized standard deviation of periodic `returns`, assuming
/// `periods_per_year` observations per year.
pub fn volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    variance.sqrt() * periods_per_year.sqrt()
}

/// Annualized Sharpe ratio against risk-free rate `r_f` (annualized).
pub fn sharpe(returns: &[f64], r_f: f64, periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mean_annualized = (returns.iter().sum::<f64>() / returns.len() as f64) * periods_per_year;
    let vol = volatility(returns, periods_per_year);
    if vol == 0.0 {
        return 0.0;
    }
    (mean_annualized - r_f) / vol
}

/// Sortino ratio: like Sharpe, but the denominator only penalizes downside
/// (below-`r_f`-per-period) deviation. `f64::INFINITY` when no period
/// underperforms the per-period risk-free rate.
pub fn sortino(returns: &[f64], r_f: f64, periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let per_period_rf = r_f / periods_per_year;
    let downside: Vec<f64> = returns
        .iter()
        .filter(|r| **r < per_period_rf)
        .map(|r| (r - per_period_rf).powi(2))
        .collect();

    if downside.is_empty() {
        return f64::INFINITY;
    }

    let downside_deviation =
        (downside.iter().sum::<f64>() / returns.len() as f64).sqrt() * periods_per_year.sqrt();
    let mean_annualized = (returns.iter().sum::<f64>() / returns.len() as f64) * periods_per_year;

    if downside_deviation == 0.0 {
        return f64::INFINITY;
    }
    (mean_annualized - r_f) / downside_deviation
}

/// Largest peak-to-trough decline of the cumulative equity curve built from
/// sequential periodic `returns`, as a positive fraction (0.25 = -25%).
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0f64;
    let mut peak = 1.0f64;
    let mut worst = 0.0f64;

    for r in returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        let drawdown = (peak - equity) / peak;
        if drawdown > worst {
            worst = drawdown;
        }
    }

    worst
}
