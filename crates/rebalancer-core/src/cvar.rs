/// Value-at-Risk and Conditional Value-at-Risk over a sample of returns.
///
/// Grounded on `financial-core/src/portfolio/risk.rs`'s
/// `calculate_value_at_risk`/`calculate_conditional_var` (sort-then-index
/// tail approach), generalized to linear-interpolated quantiles. Pure
/// numeric code over `&[f64]` — no monetary or crate-specific types,
/// consistent with the decimal/float split: statistics stay in float.
const MIN_SAMPLE: usize = 32;

/// Linear-interpolated quantile of `sorted` (already ascending) at
/// probability `p` ∈ [0, 1], using the common "R-7" convention.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = p * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// `VaR_α(R) = -quantile(R, 1-α)`.
pub fn value_at_risk(returns: &[f64], alpha: f64) -> f64 {
    assert!(returns.len() >= MIN_SAMPLE, "sample must have at least {MIN_SAMPLE} observations");
    assert!(alpha > 0.5 && alpha <= 1.0, "alpha must be in (0.5, 1]");
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    -quantile(&sorted, 1.0 - alpha)
}

/// `CVaR_α(R) = -mean(R | R <= quantile(R, 1-α))`: the average of the worst
/// `⌈(1-α)N⌉` observations, negated. If α=1 (empty tail by count), falls
/// back to `-min(R)`. If all returns are equal, CVaR is `-`that value.
pub fn conditional_value_at_risk(returns: &[f64], alpha: f64) -> f64 {
    assert!(returns.len() >= MIN_SAMPLE, "sample must have at least {MIN_SAMPLE} observations");
    assert!(alpha > 0.5 && alpha <= 1.0, "alpha must be in (0.5, 1]");

    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();

    let tail_count = ((1.0 - alpha) * n as f64).ceil() as usize;
    let tail_count = tail_count.max(1).min(n);

    let tail = &sorted[..tail_count];
    let mean: f64 = tail.iter().sum::<f64>() / tail.len() as f64;
    -mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(n: usize, from_bad_to_good: impl Fn(usize) -> f64) -> Vec<f64> {
        (0..n).map(from_bad_to_good).collect()
    }

    #[test]
    fn cvar_at_least_var_for_lossbearing_distribution() {
        // 1000 evenly-spaced returns from -0.30 to +0.30.
        let returns = sample(1000, |i| -0.30 + 0.0006 * i as f64);
        let var = value_at_risk(&returns, 0.95);
        let cvar = conditional_value_at_risk(&returns, 0.95);
        assert!(cvar >= var - 1e-9);
        assert!(var >= 0.0 || cvar >= 0.0);
    }

    #[test]
    fn cvar_non_decreasing_in_alpha() {
        let returns = sample(1000, |i| -0.30 + 0.0006 * i as f64);
        let cvar_90 = conditional_value_at_risk(&returns, 0.90);
        let cvar_95 = conditional_value_at_risk(&returns, 0.95);
        let cvar_99 = conditional_value_at_risk(&returns, 0.99);
        assert!(cvar_95 >= cvar_90 - 1e-9);
        assert!(cvar_99 >= cvar_95 - 1e-9);
    }

    #[test]
    fn constant_returns_give_negated_constant_cvar() {
        let returns = vec![0.05; 40];
        assert_relative_eq!(conditional_value_at_risk(&returns, 0.95), -0.05, epsilon = 1e-9);
    }

    #[test]
    fn alpha_one_falls_back_to_min() {
        let returns = sample(50, |i| -0.1 + 0.01 * i as f64);
        let min = returns.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_relative_eq!(conditional_value_at_risk(&returns, 1.0), -min, epsilon = 1e-9);
    }

    #[test]
    #[should_panic(expected = "at least")]
    fn rejects_too_small_sample() {
        let returns = vec![0.01; 10];
        conditional_value_at_risk(&returns, 0.95);
    }
}
