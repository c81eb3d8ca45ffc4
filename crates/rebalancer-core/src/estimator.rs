/// Parameter estimation: producing (μ, Σ) for the assets a strategy is
/// rebalancing over.
///
/// Grounded on `financial-core/src/portfolio/optimization.rs`'s
/// `calculate_covariance_matrix`/`calculate_covariance`. The synthetic
/// default here replaces the teacher's historical-return covariance
/// estimate, since this crate accepts no market-data feed (§9: "synthetic
/// μ, Σ... even when real market data could be present").
use crate::error::{RebalanceError, Result};
use nalgebra::{DMatrix, SymmetricEigen};

const PSD_TOLERANCE: f64 = 1e-8;
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Produces expected returns and a covariance matrix for a fixed, ordered
/// list of tickers. Implementors must guarantee a symmetric PSD Σ; the
/// core still validates it independently before using it.
pub trait ParameterEstimator {
    fn estimate(&self, tickers: &[&str]) -> (Vec<f64>, DMatrix<f64>);
}

/// Default estimator used when a caller supplies none. Deterministic in
/// ticker order: `μ_i = 0.08 + 0.02·i`, `Σ_ij = 0.15² · (1 if i=j else 0.30)`.
pub struct SyntheticEstimator;

impl ParameterEstimator for SyntheticEstimator {
    fn estimate(&self, tickers: &[&str]) -> (Vec<f64>, DMatrix<f64>) {
        let n = tickers.len();
        let mu: Vec<f64> = (0..n).map(|i| 0.08 + 0.02 * i as f64).collect();
        const VOL: f64 = 0.15;
        const CORR: f64 = 0.30;
        let sigma = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                VOL * VOL
            } else {
                VOL * VOL * CORR
            }
        });
        (mu, sigma)
    }
}

/// Validates that `sigma` is symmetric (within tolerance) and positive
/// semi-definite (all eigenvalues ≥ -tolerance), returning `InvalidCovariance`
/// otherwise. Called on every estimator's output before it reaches the
/// Simulator, whether the estimator is `SyntheticEstimator` or caller-supplied.
pub fn validate_covariance(sigma: &DMatrix<f64>) -> Result<()> {
    let n = sigma.nrows();
    if sigma.ncols() != n {
        return Err(RebalanceError::invalid_covariance("matrix is not square"));
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if (sigma[(i, j)] - sigma[(j, i)]).abs() > SYMMETRY_TOLERANCE {
                return Err(RebalanceError::invalid_covariance(format!(
                    "matrix not symmetric at ({i}, {j}): {} vs {}",
                    sigma[(i, j)],
                    sigma[(j, i)]
                )));
            }
        }
    }

    let eigen = SymmetricEigen::new(sigma.clone());
    if let Some(min_eig) = eigen.eigenvalues.iter().cloned().fold(None, |acc, v| {
        Some(acc.map_or(v, |m: f64| m.min(v)))
    }) {
        if min_eig < -PSD_TOLERANCE {
            return Err(RebalanceError::invalid_covariance(format!(
                "matrix is not positive semi-definite, smallest eigenvalue {min_eig}"
            )));
        }
    }

    Ok(())
}
