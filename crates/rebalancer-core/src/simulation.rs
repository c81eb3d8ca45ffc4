/// Monte-Carlo portfolio-return simulator.
///
/// Grounded on `financial-core/src/portfolio/risk.rs`'s
/// `monte_carlo_simulation`, upgraded from its hand-rolled `SimpleRandomGenerator`
/// LCG + Box-Muller draw to a proper seeded `rand_chacha` stream and a
/// `nalgebra` Cholesky factorization of the covariance matrix: the teacher's
/// own simulator is the one place it cuts the reproducibility corner this
/// engine cannot, since the CVaR optimizer depends on byte-identical output
/// for a fixed seed.
use crate::error::{RebalanceError, Result};
use nalgebra::{Cholesky, DMatrix};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{ChiSquared, Distribution, StandardNormal};

pub const DEFAULT_PERIODS: u32 = 252;
pub const DEFAULT_SCENARIOS: u32 = 1000;
const MIN_SCENARIOS: u32 = 32;
const JITTER_INITIAL: f64 = 1e-12;
const JITTER_MAX_RETRIES: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReturnDistribution {
    Normal,
    StudentT { nu: f64 },
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub periods: u32,
    pub scenarios: u32,
    pub distribution: ReturnDistribution,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            periods: DEFAULT_PERIODS,
            scenarios: DEFAULT_SCENARIOS,
            distribution: ReturnDistribution::Normal,
            seed: 0,
        }
    }
}

/// Diagnostics recorded by a simulation run, surfaced by callers that care
/// (the CVaR strategy folds `covariance_jitter` into its own diagnostics).
#[derive(Debug, Clone, Default)]
pub struct SimulationDiagnostics {
    pub covariance_jitter: f64,
}

pub struct MonteCarloSimulator;

impl MonteCarloSimulator {
    /// Runs `config.scenarios` independent draws of the portfolio's
    /// cumulative `config.periods`-period return under weights `w`,
    /// expected returns `mu` (annualized) and covariance `sigma`
    /// (annualized, n×n). Returns the simulated returns plus diagnostics.
    pub fn simulate(
        w: &[f64],
        mu: &[f64],
        sigma: &DMatrix<f64>,
        config: &SimulationConfig,
    ) -> Result<(Vec<f64>, SimulationDiagnostics)> {
        let n = w.len();
        assert_eq!(mu.len(), n, "mu length must match weight vector length");
        assert_eq!(sigma.nrows(), n, "sigma must be n x n");
        assert_eq!(sigma.ncols(), n, "sigma must be n x n");

        if config.scenarios < MIN_SCENARIOS {
            return Err(RebalanceError::InsufficientScenarios { n: config.scenarios });
        }

        let periods = config.periods.max(1) as f64;
        let mu_period: Vec<f64> = mu.iter().map(|m| m / periods).collect();
        let sigma_period = sigma.map(|v| v / periods);

        let (chol, jitter) = cholesky_with_jitter(&sigma_period)?;
        let diagnostics = SimulationDiagnostics {
            covariance_jitter: jitter,
        };

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut out = Vec::with_capacity(config.scenarios as usize);

        for _ in 0..config.scenarios {
            let mut cumulative = 1.0f64;
            for _ in 0..config.periods {
                let z: Vec<f64> = (0..n).map(|_| StandardNormal.sample(&mut rng)).collect();
                let z_vec = nalgebra::DVector::from_vec(z);
                let mut correlated = &chol.l() * &z_vec;

                if let ReturnDistribution::StudentT { nu } = config.distribution {
                    // Normal-variance-mixture: one shared chi-squared draw scales the
                    // whole correlated normal vector, preserving cross-asset correlation.
                    let chi = ChiSquared::new(nu).expect("nu must be positive");
                    let s = chi.sample(&mut rng);
                    let scale = (nu / s).sqrt();
                    correlated *= scale;
                }

                let mut period_return = 0.0;
                for i in 0..n {
                    let r_i = mu_period[i] + correlated[i];
                    period_return += w[i] * r_i;
                }
                cumulative *= 1.0 + period_return;
            }
            out.push(cumulative - 1.0);
        }

        Ok((out, diagnostics))
    }
}

/// Cholesky-factorizes `sigma`, adding `ε·I` (doubling `ε` on repeated
/// failure, bounded retries) until the matrix is positive-definite.
fn cholesky_with_jitter(sigma: &DMatrix<f64>) -> Result<(Cholesky<f64, nalgebra::Dyn>, f64)> {
    let n = sigma.nrows();
    let mut jitter = 0.0f64;
    let mut attempt_eps = JITTER_INITIAL;

    for attempt in 0..=JITTER_MAX_RETRIES {
        let candidate = if jitter == 0.0 {
            sigma.clone()
        } else {
            sigma + DMatrix::identity(n, n) * jitter
        };
        if let Some(chol) = Cholesky::new(candidate) {
            return Ok((chol, jitter));
        }
        if attempt == 0 {
            jitter = attempt_eps;
        } else {
            attempt_eps *= 2.0;
            jitter = attempt_eps;
        }
    }

    Err(RebalanceError::invalid_covariance(
        "covariance matrix not positive-definite even after bounded jitter retries",
    ))
}
