/// Closed error taxonomy for the rebalancing engine.
///
/// Every fatal failure mode a `rebalance()` call can produce is a variant
/// here. The two *recovered* conditions from the design (optimizer
/// non-convergence, an unreachable liquidity floor) are deliberately not
/// part of this enum: they never propagate as an `Err`, they become
/// entries in `RebalanceResult.metrics.warnings` instead.
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RebalanceError>;

/// Fatal errors the rebalancing engine can return.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RebalanceError {
    #[error("portfolio has no positions")]
    EmptyPortfolio,

    #[error("target allocations sum to {total}, which exceeds 1.0 (+ epsilon)")]
    InvalidTargets { total: Decimal },

    #[error("covariance matrix is not symmetric positive semi-definite: {reason}")]
    InvalidCovariance { reason: String },

    #[error("the simulator requires at least 32 scenarios, got {n}")]
    InsufficientScenarios { n: u32 },

    #[error("monetary magnitude {magnitude} exceeds the maximum representable value")]
    PrecisionOverflow { magnitude: String },
}

impl RebalanceError {
    pub fn invalid_targets(total: Decimal) -> Self {
        RebalanceError::InvalidTargets { total }
    }

    pub fn invalid_covariance(reason: impl Into<String>) -> Self {
        RebalanceError::InvalidCovariance {
            reason: reason.into(),
        }
    }
}

/// A recovered condition: the call still produces a `RebalanceResult`, but
/// with a warning attached. Rendered via `Display` into
/// `RebalanceResult.metrics.warnings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The CVaR optimizer did not converge within its iteration budget;
    /// the strategy fell back to the target weights unchanged.
    OptimizerNonConvergent { iterations: u32 },
    /// The liquidity floor could not be reached even after dropping every
    /// BUY and relying solely on SELL proceeds.
    LiquidityUnreachable,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::OptimizerNonConvergent { iterations } => write!(
                f,
                "optimizer_non_convergent: fell back to target weights after {iterations} iterations"
            ),
            Warning::LiquidityUnreachable => write!(f, "liquidity_unreachable"),
        }
    }
}
