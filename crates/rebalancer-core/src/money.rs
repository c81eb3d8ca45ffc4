/// Fixed-precision monetary scalar.
///
/// Backed by `rust_decimal::Decimal` (96-bit mantissa, 28-29 significant
/// digits) rather than `f64`, so balances and trade values never accumulate
/// binary-rounding error. Arithmetic is exposed as explicit `checked_*`
/// methods returning `Result` rather than operator overloads, so overflow
/// past the crate's representable range surfaces as `PrecisionOverflow`
/// instead of silently wrapping or panicking.
use crate::error::{RebalanceError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Magnitudes beyond this are rejected with `PrecisionOverflow` (§4.1: 10^18).
const MAX_MAGNITUDE: Decimal = dec!(1_000_000_000_000_000_000);

/// Default number of fractional digits money is quantized to on output.
pub const DEFAULT_PRECISION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub struct MoneyValue(Decimal);

/// Quantizes to `DEFAULT_PRECISION` before handing off to `Decimal`'s own
/// (string-backed) `Serialize`, mirroring `Display` — the derive would
/// otherwise emit the raw, unrounded scale the internal arithmetic carries.
impl Serialize for MoneyValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.rounded(DEFAULT_PRECISION).0.serialize(serializer)
    }
}

impl MoneyValue {
    pub fn new(amount: Decimal) -> Result<Self> {
        if amount.abs() > MAX_MAGNITUDE {
            return Err(RebalanceError::PrecisionOverflow {
                magnitude: amount.to_string(),
            });
        }
        Ok(Self(amount))
    }

    /// Construct without the magnitude check, for internal arithmetic where
    /// the operands are already known to be in range.
    pub fn new_unchecked(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Quantize an `f64` into a `MoneyValue` at the given fractional
    /// precision (2 digits by default), using banker's rounding
    /// (round-half-to-even) at this output boundary.
    pub fn from_f64(value: f64, precision: u32) -> Result<Self> {
        let decimal = Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO);
        let rounded = decimal.round_dp_with_strategy(precision, RoundingStrategy::MidpointNearestEven);
        Self::new(rounded)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Round to `precision` fractional digits using banker's rounding, the
    /// one place this type rounds: at the output boundary.
    pub fn rounded(&self, precision: u32) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(precision, RoundingStrategy::MidpointNearestEven),
        )
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        Self::new(self.0 + other.0)
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        Self::new(self.0 - other.0)
    }

    pub fn checked_mul_decimal(&self, factor: Decimal) -> Result<Self> {
        Self::new(self.0 * factor)
    }

    pub fn checked_mul_f64(&self, factor: f64) -> Result<Self> {
        let factor = Decimal::from_f64_retain(factor).unwrap_or(Decimal::ZERO);
        self.checked_mul_decimal(factor)
    }

    pub fn checked_div_decimal(&self, divisor: Decimal) -> Result<Self> {
        if divisor.is_zero() {
            return Ok(Self::zero());
        }
        Self::new(self.0 / divisor)
    }
}

impl std::ops::Add for MoneyValue {
    type Output = MoneyValue;
    fn add(self, rhs: MoneyValue) -> MoneyValue {
        MoneyValue(self.0 + rhs.0)
    }
}

impl std::ops::Sub for MoneyValue {
    type Output = MoneyValue;
    fn sub(self, rhs: MoneyValue) -> MoneyValue {
        MoneyValue(self.0 - rhs.0)
    }
}

impl std::iter::Sum for MoneyValue {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(MoneyValue::zero(), |acc, v| acc + v)
    }
}

impl Default for MoneyValue {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for MoneyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rounded(DEFAULT_PRECISION).0)
    }
}

/// The 0.25% default `transaction_cost_bps` used by `TradingConstraints`.
pub const DEFAULT_TRANSACTION_COST_BPS: Decimal = dec!(0.0025);
