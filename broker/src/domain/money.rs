//! Monetary amounts.
//!
//! Balances, prices, and bonuses are exact decimals with two fractional
//! digits, persisted as PostgreSQL `NUMERIC`. Floating point is never used
//! for money anywhere in the engine.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of fractional digits carried by every [`Amount`].
pub const AMOUNT_SCALE: u32 = 2;

/// Validation errors returned when constructing an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountValidationError {
    /// The input could not be parsed as a decimal number.
    Unparseable { input: String },
    /// The value is below zero.
    Negative { input: String },
}

impl fmt::Display for AmountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparseable { input } => write!(f, "not a decimal amount: {input:?}"),
            Self::Negative { input } => write!(f, "amount must not be negative: {input}"),
        }
    }
}

impl std::error::Error for AmountValidationError {}

/// A non-negative monetary amount with two fractional digits.
///
/// ## Invariants
/// - The wrapped decimal is never negative.
/// - The scale is normalised to [`AMOUNT_SCALE`] on construction.
///
/// # Examples
/// ```
/// use broker::domain::Amount;
///
/// let price = Amount::parse("0.20")?;
/// assert_eq!(price.to_string(), "0.20");
/// # Ok::<(), broker::domain::AmountValidationError>(())
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Validate and construct an [`Amount`] from a decimal value.
    pub fn new(value: Decimal) -> Result<Self, AmountValidationError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountValidationError::Negative {
                input: value.to_string(),
            });
        }
        Ok(Self(value.round_dp(AMOUNT_SCALE).normalize_scale()))
    }

    /// Parse an [`Amount`] from user-supplied text.
    pub fn parse(input: &str) -> Result<Self, AmountValidationError> {
        let trimmed = input.trim();
        let value: Decimal =
            trimmed
                .parse()
                .map_err(|_| AmountValidationError::Unparseable {
                    input: trimmed.to_owned(),
                })?;
        Self::new(value)
    }

    /// The wrapped decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Add another amount. Cannot fail: the sum of two non-negative amounts
    /// is non-negative.
    pub fn saturating_add(self, other: Self) -> Self {
        Self(
            self.0
                .saturating_add(other.0)
                .round_dp(AMOUNT_SCALE)
                .normalize_scale(),
        )
    }

    /// Subtract another amount, failing when the result would be negative.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        let result = self.0 - other.0;
        if result.is_sign_negative() && !result.is_zero() {
            return None;
        }
        Some(Self(result.round_dp(AMOUNT_SCALE).normalize_scale()))
    }
}

/// Normalisation helper shared by the constructors.
trait NormalizeScale {
    fn normalize_scale(self) -> Self;
}

impl NormalizeScale for Decimal {
    fn normalize_scale(mut self) -> Self {
        self.rescale(AMOUNT_SCALE);
        self
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
