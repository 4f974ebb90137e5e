//! Fixed-point amount used for variable bindings and template splits.
//!
//! # Responsibility
//! - Parse user-entered variable values.
//! - Render bound values with exactly two decimals.
//!
//! # Invariants
//! - Values are stored as signed hundredths; no floating point arithmetic.
//! - Parsing never silently truncates extra decimal digits.
//! - Arithmetic is checked; overflow is reported as `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static AMOUNT_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^([+-])?(\d+)(?:[.,](\d{1,2}))?$"));

/// Signed amount in hundredths of the book currency unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates an amount from raw hundredths.
    pub const fn from_hundredths(value: i64) -> Self {
        Self(value)
    }

    /// Creates an amount from whole units.
    pub const fn from_units(value: i64) -> Self {
        Self(value * 100)
    }

    /// Returns raw hundredths.
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Error returned when user text is not a well-formed amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountParseError {
    /// Input was blank after trim.
    Empty,
    /// Input does not match `[+-]digits[.,]d{1,2}`.
    Malformed(String),
    /// Input is well-formed but exceeds the representable range.
    OutOfRange(String),
}

impl Display for AmountParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "amount must not be blank"),
            Self::Malformed(value) => write!(f, "not a valid amount: `{value}`"),
            Self::OutOfRange(value) => write!(f, "amount out of range: `{value}`"),
        }
    }
}

impl Error for AmountParseError {}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let pattern = AMOUNT_PATTERN
            .as_ref()
            .map_err(|_| AmountParseError::Malformed(trimmed.to_string()))?;
        let captures = pattern
            .captures(trimmed)
            .ok_or_else(|| AmountParseError::Malformed(trimmed.to_string()))?;

        let negative = captures.get(1).is_some_and(|sign| sign.as_str() == "-");
        let whole = captures
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .parse::<i64>()
            .map_err(|_| AmountParseError::OutOfRange(trimmed.to_string()))?;
        let fraction = match captures.get(3).map(|m| m.as_str()) {
            None => 0,
            Some(digits) if digits.len() == 1 => i64::from(digit_value(digits)) * 10,
            Some(digits) => i64::from(digit_value(digits)),
        };

        let magnitude = whole
            .checked_mul(100)
            .and_then(|value| value.checked_add(fraction))
            .ok_or_else(|| AmountParseError::OutOfRange(trimmed.to_string()))?;

        Ok(Self(if negative { -magnitude } else { magnitude }))
    }
}

fn digit_value(digits: &str) -> u8 {
    digits
        .bytes()
        .fold(0u8, |acc, byte| acc * 10 + (byte - b'0'))
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Amount {
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_neg(self) -> Option<Self> {
        self.0.checked_neg().map(Self)
    }

    /// Sums `amounts`, or `None` if any partial sum leaves the `i64` range.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Self>) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |total, amount| total.checked_add(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::{Amount, AmountParseError};

    #[test]
    fn parses_whole_and_fractional_values() {
        assert_eq!("12".parse::<Amount>().unwrap(), Amount::from_hundredths(1200));
        assert_eq!("12.5".parse::<Amount>().unwrap(), Amount::from_hundredths(1250));
        assert_eq!("12,05".parse::<Amount>().unwrap(), Amount::from_hundredths(1205));
        assert_eq!(" -0.75 ".parse::<Amount>().unwrap(), Amount::from_hundredths(-75));
        assert_eq!("+3".parse::<Amount>().unwrap(), Amount::from_units(3));
    }

    #[test]
    fn rejects_blank_and_malformed_input() {
        assert_eq!("  ".parse::<Amount>().unwrap_err(), AmountParseError::Empty);
        assert!(matches!(
            "12.345".parse::<Amount>().unwrap_err(),
            AmountParseError::Malformed(_)
        ));
        assert!(matches!(
            "abc".parse::<Amount>().unwrap_err(),
            AmountParseError::Malformed(_)
        ));
        assert!(matches!(
            "99999999999999999999".parse::<Amount>().unwrap_err(),
            AmountParseError::OutOfRange(_)
        ));
    }

    #[test]
    fn display_always_has_two_decimals() {
        assert_eq!(Amount::from_hundredths(1234).to_string(), "12.34");
        assert_eq!(Amount::from_hundredths(-50).to_string(), "-0.50");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn sum_and_negation_balance_out() {
        let five = Amount::from_units(5);
        let total = Amount::checked_sum([five, five.checked_neg().unwrap()]).unwrap();
        assert!(total.is_zero());
    }

    #[test]
    fn overflowing_arithmetic_yields_none() {
        let large = "90000000000000000".parse::<Amount>().unwrap();
        assert_eq!(large.checked_add(large), None);
        assert_eq!(Amount::checked_sum([large, large, large.checked_neg().unwrap()]), None);
        assert_eq!(Amount::from_hundredths(i64::MIN).checked_neg(), None);
        assert_eq!(
            Amount::from_hundredths(i64::MAX).checked_add(Amount::from_hundredths(-1)),
            Some(Amount::from_hundredths(i64::MAX - 1))
        );
    }
}
