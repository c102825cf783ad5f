//! Fixed-point decimal money, represented as signed integer minor units.
//!
//! The source system serializes amounts as strings matching
//! `^-?\d+(\.\d{1,2})?$` and compares them with a `0.01` tolerance. Rather
//! than replaying that tolerance as a correctness window, amounts here are
//! integers (hundredths of a currency unit) so arithmetic is exact; the
//! tolerance is preserved only as a named constant for comparisons at the
//! serialization boundary, where legacy data may carry floating-point noise.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// `|a - b| <= BALANCE_TOLERANCE` is considered balanced, matching the
/// source's documented `0.01` comparison tolerance.
pub const BALANCE_TOLERANCE: Money = Money(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Construct from whole-and-cents minor units directly (e.g. `500000`
    /// for `"5000.00"`).
    pub fn from_minor_units(minor: i64) -> Self {
        Money(minor)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Money {
        Money(self.0.abs())
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = self.0.unsigned_abs() / 100;
        let cents = self.0.unsigned_abs() % 100;
        write!(f, "{sign}{whole}.{cents:02}")
    }
}

impl FromStr for Money {
    type Err = LedgerError;

    /// Parses `^-?\d+(\.\d{1,2})?$`, matching the structural amount pattern
    /// from the validator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::AmountOutOfRange {
            message: format!("'{s}' is not a valid fixed-point amount"),
        };

        let (sign, rest) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };

        if rest.is_empty() {
            return Err(invalid());
        }

        let mut parts = rest.splitn(2, '.');
        let whole_part = parts.next().ok_or_else(invalid)?;
        let frac_part = parts.next();

        if whole_part.is_empty() || !whole_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: i64 = whole_part.parse().map_err(|_| invalid())?;

        let cents: i64 = match frac_part {
            None => 0,
            Some(f) if f.len() == 1 && f.bytes().all(|b| b.is_ascii_digit()) => {
                f.parse::<i64>().map_err(|_| invalid())? * 10
            }
            Some(f) if f.len() == 2 && f.bytes().all(|b| b.is_ascii_digit()) => {
                f.parse().map_err(|_| invalid())?
            }
            _ => return Err(invalid()),
        };

        Ok(Money(sign * (whole * 100 + cents)))
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Money::from_str(&raw).map_err(serde::de::Error::custom)
    }
}
