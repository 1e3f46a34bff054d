// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{cmp::Ordering, fmt, str::FromStr};

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Scale between the on-chain integer representation and the readable one.
const WEI_PER_UNIT: u64 = 1_000_000_000_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("invalid balance format: `{0}`")]
    Parse(String),
    #[error("unit mismatch: `{left}` vs `{right}`")]
    UnitMismatch { left: String, right: String },
    #[error("balance arithmetic overflow")]
    Overflow,
}

/// An unsigned decimal amount tagged with a unit (`wxHOPR`, `xDai`, ...).
///
/// Amounts expressed in `wei <unit>` are normalized to `<unit>` on
/// construction by dividing by 10^18. Arithmetic is only defined between
/// same-unit balances; mixing units is a [`BalanceError::UnitMismatch`].
#[derive(Clone, PartialEq, Eq)]
pub struct Balance {
    value: Decimal,
    unit: String,
}

impl Balance {
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    pub fn zero(unit: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, unit)
    }

    pub fn from_f64(value: f64, unit: impl Into<String>) -> Result<Self, BalanceError> {
        let value = Decimal::from_f64(value).ok_or(BalanceError::Overflow)?;
        Ok(Self::new(value, unit))
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn as_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }

    fn ensure_same_unit(&self, other: &Self) -> Result<(), BalanceError> {
        if self.unit != other.unit {
            return Err(BalanceError::UnitMismatch {
                left: self.unit.clone(),
                right: other.unit.clone(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self, BalanceError> {
        self.ensure_same_unit(other)?;
        let value = self
            .value
            .checked_add(other.value)
            .ok_or(BalanceError::Overflow)?;
        Ok(Self::new(value, self.unit.clone()))
    }

    pub fn sub(&self, other: &Self) -> Result<Self, BalanceError> {
        self.ensure_same_unit(other)?;
        let value = self
            .value
            .checked_sub(other.value)
            .ok_or(BalanceError::Overflow)?;
        Ok(Self::new(value, self.unit.clone()))
    }

    /// Scales the amount, keeping the unit.
    pub fn scale(&self, factor: Decimal) -> Result<Self, BalanceError> {
        let value = self
            .value
            .checked_mul(factor)
            .ok_or(BalanceError::Overflow)?;
        Ok(Self::new(value, self.unit.clone()))
    }

    /// Divides the amount by a dimensionless divisor, keeping the unit.
    pub fn split(&self, divisor: Decimal) -> Result<Self, BalanceError> {
        let value = self
            .value
            .checked_div(divisor)
            .ok_or(BalanceError::Overflow)?;
        Ok(Self::new(value, self.unit.clone()))
    }

    /// Ratio between two same-unit balances.
    pub fn ratio(&self, other: &Self) -> Result<Decimal, BalanceError> {
        self.ensure_same_unit(other)?;
        self.value
            .checked_div(other.value)
            .ok_or(BalanceError::Overflow)
    }
}

impl FromStr for Balance {
    type Err = BalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let parse_err = || BalanceError::Parse(s.to_string());

        let (raw_value, wei, unit) = match tokens.as_slice() {
            [value, unit] => (*value, false, *unit),
            [value, "wei", unit] => (*value, true, *unit),
            _ => return Err(parse_err()),
        };

        let mut value = Decimal::from_str(raw_value).map_err(|_| parse_err())?;
        if wei {
            value = value
                .checked_div(Decimal::from(WEI_PER_UNIT))
                .ok_or(BalanceError::Overflow)?;
        }

        Ok(Self::new(value.normalize(), unit))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl fmt::Debug for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Balance(value={}, unit='{}')", self.value, self.unit)
    }
}

/// Comparisons across units are undefined rather than panicking.
impl PartialOrd for Balance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.unit == other.unit).then(|| self.value.cmp(&other.value))
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
