//! Monetary amounts in integer minor units.
//!
//! Balances are `i64` minor units (cents) everywhere: in memory, on the wire and in the
//! `BIGINT` columns. Floating point never touches a balance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A strictly positive amount of money in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(i64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("amount must be a positive number of minor units, got {0}")]
pub struct InvalidAmount(pub i64);

impl Amount {
    pub fn new(minor_units: i64) -> Result<Self, InvalidAmount> {
        if minor_units > 0 {
            Ok(Self(minor_units))
        } else {
            Err(InvalidAmount(minor_units))
        }
    }

    #[inline]
    pub fn minor_units(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = InvalidAmount;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Amount::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
