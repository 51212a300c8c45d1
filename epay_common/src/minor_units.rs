use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CURRENCY_CODE: &str = "KZT";

//--------------------------------------     MinorUnits       --------------------------------------------------------
/// A monetary amount expressed in the currency's smallest unit (tiyn, cents, ...). The processor only ever sees whole
/// minor units, so there is no fractional representation here.
#[derive(Debug, Clone, Copy, Default, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount in minor units: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for MinorUnits {
    type Err = AmountConversionError;

    /// Amounts arrive from order collaborators as strings. Only plain integers are accepted; "10.50" is rejected
    /// rather than silently truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountConversionError("empty amount".to_string()));
        }
        s.parse::<i64>().map(Self).map_err(|e| AmountConversionError(format!("{s}. {e}")))
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
