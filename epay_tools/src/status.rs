use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Transaction states reported by the processor. Anything the processor sends that is not listed here is kept
/// verbatim in [`ProcessorStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessorStatus {
    New,
    Auth,
    Expired,
    Charge,
    Decline,
    Error,
    Other(String),
}

impl Default for ProcessorStatus {
    fn default() -> Self {
        Self::Other(String::default())
    }
}

impl From<String> for ProcessorStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for ProcessorStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "NEW" => Self::New,
            "AUTH" => Self::Auth,
            "EXPIRED" => Self::Expired,
            "CHARGE" => Self::Charge,
            "DECLINE" => Self::Decline,
            "ERROR" => Self::Error,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl From<ProcessorStatus> for String {
    fn from(value: ProcessorStatus) -> Self {
        value.to_string()
    }
}

impl Display for ProcessorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Auth => write!(f, "AUTH"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Charge => write!(f, "CHARGE"),
            Self::Decline => write!(f, "DECLINE"),
            Self::Error => write!(f, "ERROR"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl ProcessorStatus {
    /// Maps the processor's view of a transaction onto the status the business records. This never fails: anything
    /// that is not explicitly pending or charged counts as unsuccessful.
    pub fn business_status(&self) -> BusinessStatus {
        match self {
            Self::New | Self::Auth | Self::Expired => BusinessStatus::Pending,
            Self::Charge => BusinessStatus::Successful,
            Self::Decline | Self::Error | Self::Other(_) => BusinessStatus::Unsuccessful,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessStatus {
    Pending,
    Successful,
    Unsuccessful,
}

impl Display for BusinessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Successful => write!(f, "successful"),
            Self::Unsuccessful => write!(f, "unsuccessful"),
        }
    }
}

impl FromStr for BusinessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "successful" => Ok(Self::Successful),
            "unsuccessful" => Ok(Self::Unsuccessful),
            _ => Err(format!("Invalid payment status: {s}")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mapping_is_total() {
        let cases = [
            ("NEW", BusinessStatus::Pending),
            ("AUTH", BusinessStatus::Pending),
            ("EXPIRED", BusinessStatus::Pending),
            ("CHARGE", BusinessStatus::Successful),
            ("DECLINE", BusinessStatus::Unsuccessful),
            ("ERROR", BusinessStatus::Unsuccessful),
            ("REFUND", BusinessStatus::Unsuccessful),
            ("", BusinessStatus::Unsuccessful),
        ];
        for (status, expected) in cases {
            assert_eq!(ProcessorStatus::from(status).business_status(), expected, "status {status}");
        }
    }

    #[test]
    fn unknown_statuses_are_preserved() {
        let status: ProcessorStatus = serde_json::from_str(r#""PARTIAL_REFUND""#).unwrap();
        assert_eq!(status, ProcessorStatus::Other("PARTIAL_REFUND".into()));
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""PARTIAL_REFUND""#);
        let status: ProcessorStatus = serde_json::from_str(r#""charge""#).unwrap();
        assert_eq!(status, ProcessorStatus::Charge);
    }

    #[test]
    fn business_status_strings() {
        for status in [BusinessStatus::Pending, BusinessStatus::Successful, BusinessStatus::Unsuccessful] {
            assert_eq!(status.to_string().parse::<BusinessStatus>().unwrap(), status);
        }
        assert!("completed".parse::<BusinessStatus>().is_err());
        assert_eq!(serde_json::to_string(&BusinessStatus::Successful).unwrap(), r#""successful""#);
    }
}
