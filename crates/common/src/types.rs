use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Source id reserved for internal/system broadcasts.
pub const INTERNAL_SOURCE_ID: &str = "0";

/// How often a destination wants content from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Manual,
    /// Reserved tag for internal/system broadcasts. Always paired with
    /// [`INTERNAL_SOURCE_ID`].
    Internal,
}

impl Frequency {
    /// Frequencies a regular subscriber may pick.
    pub const USER_SELECTABLE: [Frequency; 3] = [Self::Daily, Self::Weekly, Self::Manual];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Manual => "manual",
            Self::Internal => "internal",
        }
    }

    #[must_use]
    pub fn is_internal(self) -> bool {
        matches!(self, Self::Internal)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = Error;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "manual" => Ok(Self::Manual),
            "internal" => Ok(Self::Internal),
            _ => Err(Error::unknown_frequency(s.trim())),
        }
    }
}

/// Which fields make up a subscription's unique key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniquenessMode {
    /// One subscription per destination; re-subscribing replaces the source.
    #[default]
    PerDestination,
    /// One subscription per `(destination, source)` pair.
    PerDestinationSource,
}

/// What a subscribe does when a row with the same key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Update the existing row's mutable fields in place.
    #[default]
    Overwrite,
    /// Leave the existing row untouched and tell the caller.
    Reject,
}

/// Who may issue subscription-management commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    /// Anyone in any chat.
    Open,
    /// Only principals on the allow-list. An empty list admits nobody.
    #[default]
    Allowlist,
}
