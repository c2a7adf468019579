//! Entity collections

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A named partition of records, one per entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Notes,
    Folders,
    Projects,
    Templates,
    References,
}

impl Collection {
    /// Every known collection, in a stable order
    pub const ALL: [Self; 5] = [
        Self::Notes,
        Self::Folders,
        Self::Projects,
        Self::Templates,
        Self::References,
    ];

    /// Storage and URL name of this collection
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Folders => "folders",
            Self::Projects => "projects",
            Self::Templates => "templates",
            Self::References => "references",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|collection| collection.as_str() == normalized)
            .ok_or_else(|| Error::InvalidInput(format!("unknown collection '{}'", s.trim())))
    }
}
