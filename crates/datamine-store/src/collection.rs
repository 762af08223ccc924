//! Dataset identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// One dataset known to this build.
///
/// The canonical name is case-sensitive and doubles as the registry key and
/// the cache subdirectory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "RACE")]
    Race,
    #[serde(rename = "ALLEN_AI_DROP")]
    AllenAiDrop,
    #[serde(rename = "ALLEN_AI_OBQA")]
    AllenAiObqa,
    #[serde(rename = "ALLEN_AI_ARC")]
    AllenAiArc,
    #[serde(rename = "TRIVIA_QA")]
    TriviaQa,
    #[serde(rename = "HOTPOT_QA")]
    HotpotQa,
    #[serde(rename = "COSMOS_QA")]
    CosmosQa,
    #[serde(rename = "CSQA")]
    Csqa,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Self::Race,
        Self::AllenAiDrop,
        Self::AllenAiObqa,
        Self::AllenAiArc,
        Self::TriviaQa,
        Self::HotpotQa,
        Self::CosmosQa,
        Self::Csqa,
    ];

    /// Canonical name (registry key, cache directory name).
    pub fn name(self) -> &'static str {
        match self {
            Self::Race => "RACE",
            Self::AllenAiDrop => "ALLEN_AI_DROP",
            Self::AllenAiObqa => "ALLEN_AI_OBQA",
            Self::AllenAiArc => "ALLEN_AI_ARC",
            Self::TriviaQa => "TRIVIA_QA",
            Self::HotpotQa => "HOTPOT_QA",
            Self::CosmosQa => "COSMOS_QA",
            Self::Csqa => "CSQA",
        }
    }

    /// Sorted, comma-separated list of every canonical name.
    pub fn available() -> String {
        let mut names: Vec<_> = Self::ALL.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| DatasetError::UnknownDataset {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}
