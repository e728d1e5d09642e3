use std::{convert::TryFrom, fmt::Display, str::FromStr};

use derive_more::Into;
use serde::{Deserialize, Serialize};

use crate::Error;

/// The revision git sends for a ref that does not exist on one side of a
/// change.
pub const BLANK_SHA: &str = "0000000000000000000000000000000000000000";

/// A content addressed commit ID.
///
/// Absent refs are never represented as a `Revision`: use
/// [`Revision::parse()`] to turn transport input into an `Option<Revision>`.
#[derive(
    Debug, Clone, Deserialize, Serialize, Into, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    /// Parses a revision as received from git, mapping the blank revision to
    /// `None`.
    pub fn parse(raw: &str) -> Result<Option<Self>, Error> {
        if is_blank(raw) {
            Ok(None)
        } else {
            Ok(Some(Self::from_str(raw)?))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The abbreviated form used in log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

/// Returns true if the given raw revision represents an absent ref.
pub fn is_blank(raw: &str) -> bool {
    raw.is_empty() || ((raw.len() == 40 || raw.len() == 64) && raw.bytes().all(|b| b == b'0'))
}

impl FromStr for Revision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // SHA-1 and SHA-256 object formats are the only ones git knows about.
        if (s.len() == 40 || s.len() == 64) && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(Error::InvalidRevision(s.to_string()))
        }
    }
}

impl TryFrom<String> for Revision {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
