use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Error, Revision};

pub const BRANCH_REF_PREFIX: &str = "refs/heads/";
pub const TAG_REF_PREFIX: &str = "refs/tags/";

/// The kind of ref a change applies to.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Branch,
    Tag,
}

impl RefType {
    pub fn prefix(&self) -> &'static str {
        match self {
            RefType::Branch => BRANCH_REF_PREFIX,
            RefType::Tag => TAG_REF_PREFIX,
        }
    }

    /// Builds the fully qualified ref for a short name.
    pub fn full_ref(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }
}

impl Display for RefType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefType::Branch => write!(f, "branch"),
            RefType::Tag => write!(f, "tag"),
        }
    }
}

/// Splits a fully qualified ref into its type and short name.
///
/// Refs outside the branch and tag namespaces, and refs with an empty short
/// name, return `None`.
pub fn parse_ref(full_ref: &str) -> Option<(RefType, &str)> {
    [RefType::Branch, RefType::Tag]
        .iter()
        .find_map(|ref_type| {
            full_ref
                .strip_prefix(ref_type.prefix())
                .map(|name| (*ref_type, name))
        })
        .filter(|(_, name)| !name.is_empty())
}

/// What a change did to its ref.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
    Removed,
}

impl Action {
    /// Derives the action from the revisions on either side of a change.
    ///
    /// A change with both sides absent is meaningless and is rejected; `name`
    /// is only used to describe the error.
    pub fn classify(
        name: &str,
        old: Option<&Revision>,
        new: Option<&Revision>,
    ) -> Result<Self, Error> {
        match (old, new) {
            (None, None) => Err(Error::BlankRevisions(name.to_string())),
            (None, Some(_)) => Ok(Action::Created),
            (Some(_), None) => Ok(Action::Removed),
            (Some(_), Some(_)) => Ok(Action::Updated),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Created => write!(f, "created"),
            Action::Updated => write!(f, "updated"),
            Action::Removed => write!(f, "removed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_parse_ref() {
        assert_eq!(parse_ref("refs/heads/main"), Some((RefType::Branch, "main")));
        assert_eq!(
            parse_ref("refs/heads/feature/nested"),
            Some((RefType::Branch, "feature/nested"))
        );
        assert_eq!(parse_ref("refs/tags/v1.0"), Some((RefType::Tag, "v1.0")));
        assert_eq!(parse_ref("refs/heads/"), None);
        assert_eq!(parse_ref("refs/merge-requests/1/head"), None);
        assert_eq!(parse_ref("main"), None);
    }

    #[test]
    fn test_classify() -> anyhow::Result<()> {
        let rev = Revision::from_str("5937ac0a7beb003549fc5fd26fc247adbce4a52e")?;

        assert_eq!(Action::classify("x", None, Some(&rev))?, Action::Created);
        assert_eq!(Action::classify("x", Some(&rev), None)?, Action::Removed);
        assert_eq!(
            Action::classify("x", Some(&rev), Some(&rev))?,
            Action::Updated
        );
        assert!(Action::classify("x", None, None).is_err());

        Ok(())
    }
}
