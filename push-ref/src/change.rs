use std::convert::TryFrom;

use nom::{
    bytes::complete::is_not,
    character::complete::{hex_digit1, space0, space1},
    combinator::all_consuming,
    sequence::tuple,
    Finish, IResult,
};
use serde::{Deserialize, Serialize};

use crate::{parse_ref, revision::BLANK_SHA, Action, Error, RefType, Revision};

/// A single ref moving between two revisions within a push.
///
/// The action is derived once at construction, which is also where a change
/// with neither side present is rejected.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "RawChange", into = "RawChange")]
pub struct ReferenceChange {
    full_ref: String,
    ref_type: RefType,
    name: String,
    old: Option<Revision>,
    new: Option<Revision>,
    action: Action,
    index: usize,
}

impl ReferenceChange {
    pub fn new<S>(
        full_ref: S,
        old: Option<Revision>,
        new: Option<Revision>,
        index: usize,
    ) -> Result<Self, Error>
    where
        S: Into<String>,
    {
        let full_ref = full_ref.into();
        let (ref_type, name) = match parse_ref(&full_ref) {
            Some((ref_type, name)) => (ref_type, name.to_string()),
            None => return Err(Error::UnsupportedRef(full_ref)),
        };
        let action = Action::classify(&full_ref, old.as_ref(), new.as_ref())?;

        Ok(Self {
            full_ref,
            ref_type,
            name,
            old,
            new,
            action,
            index,
        })
    }

    /// Builds a change from the raw strings git hands to a post-receive hook.
    pub fn from_raw(oldrev: &str, newrev: &str, full_ref: &str, index: usize) -> Result<Self, Error> {
        Self::new(
            full_ref,
            Revision::parse(oldrev)?,
            Revision::parse(newrev)?,
            index,
        )
    }

    pub fn full_ref(&self) -> &str {
        &self.full_ref
    }

    pub fn ref_type(&self) -> RefType {
        self.ref_type
    }

    /// The short branch or tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn old(&self) -> Option<&Revision> {
        self.old.as_ref()
    }

    pub fn new_revision(&self) -> Option<&Revision> {
        self.new.as_ref()
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// The position of this change within its push.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawChange {
    oldrev: String,
    newrev: String,
    #[serde(rename = "ref")]
    full_ref: String,
    index: usize,
}

impl TryFrom<RawChange> for ReferenceChange {
    type Error = Error;

    fn try_from(raw: RawChange) -> Result<Self, Self::Error> {
        Self::from_raw(&raw.oldrev, &raw.newrev, &raw.full_ref, raw.index)
    }
}

impl From<ReferenceChange> for RawChange {
    fn from(change: ReferenceChange) -> Self {
        let raw = |rev: Option<Revision>| match rev {
            Some(rev) => rev.into(),
            None => String::from(BLANK_SHA),
        };

        Self {
            oldrev: raw(change.old),
            newrev: raw(change.new),
            full_ref: change.full_ref,
            index: change.index,
        }
    }
}

/// Parses the `oldrev newrev ref` lines a post-receive hook receives.
///
/// Each non-empty line consumes one sequence index, in input order. Lines for
/// refs outside the branch and tag namespaces (merge request heads,
/// keep-arounds and so on) are valid input but produce no change.
pub fn parse_changes(input: &str) -> Result<Vec<ReferenceChange>, Error> {
    let mut changes = Vec::new();

    for (index, (line_number, line)) in input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .enumerate()
    {
        let (oldrev, newrev, full_ref) = Finish::finish(change_line(line.trim()))
            .map_err(|_| Error::ChangeParsing {
                line: line_number + 1,
                input: line.to_string(),
            })?
            .1;

        if parse_ref(full_ref).is_none() {
            continue;
        }

        changes.push(ReferenceChange::from_raw(oldrev, newrev, full_ref, index)?);
    }

    Ok(changes)
}

fn change_line(input: &str) -> IResult<&str, (&str, &str, &str)> {
    let (rest, (oldrev, _, newrev, _, full_ref, _)) = all_consuming(tuple((
        hex_digit1,
        space1,
        hex_digit1,
        space1,
        is_not(" \t\r\n"),
        space0,
    )))(input)?;

    Ok((rest, (oldrev, newrev, full_ref)))
}
