//! Scanners for the textual references commit messages and branch names make
//! to issue tracker keys and to other work items.

use std::sync::LazyLock;

use regex::Regex;

static ISSUE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Z_0-9]+-\d+\b").expect("invalid issue key pattern")
});

// Issues (#), merge requests (!), epics (&) and work item URLs, optionally
// qualified by a project or group path.
static CROSS_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:^|[\s(\[])(?:[\w.\-]+(?:/[\w.\-]+)*)?[\#!&]\d+\b
        |
        https?://\S+/-/(?:issues|merge_requests|epics|work_items)/\d+
        ",
    )
    .expect("invalid cross reference pattern")
});

/// Returns every issue tracker key mentioned in `text`, in order of first
/// appearance.
pub fn issue_keys(text: &str) -> Vec<&str> {
    let mut keys: Vec<&str> = Vec::new();
    for key in ISSUE_KEY.find_iter(text).map(|m| m.as_str()) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

pub fn has_issue_keys(text: &str) -> bool {
    ISSUE_KEY.is_match(text)
}

/// Returns true if `message` looks like it mentions another work item.
pub fn mentions_work_items(message: &str) -> bool {
    CROSS_REFERENCE.is_match(message)
}
