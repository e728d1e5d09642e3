use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// Namespaces and keys that `git push -o` may set. Anything else is dropped
// when parsing.
const VALID_OPTIONS: &[(&str, &[&str])] = &[
    (
        "merge_request",
        &[
            "assign",
            "auto_merge",
            "create",
            "description",
            "draft",
            "label",
            "merge_when_pipeline_succeeds",
            "milestone",
            "remove_source_branch",
            "target",
            "target_project",
            "title",
            "unassign",
            "unlabel",
        ],
    ),
    ("ci", &["input", "skip", "variable"]),
    ("integrations", &["skip_ci"]),
];

const NAMESPACE_ALIASES: &[(&str, &str)] = &[("mr", "merge_request")];

/// Push options, keyed by namespace and then key.
///
/// A bare option such as `ci.skip` is stored with the value `"true"`.
/// Repeated options accumulate, so `ci.variable` may carry several values.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PushOptions {
    options: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl PushOptions {
    pub fn parse<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();

        for option in raw {
            let option = option.as_ref().trim();
            let (key, value) = match option.split_once('=') {
                Some((key, value)) => (key, value),
                None => (option, "true"),
            };
            let (namespace, key) = match key.split_once('.') {
                Some(parts) => parts,
                None => continue,
            };
            let namespace = NAMESPACE_ALIASES
                .iter()
                .find(|(alias, _)| *alias == namespace)
                .map(|(_, namespace)| *namespace)
                .unwrap_or(namespace);

            let valid = VALID_OPTIONS
                .iter()
                .any(|(ns, keys)| *ns == namespace && keys.contains(&key));
            if !valid {
                continue;
            }

            options
                .options
                .entry(namespace.to_string())
                .or_default()
                .entry(key.to_string())
                .or_default()
                .push(value.to_string());
        }

        options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&[String]> {
        self.options
            .get(namespace)
            .and_then(|keys| keys.get(key))
            .map(Vec::as_slice)
    }

    /// Returns true if integrations should not trigger CI for this push,
    /// either through `ci.skip` or `integrations.skip_ci`.
    pub fn skip_ci(&self) -> bool {
        self.get("ci", "skip").is_some() || self.get("integrations", "skip_ci").is_some()
    }

    /// The `ci.variable=KEY=VALUE` options, in the order they were given.
    /// Values without a key are ignored.
    pub fn ci_variables(&self) -> Vec<(String, String)> {
        self.get("ci", "variable")
            .unwrap_or_default()
            .iter()
            .filter_map(|variable| variable.split_once('='))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }
}
