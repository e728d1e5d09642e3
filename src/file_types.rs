use std::{collections::BTreeSet, sync::LazyLock};

use git_push_hooks_services::FileType;
use regex::{Regex, RegexBuilder};

static PATTERNS: LazyLock<Vec<(FileType, Regex)>> = LazyLock::new(|| {
    [
        (FileType::Avatar, r"\Alogo\.(png|jpg|gif)\z", false),
        (FileType::Changelog, r"\A(changelog|history|changes|news)[^/]*\z", true),
        (FileType::Contributing, r"\Acontributing[^/]*\z", true),
        (FileType::Gitignore, r"\A\.gitignore\z", false),
        (
            FileType::IssueTemplate,
            r"\A\.gitlab/issue_templates/[^/]+\.md\z",
            false,
        ),
        (FileType::License, r"\A((un)?licen[sc]e|copying)(\.[^/]+)?\z", true),
        (
            FileType::MergeRequestTemplate,
            r"\A\.gitlab/merge_request_templates/[^/]+\.md\z",
            false,
        ),
        (FileType::Readme, r"\Areadme[^/]*\z", true),
        (FileType::RouteMap, r"\A\.gitlab/route-map\.yml\z", false),
    ]
    .into_iter()
    .map(|(file_type, pattern, case_insensitive)| {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .expect("invalid file type pattern");
        (file_type, regex)
    })
    .collect()
});

/// Maps changed paths to the well known file types they affect.
#[derive(Debug, Clone)]
pub struct FileDetector<'a> {
    ci_config_path: &'a str,
}

impl<'a> FileDetector<'a> {
    pub fn new(ci_config_path: &'a str) -> Self {
        Self { ci_config_path }
    }

    pub fn file_type(&self, path: &str) -> Option<FileType> {
        if path == self.ci_config_path {
            return Some(FileType::GitlabCi);
        }

        PATTERNS
            .iter()
            .find(|(_, regex)| regex.is_match(path))
            .map(|(file_type, _)| *file_type)
    }

    pub fn types_in_paths<'p, I>(&self, paths: I) -> BTreeSet<FileType>
    where
        I: IntoIterator<Item = &'p str>,
    {
        paths
            .into_iter()
            .filter_map(|path| self.file_type(path))
            .collect()
    }
}
