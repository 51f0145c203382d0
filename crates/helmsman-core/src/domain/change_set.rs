//! Categorized commit data produced by the classification pipeline.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::version::BumpKind;

/// Path fragments that mark a changed file as security-sensitive.
pub const SECURITY_PATH_MARKERS: &[&str] = &[
    "auth",
    "crypto",
    "security",
    "secret",
    "password",
    "token",
    "permission",
    "credential",
    ".pem",
    ".key",
];

/// Category assigned to a commit by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitCategory {
    Breaking,
    Feature,
    Fix,
    Perf,
    Other,
}

/// A single classified commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCommit {
    pub sha: String,
    pub subject: String,
    pub category: CommitCategory,
    /// Conventional-commit scope, if any (e.g. `api` in `feat(api): ...`).
    #[serde(default)]
    pub scope: Option<String>,
    /// Paths touched by the commit.
    #[serde(default)]
    pub files: Vec<String>,
}

impl ChangeCommit {
    pub fn new(sha: impl Into<String>, subject: impl Into<String>, category: CommitCategory) -> Self {
        Self {
            sha: sha.into(),
            subject: subject.into(),
            category,
            scope: None,
            files: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }
}

/// Immutable set of categorized commits for one release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: String,
    pub commits: Vec<ChangeCommit>,
}

impl ChangeSet {
    pub fn new(commits: Vec<ChangeCommit>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            commits,
        }
    }

    /// Number of commits in `category`.
    pub fn count(&self, category: CommitCategory) -> usize {
        self.commits
            .iter()
            .filter(|c| c.category == category)
            .count()
    }

    pub fn total(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn has_breaking_changes(&self) -> bool {
        self.count(CommitCategory::Breaking) > 0
    }

    /// Distinct paths touched across all commits.
    pub fn files_changed(&self) -> usize {
        self.distinct_files().len()
    }

    /// Distinct changed paths that look security-sensitive.
    pub fn security_changes(&self) -> usize {
        self.distinct_files()
            .into_iter()
            .filter(|path| is_security_sensitive(path))
            .count()
    }

    /// The most frequent commit scope, ties broken by name. Falls back to
    /// the most frequent top-level path component, then the empty string.
    pub fn dominant_scope(&self) -> String {
        let scopes = self.commits.iter().filter_map(|c| c.scope.as_deref());
        if let Some(scope) = most_frequent(scopes) {
            return scope;
        }
        let components = self
            .distinct_files()
            .into_iter()
            .filter_map(|path| path.split('/').next().filter(|s| !s.is_empty()));
        most_frequent(components).unwrap_or_default()
    }

    pub fn bump_kind(&self) -> BumpKind {
        BumpKind::from_change_set(self)
    }

    fn distinct_files(&self) -> BTreeSet<&str> {
        self.commits
            .iter()
            .flat_map(|c| c.files.iter().map(String::as_str))
            .collect()
    }
}

/// Case-insensitive match against [`SECURITY_PATH_MARKERS`].
pub fn is_security_sensitive(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    SECURITY_PATH_MARKERS.iter().any(|m| lower.contains(m))
}

fn most_frequent<'a>(items: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    // BTreeMap iterates by name; only a strictly larger count replaces the
    // current best, so ties keep the alphabetically first name.
    counts
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, (name, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((name, n)),
        })
        .map(|(name, _)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChangeSet {
        ChangeSet::new(vec![
            ChangeCommit::new("a1", "feat(api)!: drop v1 routes", CommitCategory::Breaking)
                .with_scope("api")
                .with_files(["api/routes.rs", "api/auth/session.rs"]),
            ChangeCommit::new("a2", "feat(api): add pagination", CommitCategory::Feature)
                .with_scope("api")
                .with_files(["api/routes.rs"]),
            ChangeCommit::new("a3", "fix(cli): exit code", CommitCategory::Fix)
                .with_scope("cli")
                .with_files(["cli/main.rs"]),
            ChangeCommit::new("a4", "chore: bump deps", CommitCategory::Other)
                .with_files(["Cargo.lock"]),
        ])
    }

    #[test]
    fn test_category_counts() {
        let cs = sample();
        assert_eq!(cs.total(), 4);
        assert_eq!(cs.count(CommitCategory::Breaking), 1);
        assert_eq!(cs.count(CommitCategory::Feature), 1);
        assert_eq!(cs.count(CommitCategory::Perf), 0);
        assert!(cs.has_breaking_changes());
    }

    #[test]
    fn test_files_are_distinct() {
        let cs = sample();
        assert_eq!(cs.files_changed(), 4);
        assert_eq!(cs.security_changes(), 1);
    }

    #[test]
    fn test_dominant_scope_prefers_commit_scopes() {
        assert_eq!(sample().dominant_scope(), "api");
    }

    #[test]
    fn test_dominant_scope_tie_breaks_by_name() {
        let cs = ChangeSet::new(vec![
            ChangeCommit::new("b1", "fix", CommitCategory::Fix).with_scope("zeta"),
            ChangeCommit::new("b2", "fix", CommitCategory::Fix).with_scope("alpha"),
        ]);
        assert_eq!(cs.dominant_scope(), "alpha");
    }

    #[test]
    fn test_dominant_scope_falls_back_to_paths() {
        let cs = ChangeSet::new(vec![ChangeCommit::new("c1", "tweak", CommitCategory::Other)
            .with_files(["docs/a.md", "docs/b.md", "src/lib.rs"])]);
        assert_eq!(cs.dominant_scope(), "docs");

        let empty = ChangeSet::new(vec![]);
        assert_eq!(empty.dominant_scope(), "");
    }

    #[test]
    fn test_security_markers_case_insensitive() {
        assert!(is_security_sensitive("src/Crypto/aes.rs"));
        assert!(is_security_sensitive("deploy/server.PEM"));
        assert!(!is_security_sensitive("src/parser.rs"));
    }
}
