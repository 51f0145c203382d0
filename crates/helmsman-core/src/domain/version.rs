//! Version bump derivation over `semver::Version`.

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};

use super::change_set::{ChangeSet, CommitCategory};

/// The kind of version increment a release calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpKind {
    None,
    Patch,
    Minor,
    Major,
}

impl BumpKind {
    /// Breaking → major, feature → minor, fix/perf → patch, otherwise none.
    pub fn from_change_set(change_set: &ChangeSet) -> Self {
        if change_set.count(CommitCategory::Breaking) > 0 {
            Self::Major
        } else if change_set.count(CommitCategory::Feature) > 0 {
            Self::Minor
        } else if change_set.count(CommitCategory::Fix) > 0
            || change_set.count(CommitCategory::Perf) > 0
        {
            Self::Patch
        } else {
            Self::None
        }
    }

    /// Apply this bump to `current`. Pre-release and build metadata are
    /// cleared by every real bump. `None` when the bumped component would
    /// overflow.
    pub fn apply(self, current: &Version) -> Option<Version> {
        let mut next = current.clone();
        match self {
            Self::None => return Some(next),
            Self::Major => {
                next.major = next.major.checked_add(1)?;
                next.minor = 0;
                next.patch = 0;
            }
            Self::Minor => {
                next.minor = next.minor.checked_add(1)?;
                next.patch = 0;
            }
            Self::Patch => next.patch = next.patch.checked_add(1)?,
        }
        next.pre = Prerelease::EMPTY;
        next.build = BuildMetadata::EMPTY;
        Some(next)
    }
}

impl std::fmt::Display for BumpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change_set::ChangeCommit;

    fn cs(categories: &[CommitCategory]) -> ChangeSet {
        ChangeSet::new(
            categories
                .iter()
                .enumerate()
                .map(|(i, c)| ChangeCommit::new(format!("c{i}"), "msg", *c))
                .collect(),
        )
    }

    #[test]
    fn test_breaking_wins() {
        let set = cs(&[
            CommitCategory::Breaking,
            CommitCategory::Feature,
            CommitCategory::Feature,
            CommitCategory::Feature,
        ]);
        assert_eq!(BumpKind::from_change_set(&set), BumpKind::Major);
    }

    #[test]
    fn test_feature_and_fix() {
        assert_eq!(
            BumpKind::from_change_set(&cs(&[CommitCategory::Fix, CommitCategory::Feature])),
            BumpKind::Minor
        );
        assert_eq!(
            BumpKind::from_change_set(&cs(&[CommitCategory::Perf])),
            BumpKind::Patch
        );
        assert_eq!(
            BumpKind::from_change_set(&cs(&[CommitCategory::Other])),
            BumpKind::None
        );
    }

    #[test]
    fn test_apply() {
        let v = Version::parse("1.4.2").unwrap();
        assert_eq!(BumpKind::Major.apply(&v), Some(Version::parse("2.0.0").unwrap()));
        assert_eq!(BumpKind::Minor.apply(&v), Some(Version::parse("1.5.0").unwrap()));
        assert_eq!(BumpKind::Patch.apply(&v), Some(Version::parse("1.4.3").unwrap()));
        assert_eq!(BumpKind::None.apply(&v), Some(v.clone()));
    }

    #[test]
    fn test_apply_clears_prerelease() {
        let v = Version::parse("1.0.0-rc.1+build.7").unwrap();
        assert_eq!(BumpKind::Patch.apply(&v), Some(Version::parse("1.0.1").unwrap()));
    }

    #[test]
    fn test_apply_overflow_is_none() {
        let v = Version::new(u64::MAX, u64::MAX, u64::MAX);
        assert_eq!(BumpKind::Major.apply(&v), None);
        assert_eq!(BumpKind::Minor.apply(&v), None);
        assert_eq!(BumpKind::Patch.apply(&v), None);
        assert_eq!(BumpKind::None.apply(&v), Some(v.clone()));

        let v = Version::new(1, u64::MAX, 3);
        assert_eq!(BumpKind::Major.apply(&v), Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn test_bump_ordering() {
        assert!(BumpKind::Major > BumpKind::Minor);
        assert!(BumpKind::Patch > BumpKind::None);
    }
}
