//! Docker tag versioning strategies
//!
//! Docker images carry their version in the tag. Teams follow one of a few
//! naming conventions:
//! - `42` - increasing integer tags
//! - `v1.2.3` - semver somewhere in the tag
//! - `master-h120.abcdef` - branch, build job and commit
//! - `myapp-1.0.42-h120.abcdef` - semver, build job and commit

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::artifact::strategies::parse_version;
use crate::artifact::versioning::{VersioningStrategy, order_by_key};

static INCREASING_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").unwrap());

static SEMVER_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+\.\d+\.\d+(?:-rc\.\d+)?)").unwrap());

static BRANCH_JOB_COMMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+-h(\d+)\.(\w+)$").unwrap());

static SEMVER_JOB_COMMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:.*?-)?v?(\d+\.\d+\.\d+(?:-rc\.\d+)?)-h(\d+)\.(\w+)$").unwrap()
});

/// Tag naming convention used to order docker tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagVersionStrategy {
    /// Tag is an integer, higher is newer
    IncreasingTag,
    /// Tag contains a semantic version
    SemverTag,
    /// `<branch>-h<job>.<commit>`, ordered by job
    BranchJobCommitByJob,
    /// `<prefix>-<semver>-h<job>.<commit>`, ordered by job
    SemverJobCommitByJob,
    /// `<prefix>-<semver>-h<job>.<commit>`, ordered by semver then job
    SemverJobCommitBySemver,
}

/// Parsed parts of a job/commit tag
#[derive(Debug, PartialEq, Eq)]
struct JobCommitTag {
    semver: Option<Version>,
    job: u64,
    commit: String,
}

impl TagVersionStrategy {
    fn encodes_job_and_commit(&self) -> bool {
        matches!(
            self,
            TagVersionStrategy::BranchJobCommitByJob
                | TagVersionStrategy::SemverJobCommitByJob
                | TagVersionStrategy::SemverJobCommitBySemver
        )
    }

    fn parse_job_commit(&self, tag: &str) -> Option<JobCommitTag> {
        match self {
            TagVersionStrategy::BranchJobCommitByJob => {
                let captures = BRANCH_JOB_COMMIT_RE.captures(tag)?;
                Some(JobCommitTag {
                    semver: None,
                    job: captures[1].parse().ok()?,
                    commit: captures[2].to_string(),
                })
            }
            TagVersionStrategy::SemverJobCommitByJob
            | TagVersionStrategy::SemverJobCommitBySemver => {
                let captures = SEMVER_JOB_COMMIT_RE.captures(tag)?;
                Some(JobCommitTag {
                    semver: parse_version(&captures[1]),
                    job: captures[2].parse().ok()?,
                    commit: captures[3].to_string(),
                })
            }
            TagVersionStrategy::IncreasingTag | TagVersionStrategy::SemverTag => None,
        }
    }
}

/// Orders docker tags according to a [`TagVersionStrategy`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DockerVersioningStrategy {
    pub strategy: TagVersionStrategy,
}

impl DockerVersioningStrategy {
    pub fn new(strategy: TagVersionStrategy) -> Self {
        Self { strategy }
    }
}

impl VersioningStrategy for DockerVersioningStrategy {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        let name = self.name();
        match self.strategy {
            TagVersionStrategy::IncreasingTag => {
                let key = |tag: &str| -> Option<u64> {
                    INCREASING_TAG_RE.captures(tag)?[1].parse().ok()
                };
                order_by_key(name, a, b, key(a), key(b))
            }
            TagVersionStrategy::SemverTag => {
                let key = |tag: &str| -> Option<Version> {
                    parse_version(&SEMVER_TAG_RE.captures(tag)?[1])
                };
                order_by_key(name, a, b, key(a), key(b))
            }
            TagVersionStrategy::BranchJobCommitByJob | TagVersionStrategy::SemverJobCommitByJob => {
                let key = |tag: &str| self.strategy.parse_job_commit(tag).map(|t| t.job);
                order_by_key(name, a, b, key(a), key(b))
            }
            TagVersionStrategy::SemverJobCommitBySemver => {
                let key = |tag: &str| {
                    self.strategy
                        .parse_job_commit(tag)
                        .map(|t| (t.semver, t.job))
                };
                order_by_key(name, a, b, key(a), key(b))
            }
        }
    }

    fn describes_build(&self) -> bool {
        self.strategy.encodes_job_and_commit()
    }

    fn describes_commit(&self) -> bool {
        self.strategy.encodes_job_and_commit()
    }

    fn build_number(&self, version: &str) -> Option<u64> {
        self.strategy.parse_job_commit(version).map(|t| t.job)
    }

    fn commit(&self, version: &str) -> Option<String> {
        self.strategy.parse_job_commit(version).map(|t| t.commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TagVersionStrategy::IncreasingTag, "9", "10", Ordering::Less)]
    #[case(TagVersionStrategy::IncreasingTag, "10", "latest", Ordering::Greater)]
    #[case(TagVersionStrategy::SemverTag, "v1.10.0", "v1.9.0", Ordering::Greater)]
    #[case(TagVersionStrategy::SemverTag, "app-1.0.0", "app-1.0.1", Ordering::Less)]
    #[case(TagVersionStrategy::BranchJobCommitByJob, "master-h5.aaa", "master-h12.bbb", Ordering::Less)]
    #[case(
        TagVersionStrategy::SemverJobCommitByJob,
        "myapp-1.0.43-h121.ghijkl",
        "myapp-1.0.42-h120.abcdef",
        Ordering::Greater
    )]
    #[case(
        TagVersionStrategy::SemverJobCommitByJob,
        "myapp-2.0.0-h100.abcdef",
        "myapp-1.0.0-h101.abcdef",
        Ordering::Less
    )]
    #[case(
        TagVersionStrategy::SemverJobCommitBySemver,
        "myapp-2.0.0-h100.abcdef",
        "myapp-1.0.0-h101.abcdef",
        Ordering::Greater
    )]
    #[case(
        TagVersionStrategy::SemverJobCommitBySemver,
        "v1.12.3-rc.1-h1196.49b8dc5",
        "v1.12.3-h1190.49b8dc5",
        Ordering::Less
    )]
    #[case(
        TagVersionStrategy::SemverJobCommitByJob,
        "myapp-1.0.0-h1.abc",
        "latest",
        Ordering::Greater
    )]
    fn compare_returns_expected(
        #[case] strategy: TagVersionStrategy,
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: Ordering,
    ) {
        let strategy = DockerVersioningStrategy::new(strategy);

        assert_eq!(strategy.compare(a, b), expected);
        assert_eq!(strategy.compare(b, a), expected.reverse());
    }

    #[rstest]
    #[case(TagVersionStrategy::SemverJobCommitByJob, "myapp-1.0.42-h120.abcdef", Some(120), Some("abcdef"))]
    #[case(TagVersionStrategy::SemverJobCommitBySemver, "v1.12.3-rc.1-h1196.49b8dc5", Some(1196), Some("49b8dc5"))]
    #[case(TagVersionStrategy::BranchJobCommitByJob, "master-h5.blah", Some(5), Some("blah"))]
    #[case(TagVersionStrategy::SemverJobCommitByJob, "myapp-1.0.42", None, None)]
    #[case(TagVersionStrategy::SemverJobCommitByJob, "", None, None)]
    #[case(TagVersionStrategy::SemverTag, "myapp-1.0.42-h120.abcdef", None, None)]
    fn metadata_extraction_fails_soft(
        #[case] strategy: TagVersionStrategy,
        #[case] tag: &str,
        #[case] build: Option<u64>,
        #[case] commit: Option<&str>,
    ) {
        let strategy = DockerVersioningStrategy::new(strategy);

        assert_eq!(strategy.build_number(tag), build);
        assert_eq!(strategy.commit(tag).as_deref(), commit);
    }

    #[rstest]
    #[case(TagVersionStrategy::IncreasingTag, false)]
    #[case(TagVersionStrategy::SemverTag, false)]
    #[case(TagVersionStrategy::BranchJobCommitByJob, true)]
    #[case(TagVersionStrategy::SemverJobCommitByJob, true)]
    #[case(TagVersionStrategy::SemverJobCommitBySemver, true)]
    fn describes_build_and_commit_only_for_job_commit_tags(
        #[case] strategy: TagVersionStrategy,
        #[case] expected: bool,
    ) {
        let strategy = DockerVersioningStrategy::new(strategy);

        assert_eq!(strategy.describes_build(), expected);
        assert_eq!(strategy.describes_commit(), expected);
    }

    #[test]
    fn sort_newest_first_orders_tags_by_job() {
        let strategy = DockerVersioningStrategy::new(TagVersionStrategy::SemverJobCommitByJob);
        let mut tags = vec![
            "myapp-1.0.41-h119.aaaaaa".to_string(),
            "latest".to_string(),
            "myapp-1.0.43-h121.ghijkl".to_string(),
            "myapp-1.0.42-h120.abcdef".to_string(),
        ];

        strategy.sort_newest_first(&mut tags);

        assert_eq!(
            tags,
            vec![
                "myapp-1.0.43-h121.ghijkl",
                "myapp-1.0.42-h120.abcdef",
                "myapp-1.0.41-h119.aaaaaa",
                "latest",
            ]
        );
    }
}
