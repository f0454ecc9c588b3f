//! Versioning strategy abstraction for artifact families

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::artifact::strategies::{
    DockerVersioningStrategy, SemverVersioningStrategy, TagVersionStrategy,
};

/// Trait for family-specific version ordering and metadata extraction
///
/// Each artifact family has its own versioning conventions:
/// - semver: `1.2.3`, `v2.0.0-rc.1`
/// - docker tags: `master-h120.abcdef`, `myapp-1.0.42-h120.abcdef`
pub trait VersioningStrategy: Send + Sync {
    /// Name used by publishers to declare support for this strategy
    fn name(&self) -> &'static str;

    /// Compare two version strings, newer versions compare greater
    ///
    /// Must be a strict total order: two distinct strings never compare equal.
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Whether version strings under this strategy encode a build number
    fn describes_build(&self) -> bool;

    /// Whether version strings under this strategy encode a commit
    fn describes_commit(&self) -> bool;

    /// Extract the build number, `None` when the version does not match
    fn build_number(&self, _version: &str) -> Option<u64> {
        None
    }

    /// Extract the commit, `None` when the version does not match
    fn commit(&self, _version: &str) -> Option<String> {
        None
    }

    /// Sort versions most-recent-first
    fn sort_newest_first(&self, versions: &mut [String]) {
        versions.sort_by(|a, b| self.compare(b, a));
    }
}

static SEMVER: SemverVersioningStrategy = SemverVersioningStrategy;

/// Versioning strategy selected by an artifact
///
/// This is the serializable form carried by [`DeliveryArtifact`]; it
/// delegates every operation to the concrete strategy.
///
/// [`DeliveryArtifact`]: crate::artifact::types::DeliveryArtifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Versioning {
    Semver,
    Docker(DockerVersioningStrategy),
}

impl Versioning {
    pub fn semver() -> Self {
        Versioning::Semver
    }

    pub fn docker(strategy: TagVersionStrategy) -> Self {
        Versioning::Docker(DockerVersioningStrategy::new(strategy))
    }

    pub fn strategy(&self) -> &dyn VersioningStrategy {
        match self {
            Versioning::Semver => &SEMVER,
            Versioning::Docker(docker) => docker,
        }
    }
}

impl VersioningStrategy for Versioning {
    fn name(&self) -> &'static str {
        self.strategy().name()
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        self.strategy().compare(a, b)
    }

    fn describes_build(&self) -> bool {
        self.strategy().describes_build()
    }

    fn describes_commit(&self) -> bool {
        self.strategy().describes_commit()
    }

    fn build_number(&self, version: &str) -> Option<u64> {
        self.strategy().build_number(version)
    }

    fn commit(&self, version: &str) -> Option<String> {
        self.strategy().commit(version)
    }
}

/// Order two version strings by their parsed keys
///
/// - A version that parses ranks above one that does not.
/// - Two unparseable versions compare by raw string.
/// - Distinct strings with equal keys are a tie; it is logged and broken by
///   raw string so the order stays total.
pub(crate) fn order_by_key<K: Ord>(
    strategy: &str,
    a: &str,
    b: &str,
    key_a: Option<K>,
    key_b: Option<K>,
) -> Ordering {
    match (key_a, key_b) {
        (Some(x), Some(y)) => match x.cmp(&y) {
            Ordering::Equal if a != b => {
                warn!(
                    "Versions {} and {} tie under the {} strategy, ordering by raw string",
                    a, b, strategy
                );
                a.cmp(b)
            }
            ordering => ordering,
        },
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
