//! Semantic version ordering

use std::cmp::Ordering;

use semver::Version;

use crate::artifact::versioning::{VersioningStrategy, order_by_key};

/// Orders versions by semantic version precedence
///
/// Accepts a leading `v` and partial versions. Encodes neither build nor commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SemverVersioningStrategy;

impl VersioningStrategy for SemverVersioningStrategy {
    fn name(&self) -> &'static str {
        "semver"
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        order_by_key(self.name(), a, b, parse_version(a), parse_version(b))
    }

    fn describes_build(&self) -> bool {
        false
    }

    fn describes_commit(&self) -> bool {
        false
    }
}

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// Strips a leading 'v' and pads partial versions with zeros.
///
/// Examples:
/// - "1" -> Version(1, 0, 0)
/// - "v1.2" -> Version(1, 2, 0)
/// - "1.2.3-rc.1" -> Version(1, 2, 3-rc.1)
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.strip_prefix('v').unwrap_or(version);
    let parts: Vec<&str> = version.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => version.to_string(),
    };
    Version::parse(&normalized).ok()
}
