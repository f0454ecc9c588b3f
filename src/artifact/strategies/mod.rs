//! Concrete versioning strategies

mod docker;
mod semver;

pub use self::docker::{DockerVersioningStrategy, TagVersionStrategy};
pub use self::semver::{SemverVersioningStrategy, parse_version};
