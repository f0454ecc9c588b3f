//! Publisher trait for fetching and describing artifacts from their source

use std::sync::LazyLock;

use regex::Regex;

use crate::artifact::error::PublisherError;
use crate::artifact::types::{
    ArtifactType, BuildMetadata, DeliveryArtifact, DeliveryConfig, GitMetadata, PublishedArtifact,
    ReleaseStatus,
};
use crate::artifact::versioning::{Versioning, VersioningStrategy};

/// Metadata key a source may use to state the release status explicitly
pub const RELEASE_STATUS_METADATA_KEY: &str = "releaseStatus";

static RELEASE_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").unwrap());

// Markers only count when they directly follow a version number
static SNAPSHOT_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d[-.](snapshot|dev)(\W|\d|$)").unwrap());

static CANDIDATE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d[-.](rc|alpha|beta)(\W|\d|$)").unwrap());

/// Trait for artifact-type-specific source access
///
/// One implementation exists per supported artifact type. The sync engine
/// picks the implementation claiming an artifact's type and uses it to:
/// - Fetch the latest version of a registered artifact from the source
/// - Turn a source observation into the canonical version that gets stored
/// - Derive release status and build/git metadata from that version
#[async_trait::async_trait]
pub trait ArtifactSourcePublisher: Send + Sync {
    /// Returns the artifact type this publisher claims
    fn supported_artifact(&self) -> ArtifactType;

    /// Returns the names of the versioning strategies this publisher understands
    fn supported_versioning_strategies(&self) -> Vec<&'static str>;

    /// Fetches the latest version of an artifact from its source
    ///
    /// # Arguments
    /// * `delivery_config` - Config owning the artifact, provides the service account
    /// * `artifact` - The registered artifact
    ///
    /// # Returns
    /// * `Ok(Some(PublishedArtifact))` - The newest artifact by the artifact's versioning strategy
    /// * `Ok(None)` - The source currently has no matching artifact
    /// * `Err(PublisherError)` - If the fetch fails
    async fn get_latest_artifact(
        &self,
        delivery_config: &DeliveryConfig,
        artifact: &DeliveryArtifact,
    ) -> Result<Option<PublishedArtifact>, PublisherError>;

    /// Canonical version string stored and compared for an observation
    fn get_full_version_string(&self, artifact: &PublishedArtifact) -> String {
        artifact.version.clone()
    }

    /// Release status of an observation, `Unknown` when there is none
    fn get_release_status(&self, artifact: Option<&PublishedArtifact>) -> ReleaseStatus {
        let Some(artifact) = artifact else {
            return ReleaseStatus::Unknown;
        };

        artifact
            .metadata
            .get(RELEASE_STATUS_METADATA_KEY)
            .and_then(|status| status.as_str())
            .and_then(|status| status.parse().ok())
            .unwrap_or_else(|| derive_release_status(&self.get_full_version_string(artifact)))
    }

    /// Build metadata, only when the versioning strategy encodes a build
    fn get_build_metadata(
        &self,
        artifact: &PublishedArtifact,
        versioning: &Versioning,
    ) -> Option<BuildMetadata> {
        if !versioning.describes_build() {
            return None;
        }
        versioning
            .build_number(&self.get_full_version_string(artifact))
            .map(|id| BuildMetadata { id })
    }

    /// Git metadata, only when the versioning strategy encodes a commit
    fn get_git_metadata(
        &self,
        artifact: &PublishedArtifact,
        versioning: &Versioning,
    ) -> Option<GitMetadata> {
        if !versioning.describes_commit() {
            return None;
        }
        versioning
            .commit(&self.get_full_version_string(artifact))
            .map(|commit| GitMetadata { commit })
    }
}

/// Classify a version string by its shape
///
/// - a number followed by `-snapshot` or `-dev` -> Snapshot
/// - a number followed by `-rc`, `-alpha` or `-beta` -> Candidate
/// - contains a plain `x.y.z` -> Release
/// - anything else -> Unknown
///
/// `.` works in place of `-` before a marker. Words such as `devtools` in an
/// image name are not markers.
pub fn derive_release_status(version: &str) -> ReleaseStatus {
    if SNAPSHOT_MARKER_RE.is_match(version) {
        ReleaseStatus::Snapshot
    } else if CANDIDATE_MARKER_RE.is_match(version) {
        ReleaseStatus::Candidate
    } else if RELEASE_VERSION_RE.is_match(version) {
        ReleaseStatus::Release
    } else {
        ReleaseStatus::Unknown
    }
}
