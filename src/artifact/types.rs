//! Common types for artifacts and their versions

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::versioning::Versioning;

/// Type name of an artifact family, e.g. `docker`
///
/// Always stored lowercase so that source-reported type strings compare
/// equal regardless of how the source capitalizes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ArtifactType(String);

impl ArtifactType {
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ArtifactType {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for ArtifactType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ArtifactType> for String {
    fn from(value: ArtifactType) -> Self {
        value.0
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which the version history of an artifact is kept
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactKey {
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
}

impl ArtifactKey {
    pub fn new(name: &str, artifact_type: impl Into<ArtifactType>) -> Self {
        Self {
            name: name.to_string(),
            artifact_type: artifact_type.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.artifact_type, self.name)
    }
}

/// An artifact registered by a delivery config
///
/// Identity is (name, type, reference, delivery config name). The delivery
/// config is referenced by name and resolved through a lookup. Repositories
/// deduplicate on identity only; derived equality compares every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryArtifact {
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub delivery_config_name: Option<String>,
    pub versioning_strategy: Versioning,
}

impl DeliveryArtifact {
    pub fn new(name: &str, artifact_type: impl Into<ArtifactType>, versioning: Versioning) -> Self {
        Self {
            name: name.to_string(),
            artifact_type: artifact_type.into(),
            reference: name.to_string(),
            delivery_config_name: None,
            versioning_strategy: versioning,
        }
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = reference.to_string();
        self
    }

    pub fn with_delivery_config(mut self, delivery_config_name: &str) -> Self {
        self.delivery_config_name = Some(delivery_config_name.to_string());
        self
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            name: self.name.clone(),
            artifact_type: self.artifact_type.clone(),
        }
    }
}

impl fmt::Display for DeliveryArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.delivery_config_name {
            Some(config) => write!(f, "{}:{} ({})", self.artifact_type, self.name, config),
            None => write!(f, "{}:{}", self.artifact_type, self.name),
        }
    }
}

/// An artifact observation reported by a source
///
/// Never stored as-is; only used to derive an [`ArtifactVersion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedArtifact {
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    #[serde(default)]
    pub reference: String,
    pub version: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl PublishedArtifact {
    pub fn new(name: &str, artifact_type: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            reference: name.to_string(),
            version: version.to_string(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Type as reported by the source, normalized to lowercase
    pub fn normalized_type(&self) -> ArtifactType {
        ArtifactType::new(&self.artifact_type)
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            name: self.name.clone(),
            artifact_type: self.normalized_type(),
        }
    }
}

/// Coarse classification of a version's maturity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    Release,
    Candidate,
    Snapshot,
    Unknown,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Release => "RELEASE",
            ReleaseStatus::Candidate => "CANDIDATE",
            ReleaseStatus::Snapshot => "SNAPSHOT",
            ReleaseStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::str::FromStr for ReleaseStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RELEASE" | "FINAL" => Ok(ReleaseStatus::Release),
            "CANDIDATE" | "PRERELEASE" => Ok(ReleaseStatus::Candidate),
            "SNAPSHOT" => Ok(ReleaseStatus::Snapshot),
            "UNKNOWN" => Ok(ReleaseStatus::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build information encoded in a version string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub id: u64,
}

/// Source control information encoded in a version string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitMetadata {
    pub commit: String,
}

/// A stored version of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    pub artifact: ArtifactKey,
    pub version: String,
    pub release_status: ReleaseStatus,
    pub build: Option<BuildMetadata>,
    pub git: Option<GitMetadata>,
    pub stored_at: DateTime<Utc>,
}

impl ArtifactVersion {
    pub fn new(artifact: ArtifactKey, version: &str, release_status: ReleaseStatus) -> Self {
        Self {
            artifact,
            version: version.to_string(),
            release_status,
            build: None,
            git: None,
            stored_at: Utc::now(),
        }
    }

    pub fn with_build(mut self, build: Option<BuildMetadata>) -> Self {
        self.build = build;
        self
    }

    pub fn with_git(mut self, git: Option<GitMetadata>) -> Self {
        self.git = git;
        self
    }
}

/// Aggregate owning a set of artifacts and the identity used to fetch them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfig {
    pub name: String,
    #[serde(default)]
    pub application: String,
    pub service_account: String,
    #[serde(default)]
    pub artifacts: Vec<DeliveryArtifact>,
}

impl DeliveryConfig {
    pub fn new(name: &str, application: &str, service_account: &str) -> Self {
        Self {
            name: name.to_string(),
            application: application.to_string(),
            service_account: service_account.to_string(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: DeliveryArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Fill in back-references and default references on every artifact
    ///
    /// Artifacts read from a manifest usually omit both; the config name is
    /// authoritative over whatever the artifact carried.
    pub fn normalized(mut self) -> Self {
        for artifact in &mut self.artifacts {
            artifact.delivery_config_name = Some(self.name.clone());
            if artifact.reference.is_empty() {
                artifact.reference = artifact.name.clone();
            }
        }
        self
    }
}
