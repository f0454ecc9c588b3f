//! Docker Registry HTTP API v2 client

#[cfg(test)]
use mockall::automock;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::artifact::error::RegistryError;

/// Default base URL for the Docker registry
pub const DEFAULT_BASE_URL: &str = "https://registry-1.docker.io";

/// Header carrying the service account the request is made on behalf of
const SERVICE_ACCOUNT_HEADER: &str = "X-Service-Account";

/// Header carrying the content digest of a manifest
const DIGEST_HEADER: &str = "Docker-Content-Digest";

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
    application/vnd.docker.distribution.manifest.list.v2+json, \
    application/vnd.docker.distribution.manifest.v2+json";

/// Response from the tags list endpoint
#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// A concrete image resolved from a repository and tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImage {
    pub repository: String,
    pub tag: String,
    pub digest: Option<String>,
}

/// Trait for looking up docker tags and images
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait DockerImageSource: Send + Sync {
    /// Lists all tags of a repository
    async fn find_tags(
        &self,
        repository: &str,
        service_account: &str,
    ) -> Result<Vec<String>, RegistryError>;

    /// Resolves a tag to a concrete image, `None` if the tag does not exist
    async fn find_image(
        &self,
        repository: &str,
        tag: &str,
        service_account: &str,
    ) -> Result<Option<DockerImage>, RegistryError>;
}

/// [`DockerImageSource`] backed by a Docker Registry v2 API
pub struct DockerRegistryClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl DockerRegistryClient {
    /// Creates a new DockerRegistryClient with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("artifact-sync")
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Sends a bearer token with every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn authorize(&self, request: RequestBuilder, service_account: &str) -> RequestBuilder {
        let request = request.header(SERVICE_ACCOUNT_HEADER, service_account);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check_status(response: &Response, repository: &str) -> Result<(), RegistryError> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(repository.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(RegistryError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            warn!(
                "Docker registry returned status {}: {}",
                status,
                response.url()
            );
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        Ok(())
    }
}

impl Default for DockerRegistryClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait::async_trait]
impl DockerImageSource for DockerRegistryClient {
    async fn find_tags(
        &self,
        repository: &str,
        service_account: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/v2/{}/tags/list", self.base_url, repository);
        debug!("Listing tags for {} from {}", repository, url);

        let response = self
            .authorize(self.client.get(&url), service_account)
            .send()
            .await?;

        Self::check_status(&response, repository)?;

        let tag_list: TagList = response.json().await.map_err(|e| {
            warn!("Failed to parse docker tags response: {}", e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        Ok(tag_list.tags.unwrap_or_default())
    }

    async fn find_image(
        &self,
        repository: &str,
        tag: &str,
        service_account: &str,
    ) -> Result<Option<DockerImage>, RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repository, tag);

        let response = self
            .authorize(self.client.head(&url), service_account)
            .header("Accept", MANIFEST_ACCEPT)
            .send()
            .await?;

        match Self::check_status(&response, repository) {
            Ok(()) => {}
            Err(RegistryError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        }

        let digest = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(Some(DockerImage {
            repository: repository.to_string(),
            tag: tag.to_string(),
            digest,
        }))
    }
}
