use std::time::Duration;

use async_trait::async_trait;
use cvm_backend::{CvmError, LatestVersionSource, Version};
use log::debug;
use serde::Deserialize;

const GITHUB_API: &str = "https://api.github.com";

#[derive(Deserialize)]
struct GitHubRelease {
    tag_name: String,
}

/// Asks GitHub for the repository's latest published release.
#[derive(Debug, Clone)]
pub struct GithubLatestSource {
    client: reqwest::Client,
    repo: String,
    api_base: String,
}

impl GithubLatestSource {
    pub fn new(repo: impl Into<String>, timeout: Duration) -> Result<Self, CvmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("cvm/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CvmError::network_from("client setup", e))?;

        Ok(Self {
            client,
            repo: repo.into(),
            api_base: GITHUB_API.to_string(),
        })
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl LatestVersionSource for GithubLatestSource {
    async fn latest_version(&self) -> Result<Version, CvmError> {
        if self.repo.is_empty() {
            return Err(CvmError::network(
                "latest release lookup",
                "no release repository configured (set latest_release_repo)",
            ));
        }

        let url = format!(
            "{}/repos/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repo
        );
        debug!("Fetching {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CvmError::network_from("latest release lookup", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(CvmError::network(
                "latest release lookup",
                format!("HTTP {status}{body_snippet}"),
            ));
        }

        let release: GitHubRelease = response
            .json()
            .await
            .map_err(|e| CvmError::serialization_from("release response", e))?;
        parse_release_tag(&release.tag_name)
    }
}

/// Convert a release tag such as `v2.74.0` into a version. Pre-release and
/// build suffixes are dropped.
pub fn parse_release_tag(tag: &str) -> Result<Version, CvmError> {
    let trimmed = tag.trim();
    let raw = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let parsed = semver::Version::parse(raw)
        .map_err(|e| CvmError::serialization_from("release tag", format!("{tag}: {e}")))?;

    let component = |value: u64| {
        u32::try_from(value).map_err(|_| {
            CvmError::serialization_from("release tag", format!("{tag}: component too large"))
        })
    };
    Ok(Version::new(
        component(parsed.major)?,
        component(parsed.minor)?,
        component(parsed.patch)?,
    ))
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cvm_backend::{CvmError, LatestVersionSource, Version};

    use super::{GithubLatestSource, parse_release_tag, response_snippet};

    #[test]
    fn parse_release_tag_strips_prefix_and_suffix() {
        assert_eq!(
            parse_release_tag("v2.74.0").expect("valid tag"),
            Version::new(2, 74, 0)
        );
        assert_eq!(
            parse_release_tag("1.2.3-rc.1").expect("valid tag"),
            Version::new(1, 2, 3)
        );
    }

    #[test]
    fn parse_release_tag_rejects_garbage() {
        assert!(matches!(
            parse_release_tag("nightly"),
            Err(CvmError::Serialization { .. })
        ));
        assert!(parse_release_tag("v5000000000.0.0").is_err());
    }

    #[test]
    fn response_snippet_limits_length() {
        assert_eq!(response_snippet("", 10), "");
        assert_eq!(response_snippet("abcdef", 3), ": abc");
    }

    #[tokio::test]
    async fn missing_repository_is_reported_without_a_request() {
        let source = GithubLatestSource::new("", Duration::from_secs(1))
            .expect("client should build");
        assert!(matches!(
            source.latest_version().await,
            Err(CvmError::Network { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_network_error() {
        let source = GithubLatestSource::new("cvm-rs/cli", Duration::from_secs(2))
            .expect("client should build")
            .with_api_base("http://127.0.0.1:9/");
        assert!(matches!(
            source.latest_version().await,
            Err(CvmError::Network { .. })
        ));
    }
}
