use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use cvm_backend::{CvmError, Installer, Version};
use cvm_platform::make_executable;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};

pub const DEFAULT_RETRY_DELAYS_SECS: [u64; 3] = [0, 2, 5];
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Downloads a release binary from a URL template and drops it into place.
///
/// The template may use `{repo}`, `{version}`, `{os}`, `{arch}` and
/// `{binary}` placeholders.
#[derive(Debug, Clone)]
pub struct HttpInstaller {
    client: reqwest::Client,
    url_template: String,
    repo: String,
    binary_name: String,
    retry_delays_secs: Vec<u64>,
    expected_sha256: Option<String>,
}

impl HttpInstaller {
    pub fn new(
        url_template: impl Into<String>,
        binary_name: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, CvmError> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(connect_timeout)
            .user_agent(format!("cvm/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CvmError::network_from("client setup", e))?;

        Ok(Self {
            client,
            url_template: url_template.into(),
            repo: String::new(),
            binary_name: binary_name.into(),
            retry_delays_secs: DEFAULT_RETRY_DELAYS_SECS.to_vec(),
            expected_sha256: None,
        })
    }

    #[must_use]
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    #[must_use]
    pub fn with_retry_delays(mut self, delays_secs: Vec<u64>) -> Self {
        self.retry_delays_secs = delays_secs;
        self
    }

    #[must_use]
    pub fn with_sha256(mut self, expected: Option<String>) -> Self {
        self.expected_sha256 = expected.map(|hash| hash.trim().to_ascii_lowercase());
        self
    }

    pub fn download_url(&self, version: &Version) -> String {
        self.url_template
            .replace("{repo}", &self.repo)
            .replace("{version}", &version.to_string())
            .replace("{os}", std::env::consts::OS)
            .replace("{arch}", std::env::consts::ARCH)
            .replace("{binary}", &self.binary_name)
    }

    async fn download_with_retries(&self, url: &str) -> Result<Vec<u8>, CvmError> {
        let mut last_error = None;

        for delay_secs in &self.retry_delays_secs {
            if *delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.download_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => {
                    warn!("Download of {url} failed: {error}");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CvmError::install_failed("download", "no download attempts")))
    }

    async fn download_once(&self, url: &str) -> Result<Vec<u8>, CvmError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CvmError::network_from("download", e))?;

        if !response.status().is_success() {
            return Err(CvmError::install_failed(
                "download",
                format!("HTTP {} for {url}", response.status()),
            ));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| CvmError::network_from("download", e))
    }
}

#[async_trait]
impl Installer for HttpInstaller {
    async fn install(&self, version: &Version, destination: &Path) -> Result<(), CvmError> {
        let url = self.download_url(version);
        info!("Downloading {version} from {url}");

        let bytes = self.download_with_retries(&url).await?;
        if let Some(expected) = &self.expected_sha256 {
            verify_checksum(&bytes, expected)?;
        }

        place_binary(&bytes, destination)
            .map_err(|e| CvmError::install_failed("write", e.to_string()))?;
        debug!("Installed {version} to {}", destination.display());
        Ok(())
    }
}

fn verify_checksum(bytes: &[u8], expected_sha256: &str) -> Result<(), CvmError> {
    let actual_sha256 = format!("{:x}", Sha256::digest(bytes));
    if actual_sha256.eq_ignore_ascii_case(expected_sha256) {
        return Ok(());
    }

    Err(CvmError::install_failed(
        "checksum",
        format!("expected {expected_sha256}, got {actual_sha256}"),
    ))
}

/// Write to a temp file beside `destination`, mark it executable, then
/// rename over any previous install.
fn place_binary(bytes: &[u8], destination: &Path) -> std::io::Result<()> {
    let parent = destination.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "destination has no parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(parent)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    make_executable(staged.path())?;
    staged.persist(destination).map_err(|error| error.error)?;
    Ok(())
}
