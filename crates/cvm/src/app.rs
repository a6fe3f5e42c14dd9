use std::path::PathBuf;
use std::sync::Arc;

use cvm_backend::{Installer, LatestVersionSource};
use cvm_core::{
    ActivationManager, GithubLatestSource, HistoryStore, HttpInstaller, ProfileTarget, Resolver,
    ShimWriter, ToolConfig, VersionStore,
};
use cvm_exec::ExecutionEngine;
use cvm_platform::CvmPaths;
use cvm_shell::{detect_shell, profile_path};
use log::debug;

use crate::error::CliError;
use crate::settings::Settings;

/// Everything a command needs, wired once from the paths and settings.
pub struct App {
    pub paths: CvmPaths,
    pub settings: Settings,
    pub config: ToolConfig,
    pub activation: ActivationManager,
    pub engine: ExecutionEngine,
    pub history: HistoryStore,
    pub latest: Arc<dyn LatestVersionSource>,
}

impl App {
    pub fn new(paths: CvmPaths, settings: Settings) -> Result<Self, CliError> {
        let installer = http_installer(&settings, None)?;
        let latest = GithubLatestSource::new(&settings.latest_release_repo, settings.http_timeout())?;
        let profile = detect_profile();
        Ok(Self::with_collaborators(
            paths,
            settings,
            Arc::new(installer),
            Arc::new(latest),
            profile,
        ))
    }

    pub fn with_collaborators(
        paths: CvmPaths,
        settings: Settings,
        installer: Arc<dyn Installer>,
        latest: Arc<dyn LatestVersionSource>,
        profile: Option<ProfileTarget>,
    ) -> Self {
        let config = ToolConfig::new(paths.clone(), settings.binary_name.clone())
            .with_marker_file(settings.marker_file.clone());
        let store = VersionStore::new(config.clone());
        let resolver = Resolver::new(store.clone(), installer, Arc::clone(&latest));
        let shims = ShimWriter::new(config.clone(), manager_exe());

        Self {
            history: HistoryStore::new(&paths),
            engine: ExecutionEngine::new(store),
            activation: ActivationManager::new(resolver, shims, profile),
            paths,
            settings,
            config,
            latest,
        }
    }

    pub fn store(&self) -> &VersionStore {
        self.activation.resolver().store()
    }
}

pub fn http_installer(
    settings: &Settings,
    sha256: Option<String>,
) -> Result<HttpInstaller, CliError> {
    Ok(HttpInstaller::new(
        &settings.download_url_template,
        &settings.binary_name,
        settings.http_timeout(),
    )?
    .with_repo(&settings.latest_release_repo)
    .with_retry_delays(settings.retry_delays_secs.clone())
    .with_sha256(sha256))
}

fn detect_profile() -> Option<ProfileTarget> {
    let shell = detect_shell();
    let path = profile_path(shell)?;
    debug!("Using {} profile {}", shell, path.display());
    Some(ProfileTarget { shell, path })
}

fn manager_exe() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .map(|exe| exe.canonicalize().unwrap_or(exe))
}
