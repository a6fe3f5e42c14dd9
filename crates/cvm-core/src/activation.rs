use std::fmt;
use std::path::{Path, PathBuf};

use cvm_backend::{CvmError, VersionId};
use cvm_shell::{
    ConfigError, ManagedSection, PathOrderError, ShellConfig, ShellType, VerificationResult,
    verify_current_path, verify_profile,
};
use log::{info, warn};

use crate::fs::{read_trimmed, write_atomic};
use crate::resolver::{ResolutionSource, Resolver};
use crate::shim::{ShimKind, ShimWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationState {
    Inactive,
    Active(VersionId),
}

/// Shell profile that receives the managed PATH block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTarget {
    pub shell: ShellType,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileUpdate {
    Unchanged,
    Updated(PathBuf),
    /// No profile could be determined for the current shell.
    Skipped,
}

/// Problems that leave activation in effect but need the user's attention,
/// usually re-sourcing the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationWarning {
    Profile { path: PathBuf, details: String },
    NoProfile,
    PathOrder(PathOrderError),
}

impl fmt::Display for ActivationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile { path, details } => {
                write!(f, "Could not update {}: {details}", path.display())
            }
            Self::NoProfile => write!(
                f,
                "Could not determine a shell profile; add the shim directory to PATH manually"
            ),
            Self::PathOrder(error) => write!(f, "{error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub version: VersionId,
    pub source: ResolutionSource,
    pub installed: bool,
    pub shim: ShimKind,
    pub profile: ProfileUpdate,
    pub warnings: Vec<ActivationWarning>,
}

/// Owns the active-version pointer and everything that makes a bare
/// invocation of the managed binary reach it.
#[derive(Clone)]
pub struct ActivationManager {
    resolver: Resolver,
    shims: ShimWriter,
    profile: Option<ProfileTarget>,
}

impl ActivationManager {
    pub fn new(resolver: Resolver, shims: ShimWriter, profile: Option<ProfileTarget>) -> Self {
        Self {
            resolver,
            shims,
            profile,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn shims(&self) -> &ShimWriter {
        &self.shims
    }

    pub fn profile(&self) -> Option<&ProfileTarget> {
        self.profile.as_ref()
    }

    fn active_file(&self) -> PathBuf {
        self.resolver.store().config().paths.active_file()
    }

    fn shim_dir(&self) -> &Path {
        &self.resolver.store().config().paths.shim_dir
    }

    pub fn state(&self) -> Result<ActivationState, CvmError> {
        match read_trimmed(&self.active_file())? {
            Some(content) if !content.is_empty() => {
                Ok(ActivationState::Active(VersionId::parse_token(&content)?))
            }
            _ => Ok(ActivationState::Inactive),
        }
    }

    pub fn active_version(&self) -> Result<VersionId, CvmError> {
        match self.state()? {
            ActivationState::Active(version) => Ok(version),
            ActivationState::Inactive => Err(CvmError::NoActiveVersion),
        }
    }

    /// Point the active file at `version` without touching the shim or the
    /// profile.
    pub fn set_active(&self, version: &VersionId) -> Result<(), CvmError> {
        write_atomic(&self.active_file(), version.to_string().as_bytes())?;
        Ok(())
    }

    pub fn clear_active(&self) -> Result<(), CvmError> {
        match std::fs::remove_file(self.active_file()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve, install if needed, then write the active file and shim.
    /// Profile and PATH problems become warnings on the report.
    pub async fn activate(
        &self,
        token: Option<&str>,
        cwd: &Path,
    ) -> Result<ActivationReport, CvmError> {
        let resolution = self.resolver.resolve(token, cwd).await?;
        let installed =
            resolution.installed || self.resolver.ensure_installed(&resolution.version).await?;

        self.set_active(&resolution.version)?;
        let shim = self.shims.write()?;

        let mut warnings = Vec::new();
        let profile = match self.update_path() {
            Ok(ProfileUpdate::Skipped) => {
                warnings.push(ActivationWarning::NoProfile);
                ProfileUpdate::Skipped
            }
            Ok(update) => update,
            Err(error) => {
                let path = self
                    .profile
                    .as_ref()
                    .map(|target| target.path.clone())
                    .unwrap_or_default();
                warn!("Profile update failed: {error}");
                warnings.push(ActivationWarning::Profile {
                    path,
                    details: error.to_string(),
                });
                ProfileUpdate::Unchanged
            }
        };

        if let Err(error) = self.verify_path() {
            warn!("PATH verification failed: {error}");
            warnings.push(ActivationWarning::PathOrder(error));
        }

        info!("Activated {} from {}", resolution.version, resolution.source);
        Ok(ActivationReport {
            version: resolution.version,
            source: resolution.source,
            installed,
            shim,
            profile,
            warnings,
        })
    }

    /// Make sure the profile carries the current PATH block. Rewrites
    /// nothing when the exact block is already present.
    pub fn update_path(&self) -> Result<ProfileUpdate, ConfigError> {
        let Some(target) = &self.profile else {
            return Ok(ProfileUpdate::Skipped);
        };

        let section = ManagedSection::path(target.shell, self.shim_dir());
        let mut config = ShellConfig::load(target.shell, target.path.clone())?;
        let edit = config.upsert_section(&section)?;
        if !edit.has_changes() {
            return Ok(ProfileUpdate::Unchanged);
        }

        config.apply_edit(&edit)?;
        info!("Updated PATH block in {}", target.path.display());
        Ok(ProfileUpdate::Updated(target.path.clone()))
    }

    pub fn verify_profile(&self) -> Option<VerificationResult> {
        let target = self.profile.as_ref()?;
        let section = ManagedSection::path(target.shell, self.shim_dir());
        Some(verify_profile(target.shell, &target.path, &section))
    }

    /// Check the current process's PATH puts the shim directory ahead of
    /// every system install location.
    pub fn verify_path(&self) -> Result<(), PathOrderError> {
        let config = self.resolver.store().config();
        verify_current_path(&config.binary_name, self.shim_dir())
    }
}
