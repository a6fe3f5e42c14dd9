use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cvm_backend::{
    CvmError, Installer, LatestVersionSource, VersionConstraint, VersionId, is_latest_keyword,
};
use log::{debug, info};

use crate::alias::AliasStore;
use crate::blocklist::BlockList;
use crate::store::VersionStore;

/// Where a resolved version came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    Latest,
    Alias(String),
    Literal,
    Constraint(VersionConstraint),
    MarkerFile(PathBuf),
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest release"),
            Self::Alias(name) => write!(f, "alias {name}"),
            Self::Literal => write!(f, "explicit version"),
            Self::Constraint(constraint) => write!(f, "constraint {constraint}"),
            Self::MarkerFile(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub version: VersionId,
    pub source: ResolutionSource,
    /// Set when resolving `latest` had to download the release.
    pub installed: bool,
}

/// Turns user tokens into installed, non-blocked versions.
#[derive(Clone)]
pub struct Resolver {
    store: VersionStore,
    aliases: AliasStore,
    blocklist: BlockList,
    installer: Arc<dyn Installer>,
    latest: Arc<dyn LatestVersionSource>,
}

impl Resolver {
    pub fn new(
        store: VersionStore,
        installer: Arc<dyn Installer>,
        latest: Arc<dyn LatestVersionSource>,
    ) -> Self {
        let aliases = AliasStore::new(store.clone());
        let blocklist = BlockList::new(&store.config().paths);
        Self {
            store,
            aliases,
            blocklist,
            installer,
            latest,
        }
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn aliases(&self) -> &AliasStore {
        &self.aliases
    }

    pub fn blocklist(&self) -> &BlockList {
        &self.blocklist
    }

    /// Resolve `token`, or the project marker file in `cwd` when no token is
    /// given, then reject blocked versions.
    pub async fn resolve(&self, token: Option<&str>, cwd: &Path) -> Result<Resolution, CvmError> {
        let (version, source) = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) if is_latest_keyword(token) => {
                let version = self.latest.latest_version().await?;
                debug!("Latest release is {version}");
                (VersionId::Release(version), ResolutionSource::Latest)
            }
            Some(token) => self.resolve_token(token)?,
            None => self.resolve_marker(cwd)?,
        };

        self.blocklist.ensure_allowed(&version)?;

        let installed = if source == ResolutionSource::Latest {
            self.ensure_installed(&version).await?
        } else {
            false
        };

        Ok(Resolution {
            version,
            source,
            installed,
        })
    }

    /// Alias lookup first; any alias failure falls back to reading the token
    /// as a constraint or literal version.
    pub fn resolve_token(&self, token: &str) -> Result<(VersionId, ResolutionSource), CvmError> {
        match self.aliases.get(token) {
            Ok(alias) => {
                return Ok((alias.version, ResolutionSource::Alias(alias.name)));
            }
            Err(e) => debug!("{token} is not an alias ({e}), trying it as a version"),
        }

        if VersionConstraint::looks_like_constraint(token) {
            let constraint = parse_constraint(token)?;
            let version = self.find_matching(&constraint)?;
            return Ok((version, ResolutionSource::Constraint(constraint)));
        }

        Ok((VersionId::parse_token(token)?, ResolutionSource::Literal))
    }

    fn resolve_marker(&self, cwd: &Path) -> Result<(VersionId, ResolutionSource), CvmError> {
        let marker = &self.store.config().marker_file;
        let path = cwd.join(marker);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CvmError::MarkerFileNotFound {
                    marker: marker.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let content = content.trim();
        debug!("Read {content:?} from {}", path.display());

        let version = if VersionConstraint::looks_like_constraint(content) {
            let constraint = parse_constraint(content)?;
            self.find_matching(&constraint)?
        } else {
            VersionId::parse_token(content)?
        };

        Ok((version, ResolutionSource::MarkerFile(path)))
    }

    /// Highest installed release satisfying `constraint`.
    pub fn find_matching(&self, constraint: &VersionConstraint) -> Result<VersionId, CvmError> {
        let releases = self.store.releases()?;
        constraint
            .best_match(&releases)
            .map(|version| VersionId::Release(*version))
            .ok_or_else(|| CvmError::NoMatchingVersion {
                constraint: constraint.to_string(),
            })
    }

    /// Download a missing release. Returns whether an install happened.
    /// Linked versions cannot be fetched and must already exist.
    pub async fn ensure_installed(&self, version: &VersionId) -> Result<bool, CvmError> {
        if self.store.is_installed(version) {
            return Ok(false);
        }
        let Some(release) = version.as_release() else {
            return Err(CvmError::version_not_found(version));
        };

        info!("Version {release} is not installed, installing it");
        self.installer
            .install(release, &self.store.binary_path(version))
            .await?;
        self.store.exists(version)?;
        Ok(true)
    }
}

fn parse_constraint(input: &str) -> Result<VersionConstraint, CvmError> {
    input.parse().map_err(|_| CvmError::InvalidConstraint {
        input: input.trim().to_string(),
    })
}
