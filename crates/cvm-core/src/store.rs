use std::path::{Path, PathBuf};

use cvm_backend::{CvmError, Version, VersionId, VersionParseError, is_valid_linked_name};
use log::{debug, info};

use crate::config::ToolConfig;

/// On-disk catalogue of installed versions: one directory per version under
/// `versions_dir`, each holding the managed binary.
#[derive(Debug, Clone)]
pub struct VersionStore {
    config: ToolConfig,
}

impl VersionStore {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn version_dir(&self, version: &VersionId) -> PathBuf {
        self.config.paths.version_dir(&version.to_string())
    }

    pub fn binary_path(&self, version: &VersionId) -> PathBuf {
        self.version_dir(version).join(self.config.binary_file_name())
    }

    /// A version counts as installed only when both its directory and the
    /// binary inside it exist.
    pub fn is_installed(&self, version: &VersionId) -> bool {
        self.binary_path(version).is_file()
    }

    pub fn exists(&self, version: &VersionId) -> Result<(), CvmError> {
        if self.is_installed(version) {
            Ok(())
        } else {
            Err(CvmError::version_not_found(version))
        }
    }

    /// Installed versions in ascending order. Directories without the binary
    /// are partial installs and skipped.
    pub fn list(&self) -> Result<Vec<VersionId>, CvmError> {
        let entries = match std::fs::read_dir(&self.config.paths.versions_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let binary = self.config.binary_file_name();
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() || !path.join(&binary).is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match version_from_dir_name(name) {
                Some(version) => versions.push(version),
                None => debug!("Skipping version directory {name}: not a canonical version name"),
            }
        }

        versions.sort();
        Ok(versions)
    }

    pub fn releases(&self) -> Result<Vec<Version>, CvmError> {
        Ok(self
            .list()?
            .iter()
            .filter_map(VersionId::as_release)
            .copied()
            .collect())
    }

    pub fn remove(&self, version: &VersionId) -> Result<(), CvmError> {
        self.exists(version)?;
        std::fs::remove_dir_all(self.version_dir(version))?;
        info!("Removed version {version}");
        Ok(())
    }

    /// Remove every child of the versions directory, leaving the directory
    /// itself and all other metadata under the root in place.
    pub fn clear(&self) -> Result<usize, CvmError> {
        let entries = match std::fs::read_dir(&self.config.paths.versions_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
            removed += 1;
        }

        info!("Cleared {removed} version entries");
        Ok(removed)
    }

    /// Register an arbitrary local binary as the pseudo-version `name`.
    pub fn link(&self, from: &Path, name: &str) -> Result<VersionId, CvmError> {
        let name = name.trim();
        if !is_valid_linked_name(name) || name.parse::<Version>().is_ok() {
            return Err(VersionParseError::InvalidFormat {
                input: name.to_string(),
            }
            .into());
        }
        let source = from.canonicalize().map_err(|e| CvmError::Io {
            kind: e.kind(),
            message: format!("{}: {e}", from.display()),
        })?;
        if !source.is_file() {
            return Err(CvmError::Io {
                kind: std::io::ErrorKind::InvalidInput,
                message: format!("{} is not a file", source.display()),
            });
        }

        let version = VersionId::Linked(name.to_string());
        let dir = self.version_dir(&version);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;
        place_link(&source, &self.binary_path(&version))?;

        info!("Linked {} as {version}", source.display());
        Ok(version)
    }
}

/// A directory counts only when its name is exactly what `version_dir`
/// would produce for the id it parses to. `v2.0.0` or `02.0.0` parse as
/// releases but can never be looked up again, so they are skipped.
fn version_from_dir_name(name: &str) -> Option<VersionId> {
    let version = VersionId::parse_token(name).ok()?;
    (version.to_string() == name).then_some(version)
}

#[cfg(unix)]
fn place_link(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn place_link(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::copy(source, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use cvm_backend::{CvmError, Version, VersionId};
    use cvm_platform::CvmPaths;

    use super::VersionStore;
    use crate::config::ToolConfig;

    fn store(root: &std::path::Path) -> VersionStore {
        VersionStore::new(ToolConfig::new(CvmPaths::with_root(root), "cli"))
    }

    fn install(store: &VersionStore, name: &str) {
        let version = VersionId::parse_token(name).expect("valid token");
        std::fs::create_dir_all(store.version_dir(&version)).expect("create version dir");
        std::fs::write(store.binary_path(&version), "bin").expect("write binary");
    }

    #[test]
    fn list_skips_non_canonical_release_directories() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let store = store(temp_dir.path());
        install(&store, "1.2.3");
        for name in ["v1.2.3", "v2.0.0", "02.0.0"] {
            let dir = store.config().paths.version_dir(name);
            std::fs::create_dir_all(&dir).expect("create version dir");
            std::fs::write(dir.join(store.config().binary_file_name()), "bin")
                .expect("write binary");
        }

        let listed = store.list().expect("list should succeed");
        assert_eq!(listed, vec![VersionId::Release(Version::new(1, 2, 3))]);
        for version in &listed {
            assert!(store.exists(version).is_ok());
        }
    }

    #[test]
    fn list_sorts_numerically_and_skips_partial_installs() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let store = store(temp_dir.path());
        install(&store, "2.10.0");
        install(&store, "2.9.1");
        install(&store, "dev-build");
        std::fs::create_dir_all(store.config().paths.version_dir("2.11.0"))
            .expect("create partial dir");

        let listed = store.list().expect("list should succeed");
        assert_eq!(
            listed,
            vec![
                VersionId::Release(Version::new(2, 9, 1)),
                VersionId::Release(Version::new(2, 10, 0)),
                VersionId::Linked("dev-build".to_string()),
            ]
        );
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let store = store(&temp_dir.path().join("nothing"));
        assert!(store.list().expect("list should succeed").is_empty());
    }

    #[test]
    fn exists_treats_missing_binary_as_absent() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let store = store(temp_dir.path());
        let version = VersionId::Release(Version::new(1, 0, 0));
        std::fs::create_dir_all(store.version_dir(&version)).expect("create dir");

        assert!(matches!(
            store.exists(&version),
            Err(CvmError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn clear_keeps_root_metadata() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let store = store(temp_dir.path());
        install(&store, "1.0.0");
        install(&store, "1.1.0");
        std::fs::write(store.config().paths.active_file(), "1.0.0").expect("write active");

        assert_eq!(store.clear().expect("clear should succeed"), 2);
        assert!(store.list().expect("list should succeed").is_empty());
        assert!(store.config().paths.versions_dir.is_dir());
        assert!(store.config().paths.active_file().is_file());
    }

    #[test]
    fn remove_unknown_version_fails() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let store = store(temp_dir.path());
        let result = store.remove(&VersionId::Release(Version::new(9, 9, 9)));
        assert!(matches!(result, Err(CvmError::VersionNotFound { .. })));
    }

    #[test]
    fn link_rejects_release_like_and_reserved_names() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let store = store(temp_dir.path());
        let source = temp_dir.path().join("local-cli");
        std::fs::write(&source, "bin").expect("write source");

        assert!(store.link(&source, "1.2.3").is_err());
        assert!(store.link(&source, "Latest").is_err());
        assert!(store.link(&source, "a/b").is_err());

        let linked = store.link(&source, "local").expect("link should succeed");
        assert_eq!(linked, VersionId::Linked("local".to_string()));
        assert!(store.is_installed(&linked));
    }
}
