use std::path::PathBuf;
use thiserror::Error;

pub const HOME_ENV: &str = "CVM_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathsError {
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

/// Every on-disk location cvm touches. Built once at startup and passed to
/// each component, so tests can point a whole instance at a temp root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvmPaths {
    pub root: PathBuf,
    pub versions_dir: PathBuf,
    pub aliases_dir: PathBuf,
    pub shim_dir: PathBuf,
}

impl CvmPaths {
    /// Resolve the root from `$CVM_HOME`, falling back to the platform data
    /// directory.
    ///
    /// # Errors
    /// Returns an error when neither `$CVM_HOME` is set nor a data directory
    /// can be determined.
    pub fn new() -> Result<Self, PathsError> {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }

        let data_dir = dirs::data_dir().ok_or(PathsError::DataDirUnavailable)?;
        Ok(Self::with_root(data_dir.join("cvm")))
    }

    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            versions_dir: root.join("versions"),
            aliases_dir: root.join("aliases"),
            shim_dir: root.join("shims"),
            root,
        }
    }

    #[must_use]
    pub fn active_file(&self) -> PathBuf {
        self.root.join("active")
    }

    #[must_use]
    pub fn blocklist_file(&self) -> PathBuf {
        self.root.join("blocked.json")
    }

    #[must_use]
    pub fn history_file(&self) -> PathBuf {
        self.root.join("history.json")
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.root.join("debug.log")
    }

    /// Where activation records the path of the running `cvm` executable,
    /// so the shim can find it for history recording.
    #[must_use]
    pub fn manager_file(&self) -> PathBuf {
        self.root.join("manager-path")
    }

    #[must_use]
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir.join(version)
    }

    /// Ensure all directories exist on disk.
    ///
    /// # Errors
    /// Returns an error if any directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.versions_dir)?;
        std::fs::create_dir_all(&self.aliases_dir)?;
        std::fs::create_dir_all(&self.shim_dir)?;
        Ok(())
    }
}

/// File name of a managed executable on the current platform.
#[must_use]
pub fn executable_name(name: &str) -> String {
    if cfg!(windows) && !name.to_ascii_lowercase().ends_with(".exe") {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}
