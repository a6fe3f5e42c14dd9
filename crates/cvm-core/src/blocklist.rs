use std::collections::BTreeSet;
use std::path::PathBuf;

use cvm_backend::{CvmError, VersionId};
use cvm_platform::CvmPaths;
use log::info;

use crate::fs::write_atomic;

/// Versions refused for activation, persisted as a sorted JSON array.
/// Membership is independent of whether a version is installed.
#[derive(Debug, Clone)]
pub struct BlockList {
    path: PathBuf,
}

impl BlockList {
    pub fn new(paths: &CvmPaths) -> Self {
        Self {
            path: paths.blocklist_file(),
        }
    }

    fn load(&self) -> Result<BTreeSet<VersionId>, CvmError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeSet::new());
        }
        serde_json::from_str(&content).map_err(|e| CvmError::serialization_from("block list", e))
    }

    fn save(&self, blocked: &BTreeSet<VersionId>) -> Result<(), CvmError> {
        let json = serde_json::to_string_pretty(blocked)
            .map_err(|e| CvmError::serialization_from("block list", e))?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<VersionId>, CvmError> {
        Ok(self.load()?.into_iter().collect())
    }

    pub fn is_blocked(&self, version: &VersionId) -> Result<bool, CvmError> {
        Ok(self.load()?.contains(version))
    }

    pub fn ensure_allowed(&self, version: &VersionId) -> Result<(), CvmError> {
        if self.is_blocked(version)? {
            return Err(CvmError::Blocked {
                version: version.to_string(),
            });
        }
        Ok(())
    }

    /// Returns `false` when the version was already blocked.
    pub fn block(&self, version: &VersionId) -> Result<bool, CvmError> {
        let mut blocked = self.load()?;
        if !blocked.insert(version.clone()) {
            return Ok(false);
        }
        self.save(&blocked)?;
        info!("Blocked version {version}");
        Ok(true)
    }

    /// Returns `false` when the version was not blocked.
    pub fn unblock(&self, version: &VersionId) -> Result<bool, CvmError> {
        let mut blocked = self.load()?;
        if !blocked.remove(version) {
            return Ok(false);
        }
        self.save(&blocked)?;
        info!("Unblocked version {version}");
        Ok(true)
    }
}
