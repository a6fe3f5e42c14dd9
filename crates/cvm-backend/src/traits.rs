use async_trait::async_trait;
use std::path::Path;

use crate::error::CvmError;
use crate::types::Version;

/// Places a release's binary at a given path. Installing an already present
/// version overwrites it in place.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, version: &Version, destination: &Path) -> Result<(), CvmError>;
}

/// Reports the newest published release of the managed tool.
#[async_trait]
pub trait LatestVersionSource: Send + Sync {
    async fn latest_version(&self) -> Result<Version, CvmError>;
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingInstaller {
        calls: Mutex<Vec<(Version, PathBuf)>>,
    }

    #[async_trait]
    impl Installer for RecordingInstaller {
        async fn install(&self, version: &Version, destination: &Path) -> Result<(), CvmError> {
            self.calls
                .lock()
                .expect("lock should not be poisoned")
                .push((*version, destination.to_path_buf()));
            Ok(())
        }
    }

    struct FixedLatest(Version);

    #[async_trait]
    impl LatestVersionSource for FixedLatest {
        async fn latest_version(&self) -> Result<Version, CvmError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn trait_objects_are_usable_behind_dyn() {
        let installer: Box<dyn Installer> = Box::new(RecordingInstaller::default());
        let latest: Box<dyn LatestVersionSource> = Box::new(FixedLatest(Version::new(2, 74, 0)));

        let version = latest.latest_version().await.expect("latest should resolve");
        installer
            .install(&version, Path::new("/tmp/cvm-test/bin"))
            .await
            .expect("install should succeed");

        assert_eq!(version, Version::new(2, 74, 0));
    }
}
