use cvm_platform::{CvmPaths, executable_name};

pub const MANAGER_NAME: &str = "cvm";
pub const DEFAULT_MARKER_FILE: &str = ".cvm-version";

/// Settings every component needs, constructed once and cloned into each
/// store and manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub paths: CvmPaths,
    /// Name of the managed tool's executable, without platform extension.
    pub binary_name: String,
    /// Project marker file consulted when no version token is given.
    pub marker_file: String,
}

impl ToolConfig {
    pub fn new(paths: CvmPaths, binary_name: impl Into<String>) -> Self {
        Self {
            paths,
            binary_name: binary_name.into(),
            marker_file: DEFAULT_MARKER_FILE.to_string(),
        }
    }

    #[must_use]
    pub fn with_marker_file(mut self, marker_file: impl Into<String>) -> Self {
        self.marker_file = marker_file.into();
        self
    }

    /// Executable file name inside a version directory and the shim dir.
    #[must_use]
    pub fn binary_file_name(&self) -> String {
        executable_name(&self.binary_name)
    }
}
