mod error;
mod traits;
mod types;

pub use error::{CvmError, ErrorKind};
pub use traits::{Installer, LatestVersionSource};
pub use types::{
    ConstraintOp, LATEST_KEYWORD, Version, VersionComponent, VersionConstraint, VersionId,
    VersionParseError, is_latest_keyword, is_valid_linked_name,
};
