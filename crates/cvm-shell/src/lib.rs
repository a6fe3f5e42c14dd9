#![allow(clippy::missing_errors_doc)]

mod config;
mod detect;
mod verify;

pub use config::{ConfigError, ManagedSection, ShellConfig, ShellConfigEdit, validate_markers};
pub use detect::{ShellType, detect_shell, profile_path};
pub use verify::{
    PathOrderError, VerificationResult, competing_dirs, verify_current_path, verify_path_order,
    verify_profile,
};
