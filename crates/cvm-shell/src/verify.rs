use crate::config::{ManagedSection, ShellConfig};
use crate::detect::ShellType;
use cvm_platform::{path_entries, same_dir, system_bin_dirs};
use log::debug;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Configured,
    Outdated,
    NotConfigured,
    ConfigFileNotFound,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathOrderError {
    #[error("{} is not on PATH; restart your shell or source your profile", shim_dir.display())]
    ShimDirMissing { shim_dir: PathBuf },

    #[error("{} comes before {} on PATH, so a system install shadows the shim", system_dir.display(), shim_dir.display())]
    Shadowed {
        shim_dir: PathBuf,
        system_dir: PathBuf,
    },
}

/// Check whether the profile at `config_path` carries `section` as cvm would
/// render it today.
#[must_use]
pub fn verify_profile(
    shell_type: ShellType,
    config_path: &Path,
    section: &ManagedSection,
) -> VerificationResult {
    if !config_path.exists() {
        return VerificationResult::ConfigFileNotFound;
    }

    match ShellConfig::load(shell_type, config_path.to_path_buf()) {
        Ok(config) => match config.section_ranges(&section.id) {
            Ok(ranges) if ranges.is_empty() => VerificationResult::NotConfigured,
            Ok(_) if config.has_section(section) => VerificationResult::Configured,
            Ok(_) => VerificationResult::Outdated,
            Err(e) => VerificationResult::Error(e.to_string()),
        },
        Err(e) => VerificationResult::Error(e.to_string()),
    }
}

/// The shim directory must appear on PATH ahead of every listed system
/// directory that is also on PATH.
pub fn verify_path_order(
    path_var: &OsStr,
    shim_dir: &Path,
    system_dirs: &[PathBuf],
) -> Result<(), PathOrderError> {
    let entries = path_entries(path_var);

    let Some(shim_index) = entries.iter().position(|entry| same_dir(entry, shim_dir)) else {
        return Err(PathOrderError::ShimDirMissing {
            shim_dir: shim_dir.to_path_buf(),
        });
    };

    for (index, entry) in entries.iter().enumerate().take(shim_index) {
        if system_dirs.iter().any(|dir| same_dir(entry, dir)) {
            return Err(PathOrderError::Shadowed {
                shim_dir: shim_dir.to_path_buf(),
                system_dir: entries[index].clone(),
            });
        }
    }

    Ok(())
}

/// Known system directories plus the directory of every other copy of
/// `binary_name` reachable through PATH.
#[must_use]
pub fn competing_dirs(binary_name: &str, shim_dir: &Path) -> Vec<PathBuf> {
    let mut dirs = system_bin_dirs();

    if let Ok(found) = which::which_all(binary_name) {
        for binary in found {
            let Some(parent) = binary.parent() else {
                continue;
            };
            if !same_dir(parent, shim_dir) && !dirs.iter().any(|dir| same_dir(dir, parent)) {
                debug!("Found competing {binary_name} in {}", parent.display());
                dirs.push(parent.to_path_buf());
            }
        }
    }

    dirs
}

/// Verify the current process's PATH.
pub fn verify_current_path(binary_name: &str, shim_dir: &Path) -> Result<(), PathOrderError> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    verify_path_order(&path_var, shim_dir, &competing_dirs(binary_name, shim_dir))
}
