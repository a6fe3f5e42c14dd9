use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Directories where OS packages and common installers drop binaries. A
/// shim directory must precede all of these on PATH.
#[must_use]
pub fn system_bin_dirs() -> Vec<PathBuf> {
    let mut found = Vec::new();

    #[cfg(unix)]
    {
        found.push(PathBuf::from("/usr/local/bin"));
        found.push(PathBuf::from("/usr/bin"));
        found.push(PathBuf::from("/bin"));
        found.push(PathBuf::from("/opt/homebrew/bin"));
        found.push(PathBuf::from("/snap/bin"));
    }

    #[cfg(windows)]
    {
        if let Some(program_files) = std::env::var_os("ProgramFiles") {
            found.push(PathBuf::from(program_files));
        }
        if let Some(local) = dirs::data_local_dir() {
            found.push(local.join("Programs"));
        }
    }

    found
}

#[must_use]
pub fn path_entries(path_var: &OsStr) -> Vec<PathBuf> {
    std::env::split_paths(path_var)
        .filter(|entry| !entry.as_os_str().is_empty())
        .collect()
}

/// Compare two directories the way PATH lookup would treat them: trailing
/// separators and symlinked spellings are considered equal.
#[must_use]
pub fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.components().eq(b.components()),
    }
}

#[cfg(unix)]
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Mark a file as executable by owner, group and others.
///
/// # Errors
/// Returns an error if the file's permissions cannot be updated.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

/// No-op outside Unix: executability follows the file extension.
///
/// # Errors
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
