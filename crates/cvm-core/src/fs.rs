use std::io::Write as _;
use std::path::Path;

/// Replace `path` with `data` via a sibling temp file and rename, so readers
/// never observe a half-written file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("cvm");
    let mut staged = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)?;
    staged.write_all(data)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|error| error.error)?;
    Ok(())
}

/// Trimmed file content, or `None` when the file does not exist.
pub(crate) fn read_trimmed(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::{read_trimmed, write_atomic};

    #[test]
    fn write_atomic_replaces_content_and_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let target = temp_dir.path().join("nested").join("active");

        write_atomic(&target, b"2.73.0").expect("first write should succeed");
        write_atomic(&target, b"2.74.0").expect("second write should succeed");

        assert_eq!(
            std::fs::read_to_string(&target).expect("target should be readable"),
            "2.74.0"
        );
        let leftovers = std::fs::read_dir(target.parent().expect("has parent"))
            .expect("dir should be readable")
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn read_trimmed_handles_missing_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let file = temp_dir.path().join("missing");
        assert_eq!(read_trimmed(&file).expect("missing is not an error"), None);

        std::fs::write(&file, "  2.74.0\n").expect("file should be written");
        assert_eq!(
            read_trimmed(&file).expect("file should be readable"),
            Some("2.74.0".to_string())
        );
    }
}
