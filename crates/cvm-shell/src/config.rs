use crate::detect::ShellType;
use cvm_platform::HideWindow;
use log::{debug, warn};
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

const BEGIN_PREFIX: &str = "# >>> cvm managed section: ";
const END_PREFIX: &str = "# <<< cvm managed section: ";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Managed section '{id}' starting on line {line} has no closing marker")]
    UnterminatedSection { id: String, line: usize },

    #[error("Closing marker for managed section '{id}' on line {line} has no opening marker")]
    UnopenedSection { id: String, line: usize },

    #[error("{shell} rejected the updated profile: {details}")]
    SyntaxCheckFailed { shell: &'static str, details: String },

    #[error("Profile path has no parent directory: {0}")]
    NoParent(PathBuf),
}

/// A block of profile lines owned by cvm, delimited by sentinel comments
/// carrying a stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedSection {
    pub id: String,
    pub body: Vec<String>,
}

impl ManagedSection {
    pub fn new(id: impl Into<String>, body: Vec<String>) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }

    /// The `path` section: exactly one statement prepending `shim_dir`.
    #[must_use]
    pub fn path(shell: ShellType, shim_dir: &Path) -> Self {
        Self::new("path", vec![shell.path_prepend_statement(shim_dir)])
    }

    #[must_use]
    pub fn begin_marker(id: &str) -> String {
        format!("{BEGIN_PREFIX}{id} >>>")
    }

    #[must_use]
    pub fn end_marker(id: &str) -> String {
        format!("{END_PREFIX}{id} <<<")
    }

    /// Rendered block, newline terminated.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = Self::begin_marker(&self.id);
        out.push('\n');
        for line in &self.body {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&Self::end_marker(&self.id));
        out.push('\n');
        out
    }
}

pub struct ShellConfig {
    pub shell_type: ShellType,
    pub config_path: PathBuf,
    pub content: String,
}

impl ShellConfig {
    pub fn load(shell_type: ShellType, config_path: PathBuf) -> Result<Self, ConfigError> {
        let content = if config_path.exists() {
            fs::read_to_string(&config_path)?
        } else {
            String::new()
        };

        Ok(Self {
            shell_type,
            config_path,
            content,
        })
    }

    /// Whether the exact rendering of `section` is present verbatim.
    #[must_use]
    pub fn has_section(&self, section: &ManagedSection) -> bool {
        self.content.contains(&section.render())
    }

    /// Line ranges (inclusive of markers) of every section with `id`.
    pub fn section_ranges(&self, id: &str) -> Result<Vec<Range<usize>>, ConfigError> {
        section_ranges(&self.content, id)
    }

    /// Compute the edit that leaves exactly one up-to-date copy of `section`
    /// at the end of the profile, separated from the rest by one blank line.
    /// Returns an edit with no changes when the block is already present.
    pub fn upsert_section(&self, section: &ManagedSection) -> Result<ShellConfigEdit, ConfigError> {
        let ranges = self.section_ranges(&section.id)?;
        if ranges.len() == 1 && self.has_section(section) {
            return Ok(ShellConfigEdit::unchanged(&self.content));
        }

        let mut changes = Vec::new();
        if !ranges.is_empty() {
            changes.push(format!("Replace managed section '{}'", section.id));
        }
        changes.push(format!("Add managed section '{}'", section.id));

        let base = remove_ranges(&self.content, &ranges);
        let base = base.trim_end();
        let rendered = section.render();
        let modified = if base.is_empty() {
            rendered
        } else {
            format!("{base}\n\n{rendered}")
        };

        Ok(ShellConfigEdit {
            original: self.content.clone(),
            modified,
            changes,
        })
    }

    /// Compute the edit that drops every section with `id`.
    pub fn remove_section(&self, id: &str) -> Result<ShellConfigEdit, ConfigError> {
        let ranges = self.section_ranges(id)?;
        if ranges.is_empty() {
            return Ok(ShellConfigEdit::unchanged(&self.content));
        }

        let base = remove_ranges(&self.content, &ranges);
        let trimmed = base.trim_end();
        let modified = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}\n")
        };

        Ok(ShellConfigEdit {
            original: self.content.clone(),
            modified,
            changes: vec![format!("Remove managed section '{id}'")],
        })
    }

    /// Validate the edited content and atomically replace the profile with
    /// it. The file is written to a sibling temp file, checked, then renamed.
    pub fn apply_edit(&mut self, edit: &ShellConfigEdit) -> Result<(), ConfigError> {
        if !edit.has_changes() {
            return Ok(());
        }

        validate_markers(&edit.modified)?;

        let target = write_target(&self.config_path);
        let parent = target
            .parent()
            .ok_or_else(|| ConfigError::NoParent(target.clone()))?;
        fs::create_dir_all(parent)?;

        let mut staged = tempfile::Builder::new()
            .prefix(".cvm-profile-")
            .tempfile_in(parent)?;
        staged.write_all(edit.modified.as_bytes())?;
        if let Some(permissions) = profile_permissions(&target)? {
            staged.as_file().set_permissions(permissions)?;
        }
        staged.as_file().sync_all()?;

        if let Err(error) = self.syntax_check(staged.path()) {
            if self.original_passes_syntax_check(parent) {
                return Err(error);
            }
            warn!(
                "Profile {} was already rejected by {} before editing; writing anyway",
                self.config_path.display(),
                self.shell_type
            );
        }

        staged
            .persist(&target)
            .map_err(|error| ConfigError::IoError(error.error))?;
        self.content.clone_from(&edit.modified);
        debug!(
            "Updated profile {} ({})",
            self.config_path.display(),
            target.display()
        );

        Ok(())
    }

    fn syntax_check(&self, path: &Path) -> Result<(), ConfigError> {
        let Some((program, args)) = self.shell_type.syntax_check_command() else {
            return Ok(());
        };
        if which::which(program).is_err() {
            debug!("{program} not installed; skipping profile syntax check");
            return Ok(());
        }

        let output = Command::new(program)
            .args(args)
            .arg(path)
            .hide_window()
            .output()?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ConfigError::SyntaxCheckFailed {
                shell: self.shell_type.name(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn original_passes_syntax_check(&self, parent: &Path) -> bool {
        let Ok(mut original) = tempfile::Builder::new()
            .prefix(".cvm-profile-orig-")
            .tempfile_in(parent)
        else {
            return true;
        };
        if original.write_all(self.content.as_bytes()).is_err() {
            return true;
        }
        self.syntax_check(original.path()).is_ok()
    }
}

/// The file an edit replaces. A symlinked profile is followed to its final
/// target so the link itself survives the rename.
fn write_target(config_path: &Path) -> PathBuf {
    fs::canonicalize(config_path).unwrap_or_else(|_| config_path.to_path_buf())
}

/// Permissions of the existing profile, or `0o644` for a new one on Unix.
fn profile_permissions(target: &Path) -> Result<Option<fs::Permissions>, ConfigError> {
    match fs::metadata(target) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Ok(new_profile_permissions())
        }
        Err(error) => Err(error.into()),
    }
}

#[cfg(unix)]
fn new_profile_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_profile_permissions() -> Option<fs::Permissions> {
    None
}

fn section_id(line: &str, prefix: &str, suffix: &str) -> Option<String> {
    line.trim()
        .strip_prefix(prefix)?
        .strip_suffix(suffix)
        .map(|id| id.trim().to_string())
}

fn section_ranges(content: &str, id: &str) -> Result<Vec<Range<usize>>, ConfigError> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;

    for (index, line) in content.lines().enumerate() {
        if section_id(line, BEGIN_PREFIX, ">>>").as_deref() == Some(id) {
            if open.is_some() {
                return Err(ConfigError::UnterminatedSection {
                    id: id.to_string(),
                    line: open.map_or(index, |start| start + 1),
                });
            }
            open = Some(index);
        } else if section_id(line, END_PREFIX, "<<<").as_deref() == Some(id) {
            let Some(start) = open.take() else {
                return Err(ConfigError::UnopenedSection {
                    id: id.to_string(),
                    line: index + 1,
                });
            };
            ranges.push(start..index + 1);
        }
    }

    if let Some(start) = open {
        return Err(ConfigError::UnterminatedSection {
            id: id.to_string(),
            line: start + 1,
        });
    }

    Ok(ranges)
}

fn remove_ranges(content: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(content.len());
    for (index, line) in content.lines().enumerate() {
        if ranges.iter().any(|range| range.contains(&index)) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Every managed section in `content` must be opened and closed exactly
/// once, without nesting.
pub fn validate_markers(content: &str) -> Result<(), ConfigError> {
    let mut open: Option<(String, usize)> = None;

    for (index, line) in content.lines().enumerate() {
        if let Some(id) = section_id(line, BEGIN_PREFIX, ">>>") {
            if let Some((open_id, start)) = open {
                return Err(ConfigError::UnterminatedSection {
                    id: open_id,
                    line: start + 1,
                });
            }
            open = Some((id, index));
        } else if let Some(id) = section_id(line, END_PREFIX, "<<<") {
            match open.take() {
                Some((open_id, _)) if open_id == id => {}
                Some((open_id, start)) => {
                    return Err(ConfigError::UnterminatedSection {
                        id: open_id,
                        line: start + 1,
                    });
                }
                None => {
                    return Err(ConfigError::UnopenedSection {
                        id,
                        line: index + 1,
                    });
                }
            }
        }
    }

    match open {
        Some((id, start)) => Err(ConfigError::UnterminatedSection {
            id,
            line: start + 1,
        }),
        None => Ok(()),
    }
}

pub struct ShellConfigEdit {
    pub original: String,
    pub modified: String,
    pub changes: Vec<String>,
}

impl ShellConfigEdit {
    fn unchanged(content: &str) -> Self {
        Self {
            original: content.to_string(),
            modified: content.to_string(),
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    #[must_use]
    pub fn diff_preview(&self) -> String {
        if !self.has_changes() {
            return "No changes needed.".to_string();
        }

        let mut preview = String::new();

        for change in &self.changes {
            let _ = writeln!(preview, "+ {change}");
        }

        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config(content: &str) -> ShellConfig {
        ShellConfig {
            shell_type: ShellType::Bash,
            config_path: PathBuf::from("/test/.bashrc"),
            content: content.to_string(),
        }
    }

    fn path_section() -> ManagedSection {
        ManagedSection::path(ShellType::Bash, Path::new("/home/u/.cvm/shims"))
    }

    #[test]
    fn render_wraps_body_in_markers() {
        let rendered = path_section().render();
        assert_eq!(
            rendered,
            "# >>> cvm managed section: path >>>\n\
             export PATH=\"/home/u/.cvm/shims:$PATH\"\n\
             # <<< cvm managed section: path <<<\n"
        );
    }

    #[test]
    fn upsert_appends_after_one_blank_line() {
        let config = create_test_config("# My bashrc\nexport EDITOR=vim\n\n\n   \n");
        let edit = config.upsert_section(&path_section()).unwrap();

        assert!(edit.has_changes());
        assert_eq!(
            edit.modified,
            format!("# My bashrc\nexport EDITOR=vim\n\n{}", path_section().render())
        );
    }

    #[test]
    fn upsert_into_empty_profile_has_no_leading_blank_line() {
        let config = create_test_config("");
        let edit = config.upsert_section(&path_section()).unwrap();
        assert_eq!(edit.modified, path_section().render());
    }

    #[test]
    fn upsert_is_noop_when_block_present_verbatim() {
        let content = format!("alias ll='ls -l'\n\n{}", path_section().render());
        let config = create_test_config(&content);
        let edit = config.upsert_section(&path_section()).unwrap();

        assert!(!edit.has_changes());
        assert_eq!(edit.modified, content);
    }

    #[test]
    fn upsert_replaces_stale_block_and_keeps_surroundings() {
        let stale = ManagedSection::path(ShellType::Bash, Path::new("/old/shims")).render();
        let content = format!("before\n{stale}after\n");
        let config = create_test_config(&content);

        let edit = config.upsert_section(&path_section()).unwrap();

        assert!(edit.has_changes());
        assert!(!edit.modified.contains("/old/shims"));
        assert_eq!(
            edit.modified,
            format!("before\nafter\n\n{}", path_section().render())
        );
    }

    #[test]
    fn upsert_collapses_duplicate_blocks() {
        let block = path_section().render();
        let config = create_test_config(&format!("{block}\n{block}"));

        let edit = config.upsert_section(&path_section()).unwrap();

        assert_eq!(edit.modified.matches("managed section: path >>>").count(), 1);
    }

    #[test]
    fn unterminated_block_is_reported_not_guessed() {
        let config = create_test_config(
            "x\n# >>> cvm managed section: path >>>\nexport PATH=\"/a:$PATH\"\n",
        );
        let result = config.upsert_section(&path_section());
        assert!(matches!(
            result,
            Err(ConfigError::UnterminatedSection { ref id, line: 2 }) if id == "path"
        ));
    }

    #[test]
    fn stray_end_marker_is_reported() {
        let config = create_test_config("# <<< cvm managed section: path <<<\n");
        assert!(matches!(
            config.upsert_section(&path_section()),
            Err(ConfigError::UnopenedSection { line: 1, .. })
        ));
    }

    #[test]
    fn other_section_ids_are_left_alone() {
        let other = ManagedSection::new("completions", vec!["source ~/.cvm/c.bash".to_string()]);
        let config = create_test_config(&other.render());

        let edit = config.upsert_section(&path_section()).unwrap();

        assert!(edit.modified.starts_with(&other.render()));
        assert!(edit.modified.ends_with(&path_section().render()));
    }

    #[test]
    fn remove_section_drops_block() {
        let content = format!("keep\n\n{}", path_section().render());
        let config = create_test_config(&content);

        let edit = config.remove_section("path").unwrap();

        assert!(edit.has_changes());
        assert_eq!(edit.modified, "keep\n");
    }

    #[test]
    fn validate_markers_rejects_nesting() {
        let content = "# >>> cvm managed section: a >>>\n\
                       # >>> cvm managed section: b >>>\n\
                       # <<< cvm managed section: b <<<\n\
                       # <<< cvm managed section: a <<<\n";
        assert!(validate_markers(content).is_err());
        assert!(validate_markers(&path_section().render()).is_ok());
    }

    #[test]
    fn test_diff_preview_with_changes() {
        let config = create_test_config("");
        let edit = config.upsert_section(&path_section()).unwrap();
        assert!(edit.diff_preview().contains("+ Add managed section 'path'"));
    }

    #[test]
    fn test_diff_preview_no_changes() {
        let edit = ShellConfigEdit::unchanged("same");
        assert_eq!(edit.diff_preview(), "No changes needed.");
    }
}
