use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

impl ShellType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::PowerShell => "powershell",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bash" | "sh" => Some(Self::Bash),
            "zsh" => Some(Self::Zsh),
            "fish" => Some(Self::Fish),
            "powershell" | "pwsh" => Some(Self::PowerShell),
            _ => None,
        }
    }

    /// Infer the shell from the basename of a `$SHELL`-style path.
    #[must_use]
    pub fn from_shell_path(path: &Path) -> Option<Self> {
        let name = path.file_stem()?.to_str()?;
        Self::from_name(name)
    }

    /// Candidate profile files in preference order.
    #[must_use]
    pub fn config_files(self) -> Vec<PathBuf> {
        let Some(home) = dirs::home_dir() else {
            return Vec::new();
        };

        match self {
            Self::Bash => vec![home.join(".bashrc"), home.join(".bash_profile")],
            Self::Zsh => vec![home.join(".zshrc")],
            Self::Fish => vec![home.join(".config").join("fish").join("config.fish")],
            Self::PowerShell => {
                let documents = dirs::document_dir().unwrap_or_else(|| home.join("Documents"));
                vec![
                    documents
                        .join("PowerShell")
                        .join("Microsoft.PowerShell_profile.ps1"),
                ]
            }
        }
    }

    /// Command used to syntax-check a profile without running it.
    #[must_use]
    pub fn syntax_check_command(self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Self::Bash => Some(("bash", &["-n"])),
            Self::Zsh => Some(("zsh", &["-n"])),
            Self::Fish => Some(("fish", &["--no-execute"])),
            Self::PowerShell => None,
        }
    }

    /// The single statement that puts `dir` at the front of PATH.
    #[must_use]
    pub fn path_prepend_statement(self, dir: &Path) -> String {
        let dir = dir.display();
        match self {
            Self::Bash | Self::Zsh => format!("export PATH=\"{dir}:$PATH\""),
            Self::Fish => format!("set -gx PATH \"{dir}\" $PATH"),
            Self::PowerShell => format!("$env:PATH = \"{dir};\" + $env:PATH"),
        }
    }
}

impl std::fmt::Display for ShellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The user's login shell, from `$SHELL`, defaulting to PowerShell on
/// Windows and bash elsewhere.
#[must_use]
pub fn detect_shell() -> ShellType {
    std::env::var_os("SHELL")
        .and_then(|shell| ShellType::from_shell_path(Path::new(&shell)))
        .unwrap_or(if cfg!(windows) {
            ShellType::PowerShell
        } else {
            ShellType::Bash
        })
}

/// The profile to edit for `shell`: the first existing candidate, else the
/// first candidate (to be created).
#[must_use]
pub fn profile_path(shell: ShellType) -> Option<PathBuf> {
    let candidates = shell.config_files();
    candidates
        .iter()
        .find(|path| path.exists())
        .cloned()
        .or_else(|| candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::ShellType;

    #[test]
    fn from_shell_path_uses_basename() {
        assert_eq!(
            ShellType::from_shell_path(Path::new("/usr/bin/zsh")),
            Some(ShellType::Zsh)
        );
        assert_eq!(
            ShellType::from_shell_path(Path::new("/bin/bash")),
            Some(ShellType::Bash)
        );
        assert_eq!(
            ShellType::from_shell_path(Path::new("/usr/local/bin/fish")),
            Some(ShellType::Fish)
        );
        assert_eq!(ShellType::from_shell_path(Path::new("/bin/nu")), None);
    }

    #[test]
    fn path_statement_is_shell_specific() {
        let dir = Path::new("/home/u/.local/share/cvm/shims");
        assert_eq!(
            ShellType::Bash.path_prepend_statement(dir),
            "export PATH=\"/home/u/.local/share/cvm/shims:$PATH\""
        );
        assert_eq!(
            ShellType::Fish.path_prepend_statement(dir),
            "set -gx PATH \"/home/u/.local/share/cvm/shims\" $PATH"
        );
    }

    #[test]
    fn syntax_check_commands_exist_for_posix_shells() {
        assert!(ShellType::Bash.syntax_check_command().is_some());
        assert!(ShellType::Zsh.syntax_check_command().is_some());
        assert!(ShellType::PowerShell.syntax_check_command().is_none());
    }
}
