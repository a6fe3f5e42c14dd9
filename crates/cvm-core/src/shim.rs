use std::fmt;
use std::path::PathBuf;

use cvm_backend::CvmError;
use cvm_platform::{executable_name, is_executable, make_executable};
use log::{debug, info};

use crate::config::{MANAGER_NAME, ToolConfig};
use crate::fs::write_atomic;

pub const DISPATCHER_NAME: &str = "cvm-shim";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimKind {
    /// A copy of the `cvm-shim` dispatcher binary.
    Dispatcher,
    /// A generated shell script, used when no dispatcher ships alongside `cvm`.
    Script,
}

impl fmt::Display for ShimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatcher => write!(f, "dispatcher"),
            Self::Script => write!(f, "script"),
        }
    }
}

/// Regenerates the shim in the shim directory. Every call rewrites it
/// wholesale.
#[derive(Debug, Clone)]
pub struct ShimWriter {
    config: ToolConfig,
    manager_exe: Option<PathBuf>,
}

impl ShimWriter {
    /// `manager_exe` is the running `cvm` binary; the dispatcher is looked up
    /// next to it and the shim calls it back to record history.
    pub fn new(config: ToolConfig, manager_exe: Option<PathBuf>) -> Self {
        Self {
            config,
            manager_exe,
        }
    }

    pub fn dispatcher_path(&self) -> PathBuf {
        self.config.paths.shim_dir.join(self.config.binary_file_name())
    }

    pub fn script_path(&self) -> PathBuf {
        let name = if cfg!(windows) {
            format!("{}.cmd", self.config.binary_name)
        } else {
            self.config.binary_name.clone()
        };
        self.config.paths.shim_dir.join(name)
    }

    /// The shim currently on disk, if any.
    pub fn installed_shim(&self) -> Option<PathBuf> {
        [self.dispatcher_path(), self.script_path()]
            .into_iter()
            .find(|path| path.is_file())
    }

    pub fn is_ready(&self) -> bool {
        self.installed_shim().is_some_and(|path| is_executable(&path))
    }

    fn bundled_dispatcher(&self) -> Option<PathBuf> {
        let dir = self.manager_exe.as_deref()?.parent()?;
        let candidate = dir.join(executable_name(DISPATCHER_NAME));
        candidate.is_file().then_some(candidate)
    }

    pub fn write(&self) -> Result<ShimKind, CvmError> {
        let shim_dir = &self.config.paths.shim_dir;
        std::fs::create_dir_all(shim_dir).map_err(shim_error)?;

        if let Some(manager) = &self.manager_exe {
            write_atomic(
                &self.config.paths.manager_file(),
                manager.to_string_lossy().as_bytes(),
            )
            .map_err(shim_error)?;
        }

        let (kind, target, stale) = if let Some(dispatcher) = self.bundled_dispatcher() {
            let bytes = std::fs::read(&dispatcher).map_err(shim_error)?;
            let target = self.dispatcher_path();
            write_atomic(&target, &bytes).map_err(shim_error)?;
            (ShimKind::Dispatcher, target, self.script_path())
        } else {
            let target = self.script_path();
            write_atomic(&target, self.render_script().as_bytes()).map_err(shim_error)?;
            (ShimKind::Script, target, self.dispatcher_path())
        };
        make_executable(&target).map_err(shim_error)?;

        if stale != target && stale.is_file() {
            debug!("Removing stale shim {}", stale.display());
            std::fs::remove_file(&stale).map_err(shim_error)?;
        }

        info!("Wrote {kind} shim to {}", target.display());
        Ok(kind)
    }

    fn manager_command(&self) -> String {
        self.manager_exe.as_deref().map_or_else(
            || MANAGER_NAME.to_string(),
            |path| path.to_string_lossy().into_owned(),
        )
    }

    #[cfg(not(windows))]
    pub fn render_script(&self) -> String {
        let root = sh_quote(&self.config.paths.root.to_string_lossy());
        let binary = sh_quote(&self.config.binary_file_name());
        let manager = sh_quote(&self.manager_command());
        let budget = crate::history::OUTPUT_BYTE_BUDGET;

        format!(
            r#"#!/bin/sh
# Generated by cvm on every activation. Do not edit.
root={root}
binary={binary}
manager={manager}

if [ ! -f "$root/active" ]; then
    echo "cvm: no active version, run 'cvm use <version>'" >&2
    exit 1
fi
version=$(cat "$root/active")
target="$root/versions/$version/$binary"
if [ ! -x "$target" ]; then
    echo "cvm: version $version is not installed" >&2
    exit 1
fi

start=$(date +%s)
if [ -t 0 ] && [ -t 1 ]; then
    "$target" "$@"
    code=$?
    end=$(date +%s)
    ("$manager" history record --version="$version" --exit-code="$code" \
        --duration-ms="$(((end - start) * 1000))" -- "$@" >/dev/null 2>&1 &)
    exit $code
fi

out=$(mktemp) || exit 1
err=$(mktemp) || exit 1
status=$(mktemp) || exit 1
# Both streams pass through tee as they arrive; copies feed the record.
{{ {{ "$target" "$@" 2>&1 1>&3 3>&-; echo $? >"$status"; }} | tee "$err" >&2; }} 3>&1 | tee "$out"
code=$(cat "$status")
code=${{code:-1}}
end=$(date +%s)
("$manager" history record --version="$version" --exit-code="$code" \
    --duration-ms="$(((end - start) * 1000))" \
    --stdout="$(head -c {budget} "$out")" --stderr="$(head -c {budget} "$err")" \
    -- "$@" >/dev/null 2>&1; rm -f "$out" "$err" "$status") &
exit $code
"#
        )
    }

    #[cfg(windows)]
    pub fn render_script(&self) -> String {
        let root = self.config.paths.root.to_string_lossy();
        let binary = self.config.binary_file_name();
        let manager = self.manager_command();

        format!(
            "@echo off\r\n\
             rem Generated by cvm on every activation. Do not edit.\r\n\
             setlocal\r\n\
             if not exist \"{root}\\active\" (\r\n\
             echo cvm: no active version, run 'cvm use ^<version^>' 1>&2\r\n\
             exit /b 1\r\n\
             )\r\n\
             set /p CVM_VERSION=<\"{root}\\active\"\r\n\
             \"{root}\\versions\\%CVM_VERSION%\\{binary}\" %*\r\n\
             set CVM_CODE=%ERRORLEVEL%\r\n\
             start \"\" /b \"{manager}\" history record --version=%CVM_VERSION% --exit-code=%CVM_CODE% --duration-ms=0 -- %* >nul 2>&1\r\n\
             exit /b %CVM_CODE%\r\n"
        )
    }
}

fn shim_error(error: std::io::Error) -> CvmError {
    CvmError::Shim {
        details: error.to_string(),
    }
}

#[cfg(not(windows))]
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
