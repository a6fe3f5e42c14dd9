use std::ffi::OsString;
use std::io::{ErrorKind, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use cvm_platform::{CvmPaths, Detach, HideWindow, executable_name, is_executable};
use log::{debug, warn};
use thiserror::Error;

/// Captured output forwarded to `cvm history record`, cut like `head -c`.
pub const RECORD_BYTE_BUDGET: usize = 4096;

const MANAGER_ENV: &str = "CVM_EXE";
const MANAGER_NAME: &str = "cvm";

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no active version, run 'cvm use <version>'")]
    NoActiveVersion,

    #[error("version {version} is not installed ({})", path.display())]
    NotInstalled { version: String, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to run {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What one pass through the shim produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub version: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
}

/// The shim is a copy of this binary named after the managed tool and
/// placed in `<root>/shims`. The root is taken from that location when it
/// matches, and from `$CVM_HOME` or the data directory otherwise.
pub fn locate_paths(shim_exe: &Path) -> Option<CvmPaths> {
    let shim_dir = shim_exe.parent()?;
    if shim_dir.file_name().is_some_and(|name| name == "shims")
        && let Some(root) = shim_dir.parent()
    {
        return Some(CvmPaths::with_root(root));
    }
    CvmPaths::new().ok()
}

/// Tool name as invoked: the file stem of the shim executable.
pub fn binary_name(shim_exe: &Path) -> Option<String> {
    shim_exe
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

pub fn active_version(paths: &CvmPaths) -> Result<String, DispatchError> {
    let path = paths.active_file();
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let version = content.trim();
            if version.is_empty() {
                Err(DispatchError::NoActiveVersion)
            } else {
                Ok(version.to_string())
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DispatchError::NoActiveVersion),
        Err(source) => Err(DispatchError::Read { path, source }),
    }
}

pub fn target_binary(
    paths: &CvmPaths,
    version: &str,
    binary_name: &str,
) -> Result<PathBuf, DispatchError> {
    let path = paths.version_dir(version).join(executable_name(binary_name));
    if is_executable(&path) {
        Ok(path)
    } else {
        Err(DispatchError::NotInstalled {
            version: version.to_string(),
            path,
        })
    }
}

/// Run the active version with `args`. With a terminal on both stdin and
/// stdout the child inherits stdio; otherwise both streams are forwarded
/// as they arrive and the head of each is kept for the history record.
pub fn dispatch(
    paths: &CvmPaths,
    binary_name: &str,
    args: &[OsString],
) -> Result<Dispatched, DispatchError> {
    let version = active_version(paths)?;
    let target = target_binary(paths, &version, binary_name)?;
    let interactive = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
    debug!(
        "Dispatching to {} (interactive: {interactive})",
        target.display()
    );

    let start = Instant::now();
    let spawn_error = |source| DispatchError::Spawn {
        path: target.clone(),
        source,
    };

    if interactive {
        let status = Command::new(&target)
            .args(args)
            .status()
            .map_err(spawn_error)?;
        return Ok(Dispatched {
            version,
            exit_code: status.code().unwrap_or(1),
            duration: start.elapsed(),
            stdout: None,
            stderr: None,
        });
    }

    let mut command = Command::new(&target);
    command.args(args);
    let (status, stdout, stderr) =
        run_teed(&mut command, std::io::stdout(), std::io::stderr()).map_err(spawn_error)?;

    Ok(Dispatched {
        version,
        exit_code: status.code().unwrap_or(1),
        duration: start.elapsed(),
        stdout: Some(stdout),
        stderr: Some(stderr),
    })
}

/// Spawn `command` with piped output and copy each stream to its sink on
/// its own thread. Returns the exit status and the first
/// `RECORD_BYTE_BUDGET` bytes of stdout and stderr.
pub fn run_teed(
    command: &mut Command,
    stdout_sink: impl Write + Send,
    stderr_sink: impl Write + Send,
) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let mut child = command
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .hide_window()
        .spawn()?;
    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let (stdout, stderr) = std::thread::scope(|scope| {
        let stdout = scope.spawn(move || {
            child_stdout
                .map(|reader| tee(reader, stdout_sink, RECORD_BYTE_BUDGET))
                .unwrap_or_default()
        });
        let stderr = scope.spawn(move || {
            child_stderr
                .map(|reader| tee(reader, stderr_sink, RECORD_BYTE_BUDGET))
                .unwrap_or_default()
        });
        (
            stdout.join().unwrap_or_default(),
            stderr.join().unwrap_or_default(),
        )
    });

    let status = child.wait()?;
    Ok((status, stdout, stderr))
}

/// Copy `reader` into `sink` chunk by chunk, flushing each one. Keeps the
/// first `budget` bytes. A sink that stops accepting writes is dropped and
/// the reader is still drained so the child never blocks on a full pipe.
fn tee(mut reader: impl Read, mut sink: impl Write, budget: usize) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut forwarding = true;
    let mut buf = [0u8; 8192];

    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Failed to read child output: {e}");
                break;
            }
        };
        let chunk = &buf[..read];

        let room = budget.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..read.min(room)]);

        if forwarding && let Err(e) = sink.write_all(chunk).and_then(|()| sink.flush()) {
            debug!("Stopped forwarding child output: {e}");
            forwarding = false;
        }
    }

    kept
}

/// `$CVM_EXE`, then the path recorded at activation, then `cvm` on PATH.
pub fn find_manager(paths: &CvmPaths) -> Option<PathBuf> {
    if let Some(exe) = std::env::var_os(MANAGER_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(exe));
    }

    if let Ok(recorded) = std::fs::read_to_string(paths.manager_file()) {
        let recorded = PathBuf::from(recorded.trim());
        if recorded.is_file() {
            return Some(recorded);
        }
        debug!("Recorded manager {} no longer exists", recorded.display());
    }

    which::which(MANAGER_NAME).ok()
}

/// First `budget` bytes as text, never splitting a character.
pub fn head_bytes(bytes: &[u8], budget: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= budget {
        return text.into_owned();
    }
    let mut end = budget;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Captured output as a single argv element: cut to the budget, with NUL
/// bytes dropped since no platform can pass them through argv.
fn record_text(bytes: &[u8]) -> String {
    head_bytes(bytes, RECORD_BYTE_BUDGET).replace('\0', "")
}

pub fn record_args(dispatched: &Dispatched, args: &[OsString]) -> Vec<OsString> {
    let mut record: Vec<OsString> = vec![
        "history".into(),
        "record".into(),
        format!("--version={}", dispatched.version).into(),
        format!("--exit-code={}", dispatched.exit_code).into(),
        format!("--duration-ms={}", dispatched.duration.as_millis()).into(),
    ];
    if let Some(stdout) = &dispatched.stdout {
        record.push(format!("--stdout={}", record_text(stdout)).into());
    }
    if let Some(stderr) = &dispatched.stderr {
        record.push(format!("--stderr={}", record_text(stderr)).into());
    }
    record.push("--".into());
    record.extend(args.iter().cloned());
    record
}

/// Hand the invocation to `cvm history record` without waiting for it.
/// Recording is best-effort; failures never change the shim's exit code.
pub fn record_in_background(paths: &CvmPaths, dispatched: &Dispatched, args: &[OsString]) {
    let Some(manager) = find_manager(paths) else {
        debug!("No cvm executable found, skipping history record");
        return;
    };

    if let Err(e) = Command::new(&manager)
        .args(record_args(dispatched, args))
        .detached()
        .spawn()
    {
        warn!("Failed to start history record via {}: {e}", manager.display());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use tempfile::tempdir;

    #[test]
    fn root_comes_from_the_shims_directory() {
        let temp_dir = tempdir().expect("create temp dir");
        let exe = temp_dir.path().join("shims").join("cli");
        let paths = locate_paths(&exe).expect("paths from location");
        assert_eq!(paths.root, temp_dir.path());
        assert_eq!(binary_name(&exe).as_deref(), Some("cli"));
    }

    #[test]
    fn missing_or_blank_active_file_means_no_active_version() {
        let temp_dir = tempdir().expect("create temp dir");
        let paths = CvmPaths::with_root(temp_dir.path());
        assert!(matches!(
            active_version(&paths),
            Err(DispatchError::NoActiveVersion)
        ));

        std::fs::write(paths.active_file(), "  \n").expect("write active");
        assert!(matches!(
            active_version(&paths),
            Err(DispatchError::NoActiveVersion)
        ));

        std::fs::write(paths.active_file(), "2.74.0\n").expect("write active");
        assert_eq!(active_version(&paths).expect("active"), "2.74.0");
    }

    #[test]
    fn uninstalled_target_is_reported() {
        let temp_dir = tempdir().expect("create temp dir");
        let paths = CvmPaths::with_root(temp_dir.path());
        let err = target_binary(&paths, "2.74.0", "cli").expect_err("not installed");
        assert!(err.to_string().contains("2.74.0 is not installed"));
    }

    #[test]
    fn head_bytes_respects_char_boundaries() {
        assert_eq!(head_bytes(b"hello", 10), "hello");
        assert_eq!(head_bytes(b"hello", 3), "hel");
        assert_eq!(head_bytes("héllo".as_bytes(), 2), "h");
    }

    #[test]
    fn record_args_use_inline_values_and_separator() {
        let dispatched = Dispatched {
            version: "2.74.0".to_string(),
            exit_code: 3,
            duration: Duration::from_millis(12),
            stdout: Some(b"-out".to_vec()),
            stderr: None,
        };
        let args = record_args(&dispatched, &["--help".into()]);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "history",
                "record",
                "--version=2.74.0",
                "--exit-code=3",
                "--duration-ms=12",
                "--stdout=-out",
                "--",
                "--help",
            ]
        );
    }

    #[test]
    fn record_args_drop_nul_bytes() {
        let dispatched = Dispatched {
            version: "2.74.0".to_string(),
            exit_code: 0,
            duration: Duration::ZERO,
            stdout: Some(b"a\0b".to_vec()),
            stderr: Some(b"\0".to_vec()),
        };
        let args = record_args(&dispatched, &[]);
        assert!(args.iter().any(|arg| arg == "--stdout=ab"));
        assert!(args.iter().any(|arg| arg == "--stderr="));
        assert!(
            args.iter()
                .all(|arg| !arg.to_string_lossy().contains('\0'))
        );
    }

    #[test]
    fn tee_forwards_everything_and_keeps_the_head() {
        let input = vec![b'x'; RECORD_BYTE_BUDGET * 3];
        let mut forwarded = Vec::new();
        let kept = tee(input.as_slice(), &mut forwarded, RECORD_BYTE_BUDGET);
        assert_eq!(forwarded.len(), input.len());
        assert_eq!(kept.len(), RECORD_BYTE_BUDGET);
    }

    /// Records which stream each chunk arrived on, in arrival order.
    #[derive(Clone)]
    struct Arrivals(Arc<Mutex<Vec<(&'static str, String)>>>);

    struct Tagged {
        stream: &'static str,
        arrivals: Arrivals,
    }

    impl Write for Tagged {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.arrivals
                .0
                .lock()
                .expect("arrivals lock")
                .push((self.stream, String::from_utf8_lossy(buf).into_owned()));
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[cfg(unix)]
    #[test]
    fn piped_output_streams_in_order() {
        let arrivals = Arrivals(Arc::new(Mutex::new(Vec::new())));
        let mut command = Command::new("/bin/sh");
        command.args([
            "-c",
            "echo out1; sleep 0.3; echo err1 >&2; sleep 0.3; echo out2; exit 3",
        ]);

        let started = Instant::now();
        let (status, stdout, stderr) = run_teed(
            &mut command,
            Tagged {
                stream: "out",
                arrivals: arrivals.clone(),
            },
            Tagged {
                stream: "err",
                arrivals: arrivals.clone(),
            },
        )
        .expect("run child");

        assert_eq!(status.code(), Some(3));
        assert_eq!(stdout, b"out1\nout2\n");
        assert_eq!(stderr, b"err1\n");
        assert!(started.elapsed() >= Duration::from_millis(600));

        let order: Vec<_> = arrivals
            .0
            .lock()
            .expect("arrivals lock")
            .iter()
            .map(|(stream, text)| format!("{stream}:{}", text.trim_end()))
            .collect();
        assert_eq!(order, vec!["out:out1", "err:err1", "out:out2"]);
    }

    #[cfg(unix)]
    #[test]
    fn dispatch_captures_output_and_exit_code() {
        let temp_dir = tempdir().expect("create temp dir");
        let paths = CvmPaths::with_root(temp_dir.path());
        let binary = paths.version_dir("2.74.0").join("cli");
        std::fs::create_dir_all(binary.parent().expect("parent")).expect("create dir");
        std::fs::write(&binary, "#!/bin/sh\necho \"ran $1\"\nexit 7\n").expect("write binary");
        cvm_platform::make_executable(&binary).expect("chmod");
        std::fs::write(paths.active_file(), "2.74.0").expect("write active");

        let dispatched = dispatch(&paths, "cli", &["x".into()]).expect("dispatch");
        assert_eq!(dispatched.exit_code, 7);
        assert_eq!(dispatched.version, "2.74.0");
        if let Some(stdout) = dispatched.stdout {
            assert_eq!(stdout, b"ran x\n");
        }
    }
}
