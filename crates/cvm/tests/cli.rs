#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::{TempDir, tempdir};

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            dir: tempdir().expect("create temp dir"),
        };
        std::fs::create_dir_all(sandbox.home()).expect("create home");
        std::fs::create_dir_all(sandbox.project()).expect("create project");
        sandbox
    }

    fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("cvm")
    }

    fn project(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    fn cvm(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cvm"))
            .args(args)
            .current_dir(self.project())
            .env("CVM_HOME", self.root())
            .env("HOME", self.home())
            .env("SHELL", "/bin/bash")
            .env("NO_COLOR", "1")
            .output()
            .expect("run cvm")
    }

    /// Stand-in for a downloaded release: prints a fixed line for
    /// `--version` and fails on anything else.
    fn install_fake(&self, version: &str) {
        let binary = self.root().join("versions").join(version).join("cli");
        std::fs::create_dir_all(binary.parent().expect("binary has parent"))
            .expect("create version dir");
        std::fs::write(
            &binary,
            "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo \"cli ok\"; exit 0; fi\necho \"bad flag\" >&2\nexit 2\n",
        )
        .expect("write fake binary");
        cvm_platform::make_executable(&binary).expect("chmod fake binary");
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[test]
fn alias_then_use_activates_and_writes_shim() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.74.0");

    let output = sandbox.cvm(&["alias", "set", "prod", "2.74.0"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = sandbox.cvm(&["use", "prod"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Now using 2.74.0"));

    let active = std::fs::read_to_string(sandbox.root().join("active")).expect("active file");
    assert_eq!(active.trim(), "2.74.0");

    let shim_dir = sandbox.root().join("shims");
    let shim = std::fs::read_dir(&shim_dir)
        .expect("shim dir")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.file_name().is_some_and(|name| name == "cli"))
        .expect("shim written");
    assert!(is_executable(&shim));

    let profile = sandbox.home().join(".bashrc");
    let first = std::fs::read_to_string(&profile).expect("profile written");
    assert!(first.contains(&shim_dir.display().to_string()));

    let output = sandbox.cvm(&["use", "prod"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        std::fs::read_to_string(&profile).expect("profile readable"),
        first
    );
}

#[test]
fn reserved_alias_is_rejected_in_any_case() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.74.0");

    for name in ["latest", "Latest", "LATEST"] {
        let output = sandbox.cvm(&["alias", "set", name, "2.74.0"]);
        assert_eq!(output.status.code(), Some(2));
        assert!(stderr(&output).contains("reserved"));
    }
}

#[test]
fn blocked_version_is_never_activated() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.73.0");

    assert!(sandbox.cvm(&["block", "2.73.0"]).status.success());
    let output = sandbox.cvm(&["use", "2.73.0"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("blocked"));
    assert!(!sandbox.root().join("active").exists());

    let output = sandbox.cvm(&["list-blocked"]);
    assert_eq!(stdout(&output).trim(), "2.73.0");
}

#[test]
fn marker_file_constraint_picks_highest_match() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.73.0");
    sandbox.install_fake("2.74.0");
    sandbox.install_fake("3.0.0");
    std::fs::write(sandbox.project().join(".cvm-version"), "<3.0.0\n").expect("write marker");

    let output = sandbox.cvm(&["use"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&sandbox.cvm(&["current"])).trim(), "2.74.0");
}

#[test]
fn compare_reports_identical_outputs() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.74.0");
    sandbox.install_fake("2.73.0");

    let output = sandbox.cvm(&["compare", "2.74.0", "2.73.0", "--", "--version"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("OUTPUTS ARE IDENTICAL"));
}

#[test]
fn compare_without_separator_is_a_usage_error() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.74.0");
    sandbox.install_fake("2.73.0");

    let output = sandbox.cvm(&["compare", "2.74.0", "2.73.0"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Missing command"));
}

#[test]
fn benchmark_with_trailing_iterations() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.74.0");
    sandbox.install_fake("2.73.0");

    let output = sandbox.cvm(&[
        "benchmark",
        "2.74.0,2.73.0",
        "--",
        "--version",
        "--iterations",
        "3",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("3 iteration(s) each"));
    assert_eq!(text.matches("100.0%").count(), 2);
    assert!(text.contains("(fastest)"));
}

#[test]
fn replaying_unknown_ids_fails() {
    let sandbox = Sandbox::new();

    for id in ["!999999", "!0", "!-1", "!abc"] {
        let output = sandbox.cvm(&["history", id]);
        assert!(!output.status.success(), "{id} should fail");
        assert!(stderr(&output).contains("not found"), "{id}: {}", stderr(&output));
    }
}

#[test]
fn recorded_invocations_are_listed_and_summarized() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.74.0");

    let output = sandbox.cvm(&[
        "history",
        "record",
        "--version=2.74.0",
        "--exit-code=0",
        "--duration-ms=12",
        "--stdout=cli ok",
        "--",
        "--version",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let listing = stdout(&sandbox.cvm(&["history"]));
    assert!(listing.contains("cli --version"));
    assert!(listing.contains("2.74.0"));

    let stats = stdout(&sandbox.cvm(&["history", "--stats"]));
    assert!(stats.contains("Total invocations: 1"));
    assert!(stats.contains("100.0%"));

    let output = sandbox.cvm(&["history", "!1"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("cli ok"));
    assert_eq!(stdout(&sandbox.cvm(&["current"])).trim(), "2.74.0");

    assert!(stdout(&sandbox.cvm(&["history", "--clear"])).contains("Cleared 1"));
}

#[test]
fn removing_the_active_version_clears_it() {
    let sandbox = Sandbox::new();
    sandbox.install_fake("2.74.0");
    assert!(sandbox.cvm(&["use", "2.74.0"]).status.success());

    let output = sandbox.cvm(&["remove", "2.74.0"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("no version is active"));
    assert_eq!(sandbox.cvm(&["current"]).status.code(), Some(1));
}
