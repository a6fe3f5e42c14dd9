use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cvm_backend::VersionId;
use cvm_core::VersionStore;
use cvm_platform::HideWindow;
use futures_util::future::join_all;
use log::{debug, trace, warn};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("Binary for {version} not found at {}", path.display())]
    BinaryNotFound { version: VersionId, path: PathBuf },

    #[error("Failed to start {version}: {details}")]
    Spawn { version: VersionId, details: String },

    #[error("Failed while waiting for {version}: {details}")]
    Wait { version: VersionId, details: String },

    #[error("{version} did not finish within {}s", timeout.as_secs())]
    TimedOut {
        version: VersionId,
        timeout: Duration,
    },

    #[error("{version} was cancelled")]
    Cancelled { version: VersionId },
}

/// Cancellation scope shared by a group of invocations: an explicit token
/// plus an optional deadline. Expiry kills the affected children only.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some((Instant::now() + timeout, timeout)),
        }
    }

    /// A context cancelled together with this one but cancellable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    async fn expired(&self, version: &VersionId) -> ExecError {
        match self.deadline {
            Some((deadline, timeout)) => tokio::select! {
                () = self.token.cancelled() => ExecError::Cancelled { version: version.clone() },
                () = tokio::time::sleep_until(deadline) => ExecError::TimedOut {
                    version: version.clone(),
                    timeout,
                },
            },
            None => {
                self.token.cancelled().await;
                ExecError::Cancelled {
                    version: version.clone(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub version: VersionId,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub start_time: DateTime<Utc>,
    /// Set when the process could not be run to completion at all.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Record an invocation that never produced an exit status. Such
    /// results always carry exit code 1.
    pub fn from_error(version: VersionId, args: &[String], error: &ExecError) -> Self {
        Self {
            version,
            command: args.join(" "),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 1,
            duration: Duration::ZERO,
            start_time: Utc::now(),
            error: Some(error.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }

    /// Output to compare across versions. Successful runs contribute both
    /// streams; failed runs prefer stdout and fall back to stderr.
    pub fn merged_output(&self) -> String {
        if self.succeeded() {
            format!("{}{}", self.stdout, self.stderr)
        } else if !self.stdout.is_empty() {
            self.stdout.clone()
        } else {
            self.stderr.clone()
        }
    }
}

/// Outcome of a best-effort fan-out: every slot is filled, and the first
/// failure is kept for an advisory warning.
#[derive(Debug, Clone)]
pub struct FanOut<T> {
    pub items: Vec<T>,
    pub first_error: Option<ExecError>,
}

#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub version: VersionId,
    pub results: Vec<ExecutionResult>,
}

/// Runs installed versions' binaries directly, bypassing the active pointer.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    store: VersionStore,
}

impl ExecutionEngine {
    pub fn new(store: VersionStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    fn binary_for(&self, version: &VersionId) -> Result<PathBuf, ExecError> {
        let path = self.store.binary_path(version);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ExecError::BinaryNotFound {
                version: version.clone(),
                path,
            })
        }
    }

    /// Run `version` with `args`, capturing both streams. A non-zero exit is
    /// a normal result; only failing to run the process is an error.
    pub async fn invoke(
        &self,
        ctx: &ExecContext,
        version: &VersionId,
        args: &[String],
    ) -> Result<ExecutionResult, ExecError> {
        let binary = self.binary_for(version)?;
        debug!("Invoking {} {}", binary.display(), args.join(" "));

        let mut command = Command::new(&binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command.hide_window();

        let start_time = Utc::now();
        let started = Instant::now();
        let child = command.spawn().map_err(|e| ExecError::Spawn {
            version: version.clone(),
            details: e.to_string(),
        })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| ExecError::Wait {
                version: version.clone(),
                details: e.to_string(),
            })?,
            error = ctx.expired(version) => {
                warn!("{error}");
                return Err(error);
            }
        };
        let duration = started.elapsed();

        let exit_code = output.status.code().unwrap_or(1);
        trace!("{version} exited with {exit_code} after {duration:?}");

        Ok(ExecutionResult {
            version: version.clone(),
            command: args.join(" "),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
            duration,
            start_time,
            error: None,
        })
    }

    /// Invoke every target concurrently under `ctx`. One task per target;
    /// a failing task never cancels its siblings.
    pub async fn fan_out(
        &self,
        ctx: &ExecContext,
        targets: &[VersionId],
        args: &[String],
    ) -> Vec<Result<ExecutionResult, ExecError>> {
        let handles: Vec<_> = targets
            .iter()
            .map(|version| {
                let engine = self.clone();
                let ctx = ctx.child();
                let version = version.clone();
                let args = args.to_vec();
                tokio::spawn(async move { engine.invoke(&ctx, &version, &args).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, version)| {
                joined.unwrap_or_else(|e| {
                    Err(ExecError::Wait {
                        version: version.clone(),
                        details: e.to_string(),
                    })
                })
            })
            .collect()
    }

    /// Run `args` against both versions at once, turning failures into
    /// displayable results.
    pub async fn compare(
        &self,
        ctx: &ExecContext,
        left: &VersionId,
        right: &VersionId,
        args: &[String],
    ) -> FanOut<ExecutionResult> {
        let targets = [left.clone(), right.clone()];
        let outcomes = self.fan_out(ctx, &targets, args).await;
        collect_best_effort(&targets, args, outcomes)
    }

    /// Every (version, iteration) pair runs as its own task under the one
    /// shared `ctx`; results are grouped back per version in input order.
    pub async fn benchmark(
        &self,
        ctx: &ExecContext,
        versions: &[VersionId],
        args: &[String],
        iterations: usize,
    ) -> FanOut<BenchmarkRun> {
        let targets: Vec<VersionId> = versions
            .iter()
            .flat_map(|version| std::iter::repeat_n(version.clone(), iterations))
            .collect();
        let outcomes = self.fan_out(ctx, &targets, args).await;
        let FanOut {
            items: results,
            first_error,
        } = collect_best_effort(&targets, args, outcomes);

        let mut results = results.into_iter();
        let items = versions
            .iter()
            .map(|version| BenchmarkRun {
                version: version.clone(),
                results: results.by_ref().take(iterations).collect(),
            })
            .collect();

        FanOut { items, first_error }
    }

    /// Run `version` in the foreground with inherited stdio and return its
    /// exit code.
    pub async fn run_foreground(
        &self,
        version: &VersionId,
        args: &[String],
    ) -> Result<i32, ExecError> {
        let binary = self.binary_for(version)?;
        run_inherited(&binary, version, args).await
    }
}

async fn run_inherited(
    binary: &Path,
    version: &VersionId,
    args: &[String],
) -> Result<i32, ExecError> {
    debug!(
        "Running {} {} in the foreground",
        binary.display(),
        args.join(" ")
    );
    let status = Command::new(binary)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| ExecError::Spawn {
            version: version.clone(),
            details: e.to_string(),
        })?;
    Ok(status.code().unwrap_or(1))
}

fn collect_best_effort(
    targets: &[VersionId],
    args: &[String],
    outcomes: Vec<Result<ExecutionResult, ExecError>>,
) -> FanOut<ExecutionResult> {
    let mut first_error = None;
    let items = outcomes
        .into_iter()
        .zip(targets)
        .map(|(outcome, version)| match outcome {
            Ok(result) => result,
            Err(error) => {
                let result = ExecutionResult::from_error(version.clone(), args, &error);
                first_error.get_or_insert(error);
                result
            }
        })
        .collect();
    FanOut { items, first_error }
}
