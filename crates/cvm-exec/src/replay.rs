use cvm_backend::{CvmError, VersionId};
use cvm_core::{ActivationManager, HistoryEntry, HistoryStore, parse_history_id};
use log::info;
use thiserror::Error;

use crate::engine::{ExecError, ExecutionEngine};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Cvm(#[from] CvmError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub entry: HistoryEntry,
    pub args: Vec<String>,
    pub exit_code: i32,
}

/// Split a recorded command into arguments, dropping a leading
/// `binary_name` token.
pub fn replay_args(command: &str, binary_name: &str) -> Vec<String> {
    let mut parts = command.split_whitespace().peekable();
    if parts.peek().is_some_and(|first| *first == binary_name) {
        parts.next();
    }
    parts.map(str::to_string).collect()
}

/// Re-run history entry `id` (`42` or `!42`): switch the active pointer to
/// the recorded version, then run the command in the foreground.
pub async fn replay(
    history: &HistoryStore,
    activation: &ActivationManager,
    engine: &ExecutionEngine,
    id: &str,
) -> Result<ReplayOutcome, ReplayError> {
    let entry = history.get(parse_history_id(id)?)?;
    let version: &VersionId = &entry.version;
    engine.store().exists(version)?;

    activation.set_active(version)?;
    let args = replay_args(&entry.command, &engine.store().config().binary_name);
    info!("Replaying #{} on {version}: {}", entry.id, args.join(" "));

    let exit_code = engine.run_foreground(version, &args).await?;
    Ok(ReplayOutcome {
        entry,
        args,
        exit_code,
    })
}
