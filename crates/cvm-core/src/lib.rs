//! Persistent state and activation for cvm.
//!
//! This crate owns everything under the cvm root directory:
//! - Installed versions, aliases and the block list.
//! - Token resolution (aliases, constraints, marker files, `latest`).
//! - Activation: the active pointer, the shim and the profile PATH block.
//! - The invocation history log.
//! - HTTP collaborators for installing releases and finding the latest one.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod activation;
mod alias;
mod blocklist;
mod config;
mod fs;
mod health;
mod history;
mod install;
mod latest;
mod resolver;
mod shim;
mod store;

/// Active-version state machine and activation reports.
pub use activation::{
    ActivationManager, ActivationReport, ActivationState, ActivationWarning, ProfileTarget,
    ProfileUpdate,
};
pub use alias::{Alias, AliasStore};
pub use blocklist::BlockList;
pub use config::{DEFAULT_MARKER_FILE, MANAGER_NAME, ToolConfig};
/// Read-only diagnostics behind `cvm health-check`.
pub use health::{CheckStatus, HealthCheck, HealthReport, run_health_check};
/// Size-capped invocation log.
pub use history::{
    HISTORY_CAP, HistoryEntry, HistoryStats, HistoryStore, NewEntry, OUTPUT_BYTE_BUDGET,
    parse_history_id, truncate_output,
};
/// Release downloader with retry and checksum policy.
pub use install::{DEFAULT_RETRY_DELAYS_SECS, HttpInstaller};
pub use latest::{GithubLatestSource, parse_release_tag};
pub use resolver::{Resolution, ResolutionSource, Resolver};
pub use shim::{DISPATCHER_NAME, ShimKind, ShimWriter};
pub use store::VersionStore;
