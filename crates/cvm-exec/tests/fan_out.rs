#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use cvm_backend::{Version, VersionId};
use cvm_core::{
    ActivationManager, HistoryStore, NewEntry, Resolver, ShimWriter, ToolConfig, VersionStore,
};
use cvm_exec::{
    ExecContext, ExecError, ExecutionEngine, are_outputs_identical, rank, replay,
};
use cvm_platform::{CvmPaths, make_executable};
use tempfile::tempdir;

fn store(root: &Path) -> VersionStore {
    VersionStore::new(ToolConfig::new(CvmPaths::with_root(root), "cli"))
}

fn fake_binary(store: &VersionStore, version: &str, body: &str) -> VersionId {
    let version = VersionId::parse_token(version).expect("valid version");
    let path = store.binary_path(&version);
    std::fs::create_dir_all(path.parent().expect("binary has parent")).expect("create dir");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake binary");
    make_executable(&path).expect("chmod fake binary");
    version
}

const VERSION_SCRIPT: &str = r#"if [ "$1" = "--version" ]; then echo "cli ok"; exit 0; fi
echo "unknown flag $1" >&2
exit 2"#;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

#[tokio::test]
async fn compare_with_identical_output_is_identical() {
    let temp_dir = tempdir().expect("create temp dir");
    let store = store(temp_dir.path());
    let left = fake_binary(&store, "2.74.0", VERSION_SCRIPT);
    let right = fake_binary(&store, "2.73.0", VERSION_SCRIPT);
    let engine = ExecutionEngine::new(store);

    let outcome = engine
        .compare(
            &ExecContext::with_timeout(Duration::from_secs(10)),
            &left,
            &right,
            &args(&["--version"]),
        )
        .await;

    assert!(outcome.first_error.is_none());
    assert_eq!(outcome.items[0].stdout, "cli ok\n");
    assert!(are_outputs_identical(&outcome.items[0], &outcome.items[1]));
}

#[tokio::test]
async fn compare_reports_differing_exit_codes() {
    let temp_dir = tempdir().expect("create temp dir");
    let store = store(temp_dir.path());
    let left = fake_binary(&store, "2.74.0", "echo same; exit 0");
    let right = fake_binary(&store, "2.73.0", "echo same; exit 4");
    let engine = ExecutionEngine::new(store);

    let outcome = engine
        .compare(&ExecContext::new(), &left, &right, &args(&["status"]))
        .await;

    assert_eq!(outcome.items[1].exit_code, 4);
    assert!(!are_outputs_identical(&outcome.items[0], &outcome.items[1]));
}

#[tokio::test]
async fn missing_version_does_not_abort_its_sibling() {
    let temp_dir = tempdir().expect("create temp dir");
    let store = store(temp_dir.path());
    let present = fake_binary(&store, "2.74.0", VERSION_SCRIPT);
    let missing = VersionId::Release(Version::new(1, 0, 0));
    let engine = ExecutionEngine::new(store);

    let outcome = engine
        .compare(&ExecContext::new(), &present, &missing, &args(&["--version"]))
        .await;

    assert!(matches!(
        outcome.first_error,
        Some(ExecError::BinaryNotFound { .. })
    ));
    assert!(outcome.items[0].succeeded());
    assert_eq!(outcome.items[1].exit_code, 1);
    assert!(outcome.items[1].error.is_some());
}

#[tokio::test]
async fn deadline_kills_slow_child_only() {
    let temp_dir = tempdir().expect("create temp dir");
    let store = store(temp_dir.path());
    let fast = fake_binary(&store, "2.74.0", VERSION_SCRIPT);
    let slow = fake_binary(&store, "2.73.0", "sleep 5");
    let engine = ExecutionEngine::new(store);

    let results = engine
        .fan_out(
            &ExecContext::with_timeout(Duration::from_millis(500)),
            &[fast, slow],
            &args(&["--version"]),
        )
        .await;

    assert!(results[0].as_ref().is_ok_and(|r| r.succeeded()));
    assert!(matches!(results[1], Err(ExecError::TimedOut { .. })));
}

#[tokio::test]
async fn benchmark_runs_each_version_for_every_iteration() {
    let temp_dir = tempdir().expect("create temp dir");
    let store = store(temp_dir.path());
    let newer = fake_binary(&store, "2.74.0", VERSION_SCRIPT);
    let older = fake_binary(&store, "2.73.0", VERSION_SCRIPT);
    let engine = ExecutionEngine::new(store);

    let outcome = engine
        .benchmark(
            &ExecContext::with_timeout(Duration::from_secs(30)),
            &[newer, older],
            &args(&["--version"]),
            3,
        )
        .await;

    assert!(outcome.first_error.is_none());
    assert_eq!(outcome.items.len(), 2);
    for run in &outcome.items {
        assert_eq!(run.results.len(), 3);
        assert!(run.results.iter().all(|result| result.version == run.version));
    }
    for ranked in rank(&outcome.items) {
        assert!((ranked.stats.success_rate - 100.0).abs() < f64::EPSILON);
    }
}

#[tokio::test]
async fn benchmark_iterations_run_concurrently() {
    let temp_dir = tempdir().expect("create temp dir");
    let store = store(temp_dir.path());
    let slow = fake_binary(&store, "2.74.0", "sleep 0.5\necho done");
    let engine = ExecutionEngine::new(store);

    let started = std::time::Instant::now();
    let outcome = engine
        .benchmark(
            &ExecContext::with_timeout(Duration::from_secs(30)),
            &[slow],
            &args(&[]),
            4,
        )
        .await;
    let elapsed = started.elapsed();

    assert!(outcome.first_error.is_none());
    let results = &outcome.items[0].results;
    assert_eq!(results.len(), 4);

    // Every iteration starts before any other one finishes.
    let last_start = results
        .iter()
        .map(|result| result.start_time)
        .max()
        .expect("results present");
    let first_end = results
        .iter()
        .map(|result| {
            result.start_time
                + chrono::Duration::from_std(result.duration).expect("duration fits")
        })
        .min()
        .expect("results present");
    assert!(last_start < first_end);
    assert!(elapsed < Duration::from_millis(1800));
}

#[tokio::test]
async fn replay_switches_active_version_and_runs_command() {
    let temp_dir = tempdir().expect("create temp dir");
    let store = store(temp_dir.path());
    let version = fake_binary(&store, "2.73.0", VERSION_SCRIPT);
    let config = store.config().clone();
    let engine = ExecutionEngine::new(store.clone());
    let activation = ActivationManager::new(
        Resolver::new(store, std::sync::Arc::new(NoNetwork), std::sync::Arc::new(NoNetwork)),
        ShimWriter::new(config.clone(), None),
        None,
    );
    let history = HistoryStore::new(&config.paths);
    let recorded = history
        .append(NewEntry {
            version: version.clone(),
            timestamp: Utc::now(),
            command: "cli --version".to_string(),
            duration: Duration::from_millis(4),
            exit_code: 0,
            stdout: "cli ok\n".to_string(),
            stderr: String::new(),
        })
        .expect("append history")
        .expect("entry is recordable");

    let outcome = replay(&history, &activation, &engine, &format!("!{}", recorded.id))
        .await
        .expect("replay succeeds");

    assert_eq!(outcome.args, vec!["--version"]);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(
        activation.active_version().expect("active version set"),
        version
    );

    assert!(replay(&history, &activation, &engine, "!999999").await.is_err());
    assert!(replay(&history, &activation, &engine, "!0").await.is_err());
}

struct NoNetwork;

#[async_trait::async_trait]
impl cvm_backend::Installer for NoNetwork {
    async fn install(
        &self,
        _version: &Version,
        _destination: &Path,
    ) -> Result<(), cvm_backend::CvmError> {
        Err(cvm_backend::CvmError::network("download", "offline"))
    }
}

#[async_trait::async_trait]
impl cvm_backend::LatestVersionSource for NoNetwork {
    async fn latest_version(&self) -> Result<Version, cvm_backend::CvmError> {
        Err(cvm_backend::CvmError::network("latest release lookup", "offline"))
    }
}
