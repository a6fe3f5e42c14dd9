use std::fmt::Write as _;
use std::time::Duration;

use console::style;
use cvm_backend::VersionId;

use crate::engine::{BenchmarkRun, ExecutionResult};

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkStats {
    pub version: VersionId,
    pub iterations: usize,
    pub successes: usize,
    pub total: Duration,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
    /// Percentage of iterations that exited 0.
    pub success_rate: f64,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn summarize(version: &VersionId, results: &[ExecutionResult]) -> BenchmarkStats {
    let iterations = results.len();
    let successes = results.iter().filter(|r| r.succeeded()).count();
    let total: Duration = results.iter().map(|r| r.duration).sum();
    let min = results.iter().map(|r| r.duration).min().unwrap_or_default();
    let max = results.iter().map(|r| r.duration).max().unwrap_or_default();

    let (average, success_rate) = if iterations == 0 {
        (Duration::ZERO, 0.0)
    } else {
        (
            total / iterations as u32,
            successes as f64 / iterations as f64 * 100.0,
        )
    };

    BenchmarkStats {
        version: version.clone(),
        iterations,
        successes,
        total,
        average,
        min,
        max,
        success_rate,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub stats: BenchmarkStats,
    /// Average duration relative to the fastest version; 1.0 for the fastest.
    pub relative: f64,
}

/// Order by average duration, fastest first.
pub fn rank(runs: &[BenchmarkRun]) -> Vec<Ranked> {
    let mut stats: Vec<BenchmarkStats> = runs
        .iter()
        .map(|run| summarize(&run.version, &run.results))
        .collect();
    stats.sort_by_key(|s| s.average);

    let fastest = stats
        .first()
        .map(|s| s.average.as_secs_f64())
        .unwrap_or_default();

    stats
        .into_iter()
        .map(|stats| {
            let relative = if fastest > 0.0 {
                stats.average.as_secs_f64() / fastest
            } else {
                1.0
            };
            Ranked { stats, relative }
        })
        .collect()
}

fn millis(duration: Duration) -> String {
    format!("{:.2}ms", duration.as_secs_f64() * 1000.0)
}

pub fn render_stats(ranked: &[Ranked]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:>6} {:>12} {:>12} {:>12} {:>9}",
        "version", "runs", "avg", "min", "max", "success"
    );
    for Ranked { stats, .. } in ranked {
        let _ = writeln!(
            out,
            "{:<16} {:>6} {:>12} {:>12} {:>12} {:>8.1}%",
            stats.version.to_string(),
            stats.iterations,
            millis(stats.average),
            millis(stats.min),
            millis(stats.max),
            stats.success_rate
        );
    }
    out
}

pub fn render_ranking(ranked: &[Ranked]) -> String {
    let mut out = String::new();
    for (position, entry) in ranked.iter().enumerate() {
        let label = if position == 0 {
            style("fastest".to_string()).green()
        } else {
            style(format!("{:.2}x slower", entry.relative)).yellow()
        };
        let _ = writeln!(
            out,
            "{}. {} {} ({label})",
            position + 1,
            entry.stats.version,
            millis(entry.stats.average)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use cvm_backend::{Version, VersionId};

    use super::*;

    fn run(version: Version, millis: &[u64], exit_code: i32) -> BenchmarkRun {
        let version = VersionId::Release(version);
        BenchmarkRun {
            version: version.clone(),
            results: millis
                .iter()
                .map(|ms| ExecutionResult {
                    version: version.clone(),
                    command: "--version".to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code,
                    duration: Duration::from_millis(*ms),
                    start_time: Utc::now(),
                    error: None,
                })
                .collect(),
        }
    }

    #[test]
    fn summarize_computes_totals_and_success_rate() {
        let run = run(Version::new(1, 0, 0), &[10, 20, 30], 0);
        let stats = summarize(&run.version, &run.results);

        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.total, Duration::from_millis(60));
        assert_eq!(stats.average, Duration::from_millis(20));
        assert_eq!(stats.min, Duration::from_millis(10));
        assert_eq!(stats.max, Duration::from_millis(30));
        assert!((stats.success_rate - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_iterations_lower_success_rate() {
        let mut run = run(Version::new(1, 0, 0), &[10, 10], 0);
        run.results[1].exit_code = 2;
        let stats = summarize(&run.version, &run.results);
        assert!((stats.success_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rank_orders_fastest_first_with_relative_factor() {
        let runs = vec![
            run(Version::new(2, 73, 0), &[30, 30], 0),
            run(Version::new(2, 74, 0), &[10, 10], 0),
        ];
        let ranked = rank(&runs);

        assert_eq!(ranked[0].stats.version.to_string(), "2.74.0");
        assert!((ranked[0].relative - 1.0).abs() < f64::EPSILON);
        assert!((ranked[1].relative - 3.0).abs() < 1e-9);

        let text = console::strip_ansi_codes(&render_ranking(&ranked)).into_owned();
        assert!(text.contains("1. 2.74.0 10.00ms (fastest)"));
        assert!(text.contains("2. 2.73.0 30.00ms (3.00x slower)"));
    }

    #[test]
    fn empty_run_has_zeroed_stats() {
        let stats = summarize(&VersionId::Linked("dev".to_string()), &[]);
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.average, Duration::ZERO);
        assert!(stats.success_rate.abs() < f64::EPSILON);
    }
}
