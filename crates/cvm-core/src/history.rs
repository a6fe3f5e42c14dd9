use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cvm_backend::{CvmError, VersionId};
use cvm_platform::CvmPaths;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::MANAGER_NAME;
use crate::fs::write_atomic;

pub const HISTORY_CAP: usize = 1000;
/// Maximum bytes kept from each of stdout and stderr.
pub const OUTPUT_BYTE_BUDGET: usize = 4096;
const TRUNCATION_SUFFIX: &str = "...[truncated]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: u64,
    pub version: VersionId,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    /// Wall-clock duration in milliseconds.
    pub duration: u64,
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl HistoryEntry {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration)
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// An invocation to record; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub version: VersionId,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub duration: Duration,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStats {
    pub total: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub average_duration: Duration,
    pub per_version: BTreeMap<VersionId, usize>,
}

/// Size-capped invocation log stored as a single JSON array. Every append
/// rewrites the whole file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    manager_name: String,
}

impl HistoryStore {
    pub fn new(paths: &CvmPaths) -> Self {
        Self {
            path: paths.history_file(),
            manager_name: MANAGER_NAME.to_string(),
        }
    }

    pub fn load(&self) -> Result<Vec<HistoryEntry>, CvmError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| CvmError::serialization_from("history", e))
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), CvmError> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| CvmError::serialization_from("history", e))?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    /// Invocations of the manager itself are not recorded.
    pub fn is_recordable(&self, command: &str) -> bool {
        command
            .split_whitespace()
            .next()
            .is_some_and(|program| program != self.manager_name)
    }

    /// Append an entry, evicting the oldest beyond [`HISTORY_CAP`] and
    /// renumbering survivors `1..=n`. Returns the stored entry, or `None`
    /// when the command is not recordable.
    pub fn append(&self, entry: NewEntry) -> Result<Option<HistoryEntry>, CvmError> {
        if !self.is_recordable(&entry.command) {
            debug!("Not recording manager command {:?}", entry.command);
            return Ok(None);
        }

        let mut entries = self.load()?;
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        entries.push(HistoryEntry {
            id: next_id,
            version: entry.version,
            timestamp: entry.timestamp,
            command: entry.command,
            duration: u64::try_from(entry.duration.as_millis()).unwrap_or(u64::MAX),
            exit_code: entry.exit_code,
            stdout: truncate_output(&entry.stdout),
            stderr: truncate_output(&entry.stderr),
        });

        if entries.len() > HISTORY_CAP {
            let excess = entries.len() - HISTORY_CAP;
            entries.drain(..excess);
            for (id, entry) in (1..).zip(entries.iter_mut()) {
                entry.id = id;
            }
            debug!("Dropped {excess} oldest history entries");
        }

        self.save(&entries)?;
        Ok(entries.last().cloned())
    }

    pub fn get(&self, id: u64) -> Result<HistoryEntry, CvmError> {
        self.load()?
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| CvmError::HistoryEntryNotFound { id: id.to_string() })
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, CvmError> {
        let mut entries = self.load()?;
        if let Some(limit) = limit
            && entries.len() > limit
        {
            entries.drain(..entries.len() - limit);
        }
        Ok(entries)
    }

    /// Empty the log and return how many entries it held. An unreadable log
    /// is reset too, since clearing is how a damaged file gets repaired.
    pub fn clear(&self) -> Result<usize, CvmError> {
        let count = match self.load() {
            Ok(entries) => entries.len(),
            Err(e) => {
                warn!("Discarding unreadable history log {}: {e}", self.path.display());
                0
            }
        };
        self.save(&[])?;
        Ok(count)
    }

    pub fn stats(&self) -> Result<HistoryStats, CvmError> {
        Ok(compute_stats(&self.load()?))
    }
}

#[allow(clippy::cast_precision_loss)]
fn compute_stats(entries: &[HistoryEntry]) -> HistoryStats {
    let total = entries.len();
    let successes = entries.iter().filter(|e| e.succeeded()).count();
    let mut per_version = BTreeMap::new();
    for entry in entries {
        *per_version.entry(entry.version.clone()).or_insert(0) += 1;
    }

    let (success_rate, average_duration) = if total == 0 {
        (0.0, Duration::ZERO)
    } else {
        let total_ms: u64 = entries.iter().map(|e| e.duration).sum();
        (
            successes as f64 / total as f64 * 100.0,
            Duration::from_millis(total_ms / total as u64),
        )
    };

    HistoryStats {
        total,
        successes,
        success_rate,
        average_duration,
        per_version,
    }
}

/// Parse a user-supplied id such as `!42`. Zero, negative and non-numeric
/// ids can never exist, so they report the entry as not found.
pub fn parse_history_id(input: &str) -> Result<u64, CvmError> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix('!').unwrap_or(trimmed);
    match digits.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id.unsigned_abs()),
        _ => Err(CvmError::HistoryEntryNotFound {
            id: trimmed.to_string(),
        }),
    }
}

/// Cap `output` at [`OUTPUT_BYTE_BUDGET`] bytes on a character boundary.
pub fn truncate_output(output: &str) -> String {
    if output.len() <= OUTPUT_BYTE_BUDGET {
        return output.to_string();
    }
    let mut end = OUTPUT_BYTE_BUDGET;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{TRUNCATION_SUFFIX}", &output[..end])
}
