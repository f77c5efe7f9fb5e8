//! Run report: what happened during one simulation, saved as JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reservoir_kernel::{ActorReport, Snapshot};

use crate::observer::LevelStats;
use crate::simulation::SimulationConfig;
use crate::tally::TallySummary;

/// Results from a single simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Effective configuration
    pub config: SimulationConfig,
    /// Seed of the rain stimulus, if fixed
    pub seed: Option<u64>,
    pub final_snapshot: Snapshot,
    /// Aggregates over the observer's samples
    pub level_stats: Option<LevelStats>,
    pub samples_taken: usize,
    /// Observer samples outside `[0, capacity_max]`; zero on a correct run
    pub invariant_violations: u64,
    pub events: TallySummary,
    /// Per-actor counters, in spawn order
    pub actors: Vec<ActorReport>,
    /// Actors that missed the shutdown grace period and were aborted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force_stopped: Vec<String>,
}

impl RunReport {
    /// Wall-clock length of the run; zero if the clock went backwards.
    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at).to_std().unwrap_or_default()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing run report to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading run report from {}", path.display()))?;
        let report = serde_json::from_str(&json)?;
        Ok(report)
    }
}

/// Insert the current UTC time before the extension of `path`.
///
/// `out/report.json` becomes `out/report-20261019T010530Z.json`; a path with
/// no extension gets `.json`.
pub fn timestamped_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_else(|| "report".into());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy())
        .unwrap_or_else(|| "json".into());
    path.with_file_name(format!("{stem}-{stamp}.{ext}"))
}

/// Human-readable run length: `850ms`, `12.3s`, or `4m 05s`.
pub fn format_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    match elapsed.as_secs() {
        0 => format!("{ms}ms"),
        secs @ 1..=59 => format!("{secs}.{}s", (ms % 1000) / 100),
        secs => format!("{}m {:02}s", secs / 60, secs % 60),
    }
}
