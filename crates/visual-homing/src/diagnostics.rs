//! Optional observers for perfect memory training and queries.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::types::{HomingResult, MatchResult, Snapshot};

/// Receives training and query events from a [`crate::PerfectMemory`].
///
/// Observers never influence results. Both hooks default to doing nothing.
pub trait MatchObserver: Send + Sync {
    fn on_train(&self, _index: usize, _snapshot: &Snapshot) {}

    fn on_test(&self, _report: &RidfReport) {}
}

/// Everything a single query computed.
#[derive(Debug, Clone)]
pub struct RidfReport {
    /// Zero-based count of queries issued to this memory.
    pub test_index: usize,
    pub query: Snapshot,
    /// Sum of absolute differences, one row per rotation, one column per stored snapshot.
    pub distances: Array2<f64>,
    pub result: MatchResult,
}

impl RidfReport {
    /// Best value over all stored snapshots for each rotation.
    pub fn rotation_minima(&self) -> Vec<f64> {
        self.distances
            .rows()
            .into_iter()
            .map(|row| row.iter().copied().fold(f64::INFINITY, f64::min))
            .collect()
    }

    /// The distance matrix as CSV, one line per rotation.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in self.distances.rows() {
            let line: Vec<String> = row.iter().map(|d| d.to_string()).collect();
            out.push_str(&line.join(", "));
            out.push('\n');
        }
        out
    }

    /// Short human-readable summary of the decision.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "test{}: ", self.test_index);
        let _ = writeln!(out, "- rotation: {}", self.result.heading_degrees());
        let _ = writeln!(
            out,
            "- snap: {} (n={})",
            self.result.snapshot_index,
            self.distances.ncols()
        );
        let _ = writeln!(out, "- value: {}", self.result.match_value);
        out.push('\n');
        out
    }
}

/// Dumps snapshots, RIDF matrices, and decisions into a directory.
///
/// Layout: `snapshot{n}.png` for the n-th trained snapshot (1-based), and for
/// query `k`: `{k}_current.png`, `{k}_ridf.csv`, `{k}_log.txt`. Write
/// failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct DumpObserver {
    dir: PathBuf,
}

impl DumpObserver {
    /// Create the dump directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> HomingResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_test(&self, report: &RidfReport) -> HomingResult<()> {
        let prefix = report.test_index.to_string();
        report
            .query
            .as_image()
            .save(self.dir.join(format!("{prefix}_current.png")))?;
        std::fs::write(self.dir.join(format!("{prefix}_ridf.csv")), report.to_csv())?;
        std::fs::write(self.dir.join(format!("{prefix}_log.txt")), report.summary())?;
        Ok(())
    }
}

impl MatchObserver for DumpObserver {
    fn on_train(&self, index: usize, snapshot: &Snapshot) {
        let path = self.dir.join(format!("snapshot{}.png", index + 1));
        if let Err(e) = snapshot.as_image().save(&path) {
            tracing::warn!("Failed to dump snapshot to {}: {e}", path.display());
        }
    }

    fn on_test(&self, report: &RidfReport) {
        if let Err(e) = self.write_test(report) {
            tracing::warn!(
                "Failed to dump query {} to {}: {e}",
                report.test_index,
                self.dir.display()
            );
        }
    }
}
