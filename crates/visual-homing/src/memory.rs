//! Perfect memory: every training snapshot is kept and queried by rotational image difference.

use std::f64::consts::TAU;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ndarray::Array2;
use rayon::prelude::*;

use crate::config::MemoryConfig;
use crate::diagnostics::{MatchObserver, RidfReport};
use crate::scratch::ScratchPool;
use crate::types::{HomingError, HomingResult, MatchResult, Snapshot};

/// Growable database of snapshots with a rotation-invariant nearest-match query.
///
/// `test` takes `&self` and draws its rotation buffers from an internal
/// pool, so any number of queries may run at once. `train` takes `&mut self`
/// and therefore excludes them.
pub struct PerfectMemory {
    config: MemoryConfig,
    snapshots: Vec<Snapshot>,
    scratch: ScratchPool,
    observer: Option<Arc<dyn MatchObserver>>,
    test_count: AtomicUsize,
}

/// Running minimum over (rotation, snapshot) pairs.
///
/// Pairs must be offered rotation-major, snapshot-minor; only a strictly
/// smaller value replaces the current best, so the first minimum wins.
#[derive(Debug, Clone, Copy)]
struct Best {
    value: u64,
    rotation: usize,
    snapshot: usize,
}

impl Best {
    fn offer(best: &mut Option<Best>, rotation: usize, snapshot: usize, value: u64) {
        if best.map_or(true, |b| value < b.value) {
            *best = Some(Best {
                value,
                rotation,
                snapshot,
            });
        }
    }
}

impl PerfectMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            snapshots: Vec::new(),
            scratch: ScratchPool::new(),
            observer: None,
            test_count: AtomicUsize::new(0),
        }
    }

    /// Build a memory from previously stored snapshots, in index order.
    pub fn from_snapshots(config: MemoryConfig, snapshots: Vec<Snapshot>) -> HomingResult<Self> {
        let mut memory = Self::new(config);
        memory.snapshots.reserve(snapshots.len());
        for snapshot in snapshots {
            memory.check_trainable(&snapshot)?;
            memory.snapshots.push(snapshot);
        }
        Ok(memory)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Install an observer for training and query events.
    pub fn set_observer(&mut self, observer: Arc<dyn MatchObserver>) {
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Dimensions shared by every stored snapshot, `None` while empty.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.snapshots.first().map(Snapshot::dimensions)
    }

    pub fn snapshot(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Store a copy of `snapshot`; returns its index.
    pub fn train(&mut self, snapshot: &Snapshot) -> HomingResult<usize> {
        self.check_trainable(snapshot)?;

        let index = self.snapshots.len();
        self.snapshots.push(snapshot.clone());
        tracing::debug!("Adding snapshot {index}");

        if let Some(observer) = &self.observer {
            observer.on_train(index, &self.snapshots[index]);
        }
        Ok(index)
    }

    /// Find the stored snapshot and rotation that best explain `query`.
    ///
    /// Every column shift `r` in `0..width` of the query is compared with
    /// every stored snapshot by sum of absolute differences. The smallest
    /// sum wins; ties go to the lowest rotation, then the lowest index.
    pub fn test(&self, query: &Snapshot) -> HomingResult<MatchResult> {
        let expected = self.dimensions().ok_or(HomingError::EmptyMemory)?;
        if query.dimensions() != expected {
            return Err(HomingError::DimensionMismatch {
                expected,
                actual: query.dimensions(),
            });
        }

        let _span = tracing::debug_span!("perfect_memory_test", snapshots = self.len()).entered();
        let start = Instant::now();
        let test_index = self.test_count.fetch_add(1, Ordering::Relaxed);

        let mut distances = self
            .observer
            .as_ref()
            .map(|_| Array2::<f64>::zeros((query.width() as usize, self.len())));

        let best = if self.config.parallel_scan {
            self.scan_parallel(query, distances.as_mut())
        } else {
            self.scan_sequential(query, distances.as_mut())
        };
        let best = best.ok_or(HomingError::EmptyMemory)?;

        let result = MatchResult {
            heading: TAU * (best.rotation as f64 / query.width() as f64),
            snapshot_index: best.snapshot,
            match_value: best.value as f64,
        };

        tracing::debug!(
            "Heading: {:.2} deg, best-matching snapshot: {} (of {}), minimum value: {} ({:.3} ms)",
            result.heading_degrees(),
            result.snapshot_index,
            self.len(),
            result.match_value,
            start.elapsed().as_secs_f64() * 1000.0
        );

        if let (Some(observer), Some(distances)) = (&self.observer, distances) {
            observer.on_test(&RidfReport {
                test_index,
                query: query.clone(),
                distances,
                result,
            });
        }

        Ok(result)
    }

    fn scan_sequential(
        &self,
        query: &Snapshot,
        mut distances: Option<&mut Array2<f64>>,
    ) -> Option<Best> {
        let (width, height) = query.dimensions();
        let mut rotated = self.scratch.take(width, height);
        let mut best = None;

        for rotation in 0..width as usize {
            query.shift_columns_into(rotation, &mut rotated);
            for (index, stored) in self.snapshots.iter().enumerate() {
                let value = stored.sum_abs_diff(rotated.as_raw());
                if let Some(matrix) = distances.as_deref_mut() {
                    matrix[[rotation, index]] = value as f64;
                }
                Best::offer(&mut best, rotation, index, value);
            }
            tracing::trace!("Rotation {rotation}: best so far {:?}", best.map(|b| b.value));
        }
        best
    }

    fn scan_parallel(
        &self,
        query: &Snapshot,
        mut distances: Option<&mut Array2<f64>>,
    ) -> Option<Best> {
        let (width, height) = query.dimensions();

        let rows: Vec<Vec<u64>> = (0..width as usize)
            .into_par_iter()
            .map_init(
                || self.scratch.take(width, height),
                |rotated, rotation| {
                    query.shift_columns_into(rotation, rotated);
                    self.snapshots
                        .iter()
                        .map(|stored| stored.sum_abs_diff(rotated.as_raw()))
                        .collect()
                },
            )
            .collect();

        // Reduced in scan order so ties resolve exactly as in the sequential scan.
        let mut best = None;
        for (rotation, row) in rows.iter().enumerate() {
            for (index, &value) in row.iter().enumerate() {
                if let Some(matrix) = distances.as_deref_mut() {
                    matrix[[rotation, index]] = value as f64;
                }
                Best::offer(&mut best, rotation, index, value);
            }
        }
        best
    }

    fn check_trainable(&self, snapshot: &Snapshot) -> HomingResult<()> {
        let actual = snapshot.dimensions();
        if actual.0 == 0 || actual.1 == 0 {
            return Err(HomingError::InvalidInput(format!(
                "cannot train an empty {}x{} snapshot",
                actual.0, actual.1
            )));
        }
        match self.dimensions() {
            Some(expected) if expected != actual => {
                Err(HomingError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

impl Default for PerfectMemory {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl fmt::Debug for PerfectMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerfectMemory")
            .field("config", &self.config)
            .field("snapshots", &self.snapshots.len())
            .field("dimensions", &self.dimensions())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
