//! Subcommand implementations. Each returns a serializable report for `main` to print.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;

use visual_homing::{
    list_views, load_route_file, load_view, DumpObserver, HomingConfig, MatchResult,
    MemoryReader, MemoryWriter, PerfectMemory, SnapshotProcessor,
};

/// Result of `train`.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub memory: PathBuf,
    pub snapshots: usize,
    pub width: u32,
    pub height: u32,
}

/// Result of `test`.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    #[serde(flatten)]
    pub result: MatchResult,
    pub heading_degrees: f64,
}

/// Result of `route`.
#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    pub waypoints: usize,
    /// `None` when the route has fewer than two waypoints.
    pub distance: Option<f32>,
    pub segment: Option<usize>,
    pub at_destination: bool,
}

/// Result of `info`.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub memory: PathBuf,
    pub snapshots: usize,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Process every view in `views` (file-name order), train a memory, and save it to `out`.
pub fn train(config: &HomingConfig, views: &Path, out: &Path) -> anyhow::Result<TrainReport> {
    let paths = list_views(views)
        .with_context(|| format!("Cannot list views in {}", views.display()))?;
    if paths.is_empty() {
        bail!("No supported images in {}", views.display());
    }

    let mut processor = SnapshotProcessor::new(config.processor)?;
    let mut memory = PerfectMemory::new(config.memory);
    for path in &paths {
        let view = load_view(path).with_context(|| format!("Cannot load {}", path.display()))?;
        let snapshot = processor
            .process(&view)
            .with_context(|| format!("Cannot process {}", path.display()))?;
        memory.train(&snapshot)?;
    }

    MemoryWriter::write_to_file(&memory, out)
        .with_context(|| format!("Cannot write {}", out.display()))?;

    let (width, height) = processor.output_dimensions();
    tracing::info!(
        "Trained {} views from {} into {}",
        memory.len(),
        views.display(),
        out.display()
    );
    Ok(TrainReport {
        memory: out.to_path_buf(),
        snapshots: memory.len(),
        width,
        height,
    })
}

/// Query a saved memory with one view, optionally dumping diagnostics.
pub fn test(
    config: &HomingConfig,
    memory: &Path,
    view: &Path,
    dump_dir: Option<&Path>,
) -> anyhow::Result<TestReport> {
    let mut db = MemoryReader::read_from_file(memory, config.memory)
        .with_context(|| format!("Cannot read {}", memory.display()))?;
    if let Some(dir) = dump_dir {
        let observer = DumpObserver::new(dir)
            .with_context(|| format!("Cannot create dump directory {}", dir.display()))?;
        db.set_observer(Arc::new(observer));
    }

    let mut processor = SnapshotProcessor::new(config.processor)?;
    let image = load_view(view).with_context(|| format!("Cannot load {}", view.display()))?;
    let snapshot = processor.process(&image)?;
    let result = db.test(&snapshot)?;
    tracing::info!(
        "{}: snapshot {} at {:.1} deg (value {})",
        view.display(),
        result.snapshot_index,
        result.heading_degrees(),
        result.match_value
    );

    Ok(TestReport {
        heading_degrees: result.heading_degrees(),
        result,
    })
}

/// Load a recorded route and locate `(x, y)` relative to it.
pub fn route(config: &HomingConfig, route: &Path, x: f32, y: f32) -> anyhow::Result<RouteReport> {
    let route = load_route_file(route, &config.route)?;
    let nearest = match route.distance_to_route(x, y) {
        Ok(nearest) => Some(nearest),
        Err(e) => {
            tracing::warn!("No distance to route: {e}");
            None
        }
    };

    Ok(RouteReport {
        waypoints: route.len(),
        distance: nearest.map(|(distance, _)| distance),
        segment: nearest.map(|(_, segment)| segment),
        at_destination: route.at_destination(x, y, config.route.destination_threshold),
    })
}

/// Describe a saved memory.
pub fn info(config: &HomingConfig, memory: &Path) -> anyhow::Result<MemoryInfo> {
    let db = MemoryReader::read_from_file(memory, config.memory)
        .with_context(|| format!("Cannot read {}", memory.display()))?;
    let dims = db.dimensions();

    Ok(MemoryInfo {
        memory: memory.to_path_buf(),
        snapshots: db.len(),
        width: dims.map(|(w, _)| w),
        height: dims.map(|(_, h)| h),
    })
}
