//! Visual homing: panoramic views reduced to snapshots, a perfect memory that recovers heading by
//! rotational image difference, and learned routes of waypoints.

pub mod capture;
pub mod clahe;
pub mod config;
pub mod diagnostics;
pub mod memory;
pub mod preprocess;
pub mod route;
pub mod scratch;
pub mod storage;
pub mod types;

pub use capture::{is_supported_format, list_views, load_view, load_view_from_memory};
pub use clahe::Clahe;
pub use config::{
    resolve_config_path, ClaheConfig, HomingConfig, MemoryConfig, ProcessorConfig, RouteConfig,
    CONFIG_ENV_VAR,
};
pub use diagnostics::{DumpObserver, MatchObserver, RidfReport};
pub use memory::PerfectMemory;
pub use preprocess::SnapshotProcessor;
pub use route::Route;
pub use storage::{load_route_file, read_route_points, write_route_points, MemoryReader, MemoryWriter};
pub use types::*;
