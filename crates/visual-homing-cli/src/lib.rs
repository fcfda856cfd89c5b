//! Visual homing command-line front-end.

pub mod commands;

pub use commands::{MemoryInfo, RouteReport, TestReport, TrainReport};
