//! Construction parameters for the processor, memory, and route, and where to find them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{HomingError, HomingResult};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "VISUAL_HOMING_CONFIG";

/// Configuration file picked up from the working directory.
const DEFAULT_CONFIG_FILE: &str = "visual-homing.json";

/// Contrast-limited adaptive histogram equalization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheConfig {
    /// Histogram clip limit relative to a uniform histogram; `<= 0` disables clipping.
    pub clip_limit: f64,
    pub tile_grid_width: u32,
    pub tile_grid_height: u32,
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self {
            clip_limit: 0.01 * 255.0,
            tile_grid_width: 8,
            tile_grid_height: 8,
        }
    }
}

/// Snapshot preprocessing resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub intermediate_width: u32,
    pub intermediate_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub clahe: ClaheConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            intermediate_width: 74,
            intermediate_height: 19,
            output_width: 36,
            output_height: 10,
            clahe: ClaheConfig::default(),
        }
    }
}

impl ProcessorConfig {
    /// Reject resolutions the pipeline cannot run with.
    pub fn validate(&self) -> HomingResult<()> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(HomingError::InvalidConfig(
                "output resolution must be non-zero".to_string(),
            ));
        }
        if self.intermediate_width <= self.output_width
            || self.intermediate_height <= self.output_height
        {
            return Err(HomingError::InvalidConfig(format!(
                "intermediate resolution {}x{} must be larger than output {}x{}",
                self.intermediate_width,
                self.intermediate_height,
                self.output_width,
                self.output_height
            )));
        }
        let clahe = &self.clahe;
        if clahe.tile_grid_width == 0 || clahe.tile_grid_height == 0 {
            return Err(HomingError::InvalidConfig(
                "CLAHE tile grid must be non-zero".to_string(),
            ));
        }
        if clahe.tile_grid_width > self.intermediate_width
            || clahe.tile_grid_height > self.intermediate_height
        {
            return Err(HomingError::InvalidConfig(format!(
                "CLAHE tile grid {}x{} exceeds intermediate resolution {}x{}",
                clahe.tile_grid_width,
                clahe.tile_grid_height,
                self.intermediate_width,
                self.intermediate_height
            )));
        }
        Ok(())
    }
}

/// Perfect memory scan options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Spread the rotation scan across the rayon thread pool.
    pub parallel_scan: bool,
}

/// Route reduction and proximity parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Minimum path length between kept waypoints, metres.
    pub waypoint_spacing: f32,
    /// Distance to the last waypoint that counts as arrival, metres.
    pub destination_threshold: f32,
    /// Recorded route units per metre.
    pub route_units_per_metre: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            waypoint_spacing: 0.2,
            destination_threshold: 0.2,
            route_units_per_metre: 100.0,
        }
    }
}

impl RouteConfig {
    pub fn validate(&self) -> HomingResult<()> {
        if !(self.waypoint_spacing > 0.0) {
            return Err(HomingError::InvalidConfig(format!(
                "waypoint spacing must be positive, got {}",
                self.waypoint_spacing
            )));
        }
        if !(self.destination_threshold >= 0.0) {
            return Err(HomingError::InvalidConfig(format!(
                "destination threshold must be non-negative, got {}",
                self.destination_threshold
            )));
        }
        if !(self.route_units_per_metre > 0.0) {
            return Err(HomingError::InvalidConfig(format!(
                "route units per metre must be positive, got {}",
                self.route_units_per_metre
            )));
        }
        Ok(())
    }
}

/// Complete configuration for a homing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    pub processor: ProcessorConfig,
    pub memory: MemoryConfig,
    pub route: RouteConfig,
}

impl HomingConfig {
    /// Read a JSON configuration file; missing fields take their defaults.
    pub fn load(path: &Path) -> HomingResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: HomingConfig = serde_json::from_str(&text).map_err(|e| {
            HomingError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the resolved configuration file, or fall back to defaults.
    pub fn load_or_default(explicit: Option<&str>) -> HomingResult<Self> {
        match resolve_config_path(explicit) {
            Some(path) => Self::load(&path),
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> HomingResult<()> {
        self.processor.validate()?;
        self.route.validate()
    }
}

/// Resolve the configuration file path.
///
/// An explicit path always wins, then `VISUAL_HOMING_CONFIG`, then
/// `visual-homing.json` in the working directory.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(env_path));
    }

    let cwd_config = PathBuf::from(DEFAULT_CONFIG_FILE);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    None
}
