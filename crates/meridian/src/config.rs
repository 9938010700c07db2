//! # Engine Configuration
//!
//! One immutable struct, read once at construction and passed by
//! reference into every component that needs it. Loaded from TOML or
//! built in code; validated before the engine starts.

use meridian_core::{EngineError, EngineResult};
use serde::Deserialize;

/// Microtask executor strategy selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    /// Budgeted slices on the frame thread.
    #[default]
    Cooperative,
    /// Worker pool off the frame thread.
    Background,
}

/// Immutable engine configuration.
///
/// Every field has a production default; a TOML file only names the
/// fields it overrides.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Soft cap on cached basemap tiles.
    pub tile_cache_limit: usize,
    /// Soft cap on cached vector fragments.
    pub fragment_cache_limit: usize,
    /// Concurrent downloads per loader.
    pub active_download_limit: usize,
    /// Microtask executor strategy.
    pub executor: ExecutorMode,
    /// Per-frame computation budget for the cooperative executor, in
    /// milliseconds.
    pub computation_budget_ms: u64,
    /// Points projected per microtask step.
    pub projection_quant: usize,
    /// Worker threads for the background executor.
    pub background_workers: usize,
    /// Draw cell outlines on a debug layer.
    pub debug_grid: bool,
    /// Raster basemap instead of vector ground/label layers.
    pub raster_tiles: bool,
    /// Minimum elapsed time between engine updates; ticks arriving
    /// faster are coalesced.
    pub update_pause_ms: u64,
    /// Multiplier applied to elapsed time before it reaches the systems.
    pub update_time_multiplier: f64,
    /// Collect per-tick metrics.
    pub perf_stats: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_cache_limit: 36,
            fragment_cache_limit: 500,
            active_download_limit: 30,
            executor: ExecutorMode::Cooperative,
            computation_budget_ms: 12,
            projection_quant: 1000,
            background_workers: 2,
            debug_grid: false,
            raster_tiles: false,
            update_pause_ms: 0,
            update_time_multiplier: 1.0,
            perf_stats: false,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for syntax errors, unknown
    /// fields, or invalid values.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EngineError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every limit and budget.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] naming the offending field.
    pub fn validate(&self) -> EngineResult<()> {
        if self.tile_cache_limit == 0 {
            return Err(EngineError::Configuration(
                "tile_cache_limit must be positive".into(),
            ));
        }
        if self.fragment_cache_limit == 0 {
            return Err(EngineError::Configuration(
                "fragment_cache_limit must be positive".into(),
            ));
        }
        if self.active_download_limit == 0 {
            return Err(EngineError::Configuration(
                "active_download_limit must be positive".into(),
            ));
        }
        if self.projection_quant == 0 {
            return Err(EngineError::Configuration(
                "projection_quant must be positive".into(),
            ));
        }
        if self.background_workers == 0 {
            return Err(EngineError::Configuration(
                "background_workers must be positive".into(),
            ));
        }
        if !(self.update_time_multiplier.is_finite() && self.update_time_multiplier > 0.0) {
            return Err(EngineError::Configuration(
                "update_time_multiplier must be positive and finite".into(),
            ));
        }
        Ok(())
    }
}
