//! # Diagnostics
//!
//! Optional per-tick counters. Systems write the cheap counters as they
//! run; the diagnostics system fills in the aggregate view when
//! `perf_stats` is enabled. Disabled diagnostics cost nothing and change
//! nothing.

use meridian_core::{EcsManager, EcsSystem};

use crate::context::EngineContext;

/// Counters collected from the engine, readable by the host.
#[derive(Clone, Debug, Default)]
pub struct EngineMetrics {
    /// Ticks observed by the diagnostics system.
    pub ticks: u64,
    /// Live entities at the end of the tick.
    pub entities_alive: usize,
    /// Visible cells this tick.
    pub cells_visible: usize,
    /// Tile downloads in flight.
    pub tiles_in_flight: usize,
    /// Fragment downloads in flight.
    pub fragments_in_flight: usize,
    /// Loaded entries in the tile cache.
    pub tile_cache_loaded: usize,
    /// Loaded entries in the fragment cache.
    pub fragment_cache_loaded: usize,
    /// Microtasks submitted but not completed.
    pub microtasks_pending: usize,
    /// Render jobs emitted last tick.
    pub render_jobs: usize,
    /// Total cache evictions since construction.
    pub evictions: u64,
    /// Slowest system of the last reported tick.
    pub slowest_system: &'static str,
    /// Wall time of that system in milliseconds.
    pub slowest_system_ms: f64,
}

/// Fills the aggregate counters when `perf_stats` is on.
pub struct DiagnosticsSystem;

impl EcsSystem<EngineContext> for DiagnosticsSystem {
    fn name(&self) -> &'static str {
        "diagnostics"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        if !ctx.config.perf_stats {
            return;
        }

        ctx.metrics.ticks += 1;
        ctx.metrics.entities_alive = world.alive_count();
        ctx.metrics.tiles_in_flight = ctx.tile_loader.in_flight_count();
        ctx.metrics.fragments_in_flight = ctx.fragment_loader.in_flight_count();
        ctx.metrics.tile_cache_loaded = ctx.tile_cache.loaded_count();
        ctx.metrics.fragment_cache_loaded = ctx.fragment_cache.loaded_count();
    }
}
