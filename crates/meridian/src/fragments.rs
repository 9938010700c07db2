//! # Fragment Streaming Systems
//!
//! Vector fragments stream per visible cell while any region entity is
//! live. Download mirrors the tile path through a second loader and
//! cache; decoding yields geographic polylines, and projection into
//! world coordinates runs as a microtask so large geometries never
//! monopolize a frame.

use std::collections::BTreeSet;
use std::sync::Arc;

use meridian_core::{
    Component, EcsManager, EcsSystem, EngineResult, EntityId, MicroTask, MicroTaskExecutor,
    TaskStep,
};
use meridian_geo::{simplify, GeoPoint, MapProjection, WorldPoint};
use meridian_tiles::{CellKey, CellState};

use crate::cells::CellStateComponent;
use crate::context::EngineContext;
use crate::scheduler::{Computation, MicrotaskPendingComponent};
use crate::tiles::DownloadStateComponent;

/// Decoded vector geometry: polylines in geographic coordinates.
pub type GeoPolylines = Vec<Vec<GeoPoint>>;

/// Projected polylines longer than this are thinned before rendering.
const MAX_PROJECTED_POINTS: usize = 512;

/// Marks an entity as a map region streaming vector fragments.
#[derive(Clone, Debug)]
pub struct RegionComponent {
    /// Host-side region identifier.
    pub region_id: String,
}

impl Component for RegionComponent {
    const NAME: &'static str = "Region";
}

/// The cell a fragment entity covers.
#[derive(Clone, Copy, Debug)]
pub struct FragmentComponent {
    /// The fragment's cell address.
    pub cell: CellKey,
}

impl Component for FragmentComponent {
    const NAME: &'static str = "Fragment";
}

/// Singleton bookkeeping for fragment entities, rewritten every tick.
#[derive(Debug, Default)]
pub struct FragmentStateComponent {
    /// Live fragment entity per cell.
    pub entities: std::collections::HashMap<CellKey, EntityId>,
    /// Cells whose fragments must be downloaded this tick.
    pub to_download: Vec<CellKey>,
    /// Cells whose fragments left visibility this tick.
    pub to_remove: Vec<CellKey>,
}

impl Component for FragmentStateComponent {
    const NAME: &'static str = "FragmentState";
}

/// Decoded geographic geometry attached to a fragment entity.
#[derive(Clone, Debug)]
pub struct GeoGeometryComponent {
    /// Shared decoded polylines from the cache.
    pub polylines: Arc<GeoPolylines>,
}

impl Component for GeoGeometryComponent {
    const NAME: &'static str = "GeoGeometry";
}

/// Decodes raw fragment bytes into geographic polylines.
///
/// Collaborator seam over the vector/TWKB parser, which is outside the
/// engine.
pub trait FragmentDecoder: Send + Sync {
    /// Decodes one payload.
    ///
    /// # Errors
    ///
    /// Returns [`meridian_core::EngineError::Decode`] for malformed
    /// payloads.
    fn decode(&self, cell: CellKey, bytes: &[u8]) -> EngineResult<GeoPolylines>;
}

/// Projects fragment polylines into world coordinates incrementally.
///
/// Each step projects at most `quant` points; oversized output lines are
/// thinned with Visvalingam-Whyatt ranking as they complete.
pub struct GeometryProjectionTask {
    source: Arc<GeoPolylines>,
    projection: Arc<dyn MapProjection>,
    quant: usize,
    line: usize,
    point: usize,
    current: Vec<WorldPoint>,
    output: Vec<Vec<WorldPoint>>,
}

impl GeometryProjectionTask {
    /// Creates a task over shared decoded geometry.
    #[must_use]
    pub fn new(source: Arc<GeoPolylines>, projection: Arc<dyn MapProjection>, quant: usize) -> Self {
        Self {
            source,
            projection,
            quant: quant.max(1),
            line: 0,
            point: 0,
            current: Vec::new(),
            output: Vec::new(),
        }
    }

    fn thin(points: Vec<WorldPoint>) -> Vec<WorldPoint> {
        if points.len() <= MAX_PROJECTED_POINTS {
            return points;
        }
        simplify::simplify_to_count(&points, MAX_PROJECTED_POINTS)
            .into_iter()
            .map(|i| points[i])
            .collect()
    }
}

impl MicroTask<Computation> for GeometryProjectionTask {
    fn step(&mut self) -> TaskStep {
        let mut budget = self.quant;
        while budget > 0 {
            let Some(line) = self.source.get(self.line) else {
                return TaskStep::Done;
            };
            if self.point >= line.len() {
                let finished = std::mem::take(&mut self.current);
                self.output.push(Self::thin(finished));
                self.line += 1;
                self.point = 0;
                continue;
            }
            self.current.push(self.projection.project(line[self.point]));
            self.point += 1;
            budget -= 1;
        }

        if self.line >= self.source.len() {
            TaskStep::Done
        } else {
            TaskStep::Continue
        }
    }

    fn finish(self: Box<Self>) -> Computation {
        Computation::FragmentGeometry {
            polylines: self.output,
        }
    }
}

fn fragment_state_singleton(world: &EcsManager, ctx: &mut EngineContext) -> Option<EntityId> {
    match world.get_singleton::<FragmentStateComponent>() {
        Ok(id) => Some(id),
        Err(error) => {
            ctx.errors.report(error);
            None
        }
    }
}

/// Computes which fragments are needed and which are obsolete.
pub struct FragmentUpdateSystem;

impl EcsSystem<EngineContext> for FragmentUpdateSystem {
    fn name(&self) -> &'static str {
        "fragment_update"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let Some(frag_id) = fragment_state_singleton(world, ctx) else {
            return;
        };

        let has_regions = world.get_components::<RegionComponent>().next().is_some();
        let needed: BTreeSet<CellKey> = if has_regions {
            world
                .get_singleton::<CellStateComponent>()
                .ok()
                .and_then(|id| world.get_component::<CellStateComponent>(id))
                .map(|state| state.visible.clone())
                .unwrap_or_default()
        } else {
            BTreeSet::new()
        };

        let current: BTreeSet<CellKey> = world
            .get_component::<FragmentStateComponent>(frag_id)
            .map(|s| s.entities.keys().copied().collect())
            .unwrap_or_default();

        let to_download: Vec<CellKey> = needed.difference(&current).copied().collect();
        let to_remove: Vec<CellKey> = current.difference(&needed).copied().collect();

        let mut created = Vec::with_capacity(to_download.len());
        for &cell in &to_download {
            let entity = world
                .spawn(&format!("fragment_{cell}"))
                .with(FragmentComponent { cell })
                .with(DownloadStateComponent {
                    state: CellState::Requested,
                    attempts: 0,
                })
                .id();
            created.push((cell, entity));
        }

        if let Some(state) = world.get_component_mut::<FragmentStateComponent>(frag_id) {
            state.entities.extend(created);
            state.to_download = to_download;
            state.to_remove = to_remove;
        }
    }
}

/// Requests fragment downloads and merges finished ones.
///
/// The fragment loader enforces the active-download limit; overflow
/// requests queue FIFO inside it.
pub struct FragmentDownloadingSystem;

impl EcsSystem<EngineContext> for FragmentDownloadingSystem {
    fn name(&self) -> &'static str {
        "fragment_downloading"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let Some(frag_id) = fragment_state_singleton(world, ctx) else {
            return;
        };
        let (to_download, entities) = match world.get_component::<FragmentStateComponent>(frag_id) {
            Some(state) => (state.to_download.clone(), state.entities.clone()),
            None => return,
        };

        for cell in to_download {
            if ctx.fragment_cache.state(cell) == CellState::Loaded {
                if let (Some(&entity), Some(payload)) =
                    (entities.get(&cell), ctx.fragment_cache.retain(cell))
                {
                    world.add_component(entity, GeoGeometryComponent { polylines: payload });
                    world.add_component(
                        entity,
                        DownloadStateComponent {
                            state: CellState::Loaded,
                            attempts: 0,
                        },
                    );
                }
            } else {
                ctx.fragment_cache.mark_requested(cell);
                ctx.fragment_loader.request(cell);
            }
        }

        for fetched in ctx.fragment_loader.poll_completed() {
            let cell = fetched.cell;
            let entity = entities
                .get(&cell)
                .copied()
                .filter(|&e| world.is_alive(e));

            let decoded = fetched
                .result
                .and_then(|bytes| ctx.fragment_decoder.decode(cell, &bytes));

            match decoded {
                Ok(polylines) => {
                    ctx.fragment_cache.insert_loaded(cell, polylines);
                    if let Some(entity) = entity {
                        if let Some(payload) = ctx.fragment_cache.retain(cell) {
                            world.add_component(
                                entity,
                                GeoGeometryComponent { polylines: payload },
                            );
                        }
                        world.add_component(
                            entity,
                            DownloadStateComponent {
                                state: CellState::Loaded,
                                attempts: fetched.attempts,
                            },
                        );
                    }
                }
                Err(error) => {
                    ctx.fragment_cache.mark_failed(cell);
                    ctx.errors.report(error);
                    if let Some(entity) = entity {
                        world.add_component(
                            entity,
                            DownloadStateComponent {
                                state: CellState::Failed,
                                attempts: fetched.attempts,
                            },
                        );
                    }
                }
            }
        }
    }
}

/// Submits projection microtasks for decoded fragments.
pub struct FragmentEmitSystem;

impl EcsSystem<EngineContext> for FragmentEmitSystem {
    fn name(&self) -> &'static str {
        "fragment_emit"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let candidates: Vec<EntityId> = world
            .get_components::<GeoGeometryComponent>()
            .map(|(id, _)| id)
            .filter(|&id| {
                !world.has_component::<MicrotaskPendingComponent>(id)
                    && !world.has_component::<crate::render::RenderableComponent>(id)
            })
            .collect();

        for id in candidates {
            let Some(geometry) = world.get_component::<GeoGeometryComponent>(id) else {
                continue;
            };
            let task = GeometryProjectionTask::new(
                Arc::clone(&geometry.polylines),
                Arc::clone(&ctx.projection),
                ctx.config.projection_quant,
            );
            let task_id = ctx.executor.submit(id, Box::new(task));
            world.add_component(id, MicrotaskPendingComponent { task: task_id });
        }
    }
}

/// Removes obsolete fragments, cancels their microtasks, evicts the
/// cache.
pub struct FragmentsRemovingSystem;

impl EcsSystem<EngineContext> for FragmentsRemovingSystem {
    fn name(&self) -> &'static str {
        "fragments_removing"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let Some(frag_id) = fragment_state_singleton(world, ctx) else {
            return;
        };
        let to_remove = match world.get_component::<FragmentStateComponent>(frag_id) {
            Some(state) => state.to_remove.clone(),
            None => return,
        };

        let mut removed = Vec::new();
        for cell in to_remove {
            let entity = world
                .get_component::<FragmentStateComponent>(frag_id)
                .and_then(|s| s.entities.get(&cell).copied());
            let Some(entity) = entity else {
                continue;
            };

            if let Some(pending) = world.get_component::<MicrotaskPendingComponent>(entity) {
                ctx.executor.cancel(pending.task);
            }

            match world.get_component::<DownloadStateComponent>(entity).map(|d| d.state) {
                Some(CellState::Loaded) => ctx.fragment_cache.release(cell),
                Some(CellState::Failed) => ctx.fragment_cache.forget(cell),
                _ => {}
            }

            world.remove_entity(entity);
            removed.push(cell);
        }

        if let Some(state) = world.get_component_mut::<FragmentStateComponent>(frag_id) {
            for cell in &removed {
                state.entities.remove(cell);
            }
        }

        let evicted = ctx
            .fragment_cache
            .evict_over_limit(ctx.config.fragment_cache_limit);
        ctx.metrics.evictions += evicted.len() as u64;
    }
}
